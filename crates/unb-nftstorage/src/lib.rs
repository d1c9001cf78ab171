//! NFT.Storage adapter (image + metadata pinning on IPFS).
//!
//! Two uploads per NFT: the image, then a metadata document pointing at it
//! with an `ipfs://` locator. Callers only ever see gateway URLs.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use unb_core::{
    config::Config,
    errors::Error,
    ports::{NftStorage, NftUpload},
    Result,
};

const METADATA_FILE: &str = "metadata.json";

#[derive(Clone, Debug)]
pub struct NftStorageClient {
    token: String,
    api_url: String,
    metadata_gateway: String,
    media_gateway: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default)]
    ok: bool,
    value: Option<UploadValue>,
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct UploadValue {
    cid: String,
}

#[derive(Deserialize)]
struct MetadataDoc {
    image: String,
}

impl NftStorageClient {
    pub fn new(
        token: impl Into<String>,
        api_url: impl Into<String>,
        metadata_gateway: impl Into<String>,
        media_gateway: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("nft.storage client build error: {e}")))?;
        Ok(Self {
            token: token.into(),
            api_url: api_url.into(),
            metadata_gateway: metadata_gateway.into(),
            media_gateway: media_gateway.into(),
            http,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(
            cfg.nft_storage_token.clone(),
            cfg.nft_storage_api_url.clone(),
            cfg.ipfs_metadata_gateway.clone(),
            cfg.ipfs_media_gateway.clone(),
            cfg.http_timeout,
        )
    }

    /// Upload one file and return its directory CID.
    async fn upload(&self, file_name: &str, mime: &str, bytes: Vec<u8>) -> Result<String> {
        if self.token.trim().is_empty() {
            return Err(Error::Config("NFT_STORAGE_TOKEN is not set".to_string()));
        }
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)
            .map_err(|e| Error::External(format!("nft.storage multipart error: {e}")))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .http
            .post(format!("{}/upload", self.api_url))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::External(format!("nft.storage request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "nft.storage upload failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let body: UploadResponse = resp
            .json()
            .await
            .map_err(|e| Error::External(format!("nft.storage json error: {e}")))?;
        let cid = upload_cid(body)?;
        debug!(file_name, %cid, "pinned on nft.storage");
        Ok(cid)
    }
}

fn upload_cid(body: UploadResponse) -> Result<String> {
    match (body.ok, body.value) {
        (true, Some(v)) if !v.cid.is_empty() => Ok(v.cid),
        _ => Err(Error::External(format!(
            "nft.storage upload rejected: {}",
            body.error.unwrap_or_default()
        ))),
    }
}

/// Map an `ipfs://<cid>/<path>` locator onto an HTTP gateway. HTTP URLs pass through.
pub fn gateway_url(gateway: &str, locator: &str) -> String {
    if locator.starts_with("http://") || locator.starts_with("https://") {
        return locator.to_string();
    }
    let path = locator.strip_prefix("ipfs://").unwrap_or(locator);
    format!(
        "{}/{}",
        gateway.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[async_trait]
impl NftStorage for NftStorageClient {
    async fn store_nft(&self, upload: NftUpload) -> Result<String> {
        let image_cid = self
            .upload(&upload.file_name, "image/jpeg", upload.image)
            .await?;

        let metadata = json!({
            "name": upload.name,
            "description": upload.description,
            "image": format!("ipfs://{image_cid}/{}", upload.file_name),
        });
        let metadata_cid = self
            .upload(
                METADATA_FILE,
                "application/json",
                serde_json::to_vec(&metadata)?,
            )
            .await?;

        let url = gateway_url(
            &self.metadata_gateway,
            &format!("ipfs://{metadata_cid}/{METADATA_FILE}"),
        );
        info!(%url, "nft metadata stored");
        Ok(url)
    }

    async fn image_url_from_metadata(&self, metadata_url: &str) -> Result<String> {
        let resp = self
            .http
            .get(metadata_url)
            .send()
            .await
            .map_err(|e| Error::External(format!("ipfs gateway request error: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::External(format!(
                "ipfs gateway returned {} for {metadata_url}",
                resp.status()
            )));
        }
        let doc: MetadataDoc = resp
            .json()
            .await
            .map_err(|e| Error::External(format!("ipfs metadata json error: {e}")))?;
        Ok(gateway_url(&self.media_gateway, &doc.image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipfs_locators_map_to_gateway() {
        assert_eq!(
            gateway_url("https://dweb.link/ipfs", "ipfs://bafyimg/cat_alice.jpg"),
            "https://dweb.link/ipfs/bafyimg/cat_alice.jpg"
        );
        assert_eq!(
            gateway_url("https://ipfs.io/ipfs/", "ipfs://bafymeta/metadata.json"),
            "https://ipfs.io/ipfs/bafymeta/metadata.json"
        );
        assert_eq!(
            gateway_url("https://dweb.link/ipfs", "https://example.com/a.png"),
            "https://example.com/a.png"
        );
    }

    #[test]
    fn upload_response_cid() {
        let ok: UploadResponse =
            serde_json::from_value(json!({"ok": true, "value": {"cid": "bafy1", "size": 10}}))
                .unwrap();
        assert_eq!(upload_cid(ok).unwrap(), "bafy1");

        let rejected: UploadResponse = serde_json::from_value(
            json!({"ok": false, "error": {"name": "HTTPError", "message": "Unauthorized"}}),
        )
        .unwrap();
        let err = upload_cid(rejected).unwrap_err();
        assert!(matches!(err, Error::External(m) if m.contains("Unauthorized")));
    }

    #[tokio::test]
    async fn missing_token_is_a_config_error() {
        let client = NftStorageClient::new(
            "  ",
            "http://127.0.0.1:1",
            "https://ipfs.io/ipfs",
            "https://dweb.link/ipfs",
            Duration::from_secs(1),
        )
        .unwrap();
        let err = client
            .store_nft(NftUpload {
                name: "Cat".to_string(),
                description: "A cat".to_string(),
                file_name: "Cat_alice.jpg".to_string(),
                image: vec![1, 2, 3],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
