//! Mintbase adapter: store lookups over the indexer REST API and thing
//! metadata from the permanent metadata host.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;
use unb_core::{
    config::Config,
    errors::Error,
    ports::{Marketplace, Store, ThingMetadata},
    Result,
};

#[derive(Clone, Debug)]
pub struct MintbaseClient {
    api_url: String,
    metadata_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct StoreResponse {
    #[serde(default)]
    store: Vec<Store>,
}

impl MintbaseClient {
    pub fn new(
        api_url: impl Into<String>,
        metadata_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("mintbase client build error: {e}")))?;
        Ok(Self {
            api_url: api_url.into(),
            metadata_url: metadata_url.into(),
            http,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(
            cfg.mintbase_api_url.clone(),
            cfg.mintbase_metadata_url.clone(),
            cfg.http_timeout,
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url, "mintbase request");
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::External(format!("mintbase request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "mintbase request failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        resp.json()
            .await
            .map_err(|e| Error::External(format!("mintbase json error: {e}")))
    }
}

/// The indexer answers with a list; an unknown store is an empty one.
fn first_store(resp: StoreResponse) -> Option<Store> {
    resp.store.into_iter().next()
}

/// Thing ids are `<metadata id>:<store id>`.
fn metadata_id(thing_id: &str) -> Result<&str> {
    match thing_id.split_once(':') {
        Some((meta, _)) if !meta.is_empty() => Ok(meta),
        _ => Err(Error::InvalidInput(format!(
            "thing id {thing_id:?} has no metadata id"
        ))),
    }
}

#[async_trait]
impl Marketplace for MintbaseClient {
    async fn store(&self, store_id: &str) -> Result<Option<Store>> {
        let resp: StoreResponse = self
            .get_json(&format!("{}/stores/{store_id}", self.api_url))
            .await?;
        Ok(first_store(resp))
    }

    async fn thing_metadata(&self, thing_id: &str) -> Result<ThingMetadata> {
        let meta = metadata_id(thing_id)?;
        self.get_json(&format!("{}/{meta}", self.metadata_url)).await
    }
}
