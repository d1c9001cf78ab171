//! Minimal NEAR JSON-RPC client: the handful of `query` request types the bot
//! reads and `broadcast_tx_commit`.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use unb_core::{errors::Error, Result};

#[derive(Clone, Debug)]
pub struct RpcClient {
    url: String,
    http: reqwest::Client,
}

/// Current nonce and a recent block hash for one access key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessKeyView {
    pub nonce: u64,
    pub block_hash: [u8; 32],
}

#[derive(Deserialize)]
struct RawAccessKey {
    nonce: u64,
    block_hash: String,
}

#[derive(Deserialize)]
struct RawAccessKeyList {
    #[serde(default)]
    keys: Vec<RawKeyEntry>,
}

#[derive(Deserialize)]
struct RawKeyEntry {
    public_key: String,
}

#[derive(Deserialize)]
struct RawAccount {
    amount: String,
}

#[derive(Deserialize)]
struct RawCallResult {
    #[serde(default)]
    result: Vec<u8>,
}

impl RpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("near rpc client build error: {e}")))?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": "dontcare",
            "method": method,
            "params": params,
        });
        debug!(method, "near rpc request");

        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::External(format!("near rpc request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "near rpc {method} failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let v: Value = resp
            .json()
            .await
            .map_err(|e| Error::External(format!("near rpc json error: {e}")))?;
        unwrap_response(method, v)
    }

    async fn query(&self, params: Value) -> Result<Value> {
        self.call("query", params).await
    }

    pub async fn view_access_key_list(&self, account_id: &str) -> Result<Vec<String>> {
        let v = self
            .query(json!({
                "request_type": "view_access_key_list",
                "finality": "final",
                "account_id": account_id,
            }))
            .await?;
        let list: RawAccessKeyList = serde_json::from_value(v)?;
        Ok(list.keys.into_iter().map(|k| k.public_key).collect())
    }

    pub async fn view_access_key(
        &self,
        account_id: &str,
        public_key: &str,
    ) -> Result<AccessKeyView> {
        let v = self
            .query(json!({
                "request_type": "view_access_key",
                "finality": "final",
                "account_id": account_id,
                "public_key": public_key,
            }))
            .await?;
        parse_access_key(v)
    }

    /// Total balance in yoctoNEAR.
    pub async fn view_account(&self, account_id: &str) -> Result<u128> {
        let v = self
            .query(json!({
                "request_type": "view_account",
                "finality": "final",
                "account_id": account_id,
            }))
            .await?;
        let raw: RawAccount = serde_json::from_value(v)?;
        raw.amount
            .parse()
            .map_err(|e| Error::External(format!("near rpc bad amount {:?}: {e}", raw.amount)))
    }

    pub async fn call_function(
        &self,
        contract_id: &str,
        method: &str,
        args: &Value,
    ) -> Result<Value> {
        let args = serde_json::to_vec(args)?;
        let v = self
            .query(json!({
                "request_type": "call_function",
                "finality": "final",
                "account_id": contract_id,
                "method_name": method,
                "args_base64": BASE64.encode(args),
            }))
            .await?;
        let raw: RawCallResult = serde_json::from_value(v)?;
        decode_json_bytes(&raw.result)
    }

    /// Submit a borsh-encoded signed transaction and wait for its outcome.
    pub async fn broadcast_tx_commit(&self, signed: &[u8]) -> Result<Value> {
        self.call("broadcast_tx_commit", json!([BASE64.encode(signed)]))
            .await
    }
}

fn unwrap_response(method: &str, mut v: Value) -> Result<Value> {
    if let Some(err) = v.get("error") {
        return Err(Error::External(format!("near rpc {method} error: {err}")));
    }
    let result = v
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| Error::External(format!("near rpc {method}: missing result")))?;
    // View failures come back as a successful response with `result.error`.
    if let Some(err) = result.get("error").and_then(Value::as_str) {
        return Err(Error::External(format!("near rpc {method} error: {err}")));
    }
    Ok(result)
}

fn parse_access_key(v: Value) -> Result<AccessKeyView> {
    let raw: RawAccessKey = serde_json::from_value(v)?;
    let block_hash: [u8; 32] = bs58::decode(&raw.block_hash)
        .into_vec()
        .ok()
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| Error::External(format!("near rpc bad block hash {:?}", raw.block_hash)))?;
    Ok(AccessKeyView {
        nonce: raw.nonce,
        block_hash,
    })
}

/// Contract return values are raw JSON bytes; empty means no value.
pub(crate) fn decode_json_bytes(bytes: &[u8]) -> Result<Value> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(bytes)?)
}
