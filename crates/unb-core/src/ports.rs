//! Ports for the external systems the bot drives.
//!
//! Adapter crates implement these: `unb-near` (chain), `unb-nftstorage`
//! (storage), `unb-mintbase` (marketplace).

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{credentials::Credential, domain::AccountId, Result};

/// An ed25519 key pair in NEAR's string encoding (`ed25519:<base58>`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub public_key: String,
    pub secret_key: String,
}

/// Result of a signed transaction.
#[derive(Clone, Debug)]
pub struct TxOutcome {
    pub hash: String,
    /// Decoded JSON return value of the receipt (`Null` when empty).
    pub value: serde_json::Value,
}

#[derive(Clone, Debug)]
pub struct FunctionCall {
    pub contract_id: AccountId,
    pub method: String,
    pub args: serde_json::Value,
    pub gas: u64,
    pub deposit: u128,
}

/// Network-level access to the chain. Holds no account secrets.
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn network_id(&self) -> &str;

    fn generate_key_pair(&self) -> Result<KeyPair>;

    /// Public keys currently registered as access keys of `account_id`.
    async fn access_keys(&self, account_id: &AccountId) -> Result<Vec<String>>;

    /// Read-only contract call with JSON args and a JSON result.
    async fn view(
        &self,
        contract_id: &AccountId,
        method: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value>;

    /// Build an immutable signing handle from one session's credential.
    ///
    /// Handles are never shared between sessions; nothing here touches the network.
    fn connect(&self, credential: &Credential) -> Result<Arc<dyn AccountHandle>>;
}

/// An account the bot can sign for.
#[async_trait]
pub trait AccountHandle: Send + Sync {
    fn account_id(&self) -> &AccountId;

    /// Total balance in yoctoNEAR.
    async fn balance(&self) -> Result<u128>;

    async fn send_money(&self, receiver_id: &AccountId, amount: u128) -> Result<TxOutcome>;

    async fn call(&self, call: FunctionCall) -> Result<TxOutcome>;
}

#[derive(Clone, Debug)]
pub struct NftUpload {
    pub name: String,
    pub description: String,
    pub file_name: String,
    pub image: Vec<u8>,
}

#[async_trait]
pub trait NftStorage: Send + Sync {
    /// Pin the image and an ERC-1155 style metadata document; returns the
    /// gateway URL of the metadata document.
    async fn store_nft(&self, upload: NftUpload) -> Result<String>;

    /// Fetch a metadata document and return a gateway URL for its `image`.
    async fn image_url_from_metadata(&self, metadata_url: &str) -> Result<String>;
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Minter {
    pub account: String,
    #[serde(default)]
    pub enabled: bool,
}

/// A listing ("thing") in a store. Ids look like `<metadata id>:<store>`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Thing {
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Store {
    pub id: String,
    #[serde(default)]
    pub minters: Vec<Minter>,
    #[serde(default)]
    pub things: Vec<Thing>,
}

impl Store {
    /// Whether any of `wallets` is an enabled minter here.
    pub fn has_enabled_minter(&self, wallets: &[AccountId]) -> bool {
        self.minters
            .iter()
            .any(|m| m.enabled && wallets.iter().any(|w| w.as_str() == m.account))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Trait {
    pub trait_type: String,
    pub value: serde_json::Value,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ThingMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub media: String,
    #[serde(default)]
    pub copies: Option<u64>,
    #[serde(default)]
    pub extra: Vec<Trait>,
}

#[async_trait]
pub trait Marketplace: Send + Sync {
    /// `None` when the store does not exist.
    async fn store(&self, store_id: &str) -> Result<Option<Store>>;

    async fn thing_metadata(&self, thing_id: &str) -> Result<ThingMetadata>;
}

/// The external systems, bundled for wiring.
#[derive(Clone)]
pub struct Backends {
    pub chain: Arc<dyn ChainClient>,
    pub storage: Arc<dyn NftStorage>,
    pub market: Arc<dyn Marketplace>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_minter_check() {
        let store: Store = serde_json::from_value(serde_json::json!({
            "id": "shop.mintspace2.testnet",
            "minters": [
                {"account": "alice.testnet", "enabled": true},
                {"account": "bob.testnet", "enabled": false}
            ]
        }))
        .unwrap();

        let alice = AccountId::parse("alice.testnet").unwrap();
        let bob = AccountId::parse("bob.testnet").unwrap();
        let carol = AccountId::parse("carol.testnet").unwrap();

        assert!(store.has_enabled_minter(&[carol.clone(), alice]));
        assert!(!store.has_enabled_minter(&[bob]));
        assert!(!store.has_enabled_minter(&[carol]));
        assert!(!store.has_enabled_minter(&[]));
        assert!(store.things.is_empty());
    }
}
