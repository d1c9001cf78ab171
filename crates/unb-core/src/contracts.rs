//! Typed wrappers over the two contracts the bot talks to: an NEP-171 NFT
//! contract and a Sputnik v2 DAO.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::{
    amount::{ONE_NEAR, ONE_YOCTO},
    domain::AccountId,
    errors::Error,
    ports::{AccountHandle, ChainClient, FunctionCall, TxOutcome},
    Result,
};

/// 30 Tgas, the default attached gas for function calls.
pub const DEFAULT_GAS: u64 = 30_000_000_000_000;

/// Storage deposit attached to `nft_mint` (0.01 NEAR).
pub const MINT_DEPOSIT: u128 = ONE_NEAR / 100;

/// Bond attached to `add_proposal`, and the amount of the proposal's transfer.
pub const PROPOSAL_BOND: u128 = ONE_NEAR;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct TokenMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub media: Option<String>,
    #[serde(default)]
    pub copies: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct NftToken {
    pub token_id: String,
    pub owner_id: String,
    #[serde(default)]
    pub metadata: TokenMetadata,
}

#[derive(Clone, Debug)]
pub struct MintRequest {
    pub token_id: String,
    pub receiver_id: AccountId,
    pub title: String,
    pub description: String,
    pub media: String,
}

#[derive(Clone)]
pub struct NftContract {
    chain: Arc<dyn ChainClient>,
    contract_id: AccountId,
}

impl NftContract {
    pub fn new(chain: Arc<dyn ChainClient>, contract_id: AccountId) -> Self {
        Self { chain, contract_id }
    }

    pub async fn tokens_for_owner(&self, owner: &AccountId) -> Result<Vec<NftToken>> {
        let v = self
            .chain
            .view(
                &self.contract_id,
                "nft_tokens_for_owner",
                json!({ "account_id": owner }),
            )
            .await?;
        Ok(serde_json::from_value(v)?)
    }

    /// Mint one copy; returns the minted token when the contract echoes it back.
    pub async fn mint(
        &self,
        account: &dyn AccountHandle,
        req: MintRequest,
    ) -> Result<Option<NftToken>> {
        let out = account
            .call(FunctionCall {
                contract_id: self.contract_id.clone(),
                method: "nft_mint".to_string(),
                args: json!({
                    "token_id": req.token_id,
                    "receiver_id": req.receiver_id,
                    "token_metadata": {
                        "title": req.title,
                        "description": req.description,
                        "media": req.media,
                        "copies": 1
                    }
                }),
                gas: DEFAULT_GAS,
                deposit: MINT_DEPOSIT,
            })
            .await?;
        if out.value.is_null() {
            return Ok(None);
        }
        Ok(serde_json::from_value(out.value).ok())
    }

    pub async fn transfer(
        &self,
        account: &dyn AccountHandle,
        receiver_id: &AccountId,
        token_id: &str,
    ) -> Result<TxOutcome> {
        account
            .call(FunctionCall {
                contract_id: self.contract_id.clone(),
                method: "nft_transfer".to_string(),
                args: json!({
                    "token_id": token_id,
                    "receiver_id": receiver_id,
                    "memo": "transfer ownership"
                }),
                gas: DEFAULT_GAS,
                deposit: ONE_YOCTO,
            })
            .await
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Proposal {
    pub id: u64,
    pub proposer: String,
    pub description: String,
    /// `"InProgress"`, `"Approved"`, …
    #[serde(default)]
    pub status: serde_json::Value,
}

impl Proposal {
    pub fn status_label(&self) -> String {
        match &self.status {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => "Unknown".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct DaoContract {
    chain: Arc<dyn ChainClient>,
    contract_id: AccountId,
}

impl DaoContract {
    pub fn new(chain: Arc<dyn ChainClient>, contract_id: AccountId) -> Self {
        Self { chain, contract_id }
    }

    pub async fn last_proposal_id(&self) -> Result<u64> {
        let v = self
            .chain
            .view(&self.contract_id, "get_last_proposal_id", json!({}))
            .await?;
        v.as_u64().ok_or_else(|| {
            Error::External(format!("get_last_proposal_id returned non-integer: {v}"))
        })
    }

    /// Every proposal, from index 0 up to the last id.
    pub async fn all_proposals(&self) -> Result<Vec<Proposal>> {
        let limit = self.last_proposal_id().await?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let v = self
            .chain
            .view(
                &self.contract_id,
                "get_proposals",
                json!({ "from_index": 0, "limit": limit }),
            )
            .await?;
        Ok(serde_json::from_value(v)?)
    }

    pub async fn proposal(&self, id: u64) -> Result<Proposal> {
        let v = self
            .chain
            .view(&self.contract_id, "get_proposal", json!({ "id": id }))
            .await?;
        Ok(serde_json::from_value(v)?)
    }

    /// Submit a Transfer proposal of 1 NEAR to the proposer; returns the new id.
    pub async fn add_proposal(
        &self,
        account: &dyn AccountHandle,
        description: &str,
    ) -> Result<u64> {
        let out = account
            .call(FunctionCall {
                contract_id: self.contract_id.clone(),
                method: "add_proposal".to_string(),
                args: json!({
                    "proposal": {
                        "description": description,
                        "kind": {
                            "Transfer": {
                                "token_id": "",
                                "receiver_id": account.account_id(),
                                "amount": PROPOSAL_BOND.to_string()
                            }
                        }
                    }
                }),
                gas: DEFAULT_GAS,
                deposit: PROPOSAL_BOND,
            })
            .await?;
        out.value.as_u64().ok_or_else(|| {
            Error::External(format!("add_proposal returned non-integer: {}", out.value))
        })
    }
}
