//! NEAR adapter: JSON-RPC reads and locally signed transactions.
//!
//! Implements `ChainClient` and `AccountHandle` from `unb-core`. Keys never
//! leave the process; transactions are borsh-encoded, signed with ed25519 and
//! submitted with `broadcast_tx_commit`.

pub mod keys;
pub mod rpc;
pub mod transaction;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::SigningKey;
use serde_json::Value;
use tracing::info;
use unb_core::{
    credentials::Credential,
    domain::AccountId,
    errors::Error,
    ports::{AccountHandle, ChainClient, FunctionCall, KeyPair, TxOutcome},
    Result,
};

use crate::{
    rpc::{decode_json_bytes, RpcClient},
    transaction::{Action, FunctionCallAction, PublicKey, Transaction},
};

#[derive(Clone, Debug)]
pub struct NearClient {
    network_id: String,
    rpc: RpcClient,
}

impl NearClient {
    pub fn new(
        network_id: impl Into<String>,
        rpc_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            network_id: network_id.into(),
            rpc: RpcClient::new(rpc_url, timeout)?,
        })
    }
}

#[async_trait]
impl ChainClient for NearClient {
    fn network_id(&self) -> &str {
        &self.network_id
    }

    fn generate_key_pair(&self) -> Result<KeyPair> {
        Ok(keys::generate())
    }

    async fn access_keys(&self, account_id: &AccountId) -> Result<Vec<String>> {
        self.rpc.view_access_key_list(account_id.as_str()).await
    }

    async fn view(&self, contract_id: &AccountId, method: &str, args: Value) -> Result<Value> {
        self.rpc
            .call_function(contract_id.as_str(), method, &args)
            .await
    }

    fn connect(&self, credential: &Credential) -> Result<Arc<dyn AccountHandle>> {
        let key = keys::parse_secret_key(&credential.private_key)?;
        let stored = keys::parse_public_key(&credential.public_key)?;
        if stored != key.verifying_key() {
            return Err(Error::InvalidInput(format!(
                "credential for {} holds a public key that does not match its secret",
                credential.account_id
            )));
        }
        let account: Arc<dyn AccountHandle> = Arc::new(NearAccount {
            account_id: credential.account_id.clone(),
            public_key: keys::encode_public(&stored),
            key,
            rpc: self.rpc.clone(),
        });
        Ok(account)
    }
}

/// Signs for one account with one full-access key.
pub struct NearAccount {
    account_id: AccountId,
    public_key: String,
    key: SigningKey,
    rpc: RpcClient,
}

impl NearAccount {
    async fn sign_and_send(
        &self,
        receiver_id: &AccountId,
        actions: Vec<Action>,
    ) -> Result<TxOutcome> {
        let access = self
            .rpc
            .view_access_key(self.account_id.as_str(), &self.public_key)
            .await?;

        let tx = Transaction {
            signer_id: self.account_id.as_str().to_string(),
            public_key: PublicKey::Ed25519(self.key.verifying_key().to_bytes()),
            nonce: access.nonce + 1,
            receiver_id: receiver_id.as_str().to_string(),
            block_hash: access.block_hash,
            actions,
        };
        let (signed, hash) = tx.sign(&self.key)?;
        let result = self.rpc.broadcast_tx_commit(&signed.to_bytes()?).await?;
        let outcome = parse_outcome(&result, &hash)?;
        info!(
            signer = %self.account_id,
            receiver = %receiver_id,
            tx = %outcome.hash,
            "transaction committed"
        );
        Ok(outcome)
    }
}

#[async_trait]
impl AccountHandle for NearAccount {
    fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    async fn balance(&self) -> Result<u128> {
        self.rpc.view_account(self.account_id.as_str()).await
    }

    async fn send_money(&self, receiver_id: &AccountId, amount: u128) -> Result<TxOutcome> {
        self.sign_and_send(receiver_id, vec![Action::Transfer { deposit: amount }])
            .await
    }

    async fn call(&self, call: FunctionCall) -> Result<TxOutcome> {
        let action = Action::FunctionCall(FunctionCallAction {
            method_name: call.method,
            args: serde_json::to_vec(&call.args)?,
            gas: call.gas,
            deposit: call.deposit,
        });
        self.sign_and_send(&call.contract_id, vec![action]).await
    }
}

/// Read the final execution outcome of `broadcast_tx_commit`.
fn parse_outcome(result: &Value, local_hash: &[u8; 32]) -> Result<TxOutcome> {
    let hash = result
        .pointer("/transaction/hash")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| bs58::encode(local_hash).into_string());

    let status = result
        .get("status")
        .ok_or_else(|| Error::External(format!("transaction {hash}: missing status")))?;
    if let Some(failure) = status.get("Failure") {
        return Err(Error::External(format!("transaction {hash} failed: {failure}")));
    }

    let value = match status.get("SuccessValue").and_then(Value::as_str) {
        Some(b64) => {
            let bytes = BASE64.decode(b64).map_err(|e| {
                Error::External(format!("transaction {hash}: bad return value: {e}"))
            })?;
            decode_json_bytes(&bytes)?
        }
        None => Value::Null,
    };
    Ok(TxOutcome { hash, value })
}
