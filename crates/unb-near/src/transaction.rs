//! Borsh layout of the two transaction actions the bot signs.
//!
//! Only `FunctionCall` (tag 2) and `Transfer` (tag 3) are needed; the tags
//! follow the protocol's `Action` enum, so they are written by hand.

use borsh::{io, BorshSerialize};
use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256};
use unb_core::{errors::Error, Result};

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize)]
pub enum PublicKey {
    Ed25519([u8; 32]),
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize)]
pub enum Signature {
    Ed25519([u8; 64]),
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize)]
pub struct FunctionCallAction {
    pub method_name: String,
    pub args: Vec<u8>,
    pub gas: u64,
    pub deposit: u128,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    FunctionCall(FunctionCallAction),
    Transfer { deposit: u128 },
}

impl BorshSerialize for Action {
    fn serialize<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            Action::FunctionCall(call) => {
                2u8.serialize(writer)?;
                call.serialize(writer)
            }
            Action::Transfer { deposit } => {
                3u8.serialize(writer)?;
                deposit.serialize(writer)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize)]
pub struct Transaction {
    pub signer_id: String,
    pub public_key: PublicKey,
    pub nonce: u64,
    pub receiver_id: String,
    pub block_hash: [u8; 32],
    pub actions: Vec<Action>,
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub signature: Signature,
}

impl Transaction {
    /// sha256 of the borsh encoding; also the transaction hash on chain.
    pub fn hash(&self) -> Result<[u8; 32]> {
        let bytes = borsh::to_vec(self)
            .map_err(|e| Error::External(format!("borsh encode failed: {e}")))?;
        Ok(Sha256::digest(bytes).into())
    }

    pub fn sign(self, key: &SigningKey) -> Result<(SignedTransaction, [u8; 32])> {
        let hash = self.hash()?;
        let signature = key.sign(&hash);
        Ok((
            SignedTransaction {
                transaction: self,
                signature: Signature::Ed25519(signature.to_bytes()),
            },
            hash,
        ))
    }
}

impl SignedTransaction {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        borsh::to_vec(self).map_err(|e| Error::External(format!("borsh encode failed: {e}")))
    }
}
