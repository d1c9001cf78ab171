//! ed25519 keys in NEAR's `ed25519:<base58>` text form.
//!
//! Secret keys are encoded as the 64-byte keypair (secret ‖ public), the same
//! layout wallet tooling writes to credential files.

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use unb_core::{errors::Error, ports::KeyPair, Result};

const PREFIX: &str = "ed25519:";

pub fn generate() -> KeyPair {
    let signing = SigningKey::generate(&mut OsRng);
    KeyPair {
        public_key: encode_public(&signing.verifying_key()),
        secret_key: encode_secret(&signing),
    }
}

pub fn encode_public(key: &VerifyingKey) -> String {
    format!("{PREFIX}{}", bs58::encode(key.as_bytes()).into_string())
}

pub fn encode_secret(key: &SigningKey) -> String {
    format!("{PREFIX}{}", bs58::encode(key.to_keypair_bytes()).into_string())
}

fn decode(s: &str, what: &str) -> Result<Vec<u8>> {
    let body = s
        .trim()
        .strip_prefix(PREFIX)
        .ok_or_else(|| Error::InvalidInput(format!("{what} must start with {PREFIX}")))?;
    bs58::decode(body)
        .into_vec()
        .map_err(|e| Error::InvalidInput(format!("{what} is not base58: {e}")))
}

pub fn parse_public_key(s: &str) -> Result<VerifyingKey> {
    let bytes: [u8; 32] = decode(s, "public key")?
        .try_into()
        .map_err(|_| Error::InvalidInput("public key must be 32 bytes".to_string()))?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| Error::InvalidInput(format!("invalid ed25519 public key: {e}")))
}

/// Accepts the 64-byte keypair form and the bare 32-byte seed.
pub fn parse_secret_key(s: &str) -> Result<SigningKey> {
    let bytes = decode(s, "secret key")?;
    match bytes.len() {
        64 => {
            let mut kp = [0u8; 64];
            kp.copy_from_slice(&bytes);
            SigningKey::from_keypair_bytes(&kp)
                .map_err(|e| Error::InvalidInput(format!("invalid ed25519 keypair: {e}")))
        }
        32 => {
            let mut seed = [0u8; 32];
            seed.copy_from_slice(&bytes);
            Ok(SigningKey::from_bytes(&seed))
        }
        n => Err(Error::InvalidInput(format!(
            "secret key must be 32 or 64 bytes, got {n}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_pair_parses_back() {
        let kp = generate();
        assert!(kp.public_key.starts_with("ed25519:"));

        let sk = parse_secret_key(&kp.secret_key).unwrap();
        let pk = parse_public_key(&kp.public_key).unwrap();
        assert_eq!(sk.verifying_key(), pk);
        assert_eq!(encode_public(&pk), kp.public_key);
    }

    #[test]
    fn seed_form_is_accepted() {
        let seed = [7u8; 32];
        let s = format!("ed25519:{}", bs58::encode(seed).into_string());
        let sk = parse_secret_key(&s).unwrap();
        assert_eq!(sk.to_bytes(), seed);
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(parse_public_key("secp256k1:abc").is_err());
        assert!(parse_public_key("ed25519:0OIl").is_err());
        assert!(parse_secret_key("ed25519:3mJr7AoUXx2Wqd").is_err());
    }
}
