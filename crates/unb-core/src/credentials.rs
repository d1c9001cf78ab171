//! File-backed credential records.
//!
//! Layout: `<root>/<network>/<username>_<account>.json`, one file per linked
//! (network, user, account) triple, containing the account id and the key pair
//! the bot generated for it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{domain::AccountId, errors::Error, ports::KeyPair, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub account_id: AccountId,
    pub public_key: String,
    pub private_key: String,
}

impl Credential {
    pub fn new(account_id: AccountId, key_pair: &KeyPair) -> Self {
        Self {
            account_id,
            public_key: key_pair.public_key.clone(),
            private_key: key_pair.secret_key.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CredentialStore {
    root: PathBuf,
    network_id: String,
}

impl CredentialStore {
    pub fn new(root: impl Into<PathBuf>, network_id: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            network_id: network_id.into(),
        }
    }

    pub fn network_dir(&self) -> PathBuf {
        self.root.join(&self.network_id)
    }

    fn path_for(&self, username: &str, account_id: &AccountId) -> Result<PathBuf> {
        validate_username(username, &self.network_dir())?;
        Ok(self
            .network_dir()
            .join(format!("{username}_{account_id}.json")))
    }

    pub async fn load(&self, username: &str, account_id: &AccountId) -> Result<Option<Credential>> {
        let path = self.path_for(username, account_id)?;
        let txt = match tokio::fs::read_to_string(&path).await {
            Ok(txt) => txt,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };
        if txt.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&txt)?))
    }

    pub async fn save(&self, username: &str, credential: &Credential) -> Result<()> {
        let path = self.path_for(username, &credential.account_id)?;
        tokio::fs::create_dir_all(self.network_dir()).await?;
        let txt = serde_json::to_string(credential)?;
        tokio::fs::write(&path, txt).await?;
        debug!(path = %path.display(), "credential saved");
        Ok(())
    }

    /// Accounts this user has ever linked on the configured network.
    pub async fn accounts_for_user(&self, username: &str) -> Result<Vec<AccountId>> {
        validate_username(username, &self.network_dir())?;
        let prefix = format!("{username}_");

        let mut out = Vec::new();
        for (file_name, path) in self.list_files().await? {
            let Some(rest) = file_name.strip_prefix(&prefix) else {
                continue;
            };
            let Some(account) = rest.strip_suffix(".json") else {
                continue;
            };
            // Usernames may contain `_`, so confirm against the record itself.
            match read_record(&path).await {
                Some(cred) if cred.account_id.as_str() == account => out.push(cred.account_id),
                _ => continue,
            }
        }
        out.sort();
        Ok(out)
    }

    /// Reverse lookup: which local user linked `account_id`.
    pub async fn username_for_account(&self, account_id: &AccountId) -> Result<Option<String>> {
        let suffix = format!("_{account_id}.json");
        let mut names: Vec<String> = self
            .list_files()
            .await?
            .into_iter()
            .filter_map(|(name, _)| name.strip_suffix(&suffix).map(str::to_string))
            .filter(|name| !name.is_empty())
            .collect();
        names.sort();
        Ok(names.into_iter().next())
    }

    async fn list_files(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut rd = match tokio::fs::read_dir(self.network_dir()).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };
        let mut out = Vec::new();
        while let Some(ent) = rd.next_entry().await? {
            let name = ent.file_name().to_string_lossy().to_string();
            if name.ends_with(".json") {
                out.push((name, ent.path()));
            }
        }
        Ok(out)
    }
}

async fn read_record(path: &Path) -> Option<Credential> {
    let txt = tokio::fs::read_to_string(path).await.ok()?;
    serde_json::from_str(&txt).ok()
}

fn validate_username(username: &str, dir: &Path) -> Result<()> {
    let ok = !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        return Ok(());
    }
    Err(Error::InvalidPath {
        path: dir.join(username),
        reason: "username must be alphanumeric or '_'".to_string(),
    })
}
