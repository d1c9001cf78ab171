//! Group chat → Mintbase store bindings.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::{domain::ChatId, Result};

#[derive(Debug, Serialize, Deserialize)]
struct GroupRecord {
    chat_id: ChatId,
    store_id: String,
}

/// Each group is bound to at most one store, once.
#[derive(Debug)]
pub struct GroupBindings {
    path: Option<PathBuf>,
    stores: RwLock<HashMap<ChatId, String>>,
}

impl GroupBindings {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            stores: RwLock::new(HashMap::new()),
        }
    }

    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let stores = read_records(&path)?
            .into_iter()
            .map(|r| (r.chat_id, r.store_id))
            .collect();
        Ok(Self {
            path: Some(path),
            stores: RwLock::new(stores),
        })
    }

    pub async fn get(&self, chat_id: ChatId) -> Option<String> {
        self.stores.read().await.get(&chat_id).cloned()
    }

    /// Bind `store_id` to the chat. Returns `false` (and changes nothing) when
    /// the chat already has a store.
    pub async fn bind(&self, chat_id: ChatId, store_id: &str) -> Result<bool> {
        let mut stores = self.stores.write().await;
        if stores.contains_key(&chat_id) {
            return Ok(false);
        }
        stores.insert(chat_id, store_id.to_string());
        info!(chat_id = chat_id.0, store_id, "group bound to store");

        if let Some(path) = &self.path {
            let records: Vec<GroupRecord> = stores
                .iter()
                .map(|(c, s)| GroupRecord {
                    chat_id: *c,
                    store_id: s.clone(),
                })
                .collect();
            let txt = serde_json::to_string(&records)?;
            tokio::fs::write(path, txt).await?;
        }
        Ok(true)
    }
}

fn read_records(path: &Path) -> Result<Vec<GroupRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let txt = std::fs::read_to_string(path)?;
    if txt.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&txt)?)
}
