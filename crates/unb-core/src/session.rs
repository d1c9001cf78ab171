//! Per (chat, user) conversational state.
//!
//! A session records how far the user got in linking a wallet and which
//! answer, if any, the bot is waiting for. Flow data lives inside the
//! [`Awaiting`] variant so abandoning a flow drops it.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    domain::{AccountId, ChatId, UserId},
    ports::KeyPair,
    Result,
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LinkState {
    #[default]
    Disconnected,
    /// A key pair was generated and the user was sent to the wallet to approve it.
    KeyGenerated { key_pair: KeyPair },
    Connected { account_id: AccountId },
}

/// The answer the bot expects next, together with what the flow collected so far.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Awaiting {
    WalletName,
    ConnectedAccount,

    Recipient,
    Amount { recipient: AccountId },

    NftTitle,
    NftDescription { title: String },
    NftImage { title: String, description: String },

    StoreAddress,

    TransferTokenId,
    TransferReceiver { token_id: String },

    ProposalLink,
    ProposalTagline { link: String },
    ProposalCategory { link: String, tagline: String },
    ProposalId,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub link: LinkState,
    #[serde(default)]
    pub awaiting: Option<Awaiting>,
}

impl Session {
    pub fn account_id(&self) -> Option<&AccountId> {
        match &self.link {
            LinkState::Connected { account_id } => Some(account_id),
            _ => None,
        }
    }

    pub fn generated_key(&self) -> Option<&KeyPair> {
        match &self.link {
            LinkState::KeyGenerated { key_pair } => Some(key_pair),
            _ => None,
        }
    }

    /// Back to a fresh, unlinked session.
    pub fn reset(&mut self) {
        *self = Session::default();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub chat_id: ChatId,
    pub user_id: UserId,
}

impl SessionKey {
    pub fn new(chat_id: ChatId, user_id: UserId) -> Self {
        Self { chat_id, user_id }
    }
}

/// On-disk layout of the session file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFileData {
    saved_at: String,
    sessions: Vec<SessionRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    chat_id: ChatId,
    user_id: UserId,
    session: Session,
}

/// In-memory session map, written through to a JSON file on every change.
#[derive(Debug)]
pub struct SessionStore {
    path: Option<PathBuf>,
    sessions: Mutex<HashMap<SessionKey, Session>>,
}

impl SessionStore {
    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Load `path` if it exists; an empty or missing file gives an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let sessions = load_session_file(&path)?
            .sessions
            .into_iter()
            .map(|r| (SessionKey::new(r.chat_id, r.user_id), r.session))
            .collect::<HashMap<_, _>>();
        debug!(path = %path.display(), count = sessions.len(), "sessions loaded");
        Ok(Self {
            path: Some(path),
            sessions: Mutex::new(sessions),
        })
    }

    pub async fn get(&self, key: SessionKey) -> Session {
        self.sessions
            .lock()
            .await
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }

    /// Mutate one session and persist the result.
    pub async fn update<R>(&self, key: SessionKey, f: impl FnOnce(&mut Session) -> R) -> Result<R> {
        let mut map = self.sessions.lock().await;
        let out = f(map.entry(key).or_default());
        if map.get(&key).is_some_and(|s| *s == Session::default()) {
            map.remove(&key);
        }
        if let Some(path) = &self.path {
            let data = SessionFileData {
                saved_at: Utc::now().to_rfc3339(),
                sessions: map
                    .iter()
                    .map(|(k, s)| SessionRecord {
                        chat_id: k.chat_id,
                        user_id: k.user_id,
                        session: s.clone(),
                    })
                    .collect(),
            };
            save_session_file(path, &data).await?;
        }
        Ok(out)
    }

    pub async fn set_awaiting(&self, key: SessionKey, awaiting: Option<Awaiting>) -> Result<()> {
        self.update(key, |s| s.awaiting = awaiting).await
    }
}

fn load_session_file(path: &Path) -> Result<SessionFileData> {
    if !path.exists() {
        return Ok(SessionFileData::default());
    }
    let txt = std::fs::read_to_string(path)?;
    if txt.trim().is_empty() {
        return Ok(SessionFileData::default());
    }
    Ok(serde_json::from_str(&txt)?)
}

async fn save_session_file(path: &Path, data: &SessionFileData) -> Result<()> {
    let txt = serde_json::to_string(data)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, txt).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
