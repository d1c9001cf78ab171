use std::fmt;

use serde::{Deserialize, Serialize};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// NEAR account id (`alice.testnet`, `near-week.sputnikv2.testnet`, implicit hex ids).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Validates the NEAR account id rules: 2..=64 chars of `a-z0-9`, separated by
    /// single `.`, `-` or `_`.
    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim();
        if s.len() < 2 || s.len() > 64 {
            return None;
        }
        let mut prev_separator = true;
        for c in s.chars() {
            match c {
                'a'..='z' | '0'..='9' => prev_separator = false,
                '.' | '-' | '_' => {
                    if prev_separator {
                        return None;
                    }
                    prev_separator = true;
                }
                _ => return None,
            }
        }
        if prev_separator {
            return None;
        }
        Some(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    pub fn is_group(self) -> bool {
        matches!(self, ChatKind::Group | ChatKind::Supergroup)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chat {
    pub id: ChatId,
    pub kind: ChatKind,
}

/// The Telegram user behind an update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sender {
    pub id: UserId,
    pub username: Option<String>,
    pub is_bot: bool,
}

impl Sender {
    /// Name used to key credential files and to address the user in groups.
    ///
    /// Users without a public username fall back to their numeric id.
    pub fn handle(&self) -> String {
        match &self.username {
            Some(u) if !u.trim().is_empty() => u.clone(),
            _ => format!("id{}", self.id.0),
        }
    }

    pub fn mention(&self) -> String {
        match &self.username {
            Some(u) if !u.trim().is_empty() => format!("@{u}"),
            _ => format!("@{}", self.id.0),
        }
    }
}
