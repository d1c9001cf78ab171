use crate::domain::{Chat, MessageRef, Sender};

/// Inbound update, already classified by the transport adapter.
#[derive(Clone, Debug)]
pub enum IncomingUpdate {
    Command(CommandMessage),
    Reply(ReplyMessage),
    Callback(CallbackQuery),
    MembersJoined(MembershipChange),
    MemberLeft(MembershipChange),
}

#[derive(Clone, Debug)]
pub struct CommandMessage {
    pub chat: Chat,
    pub from: Sender,
    pub message: MessageRef,
    /// Lowercased command name without `/` and `@botname`.
    pub name: String,
    pub args: String,
}

/// A message sent as a reply to an earlier message.
#[derive(Clone, Debug)]
pub struct ReplyMessage {
    pub chat: Chat,
    pub from: Sender,
    pub message: MessageRef,
    pub reply_to: MessageRef,
    pub reply_to_text: Option<String>,
    pub text: Option<String>,
    /// Largest available size of an attached photo.
    pub photo_file_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CallbackQuery {
    pub chat: Chat,
    pub from: Sender,
    pub callback_id: String,
    pub data: String,
    pub message: Option<MessageRef>,
    pub message_text: Option<String>,
}

#[derive(Clone, Debug)]
pub struct MembershipChange {
    pub chat: Chat,
    pub members: Vec<Sender>,
}

/// Outgoing "chat action" (typing indicator, etc).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatAction {
    Typing,
    UploadPhoto,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InlineButton {
    Callback { label: String, data: String },
    Url { label: String, url: String },
}

impl InlineButton {
    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Callback {
            label: label.into(),
            data: data.into(),
        }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self::Url {
            label: label.into(),
            url: url.into(),
        }
    }
}

/// Inline keyboard (rows of buttons).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    /// Convenience for "one button per row" layouts, the only layout the bot uses.
    pub fn one_per_row(buttons: Vec<InlineButton>) -> Self {
        Self {
            rows: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }

    pub fn single(button: InlineButton) -> Self {
        Self::one_per_row(vec![button])
    }

    pub fn buttons(&self) -> impl Iterator<Item = &InlineButton> {
        self.rows.iter().flatten()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhotoSource {
    /// A file already on Telegram's servers.
    FileId(String),
    Url(String),
}
