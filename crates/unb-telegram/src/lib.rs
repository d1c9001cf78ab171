//! Telegram adapter (teloxide).
//!
//! This crate implements the `unb-core` MessagingPort over the Telegram Bot API
//! and turns teloxide updates into core `IncomingUpdate`s.

use async_trait::async_trait;

use teloxide::{
    net::Download,
    prelude::*,
    types::{
        ChatMemberKind, ForceReply, InlineKeyboardButton, InlineKeyboardMarkup, InputFile,
        ParseMode,
    },
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use unb_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    formatting::truncate_text,
    messaging::{
        port::MessagingPort,
        types::{ChatAction, InlineButton, InlineKeyboard, PhotoSource},
    },
    Result,
};

/// Telegram rejects longer photo captions.
const MAX_CAPTION_CHARS: usize = 1024 - 3;

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn tg_user(user_id: UserId) -> teloxide::types::UserId {
        teloxide::types::UserId(user_id.0 as u64)
    }

    fn msg_ref(chat_id: ChatId, msg: &Message) -> MessageRef {
        MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        }
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

fn tg_keyboard(keyboard: InlineKeyboard) -> Result<InlineKeyboardMarkup> {
    let mut rows = Vec::with_capacity(keyboard.rows.len());
    for row in keyboard.rows {
        let mut out = Vec::with_capacity(row.len());
        for button in row {
            out.push(match button {
                InlineButton::Callback { label, data } => {
                    InlineKeyboardButton::callback(label, data)
                }
                InlineButton::Url { label, url } => {
                    let url = reqwest::Url::parse(&url).map_err(|e| {
                        Error::InvalidInput(format!("button {label:?} has a bad url {url:?}: {e}"))
                    })?;
                    InlineKeyboardButton::url(label, url)
                }
            });
        }
        rows.push(out);
    }
    Ok(InlineKeyboardMarkup::new(rows))
}

fn tg_photo(photo: PhotoSource) -> Result<InputFile> {
    Ok(match photo {
        PhotoSource::FileId(id) => InputFile::file_id(id),
        PhotoSource::Url(url) => InputFile::url(
            reqwest::Url::parse(&url)
                .map_err(|e| Error::InvalidInput(format!("bad photo url {url:?}: {e}")))?,
        ),
    })
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| self.bot.send_message(Self::tg_chat(chat_id), text.to_string()))
            .await?;
        Ok(Self::msg_ref(chat_id, &msg))
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), html.to_string())
                    .parse_mode(ParseMode::Html)
            })
            .await?;
        Ok(Self::msg_ref(chat_id, &msg))
    }

    async fn send_prompt(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), text.to_string())
                    .reply_markup(ForceReply::new())
            })
            .await?;
        Ok(Self::msg_ref(chat_id, &msg))
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        let markup = tg_keyboard(keyboard)?;
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), html.to_string())
                    .parse_mode(ParseMode::Html)
                    .reply_markup(markup.clone())
            })
            .await?;
        Ok(Self::msg_ref(chat_id, &msg))
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: PhotoSource,
        caption: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef> {
        let file = tg_photo(photo)?;
        let markup = keyboard.map(tg_keyboard).transpose()?;
        let caption = truncate_text(caption, MAX_CAPTION_CHARS);
        let msg = self
            .with_retry(|| {
                let mut req = self
                    .bot
                    .send_photo(Self::tg_chat(chat_id), file.clone())
                    .caption(caption.clone());
                if let Some(m) = &markup {
                    req = req.reply_markup(m.clone());
                }
                req
            })
            .await?;
        Ok(Self::msg_ref(chat_id, &msg))
    }

    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot.edit_message_text(
                Self::tg_chat(msg.chat_id),
                Self::tg_msg_id(msg.message_id),
                text.to_string(),
            )
        })
        .await?;
        Ok(())
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .delete_message(Self::tg_chat(msg.chat_id), Self::tg_msg_id(msg.message_id))
        })
        .await?;
        Ok(())
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        let tg_action = match action {
            ChatAction::Typing => teloxide::types::ChatAction::Typing,
            ChatAction::UploadPhoto => teloxide::types::ChatAction::UploadPhoto,
        };
        self.with_retry(|| self.bot.send_chat_action(Self::tg_chat(chat_id), tg_action))
            .await?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.with_retry(|| {
            let mut req = self.bot.answer_callback_query(callback_id.to_string());
            if let Some(t) = text {
                req = req.text(t.to_string());
            }
            req
        })
        .await?;
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        let file = self
            .with_retry(|| self.bot.get_file(file_id.to_string()))
            .await?;
        let mut buf = Vec::with_capacity(file.meta.size as usize);
        self.bot
            .download_file(&file.path, &mut buf)
            .await
            .map_err(|e| Error::External(format!("telegram download error: {e}")))?;
        Ok(buf)
    }

    async fn is_chat_admin(&self, chat_id: ChatId, user_id: UserId) -> Result<bool> {
        let admins = self
            .with_retry(|| self.bot.get_chat_administrators(Self::tg_chat(chat_id)))
            .await?;
        let uid = Self::tg_user(user_id);
        Ok(admins.iter().any(|m| {
            m.user.id == uid
                && matches!(m.kind, ChatMemberKind::Owner(_) | ChatMemberKind::Administrator(_))
        }))
    }

    async fn remove_member(&self, chat_id: ChatId, user_id: UserId) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .ban_chat_member(Self::tg_chat(chat_id), Self::tg_user(user_id))
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyboard_rows_are_preserved() {
        let kb = InlineKeyboard::one_per_row(vec![
            InlineButton::url(
                "View in Explorer",
                "https://explorer.testnet.near.org/transactions/H",
            ),
            InlineButton::callback("Check Connection", "connecting"),
        ]);
        let markup = tg_keyboard(kb).unwrap();
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0][0].text, "View in Explorer");
        assert_eq!(markup.inline_keyboard[1][0].text, "Check Connection");
    }

    #[test]
    fn bad_button_url_is_rejected() {
        let kb = InlineKeyboard::single(InlineButton::url("Broken", "not a url"));
        assert!(matches!(tg_keyboard(kb), Err(Error::InvalidInput(_))));
        assert!(tg_photo(PhotoSource::Url("::".to_string())).is_err());
        assert!(tg_photo(PhotoSource::FileId("AgAD".to_string())).is_ok());
    }
}
