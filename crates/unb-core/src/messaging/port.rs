use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef, UserId},
    messaging::types::{ChatAction, InlineKeyboard, PhotoSource},
    Result,
};

/// Chat transport port.
///
/// Every outbound effect of the dispatcher goes through this trait, which keeps
/// the conversational logic testable without a Telegram connection.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;

    /// Send `text` with a force-reply markup so the user's answer is a reply to it.
    async fn send_prompt(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef>;

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: PhotoSource,
        caption: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef>;

    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<()>;
    async fn delete_message(&self, msg: MessageRef) -> Result<()>;

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()>;

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()>;

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>>;

    async fn is_chat_admin(&self, chat_id: ChatId, user_id: UserId) -> Result<bool>;

    /// Remove a member from a group (Telegram "ban" with no expiry).
    async fn remove_member(&self, chat_id: ChatId, user_id: UserId) -> Result<()>;
}
