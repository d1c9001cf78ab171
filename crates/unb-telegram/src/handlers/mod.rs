//! Telegram update handlers.
//!
//! Each handler converts a teloxide update into a core `IncomingUpdate`,
//! serializes it per chat and hands it to the core dispatcher. Errors are
//! logged; Telegram never sees a failed handler.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message, User},
};
use tracing::{debug, error};

use unb_core::{
    commands::parse_command,
    domain::{Chat, ChatId, ChatKind, MessageId, MessageRef, Sender, UserId},
    messaging::types::{self, CommandMessage, IncomingUpdate, MembershipChange, ReplyMessage},
};

use crate::router::AppState;

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    let cb = callback_update(&q);
    let _guard = state.chat_locks.lock_chat(cb.chat.id.0).await;
    run(&state, IncomingUpdate::Callback(cb)).await;
    Ok(())
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(update) = classify_message(&msg, &state.bot_username) else {
        debug!(chat_id = msg.chat.id.0, "ignoring message");
        return Ok(());
    };
    let _guard = state.chat_locks.lock_chat(msg.chat.id.0).await;
    run(&state, update).await;
    Ok(())
}

async fn run(state: &AppState, update: IncomingUpdate) {
    if let Err(e) = state.dispatcher.dispatch(update).await {
        error!(error = %e, "update handling failed");
    }
}

fn chat_of(msg: &Message) -> Chat {
    let kind = if msg.chat.is_private() {
        ChatKind::Private
    } else if msg.chat.is_supergroup() {
        ChatKind::Supergroup
    } else if msg.chat.is_group() {
        ChatKind::Group
    } else {
        ChatKind::Channel
    };
    Chat {
        id: ChatId(msg.chat.id.0),
        kind,
    }
}

fn sender_of(user: &User) -> Sender {
    Sender {
        id: UserId(user.id.0 as i64),
        username: user.username.clone(),
        is_bot: user.is_bot,
    }
}

fn msg_ref(msg: &Message) -> MessageRef {
    MessageRef {
        chat_id: ChatId(msg.chat.id.0),
        message_id: MessageId(msg.id.0),
    }
}

/// Map a message to the update the core understands, or `None` to ignore it.
///
/// Only commands, replies (the answers to force-reply prompts) and
/// membership changes matter; plain chatter is dropped.
pub fn classify_message(msg: &Message, bot_username: &str) -> Option<IncomingUpdate> {
    let chat = chat_of(msg);

    if let Some(members) = msg.new_chat_members() {
        return Some(IncomingUpdate::MembersJoined(MembershipChange {
            chat,
            members: members.iter().map(sender_of).collect(),
        }));
    }
    if let Some(left) = msg.left_chat_member() {
        return Some(IncomingUpdate::MemberLeft(MembershipChange {
            chat,
            members: vec![sender_of(left)],
        }));
    }

    let from = msg.from().map(sender_of)?;
    if from.is_bot {
        return None;
    }

    if let Some(text) = msg.text() {
        if text.starts_with('/') {
            let (name, args) = parse_command(text, bot_username)?;
            return Some(IncomingUpdate::Command(CommandMessage {
                chat,
                from,
                message: msg_ref(msg),
                name,
                args,
            }));
        }
    }

    let reply_to = msg.reply_to_message()?;
    Some(IncomingUpdate::Reply(ReplyMessage {
        chat,
        from,
        message: msg_ref(msg),
        reply_to: msg_ref(reply_to),
        reply_to_text: reply_to.text().map(str::to_string),
        text: msg.text().or_else(|| msg.caption()).map(str::to_string),
        photo_file_id: msg
            .photo()
            .and_then(|sizes| sizes.last())
            .map(|p| p.file.id.clone()),
    }))
}

pub fn callback_update(q: &CallbackQuery) -> types::CallbackQuery {
    let from = sender_of(&q.from);
    // Inline-mode callbacks carry no message; treat them as the user's private chat.
    let chat = q.message.as_ref().map(chat_of).unwrap_or(Chat {
        id: ChatId(from.id.0),
        kind: ChatKind::Private,
    });
    types::CallbackQuery {
        chat,
        from,
        callback_id: q.id.clone(),
        data: q.data.clone().unwrap_or_default(),
        message: q.message.as_ref().map(msg_ref),
        message_text: q
            .message
            .as_ref()
            .and_then(|m| m.text())
            .map(str::to_string),
    }
}
