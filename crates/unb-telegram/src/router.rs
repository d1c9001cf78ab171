use std::{collections::HashMap, sync::Arc};

use teloxide::{
    dispatching::Dispatcher,
    dptree,
    prelude::*,
    types::BotCommand,
    update_listeners::webhooks,
};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use unb_core::{
    commands::MENU,
    config::Config,
    dispatcher,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    ports::Backends,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<dispatcher::Dispatcher>,
    pub chat_locks: Arc<ChatLocks>,
    pub bot_username: String,
}

/// One lock per chat so a user's prompt answers are handled in order.
#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

fn menu_commands() -> Vec<BotCommand> {
    MENU.iter()
        .map(|(name, description)| BotCommand::new(*name, *description))
        .collect()
}

/// Connect to Telegram and serve updates until shutdown.
///
/// Uses a webhook when `WEBHOOK_URL` is configured, long polling otherwise.
pub async fn run(cfg: Config, backends: Backends) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let me = bot.get_me().await?;
    let bot_username = me.username().to_string();
    info!(bot = %bot_username, network = %cfg.near.network_id, "useNear bot starting");

    if let Err(e) = bot.set_my_commands(menu_commands()).await {
        warn!(error = %e, "failed to register the command menu");
    }

    // Throttle outbound calls; the adapter still retries a single 429.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let webhook_url = cfg.webhook_url.clone();
    let listen_addr = cfg.listen_addr;
    let core = dispatcher::Dispatcher::new(cfg, messenger, backends, bot_username.clone())?;

    let state = Arc::new(AppState {
        dispatcher: Arc::new(core),
        chat_locks: Arc::new(ChatLocks::default()),
        bot_username,
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    let mut tg = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build();

    match webhook_url {
        Some(url) => {
            let url: reqwest::Url = url.parse()?;
            info!(%url, addr = %listen_addr, "serving webhook");
            let listener = webhooks::axum(bot, webhooks::Options::new(listen_addr, url)).await?;
            tg.dispatch_with_listener(
                listener,
                LoggingErrorHandler::with_custom_text("webhook listener error"),
            )
            .await;
        }
        None => {
            info!("long polling");
            tg.dispatch().await;
        }
    }

    info!("useNear bot stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_millis(50);

    #[test]
    fn menu_is_registered_in_order() {
        let cmds = menu_commands();
        assert_eq!(cmds.len(), MENU.len());
        assert_eq!(cmds[0].command, "start");
        assert!(cmds.iter().any(|c| c.command == "flex"));
    }

    #[tokio::test]
    async fn chat_locks_serialize_one_chat_only() {
        let locks = ChatLocks::default();
        let held = locks.lock_chat(1).await;

        // Another chat is not blocked.
        let other = timeout(WAIT, locks.lock_chat(2)).await;
        assert!(other.is_ok());

        // The same chat waits until the first guard drops.
        let same = timeout(WAIT, locks.lock_chat(1)).await;
        assert!(same.is_err());

        drop(held);
        let again = timeout(WAIT, locks.lock_chat(1)).await;
        assert!(again.is_ok());
    }
}
