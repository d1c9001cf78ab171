//! Group membership gating.
//!
//! A user joining a group is kept only if they linked a wallet with the bot
//! and, once the group is bound to a store, one of those wallets is an enabled
//! minter there. Messages and the removal are separate calls; a failed
//! removal is logged and the rest still goes out.

use tracing::{info, warn};

use crate::{
    dispatcher::Dispatcher,
    domain::{ChatId, Sender},
    messaging::types::MembershipChange,
    Result,
};

impl Dispatcher {
    pub(crate) async fn handle_members_joined(&self, change: MembershipChange) -> Result<()> {
        let chat_id = change.chat.id;
        for member in change.members.iter().filter(|m| !m.is_bot) {
            self.gate_member(chat_id, member).await?;
        }
        Ok(())
    }

    pub(crate) async fn handle_member_left(&self, change: MembershipChange) -> Result<()> {
        for member in &change.members {
            info!(chat_id = change.chat.id.0, user_id = member.id.0, "member left");
        }
        Ok(())
    }

    async fn gate_member(&self, chat_id: ChatId, member: &Sender) -> Result<()> {
        let wallets = self.credentials.accounts_for_user(&member.handle()).await?;
        if wallets.is_empty() {
            let msg = format!(
                "Please connect wallet with @{} using private chat.",
                self.bot_username
            );
            self.messenger.send_text(chat_id, &msg).await?;
            let msg = format!("@{} was removed", member.id.0);
            self.messenger.send_text(chat_id, &msg).await?;
            self.remove(chat_id, member).await;
            return Ok(());
        }

        let Some(store_id) = self.groups.get(chat_id).await else {
            info!(
                chat_id = chat_id.0,
                user_id = member.id.0,
                "member joined a group without a store"
            );
            return Ok(());
        };

        let is_minter = match self.market.store(&store_id).await? {
            Some(store) => store.has_enabled_minter(&wallets),
            None => false,
        };
        if is_minter {
            let msg = format!("Welcome {}!", member.mention());
            self.messenger.send_text(chat_id, &msg).await?;
            return Ok(());
        }

        let msg = format!("{} is not a minter at {store_id}", member.mention());
        self.messenger.send_text(chat_id, &msg).await?;
        self.remove(chat_id, member).await;
        Ok(())
    }

    async fn remove(&self, chat_id: ChatId, member: &Sender) {
        match self.messenger.remove_member(chat_id, member.id).await {
            Ok(()) => info!(chat_id = chat_id.0, user_id = member.id.0, "member removed"),
            Err(e) => warn!(
                chat_id = chat_id.0,
                user_id = member.id.0,
                error = %e,
                "failed to remove member"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        credentials::Credential,
        dispatcher::Dispatcher,
        domain::{AccountId, Chat, ChatId, ChatKind, Sender, UserId},
        messaging::types::{IncomingUpdate, MembershipChange},
        ports::{KeyPair, Minter, Store},
        testkit::Harness,
    };

    const GROUP: ChatId = ChatId(-100);

    fn user(id: i64, name: &str) -> Sender {
        Sender {
            id: UserId(id),
            username: Some(name.to_string()),
            is_bot: false,
        }
    }

    fn joined(members: Vec<Sender>) -> IncomingUpdate {
        IncomingUpdate::MembersJoined(MembershipChange {
            chat: Chat {
                id: GROUP,
                kind: ChatKind::Supergroup,
            },
            members,
        })
    }

    async fn link(d: &Dispatcher, username: &str, account: &str) {
        let kp = KeyPair {
            public_key: "ed25519:pk".to_string(),
            secret_key: "ed25519:sk".to_string(),
        };
        d.credentials
            .save(username, &Credential::new(AccountId::parse(account).unwrap(), &kp))
            .await
            .unwrap();
    }

    fn shop() -> Store {
        Store {
            id: "shop.mintspace2.testnet".to_string(),
            minters: vec![
                Minter {
                    account: "alice.testnet".to_string(),
                    enabled: true,
                },
                Minter {
                    account: "bob.testnet".to_string(),
                    enabled: false,
                },
            ],
            things: vec![],
        }
    }

    fn dispatcher(h: &Harness) -> Dispatcher {
        Dispatcher::new(h.config(), h.messenger.clone(), h.backends(), "usenear_bot").unwrap()
    }

    #[tokio::test]
    async fn unknown_user_is_always_removed() {
        let h = Harness::new("join-unknown");
        let d = dispatcher(&h);

        // Even with a store bound that would otherwise never be consulted.
        h.market.add_store(shop());
        d.groups.bind(GROUP, "shop.mintspace2.testnet").await.unwrap();

        d.dispatch(joined(vec![user(5, "mallory")])).await.unwrap();

        assert_eq!(
            h.messenger.texts(),
            vec![
                "Please connect wallet with @usenear_bot using private chat.".to_string(),
                "@5 was removed".to_string(),
            ]
        );
        assert_eq!(h.messenger.removed(), vec![UserId(5)]);
        assert!(!h.messenger.texts().iter().any(|t| t.starts_with("Welcome")));
    }

    #[tokio::test]
    async fn enabled_minter_is_welcomed() {
        let h = Harness::new("join-minter");
        let d = dispatcher(&h);
        h.market.add_store(shop());
        d.groups.bind(GROUP, "shop.mintspace2.testnet").await.unwrap();
        link(&d, "alice", "alice.testnet").await;

        d.dispatch(joined(vec![user(1, "alice")])).await.unwrap();

        assert_eq!(h.messenger.texts(), vec!["Welcome @alice!".to_string()]);
        assert!(h.messenger.removed().is_empty());
    }

    #[tokio::test]
    async fn disabled_minter_is_removed() {
        let h = Harness::new("join-disabled");
        let d = dispatcher(&h);
        h.market.add_store(shop());
        d.groups.bind(GROUP, "shop.mintspace2.testnet").await.unwrap();
        link(&d, "bob", "bob.testnet").await;

        d.dispatch(joined(vec![user(2, "bob")])).await.unwrap();

        assert_eq!(
            h.messenger.texts(),
            vec!["@bob is not a minter at shop.mintspace2.testnet".to_string()]
        );
        assert_eq!(h.messenger.removed(), vec![UserId(2)]);
    }

    #[tokio::test]
    async fn linked_user_in_unbound_group_is_left_alone() {
        let h = Harness::new("join-unbound");
        let d = dispatcher(&h);
        link(&d, "alice", "alice.testnet").await;

        d.dispatch(joined(vec![user(1, "alice")])).await.unwrap();

        assert!(h.messenger.sent().is_empty());
        assert_eq!(h.market.calls(), 0);
    }

    #[tokio::test]
    async fn bots_are_ignored() {
        let h = Harness::new("join-bot");
        let d = dispatcher(&h);
        let mut bot = user(9, "other_bot");
        bot.is_bot = true;

        d.dispatch(joined(vec![bot])).await.unwrap();
        assert!(h.messenger.sent().is_empty());
    }
}
