use regex::Regex;
use tracing::{info, warn};

use crate::{
    continuation::CATEGORY_PICKER_TEXT,
    dispatcher::Dispatcher,
    formatting::escape_html,
    messaging::types::{CallbackQuery, InlineButton, InlineKeyboard},
    proposals::{compose_description, format_proposal, is_duplicate_proposal},
    session::{Awaiting, SessionKey},
    Result,
};

/// `news-category-<letters>` → `<letters>`.
fn news_category(data: &str) -> Option<String> {
    let re = Regex::new(r"^news-category-([a-zA-Z]+)$").ok()?;
    let caps = re.captures(data)?;
    Some(caps.get(1)?.as_str().to_string())
}

impl Dispatcher {
    pub(crate) async fn handle_callback(&self, cb: CallbackQuery) -> Result<()> {
        if let Err(e) = self.messenger.answer_callback_query(&cb.callback_id, None).await {
            warn!(error = %e, "failed to answer callback query");
        }

        let chat_id = cb.chat.id;
        let key = SessionKey::new(chat_id, cb.from.id);
        match cb.data.as_str() {
            "connect" => {
                self.delete_button_message(&cb).await;
                self.ask(chat_id, key, Awaiting::WalletName).await
            }
            "connecting" => {
                self.delete_button_message(&cb).await;
                self.ask(chat_id, key, Awaiting::ConnectedAccount).await
            }
            data => match news_category(data) {
                Some(category) => self.on_news_category(&cb, key, &category).await,
                None => {
                    info!(data, "unknown callback");
                    Ok(())
                }
            },
        }
    }

    async fn delete_button_message(&self, cb: &CallbackQuery) {
        let Some(msg) = cb.message else {
            return;
        };
        if let Err(e) = self.messenger.delete_message(msg).await {
            warn!(error = %e, "failed to delete button message");
        }
    }

    async fn on_news_category(
        &self,
        cb: &CallbackQuery,
        key: SessionKey,
        category: &str,
    ) -> Result<()> {
        let chat_id = cb.chat.id;
        let from_picker = cb.message_text.as_deref() == Some(CATEGORY_PICKER_TEXT);
        let pending = match self.sessions.get(key).await.awaiting {
            Some(Awaiting::ProposalCategory { link, tagline }) if from_picker => {
                Some((link, tagline))
            }
            _ => None,
        };
        let Some((link, tagline)) = pending else {
            self.messenger
                .send_text(chat_id, "Start using /addproposal")
                .await?;
            return Ok(());
        };
        // Cleared whatever the outcome.
        self.sessions.set_awaiting(key, None).await?;

        let Some(account) = self.open_account(chat_id, key, &cb.from).await? else {
            return Ok(());
        };

        let existing = self.dao.all_proposals().await?;
        if is_duplicate_proposal(&link, existing.iter().map(|p| p.description.as_str())) {
            self.messenger
                .send_text(chat_id, "Duplicate Proposal. Make a new one using /addproposal")
                .await?;
            return Ok(());
        }

        let description = compose_description(&tagline, category, &link);
        let id = self.dao.add_proposal(account.as_ref(), &description).await?;
        info!(proposal_id = id, proposer = %account.account_id(), "proposal added");
        let proposal = self.dao.proposal(id).await?;

        self.messenger.send_text(chat_id, "Proposal added 🎉").await?;
        self.messenger
            .send_inline_keyboard(
                chat_id,
                &escape_html(&format_proposal(&proposal)),
                InlineKeyboard::single(InlineButton::url(
                    "View on Sputnik DAO",
                    self.cfg.sputnik_proposal_url(proposal.id),
                )),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        credentials::Credential,
        domain::{AccountId, Chat, ChatId, ChatKind, MessageId, MessageRef, Sender, UserId},
        messaging::types::IncomingUpdate,
        ports::KeyPair,
        session::LinkState,
        testkit::Harness,
    };
    use serde_json::json;

    const CHAT: ChatId = ChatId(20);

    fn key() -> SessionKey {
        SessionKey::new(CHAT, UserId(20))
    }

    fn press(data: &str, message_text: &str) -> IncomingUpdate {
        IncomingUpdate::Callback(CallbackQuery {
            chat: Chat {
                id: CHAT,
                kind: ChatKind::Private,
            },
            from: Sender {
                id: UserId(20),
                username: Some("alice".to_string()),
                is_bot: false,
            },
            callback_id: "cb1".to_string(),
            data: data.to_string(),
            message: Some(MessageRef {
                chat_id: CHAT,
                message_id: MessageId(7),
            }),
            message_text: Some(message_text.to_string()),
        })
    }

    async fn ready_for_category(d: &Dispatcher) {
        let account_id = AccountId::parse("alice.testnet").unwrap();
        let kp = KeyPair {
            public_key: "ed25519:pk".to_string(),
            secret_key: "ed25519:sk".to_string(),
        };
        d.credentials
            .save("alice", &Credential::new(account_id.clone(), &kp))
            .await
            .unwrap();
        d.sessions
            .update(key(), |s| {
                s.link = LinkState::Connected { account_id };
                s.awaiting = Some(Awaiting::ProposalCategory {
                    link: "hello world".to_string(),
                    tagline: "Big".to_string(),
                });
            })
            .await
            .unwrap();
    }

    fn dispatcher(h: &Harness) -> Dispatcher {
        Dispatcher::new(h.config(), h.messenger.clone(), h.backends(), "usenear_bot").unwrap()
    }

    #[test]
    fn category_pattern() {
        assert_eq!(news_category("news-category-defi").as_deref(), Some("defi"));
        assert_eq!(news_category("news-category-DAO").as_deref(), Some("DAO"));
        assert_eq!(news_category("news-category-"), None);
        assert_eq!(news_category("news-category-de-fi"), None);
        assert_eq!(news_category("connect"), None);
    }

    #[tokio::test]
    async fn connect_buttons_delete_and_prompt() {
        let h = Harness::new("cb-connect");
        let d = dispatcher(&h);

        d.dispatch(press("connect", "<code>Welcome to useNear!</code>")).await.unwrap();
        assert_eq!(h.messenger.deleted().len(), 1);
        assert_eq!(
            h.messenger.prompts(),
            vec!["Enter the wallet you wish to connect. (Only testnet support)"]
        );
        assert_eq!(d.sessions.get(key()).await.awaiting, Some(Awaiting::WalletName));

        d.dispatch(press("connecting", "x")).await.unwrap();
        assert_eq!(
            h.messenger.prompts().pop().as_deref(),
            Some("Enter the account you used to connect")
        );
        assert_eq!(
            d.sessions.get(key()).await.awaiting,
            Some(Awaiting::ConnectedAccount)
        );
    }

    #[tokio::test]
    async fn category_without_pending_proposal_says_start_over() {
        let h = Harness::new("cb-nopending");
        let d = dispatcher(&h);

        d.dispatch(press("news-category-defi", CATEGORY_PICKER_TEXT)).await.unwrap();
        assert_eq!(h.messenger.last_text().as_deref(), Some("Start using /addproposal"));
        assert_eq!(h.external_calls(), 0);
    }

    #[tokio::test]
    async fn category_from_other_message_is_rejected() {
        let h = Harness::new("cb-othermsg");
        let d = dispatcher(&h);
        ready_for_category(&d).await;

        d.dispatch(press("news-category-defi", "something else")).await.unwrap();
        assert_eq!(h.messenger.last_text().as_deref(), Some("Start using /addproposal"));
        assert!(h.chain.account("alice.testnet").calls().is_empty());
    }

    #[tokio::test]
    async fn duplicate_proposal_is_refused_and_cleared() {
        let h = Harness::new("cb-dup");
        let d = dispatcher(&h);
        ready_for_category(&d).await;
        h.chain.set_view("get_last_proposal_id", json!(1));
        h.chain.set_view(
            "get_proposals",
            json!([{
                "id": 0,
                "proposer": "bob.testnet",
                "description": "X - defi - hello world",
                "status": "InProgress"
            }]),
        );

        d.dispatch(press("news-category-defi", CATEGORY_PICKER_TEXT)).await.unwrap();
        assert_eq!(
            h.messenger.last_text().as_deref(),
            Some("Duplicate Proposal. Make a new one using /addproposal")
        );
        assert!(h.chain.account("alice.testnet").calls().is_empty());
        assert!(d.sessions.get(key()).await.awaiting.is_none());
    }

    #[tokio::test]
    async fn new_proposal_is_added_and_shown() {
        let h = Harness::new("cb-add");
        let d = dispatcher(&h);
        ready_for_category(&d).await;
        h.chain.set_view("get_last_proposal_id", json!(0));
        h.chain.set_view(
            "get_proposal",
            json!({
                "id": 1,
                "proposer": "alice.testnet",
                "description": "Big - dao - hello world",
                "status": "InProgress"
            }),
        );
        h.chain.account("alice.testnet").set_call_value(json!(1));

        d.dispatch(press("news-category-dao", CATEGORY_PICKER_TEXT)).await.unwrap();

        let call = h.chain.account("alice.testnet").calls().pop().unwrap();
        assert_eq!(call.method, "add_proposal");
        assert_eq!(call.args["proposal"]["description"], "Big - dao - hello world");

        let texts = h.messenger.texts();
        assert_eq!(texts[texts.len() - 2], "Proposal added 🎉");
        assert_eq!(
            texts[texts.len() - 1],
            "Proposal #1\nProposer: alice.testnet\n\
             Description: Big - dao - hello world\nStatus: InProgress"
        );
        assert!(d.sessions.get(key()).await.awaiting.is_none());
    }
}
