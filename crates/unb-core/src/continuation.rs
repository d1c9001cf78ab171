//! Replies to force-reply prompts.
//!
//! The bot asks a question with a force-reply message and records the matching
//! [`Awaiting`] step on the session. A reply continues the flow only when the
//! replied-to text is exactly one of the [`Prompt`] texts *and* the session is
//! waiting for that prompt.

use tracing::{info, warn};

use crate::{
    amount::parse_near_amount,
    contracts::MintRequest,
    credentials::Credential,
    dispatcher::Dispatcher,
    domain::{AccountId, ChatId, Sender},
    formatting::{code, escape_html},
    messaging::types::{ChatAction, InlineButton, InlineKeyboard, PhotoSource, ReplyMessage},
    ports::NftUpload,
    proposals::format_proposal,
    session::{Awaiting, LinkState, SessionKey},
    Result,
};

pub const CATEGORY_PICKER_TEXT: &str = "Please select one of the category below";
pub const CONNECTED_TEXT: &str = "Connected 🤝 Use the menu to access DApps";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prompt {
    WalletName,
    ConnectedAccount,
    Recipient,
    Amount,
    NftTitle,
    NftDescription,
    NftImage,
    StoreAddress,
    TransferTokenId,
    TransferReceiver,
    ProposalLink,
    ProposalTagline,
    ProposalId,
}

impl Prompt {
    pub const ALL: [Prompt; 13] = [
        Prompt::WalletName,
        Prompt::ConnectedAccount,
        Prompt::Recipient,
        Prompt::Amount,
        Prompt::NftTitle,
        Prompt::NftDescription,
        Prompt::NftImage,
        Prompt::StoreAddress,
        Prompt::TransferTokenId,
        Prompt::TransferReceiver,
        Prompt::ProposalLink,
        Prompt::ProposalTagline,
        Prompt::ProposalId,
    ];

    pub fn text(self) -> &'static str {
        match self {
            Prompt::WalletName => "Enter the wallet you wish to connect. (Only testnet support)",
            Prompt::ConnectedAccount => "Enter the account you used to connect",
            Prompt::Recipient => "Enter the accountId you want to send funds to",
            Prompt::Amount => "Enter the amount to send (in NEAR)",
            Prompt::NftTitle => "Enter the title of NFT",
            Prompt::NftDescription => "Enter the description of the NFT",
            Prompt::NftImage => "Upload the image file",
            Prompt::StoreAddress => "Address of the mintbase store",
            Prompt::TransferTokenId => {
                "Enter the token_id corresponding to the NFT you want to transfer"
            }
            Prompt::TransferReceiver => "Enter the receiver accountId",
            Prompt::ProposalLink => {
                "Please send the link to the contribution (Will cost 1 Ⓝ NEAR)"
            }
            Prompt::ProposalTagline => "Please provide a tag line describing the news",
            Prompt::ProposalId => "Enter proposal ID",
        }
    }

    /// Exact, case-sensitive lookup.
    pub fn from_text(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.text() == text)
    }

    /// Sent when a reply targets this prompt but the session is not waiting for it.
    pub fn start_over_hint(self) -> &'static str {
        match self {
            Prompt::WalletName | Prompt::ConnectedAccount => {
                "Something went wrong! Please use /start"
            }
            Prompt::Recipient | Prompt::Amount => "Start using /send or menu",
            Prompt::NftTitle | Prompt::NftDescription | Prompt::NftImage => "Start with /mintnft",
            Prompt::StoreAddress => "Start again with /setupmintbasegroup",
            Prompt::TransferTokenId | Prompt::TransferReceiver => {
                "Something went wrong start with /transfernft"
            }
            Prompt::ProposalLink | Prompt::ProposalTagline => "Start using /addproposal",
            Prompt::ProposalId => "Start using /getproposal",
        }
    }
}

impl Awaiting {
    /// The prompt this step answers; `None` for the button-driven category step.
    pub fn prompt(&self) -> Option<Prompt> {
        Some(match self {
            Awaiting::WalletName => Prompt::WalletName,
            Awaiting::ConnectedAccount => Prompt::ConnectedAccount,
            Awaiting::Recipient => Prompt::Recipient,
            Awaiting::Amount { .. } => Prompt::Amount,
            Awaiting::NftTitle => Prompt::NftTitle,
            Awaiting::NftDescription { .. } => Prompt::NftDescription,
            Awaiting::NftImage { .. } => Prompt::NftImage,
            Awaiting::StoreAddress => Prompt::StoreAddress,
            Awaiting::TransferTokenId => Prompt::TransferTokenId,
            Awaiting::TransferReceiver { .. } => Prompt::TransferReceiver,
            Awaiting::ProposalLink => Prompt::ProposalLink,
            Awaiting::ProposalTagline { .. } => Prompt::ProposalTagline,
            Awaiting::ProposalCategory { .. } => return None,
            Awaiting::ProposalId => Prompt::ProposalId,
        })
    }
}

/// Reply context handed to each continuation.
struct Turn<'a> {
    chat_id: ChatId,
    key: SessionKey,
    from: &'a Sender,
    text: String,
    photo_file_id: Option<&'a str>,
}

impl Dispatcher {
    pub(crate) async fn handle_reply(&self, reply: ReplyMessage) -> Result<()> {
        let Some(prompt) = reply.reply_to_text.as_deref().and_then(Prompt::from_text) else {
            return Ok(());
        };

        let chat_id = reply.chat.id;
        let key = SessionKey::new(chat_id, reply.from.id);
        let session = self.sessions.get(key).await;
        let pending = session.awaiting.filter(|a| a.prompt() == Some(prompt));
        let Some(awaiting) = pending else {
            info!(
                chat_id = chat_id.0,
                ?prompt,
                "reply to a prompt the session is not waiting for"
            );
            self.messenger
                .send_text(chat_id, prompt.start_over_hint())
                .await?;
            return Ok(());
        };
        // Only the waiting user's reply removes the prompt.
        if let Err(e) = self.messenger.delete_message(reply.reply_to).await {
            warn!(error = %e, "failed to delete prompt message");
        }
        self.sessions.set_awaiting(key, None).await?;

        let turn = Turn {
            chat_id,
            key,
            from: &reply.from,
            text: reply.text.as_deref().unwrap_or("").trim().to_string(),
            photo_file_id: reply.photo_file_id.as_deref(),
        };

        // Text answers need text; ask again rather than guess.
        if turn.text.is_empty() && !matches!(awaiting, Awaiting::NftImage { .. }) {
            return self.ask(chat_id, key, awaiting).await;
        }

        match awaiting {
            Awaiting::WalletName => self.on_wallet_name(&turn).await,
            Awaiting::ConnectedAccount => self.on_connected_account(&turn).await,
            Awaiting::Recipient => self.on_recipient(&turn).await,
            Awaiting::Amount { recipient } => self.on_amount(&turn, recipient).await,
            Awaiting::NftTitle => self.on_nft_title(&turn).await,
            Awaiting::NftDescription { title } => self.on_nft_description(&turn, title).await,
            Awaiting::NftImage { title, description } => {
                self.on_nft_image(&turn, title, description).await
            }
            Awaiting::StoreAddress => self.on_store_address(&turn).await,
            Awaiting::TransferTokenId => {
                let token_id = turn.text.clone();
                self.ask(chat_id, key, Awaiting::TransferReceiver { token_id })
                    .await
            }
            Awaiting::TransferReceiver { token_id } => {
                self.on_transfer_receiver(&turn, token_id).await
            }
            Awaiting::ProposalLink => {
                let link = turn.text.clone();
                self.ask(chat_id, key, Awaiting::ProposalTagline { link })
                    .await
            }
            Awaiting::ProposalTagline { link } => self.on_proposal_tagline(&turn, link).await,
            Awaiting::ProposalId => self.on_proposal_id(&turn).await,
            // Answered by a button, never reached through a prompt.
            Awaiting::ProposalCategory { .. } => Ok(()),
        }
    }

    /// Parse an account id answer, re-asking `retry` when it is malformed.
    async fn account_answer(&self, turn: &Turn<'_>, retry: Awaiting) -> Result<Option<AccountId>> {
        if let Some(acc) = AccountId::parse(&turn.text) {
            return Ok(Some(acc));
        }
        let msg = format!("{} is not a valid NEAR account id", turn.text);
        self.messenger.send_text(turn.chat_id, &msg).await?;
        self.ask(turn.chat_id, turn.key, retry).await?;
        Ok(None)
    }

    async fn on_wallet_name(&self, turn: &Turn<'_>) -> Result<()> {
        self.messenger
            .send_chat_action(turn.chat_id, ChatAction::Typing)
            .await?;
        let Some(account_id) = self.account_answer(turn, Awaiting::WalletName).await? else {
            return Ok(());
        };

        let username = turn.from.handle();
        if let Some(cred) = self.credentials.load(&username, &account_id).await? {
            let keys = self.chain.access_keys(&account_id).await?;
            if keys.iter().any(|k| *k == cred.public_key) {
                return self.mark_connected(turn, account_id).await;
            }
        }

        let key_pair = self.chain.generate_key_pair()?;
        let public_key = key_pair.public_key.clone();
        self.sessions
            .update(turn.key, |s| s.link = LinkState::KeyGenerated { key_pair })
            .await?;
        self.send_connect_keyboard(
            turn.chat_id,
            &public_key,
            &code("Click the button below to connect wallet"),
        )
        .await
    }

    /// Allow Access for `public_key` plus the Check Connection button.
    async fn send_connect_keyboard(
        &self,
        chat_id: ChatId,
        public_key: &str,
        html: &str,
    ) -> Result<()> {
        let login_url = self.cfg.wallet_login_url(public_key);
        self.messenger
            .send_inline_keyboard(
                chat_id,
                html,
                InlineKeyboard::one_per_row(vec![
                    InlineButton::url("Allow Access", login_url),
                    InlineButton::callback("Check Connection", "connecting"),
                ]),
            )
            .await?;
        Ok(())
    }

    async fn on_connected_account(&self, turn: &Turn<'_>) -> Result<()> {
        self.messenger
            .send_chat_action(turn.chat_id, ChatAction::Typing)
            .await?;
        let Some(key_pair) = self.sessions.get(turn.key).await.generated_key().cloned() else {
            self.messenger
                .send_text(turn.chat_id, Prompt::ConnectedAccount.start_over_hint())
                .await?;
            return Ok(());
        };
        let Some(account_id) = self.account_answer(turn, Awaiting::ConnectedAccount).await? else {
            return Ok(());
        };

        let keys = self.chain.access_keys(&account_id).await?;
        if !keys.iter().any(|k| *k == key_pair.public_key) {
            // Keep the pending key; a later approval still matches it.
            let msg = format!(
                "Access key not found on {account_id} yet. \
                 Approve it in the wallet, then press Check Connection again."
            );
            return self
                .send_connect_keyboard(turn.chat_id, &key_pair.public_key, &escape_html(&msg))
                .await;
        }

        self.credentials
            .save(&turn.from.handle(), &Credential::new(account_id.clone(), &key_pair))
            .await?;
        self.mark_connected(turn, account_id).await
    }

    async fn mark_connected(&self, turn: &Turn<'_>, account_id: AccountId) -> Result<()> {
        info!(chat_id = turn.chat_id.0, account = %account_id, "wallet connected");
        self.sessions
            .update(turn.key, |s| s.link = LinkState::Connected { account_id })
            .await?;
        self.messenger
            .send_html(turn.chat_id, &code(CONNECTED_TEXT))
            .await?;
        Ok(())
    }

    async fn on_recipient(&self, turn: &Turn<'_>) -> Result<()> {
        let Some(recipient) = self.account_answer(turn, Awaiting::Recipient).await? else {
            return Ok(());
        };
        self.ask(turn.chat_id, turn.key, Awaiting::Amount { recipient })
            .await
    }

    async fn on_amount(&self, turn: &Turn<'_>, recipient: AccountId) -> Result<()> {
        let amount = match parse_near_amount(&turn.text) {
            Ok(a) if a > 0 => a,
            _ => {
                self.messenger
                    .send_text(turn.chat_id, "Invalid amount, enter a positive number like 1.5")
                    .await?;
                return self
                    .ask(turn.chat_id, turn.key, Awaiting::Amount { recipient })
                    .await;
            }
        };
        let Some(account) = self.open_account(turn.chat_id, turn.key, turn.from).await? else {
            return Ok(());
        };

        self.messenger
            .send_chat_action(turn.chat_id, ChatAction::Typing)
            .await?;
        let tx = account.send_money(&recipient, amount).await?;
        info!(from = %account.account_id(), to = %recipient, hash = %tx.hash, "funds sent");

        self.messenger
            .send_inline_keyboard(
                turn.chat_id,
                &code("Transaction Completed!"),
                InlineKeyboard::single(InlineButton::url(
                    "View in Explorer",
                    self.cfg.explorer_tx_url(&tx.hash),
                )),
            )
            .await?;
        Ok(())
    }

    async fn on_nft_title(&self, turn: &Turn<'_>) -> Result<()> {
        if self.sessions.get(turn.key).await.account_id().is_none() {
            self.messenger
                .send_text(turn.chat_id, "Account not connected!")
                .await?;
            return Ok(());
        }
        let title = turn.text.clone();
        self.ask(turn.chat_id, turn.key, Awaiting::NftDescription { title })
            .await
    }

    async fn on_nft_description(&self, turn: &Turn<'_>, title: String) -> Result<()> {
        if self.sessions.get(turn.key).await.account_id().is_none() {
            self.messenger
                .send_text(turn.chat_id, "Account not connected!")
                .await?;
            return Ok(());
        }
        let description = turn.text.clone();
        self.ask(
            turn.chat_id,
            turn.key,
            Awaiting::NftImage { title, description },
        )
        .await
    }

    async fn on_nft_image(
        &self,
        turn: &Turn<'_>,
        title: String,
        description: String,
    ) -> Result<()> {
        let Some(file_id) = turn.photo_file_id else {
            self.messenger
                .send_text(turn.chat_id, "Please upload a photo only")
                .await?;
            return self
                .ask(
                    turn.chat_id,
                    turn.key,
                    Awaiting::NftImage { title, description },
                )
                .await;
        };
        let Some(account) = self.open_account(turn.chat_id, turn.key, turn.from).await? else {
            return Ok(());
        };

        self.messenger
            .send_chat_action(turn.chat_id, ChatAction::UploadPhoto)
            .await?;
        let image = self.messenger.download_file(file_id).await?;
        let status = self
            .messenger
            .send_text(turn.chat_id, "Uploading Metadata to IPFS...")
            .await?;

        let file_name = format!(
            "{}_{}.jpg",
            title.replace(' ', "_"),
            turn.from.handle()
        );
        let metadata_url = self
            .storage
            .store_nft(NftUpload {
                name: title.clone(),
                description: description.clone(),
                file_name,
                image,
            })
            .await?;
        let image_url = self.storage.image_url_from_metadata(&metadata_url).await?;

        self.messenger.edit_text(status, "Minting NFT...").await?;
        let minted = self
            .nft
            .mint(
                account.as_ref(),
                MintRequest {
                    token_id: self.next_token_id(),
                    receiver_id: account.account_id().clone(),
                    title,
                    description,
                    media: image_url.clone(),
                },
            )
            .await?;
        if let Err(e) = self.messenger.delete_message(status).await {
            warn!(error = %e, "failed to delete status message");
        }

        let media_url = minted
            .and_then(|t| t.metadata.media)
            .unwrap_or(image_url);
        self.messenger
            .send_photo(
                turn.chat_id,
                PhotoSource::FileId(file_id.to_string()),
                "NFT Minted 🎉",
                Some(InlineKeyboard::one_per_row(vec![
                    InlineButton::url("View in Collectibles", self.cfg.collectibles_url()),
                    InlineButton::url("View metadata on IPFS", metadata_url),
                    InlineButton::url("View media on IPFS", media_url),
                ])),
            )
            .await?;
        Ok(())
    }

    async fn on_store_address(&self, turn: &Turn<'_>) -> Result<()> {
        let store_id = turn.text.as_str();
        if self.groups.get(turn.chat_id).await.is_some() {
            self.messenger
                .send_text(turn.chat_id, "Store already setup!")
                .await?;
            return Ok(());
        }
        self.messenger
            .send_chat_action(turn.chat_id, ChatAction::Typing)
            .await?;

        let wallets = self
            .credentials
            .accounts_for_user(&turn.from.handle())
            .await?;
        let is_minter = match self.market.store(store_id).await? {
            Some(store) => store.has_enabled_minter(&wallets),
            None => false,
        };
        if !is_minter {
            let msg = format!("You are not a minter for {store_id}");
            self.messenger.send_text(turn.chat_id, &msg).await?;
            return Ok(());
        }

        if !self.groups.bind(turn.chat_id, store_id).await? {
            self.messenger
                .send_text(turn.chat_id, "Store already setup!")
                .await?;
            return Ok(());
        }
        let msg = format!(
            "Bot will now kick everyone who is not part of {store_id}. Group Setup Complete!"
        );
        self.messenger.send_text(turn.chat_id, &msg).await?;
        Ok(())
    }

    async fn on_transfer_receiver(&self, turn: &Turn<'_>, token_id: String) -> Result<()> {
        let retry = Awaiting::TransferReceiver {
            token_id: token_id.clone(),
        };
        let Some(receiver) = self.account_answer(turn, retry).await? else {
            return Ok(());
        };
        let Some(account) = self.open_account(turn.chat_id, turn.key, turn.from).await? else {
            return Ok(());
        };

        self.messenger
            .send_chat_action(turn.chat_id, ChatAction::Typing)
            .await?;
        let tx = self
            .nft
            .transfer(account.as_ref(), &receiver, &token_id)
            .await?;
        info!(token_id = %token_id, to = %receiver, hash = %tx.hash, "nft transferred");

        self.messenger
            .send_inline_keyboard(
                turn.chat_id,
                "NFT transfer complete",
                InlineKeyboard::single(InlineButton::url(
                    "View Collectibles",
                    self.cfg.collectibles_url(),
                )),
            )
            .await?;
        Ok(())
    }

    async fn on_proposal_tagline(&self, turn: &Turn<'_>, link: String) -> Result<()> {
        let tagline = turn.text.clone();
        self.sessions
            .set_awaiting(turn.key, Some(Awaiting::ProposalCategory { link, tagline }))
            .await?;
        self.messenger
            .send_inline_keyboard(
                turn.chat_id,
                CATEGORY_PICKER_TEXT,
                InlineKeyboard::one_per_row(vec![
                    InlineButton::callback("DeFi", "news-category-defi"),
                    InlineButton::callback("DAO", "news-category-dao"),
                ]),
            )
            .await?;
        Ok(())
    }

    async fn on_proposal_id(&self, turn: &Turn<'_>) -> Result<()> {
        let Ok(id) = turn.text.parse::<u64>() else {
            self.messenger
                .send_text(turn.chat_id, "Proposal ID must be a number")
                .await?;
            return self.ask(turn.chat_id, turn.key, Awaiting::ProposalId).await;
        };
        self.messenger
            .send_chat_action(turn.chat_id, ChatAction::Typing)
            .await?;
        let proposal = self.dao.proposal(id).await?;
        self.messenger
            .send_inline_keyboard(
                turn.chat_id,
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
