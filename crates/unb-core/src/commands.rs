//! Slash commands.

use tracing::info;

use crate::{
    amount::format_near_amount,
    dispatcher::Dispatcher,
    domain::ChatId,
    formatting::code,
    messaging::types::{ChatAction, CommandMessage, InlineButton, InlineKeyboard, PhotoSource},
    session::{Awaiting, SessionKey},
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Send,
    GetBalance,
    MintNft,
    TransferNft,
    SetupMintbaseGroup,
    GetMinters,
    GetMints,
    GetMyNfts,
    AddProposal,
    GetProposal,
}

/// `(command, description)` pairs registered with Telegram and shown by `/help`.
pub const MENU: &[(&str, &str)] = &[
    ("start", "Connect your NEAR wallet"),
    ("send", "Send NEAR to another account"),
    ("getbalance", "Show your wallet balance"),
    ("mintnft", "Mint an NFT from a photo"),
    ("transfernft", "Transfer one of your NFTs"),
    ("getmynfts", "Show the NFTs you own"),
    ("flex", "Show off the NFTs you own"),
    ("setupmintbasegroup", "Bind this group to a Mintbase store"),
    ("getminters", "List the minters of this group's store"),
    ("getmints", "Show the listings of this group's store"),
    ("addproposal", "Submit a news proposal to the DAO"),
    ("getproposal", "Look up a DAO proposal"),
    ("help", "Show this list"),
];

impl BotCommand {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "start" => Self::Start,
            "help" => Self::Help,
            "send" => Self::Send,
            "getbalance" => Self::GetBalance,
            "mintnft" => Self::MintNft,
            "transfernft" => Self::TransferNft,
            "setupmintbasegroup" => Self::SetupMintbaseGroup,
            "getminters" => Self::GetMinters,
            "getmints" => Self::GetMints,
            "getmynfts" | "flex" => Self::GetMyNfts,
            "addproposal" => Self::AddProposal,
            "getproposal" => Self::GetProposal,
            _ => return None,
        })
    }
}

/// Split `/name@bot args` into a lowercased name and the trimmed args.
///
/// Commands addressed to a different bot return `None`.
pub fn parse_command(text: &str, bot_username: &str) -> Option<(String, String)> {
    let rest = text.trim_start().strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((h, a)) => (h, a.trim()),
        None => (rest, ""),
    };
    let name = match head.split_once('@') {
        Some((name, target)) => {
            if !target.eq_ignore_ascii_case(bot_username) {
                return None;
            }
            name
        }
        None => head,
    };
    if name.is_empty() {
        return None;
    }
    Some((name.to_ascii_lowercase(), args.to_string()))
}

fn help_text() -> String {
    let mut out = String::from("<b>useNear commands</b>\n");
    for (name, desc) in MENU {
        out.push_str(&format!("/{name} - {desc}\n"));
    }
    out
}

pub const GROUP_ONLY: &str = "This command is only applicable in a group chat!";
pub const STORE_NOT_SETUP: &str =
    "Store not setup ask group owner to use /setupmintbasegroup command";

impl Dispatcher {
    pub(crate) async fn handle_command(&self, cmd: CommandMessage) -> Result<()> {
        let Some(command) = BotCommand::from_name(&cmd.name) else {
            return Ok(());
        };
        info!(chat_id = cmd.chat.id.0, user_id = cmd.from.id.0, ?command, "command");

        let chat_id = cmd.chat.id;
        let key = SessionKey::new(chat_id, cmd.from.id);
        match command {
            BotCommand::Start => self.cmd_start(chat_id, key).await,
            BotCommand::Help => {
                self.messenger.send_html(chat_id, &help_text()).await?;
                Ok(())
            }
            BotCommand::Send => {
                self.prompt_if_connected(chat_id, key, Awaiting::Recipient)
                    .await
            }
            BotCommand::MintNft => {
                self.prompt_if_connected(chat_id, key, Awaiting::NftTitle)
                    .await
            }
            BotCommand::AddProposal => {
                self.prompt_if_connected(chat_id, key, Awaiting::ProposalLink)
                    .await
            }
            BotCommand::GetProposal => {
                self.prompt_if_connected(chat_id, key, Awaiting::ProposalId)
                    .await
            }
            BotCommand::GetBalance => self.cmd_get_balance(chat_id, &cmd).await,
            BotCommand::TransferNft => self.cmd_transfer_nft(chat_id, key).await,
            BotCommand::GetMyNfts => self.cmd_get_my_nfts(chat_id, key).await,
            BotCommand::SetupMintbaseGroup => self.cmd_setup_group(&cmd, key).await,
            BotCommand::GetMinters => self.cmd_get_minters(&cmd).await,
            BotCommand::GetMints => self.cmd_get_mints(&cmd).await,
        }
    }

    async fn cmd_start(&self, chat_id: ChatId, key: SessionKey) -> Result<()> {
        self.sessions.update(key, |s| s.reset()).await?;
        self.messenger
            .send_inline_keyboard(
                chat_id,
                &code("Welcome to useNear!"),
                InlineKeyboard::single(InlineButton::callback("Connect Wallet", "connect")),
            )
            .await?;
        Ok(())
    }

    async fn prompt_if_connected(
        &self,
        chat_id: ChatId,
        key: SessionKey,
        next: Awaiting,
    ) -> Result<()> {
        if self.require_account(chat_id, key).await?.is_none() {
            return Ok(());
        }
        self.ask(chat_id, key, next).await
    }

    async fn cmd_get_balance(&self, chat_id: ChatId, cmd: &CommandMessage) -> Result<()> {
        let key = SessionKey::new(chat_id, cmd.from.id);
        let Some(account) = self.open_account(chat_id, key, &cmd.from).await? else {
            return Ok(());
        };
        let balance = account.balance().await?;
        let msg = format!(
            "{} Balance - {}  Ⓝ",
            account.account_id(),
            format_near_amount(balance)
        );
        self.messenger.send_text(chat_id, &msg).await?;
        Ok(())
    }

    async fn cmd_transfer_nft(&self, chat_id: ChatId, key: SessionKey) -> Result<()> {
        let Some(account_id) = self.require_account(chat_id, key).await? else {
            return Ok(());
        };
        self.messenger
            .send_chat_action(chat_id, ChatAction::Typing)
            .await?;
        let tokens = self.nft.tokens_for_owner(&account_id).await?;

        let mut msg = format!("{account_id} owned NFTs: \n");
        for t in &tokens {
            let title = t.metadata.title.as_deref().unwrap_or("Untitled");
            msg.push_str(&format!("{title} - {}\n", t.token_id));
        }
        self.messenger.send_text(chat_id, &msg).await?;
        self.ask(chat_id, key, Awaiting::TransferTokenId).await
    }

    async fn cmd_get_my_nfts(&self, chat_id: ChatId, key: SessionKey) -> Result<()> {
        let Some(account_id) = self.require_account(chat_id, key).await? else {
            return Ok(());
        };
        self.messenger
            .send_chat_action(chat_id, ChatAction::Typing)
            .await?;
        let tokens = self.nft.tokens_for_owner(&account_id).await?;
        if tokens.is_empty() {
            self.messenger
                .send_text(chat_id, "No NFT found 🙁. Mint NFT using /mintnft")
                .await?;
            return Ok(());
        }

        for t in tokens {
            let m = &t.metadata;
            let caption = format!(
                "Owned by: {}\nTitle: {}\nDescription: {}\nCopies: {}",
                t.owner_id,
                m.title.as_deref().unwrap_or(""),
                m.description.as_deref().unwrap_or(""),
                m.copies.map(|c| c.to_string()).unwrap_or_else(|| "1".to_string()),
            );
            let Some(media) = m.media.clone() else {
                self.messenger.send_text(chat_id, &caption).await?;
                continue;
            };
            self.messenger
                .send_photo(chat_id, PhotoSource::Url(media), &caption, None)
                .await?;
        }
        Ok(())
    }

    async fn cmd_setup_group(&self, cmd: &CommandMessage, key: SessionKey) -> Result<()> {
        let chat_id = cmd.chat.id;
        if !cmd.chat.kind.is_group() {
            self.messenger.send_text(chat_id, GROUP_ONLY).await?;
            return Ok(());
        }
        self.messenger
            .send_chat_action(chat_id, ChatAction::Typing)
            .await?;
        if !self.messenger.is_chat_admin(chat_id, cmd.from.id).await? {
            self.messenger
                .send_text(chat_id, "Only admin of the group can setup.")
                .await?;
            return Ok(());
        }

        let wallets = self
            .credentials
            .accounts_for_user(&cmd.from.handle())
            .await?;
        if wallets.is_empty() {
            let msg = format!(
                "Please connect your wallet with @{} using private chat.",
                self.bot_username
            );
            self.messenger.send_text(chat_id, &msg).await?;
            return Ok(());
        }
        self.ask(chat_id, key, Awaiting::StoreAddress).await
    }

    async fn cmd_get_minters(&self, cmd: &CommandMessage) -> Result<()> {
        let chat_id = cmd.chat.id;
        let Some(store_id) = self.bound_store(cmd).await? else {
            return Ok(());
        };
        self.messenger
            .send_chat_action(chat_id, ChatAction::Typing)
            .await?;
        let minters = self
            .market
            .store(&store_id)
            .await?
            .map(|s| s.minters)
            .unwrap_or_default();

        let mut msg = format!("Minters for {store_id}:\n");
        for m in minters {
            let username = match crate::domain::AccountId::parse(&m.account) {
                Some(acc) => self.credentials.username_for_account(&acc).await?,
                None => None,
            };
            match username {
                Some(u) => msg.push_str(&format!("{} - @{}\n", m.account, u.to_lowercase())),
                None => msg.push_str(&format!("{}\n", m.account)),
            }
        }
        self.messenger.send_text(chat_id, &msg).await?;
        Ok(())
    }

    async fn cmd_get_mints(&self, cmd: &CommandMessage) -> Result<()> {
        let chat_id = cmd.chat.id;
        let Some(store_id) = self.bound_store(cmd).await? else {
            return Ok(());
        };
        self.messenger
            .send_chat_action(chat_id, ChatAction::Typing)
            .await?;
        let things = self
            .market
            .store(&store_id)
            .await?
            .map(|s| s.things)
            .unwrap_or_default();

        for thing in things {
            let meta = self.market.thing_metadata(&thing.id).await?;
            let mut caption = format!("Title: {}\nDescription: {}\n", meta.title, meta.description);
            for t in &meta.extra {
                let value = match &t.value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                caption.push_str(&format!("{}: {value}\n", t.trait_type));
            }
            let copies = meta
                .copies
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string());
            caption.push_str(&format!("Available: {copies}"));

            let keyboard = InlineKeyboard::single(InlineButton::url(
                "View on Mintbase",
                self.cfg.mintbase_thing_url(&thing.id),
            ));
            self.messenger
                .send_photo(chat_id, PhotoSource::Url(meta.media), &caption, Some(keyboard))
                .await?;
        }
        Ok(())
    }

    /// Group-only guard plus store lookup, with the user-facing messages.
    async fn bound_store(&self, cmd: &CommandMessage) -> Result<Option<String>> {
        let chat_id = cmd.chat.id;
        if !cmd.chat.kind.is_group() {
            self.messenger.send_text(chat_id, GROUP_ONLY).await?;
            return Ok(None);
        }
        let store = self.groups.get(chat_id).await;
        if store.is_none() {
            self.messenger.send_text(chat_id, STORE_NOT_SETUP).await?;
        }
        Ok(store)
    }
}
