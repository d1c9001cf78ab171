//! Routes classified updates to their handlers.
//!
//! Handlers live next to their concern (`commands`, `continuation`,
//! `callbacks`, `membership`) as `impl Dispatcher` blocks and share only the
//! stores held here.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{SystemTime, UNIX_EPOCH},
};

use tracing::{debug, warn};

use crate::{
    config::Config,
    contracts::{DaoContract, NftContract},
    credentials::CredentialStore,
    domain::{AccountId, ChatId, Sender},
    groups::GroupBindings,
    messaging::{port::MessagingPort, types::IncomingUpdate},
    ports::{AccountHandle, Backends, ChainClient, Marketplace, NftStorage},
    session::{Awaiting, SessionKey, SessionStore},
    Result,
};

pub const NOT_CONNECTED: &str = "Wallet Not Connected, use /start";

pub struct Dispatcher {
    pub(crate) cfg: Arc<Config>,
    pub(crate) messenger: Arc<dyn MessagingPort>,
    pub(crate) chain: Arc<dyn ChainClient>,
    pub(crate) storage: Arc<dyn NftStorage>,
    pub(crate) market: Arc<dyn Marketplace>,
    pub(crate) credentials: CredentialStore,
    pub(crate) sessions: SessionStore,
    pub(crate) groups: GroupBindings,
    pub(crate) nft: NftContract,
    pub(crate) dao: DaoContract,
    pub(crate) bot_username: String,
    token_ids: AtomicU64,
}

impl Dispatcher {
    /// Load persisted sessions and group bindings and wire the backends.
    pub fn new(
        cfg: Config,
        messenger: Arc<dyn MessagingPort>,
        backends: Backends,
        bot_username: impl Into<String>,
    ) -> Result<Self> {
        let sessions = SessionStore::load(&cfg.session_file)?;
        let groups = GroupBindings::load(&cfg.groups_file)?;
        let credentials = CredentialStore::new(&cfg.credentials_dir, backends.chain.network_id());
        let nft = NftContract::new(backends.chain.clone(), cfg.nft_contract.clone());
        let dao = DaoContract::new(backends.chain.clone(), cfg.dao_contract.clone());

        // Token ids must not repeat across restarts; millis since the epoch is enough.
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Ok(Self {
            cfg: Arc::new(cfg),
            messenger,
            chain: backends.chain,
            storage: backends.storage,
            market: backends.market,
            credentials,
            sessions,
            groups,
            nft,
            dao,
            bot_username: bot_username.into(),
            token_ids: AtomicU64::new(seed),
        })
    }

    pub async fn dispatch(&self, update: IncomingUpdate) -> Result<()> {
        match update {
            IncomingUpdate::Command(cmd) => self.handle_command(cmd).await,
            IncomingUpdate::Reply(reply) => self.handle_reply(reply).await,
            IncomingUpdate::Callback(cb) => self.handle_callback(cb).await,
            IncomingUpdate::MembersJoined(change) => self.handle_members_joined(change).await,
            IncomingUpdate::MemberLeft(change) => self.handle_member_left(change).await,
        }
    }

    /// Set the pending step and send its prompt as a force-reply.
    pub(crate) async fn ask(&self, chat_id: ChatId, key: SessionKey, next: Awaiting) -> Result<()> {
        let Some(prompt) = next.prompt() else {
            warn!(?next, "step has no prompt");
            return Ok(());
        };
        self.sessions.set_awaiting(key, Some(next)).await?;
        self.messenger.send_prompt(chat_id, prompt.text()).await?;
        Ok(())
    }

    /// The session's linked account, or tell the user to connect first.
    pub(crate) async fn require_account(
        &self,
        chat_id: ChatId,
        key: SessionKey,
    ) -> Result<Option<AccountId>> {
        if let Some(acc) = self.sessions.get(key).await.account_id() {
            return Ok(Some(acc.clone()));
        }
        self.messenger.send_text(chat_id, NOT_CONNECTED).await?;
        Ok(None)
    }

    /// A signing handle for the session's account, built from its credential record.
    pub(crate) async fn open_account(
        &self,
        chat_id: ChatId,
        key: SessionKey,
        from: &Sender,
    ) -> Result<Option<Arc<dyn AccountHandle>>> {
        let Some(account_id) = self.require_account(chat_id, key).await? else {
            return Ok(None);
        };
        let Some(cred) = self.credentials.load(&from.handle(), &account_id).await? else {
            warn!(account = %account_id, "connected session without a credential record");
            self.messenger.send_text(chat_id, NOT_CONNECTED).await?;
            return Ok(None);
        };
        debug!(account = %account_id, "opening account");
        Ok(Some(self.chain.connect(&cred)?))
    }

    pub(crate) fn next_token_id(&self) -> String {
        self.token_ids.fetch_add(1, Ordering::SeqCst).to_string()
    }
}
