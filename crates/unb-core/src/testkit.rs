//! Fakes for the ports, shared by the unit tests.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    config::{Config, NetworkEndpoints},
    credentials::Credential,
    domain::{AccountId, ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatAction, InlineKeyboard, PhotoSource},
    },
    ports::{
        AccountHandle, Backends, ChainClient, FunctionCall, KeyPair, Marketplace, NftStorage,
        NftUpload, Store, ThingMetadata, TxOutcome,
    },
    Result,
};

static TEMP_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Fresh empty directory under `/tmp`, unique per process and call.
pub fn temp_dir(name: &str) -> PathBuf {
    let n = TEMP_SEQ.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!("unb-test-{}-{name}-{n}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn test_config(dir: &Path) -> Config {
    Config {
        telegram_bot_token: "test-token".to_string(),
        webhook_url: None,
        listen_addr: "127.0.0.1:8443".parse().unwrap(),
        near: NetworkEndpoints::for_network("testnet").unwrap(),
        nft_contract: AccountId::parse("nft-final.test-testing.testnet").unwrap(),
        dao_contract: AccountId::parse("near-week.sputnikv2.testnet").unwrap(),
        nft_storage_token: "nft-token".to_string(),
        nft_storage_api_url: "https://api.nft.storage".to_string(),
        ipfs_metadata_gateway: "https://ipfs.io/ipfs".to_string(),
        ipfs_media_gateway: "https://dweb.link/ipfs".to_string(),
        mintbase_api_url: "https://mintbase-testnet.hasura.app/api/rest".to_string(),
        mintbase_metadata_url: "https://arweave.net".to_string(),
        mintbase_site_url: "https://testnet.mintbase.io".to_string(),
        sputnik_ui_url: "https://testnet-v2.sputnik.fund".to_string(),
        credentials_dir: dir.join("credentials"),
        session_file: dir.join("sessions.json"),
        groups_file: dir.join("groups.json"),
        http_timeout: Duration::from_secs(5),
    }
}

/// One outbound effect recorded by [`FakeMessenger`].
#[derive(Clone, Debug, PartialEq)]
pub enum Sent {
    Text(ChatId, String),
    Html(ChatId, String),
    Prompt(ChatId, String),
    Keyboard(ChatId, String, InlineKeyboard),
    Photo(ChatId, PhotoSource, String, Option<InlineKeyboard>),
    Edit(MessageRef, String),
    Delete(MessageRef),
    Action(ChatId, ChatAction),
    Answer(String),
    Removed(ChatId, UserId),
}

#[derive(Default)]
pub struct FakeMessenger {
    next_id: Mutex<i32>,
    sent: Mutex<Vec<Sent>>,
    admins: Mutex<Vec<UserId>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl FakeMessenger {
    fn alloc(&self, chat_id: ChatId) -> MessageRef {
        let mut guard = self.next_id.lock().unwrap();
        *guard += 1;
        MessageRef {
            chat_id,
            message_id: MessageId(1000 + *guard),
        }
    }

    fn push(&self, s: Sent) {
        self.sent.lock().unwrap().push(s);
    }

    pub fn add_admin(&self, user_id: UserId) {
        self.admins.lock().unwrap().push(user_id);
    }

    pub fn add_file(&self, file_id: &str, bytes: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(file_id.to_string(), bytes.to_vec());
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Every user-visible text, in order: plain, HTML, prompts, keyboard bodies, captions.
    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text(_, t)
                | Sent::Html(_, t)
                | Sent::Prompt(_, t)
                | Sent::Keyboard(_, t, _)
                | Sent::Photo(_, _, t, _) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Prompt(_, t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn keyboards(&self) -> Vec<(String, InlineKeyboard)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Keyboard(_, t, k) => Some((t, k)),
                _ => None,
            })
            .collect()
    }

    pub fn photos(&self) -> Vec<(PhotoSource, String, Option<InlineKeyboard>)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Photo(_, p, c, k) => Some((p, c, k)),
                _ => None,
            })
            .collect()
    }

    pub fn deleted(&self) -> Vec<MessageRef> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Delete(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn removed(&self) -> Vec<UserId> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Removed(_, u) => Some(u),
                _ => None,
            })
            .collect()
    }

    pub fn last_text(&self) -> Option<String> {
        self.texts().pop()
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        self.push(Sent::Text(chat_id, text.to_string()));
        Ok(self.alloc(chat_id))
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.push(Sent::Html(chat_id, html.to_string()));
        Ok(self.alloc(chat_id))
    }

    async fn send_prompt(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        self.push(Sent::Prompt(chat_id, text.to_string()));
        Ok(self.alloc(chat_id))
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.push(Sent::Keyboard(chat_id, html.to_string(), keyboard));
        Ok(self.alloc(chat_id))
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: PhotoSource,
        caption: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef> {
        self.push(Sent::Photo(chat_id, photo, caption.to_string(), keyboard));
        Ok(self.alloc(chat_id))
    }

    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<()> {
        self.push(Sent::Edit(msg, text.to_string()));
        Ok(())
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.push(Sent::Delete(msg));
        Ok(())
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        self.push(Sent::Action(chat_id, action));
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str, _text: Option<&str>) -> Result<()> {
        self.push(Sent::Answer(callback_id.to_string()));
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| Error::External(format!("no such file: {file_id}")))
    }

    async fn is_chat_admin(&self, _chat_id: ChatId, user_id: UserId) -> Result<bool> {
        Ok(self.admins.lock().unwrap().contains(&user_id))
    }

    async fn remove_member(&self, chat_id: ChatId, user_id: UserId) -> Result<()> {
        self.push(Sent::Removed(chat_id, user_id));
        Ok(())
    }
}

pub struct FakeAccount {
    account_id: AccountId,
    balance: Mutex<u128>,
    call_value: Mutex<Value>,
    calls: Mutex<Vec<FunctionCall>>,
    transfers: Mutex<Vec<(AccountId, u128)>>,
}

impl FakeAccount {
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            balance: Mutex::new(0),
            call_value: Mutex::new(Value::Null),
            calls: Mutex::new(Vec::new()),
            transfers: Mutex::new(Vec::new()),
        }
    }

    pub fn set_balance(&self, yocto: u128) {
        *self.balance.lock().unwrap() = yocto;
    }

    pub fn set_call_value(&self, v: Value) {
        *self.call_value.lock().unwrap() = v;
    }

    pub fn calls(&self) -> Vec<FunctionCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn transfers(&self) -> Vec<(AccountId, u128)> {
        self.transfers.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccountHandle for FakeAccount {
    fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    async fn balance(&self) -> Result<u128> {
        Ok(*self.balance.lock().unwrap())
    }

    async fn send_money(&self, receiver_id: &AccountId, amount: u128) -> Result<TxOutcome> {
        self.transfers
            .lock()
            .unwrap()
            .push((receiver_id.clone(), amount));
        Ok(TxOutcome {
            hash: "TxHash".to_string(),
            value: Value::Null,
        })
    }

    async fn call(&self, call: FunctionCall) -> Result<TxOutcome> {
        self.calls.lock().unwrap().push(call);
        Ok(TxOutcome {
            hash: "TxHash".to_string(),
            value: self.call_value.lock().unwrap().clone(),
        })
    }
}

#[derive(Default)]
pub struct FakeChain {
    views: Mutex<HashMap<String, Value>>,
    view_log: Mutex<Vec<(String, Value)>>,
    access_keys: Mutex<HashMap<String, Vec<String>>>,
    access_key_calls: AtomicUsize,
    generated: AtomicUsize,
    accounts: Mutex<HashMap<String, Arc<FakeAccount>>>,
    connects: AtomicUsize,
}

impl FakeChain {
    pub fn set_view(&self, method: &str, v: Value) {
        self.views.lock().unwrap().insert(method.to_string(), v);
    }

    pub fn last_view(&self) -> Option<(String, Value)> {
        self.view_log.lock().unwrap().last().cloned()
    }

    pub fn view_calls(&self) -> usize {
        self.view_log.lock().unwrap().len()
    }

    pub fn add_access_key(&self, account_id: &str, public_key: &str) {
        self.access_keys
            .lock()
            .unwrap()
            .entry(account_id.to_string())
            .or_default()
            .push(public_key.to_string());
    }

    /// Handle the chain hands out for `account_id` (created on first use).
    pub fn account(&self, account_id: &str) -> Arc<FakeAccount> {
        self.accounts
            .lock()
            .unwrap()
            .entry(account_id.to_string())
            .or_insert_with(|| {
                Arc::new(FakeAccount::new(AccountId::parse(account_id).unwrap()))
            })
            .clone()
    }

    /// Network reads plus signing handles built.
    pub fn external_calls(&self) -> usize {
        self.view_calls()
            + self.access_key_calls.load(Ordering::SeqCst)
            + self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    fn network_id(&self) -> &str {
        "testnet"
    }

    fn generate_key_pair(&self) -> Result<KeyPair> {
        let n = self.generated.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(KeyPair {
            public_key: format!("ed25519:gen{n}"),
            secret_key: format!("ed25519:secret{n}"),
        })
    }

    async fn access_keys(&self, account_id: &AccountId) -> Result<Vec<String>> {
        self.access_key_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .access_keys
            .lock()
            .unwrap()
            .get(account_id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn view(&self, _contract_id: &AccountId, method: &str, args: Value) -> Result<Value> {
        self.view_log
            .lock()
            .unwrap()
            .push((method.to_string(), args));
        Ok(self
            .views
            .lock()
            .unwrap()
            .get(method)
            .cloned()
            .unwrap_or(Value::Null))
    }

    fn connect(&self, credential: &Credential) -> Result<Arc<dyn AccountHandle>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let account: Arc<dyn AccountHandle> = self.account(credential.account_id.as_str());
        Ok(account)
    }
}

#[derive(Default)]
pub struct FakeStorage {
    uploads: Mutex<Vec<NftUpload>>,
}

impl FakeStorage {
    pub fn uploads(&self) -> Vec<NftUpload> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl NftStorage for FakeStorage {
    async fn store_nft(&self, upload: NftUpload) -> Result<String> {
        self.uploads.lock().unwrap().push(upload);
        Ok("https://ipfs.io/ipfs/bafymeta/metadata.json".to_string())
    }

    async fn image_url_from_metadata(&self, _metadata_url: &str) -> Result<String> {
        Ok("https://dweb.link/ipfs/bafyimg/cat_alice.jpg".to_string())
    }
}

#[derive(Default)]
pub struct FakeMarket {
    stores: Mutex<HashMap<String, Store>>,
    metadata: Mutex<HashMap<String, ThingMetadata>>,
    calls: AtomicUsize,
}

impl FakeMarket {
    pub fn add_store(&self, store: Store) {
        self.stores.lock().unwrap().insert(store.id.clone(), store);
    }

    pub fn add_metadata(&self, thing_id: &str, meta: ThingMetadata) {
        self.metadata
            .lock()
            .unwrap()
            .insert(thing_id.to_string(), meta);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Marketplace for FakeMarket {
    async fn store(&self, store_id: &str) -> Result<Option<Store>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.stores.lock().unwrap().get(store_id).cloned())
    }

    async fn thing_metadata(&self, thing_id: &str) -> Result<ThingMetadata> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.metadata
            .lock()
            .unwrap()
            .get(thing_id)
            .cloned()
            .ok_or_else(|| Error::External(format!("unknown thing {thing_id}")))
    }
}

/// Everything a dispatcher test needs, with handles kept for assertions.
pub struct Harness {
    pub dir: PathBuf,
    pub messenger: Arc<FakeMessenger>,
    pub chain: Arc<FakeChain>,
    pub storage: Arc<FakeStorage>,
    pub market: Arc<FakeMarket>,
}

impl Harness {
    pub fn new(name: &str) -> Self {
        Self {
            dir: temp_dir(name),
            messenger: Arc::new(FakeMessenger::default()),
            chain: Arc::new(FakeChain::default()),
            storage: Arc::new(FakeStorage::default()),
            market: Arc::new(FakeMarket::default()),
        }
    }

    pub fn config(&self) -> Config {
        test_config(&self.dir)
    }

    pub fn backends(&self) -> Backends {
        Backends {
            chain: self.chain.clone(),
            storage: self.storage.clone(),
            market: self.market.clone(),
        }
    }

    /// Total calls that left the process (chain, storage, marketplace).
    pub fn external_calls(&self) -> usize {
        self.chain.external_calls() + self.storage.uploads().len() + self.market.calls()
    }
}
