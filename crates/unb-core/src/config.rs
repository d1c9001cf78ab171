use std::{
    env, fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::AccountId, errors::Error, Result};

/// Endpoints that differ between NEAR networks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkEndpoints {
    pub network_id: String,
    pub rpc_url: String,
    pub wallet_url: String,
    pub explorer_url: String,
}

impl NetworkEndpoints {
    pub fn for_network(network_id: &str) -> Result<Self> {
        let (rpc, wallet, explorer) = match network_id {
            "testnet" => (
                "https://rpc.testnet.near.org",
                "https://wallet.testnet.near.org",
                "https://explorer.testnet.near.org",
            ),
            "mainnet" => (
                "https://rpc.mainnet.near.org",
                "https://wallet.near.org",
                "https://explorer.near.org",
            ),
            other => {
                return Err(Error::Config(format!(
                    "NEAR_NETWORK must be testnet or mainnet, got {other:?}"
                )))
            }
        };
        Ok(Self {
            network_id: network_id.to_string(),
            rpc_url: rpc.to_string(),
            wallet_url: wallet.to_string(),
            explorer_url: explorer.to_string(),
        })
    }
}

/// Typed configuration, loaded from the environment (and `.env` if present).
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub webhook_url: Option<String>,
    pub listen_addr: SocketAddr,

    // NEAR
    pub near: NetworkEndpoints,
    pub nft_contract: AccountId,
    pub dao_contract: AccountId,

    // NFT.Storage / IPFS
    pub nft_storage_token: String,
    pub nft_storage_api_url: String,
    pub ipfs_metadata_gateway: String,
    pub ipfs_media_gateway: String,

    // Mintbase
    pub mintbase_api_url: String,
    pub mintbase_metadata_url: String,
    pub mintbase_site_url: String,

    // Sputnik DAO UI
    pub sputnik_ui_url: String,

    // Local state
    pub credentials_dir: PathBuf,
    pub session_file: PathBuf,
    pub groups_file: PathBuf,

    pub http_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let webhook_url = env_str("WEBHOOK_URL").and_then(non_empty);
        let port = env_u16("PORT").unwrap_or(8443);
        let listen_addr = SocketAddr::from(([0, 0, 0, 0], port));

        // Network selection; individual endpoints can still be overridden.
        let network_id = env_str("NEAR_NETWORK")
            .and_then(non_empty)
            .unwrap_or_else(|| "testnet".to_string());
        let mut near = NetworkEndpoints::for_network(network_id.trim())?;
        if let Some(v) = env_str("NEAR_RPC_URL").and_then(non_empty) {
            near.rpc_url = v;
        }
        if let Some(v) = env_str("NEAR_WALLET_URL").and_then(non_empty) {
            near.wallet_url = v;
        }
        if let Some(v) = env_str("NEAR_EXPLORER_URL").and_then(non_empty) {
            near.explorer_url = v;
        }

        let nft_contract = env_account("NFT_CONTRACT_ADDRESS", "nft-final.test-testing.testnet")?;
        let dao_contract = env_account("DAO_CONTRACT_ADDRESS", "near-week.sputnikv2.testnet")?;

        let nft_storage_token = env_str("NFT_STORAGE_TOKEN").unwrap_or_default();
        let nft_storage_api_url = env_url("NFT_STORAGE_API_URL", "https://api.nft.storage");
        let ipfs_metadata_gateway = env_url("IPFS_METADATA_GATEWAY", "https://ipfs.io/ipfs");
        let ipfs_media_gateway = env_url("IPFS_MEDIA_GATEWAY", "https://dweb.link/ipfs");

        let mintbase_api_url = env_url(
            "MINTBASE_API_URL",
            "https://mintbase-testnet.hasura.app/api/rest",
        );
        let mintbase_metadata_url = env_url("MINTBASE_METADATA_URL", "https://arweave.net");
        let mintbase_site_url = env_url("MINTBASE_SITE_URL", "https://testnet.mintbase.io");
        let sputnik_ui_url = env_url("SPUTNIK_UI_URL", "https://testnet-v2.sputnik.fund");

        let credentials_dir =
            env_path("CREDENTIALS_DIR").unwrap_or_else(|| ".near-credentials".into());
        let session_file =
            env_path("SESSION_FILE").unwrap_or_else(|| "usenear-sessions.json".into());
        let groups_file = env_path("GROUPS_FILE").unwrap_or_else(|| "usenear-groups.json".into());

        fs::create_dir_all(credentials_dir.join(&near.network_id))?;

        let http_timeout = Duration::from_secs(env_u64("HTTP_TIMEOUT_SECS").unwrap_or(30));

        Ok(Self {
            telegram_bot_token,
            webhook_url,
            listen_addr,
            near,
            nft_contract,
            dao_contract,
            nft_storage_token,
            nft_storage_api_url,
            ipfs_metadata_gateway,
            ipfs_media_gateway,
            mintbase_api_url,
            mintbase_metadata_url,
            mintbase_site_url,
            sputnik_ui_url,
            credentials_dir,
            session_file,
            groups_file,
            http_timeout,
        })
    }

    /// `<wallet>/login?title=tgbot&public_key=<pk>`: the page that adds our key to an account.
    pub fn wallet_login_url(&self, public_key: &str) -> String {
        format!(
            "{}/login?title=tgbot&public_key={public_key}",
            self.near.wallet_url
        )
    }

    pub fn collectibles_url(&self) -> String {
        format!("{}/?tab=collectibles", self.near.wallet_url)
    }

    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        format!("{}/transactions/{tx_hash}", self.near.explorer_url)
    }

    pub fn sputnik_proposal_url(&self, proposal_id: u64) -> String {
        format!(
            "{}/#/{}/{proposal_id}",
            self.sputnik_ui_url, self.dao_contract
        )
    }

    pub fn mintbase_thing_url(&self, thing_id: &str) -> String {
        format!("{}/thing/{thing_id}", self.mintbase_site_url)
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u16(key: &str) -> Option<u16> {
    env_str(key).and_then(|s| s.trim().parse::<u16>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

/// URL-ish values are stored without a trailing slash so callers can `format!` paths.
fn env_url(key: &str, default: &str) -> String {
    env_str(key)
        .and_then(non_empty)
        .unwrap_or_else(|| default.to_string())
        .trim()
        .trim_end_matches('/')
        .to_string()
}

fn env_account(key: &str, default: &str) -> Result<AccountId> {
    let raw = env_str(key)
        .and_then(non_empty)
        .unwrap_or_else(|| default.to_string());
    AccountId::parse(&raw)
        .ok_or_else(|| Error::Config(format!("{key} is not a valid NEAR account id: {raw}")))
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
