use std::sync::Arc;

use tracing::warn;

use unb_core::{config::Config, ports::Backends};
use unb_mintbase::MintbaseClient;
use unb_near::NearClient;
use unb_nftstorage::NftStorageClient;

#[tokio::main]
async fn main() -> Result<(), unb_core::Error> {
    unb_core::logging::init("unb")?;

    let cfg = Config::load()?;
    if cfg.nft_storage_token.trim().is_empty() {
        warn!("NFT_STORAGE_TOKEN is not set; /mintnft will fail");
    }

    let backends = Backends {
        chain: Arc::new(NearClient::new(
            cfg.near.network_id.clone(),
            cfg.near.rpc_url.clone(),
            cfg.http_timeout,
        )?),
        storage: Arc::new(NftStorageClient::from_config(&cfg)?),
        market: Arc::new(MintbaseClient::from_config(&cfg)?),
    };

    unb_telegram::router::run(cfg, backends)
        .await
        .map_err(|e| unb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
