//! CLI Commands

mod catalog;
mod init;
mod open;
mod status;

pub use catalog::CatalogCommand;
pub use init::InitCommand;
pub use open::OpenCommand;
pub use status::StatusCommand;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use secretbox::contracts::{ChainAdapter, InMemoryChain, RpcChain, RpcChainConfig};
use secretbox::fhe::{LazyGateway, LocalSigner, MockConfig, RelayerConnector};
use secretbox::primitives::decode_hex;
use secretbox::storage::{open_progress_store, ProgressStore, StorageConfig};
use secretbox::{SessionConfig, SessionManager};
use tracing::{info, warn};

use crate::config::{
    default_config_path, default_data_dir, identity_key_path, ChainBackend, SecretBoxConfig,
};

/// Where a command finds its files
pub struct Paths {
    pub data_dir: PathBuf,
    pub config: PathBuf,
}

impl Paths {
    pub fn resolve(network: &str, config: Option<PathBuf>, data_dir: Option<PathBuf>) -> Self {
        let data_dir = data_dir.unwrap_or_else(|| default_data_dir(network));
        let config = config.unwrap_or_else(|| default_config_path(&data_dir));
        Self { data_dir, config }
    }

    pub fn load_config(&self) -> anyhow::Result<SecretBoxConfig> {
        SecretBoxConfig::load(&self.config).with_context(|| {
            format!(
                "loading {} (run `secretbox init` first)",
                self.config.display()
            )
        })
    }
}

/// Load the local signing identity
pub fn load_signer(data_dir: &Path) -> anyhow::Result<LocalSigner> {
    let path = identity_key_path(data_dir);
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("reading identity key {}", path.display()))?;
    let bytes = decode_hex(&raw)?;
    let seed: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("identity key must be 32 bytes, got {}", bytes.len()))?;
    Ok(LocalSigner::from_seed(seed))
}

/// Open the progress store configured for `data_dir`
pub fn open_store(config: &SecretBoxConfig, data_dir: &Path) -> anyhow::Result<Arc<ProgressStore>> {
    let path = config.storage.resolve(data_dir);
    let store = open_progress_store(&StorageConfig::on_disk(&path, secretbox::MAX_OPENS))
        .with_context(|| format!("opening progress database {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Build the configured chain adapter
pub async fn build_chain(config: &SecretBoxConfig) -> anyhow::Result<Arc<dyn ChainAdapter>> {
    let contract = config.contract()?;
    let network = &config.network;

    match network.backend {
        ChainBackend::Mock => {
            info!(number_of_boxes = network.number_of_boxes, "using in-memory chain");
            Ok(Arc::new(
                InMemoryChain::new(contract, network.number_of_boxes)
                    .with_confirm_delay(Duration::from_millis(network.confirm_delay_ms)),
            ))
        }
        ChainBackend::Rpc => {
            let chain = RpcChain::connect(
                &network.rpc_url,
                contract,
                RpcChainConfig {
                    poll_interval: Duration::from_millis(network.poll_interval_ms),
                    confirmation_timeout: Duration::from_secs(network.confirmation_timeout_secs),
                    ..Default::default()
                },
            )?;
            match chain.chain_id().await {
                Ok(id) if id != network.chain_id => {
                    anyhow::bail!("endpoint is on chain {id}, expected {}", network.chain_id)
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "could not verify chain id"),
            }
            info!(url = %network.rpc_url, "using JSON-RPC chain");
            Ok(Arc::new(chain))
        }
    }
}

/// Build a session manager over the configured backends
pub async fn build_manager(
    config: &SecretBoxConfig,
    data_dir: &Path,
) -> anyhow::Result<SessionManager> {
    let gateway = &config.gateway;
    let mut mock = MockConfig {
        encrypt_delay: Duration::from_millis(gateway.encrypt_delay_ms),
        decrypt_delay: Duration::from_millis(gateway.decrypt_delay_ms),
        ..Default::default()
    };
    if let Some(reward) = gateway.fixed_reward {
        mock = mock.with_fixed_reward(reward);
    }

    // no relayer SDK binding in this client; the connector falls back to the mock
    let connector = RelayerConnector::mock_only(mock);

    let session_config = SessionConfig {
        chain_id: config.network.chain_id,
        contract: config.contract()?,
        max_opens: secretbox::MAX_OPENS,
    };

    let manager = SessionManager::new(
        Arc::new(LazyGateway::new(Arc::new(connector))),
        build_chain(config).await?,
        open_store(config, data_dir)?,
        session_config,
    );
    manager
        .metrics()
        .add_label("chain", config.network.chain_id.to_string());
    Ok(manager)
}
