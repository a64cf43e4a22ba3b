//! Status Command - Show stored progress of the local identity

use std::path::PathBuf;

use clap::Args;
use secretbox::fhe::SigningIdentity;
use secretbox::MAX_OPENS;

use super::{load_signer, open_store, Paths};

/// Show progress of the local identity
#[derive(Args)]
pub struct StatusCommand {
    /// Print as JSON
    #[arg(long)]
    json: bool,
}

impl StatusCommand {
    pub async fn execute(
        self,
        network: &str,
        config_path: Option<PathBuf>,
        data_dir: Option<PathBuf>,
    ) -> anyhow::Result<()> {
        let paths = Paths::resolve(network, config_path, data_dir);
        let config = paths.load_config()?;
        let signer = load_signer(&paths.data_dir)?;
        let store = open_store(&config, &paths.data_dir)?;

        let identity = signer.address();
        let progress = store.load(&identity.key());

        if self.json {
            let value = serde_json::json!({
                "identity": identity,
                "network": config.network.name,
                "contract": config.network.contract,
                "boxesOpened": progress.boxes_opened,
                "maxOpens": MAX_OPENS,
                "opensLeft": progress.opens_left(MAX_OPENS),
                "totalReward": progress.total_reward,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        }

        println!("Identity:     {}", identity);
        println!("Network:      {}", config.network.name);
        println!("Contract:     {}", config.network.contract);
        println!("Boxes opened: {}/{}", progress.boxes_opened, MAX_OPENS);
        println!("Total reward: {}", progress.total_reward);
        if progress.has_reached(MAX_OPENS) {
            println!();
            println!("Open limit reached for this identity.");
        }

        Ok(())
    }
}
