//! Init Command - Create configuration and a local identity

use std::fs;
use std::path::PathBuf;

use clap::Args;
use secretbox::fhe::{LocalSigner, SigningIdentity};
use secretbox::primitives::encode_hex;
use tracing::info;

use super::Paths;
use crate::config::{identity_key_path, SecretBoxConfig};

/// Initialize a client data directory
#[derive(Args)]
pub struct InitCommand {
    /// Force overwrite existing configuration and identity
    #[arg(short, long)]
    force: bool,
}

impl InitCommand {
    pub async fn execute(
        self,
        network: &str,
        config_path: Option<PathBuf>,
        data_dir: Option<PathBuf>,
    ) -> anyhow::Result<()> {
        let paths = Paths::resolve(network, config_path, data_dir);
        let key_path = identity_key_path(&paths.data_dir);

        info!("Initializing SecretBox client for {} network", network);
        info!("Data directory: {}", paths.data_dir.display());

        if paths.config.exists() && !self.force {
            anyhow::bail!(
                "Already initialized at {}. Use --force to overwrite.",
                paths.data_dir.display()
            );
        }

        fs::create_dir_all(&paths.data_dir)?;

        let config = SecretBoxConfig::for_network(network);
        config.save(&paths.config)?;
        info!("Configuration saved to {}", paths.config.display());

        let signer = if key_path.exists() && !self.force {
            super::load_signer(&paths.data_dir)?
        } else {
            let signer = LocalSigner::generate();
            fs::write(&key_path, encode_hex(&signer.seed()))?;
            info!("Identity key written to {}", key_path.display());
            signer
        };

        println!();
        println!("SecretBox client initialized");
        println!();
        println!("Configuration: {}", paths.config.display());
        println!("Data directory: {}", paths.data_dir.display());
        println!("Identity:      {}", signer.address());
        println!();
        println!("To open a box:");
        println!("  secretbox open --box 0 --data-dir {}", paths.data_dir.display());

        Ok(())
    }
}
