//! Catalog Command - Read numberOfBoxes from the contract

use std::path::PathBuf;

use clap::Args;
use secretbox::contracts::ChainAdapter;

use super::{build_chain, Paths};

/// Show how many boxes the contract offers
#[derive(Args)]
pub struct CatalogCommand {}

impl CatalogCommand {
    pub async fn execute(
        self,
        network: &str,
        config_path: Option<PathBuf>,
        data_dir: Option<PathBuf>,
    ) -> anyhow::Result<()> {
        let paths = Paths::resolve(network, config_path, data_dir);
        let config = paths.load_config()?;
        let chain = build_chain(&config).await?;

        let number_of_boxes = chain.number_of_boxes().await?;
        println!("Contract:        {}", config.network.contract);
        println!("Number of boxes: {}", number_of_boxes);
        Ok(())
    }
}
