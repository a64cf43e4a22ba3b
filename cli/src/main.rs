//! SecretBox CLI
//!
//! Command-line client for opening SecretBox mystery boxes.
//!
//! # Usage
//!
//! ```bash
//! # Create config and a local identity (in-memory chain, mock gateway)
//! secretbox init
//!
//! # Target the Sepolia deployment over JSON-RPC
//! secretbox --network sepolia init
//!
//! # Open box 2, then boxes 0 and 4
//! secretbox open --box 2
//! secretbox open --box 0 --box 4
//!
//! # Show stored progress
//! secretbox status
//!
//! # Read numberOfBoxes from the contract
//! secretbox catalog
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod logging;

use commands::{CatalogCommand, InitCommand, OpenCommand, StatusCommand};

/// SecretBox client
#[derive(Parser)]
#[command(name = "secretbox")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Open encrypted mystery boxes", long_about = None)]
struct Cli {
    /// Network profile (local, sepolia)
    #[arg(short, long, global = true, default_value = "local")]
    network: String,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory
    #[arg(short, long, global = true, env = "SECRETBOX_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create configuration and a local identity
    Init(InitCommand),

    /// Open one or more boxes
    Open(OpenCommand),

    /// Show stored progress
    Status(StatusCommand),

    /// Show the contract's box count
    Catalog(CatalogCommand),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level, cli.json_logs)?;

    let network = cli.network.as_str();
    match cli.command {
        Commands::Init(cmd) => cmd.execute(network, cli.config, cli.data_dir).await,
        Commands::Open(cmd) => cmd.execute(network, cli.config, cli.data_dir).await,
        Commands::Status(cmd) => cmd.execute(network, cli.config, cli.data_dir).await,
        Commands::Catalog(cmd) => cmd.execute(network, cli.config, cli.data_dir).await,
        Commands::Version => {
            println!("secretbox {}", env!("CARGO_PKG_VERSION"));
            println!("Chain:    {}", secretbox::CHAIN_ID);
            println!("Contract: {}", secretbox::CONTRACT_ADDRESS);
            Ok(())
        }
    }
}
