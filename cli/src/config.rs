//! Client Configuration
//!
//! Handles loading and saving client configuration from TOML files.

use std::fs;
use std::path::{Path, PathBuf};

use secretbox::primitives::Address;
use secretbox::{CHAIN_ID, CONTRACT_ADDRESS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Full client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretBoxConfig {
    /// Chain settings
    #[serde(default)]
    pub network: NetworkSettings,

    /// Encryption gateway settings
    #[serde(default)]
    pub gateway: GatewaySettings,

    /// Storage settings
    #[serde(default)]
    pub storage: StorageSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl SecretBoxConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Create configuration for a specific network
    pub fn for_network(network: &str) -> Self {
        match network {
            "sepolia" => Self::sepolia(),
            _ => Self::local(),
        }
    }

    /// Everything in-process: in-memory chain and mock gateway
    pub fn local() -> Self {
        Self {
            network: NetworkSettings {
                name: "local".to_string(),
                backend: ChainBackend::Mock,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Sepolia deployment over JSON-RPC
    pub fn sepolia() -> Self {
        Self {
            network: NetworkSettings {
                name: "sepolia".to_string(),
                backend: ChainBackend::Rpc,
                rpc_url: "http://127.0.0.1:8545".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Contract address as configured
    pub fn contract(&self) -> Result<Address, ConfigError> {
        self.network
            .contract
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("contract address: {e}")))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.contract()?;

        if self.network.backend == ChainBackend::Rpc && self.network.rpc_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "rpc backend requires network.rpc_url".to_string(),
            ));
        }

        if self.network.number_of_boxes == 0 {
            return Err(ConfigError::Invalid(
                "number_of_boxes must be greater than 0".to_string(),
            ));
        }

        if self.network.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        // zero would make the mock skip its suspension points
        if self.gateway.encrypt_delay_ms == 0 || self.gateway.decrypt_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "gateway delays must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Which chain adapter to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainBackend {
    /// In-memory chain simulator
    Mock,
    /// JSON-RPC endpoint
    Rpc,
}

/// Chain settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Network name (local, sepolia)
    pub name: String,

    /// Chain adapter backend
    pub backend: ChainBackend,

    /// JSON-RPC endpoint (rpc backend)
    pub rpc_url: String,

    /// Expected chain id
    pub chain_id: u64,

    /// SecretBox contract address
    pub contract: String,

    /// Boxes deployed on the in-memory chain (mock backend)
    pub number_of_boxes: u8,

    /// Delay before the in-memory chain confirms (mock backend)
    pub confirm_delay_ms: u64,

    /// Receipt polling interval (rpc backend)
    pub poll_interval_ms: u64,

    /// Give up waiting for a receipt after this long (rpc backend)
    pub confirmation_timeout_secs: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            name: "local".to_string(),
            backend: ChainBackend::Mock,
            rpc_url: String::new(),
            chain_id: CHAIN_ID,
            contract: CONTRACT_ADDRESS.to_hex(),
            number_of_boxes: 5,
            confirm_delay_ms: 1500,
            poll_interval_ms: 2000,
            confirmation_timeout_secs: 180,
        }
    }
}

/// Encryption gateway settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Mock encryption latency
    pub encrypt_delay_ms: u64,

    /// Mock decryption latency
    pub decrypt_delay_ms: u64,

    /// Always reveal this reward (mock)
    pub fixed_reward: Option<u64>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            encrypt_delay_ms: 500,
            decrypt_delay_ms: 1000,
            fixed_reward: None,
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Progress database; defaults to `<data-dir>/progress.db`
    pub path: Option<PathBuf>,
}

impl StorageSettings {
    pub fn resolve(&self, data_dir: &Path) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| data_dir.join("progress.db"))
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level
    pub level: String,

    /// Output format (text, json)
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Get default data directory
pub fn default_data_dir(network: &str) -> PathBuf {
    let base = directories::ProjectDirs::from("io", "secretbox", "secretbox")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".secretbox"));

    base.join(network)
}

/// Get default config file path
pub fn default_config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}

/// Get identity key file path
pub fn identity_key_path(data_dir: &Path) -> PathBuf {
    data_dir.join("identity.key")
}
