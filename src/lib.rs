//! SecretBox: private mystery-box opening
//!
//! A user picks one of several boxes; the choice is encrypted client-side,
//! submitted to the SecretBox contract which picks a reward on encrypted
//! data, and the encrypted reward handle is decrypted back for the user.
//! This crate is the orchestration core that drives that flow and keeps
//! per-identity progress.
//!
//! ## Crate Organization
//!
//! - `secretbox-primitives`: addresses, ciphertext handles, transaction hashes
//! - `secretbox-fhe`: encryption gateway (relayer adapter, mock, authorization)
//! - `secretbox-contracts`: contract ABI and chain submission adapters
//! - `secretbox-storage`: durable per-identity progress counters
//! - `secretbox` (this crate): session state machine and session manager

pub mod catalog;
pub mod config;
pub mod errors;
pub mod manager;
pub mod metrics;
pub mod session;

pub use secretbox_contracts as contracts;
pub use secretbox_fhe as fhe;
pub use secretbox_primitives as primitives;
pub use secretbox_storage as storage;

pub use catalog::BoxCatalog;
pub use config::{SessionConfig, CHAIN_ID, CONTRACT_ADDRESS, MAX_OPENS};
pub use errors::{SessionError, SessionResult};
pub use manager::SessionManager;
pub use metrics::SessionMetrics;
pub use session::{BoxSession, InFlight, SessionContext, SessionEvent, SessionSnapshot, SessionState};

/// SecretBox client version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{SessionConfig, CHAIN_ID, CONTRACT_ADDRESS, MAX_OPENS};
    pub use crate::manager::SessionManager;
    pub use crate::session::{BoxSession, SessionContext, SessionEvent, SessionSnapshot, SessionState};
    pub use crate::{SessionError, SessionResult};
    pub use secretbox_contracts::{ChainAdapter, ChainError, InMemoryChain, RpcChain};
    pub use secretbox_fhe::{
        EncryptionGateway, LazyGateway, LocalSigner, MockConfig, MockGateway, RelayerConnector,
        SigningIdentity,
    };
    pub use secretbox_primitives::{Address, Handle, TxHash};
    pub use secretbox_storage::{ProgressStore, UserProgress};
}
