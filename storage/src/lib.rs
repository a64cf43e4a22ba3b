//! SecretBox Storage Layer
//!
//! Durable per-identity progress (boxes opened, cumulative reward) that
//! survives process restarts.
//!
//! # Architecture
//!
//! - [`KeyValueBackend`]: string key/value store with atomic multi-key writes
//! - [`RedbBackend`]: redb (an embedded database) implementation
//! - [`MemoryBackend`]: in-process implementation
//! - [`ProgressStore`]: lenient reads, best-effort writes

pub mod backend;
pub mod progress;
mod error;

pub use backend::{KeyValueBackend, MemoryBackend, RedbBackend};
pub use error::{StorageError, StorageResult};
pub use progress::{
    progress_key, ProgressStore, UserProgress, BOXES_OPENED_PREFIX, TOTAL_REWARD_PREFIX,
};

use std::path::PathBuf;
use std::sync::Arc;

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Database path; `None` keeps everything in memory
    pub path: Option<PathBuf>,
    /// Open-count ceiling applied on load and save
    pub max_opens: u32,
}

impl StorageConfig {
    pub fn on_disk(path: impl Into<PathBuf>, max_opens: u32) -> Self {
        Self {
            path: Some(path.into()),
            max_opens,
        }
    }

    pub fn in_memory(max_opens: u32) -> Self {
        Self {
            path: None,
            max_opens,
        }
    }
}

/// Open the progress store described by `config`
pub fn open_progress_store(config: &StorageConfig) -> StorageResult<ProgressStore> {
    let backend: Arc<dyn KeyValueBackend> = match &config.path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "opening progress database");
            Arc::new(RedbBackend::open(path)?)
        }
        None => Arc::new(MemoryBackend::new()),
    };
    Ok(ProgressStore::new(backend, config.max_opens))
}
