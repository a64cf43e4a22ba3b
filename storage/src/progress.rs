//! Per-identity progress counters
//!
//! Each identity owns two entries, `<prefix>-<lowercased identity>` for the
//! open count and the cumulative reward, both stored as decimal strings.
//! Reads are lenient and writes are best-effort: a session never fails
//! because of this store. Counters whose write failed stay authoritative in
//! this process until a later write for the same identity succeeds.
//!
//! [`ProgressStore::update`] is the only read-modify-write path; updates of
//! one identity are serialized so concurrent credits are never lost.

use crate::backend::KeyValueBackend;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Prefix of the opened-count entry
pub const BOXES_OPENED_PREFIX: &str = "secretbox-boxes-opened";

/// Prefix of the cumulative-reward entry
pub const TOTAL_REWARD_PREFIX: &str = "secretbox-total-reward";

/// Durable counters of one identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProgress {
    pub boxes_opened: u32,
    pub total_reward: u64,
}

impl UserProgress {
    /// Count one revealed box worth `reward`
    pub fn record(&mut self, reward: u64, max_opens: u32) {
        self.boxes_opened = self.boxes_opened.saturating_add(1).min(max_opens);
        self.total_reward = self.total_reward.saturating_add(reward);
    }

    pub fn has_reached(&self, max_opens: u32) -> bool {
        self.boxes_opened >= max_opens
    }

    pub fn opens_left(&self, max_opens: u32) -> u32 {
        max_opens.saturating_sub(self.boxes_opened)
    }
}

/// Storage key for `prefix` and `identity`
pub fn progress_key(prefix: &str, identity: &str) -> String {
    format!("{}-{}", prefix, identity.to_lowercase())
}

/// Progress store over any [`KeyValueBackend`]
pub struct ProgressStore {
    backend: Arc<dyn KeyValueBackend>,
    max_opens: u32,
    write_failures: AtomicU64,
    /// Per-identity locks held across load, modify and save
    update_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Counters whose last write failed, keyed by lowercased identity
    unsaved: RwLock<HashMap<String, UserProgress>>,
}

impl ProgressStore {
    pub fn new(backend: Arc<dyn KeyValueBackend>, max_opens: u32) -> Self {
        Self {
            backend,
            max_opens,
            write_failures: AtomicU64::new(0),
            update_locks: Mutex::new(HashMap::new()),
            unsaved: RwLock::new(HashMap::new()),
        }
    }

    pub fn max_opens(&self) -> u32 {
        self.max_opens
    }

    /// Number of writes that failed since startup
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    /// Load the counters of `identity`; never fails.
    ///
    /// Missing, unreadable, non-numeric or negative values read as zero. An
    /// open count above the limit is clamped to the limit.
    pub fn load(&self, identity: &str) -> UserProgress {
        if let Some(progress) = self.unsaved.read().get(&identity.to_lowercase()) {
            return *progress;
        }

        let opened = self
            .read_number(&progress_key(BOXES_OPENED_PREFIX, identity))
            .map(|n| n.min(u128::from(self.max_opens)) as u32)
            .unwrap_or(0);
        let reward = self
            .read_number(&progress_key(TOTAL_REWARD_PREFIX, identity))
            .map(|n| u64::try_from(n).unwrap_or(u64::MAX))
            .unwrap_or(0);

        UserProgress {
            boxes_opened: opened,
            total_reward: reward,
        }
    }

    /// Atomically load, modify and save the counters of `identity`.
    ///
    /// Returns the updated counters, which are authoritative even if the
    /// write fails.
    pub fn update<F>(&self, identity: &str, f: F) -> UserProgress
    where
        F: FnOnce(&mut UserProgress),
    {
        let lock = self
            .update_locks
            .lock()
            .entry(identity.to_lowercase())
            .or_default()
            .clone();
        let _guard = lock.lock();

        let mut progress = self.load(identity);
        f(&mut progress);
        progress.boxes_opened = progress.boxes_opened.min(self.max_opens);
        self.save(identity, &progress);
        progress
    }

    /// Persist `progress` for `identity`, overwriting what is stored.
    ///
    /// Failures are logged and counted, never returned.
    pub fn save(&self, identity: &str, progress: &UserProgress) {
        let entries = [
            (
                progress_key(BOXES_OPENED_PREFIX, identity),
                progress.boxes_opened.min(self.max_opens).to_string(),
            ),
            (
                progress_key(TOTAL_REWARD_PREFIX, identity),
                progress.total_reward.to_string(),
            ),
        ];

        let identity = identity.to_lowercase();
        match self.backend.set_many(&entries) {
            Ok(()) => {
                self.unsaved.write().remove(&identity);
            }
            Err(e) => {
                self.unsaved.write().insert(identity.clone(), *progress);
                let failures = self.write_failures.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    %identity,
                    error = %e,
                    failures,
                    "failed to persist progress"
                );
            }
        }
    }

    /// Whether the last write for `identity` failed
    pub fn is_unsaved(&self, identity: &str) -> bool {
        self.unsaved.read().contains_key(&identity.to_lowercase())
    }

    fn read_number(&self, key: &str) -> Option<u128> {
        let raw = match self.backend.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read progress");
                return None;
            }
        };
        match parse_counter(&raw) {
            Some(n) => Some(n),
            None => {
                tracing::warn!(key, value = %raw, "ignoring malformed progress value");
                None
            }
        }
    }
}

/// Parse a stored counter: a non-negative decimal integer
fn parse_counter(raw: &str) -> Option<u128> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // all-digit strings only fail to parse on overflow
    Some(trimmed.parse::<u128>().unwrap_or(u128::MAX))
}
