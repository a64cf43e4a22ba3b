//! Key/value backends for progress records

use crate::{StorageError, StorageResult};
use parking_lot::RwLock;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Table for progress entries
const PROGRESS: TableDefinition<&str, &str> = TableDefinition::new("progress");

/// String key/value store.
///
/// `set_many` must apply all entries or none.
pub trait KeyValueBackend: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    fn set_many(&self, entries: &[(String, String)]) -> StorageResult<()>;

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.set_many(&[(key.to_string(), value.to_string())])
    }
}

/// redb-backed store
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Open or create the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path.as_ref())?;
        Self::new(Arc::new(db))
    }

    /// Wrap an open database, creating the table if needed
    pub fn new(db: Arc<Database>) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PROGRESS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Number of stored entries
    pub fn count(&self) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROGRESS)?;
        Ok(table.len()?)
    }
}

impl KeyValueBackend for RedbBackend {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROGRESS)?;
        let value = table.get(key)?.map(|v| v.value().to_string());
        Ok(value)
    }

    fn set_many(&self, entries: &[(String, String)]) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PROGRESS)?;
            for (key, value) in entries {
                table.insert(key.as_str(), value.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }
}

/// In-process store, for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
    reject_writes: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (or succeed again)
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Write a raw value, bypassing write rejection
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries.write().insert(key.to_string(), value.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set_many(&self, entries: &[(String, String)]) -> StorageResult<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteRejected("memory backend is read-only".into()));
        }
        let mut map = self.entries.write();
        for (key, value) in entries {
            map.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}
