//! Storage engine seam.
//!
//! [`RouteStore`](super::RouteStore) only talks to a [`KvBackend`]. The redb
//! implementation below is the one the server ships with; it also enforces a
//! per-transaction budget so oversize batches fail the same way they would on
//! an engine with a hard transaction limit.

use std::path::{Path, PathBuf};

use redb::backends::InMemoryBackend;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};

use super::StoreError;

const ROUTES: TableDefinition<&str, &[u8]> = TableDefinition::new("routes");

/// A transactional key → bytes engine.
pub trait KvBackend: Send + Sync + 'static {
    /// Write transaction type.
    type Batch: WriteBatch;

    /// Read one key in its own read transaction.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Open a write transaction.
    fn begin_write(&self) -> Result<Self::Batch, StoreError>;

    /// Read every entry, in key order, under a single read transaction.
    fn scan(&self) -> Result<Vec<(String, Vec<u8>)>, StoreError>;
}

/// An open write transaction.
///
/// Dropping a batch without calling [`WriteBatch::commit`] discards it.
pub trait WriteBatch {
    /// Read a key inside this transaction, seeing its own pending writes.
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Stage a write. Returns [`StoreError::TxnTooBig`] if the entry would
    /// push the transaction over the backend's limit; the batch is left
    /// unchanged in that case and can still be committed.
    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Stage a removal.
    fn delete(&mut self, key: &str) -> Result<(), StoreError>;

    /// Commit all staged changes atomically.
    fn commit(self) -> Result<(), StoreError>;
}

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// A database file on disk; parent directories are created on open.
    Path(PathBuf),
    /// A throwaway in-memory database.
    Memory,
}

/// Upper bounds for a single write transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxnLimits {
    /// Sum of key and value lengths staged in one transaction.
    pub max_bytes: usize,
    /// Number of writes staged in one transaction.
    pub max_entries: usize,
}

impl Default for TxnLimits {
    fn default() -> Self {
        Self {
            max_bytes: 8 * 1024 * 1024,
            max_entries: 10_000,
        }
    }
}

fn backend<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// redb-backed engine.
pub struct RedbBackend {
    db: Database,
    limits: TxnLimits,
}

impl RedbBackend {
    /// Open or create the database and make sure the routes table exists.
    pub fn open(location: &StoreLocation, limits: TxnLimits) -> Result<Self, StoreError> {
        let db = match location {
            StoreLocation::Path(path) => {
                create_parent(path)?;
                Database::create(path).map_err(backend)?
            }
            StoreLocation::Memory => Database::builder()
                .create_with_backend(InMemoryBackend::new())
                .map_err(backend)?,
        };

        let txn = db.begin_write().map_err(backend)?;
        txn.open_table(ROUTES).map_err(backend)?;
        txn.commit().map_err(backend)?;

        Ok(Self { db, limits })
    }
}

fn create_parent(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

impl KvBackend for RedbBackend {
    type Batch = RedbBatch;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let txn = self.db.begin_read().map_err(backend)?;
        let table = txn.open_table(ROUTES).map_err(backend)?;
        let value = table.get(key).map_err(backend)?.map(|v| v.value().to_vec());
        Ok(value)
    }

    fn begin_write(&self) -> Result<RedbBatch, StoreError> {
        Ok(RedbBatch {
            txn: self.db.begin_write().map_err(backend)?,
            limits: self.limits,
            pending_bytes: 0,
            pending_entries: 0,
        })
    }

    fn scan(&self) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let txn = self.db.begin_read().map_err(backend)?;
        let table = txn.open_table(ROUTES).map_err(backend)?;

        let mut entries = Vec::new();
        for item in table.iter().map_err(backend)? {
            let (k, v) = item.map_err(backend)?;
            entries.push((k.value().to_string(), v.value().to_vec()));
        }
        Ok(entries)
    }
}

/// Write transaction on a [`RedbBackend`].
pub struct RedbBatch {
    txn: WriteTransaction,
    limits: TxnLimits,
    pending_bytes: usize,
    pending_entries: usize,
}

impl WriteBatch for RedbBatch {
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let table = self.txn.open_table(ROUTES).map_err(backend)?;
        let value = table.get(key).map_err(backend)?.map(|v| v.value().to_vec());
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let cost = key.len() + value.len();
        if self.pending_bytes + cost > self.limits.max_bytes
            || self.pending_entries + 1 > self.limits.max_entries
        {
            return Err(StoreError::TxnTooBig);
        }

        let mut table = self.txn.open_table(ROUTES).map_err(backend)?;
        table.insert(key, value).map_err(backend)?;

        self.pending_bytes += cost;
        self.pending_entries += 1;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        let mut table = self.txn.open_table(ROUTES).map_err(backend)?;
        table.remove(key).map_err(backend)?;
        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        self.txn.commit().map_err(backend)
    }
}
