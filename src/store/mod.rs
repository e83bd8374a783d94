//! Persistent route store.
//!
//! # Data Flow
//! ```text
//! RouteRecord
//!     → record.rs (MessagePack, named fields)
//!     → backend.rs (KvBackend: redb table "routes", key = record key)
//!
//! put_all(records):
//!     set → TxnTooBig? → commit current txn → open new txn → retry same record
//!
//! redirect hits:
//!     hits.rs (in-memory counts per key) → periodic add_hits batch
//! ```
//!
//! # Design Decisions
//! - One writer at a time, many readers; isolation comes from the backend
//! - Undecodable values read as "absent", never as a panic
//! - A batch never silently drops a record: it either commits all of them
//!   or returns an error

pub mod backend;
pub mod hits;
pub mod record;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

pub use backend::{KvBackend, RedbBackend, StoreLocation, TxnLimits, WriteBatch};
pub use hits::HitRecorder;
pub use record::{CodecError, RouteRecord};

/// Errors from the route store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage engine reported a failure.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Filesystem failure while preparing the store location.
    #[error("failed to prepare store directory {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The current write transaction cannot take another entry.
    #[error("transaction size limit reached")]
    TxnTooBig,

    /// A single record exceeds the limit of an empty transaction.
    #[error("record '{key}' does not fit in a single transaction")]
    RecordTooLarge { key: String },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Outcome of a [`RouteStore::put_all`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Records written.
    pub written: usize,
    /// Transactions committed to write them.
    pub transactions: usize,
}

#[derive(Default)]
struct Progress {
    report: BatchReport,
    /// Writes in the open transaction.
    staged: usize,
    /// Writes in transactions that already committed.
    committed: usize,
}

/// Typed handle over a [`KvBackend`].
///
/// Cheap to clone; all clones share the same database.
pub struct RouteStore<B: KvBackend = RedbBackend> {
    backend: Arc<B>,
}

impl<B: KvBackend> Clone for RouteStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
        }
    }
}

impl RouteStore<RedbBackend> {
    /// Open the store with default transaction limits.
    pub fn open(location: &StoreLocation) -> Result<Self, StoreError> {
        Self::open_with_limits(location, TxnLimits::default())
    }

    /// Open the store with explicit transaction limits.
    pub fn open_with_limits(location: &StoreLocation, limits: TxnLimits) -> Result<Self, StoreError> {
        let backend = RedbBackend::open(location, limits)?;
        tracing::info!(location = ?location, max_txn_bytes = limits.max_bytes, max_txn_entries = limits.max_entries, "Route store opened");
        Ok(Self::with_backend(backend))
    }
}

impl<B: KvBackend> RouteStore<B> {
    /// Wrap an already opened backend.
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Look up a single record.
    ///
    /// Missing keys, read failures and undecodable values all yield `None`.
    pub fn get(&self, key: &str) -> Option<RouteRecord> {
        let bytes = match self.backend.get(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Route store read failed");
                return None;
            }
        };

        match RouteRecord::decode(&bytes) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Skipping undecodable route record");
                None
            }
        }
    }

    /// Save one record in its own transaction.
    pub fn put(&self, record: &RouteRecord) -> Result<(), StoreError> {
        let bytes = record.encode()?;
        let mut batch = self.backend.begin_write()?;
        match batch.set(&record.key, &bytes) {
            Err(StoreError::TxnTooBig) => Err(StoreError::RecordTooLarge {
                key: record.key.clone(),
            }),
            other => other,
        }?;
        batch.commit()
    }

    /// Save many records, splitting across transactions as needed.
    ///
    /// A record that hits the transaction limit is retried in a fresh
    /// transaction after the current one commits. Any other write failure
    /// aborts the uncommitted remainder and is returned; transactions that
    /// already committed stay committed.
    pub fn put_all<I>(&self, records: I) -> Result<BatchReport, StoreError>
    where
        I: IntoIterator<Item = RouteRecord>,
    {
        let mut records = records.into_iter().peekable();
        let mut progress = Progress::default();
        if records.peek().is_none() {
            return Ok(progress.report);
        }

        let mut batch = self.backend.begin_write()?;
        for record in records {
            let bytes = record.encode()?;
            batch = match self.stage(batch, &mut progress, &record.key, &bytes) {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::error!(key = %record.key, committed = progress.committed, error = %e, "Write batch aborted");
                    return Err(e);
                }
            };
        }

        batch.commit()?;
        progress.report.transactions += 1;
        Ok(progress.report)
    }

    /// Read every decodable record under one read transaction.
    pub fn get_all(&self) -> Result<BTreeMap<String, RouteRecord>, StoreError> {
        let mut records = BTreeMap::new();
        for (key, bytes) in self.backend.scan()? {
            match RouteRecord::decode(&bytes) {
                Ok(record) => {
                    records.insert(key, record);
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Skipping undecodable route record");
                }
            }
        }
        Ok(records)
    }

    /// Remove a record. Removing a missing key is not an error.
    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut batch = self.backend.begin_write()?;
        batch.delete(key)?;
        batch.commit()
    }

    /// Add accumulated hit counts, one `(key, target, hits)` per key.
    ///
    /// Each counter is read and rewritten inside the same write transaction,
    /// so a concurrent retarget is never overwritten with a stale target. A
    /// key with no decodable record is created pointing at `target`. Splits
    /// across transactions like [`RouteStore::put_all`].
    pub fn add_hits<I>(&self, hits: I) -> Result<BatchReport, StoreError>
    where
        I: IntoIterator<Item = (String, String, u64)>,
    {
        let mut hits = hits.into_iter().peekable();
        let mut progress = Progress::default();
        if hits.peek().is_none() {
            return Ok(progress.report);
        }

        let mut batch = self.backend.begin_write()?;
        for (key, target, count) in hits {
            let mut record = batch
                .get(&key)?
                .and_then(|bytes| RouteRecord::decode(&bytes).ok())
                .unwrap_or_else(|| RouteRecord::new(key.clone(), target));
            record.hit_count = record.hit_count.saturating_add(count);

            let bytes = record.encode()?;
            batch = self.stage(batch, &mut progress, &key, &bytes)?;
        }

        batch.commit()?;
        progress.report.transactions += 1;
        Ok(progress.report)
    }

    /// Stage one write, committing and reopening the batch when it is full.
    fn stage(&self, mut batch: B::Batch, progress: &mut Progress, key: &str, bytes: &[u8]) -> Result<B::Batch, StoreError> {
        match batch.set(key, bytes) {
            Ok(()) => {}
            Err(StoreError::TxnTooBig) if progress.staged == 0 => {
                return Err(StoreError::RecordTooLarge { key: key.to_string() });
            }
            Err(StoreError::TxnTooBig) => {
                batch.commit()?;
                progress.report.transactions += 1;
                progress.committed = progress.report.written;
                progress.staged = 0;
                tracing::debug!(
                    committed = progress.committed,
                    transactions = progress.report.transactions,
                    "Write batch full, continuing in a new transaction"
                );

                batch = self.backend.begin_write()?;
                match batch.set(key, bytes) {
                    Err(StoreError::TxnTooBig) => {
                        return Err(StoreError::RecordTooLarge { key: key.to_string() });
                    }
                    other => other?,
                }
            }
            Err(e) => return Err(e),
        }

        progress.staged += 1;
        progress.report.written += 1;
        Ok(batch)
    }

    /// Write raw bytes under `key`, bypassing the codec.
    #[cfg(test)]
    pub(crate) fn put_raw(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let mut batch = self.backend.begin_write()?;
        batch.set(key, bytes)?;
        batch.commit()
    }
}
