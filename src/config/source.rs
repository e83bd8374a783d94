//! Route table sources: a JSON route file or the route store.
//!
//! Two file layouts are accepted:
//!
//! ```text
//! { "docs": "https://example.com/docs", "/blog": "https://blog.example.com" }
//!
//! [ { "path": "docs", "url": "https://example.com/docs" } ]
//! ```
//!
//! In the array form `key` and `target` are accepted as aliases for `path`
//! and `url`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::config::validation::{format_errors, validate_routes, ValidationError};
use crate::routing::RouteTable;
use crate::store::{BatchReport, RouteRecord, RouteStore, StoreError};

/// Errors from reading or validating a route file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read route file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed route file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid routes: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// Errors from loading a route table out of any source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("route file {path}: {source}")]
    File { path: PathBuf, source: ConfigError },

    #[error("route store: {0}")]
    Store(#[from] StoreError),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RouteFile {
    Map(BTreeMap<String, String>),
    List(Vec<RouteEntry>),
}

#[derive(Deserialize)]
struct RouteEntry {
    #[serde(alias = "key")]
    path: String,
    #[serde(alias = "target")]
    url: String,
}

/// Parse and validate route file content.
pub fn parse_routes(content: &str) -> Result<RouteTable, ConfigError> {
    let entries: Vec<(String, String)> = match serde_json::from_str(content)? {
        RouteFile::Map(map) => map.into_iter().collect(),
        RouteFile::List(list) => list.into_iter().map(|e| (e.path, e.url)).collect(),
    };

    validate_routes(&entries).map_err(ConfigError::Validation)?;

    Ok(entries.into_iter().collect())
}

/// Read and parse a route file.
pub fn load_from_file(path: &Path) -> Result<RouteTable, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_routes(&content)
}

/// Project every stored record into a route table, dropping hit counts.
pub fn load_from_store(store: &RouteStore) -> Result<RouteTable, StoreError> {
    let records = store.get_all()?;
    Ok(records.into_values().map(|r| (r.key, r.target)).collect())
}

/// Write a table into the store, keeping existing hit counts.
///
/// Only new or retargeted keys are written. Keys missing from the table are
/// left in the store.
pub fn sync_to_store(table: &RouteTable, store: &RouteStore) -> Result<BatchReport, StoreError> {
    let existing = store.get_all()?;

    let changed: Vec<RouteRecord> = table
        .iter()
        .filter(|(key, target)| existing.get(*key).map(|r| r.target.as_str()) != Some(*target))
        .map(|(key, target)| RouteRecord {
            key: key.to_string(),
            target: target.to_string(),
            hit_count: existing.get(key).map(|r| r.hit_count).unwrap_or(0),
        })
        .collect();

    store.put_all(changed)
}

/// Where the live route table is loaded from.
#[derive(Clone)]
pub enum RouteSource {
    /// A route file, optionally mirrored into a store after each load.
    File {
        path: PathBuf,
        mirror: Option<RouteStore>,
    },
    /// The route store itself.
    Store(RouteStore),
}

impl RouteSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
            mirror: None,
        }
    }

    pub fn store(store: RouteStore) -> Self {
        Self::Store(store)
    }

    /// Mirror file loads into `store`. No effect on a store source.
    pub fn mirrored_to(self, store: RouteStore) -> Self {
        match self {
            Self::File { path, .. } => Self::File {
                path,
                mirror: Some(store),
            },
            other => other,
        }
    }

    /// Build a fresh table from the current contents of the source.
    ///
    /// Blocking; call from a blocking task when on the async runtime.
    pub fn load(&self) -> Result<RouteTable, SourceError> {
        match self {
            Self::File { path, mirror } => {
                let table = load_from_file(path).map_err(|source| SourceError::File {
                    path: path.clone(),
                    source,
                })?;

                if let Some(store) = mirror {
                    match sync_to_store(&table, store) {
                        Ok(report) if report.written > 0 => {
                            tracing::debug!(written = report.written, transactions = report.transactions, "Mirrored routes into store");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to mirror routes into store");
                        }
                    }
                }

                Ok(table)
            }
            Self::Store(store) => Ok(load_from_store(store)?),
        }
    }

    /// The file to watch for changes, if any.
    pub fn watch_path(&self) -> Option<&Path> {
        match self {
            Self::File { path, .. } => Some(path.as_path()),
            Self::Store(_) => None,
        }
    }
}
