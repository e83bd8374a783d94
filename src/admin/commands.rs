//! Offline store maintenance commands.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::config::source::{load_from_file, sync_to_store, ConfigError};
use crate::config::validation::{format_errors, validate_routes, ValidationError};
use crate::routing::normalize_key;
use crate::store::{BatchReport, RouteRecord, RouteStore, StoreError};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("route file {path}: {source}")]
    File {
        path: String,
        source: ConfigError,
    },

    #[error("invalid route: {}", format_errors(.0))]
    Invalid(Vec<ValidationError>),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to encode listing: {0}")]
    Json(#[from] serde_json::Error),
}

/// Import every route in a route file, keeping existing hit counts.
pub fn import(store: &RouteStore, path: &Path) -> Result<BatchReport, CommandError> {
    let table = load_from_file(path).map_err(|source| CommandError::File {
        path: path.display().to_string(),
        source,
    })?;
    let report = sync_to_store(&table, store)?;
    tracing::info!(path = ?path, routes = table.len(), written = report.written, transactions = report.transactions, "Routes imported");
    Ok(report)
}

/// Save one route.
pub fn add(store: &RouteStore, key: &str, target: &str) -> Result<RouteRecord, CommandError> {
    validate_routes(&[(key.to_string(), target.to_string())]).map_err(CommandError::Invalid)?;

    let key = normalize_key(key);
    let hit_count = store.get(key).map(|r| r.hit_count).unwrap_or(0);
    let record = RouteRecord {
        key: key.to_string(),
        target: target.to_string(),
        hit_count,
    };
    store.put(&record)?;
    tracing::info!(key = %record.key, target = %record.target, "Route saved");
    Ok(record)
}

/// Delete one route. Returns whether it existed.
pub fn remove(store: &RouteStore, key: &str) -> Result<bool, CommandError> {
    let key = normalize_key(key);
    let existed = store.get(key).is_some();
    store.delete(key)?;
    tracing::info!(key = %key, existed = existed, "Route removed");
    Ok(existed)
}

#[derive(Serialize)]
struct ListedRoute<'a> {
    target: &'a str,
    hits: u64,
}

/// Every stored route as pretty-printed JSON, keyed by path.
pub fn list(store: &RouteStore) -> Result<String, CommandError> {
    let records = store.get_all()?;
    let listing: BTreeMap<String, ListedRoute<'_>> = records
        .values()
        .map(|r| {
            (
                format!("/{}", r.key),
                ListedRoute {
                    target: &r.target,
                    hits: r.hit_count,
                },
            )
        })
        .collect();
    Ok(serde_json::to_string_pretty(&listing)?)
}
