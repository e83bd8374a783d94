//! Settings schema definitions.
//!
//! This module defines the server's own settings (not the route file).
//! All types derive Serde traits for deserialization from a TOML file.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::store::{StoreLocation, TxnLimits};

/// Root settings for the redirect server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Listener configuration (host, port).
    pub listener: ListenerConfig,

    /// Where routes come from.
    pub routes: RoutesConfig,

    /// Persistent route store.
    pub store: StoreConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind.
    pub host: String,

    /// TCP port.
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ListenerConfig {
    /// `host:port` string suitable for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Which backing source supplies the live route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// JSON route file, watched for changes.
    #[default]
    File,
    /// Route store; reload is signal-only.
    Store,
}

/// Route source configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Source kind.
    pub source: SourceKind,

    /// Route file path (default: `$HOME/.map.json`).
    pub file: PathBuf,

    /// Reload when the route file is written.
    pub watch: bool,

    /// Mirror file routes into the store so the listing page shows them.
    pub mirror_to_store: bool,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::File,
            file: home_dir().join(".map.json"),
            watch: true,
            mirror_to_store: true,
        }
    }
}

/// Route store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file (default: `$HOME/.map/store/routes.redb`).
    pub path: PathBuf,

    /// Keep the store in memory only.
    pub in_memory: bool,

    /// Byte budget for one write transaction.
    pub max_txn_bytes: usize,

    /// Entry budget for one write transaction.
    pub max_txn_entries: usize,

    /// Seconds between hit counter flushes.
    pub hit_flush_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let limits = TxnLimits::default();
        Self {
            path: home_dir().join(".map").join("store").join("routes.redb"),
            in_memory: false,
            max_txn_bytes: limits.max_bytes,
            max_txn_entries: limits.max_entries,
            hit_flush_secs: 5,
        }
    }
}

impl StoreConfig {
    pub fn location(&self) -> StoreLocation {
        if self.in_memory {
            StoreLocation::Memory
        } else {
            StoreLocation::Path(self.path.clone())
        }
    }

    pub fn limits(&self) -> TxnLimits {
        TxnLimits {
            max_bytes: self.max_txn_bytes,
            max_entries: self.max_txn_entries,
        }
    }

    pub fn hit_flush(&self) -> Duration {
        Duration::from_secs(self.hit_flush_secs)
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 120 }
    }
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long in-flight requests may run after a termination signal.
    pub grace_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_secs: 10 }
    }
}

impl ShutdownConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set.
    pub filter: String,

    /// Append logs to this file instead of stdout.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "urlmap=info,tower_http=info".to_string(),
            file: None,
        }
    }
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default()
}
