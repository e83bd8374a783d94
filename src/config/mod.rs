//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML) + CLI flags
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → Settings (immutable)
//!
//! route file (JSON map or array) / route store
//!     → source.rs (parse, validate, freeze)
//!     → RouteTable
//!
//! On reload trigger:
//!     watcher.rs or SIGUSR1
//!     → source.rs builds a new RouteTable
//!     → lifecycle::reload publishes a new handler
//! ```
//!
//! # Design Decisions
//! - Settings are read once at startup; only routes are reloadable
//! - All settings fields have defaults to allow minimal files
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod source;
pub mod validation;
pub mod watcher;

pub use loader::{load_settings, SettingsError};
pub use schema::{ListenerConfig, Settings, SourceKind};
pub use source::{load_from_file, load_from_store, ConfigError, RouteSource, SourceError};
pub use watcher::ConfigWatcher;
