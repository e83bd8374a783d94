//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route file or route store
//!     → config::source (parse, validate)
//!     → table.rs (normalize keys, freeze as RouteTable)
//!     → Arc<RouteTable> captured by a RedirectHandler
//!
//! Incoming request path
//!     → normalize_key (strip one leading '/')
//!     → RouteTable::resolve → target or miss
//! ```
//!
//! # Design Decisions
//! - Tables are immutable; a reload builds a new one
//! - O(1) exact-key lookup via HashMap, no prefix or pattern matching
//! - Keys are stored without the leading '/'

pub mod table;

pub use table::{normalize_key, RouteTable};
