//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Open store → Load routes → Publish handler → Start listener
//!
//! Reload (reload.rs):
//!     SIGUSR1 / route file write → Load routes → Publish new handler
//!
//! Shutdown (shutdown.rs + http::server):
//!     SIGTERM/SIGINT → Stop accepting → Drain until deadline → Exit
//! ```
//!
//! # Design Decisions
//! - Fail fast at startup: no store or no usable routes means no traffic
//! - Failures after startup are logged and the last good routes stay live
//! - Shutdown has a deadline: connections still open after it are dropped

pub mod reload;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use reload::{CoordinatorState, ReloadCoordinator, Triggers};
pub use shutdown::Shutdown;
