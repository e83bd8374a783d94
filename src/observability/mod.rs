//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields
//!     → tower-http TraceLayer spans per request (with x-request-id)
//!
//! Consumers:
//!     → stdout, or an append-only log file
//! ```

pub mod logging;
