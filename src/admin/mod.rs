//! Store maintenance from the command line.
//!
//! These run against the store directly, so the server must not hold the
//! database open at the same time.

pub mod commands;

pub use commands::{add, import, list, remove, CommandError};
