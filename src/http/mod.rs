//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, ActiveHandler::current())
//!     → handler.rs (key lookup → 302 Found)
//!     → on miss: fallback.rs
//!         /list      → listing.rs (HTML from the route store)
//!         /static/*  → assets.rs (bundled files)
//!         otherwise  → 404
//! ```

pub mod assets;
pub mod fallback;
pub mod handler;
pub mod listing;
pub mod server;

pub use fallback::fallback_router;
pub use handler::{HandlerFactory, RedirectHandler};
pub use server::{ActiveHandler, DrainOutcome, HttpServer, ServerError, ServerHandle};
