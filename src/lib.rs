//! Short-path redirect server with a hot-swappable route table.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod store;

pub use config::schema::Settings;
pub use http::{ActiveHandler, HttpServer};
pub use lifecycle::ReloadCoordinator;
pub use routing::RouteTable;
pub use store::{RouteRecord, RouteStore};
