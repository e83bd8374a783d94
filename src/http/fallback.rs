//! Fallback chain for paths that are not redirect keys.

use axum::{
    http::{StatusCode, Uri},
    routing::get,
    Router,
};

use crate::http::assets::static_asset;
use crate::http::listing::list_routes;
use crate::store::RouteStore;

/// `/list`, `/static/*` and a catch-all 404, routed by path prefix.
pub fn fallback_router(store: RouteStore) -> Router {
    Router::new()
        .route("/list", get(list_routes))
        .route("/static/{*asset}", get(static_asset))
        .fallback(not_found)
        .with_state(store)
}

async fn not_found(uri: Uri) -> (StatusCode, &'static str) {
    tracing::debug!(path = %uri.path(), "Path not found");
    (StatusCode::NOT_FOUND, "404 page not found")
}
