//! Redirect handler and the factory that builds it.
//!
//! # Responsibilities
//! - Percent-decode the request path, strip one leading '/' and look it up
//! - Answer hits with 302 Found + Location
//! - Hand misses, untouched, to the fallback router
//! - Optionally count the hit
//!
//! # Design Decisions
//! - A handler owns an `Arc<RouteTable>` and never mutates it
//! - A path that does not decode to UTF-8 is a miss
//! - Hit counting is in-memory and cannot fail a redirect

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use percent_encoding::percent_decode_str;
use tower::ServiceExt;

use crate::routing::{normalize_key, RouteTable};
use crate::store::HitRecorder;

/// Serves redirects from one immutable route table.
#[derive(Clone)]
pub struct RedirectHandler {
    table: Arc<RouteTable>,
    fallback: Router,
    hits: Option<HitRecorder>,
}

impl RedirectHandler {
    /// Build a handler over `table` that delegates misses to `fallback`.
    pub fn build(table: Arc<RouteTable>, fallback: Router) -> Self {
        Self {
            table,
            fallback,
            hits: None,
        }
    }

    /// Count redirects with `hits`.
    pub fn with_hit_recorder(mut self, hits: HitRecorder) -> Self {
        self.hits = Some(hits);
        self
    }

    /// The table this handler resolves against.
    pub fn table(&self) -> &Arc<RouteTable> {
        &self.table
    }

    /// Handle one request.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let path = percent_decode_str(request.uri().path())
            .decode_utf8()
            .ok()
            .map(|decoded| decoded.into_owned());

        if let Some(path) = &path {
            let key = normalize_key(path);
            if let Some(target) = self.table.resolve(key) {
                tracing::debug!(key = %key, target = %target, "Redirecting");
                if let Some(hits) = &self.hits {
                    hits.record(key, target);
                }
                return found(target);
            }
        }

        let result: Result<Response, Infallible> = self.fallback.clone().oneshot(request).await;
        match result {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

/// `302 Found` pointing at `target`.
fn found(target: &str) -> Response {
    match HeaderValue::from_str(target) {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(_) => {
            tracing::error!(target = %target, "Redirect target is not a valid header value");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Builds [`RedirectHandler`]s that share one fallback chain.
#[derive(Clone)]
pub struct HandlerFactory {
    fallback: Router,
    hits: Option<HitRecorder>,
}

impl HandlerFactory {
    pub fn new(fallback: Router) -> Self {
        Self {
            fallback,
            hits: None,
        }
    }

    /// Count redirects of every built handler with `hits`.
    pub fn with_hit_recorder(mut self, hits: HitRecorder) -> Self {
        self.hits = Some(hits);
        self
    }

    /// Build a handler for a freshly loaded table.
    pub fn build(&self, table: Arc<RouteTable>) -> RedirectHandler {
        let handler = RedirectHandler::build(table, self.fallback.clone());
        match &self.hits {
            Some(hits) => handler.with_hit_recorder(hits.clone()),
            None => handler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{RouteStore, StoreLocation};

    /// Echoes what it received so tests can see the request was not altered.
    fn sentinel() -> Router {
        Router::new().fallback(|request: Request<Body>| async move {
            let marker = request
                .headers()
                .get("x-marker")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            (
                StatusCode::IM_A_TEAPOT,
                format!("{} {} {}", request.method(), request.uri(), marker),
            )
        })
    }

    fn table(pairs: &[(&str, &str)]) -> Arc<RouteTable> {
        Arc::new(pairs.iter().map(|(k, v)| (*k, v.to_string())).collect())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_hit_redirects() {
        let pairs = [
            ("/a", "https://example.com/a"),
            ("b", "https://example.com/b?q=1"),
            ("go/docs", "http://docs.example.com/"),
        ];
        let handler = RedirectHandler::build(table(&pairs), sentinel());

        for (uri, target) in [
            ("/a", "https://example.com/a"),
            ("/b", "https://example.com/b?q=1"),
            ("/go/docs", "http://docs.example.com/"),
        ] {
            let response = handler.handle(get(uri)).await;
            assert_eq!(response.status(), StatusCode::FOUND, "{}", uri);
            assert_eq!(response.headers()[header::LOCATION], target);
        }
    }

    #[tokio::test]
    async fn test_miss_reaches_fallback_unchanged() {
        let handler = RedirectHandler::build(table(&[("a", "https://example.com/a")]), sentinel());

        let request = Request::builder()
            .method("POST")
            .uri("/missing?x=1")
            .header("x-marker", "kept")
            .body(Body::empty())
            .unwrap();
        let response = handler.handle(request).await;

        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(body_text(response).await, "POST /missing?x=1 kept");
    }

    #[tokio::test]
    async fn test_only_one_slash_stripped() {
        let handler = RedirectHandler::build(table(&[("a", "https://example.com/a")]), sentinel());

        let response = handler.handle(get("//a")).await;
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn test_empty_table_falls_through() {
        let handler = RedirectHandler::build(Arc::new(RouteTable::default()), sentinel());
        assert_eq!(handler.handle(get("/")).await.status(), StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn test_percent_encoded_keys() {
        let pairs = [
            ("/caf\u{e9}", "https://example.com/cafe"),
            ("/a b", "https://example.com/space"),
            ("docs/v1", "https://example.com/docs"),
        ];
        let handler = RedirectHandler::build(table(&pairs), sentinel());

        for (uri, target) in [
            ("/caf%C3%A9", "https://example.com/cafe"),
            ("/a%20b", "https://example.com/space"),
            ("/docs%2Fv1", "https://example.com/docs"),
            ("/docs/v1", "https://example.com/docs"),
        ] {
            let response = handler.handle(get(uri)).await;
            assert_eq!(response.status(), StatusCode::FOUND, "{}", uri);
            assert_eq!(response.headers()[header::LOCATION], target);
        }
    }

    #[tokio::test]
    async fn test_undecodable_path_is_a_miss() {
        let handler = RedirectHandler::build(table(&[("a", "https://example.com/a")]), sentinel());

        let response = handler.handle(get("/%FF%FE")).await;
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(body_text(response).await, "GET /%FF%FE ");
    }

    #[tokio::test]
    async fn test_factory_coalesces_hits() {
        let store = RouteStore::open(&StoreLocation::Memory).unwrap();
        let hits = HitRecorder::new(store.clone());
        let factory = HandlerFactory::new(sentinel()).with_hit_recorder(hits.clone());
        let handler = factory.build(table(&[("a", "https://example.com/a")]));

        for _ in 0..3000 {
            assert_eq!(handler.handle(get("/a")).await.status(), StatusCode::FOUND);
        }

        // Nothing is written per request; the counts wait for a flush.
        assert_eq!(hits.pending_keys(), 1);
        assert_eq!(store.get("a"), None);

        assert_eq!(hits.flush().unwrap(), 3000);
        assert_eq!(store.get("a").unwrap().hit_count, 3000);
    }
}
