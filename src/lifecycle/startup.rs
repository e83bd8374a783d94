//! Startup orchestration.
//!
//! # Order
//! 1. Open the route store (fatal on failure)
//! 2. Load the initial route table (fatal on failure)
//! 3. Start the hit flusher, build the fallback chain and publish the
//!    first handler
//! 4. Bind the listener and start serving
//! 5. Install signal handlers and the file watcher
//! 6. Hand control to the reload coordinator until shutdown
//! 7. Flush the remaining hit counts

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::schema::{Settings, SourceKind};
use crate::config::source::{RouteSource, SourceError};
use crate::config::watcher::ConfigWatcher;
use crate::http::fallback::fallback_router;
use crate::http::handler::HandlerFactory;
use crate::http::server::{ActiveHandler, DrainOutcome, HttpServer, ServerError};
use crate::lifecycle::reload::{ReloadCoordinator, Triggers};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::store::{HitRecorder, RouteStore, StoreError};

/// Errors that stop the process before it serves traffic.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to open route store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to load initial routes: {0}")]
    Routes(#[from] SourceError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("failed to install signal handlers: {0}")]
    Signals(std::io::Error),

    #[error("initial route loading task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Open the store described by `settings`.
pub fn open_store(settings: &Settings) -> Result<RouteStore, StoreError> {
    RouteStore::open_with_limits(&settings.store.location(), settings.store.limits())
}

/// The route source described by `settings`, backed by `store`.
pub fn route_source(settings: &Settings, store: &RouteStore) -> RouteSource {
    match settings.routes.source {
        SourceKind::Store => RouteSource::store(store.clone()),
        SourceKind::File if settings.routes.mirror_to_store => {
            RouteSource::file(&settings.routes.file).mirrored_to(store.clone())
        }
        SourceKind::File => RouteSource::file(&settings.routes.file),
    }
}

/// Run the server until a termination signal has been handled.
pub async fn serve(settings: Settings) -> Result<DrainOutcome, StartupError> {
    let store = {
        let settings = settings.clone();
        tokio::task::spawn_blocking(move || open_store(&settings)).await??
    };

    let source = route_source(&settings, &store);
    let table = {
        let source = source.clone();
        tokio::task::spawn_blocking(move || source.load()).await??
    };
    tracing::info!(source = ?settings.routes.source, routes = table.len(), "Routes loaded");

    let hits = HitRecorder::new(store.clone());
    let flush_stop = Shutdown::new();
    let flusher = tokio::spawn(hits.clone().run(settings.store.hit_flush(), flush_stop.subscribe()));

    let factory = HandlerFactory::new(fallback_router(store)).with_hit_recorder(hits);
    let active = ActiveHandler::new(factory.build(Arc::new(table)));

    let address = settings.listener.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;
    let server = HttpServer::new(active.clone(), Duration::from_secs(settings.timeouts.request_secs))
        .spawn(listener)
        .map_err(ServerError::Io)?;
    tracing::info!(address = %server.local_addr(), "Listening for connections");

    let mut triggers: Triggers = signals::listen().map_err(StartupError::Signals)?.into();
    if settings.routes.watch {
        if let Some(path) = source.watch_path() {
            let (watcher, events) = ConfigWatcher::new(path);
            match watcher.run() {
                Ok(watcher) => triggers = triggers.with_file_events(events, Some(watcher)),
                Err(e) => tracing::warn!(path = ?path, error = %e, "Route file watcher unavailable, reload is signal-only"),
            }
        }
    }

    let coordinator = ReloadCoordinator::new(source, factory, active, settings.shutdown.grace());
    let outcome = coordinator.run(triggers, server).await;

    flush_stop.trigger();
    if let Err(e) = flusher.await {
        tracing::warn!(error = %e, "Hit flusher task failed");
    }

    Ok(outcome?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_settings() -> Settings {
        let mut settings = Settings::default();
        settings.store.in_memory = true;
        settings
    }

    #[test]
    fn test_route_source_selection() {
        let mut settings = memory_settings();
        let store = open_store(&settings).unwrap();

        assert!(matches!(route_source(&settings, &store), RouteSource::File { mirror: Some(_), .. }));

        settings.routes.mirror_to_store = false;
        assert!(matches!(route_source(&settings, &store), RouteSource::File { mirror: None, .. }));

        settings.routes.source = SourceKind::Store;
        assert!(matches!(route_source(&settings, &store), RouteSource::Store(_)));
    }

    #[tokio::test]
    async fn test_missing_route_file_is_fatal() {
        let mut settings = memory_settings();
        settings.routes.file = "/definitely/not/here.json".into();
        settings.listener.port = 1;

        let err = serve(settings).await.unwrap_err();
        assert!(matches!(err, StartupError::Routes(_)));
    }
}
