//! Reload coordinator.
//!
//! # State Machine
//! ```text
//!            reload signal / file write
//! Serving ───────────────────────────────▶ Reloading
//!    ▲                                         │
//!    └──── publish new handler, or keep old ───┘
//!
//! Serving ── terminate ──▶ ShuttingDown (drain server, leave loop)
//! ```
//!
//! # Design Decisions
//! - One `select!` loop merges terminate, reload and file-change events
//! - A rebuild either publishes a complete new handler or changes nothing
//! - Route loading runs on a blocking task; the loop waits for it

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::RecommendedWatcher;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::source::{RouteSource, SourceError};
use crate::config::watcher::{is_write_to, FileEvents};
use crate::http::handler::HandlerFactory;
use crate::http::server::{ActiveHandler, DrainOutcome, ServerError, ServerHandle};
use crate::lifecycle::signals::SignalTriggers;
use crate::routing::RouteTable;

/// Coordinator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Serving,
    Reloading,
    ShuttingDown,
}

/// Errors from a single rebuild.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("route loading task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// The event sources the coordinator waits on.
pub struct Triggers {
    terminate: mpsc::Receiver<()>,
    reload: mpsc::Receiver<()>,
    file_events: Option<FileEvents>,
    _watcher: Option<RecommendedWatcher>,
}

impl Triggers {
    pub fn new(terminate: mpsc::Receiver<()>, reload: mpsc::Receiver<()>) -> Self {
        Self {
            terminate,
            reload,
            file_events: None,
            _watcher: None,
        }
    }

    /// Add file-change events. `watcher` is kept alive for as long as the
    /// triggers are.
    pub fn with_file_events(mut self, events: FileEvents, watcher: Option<RecommendedWatcher>) -> Self {
        self.file_events = Some(events);
        self._watcher = watcher;
        self
    }
}

impl From<SignalTriggers> for Triggers {
    fn from(signals: SignalTriggers) -> Self {
        Self::new(signals.terminate, signals.reload)
    }
}

/// Owns the route source and republishes the active handler on demand.
pub struct ReloadCoordinator {
    source: RouteSource,
    factory: HandlerFactory,
    active: ActiveHandler,
    grace: Duration,
    state: CoordinatorState,
}

impl ReloadCoordinator {
    pub fn new(source: RouteSource, factory: HandlerFactory, active: ActiveHandler, grace: Duration) -> Self {
        Self {
            source,
            factory,
            active,
            grace,
            state: CoordinatorState::Serving,
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Rebuild from the source and publish the result.
    ///
    /// On failure the published handler is left untouched.
    pub async fn reload(&mut self) -> Result<Arc<RouteTable>, ReloadError> {
        self.state = CoordinatorState::Reloading;
        let source = self.source.clone();
        let loaded = tokio::task::spawn_blocking(move || source.load()).await;
        self.state = CoordinatorState::Serving;

        let table = Arc::new(loaded??);
        self.active.publish(self.factory.build(table.clone()));
        Ok(table)
    }

    async fn reload_logged(&mut self, trigger: &'static str) {
        tracing::info!(trigger = trigger, "Reloading routes");
        match self.reload().await {
            Ok(table) => tracing::info!(trigger = trigger, routes = table.len(), "Routes reloaded"),
            Err(e) => tracing::error!(trigger = trigger, error = %e, "Reload failed, keeping previous routes"),
        }
    }

    /// Wait for triggers until terminated, then shut the server down.
    pub async fn run(mut self, mut triggers: Triggers, server: ServerHandle) -> Result<DrainOutcome, ServerError> {
        let watched: Option<PathBuf> = self.source.watch_path().map(Path::to_path_buf);

        loop {
            let mut watch_closed = false;

            tokio::select! {
                _ = triggers.terminate.recv() => break,
                Some(()) = triggers.reload.recv() => self.reload_logged("signal").await,
                event = next_file_event(&mut triggers.file_events) => match event {
                    Some(Ok(event)) => {
                        if watched.as_deref().is_some_and(|path| is_write_to(&event, path)) {
                            self.reload_logged("file").await;
                        }
                    }
                    Some(Err(e)) => tracing::warn!(error = %e, "Route file watcher error"),
                    None => watch_closed = true,
                },
            }

            if watch_closed {
                tracing::warn!("Route file watcher stopped, reload is signal-only");
                triggers.file_events = None;
            }
        }

        self.state = CoordinatorState::ShuttingDown;
        server.shutdown(self.grace).await
    }
}

async fn next_file_event(events: &mut Option<FileEvents>) -> Option<notify::Result<notify::Event>> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::server::HttpServer;
    use axum::Router;
    use notify::event::{DataChange, EventKind, ModifyKind};
    use std::fs;
    use tokio::net::TcpListener;

    struct Fixture {
        _dir: tempfile::TempDir,
        path: PathBuf,
        active: ActiveHandler,
        coordinator: ReloadCoordinator,
    }

    fn fixture(initial: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.json");
        fs::write(&path, initial).unwrap();

        let source = RouteSource::file(&path);
        let factory = HandlerFactory::new(Router::new());
        let table = Arc::new(source.load().unwrap());
        let active = ActiveHandler::new(factory.build(table));
        let coordinator = ReloadCoordinator::new(source, factory, active.clone(), Duration::from_secs(5));

        Fixture {
            _dir: dir,
            path,
            active,
            coordinator,
        }
    }

    fn target(active: &ActiveHandler, key: &str) -> Option<String> {
        active.current().table().resolve(key).map(str::to_string)
    }

    async fn wait_for_target(active: &ActiveHandler, key: &str, expected: &str) -> bool {
        for _ in 0..100 {
            if target(active, key).as_deref() == Some(expected) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_reload_publishes_new_table() {
        let mut fx = fixture(r#"{"/a": "https://example.com/a"}"#);

        fs::write(&fx.path, r#"{"/a": "https://example.com/a2"}"#).unwrap();
        let table = fx.coordinator.reload().await.unwrap();

        assert_eq!(table.resolve("a"), Some("https://example.com/a2"));
        assert_eq!(target(&fx.active, "a").as_deref(), Some("https://example.com/a2"));
        assert_eq!(fx.coordinator.state(), CoordinatorState::Serving);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_handler() {
        let mut fx = fixture(r#"{"/a": "https://example.com/a"}"#);
        let before = fx.active.current();

        fs::write(&fx.path, r#"{"/a": "https://exam"#).unwrap();
        assert!(fx.coordinator.reload().await.is_err());

        assert!(Arc::ptr_eq(&before, &fx.active.current()));
        assert_eq!(fx.coordinator.state(), CoordinatorState::Serving);

        fs::remove_file(&fx.path).unwrap();
        assert!(fx.coordinator.reload().await.is_err());
        assert_eq!(target(&fx.active, "a").as_deref(), Some("https://example.com/a"));
    }

    #[tokio::test]
    async fn test_reload_unchanged_file_is_equivalent() {
        let mut fx = fixture(r#"{"/a": "https://example.com/a", "b": "https://example.com/b"}"#);
        let before = fx.active.current().table().clone();

        let after = fx.coordinator.reload().await.unwrap();
        assert_eq!(*before, *after);
    }

    #[tokio::test]
    async fn test_run_loop_handles_triggers() {
        let fx = fixture(r#"{"/a": "https://example.com/a"}"#);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = HttpServer::new(fx.active.clone(), Duration::from_secs(5)).spawn(listener).unwrap();

        let (terminate_tx, terminate_rx) = mpsc::channel(1);
        let (reload_tx, reload_rx) = mpsc::channel(1);
        let (file_tx, file_rx) = mpsc::unbounded_channel();
        let triggers = Triggers::new(terminate_rx, reload_rx).with_file_events(file_rx, None);

        let run = tokio::spawn(fx.coordinator.run(triggers, server));

        fs::write(&fx.path, r#"{"/a": "https://example.com/signal"}"#).unwrap();
        reload_tx.send(()).await.unwrap();
        assert!(wait_for_target(&fx.active, "a", "https://example.com/signal").await);

        fs::write(&fx.path, r#"{"/a": "https://example.com/file"}"#).unwrap();
        let event = notify::Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(fx.path.clone());
        file_tx.send(Ok(event)).unwrap();
        assert!(wait_for_target(&fx.active, "a", "https://example.com/file").await);

        // Events for other files are ignored.
        fs::write(&fx.path, r#"{"/a": "https://example.com/ignored"}"#).unwrap();
        let other = notify::Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(fx.path.with_file_name("other.json"));
        file_tx.send(Ok(other)).unwrap();
        file_tx.send(Err(notify::Error::generic("watch failed"))).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(target(&fx.active, "a").as_deref(), Some("https://example.com/file"));

        terminate_tx.send(()).await.unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(10), run)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(outcome, DrainOutcome::Drained);
    }
}
