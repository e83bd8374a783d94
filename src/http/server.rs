//! HTTP server setup and the published handler.
//!
//! # Responsibilities
//! - Hold the currently published `RedirectHandler` behind an `ArcSwap`
//! - Create the Axum router that dispatches every request to it
//! - Wire up middleware (tracing, timeout, request ID)
//! - Serve until told to stop, then drain within a deadline
//!
//! # Design Decisions
//! - Every connection runs on a task in a `JoinSet` owned by the server
//!   task, so aborting the server task closes every connection with it

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tokio::task::{JoinHandle, JoinSet};
use tower::ServiceExt;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::http::handler::RedirectHandler;
use crate::lifecycle::Shutdown;

/// Errors from running or stopping the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("HTTP server I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// The handler the server dereferences once per request.
///
/// Publishing replaces the whole `Arc`; a request that already loaded the
/// previous handler finishes against it.
#[derive(Clone)]
pub struct ActiveHandler {
    inner: Arc<ArcSwap<RedirectHandler>>,
}

impl ActiveHandler {
    pub fn new(handler: RedirectHandler) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(handler)),
        }
    }

    /// The handler new requests will use.
    pub fn current(&self) -> Arc<RedirectHandler> {
        self.inner.load_full()
    }

    /// Atomically replace the handler.
    pub fn publish(&self, handler: RedirectHandler) {
        self.inner.store(Arc::new(handler));
    }
}

/// How a bounded shutdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every in-flight request finished before the deadline.
    Drained,
    /// The deadline passed; remaining connections were dropped.
    Abandoned,
}

/// HTTP server for the redirect service.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a server dispatching to `active`.
    pub fn new(active: ActiveHandler, request_timeout: Duration) -> Self {
        Self {
            router: Self::build_router(active, request_timeout),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(active: ActiveHandler, request_timeout: Duration) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(active)
            .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run until `shutdown` fires, then wait for open connections.
    ///
    /// Idle connections close as soon as draining starts; busy ones close
    /// after their current response.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let (drain_tx, drain_rx) = watch::channel(false);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        connections.spawn(serve_connection(self.router.clone(), stream, peer, drain_rx.clone()));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(listener);
        tracing::info!(connections = connections.len(), "HTTP server draining connections");
        let _ = drain_tx.send(true);
        while connections.join_next().await.is_some() {}

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run on a background task.
    pub fn spawn(self, listener: TcpListener) -> Result<ServerHandle, std::io::Error> {
        let local_addr = listener.local_addr()?;
        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        let task = tokio::spawn(self.run(listener, rx));

        Ok(ServerHandle {
            local_addr,
            shutdown,
            task,
        })
    }
}

/// Serve HTTP/1.1 on one connection until it closes or draining starts.
async fn serve_connection(router: Router, stream: TcpStream, peer: SocketAddr, drain: watch::Receiver<bool>) {
    let service = service_fn(move |request: Request<Incoming>| router.clone().oneshot(request));
    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = draining(drain) => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(e) = result {
        tracing::debug!(peer = %peer, error = %e, "Connection closed with error");
    }
}

async fn draining(mut drain: watch::Receiver<bool>) {
    let _ = drain.wait_for(|draining| *draining).await;
}

/// Every request goes through the handler published at dispatch time.
async fn dispatch(State(active): State<ActiveHandler>, request: Request<Body>) -> Response {
    let handler = active.current();
    handler.handle(request).await
}

/// A running server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    task: JoinHandle<Result<(), std::io::Error>>,
}

impl ServerHandle {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, let in-flight requests finish for up to `grace`, then
    /// abort whatever is left.
    pub async fn shutdown(self, grace: Duration) -> Result<DrainOutcome, ServerError> {
        tracing::info!(grace_secs = grace.as_secs_f64(), "Graceful shutdown of server");
        self.shutdown.trigger();

        let mut task = self.task;
        match tokio::time::timeout(grace, &mut task).await {
            Ok(joined) => {
                joined??;
                Ok(DrainOutcome::Drained)
            }
            Err(_) => {
                task.abort();
                let _ = task.await;
                tracing::warn!(grace_secs = grace.as_secs_f64(), "Shutdown deadline passed, dropping remaining connections");
                Ok(DrainOutcome::Abandoned)
            }
        }
    }
}
