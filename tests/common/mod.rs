//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use urlmap::config::RouteSource;
use urlmap::http::{fallback_router, ActiveHandler, DrainOutcome, HandlerFactory, HttpServer, ServerError};
use urlmap::lifecycle::{ReloadCoordinator, Triggers};
use urlmap::store::{HitRecorder, RouteStore, StoreLocation};

/// A running server with a reload coordinator driven by test channels.
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub route_file: PathBuf,
    pub store: RouteStore,
    pub active: ActiveHandler,
    pub reload: mpsc::Sender<()>,
    pub terminate: mpsc::Sender<()>,
    pub coordinator: JoinHandle<Result<DrainOutcome, ServerError>>,
    _dir: tempfile::TempDir,
}

#[allow(dead_code)]
pub enum Backing {
    File,
    Store,
}

/// Start a server whose routes come from a route file holding `routes`.
pub async fn start_with_file(routes: &str) -> TestServer {
    start(routes, Backing::File).await
}

/// Start a server on a free port.
pub async fn start(routes: &str, backing: Backing) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let route_file = dir.path().join("map.json");
    std::fs::write(&route_file, routes).unwrap();

    let store = RouteStore::open(&StoreLocation::Memory).unwrap();
    let source = match backing {
        Backing::File => RouteSource::file(&route_file).mirrored_to(store.clone()),
        Backing::Store => {
            RouteSource::file(&route_file).mirrored_to(store.clone()).load().unwrap();
            RouteSource::store(store.clone())
        }
    };

    let factory =
        HandlerFactory::new(fallback_router(store.clone())).with_hit_recorder(HitRecorder::new(store.clone()));
    let table = Arc::new(source.load().unwrap());
    let active = ActiveHandler::new(factory.build(table));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = HttpServer::new(active.clone(), Duration::from_secs(30))
        .spawn(listener)
        .unwrap();
    let addr = server.local_addr();

    let (terminate, terminate_rx) = mpsc::channel(1);
    let (reload, reload_rx) = mpsc::channel(8);
    let coordinator = ReloadCoordinator::new(source, factory, active.clone(), Duration::from_secs(5));
    let coordinator = tokio::spawn(coordinator.run(Triggers::new(terminate_rx, reload_rx), server));

    TestServer {
        addr,
        route_file,
        store,
        active,
        reload,
        terminate,
        coordinator,
        _dir: dir,
    }
}

/// HTTP client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Status and `Location` header for `GET path`.
    pub async fn get(&self, client: &reqwest::Client, path: &str) -> (u16, Option<String>) {
        let res = client.get(self.url(path)).send().await.expect("server unreachable");
        let location = res
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        (res.status().as_u16(), location)
    }

    /// Poll until `GET path` redirects to `target`.
    pub async fn wait_for_location(&self, client: &reqwest::Client, path: &str, target: &str) -> bool {
        for _ in 0..100 {
            if self.get(client, path).await.1.as_deref() == Some(target) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}
