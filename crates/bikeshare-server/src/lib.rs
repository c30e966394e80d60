//! HTTP server for the bikeshare catalog.
//!
//! Serves the resource API over `tiny_http` with a fixed pool of worker
//! threads. Every route delegates to [`BikeService`]; failures are rendered
//! as `{error, message, details}` JSON with the status code of their kind.
//! When the backing store becomes unavailable the server answers 503, stops
//! accepting requests, and [`run_server`] returns
//! [`ServerError::StoreUnavailable`].
//!
//! The [`TestServer`] helper starts a server on a random port for integration testing.

pub mod config;
pub mod handler;
pub mod routes;

pub use config::{load_config_file, parse_config_str, ConfigError, ServerConfig};
pub use handler::{handle_request, Disposition, MAX_BODY_BYTES};
pub use routes::{parse_route, Route, RouteError, ROUTE_PREFIXES};

use bikeshare_core::{BikeService, CoreError, ShutdownSignal};
use bikeshare_schema::Variant;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tiny_http::Server;
use tracing::{debug, error, info, warn};

/// How long a worker blocks waiting for a request before rechecking shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("failed to install signal handler: {0}")]
    Signal(String),
    #[error("backing store became unavailable; server stopped")]
    StoreUnavailable,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bind an HTTP listener on `addr`.
pub fn bind(addr: &str) -> Result<Server, ServerError> {
    Server::http(addr).map_err(|e| ServerError::Bind {
        addr: addr.to_owned(),
        reason: e.to_string(),
    })
}

fn worker_loop(
    service: &BikeService,
    server: &Server,
    shutdown: &ShutdownSignal,
    fatal: &AtomicBool,
) {
    while !shutdown.is_requested() {
        match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(request)) => {
                if handle_request(service, request) == Disposition::Fatal {
                    fatal.store(true, Ordering::SeqCst);
                    shutdown.request();
                }
            }
            Ok(None) => {}
            Err(e) => warn!("failed to receive request: {e}"),
        }
    }
}

/// Serve requests on `workers` threads until `shutdown` is requested.
///
/// Blocks the calling thread. In-flight requests finish before this returns.
pub fn run_server(
    service: Arc<BikeService>,
    server: Arc<Server>,
    workers: usize,
    shutdown: ShutdownSignal,
) -> Result<(), ServerError> {
    let fatal = Arc::new(AtomicBool::new(false));
    let mut handles = Vec::with_capacity(workers);

    for n in 0..workers.max(1) {
        let service = Arc::clone(&service);
        let server = Arc::clone(&server);
        let signal = shutdown.clone();
        let fatal_flag = Arc::clone(&fatal);
        let spawned = thread::Builder::new()
            .name(format!("bikeshare-worker-{n}"))
            .spawn(move || worker_loop(&service, &server, &signal, &fatal_flag));
        match spawned {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                shutdown.request();
                join_workers(handles);
                return Err(e.into());
            }
        }
    }
    debug!("started {} worker threads", handles.len());

    join_workers(handles);

    if fatal.load(Ordering::SeqCst) {
        error!("stopped serving: backing store unavailable");
        return Err(ServerError::StoreUnavailable);
    }
    info!("server stopped");
    Ok(())
}

fn join_workers(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if handle.join().is_err() {
            error!("worker thread panicked");
        }
    }
}

/// A test helper that starts a bikeshare server on a random port in a background thread.
///
/// The server listens on `127.0.0.1:{port}`. Without a `data_dir` the store
/// is in memory. Drop the `TestServer` to stop the server and wait for it.
pub struct TestServer {
    pub url: String,
    pub port: u16,
    pub service: Arc<BikeService>,
    shutdown: ShutdownSignal,
    handle: Option<JoinHandle<Result<(), ServerError>>>,
}

impl TestServer {
    /// Start a test server. Binds to `127.0.0.1:0` (random port).
    pub fn start(variant: Variant, data_dir: Option<PathBuf>) -> Self {
        let service = Arc::new(
            BikeService::open(variant, data_dir.as_deref()).expect("failed to open test store"),
        );
        let server = Arc::new(bind("127.0.0.1:0").expect("failed to bind test HTTP server"));
        let port = server.server_addr().to_ip().expect("not an IP addr").port();
        let url = format!("http://127.0.0.1:{port}");

        let shutdown = ShutdownSignal::new();
        let handle = {
            let service = Arc::clone(&service);
            let shutdown = shutdown.clone();
            thread::spawn(move || run_server(service, server, 2, shutdown))
        };

        Self {
            url,
            port,
            service,
            shutdown,
            handle: Some(handle),
        }
    }

    /// Stop the server and return how it exited.
    pub fn stop(mut self) -> Result<(), ServerError> {
        self.shutdown.request();
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(result)) => result,
            Some(Err(_)) => panic!("test server thread panicked"),
            None => Ok(()),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.request();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
