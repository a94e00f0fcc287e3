//! HTTP server: wires the router into the reactor pool and owns the
//! listen/accept/shutdown lifecycle.

mod accept;
mod connection;

pub use accept::{accept_counters, AcceptCounters};
pub use connection::{close_counters, handle_connection, CloseCounters, ConnectionState};

use crate::net::{AcceptHandler, ReactorPool, ReactorPoolConfig};
use crate::router::Router;
use crate::shutdown::ShutdownManager;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Builder-style HTTP/1.1 server over a [`Router`].
///
/// ```no_run
/// use http::Method;
/// use katana::http::Response;
/// use katana::router::{handler_fn, RouteEntry, Router};
/// use katana::server::Server;
///
/// let router = Router::new(vec![RouteEntry::new(
///     Method::GET,
///     "/health",
///     handler_fn(|_req, _ctx| Response::json(r#"{"status":"ok"}"#)),
/// )]);
/// Server::new(router).listen(8080).workers(4).run().unwrap();
/// ```
pub struct Server {
    router: Arc<Router>,
    port: u16,
    workers: usize,
    backlog: i32,
    reuseport: bool,
    shutdown_timeout: Duration,
}

impl Server {
    /// Create a server for `router` with default settings: port 8080, one
    /// worker per hardware thread, SO_REUSEPORT fan-out, 5s drain timeout.
    pub fn new(router: Router) -> Self {
        Server {
            router: Arc::new(router),
            port: 8080,
            workers: ReactorPoolConfig::default().reactor_count,
            backlog: 1024,
            reuseport: true,
            shutdown_timeout: Duration::from_secs(5),
        }
    }

    /// Port to listen on. `0` picks an ephemeral port.
    pub fn listen(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Number of reactor workers.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Listen backlog.
    pub fn backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }

    /// Toggle the per-reactor SO_REUSEPORT listeners. When disabled a
    /// single listener is registered on reactor 0.
    pub fn reuseport(mut self, reuseport: bool) -> Self {
        self.reuseport = reuseport;
        self
    }

    /// How long graceful stop waits for in-flight connections to drain.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Start the reactor pool and listeners without blocking.
    pub fn start(self) -> io::Result<ServerHandle> {
        let pool = Arc::new(ReactorPool::new(ReactorPoolConfig {
            reactor_count: self.workers,
            listen_backlog: self.backlog,
            reuseport: self.reuseport,
        })?);

        let router = self.router.clone();
        let handler: AcceptHandler = Arc::new(move |reactor, listener_fd| {
            accept::accept_connections(reactor, listener_fd, &router);
        });
        let port = pool.start_listening(self.port, handler)?;

        Ok(ServerHandle {
            pool,
            port,
            shutdown_timeout: self.shutdown_timeout,
        })
    }

    /// Start, install signal handlers, and block until shutdown completes.
    pub fn run(self) -> io::Result<()> {
        let shutdown_timeout = self.shutdown_timeout;
        let handle = self.start()?;
        info!(port = handle.port(), "server listening");

        let pool = handle.pool.clone();
        ShutdownManager::instance().setup_signal_handlers();
        ShutdownManager::instance()
            .set_shutdown_callback(move || pool.graceful_stop(shutdown_timeout));

        handle.pool.wait();
        Ok(())
    }
}

/// A running server; dropping it does not stop the pool — call
/// [`stop`](Self::stop) or [`wait`](Self::wait).
pub struct ServerHandle {
    pool: Arc<ReactorPool>,
    port: u16,
    shutdown_timeout: Duration,
}

impl ServerHandle {
    /// The bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Gracefully stop the pool (drain, force-close, join).
    pub fn stop(&self) {
        self.pool.graceful_stop(self.shutdown_timeout);
    }

    /// Block until the pool exits.
    pub fn wait(&self) {
        self.pool.wait();
    }
}
