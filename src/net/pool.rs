//! Fixed pool of reactors, one loop thread each, sharing nothing.
//!
//! The pool spawns N reactor threads and pushes TCP-level load balancing
//! into the kernel: with SO_REUSEPORT enabled, `start_listening` binds one
//! listening socket *per reactor* so there is no userspace accept-queue
//! contention. Connections accepted on reactor `k` live and die on reactor
//! `k`'s thread.

use super::reactor::{Reactor, ReactorHandle};
use super::socket::TcpListener;
use std::io;
use std::os::unix::io::RawFd;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Handler invoked when a listener becomes readable. Must loop accepting
/// until `WouldBlock` (edge-triggered listener).
pub type AcceptHandler = Arc<dyn Fn(&Reactor, RawFd) + Send + Sync>;

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct ReactorPoolConfig {
    /// Number of reactors. Defaults to one per hardware thread.
    pub reactor_count: usize,
    /// Listen backlog passed to `listen(2)`.
    pub listen_backlog: i32,
    /// Bind one SO_REUSEPORT listener per reactor. When disabled a single
    /// listener is registered on reactor 0.
    pub reuseport: bool,
}

impl Default for ReactorPoolConfig {
    fn default() -> Self {
        ReactorPoolConfig {
            reactor_count: thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            listen_backlog: 1024,
            reuseport: true,
        }
    }
}

/// N reactors pinned to their own threads.
pub struct ReactorPool {
    config: ReactorPoolConfig,
    handles: Vec<Arc<ReactorHandle>>,
    threads: Mutex<Vec<thread::JoinHandle<()>>>,
    bound_port: Mutex<Option<u16>>,
}

impl ReactorPool {
    /// Spawn the reactor threads. Fails if any reactor cannot set up its
    /// epoll instance.
    pub fn new(config: ReactorPoolConfig) -> io::Result<Self> {
        let count = config.reactor_count.max(1);
        let mut handles = Vec::with_capacity(count);
        let mut threads = Vec::with_capacity(count);

        for id in 0..count {
            let handle = super::reactor::reactor_handle()?;
            let thread_handle = handle.clone();
            let (ready_tx, ready_rx) = mpsc::channel::<io::Result<()>>();

            let join = thread::Builder::new()
                .name(format!("katana-reactor-{id}"))
                .spawn(move || match Reactor::new(id, thread_handle) {
                    Ok(reactor) => {
                        let _ = ready_tx.send(Ok(()));
                        reactor.run_loop();
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                    }
                })?;

            ready_rx
                .recv()
                .map_err(|_| io::Error::other("reactor thread exited during setup"))??;
            handles.push(handle);
            threads.push(join);
        }

        info!(reactors = count, "reactor pool started");
        Ok(ReactorPool {
            config,
            handles,
            threads: Mutex::new(threads),
            bound_port: Mutex::new(None),
        })
    }

    /// Number of reactors in the pool.
    pub fn reactor_count(&self) -> usize {
        self.handles.len()
    }

    /// Handle for reactor `idx`.
    pub fn handle(&self, idx: usize) -> Arc<ReactorHandle> {
        self.handles[idx].clone()
    }

    /// The port listeners are bound to, once `start_listening` succeeded.
    pub fn bound_port(&self) -> Option<u16> {
        *self.bound_port.lock().expect("bound_port poisoned")
    }

    /// Open listeners on `port` and register them for readability with
    /// `accept_handler`.
    ///
    /// With `reuseport`, the first listener is bound on the calling thread
    /// (resolving port 0 to a concrete port) and every reactor binds the
    /// resolved port itself. Returns the bound port.
    pub fn start_listening(&self, port: u16, accept_handler: AcceptHandler) -> io::Result<u16> {
        let backlog = self.config.listen_backlog;
        let first = TcpListener::bind(port, backlog, self.config.reuseport)?;
        let resolved = first.local_port();

        let targets = if self.config.reuseport {
            self.handles.len()
        } else {
            1
        };

        let (done_tx, done_rx) = mpsc::channel::<io::Result<()>>();
        let mut pending_first = Some(first);
        for idx in 0..targets {
            let handler = accept_handler.clone();
            let tx = done_tx.clone();
            // Reactor 0 adopts the pre-bound listener; the rest bind their own.
            let prebound = if idx == 0 { pending_first.take() } else { None };
            self.handles[idx].schedule(move |reactor| {
                let result = (|| -> io::Result<()> {
                    let listener = match prebound {
                        Some(l) => l,
                        None => TcpListener::bind(resolved, backlog, true)?,
                    };
                    let fd = listener.native_handle();
                    // The callback owns the listener; dropping the watch
                    // closes the listening socket.
                    reactor.register_listener(
                        fd,
                        Box::new(move |r, _interest| handler(r, listener.native_handle())),
                    )?;
                    Ok(())
                })();
                let _ = tx.send(result);
            });
        }
        drop(done_tx);

        for _ in 0..targets {
            done_rx
                .recv()
                .map_err(|_| io::Error::other("reactor exited while binding listeners"))??;
        }

        *self.bound_port.lock().expect("bound_port poisoned") = Some(resolved);
        info!(
            port = resolved,
            listeners = targets,
            reuseport = self.config.reuseport,
            "listening"
        );
        Ok(resolved)
    }

    /// Drain and stop the pool.
    ///
    /// Phases: close listeners and set the per-reactor drain flag; wait up
    /// to `timeout` for in-flight connections to finish their current
    /// request/response cycle; force-close the rest; join the threads.
    pub fn graceful_stop(&self, timeout: Duration) {
        info!(timeout_ms = timeout.as_millis() as u64, "graceful stop requested");
        for handle in &self.handles {
            handle.schedule(|reactor| {
                reactor.close_listeners();
                reactor.set_draining();
            });
        }

        let deadline = Instant::now() + timeout;
        loop {
            let open: usize = self.handles.iter().map(|h| h.active_connections()).sum();
            if open == 0 {
                break;
            }
            if Instant::now() >= deadline {
                warn!(open, "drain timeout elapsed, forcing connections closed");
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }

        for handle in &self.handles {
            handle.schedule(|reactor| reactor.reset_all());
            handle.request_stop();
        }
        self.join();
    }

    /// Block until every reactor thread has exited.
    pub fn wait(&self) {
        self.join();
    }

    fn join(&self) {
        let threads = std::mem::take(&mut *self.threads.lock().expect("pool threads poisoned"));
        for join in threads {
            let _ = join.join();
        }
    }
}
