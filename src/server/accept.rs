//! Accept loop, accept-error accounting and EMFILE resilience.
//!
//! On listener readiness the handler accepts until `WouldBlock`
//! (edge-triggered). Accept failures other than `WouldBlock` are counted
//! and dropped — the listener stays registered through *every* error
//! outcome. For EMFILE specifically each worker holds a thread-local
//! reserve descriptor open to `/dev/null`: closing it frees one fd slot,
//! one pending connection is accepted and immediately closed (draining the
//! backlog and signaling the client), then the reserve is reopened. Without
//! this, a process pinned at its fd limit would leave its backlog stuck
//! forever.

use super::connection::{handle_connection, ConnectionState};
use crate::net::{Interest, Reactor};
use crate::net::TcpSocket;
use crate::router::Router;
use once_cell::sync::Lazy;
use std::cell::RefCell;
use std::io;
use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Whether `KATANA_CONN_DEBUG` verbose close logging is enabled.
pub(crate) static CONN_DEBUG: Lazy<bool> =
    Lazy::new(|| std::env::var_os("KATANA_CONN_DEBUG").is_some());

/// Accept-failure counters, readable from any thread.
#[derive(Debug, Default)]
pub struct AcceptCounters {
    /// Per-process fd limit.
    pub emfile: AtomicU64,
    /// System-wide fd limit.
    pub enfile: AtomicU64,
    /// Out of memory.
    pub enomem: AtomicU64,
    /// No buffer space.
    pub enobufs: AtomicU64,
    /// Anything else that is not `WouldBlock`.
    pub other: AtomicU64,
    /// Successful EMFILE recoveries via the reserve descriptor.
    pub recovered: AtomicU64,
}

static ACCEPT_COUNTERS: Lazy<AcceptCounters> = Lazy::new(AcceptCounters::default);

/// Global accept-failure counters.
pub fn accept_counters() -> &'static AcceptCounters {
    &ACCEPT_COUNTERS
}

fn count_accept_error(err: &io::Error) {
    let counters = accept_counters();
    match err.raw_os_error() {
        Some(libc::EMFILE) => counters.emfile.fetch_add(1, Ordering::Relaxed),
        Some(libc::ENFILE) => counters.enfile.fetch_add(1, Ordering::Relaxed),
        Some(libc::ENOMEM) => counters.enomem.fetch_add(1, Ordering::Relaxed),
        Some(libc::ENOBUFS) => counters.enobufs.fetch_add(1, Ordering::Relaxed),
        _ => counters.other.fetch_add(1, Ordering::Relaxed),
    };
}

fn log_accept_error(err: &io::Error) {
    if !*CONN_DEBUG {
        return;
    }
    let c = accept_counters();
    let total = c.emfile.load(Ordering::Relaxed)
        + c.enfile.load(Ordering::Relaxed)
        + c.enomem.load(Ordering::Relaxed)
        + c.enobufs.load(Ordering::Relaxed)
        + c.other.load(Ordering::Relaxed);
    if total <= 10 || (total <= 100 && total % 10 == 0) || total % 100 == 0 {
        warn!(
            error = %err,
            total_errors = total,
            recovered = c.recovered.load(Ordering::Relaxed),
            "accept failed"
        );
    }
}

/// Reserve descriptor for EMFILE recovery.
///
/// One per worker thread; holds `/dev/null` open so a fd slot can be freed
/// on demand.
struct ReserveFd {
    fd: RawFd,
}

impl ReserveFd {
    fn new() -> Self {
        let mut reserve = ReserveFd { fd: -1 };
        reserve.reopen();
        reserve
    }

    fn reopen(&mut self) {
        self.fd = unsafe {
            libc::open(
                b"/dev/null\0".as_ptr() as *const libc::c_char,
                libc::O_RDONLY | libc::O_CLOEXEC,
            )
        };
    }

    /// Free one fd slot, accept-and-close a pending connection, reopen the
    /// reserve. Returns true when a recovery was performed.
    fn handle_emfile(&mut self, listener_fd: RawFd) -> bool {
        if self.fd < 0 {
            return false;
        }
        unsafe { libc::close(self.fd) };
        self.fd = -1;

        let conn_fd = unsafe {
            libc::accept4(
                listener_fd,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
            )
        };
        if conn_fd >= 0 {
            unsafe { libc::close(conn_fd) };
        }

        self.reopen();
        accept_counters().recovered.fetch_add(1, Ordering::Relaxed);
        true
    }
}

impl Drop for ReserveFd {
    fn drop(&mut self) {
        if self.fd >= 0 {
            unsafe { libc::close(self.fd) };
        }
    }
}

thread_local! {
    static RESERVE_FD: RefCell<ReserveFd> = RefCell::new(ReserveFd::new());
}

/// Drain the listener's backlog, registering one connection watch per
/// accepted socket on the local reactor.
pub fn accept_connections(reactor: &Reactor, listener_fd: RawFd, router: &Arc<Router>) {
    loop {
        let fd = unsafe {
            libc::accept4(
                listener_fd,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
            )
        };
        if fd < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                break;
            }
            count_accept_error(&err);
            log_accept_error(&err);
            if err.raw_os_error() == Some(libc::EMFILE) {
                RESERVE_FD.with(|reserve| reserve.borrow_mut().handle_emfile(listener_fd));
            }
            // Temporary exhaustion must not kill the accept loop: break and
            // retry on the next listener wakeup.
            break;
        }

        let socket = TcpSocket::from_raw_fd(fd);
        let _ = socket.set_nodelay();
        let conn = Rc::new(RefCell::new(ConnectionState::new(socket)));
        let conn_for_cb = conn.clone();
        let router = router.clone();
        match reactor.register(
            fd,
            Interest::Readable,
            Box::new(move |r, _interest| {
                let mut state = conn_for_cb.borrow_mut();
                handle_connection(&mut state, r, &router);
            }),
        ) {
            Ok(token) => {
                conn.borrow_mut().token = Some(token);
                debug!(reactor = reactor.id(), fd, "connection accepted");
            }
            Err(err) => {
                // Registration failed: dropping the state closes the socket.
                warn!(fd, error = %err, "failed to register connection watch");
            }
        }
    }
}
