//! Signal-to-callback bridge for graceful shutdown.
//!
//! The POSIX handler itself only flips an atomic flag (the only
//! async-signal-safe thing it may do); a small watcher thread observes the
//! flag and invokes the registered callback exactly once, outside signal
//! context. The server wires the callback to the pool's graceful stop.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use tracing::info;

static INSTANCE: Lazy<ShutdownManager> = Lazy::new(ShutdownManager::new);

static FLAG: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_signal(_signal: libc::c_int) {
    FLAG.store(true, Ordering::Release);
}

/// Process-wide shutdown coordinator.
pub struct ShutdownManager {
    callback: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    watcher_started: AtomicBool,
}

impl ShutdownManager {
    fn new() -> Self {
        ShutdownManager {
            callback: Mutex::new(None),
            watcher_started: AtomicBool::new(false),
        }
    }

    /// The singleton.
    pub fn instance() -> &'static ShutdownManager {
        &INSTANCE
    }

    /// Install SIGINT/SIGTERM handlers and start the watcher thread.
    pub fn setup_signal_handlers(&'static self) {
        unsafe {
            libc::signal(libc::SIGINT, handle_signal as libc::sighandler_t);
            libc::signal(libc::SIGTERM, handle_signal as libc::sighandler_t);
        }
        self.start_watcher();
    }

    /// Register the callback run once shutdown is requested. Replaces any
    /// previous callback.
    pub fn set_shutdown_callback(&self, callback: impl FnOnce() + Send + 'static) {
        *self.callback.lock().expect("shutdown callback poisoned") = Some(Box::new(callback));
    }

    /// Trigger shutdown programmatically (same path as a signal).
    pub fn request_shutdown(&'static self) {
        FLAG.store(true, Ordering::Release);
        self.start_watcher();
    }

    /// True once shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        FLAG.load(Ordering::Acquire)
    }

    fn start_watcher(&'static self) {
        if self.watcher_started.swap(true, Ordering::AcqRel) {
            return;
        }
        thread::Builder::new()
            .name("katana-shutdown".to_string())
            .spawn(move || {
                while !FLAG.load(Ordering::Acquire) {
                    thread::sleep(Duration::from_millis(50));
                }
                info!("shutdown requested");
                let callback = self
                    .callback
                    .lock()
                    .expect("shutdown callback poisoned")
                    .take();
                if let Some(callback) = callback {
                    callback();
                }
            })
            .expect("failed to spawn shutdown watcher");
    }
}
