//! Edge-triggered readiness multiplexer, one per worker thread.
//!
//! A [`Reactor`] owns an epoll instance, an eventfd used for cross-thread
//! wakeups, and the set of fd watches registered with it. It is constructed
//! on its own loop thread and never leaves it; everything that must cross
//! threads (scheduling work, waking, stop/drain flags, the live-connection
//! gauge) goes through the shared [`ReactorHandle`].
//!
//! Edge-triggered is mandatory: after a readiness event the callback must
//! drain the fd to `WouldBlock` before re-arming interest. A callback may
//! re-arm via [`Reactor::modify`], close its watch via [`Reactor::reset`],
//! or leave it untouched.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Readiness interest for a watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Readable,
    Writable,
    Both,
}

impl Interest {
    fn epoll_events(self) -> u32 {
        let base = libc::EPOLLET as u32 | libc::EPOLLRDHUP as u32;
        match self {
            Interest::Readable => base | libc::EPOLLIN as u32,
            Interest::Writable => base | libc::EPOLLOUT as u32,
            Interest::Both => base | libc::EPOLLIN as u32 | libc::EPOLLOUT as u32,
        }
    }
}

/// Identifies a watch within its reactor.
pub type Token = u64;

/// Token reserved for the wakeup eventfd.
const WAKE_TOKEN: Token = 0;

/// Watch callback. Runs on the reactor's loop thread.
pub type Callback = Box<dyn FnMut(&Reactor, Interest)>;

/// Work item shipped to a reactor from another thread.
pub type Task = Box<dyn FnOnce(&Reactor) + Send>;

struct WatchSlot {
    fd: RawFd,
    /// Taken out while the callback runs so it can call back into the
    /// reactor without re-borrowing the slot table.
    callback: Option<Callback>,
    is_connection: bool,
}

/// Cross-thread face of a reactor: task queue, wake fd, and the shared
/// flags the loop thread polls.
pub struct ReactorHandle {
    wake_fd: RawFd,
    tasks: Mutex<Vec<Task>>,
    stop: AtomicBool,
    drain: AtomicBool,
    /// Live connection watches on this reactor (gauge for graceful stop).
    active_connections: AtomicUsize,
}

impl ReactorHandle {
    fn new() -> io::Result<Arc<Self>> {
        let wake_fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if wake_fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Arc::new(ReactorHandle {
            wake_fd,
            tasks: Mutex::new(Vec::new()),
            stop: AtomicBool::new(false),
            drain: AtomicBool::new(false),
            active_connections: AtomicUsize::new(0),
        }))
    }

    /// Wake the loop thread out of `epoll_wait`.
    pub fn wake(&self) {
        let one: u64 = 1;
        let rc = unsafe {
            libc::write(
                self.wake_fd,
                &one as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::WouldBlock {
                warn!(error = %err, "reactor wake failed");
            }
        }
    }

    /// Run `task` on the reactor's loop thread at the next wakeup.
    pub fn schedule(&self, task: impl FnOnce(&Reactor) + Send + 'static) {
        self.tasks
            .lock()
            .expect("reactor task queue poisoned")
            .push(Box::new(task));
        self.wake();
    }

    /// Ask the loop to exit once the current iteration finishes.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
        self.wake();
    }

    /// Number of connection watches currently alive on this reactor.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }
}

impl Drop for ReactorHandle {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.wake_fd);
        }
    }
}

/// Single-threaded event loop owning a readiness multiplexer and fd watches.
pub struct Reactor {
    id: usize,
    epoll_fd: RawFd,
    handle: Arc<ReactorHandle>,
    slots: RefCell<HashMap<Token, WatchSlot>>,
    listener_tokens: RefCell<Vec<Token>>,
    next_token: Cell<Token>,
    /// Watches whose removal was requested; applied between callbacks so a
    /// callback can reset its own watch safely.
    pending_reset: RefCell<Vec<Token>>,
}

impl Reactor {
    /// Create a reactor bound to `handle`. Must be called on the thread
    /// that will run [`run_loop`](Self::run_loop).
    pub fn new(id: usize, handle: Arc<ReactorHandle>) -> io::Result<Self> {
        let epoll_fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if epoll_fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let reactor = Reactor {
            id,
            epoll_fd,
            handle,
            slots: RefCell::new(HashMap::new()),
            listener_tokens: RefCell::new(Vec::new()),
            next_token: Cell::new(WAKE_TOKEN + 1),
            pending_reset: RefCell::new(Vec::new()),
        };
        reactor.epoll_ctl(
            libc::EPOLL_CTL_ADD,
            reactor.handle.wake_fd,
            WAKE_TOKEN,
            libc::EPOLLIN as u32,
        )?;
        Ok(reactor)
    }

    /// This reactor's index within its pool.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The cross-thread handle.
    pub fn handle(&self) -> Arc<ReactorHandle> {
        self.handle.clone()
    }

    /// True once graceful drain has been requested: connections finish
    /// their in-flight request/response cycle and close instead of
    /// keeping alive.
    pub fn is_draining(&self) -> bool {
        self.handle.drain.load(Ordering::Acquire)
    }

    /// Enter drain mode (normally scheduled by the pool's graceful stop).
    pub fn set_draining(&self) {
        self.handle.drain.store(true, Ordering::Release);
    }

    fn epoll_ctl(&self, op: libc::c_int, fd: RawFd, token: Token, events: u32) -> io::Result<()> {
        let mut ev = libc::epoll_event { events, u64: token };
        let rc = unsafe { libc::epoll_ctl(self.epoll_fd, op, fd, &mut ev) };
        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    fn insert(
        &self,
        fd: RawFd,
        interest: Interest,
        callback: Callback,
        is_connection: bool,
    ) -> io::Result<Token> {
        let token = self.next_token.get();
        self.next_token.set(token + 1);
        self.epoll_ctl(libc::EPOLL_CTL_ADD, fd, token, interest.epoll_events())?;
        self.slots.borrow_mut().insert(
            token,
            WatchSlot {
                fd,
                callback: Some(callback),
                is_connection,
            },
        );
        if is_connection {
            self.handle.active_connections.fetch_add(1, Ordering::AcqRel);
        }
        Ok(token)
    }

    /// Watch a connection fd. The callback owns the connection state (and
    /// through it the socket): resetting the watch unregisters the fd and
    /// drops that state, which closes the descriptor.
    pub fn register(&self, fd: RawFd, interest: Interest, callback: Callback) -> io::Result<Token> {
        self.insert(fd, interest, callback, true)
    }

    /// Watch a listening fd for readability. Tracked separately so the
    /// pool can close all listeners without touching connections.
    pub fn register_listener(&self, fd: RawFd, callback: Callback) -> io::Result<Token> {
        let token = self.insert(fd, Interest::Readable, callback, false)?;
        self.listener_tokens.borrow_mut().push(token);
        Ok(token)
    }

    /// Switch a watch between readable/writable/both interest.
    pub fn modify(&self, token: Token, interest: Interest) -> io::Result<()> {
        let slots = self.slots.borrow();
        let slot = slots
            .get(&token)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "unknown watch token"))?;
        self.epoll_ctl(libc::EPOLL_CTL_MOD, slot.fd, token, interest.epoll_events())
    }

    /// Request removal of a watch: unregister from epoll and drop the
    /// callback together with everything it owns — including the socket
    /// whose drop closes the fd. Deferred until the current callback
    /// returns, so a connection may reset itself.
    pub fn reset(&self, token: Token) {
        self.pending_reset.borrow_mut().push(token);
    }

    /// Close every registered listener.
    pub fn close_listeners(&self) {
        let tokens = std::mem::take(&mut *self.listener_tokens.borrow_mut());
        for token in tokens {
            self.reset(token);
        }
    }

    /// Reset every remaining watch (forced close after drain timeout).
    pub fn reset_all(&self) {
        let tokens: Vec<Token> = self.slots.borrow().keys().copied().collect();
        for token in tokens {
            self.reset(token);
        }
    }

    fn apply_pending_resets(&self) {
        loop {
            let token = match self.pending_reset.borrow_mut().pop() {
                Some(t) => t,
                None => break,
            };
            let slot = self.slots.borrow_mut().remove(&token);
            if let Some(slot) = slot {
                let mut ev = libc::epoll_event { events: 0, u64: 0 };
                unsafe {
                    libc::epoll_ctl(self.epoll_fd, libc::EPOLL_CTL_DEL, slot.fd, &mut ev);
                }
                if slot.is_connection {
                    self.handle.active_connections.fetch_sub(1, Ordering::AcqRel);
                }
                // The callback (and the socket/listener it owns) drops here,
                // strictly after the fd has left the epoll set; the owner's
                // Drop closes the descriptor.
                drop(slot.callback);
            }
        }
    }

    fn drain_wake_fd(&self) {
        let mut buf: u64 = 0;
        loop {
            let rc = unsafe {
                libc::read(
                    self.handle.wake_fd,
                    &mut buf as *mut u64 as *mut libc::c_void,
                    std::mem::size_of::<u64>(),
                )
            };
            if rc <= 0 {
                break;
            }
        }
    }

    fn run_tasks(&self) {
        loop {
            let task = {
                let mut queue = self.handle.tasks.lock().expect("reactor task queue poisoned");
                if queue.is_empty() {
                    break;
                }
                queue.remove(0)
            };
            task(self);
            self.apply_pending_resets();
        }
    }

    fn dispatch_event(&self, token: Token, interest: Interest) {
        let callback = {
            let mut slots = self.slots.borrow_mut();
            match slots.get_mut(&token) {
                Some(slot) => slot.callback.take(),
                // Stale event for a watch reset earlier in this batch.
                None => None,
            }
        };
        if let Some(mut cb) = callback {
            cb(self, interest);
            let mut slots = self.slots.borrow_mut();
            if let Some(slot) = slots.get_mut(&token) {
                slot.callback = Some(cb);
            }
        }
    }

    /// Run the event loop until a stop is requested. Consumes the reactor;
    /// all remaining watches are reset on exit.
    pub fn run_loop(self) {
        const MAX_EVENTS: usize = 256;
        let mut events: Vec<libc::epoll_event> =
            vec![libc::epoll_event { events: 0, u64: 0 }; MAX_EVENTS];

        debug!(reactor = self.id, "reactor loop started");
        loop {
            let n = unsafe {
                libc::epoll_wait(self.epoll_fd, events.as_mut_ptr(), MAX_EVENTS as i32, -1)
            };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                warn!(reactor = self.id, error = %err, "epoll_wait failed");
                break;
            }

            for ev in &events[..n as usize] {
                let token = ev.u64;
                if token == WAKE_TOKEN {
                    self.drain_wake_fd();
                    self.run_tasks();
                    continue;
                }
                let readable = ev.events
                    & (libc::EPOLLIN as u32
                        | libc::EPOLLRDHUP as u32
                        | libc::EPOLLHUP as u32
                        | libc::EPOLLERR as u32)
                    != 0;
                let writable = ev.events & libc::EPOLLOUT as u32 != 0;
                let interest = match (readable, writable) {
                    (true, true) => Interest::Both,
                    (false, true) => Interest::Writable,
                    // Errors and hangups surface through the read path.
                    _ => Interest::Readable,
                };
                self.dispatch_event(token, interest);
                self.apply_pending_resets();
            }

            if self.handle.stop.load(Ordering::Acquire) {
                break;
            }
        }

        self.reset_all();
        self.apply_pending_resets();
        debug!(reactor = self.id, "reactor loop stopped");
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.epoll_fd);
        }
    }
}

/// Create a handle/reactor pair: the handle is returned to the control
/// thread, the constructor closure is meant to run on the loop thread.
pub fn reactor_handle() -> io::Result<Arc<ReactorHandle>> {
    ReactorHandle::new()
}
