//! Per-connection read/parse/dispatch/write state machine.
//!
//! One [`ConnectionState`] lives for the lifetime of a client connection
//! and never leaves the reactor thread that accepted it. The state machine
//! suspends only when a socket operation would block, when the parser
//! needs more bytes, or when the write ring cannot fully drain; in each
//! case it re-arms interest and returns to the event loop.
//!
//! Requests on one connection are strictly serialized: the next request is
//! parsed only after the previous response has been fully written, then
//! the arena and parser are reset for the next cycle.

use super::accept::CONN_DEBUG;
use crate::arena::Arena;
use crate::http::{Field, HttpParser, ParseStatus, ProblemDetails, RequestContext, Response};
use crate::net::{Interest, Reactor, TcpSocket, Token};
use crate::ring::RingBuffer;
use crate::router::Router;
use once_cell::sync::Lazy;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Why connections were closed, for observability.
#[derive(Debug, Default)]
pub struct CloseCounters {
    /// Read syscall failed.
    pub read_error: AtomicU64,
    /// Peer closed the connection.
    pub read_eof: AtomicU64,
    /// Malformed HTTP input.
    pub parse_error: AtomicU64,
    /// Write syscall failed.
    pub write_error: AtomicU64,
    /// `Connection: close` honored after a complete response.
    pub close_header: AtomicU64,
}

static CLOSE_COUNTERS: Lazy<CloseCounters> = Lazy::new(CloseCounters::default);

/// Global connection-close counters.
pub fn close_counters() -> &'static CloseCounters {
    &CLOSE_COUNTERS
}

fn count_close(counter: &AtomicU64, reason: &'static str) {
    let count = counter.fetch_add(1, Ordering::Relaxed) + 1;
    if *CONN_DEBUG && (count <= 20 || count % 1000 == 0) {
        info!(reason, count, "connection closed");
    }
}

/// Everything owned by one client connection.
pub struct ConnectionState {
    /// Non-blocking connection socket.
    pub socket: TcpSocket,
    /// Bytes from the kernel, awaiting parsing.
    pub read_buffer: RingBuffer,
    /// Serialized response bytes, awaiting the kernel.
    pub write_buffer: RingBuffer,
    /// Request arena, reset between requests.
    pub arena: Arena,
    /// Incremental parser for the current request.
    pub parser: HttpParser,
    /// Watch token; set right after registration.
    pub token: Option<Token>,
    /// Set when the current response must be the last on this connection.
    pub close_requested: bool,
}

impl ConnectionState {
    /// Wrap a freshly accepted socket.
    pub fn new(socket: TcpSocket) -> Self {
        ConnectionState {
            socket,
            read_buffer: RingBuffer::new(),
            write_buffer: RingBuffer::new(),
            arena: Arena::new(),
            parser: HttpParser::new(),
            token: None,
            close_requested: false,
        }
    }
}

fn is_would_block(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
}

enum WriteOutcome {
    Drained,
    Suspended,
    Closed,
}

/// Push the write ring into the socket until drained or blocked.
fn drain_write_buffer(state: &mut ConnectionState, reactor: &Reactor, token: Token) -> WriteOutcome {
    while !state.write_buffer.is_empty() {
        let data = state.write_buffer.readable_span();
        match state.socket.write(data) {
            Ok(0) => break,
            Ok(n) => state.write_buffer.consume(n),
            Err(err) if is_would_block(&err) => {
                let _ = reactor.modify(token, Interest::Writable);
                return WriteOutcome::Suspended;
            }
            Err(_) => {
                count_close(&close_counters().write_error, "write_error");
                reactor.reset(token);
                return WriteOutcome::Closed;
            }
        }
    }
    if state.write_buffer.is_empty() {
        WriteOutcome::Drained
    } else {
        let _ = reactor.modify(token, Interest::Writable);
        WriteOutcome::Suspended
    }
}

enum ReadOutcome {
    Progress,
    Suspended,
    Closed,
}

/// Pull bytes from the socket into the read ring.
fn fill_read_buffer(state: &mut ConnectionState, reactor: &Reactor, token: Token) -> ReadOutcome {
    let span = state.read_buffer.writable_span(4096);
    match state.socket.read(span) {
        Ok(0) => {
            count_close(&close_counters().read_eof, "read_eof");
            reactor.reset(token);
            ReadOutcome::Closed
        }
        Ok(n) => {
            state.read_buffer.commit(n);
            ReadOutcome::Progress
        }
        Err(err) if is_would_block(&err) => {
            let _ = reactor.modify(token, Interest::Readable);
            ReadOutcome::Suspended
        }
        Err(_) => {
            count_close(&close_counters().read_error, "read_error");
            reactor.reset(token);
            ReadOutcome::Closed
        }
    }
}

/// Malformed input: best-effort 400, then close.
fn fail_parse(state: &mut ConnectionState, reactor: &Reactor, token: Token) {
    let resp = Response::error(ProblemDetails::bad_request("invalid HTTP request"));
    state.write_buffer.clear();
    resp.serialize_into(&mut state.write_buffer);
    let data = state.write_buffer.readable_span().to_vec();
    let _ = state.socket.write(&data);
    count_close(&close_counters().parse_error, "parse_error");
    reactor.reset(token);
}

/// Drive the connection as far as the kernel allows.
///
/// Invoked from the reactor on every readiness event for this connection's
/// fd. All suspension points re-arm interest before returning.
pub fn handle_connection(state: &mut ConnectionState, reactor: &Reactor, router: &Router) {
    let token = match state.token {
        Some(token) => token,
        // Called before registration completed; the next event retries.
        None => return,
    };

    // Finish a response the kernel previously refused to take in full.
    if !state.write_buffer.is_empty() {
        match drain_write_buffer(state, reactor, token) {
            WriteOutcome::Drained => {}
            WriteOutcome::Suspended | WriteOutcome::Closed => return,
        }
        if state.close_requested {
            count_close(&close_counters().close_header, "close_header");
            reactor.reset(token);
            return;
        }
        state.arena.reset();
        state.parser.reset();
        state.write_buffer.clear();
        if state.read_buffer.is_empty() {
            let _ = reactor.modify(token, Interest::Readable);
            return;
        }
    }

    loop {
        if state.read_buffer.is_empty() {
            match fill_read_buffer(state, reactor, token) {
                ReadOutcome::Progress => {}
                ReadOutcome::Suspended | ReadOutcome::Closed => return,
            }
        }

        loop {
            match state.parser.parse(state.read_buffer.readable_span()) {
                ParseStatus::Complete => break,
                ParseStatus::Invalid => {
                    fail_parse(state, reactor, token);
                    return;
                }
                ParseStatus::NeedMore => match fill_read_buffer(state, reactor, token) {
                    ReadOutcome::Progress => {}
                    ReadOutcome::Suspended | ReadOutcome::Closed => return,
                },
            }
        }

        let parsed_bytes = state.parser.bytes_parsed();

        // Dispatch with the request borrowed out of the read ring and the
        // arena; the response is owned, so the borrows end here.
        let response = {
            let input = state.read_buffer.readable_span();
            let Some(request) = state.parser.request_view(input, &state.arena) else {
                fail_parse(state, reactor, token);
                return;
            };

            let close_requested = request
                .headers
                .get(Field::Connection)
                .map(|v| v.eq_ignore_ascii_case("close"))
                .unwrap_or(false);
            let closing = close_requested || reactor.is_draining();

            let mut ctx = RequestContext::new(&state.arena);
            let mut response = router.dispatch_or_problem(&request, &mut ctx);
            if response.header("Connection").is_none() {
                response.set_header("Connection", if closing { "close" } else { "keep-alive" });
            }
            state.close_requested = closing;
            response
        };

        state.read_buffer.consume(parsed_bytes);
        response.serialize_into(&mut state.write_buffer);

        match drain_write_buffer(state, reactor, token) {
            WriteOutcome::Drained => {}
            WriteOutcome::Suspended | WriteOutcome::Closed => return,
        }

        if state.close_requested {
            count_close(&close_counters().close_header, "close_header");
            reactor.reset(token);
            return;
        }

        // Keep-alive: recycle per-request state. Arena memory from this
        // request must not survive this point.
        state.arena.reset();
        state.parser.reset();

        if state.read_buffer.is_empty() {
            let _ = reactor.modify(token, Interest::Readable);
            return;
        }
        // Pipelined bytes already buffered: parse the next request now.
    }
}
