//! Incremental, non-blocking HTTP/1.1 request parser.
//!
//! The parser is fed the connection's readable span and records *offsets*
//! into it rather than borrowing from it, so partially parsed state
//! survives ring-buffer compaction (which preserves the relative layout of
//! the readable region). Once a request is complete,
//! [`HttpParser::request_view`] materializes a borrowed [`Request`];
//! chunked bodies are de-chunked into one contiguous arena buffer at that
//! point.
//!
//! Malformed input moves the parser into a terminal invalid state;
//! [`HttpParser::bytes_parsed`] then reports the count up to the offending
//! byte.

use super::headers::{Field, HeaderMap};
use super::request::Request;
use crate::arena::Arena;
use http::Method;
use std::ops::Range;

/// Upper bound on the request head (request line + headers).
const MAX_HEAD_BYTES: usize = 64 * 1024;

/// Outcome of a [`HttpParser::parse`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// A full request is buffered; `bytes_parsed()` marks its end.
    Complete,
    /// More bytes are required.
    NeedMore,
    /// The input is not a valid HTTP/1.1 request. Terminal.
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    RequestLine,
    Headers,
    FixedBody,
    ChunkSize,
    ChunkData,
    ChunkDataEnd,
    Trailers,
    Complete,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    None,
    Length(usize),
    Chunked,
}

/// Resumable HTTP/1.1 request parser.
#[derive(Debug)]
pub struct HttpParser {
    state: State,
    /// Scan cursor: offset of the next unexamined byte.
    pos: usize,
    method: Option<Method>,
    target: Range<usize>,
    headers: Vec<(Range<usize>, Range<usize>)>,
    body: BodyKind,
    body_range: Range<usize>,
    /// Payload ranges of each chunk, in order.
    chunks: Vec<Range<usize>>,
    chunk_total: usize,
    /// Size of the chunk currently being received.
    current_chunk: usize,
    bytes_parsed: usize,
}

impl HttpParser {
    /// Create a parser ready for a new request.
    pub fn new() -> Self {
        HttpParser {
            state: State::RequestLine,
            pos: 0,
            method: None,
            target: 0..0,
            headers: Vec::new(),
            body: BodyKind::None,
            body_range: 0..0,
            chunks: Vec::new(),
            chunk_total: 0,
            current_chunk: 0,
            bytes_parsed: 0,
        }
    }

    /// Recycle the parser for the next request on the connection.
    pub fn reset(&mut self) {
        self.state = State::RequestLine;
        self.pos = 0;
        self.method = None;
        self.target = 0..0;
        self.headers.clear();
        self.body = BodyKind::None;
        self.body_range = 0..0;
        self.chunks.clear();
        self.chunk_total = 0;
        self.current_chunk = 0;
        self.bytes_parsed = 0;
    }

    /// True once a full request has been parsed.
    pub fn is_complete(&self) -> bool {
        self.state == State::Complete
    }

    /// Bytes consumed by the current request: its total length once
    /// complete, or the offset of the offending byte after invalid input.
    pub fn bytes_parsed(&self) -> usize {
        self.bytes_parsed
    }

    fn invalid(&mut self, at: usize) -> ParseStatus {
        self.state = State::Invalid;
        self.bytes_parsed = at;
        ParseStatus::Invalid
    }

    /// Advance the parser over `input`.
    ///
    /// `input` must always start at the first byte of the current request;
    /// successive calls pass the same span extended with newly read bytes.
    pub fn parse(&mut self, input: &[u8]) -> ParseStatus {
        loop {
            match self.state {
                State::Complete => return ParseStatus::Complete,
                State::Invalid => return ParseStatus::Invalid,
                State::RequestLine => {
                    let line = match find_crlf(input, self.pos) {
                        Some(end) => end,
                        None => {
                            if input.len() > MAX_HEAD_BYTES {
                                return self.invalid(input.len());
                            }
                            return ParseStatus::NeedMore;
                        }
                    };
                    if self.parse_request_line(input, line).is_err() {
                        return self.invalid(self.pos);
                    }
                    self.pos = line + 2;
                    self.state = State::Headers;
                }
                State::Headers => {
                    let line_start = self.pos;
                    let line_end = match find_crlf(input, line_start) {
                        Some(end) => end,
                        None => {
                            if input.len() - line_start > MAX_HEAD_BYTES {
                                return self.invalid(input.len());
                            }
                            return ParseStatus::NeedMore;
                        }
                    };
                    if line_end == line_start {
                        // Blank line: head finished, figure out the body.
                        self.pos = line_end + 2;
                        match self.classify_body(input) {
                            Ok(BodyKind::None) => {
                                self.body = BodyKind::None;
                                self.bytes_parsed = self.pos;
                                self.state = State::Complete;
                            }
                            Ok(BodyKind::Length(len)) => {
                                self.body = BodyKind::Length(len);
                                self.state = State::FixedBody;
                            }
                            Ok(BodyKind::Chunked) => {
                                self.body = BodyKind::Chunked;
                                self.state = State::ChunkSize;
                            }
                            Err(at) => return self.invalid(at),
                        }
                        continue;
                    }
                    // Folded headers (obs-fold) are rejected outright.
                    if input[line_start] == b' ' || input[line_start] == b'\t' {
                        return self.invalid(line_start);
                    }
                    match parse_header_line(input, line_start, line_end) {
                        Some((name, value)) => self.headers.push((name, value)),
                        None => return self.invalid(line_start),
                    }
                    self.pos = line_end + 2;
                }
                State::FixedBody => {
                    let len = match self.body {
                        BodyKind::Length(len) => len,
                        _ => unreachable!("fixed body state without length"),
                    };
                    if input.len() < self.pos + len {
                        return ParseStatus::NeedMore;
                    }
                    self.body_range = self.pos..self.pos + len;
                    self.pos += len;
                    self.bytes_parsed = self.pos;
                    self.state = State::Complete;
                }
                State::ChunkSize => {
                    let line_end = match find_crlf(input, self.pos) {
                        Some(end) => end,
                        None => return ParseStatus::NeedMore,
                    };
                    let line = &input[self.pos..line_end];
                    // Chunk extensions after ';' are tolerated and ignored.
                    let size_part = match line.iter().position(|&b| b == b';') {
                        Some(idx) => &line[..idx],
                        None => line,
                    };
                    let size = match parse_hex(size_part) {
                        Some(size) => size,
                        None => return self.invalid(self.pos),
                    };
                    self.pos = line_end + 2;
                    if size == 0 {
                        self.state = State::Trailers;
                    } else {
                        self.current_chunk = size;
                        self.state = State::ChunkData;
                    }
                }
                State::ChunkData => {
                    if input.len() < self.pos + self.current_chunk {
                        return ParseStatus::NeedMore;
                    }
                    self.chunks.push(self.pos..self.pos + self.current_chunk);
                    self.chunk_total += self.current_chunk;
                    self.pos += self.current_chunk;
                    self.state = State::ChunkDataEnd;
                }
                State::ChunkDataEnd => {
                    if input.len() < self.pos + 2 {
                        return ParseStatus::NeedMore;
                    }
                    if &input[self.pos..self.pos + 2] != b"\r\n" {
                        return self.invalid(self.pos);
                    }
                    self.pos += 2;
                    self.state = State::ChunkSize;
                }
                State::Trailers => {
                    // Trailer lines are skipped up to the terminating blank line.
                    let line_end = match find_crlf(input, self.pos) {
                        Some(end) => end,
                        None => return ParseStatus::NeedMore,
                    };
                    let empty = line_end == self.pos;
                    self.pos = line_end + 2;
                    if empty {
                        self.bytes_parsed = self.pos;
                        self.state = State::Complete;
                    }
                }
            }
        }
    }

    fn parse_request_line(&mut self, input: &[u8], line_end: usize) -> Result<(), ()> {
        let line = &input[..line_end];
        let mut parts = line.split(|&b| b == b' ');
        let method = parts.next().ok_or(())?;
        let target = parts.next().ok_or(())?;
        let version = parts.next().ok_or(())?;
        if parts.next().is_some() || method.is_empty() || target.is_empty() {
            return Err(());
        }
        if version != b"HTTP/1.1" && version != b"HTTP/1.0" {
            return Err(());
        }
        self.method = Some(Method::from_bytes(method).map_err(|_| ())?);
        let target_start = method.len() + 1;
        self.target = target_start..target_start + target.len();
        Ok(())
    }

    /// Decide the body framing from the parsed headers. `Err(at)` carries
    /// the offset to report for invalid combinations.
    fn classify_body(&self, input: &[u8]) -> Result<BodyKind, usize> {
        let mut content_length: Option<usize> = None;
        let mut content_length_seen = 0usize;
        let mut chunked = false;

        for (name, value) in &self.headers {
            let name_bytes = &input[name.clone()];
            let value_bytes = &input[value.clone()];
            if eq_ignore_case(name_bytes, b"content-length") {
                content_length_seen += 1;
                let text = std::str::from_utf8(value_bytes).map_err(|_| value.start)?;
                let parsed: usize = text.trim().parse().map_err(|_| value.start)?;
                content_length = Some(parsed);
            } else if eq_ignore_case(name_bytes, b"transfer-encoding") {
                let text = std::str::from_utf8(value_bytes).map_err(|_| value.start)?;
                if text
                    .split(',')
                    .any(|tok| tok.trim().eq_ignore_ascii_case("chunked"))
                {
                    chunked = true;
                } else {
                    // Only chunked transfer coding is supported.
                    return Err(value.start);
                }
            }
        }

        // Duplicate Content-Length and Content-Length alongside
        // Transfer-Encoding are both request-smuggling vectors: reject.
        if content_length_seen > 1 {
            return Err(self.pos);
        }
        if chunked && content_length.is_some() {
            return Err(self.pos);
        }
        if chunked {
            return Ok(BodyKind::Chunked);
        }
        match content_length {
            Some(0) | None => Ok(BodyKind::None),
            Some(len) => Ok(BodyKind::Length(len)),
        }
    }

    /// Materialize the parsed request as a borrowed view.
    ///
    /// `input` must be the same span the final `parse` call saw. Chunked
    /// bodies are copied into one contiguous arena allocation here. Returns
    /// `None` when the head is not valid UTF-8.
    pub fn request_view<'a>(&self, input: &'a [u8], arena: &'a Arena) -> Option<Request<'a>> {
        if self.state != State::Complete {
            return None;
        }
        let method = self.method.clone()?;
        let target = std::str::from_utf8(&input[self.target.clone()]).ok()?;

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = std::str::from_utf8(&input[name.clone()]).ok()?;
            let value = std::str::from_utf8(&input[value.clone()]).ok()?;
            headers.insert(name, value);
        }

        let body: &'a [u8] = match self.body {
            BodyKind::None => &[],
            BodyKind::Length(_) => &input[self.body_range.clone()],
            BodyKind::Chunked => {
                let buf = arena.alloc(self.chunk_total, 1);
                let mut offset = 0;
                for chunk in &self.chunks {
                    buf[offset..offset + chunk.len()].copy_from_slice(&input[chunk.clone()]);
                    offset += chunk.len();
                }
                buf
            }
        };

        // Reject the same duplicate Content-Length a proxy might smuggle in
        // through the header map (already enforced during classify, kept as
        // a view-time invariant).
        if headers.occurrences(Field::ContentLength) > 1 {
            return None;
        }

        Some(Request {
            method,
            target,
            headers,
            body,
        })
    }
}

impl Default for HttpParser {
    fn default() -> Self {
        Self::new()
    }
}

fn find_crlf(input: &[u8], from: usize) -> Option<usize> {
    if from >= input.len() {
        return None;
    }
    input[from..]
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|idx| from + idx)
}

fn eq_ignore_case(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| x.eq_ignore_ascii_case(y))
}

fn parse_hex(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() || bytes.len() > 8 {
        return None;
    }
    let mut value: usize = 0;
    for &b in bytes {
        let digit = match b {
            b'0'..=b'9' => (b - b'0') as usize,
            b'a'..=b'f' => (b - b'a' + 10) as usize,
            b'A'..=b'F' => (b - b'A' + 10) as usize,
            _ => return None,
        };
        value = value * 16 + digit;
    }
    Some(value)
}

fn parse_header_line(
    input: &[u8],
    start: usize,
    end: usize,
) -> Option<(Range<usize>, Range<usize>)> {
    let line = &input[start..end];
    let colon = line.iter().position(|&b| b == b':')?;
    if colon == 0 {
        return None;
    }
    let name = &line[..colon];
    // Header names are tokens: no whitespace allowed before the colon.
    if name.iter().any(|&b| b == b' ' || b == b'\t') {
        return None;
    }
    let mut value_start = colon + 1;
    let mut value_end = line.len();
    while value_start < value_end && (line[value_start] == b' ' || line[value_start] == b'\t') {
        value_start += 1;
    }
    while value_end > value_start
        && (line[value_end - 1] == b' ' || line[value_end - 1] == b'\t')
    {
        value_end -= 1;
    }
    Some((
        start..start + colon,
        start + value_start..start + value_end,
    ))
}
