//! Read/write staging buffer for socket I/O.
//!
//! A [`RingBuffer`] fronts each direction of a connection: bytes read from
//! the socket are committed into the read ring and consumed by the parser;
//! serialized responses are committed into the write ring and consumed as
//! the socket drains them.
//!
//! Despite the name this is a compacting linear buffer, not a circular one:
//! the readable region is always contiguous, which is what the incremental
//! HTTP parser needs. Compaction moves the readable bytes to the front of
//! the buffer, preserving their relative order, so parser offsets taken
//! relative to the start of the readable span stay valid.

/// Byte buffer with commit/consume semantics.
///
/// Invariant: `read_pos <= write_pos <= capacity`. Compaction and growth
/// happen only inside [`writable_span`](Self::writable_span).
#[derive(Debug)]
pub struct RingBuffer {
    buf: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
}

/// Initial capacity for a fresh ring (4 KiB).
const INITIAL_CAPACITY: usize = 4096;

impl RingBuffer {
    /// Create an empty ring with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    /// Create an empty ring with at least `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        RingBuffer {
            buf: vec![0u8; capacity.max(1)],
            read_pos: 0,
            write_pos: 0,
        }
    }

    /// Bytes available to read.
    pub fn len(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// True when no readable bytes are staged.
    pub fn is_empty(&self) -> bool {
        self.read_pos == self.write_pos
    }

    /// Current capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// The contiguous readable region.
    pub fn readable_span(&self) -> &[u8] {
        &self.buf[self.read_pos..self.write_pos]
    }

    /// A writable region of at least `min` bytes.
    ///
    /// Compacts (moving readable bytes to the front) when that frees enough
    /// space, and grows the buffer otherwise. Bytes written here become
    /// readable only after [`commit`](Self::commit).
    pub fn writable_span(&mut self, min: usize) -> &mut [u8] {
        if self.buf.len() - self.write_pos < min {
            let len = self.len();
            if self.read_pos > 0 {
                self.buf.copy_within(self.read_pos..self.write_pos, 0);
                self.read_pos = 0;
                self.write_pos = len;
            }
            if self.buf.len() - self.write_pos < min {
                self.buf.resize((len + min).next_power_of_two(), 0);
            }
        }
        &mut self.buf[self.write_pos..]
    }

    /// Mark `n` bytes of the most recent writable span as readable.
    pub fn commit(&mut self, n: usize) {
        debug_assert!(self.write_pos + n <= self.buf.len());
        self.write_pos += n;
    }

    /// Discard `n` readable bytes from the front.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.len());
        self.read_pos += n;
        if self.read_pos == self.write_pos {
            self.read_pos = 0;
            self.write_pos = 0;
        }
    }

    /// Drop all staged bytes.
    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
    }

    /// Append `bytes`, growing as needed. Convenience for serializers.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        let span = self.writable_span(bytes.len());
        span[..bytes.len()].copy_from_slice(bytes);
        self.commit(bytes.len());
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_then_consume() {
        let mut ring = RingBuffer::with_capacity(16);
        let span = ring.writable_span(4);
        span[..4].copy_from_slice(b"abcd");
        ring.commit(4);
        assert_eq!(ring.readable_span(), b"abcd");

        ring.consume(2);
        assert_eq!(ring.readable_span(), b"cd");
        ring.consume(2);
        assert!(ring.is_empty());
        // Fully drained rings rewind to offset zero.
        assert_eq!(ring.readable_span().len(), 0);
    }

    #[test]
    fn compaction_preserves_readable_bytes() {
        let mut ring = RingBuffer::with_capacity(8);
        ring.extend_from_slice(b"abcdef");
        ring.consume(4);
        // Only "ef" remains; asking for 6 writable bytes forces compaction.
        let span = ring.writable_span(6);
        assert!(span.len() >= 6);
        assert_eq!(ring.readable_span(), b"ef");
    }

    #[test]
    fn growth_when_compaction_is_not_enough() {
        let mut ring = RingBuffer::with_capacity(4);
        ring.extend_from_slice(b"abcd");
        let span = ring.writable_span(16);
        assert!(span.len() >= 16);
        assert_eq!(ring.readable_span(), b"abcd");
    }

    #[test]
    fn clear_discards_everything() {
        let mut ring = RingBuffer::new();
        ring.extend_from_slice(b"leftover");
        ring.clear();
        assert!(ring.is_empty());
    }
}
