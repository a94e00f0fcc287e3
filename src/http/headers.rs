//! Insertion-order preserving header map with zero-copy values.
//!
//! Request header names and values are views into the connection's read
//! buffer (or arena copies), so the map is parameterized by the borrow.
//! Lookup is O(1) for well-known fields via the [`Field`] enum and a
//! case-insensitive linear scan for everything else.

use smallvec::SmallVec;

/// Well-known header fields with dedicated O(1) lookup slots.
///
/// Generated dispatch code refers to these instead of runtime strings for
/// the headers it touches on every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    ContentType,
    ContentLength,
    TransferEncoding,
    Accept,
    Connection,
    Cookie,
    Host,
    Authorization,
    UserAgent,
}

/// Number of [`Field`] variants (size of the fast-lookup table).
const FIELD_COUNT: usize = 9;

impl Field {
    /// Canonical wire name of the field.
    pub fn as_str(self) -> &'static str {
        match self {
            Field::ContentType => "Content-Type",
            Field::ContentLength => "Content-Length",
            Field::TransferEncoding => "Transfer-Encoding",
            Field::Accept => "Accept",
            Field::Connection => "Connection",
            Field::Cookie => "Cookie",
            Field::Host => "Host",
            Field::Authorization => "Authorization",
            Field::UserAgent => "User-Agent",
        }
    }

    /// Recognize a header name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Field> {
        const ALL: [Field; FIELD_COUNT] = [
            Field::ContentType,
            Field::ContentLength,
            Field::TransferEncoding,
            Field::Accept,
            Field::Connection,
            Field::Cookie,
            Field::Host,
            Field::Authorization,
            Field::UserAgent,
        ];
        ALL.into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(name))
    }

    fn index(self) -> usize {
        match self {
            Field::ContentType => 0,
            Field::ContentLength => 1,
            Field::TransferEncoding => 2,
            Field::Accept => 3,
            Field::Connection => 4,
            Field::Cookie => 5,
            Field::Host => 6,
            Field::Authorization => 7,
            Field::UserAgent => 8,
        }
    }
}

/// Request header map.
///
/// Preserves insertion order; stores at most the first occurrence of each
/// well-known field in the fast table (duplicates stay reachable through
/// iteration and [`occurrences`](Self::occurrences)).
#[derive(Debug, Default)]
pub struct HeaderMap<'a> {
    entries: SmallVec<[(&'a str, &'a str); 16]>,
    known: [Option<u16>; FIELD_COUNT],
}

impl<'a> HeaderMap<'a> {
    /// Create an empty map.
    pub fn new() -> Self {
        HeaderMap {
            entries: SmallVec::new(),
            known: [None; FIELD_COUNT],
        }
    }

    /// Append a header, keeping insertion order.
    pub fn insert(&mut self, name: &'a str, value: &'a str) {
        let idx = self.entries.len() as u16;
        self.entries.push((name, value));
        if let Some(field) = Field::from_name(name) {
            let slot = &mut self.known[field.index()];
            if slot.is_none() {
                *slot = Some(idx);
            }
        }
    }

    /// O(1) lookup of a well-known field.
    pub fn get(&self, field: Field) -> Option<&'a str> {
        self.known[field.index()].map(|idx| self.entries[idx as usize].1)
    }

    /// Case-insensitive lookup by name, O(entries).
    pub fn get_str(&self, name: &str) -> Option<&'a str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }

    /// Number of times `field` appears. The parser uses this to reject
    /// duplicate `Content-Length` headers.
    pub fn occurrences(&self, field: Field) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(field.as_str()))
            .count()
    }

    /// Headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a str)> + '_ {
        self.entries.iter().copied()
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no headers were recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_field_lookup_is_case_insensitive_at_insert() {
        let mut map = HeaderMap::new();
        map.insert("content-type", "application/json");
        assert_eq!(map.get(Field::ContentType), Some("application/json"));
        assert_eq!(map.get_str("CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut map = HeaderMap::new();
        map.insert("Host", "a");
        map.insert("X-One", "1");
        map.insert("X-Two", "2");
        let names: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["Host", "X-One", "X-Two"]);
    }

    #[test]
    fn duplicate_known_field_keeps_first_but_counts_all() {
        let mut map = HeaderMap::new();
        map.insert("Content-Length", "3");
        map.insert("content-length", "5");
        assert_eq!(map.get(Field::ContentLength), Some("3"));
        assert_eq!(map.occurrences(Field::ContentLength), 2);
    }

    #[test]
    fn unknown_header_falls_back_to_scan() {
        let mut map = HeaderMap::new();
        map.insert("X-Request-Id", "abc");
        assert_eq!(map.get_str("x-request-id"), Some("abc"));
        assert_eq!(map.get_str("missing"), None);
    }
}
