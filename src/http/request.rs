//! Parsed request view and per-request dispatch context.

use super::headers::HeaderMap;
use crate::arena::Arena;
use http::Method;
use smallvec::SmallVec;

/// A parsed HTTP/1.1 request.
///
/// Everything borrows from the connection's read buffer (or the arena for
/// de-chunked bodies), so a `Request` is valid only for the current
/// request/response cycle.
#[derive(Debug)]
pub struct Request<'a> {
    /// HTTP method.
    pub method: Method,
    /// Raw request-target, query string included.
    pub target: &'a str,
    /// Headers in wire order.
    pub headers: HeaderMap<'a>,
    /// Message body (empty when the request carries none).
    pub body: &'a [u8],
}

impl<'a> Request<'a> {
    /// The target with any query string stripped.
    pub fn path(&self) -> &'a str {
        match self.target.find('?') {
            Some(pos) => &self.target[..pos],
            None => self.target,
        }
    }

    /// The query string (without the `?`), if present.
    pub fn query(&self) -> Option<&'a str> {
        self.target.find('?').map(|pos| &self.target[pos + 1..])
    }
}

/// Path parameters extracted during route matching: pattern name paired
/// with the zero-copy value sliced out of the URI. Stack-allocated for the
/// common parameter counts.
pub type Params<'a> = SmallVec<[(&'a str, &'a str); 8]>;

/// Per-request context handed to route handlers alongside the request.
pub struct RequestContext<'a> {
    /// Path parameters keyed by pattern name.
    pub params: Params<'a>,
    /// The connection's request arena.
    pub arena: &'a Arena,
}

impl<'a> RequestContext<'a> {
    /// Create a context with no parameters.
    pub fn new(arena: &'a Arena) -> Self {
        RequestContext {
            params: Params::new(),
            arena,
        }
    }

    /// Look up a path parameter by its pattern name.
    pub fn param(&self, name: &str) -> Option<&'a str> {
        self.params
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| *v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(target: &str) -> Request<'_> {
        Request {
            method: Method::GET,
            target,
            headers: HeaderMap::new(),
            body: &[],
        }
    }

    #[test]
    fn path_strips_query() {
        let req = request("/orders/9?foo=bar");
        assert_eq!(req.path(), "/orders/9");
        assert_eq!(req.query(), Some("foo=bar"));
    }

    #[test]
    fn path_without_query_is_identity() {
        let req = request("/orders/9");
        assert_eq!(req.path(), "/orders/9");
        assert_eq!(req.query(), None);
    }

    #[test]
    fn context_param_lookup() {
        let arena = Arena::new();
        let mut ctx = RequestContext::new(&arena);
        ctx.params.push(("id", "42"));
        assert_eq!(ctx.param("id"), Some("42"));
        assert_eq!(ctx.param("missing"), None);
    }
}
