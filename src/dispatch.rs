//! Runtime support for generated dispatch stubs.
//!
//! The code generator emits one stub per operation; the shared pieces —
//! content negotiation, content-type matching, query/cookie extraction,
//! typed parameter parsing, path hashing and validation-error formatting —
//! live here so the generated code stays small and readable.

use crate::http::{ProblemDetails, Response};

/// Negotiate the response content type.
///
/// Laws: a missing/empty/`*/*` Accept header selects `produces[0]`; an
/// Accept equal to any produced type selects that type; an Accept matching
/// nothing yields `None` (the stub answers `406 Not Acceptable`).
///
/// Three fast paths cover the common headers before the full comma-split,
/// parameter-strip, wildcard-aware scan runs.
pub fn negotiate<'a>(produces: &'a [String], accept: Option<&str>) -> Option<&'a str> {
    let first = produces.first()?.as_str();

    // Fast path: no Accept header, empty, or */* takes the first type.
    let accept = match accept {
        None => return Some(first),
        Some(a) if a.is_empty() || a == "*/*" => return Some(first),
        Some(a) => a,
    };

    // Fast path: single produced type with exact equality.
    if produces.len() == 1 && accept == first {
        return Some(first);
    }

    // Fast path: single token without parameters.
    if !accept.contains(',') && !accept.contains(';') {
        return produces.iter().find(|p| p.as_str() == accept).map(|p| p.as_str());
    }

    // Slow path: comma-separated list, parameters stripped, wildcards.
    for token in accept.split(',') {
        let mut token = token.trim();
        if let Some(semi) = token.find(';') {
            token = token[..semi].trim_end();
        }
        if token.is_empty() {
            continue;
        }
        if token == "*/*" {
            return Some(first);
        }
        if let Some(prefix) = token.strip_suffix("/*") {
            // Keep the '/' so "text/*" cannot match "textual/json".
            let prefix = &token[..prefix.len() + 1];
            if let Some(hit) = produces.iter().find(|p| p.starts_with(prefix)) {
                return Some(hit.as_str());
            }
        } else if let Some(hit) = produces.iter().find(|p| p.as_str() == token) {
            return Some(hit.as_str());
        }
    }
    None
}

/// Match a `Content-Type` header against the media types an operation
/// consumes, returning the index of the first hit.
///
/// Prefix match on the media-type token: parameters such as
/// `; charset=utf-8` are ignored.
pub fn match_content_type(header: Option<&str>, allowed: &[String]) -> Option<usize> {
    let header = header?;
    if allowed.is_empty() {
        return None;
    }
    allowed.iter().position(|ct| {
        header.len() >= ct.len()
            && header[..ct.len()].eq_ignore_ascii_case(ct)
            && matches!(
                header.as_bytes().get(ct.len()),
                None | Some(b';') | Some(b' ')
            )
    })
}

/// Extract a raw query-string value from a request target.
///
/// Returns the value as a zero-copy slice; a key present without `=` maps
/// to the empty string.
pub fn query_param<'a>(target: &'a str, key: &str) -> Option<&'a str> {
    let query = target.split_once('?')?.1;
    for pair in query.split('&') {
        match pair.split_once('=') {
            Some((name, value)) => {
                if name == key {
                    return Some(value);
                }
            }
            None => {
                if pair == key {
                    return Some("");
                }
            }
        }
    }
    None
}

/// Extract a cookie value from a `Cookie` header.
///
/// Splits on `;`, trims whitespace, splits on `=`; name comparison is
/// case-sensitive.
pub fn cookie_param<'a>(cookie_header: Option<&'a str>, key: &str) -> Option<&'a str> {
    let header = cookie_header?;
    for pair in header.split(';') {
        let Some((name, value)) = pair.trim().split_once('=') else {
            continue;
        };
        if name.trim() == key {
            return Some(value.trim());
        }
    }
    None
}

/// Parse an `integer` parameter. The whole string must be a decimal
/// integer.
pub fn parse_i64(value: &str) -> Option<i64> {
    value.parse().ok()
}

/// Parse a `number` parameter, locale-independent.
pub fn parse_f64(value: &str) -> Option<f64> {
    value.parse().ok()
}

/// Parse a `boolean` parameter: exactly the literals `true` and `false`.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// FNV-1a hash of a path string.
///
/// `const` so the generator can bake route hashes into `match` arms; the
/// fast router hashes the incoming path with the same function. 64-bit
/// output makes collisions astronomically unlikely, and the fast router
/// still verifies path equality before dispatching.
pub const fn fnv1a_hash(path: &str) -> u64 {
    let bytes = path.as_bytes();
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        i += 1;
    }
    hash
}

/// A generated validator's rejection: which field failed and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// Constraint description.
    pub message: String,
}

impl ValidationError {
    /// Create a validation error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Format a validation failure as the uniform `400` problem response.
pub fn validation_problem(err: &ValidationError) -> Response {
    let mut detail = String::with_capacity(err.field.len() + err.message.len() + 2);
    detail.push_str(&err.field);
    detail.push_str(": ");
    detail.push_str(&err.message);
    Response::error(ProblemDetails::bad_request(detail))
}
