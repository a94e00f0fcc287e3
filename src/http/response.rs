//! Response carrier and HTTP/1.1 serializer.

use crate::ring::RingBuffer;
use http::StatusCode;
use std::borrow::Cow;

/// An HTTP response assembled by a handler or by the framework.
///
/// The whole body is buffered before the status line goes out; chunked
/// response encoding is not supported.
#[derive(Debug, Clone)]
pub struct Response {
    /// Status code.
    pub status: StatusCode,
    headers: Vec<(String, String)>,
    /// Response body.
    pub body: Cow<'static, str>,
}

impl Response {
    /// An empty response with the given status.
    pub fn with_status(status: StatusCode) -> Self {
        Response {
            status,
            headers: Vec::new(),
            body: Cow::Borrowed(""),
        }
    }

    /// A `200 OK` response with an explicit content type.
    pub fn ok(body: impl Into<Cow<'static, str>>, content_type: &str) -> Self {
        let mut resp = Response {
            status: StatusCode::OK,
            headers: Vec::new(),
            body: body.into(),
        };
        resp.set_header("Content-Type", content_type);
        resp
    }

    /// A `200 OK` response carrying pre-serialized JSON.
    pub fn json(body: impl Into<Cow<'static, str>>) -> Self {
        Self::ok(body, "application/json")
    }

    /// A `200 OK` plain-text response.
    pub fn text(body: impl Into<Cow<'static, str>>) -> Self {
        Self::ok(body, "text/plain")
    }

    /// Set a header, replacing any existing value (case-insensitive name
    /// match).
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let Some(entry) = self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            entry.1 = value.to_string();
        } else {
            self.headers.push((name.to_string(), value.to_string()));
        }
    }

    /// Get a header value (case-insensitive name match).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Headers in insertion order.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serialize the response into the connection's write ring.
    ///
    /// Emits `HTTP/1.1 <code> <reason>\r\n`, the headers, a framework-owned
    /// `Content-Length`, a blank line and the body. Any caller-set
    /// `Content-Length` is ignored in favor of the actual body length.
    pub fn serialize_into(&self, ring: &mut RingBuffer) {
        let reason = self.status.canonical_reason().unwrap_or("Unknown");
        let mut head = String::with_capacity(64 + self.headers.len() * 32);
        head.push_str("HTTP/1.1 ");
        head.push_str(self.status.as_str());
        head.push(' ');
        head.push_str(reason);
        head.push_str("\r\n");
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("Content-Length") {
                continue;
            }
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str("Content-Length: ");
        head.push_str(&self.body.len().to_string());
        head.push_str("\r\n\r\n");

        ring.extend_from_slice(head.as_bytes());
        ring.extend_from_slice(self.body.as_bytes());
    }
}
