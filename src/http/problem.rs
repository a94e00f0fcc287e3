//! RFC 7807 problem-details error envelope.
//!
//! Every framework-generated error response (400, 404, 405, 406, 415, 500)
//! is rendered as `application/problem+json` with this shape, so clients
//! see one uniform error format regardless of which layer rejected the
//! request.

use super::response::Response;
use http::StatusCode;
use serde::Serialize;

/// RFC 7807 error envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemDetails {
    /// Problem type URI. `about:blank` when the status code says it all.
    #[serde(rename = "type")]
    pub type_uri: String,
    /// Short human-readable summary (the status reason phrase).
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Occurrence-specific explanation.
    pub detail: String,
    /// URI identifying this occurrence. Empty unless the caller sets one.
    pub instance: String,
}

impl ProblemDetails {
    /// Build a problem for `status` with the given detail text.
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        ProblemDetails {
            type_uri: "about:blank".to_string(),
            title: status.canonical_reason().unwrap_or("Unknown").to_string(),
            status: status.as_u16(),
            detail: detail.into(),
            instance: String::new(),
        }
    }

    /// `400 Bad Request`.
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    /// `404 Not Found`.
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    /// `405 Method Not Allowed`.
    pub fn method_not_allowed(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, detail)
    }

    /// `406 Not Acceptable`.
    pub fn not_acceptable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_ACCEPTABLE, detail)
    }

    /// `415 Unsupported Media Type`.
    pub fn unsupported_media_type(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, detail)
    }

    /// `500 Internal Server Error`.
    pub fn internal_error(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }

    /// Render as an `application/problem+json` response.
    pub fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::to_string(&self)
            .unwrap_or_else(|_| r#"{"title":"Internal Server Error","status":500}"#.to_string());
        let mut resp = Response::with_status(status);
        resp.body = body.into();
        resp.set_header("Content-Type", "application/problem+json");
        resp
    }
}

impl Response {
    /// Shorthand used by the router and generated dispatch stubs.
    pub fn error(problem: ProblemDetails) -> Response {
        problem.into_response()
    }
}
