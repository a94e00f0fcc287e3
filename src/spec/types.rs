//! Metadata extracted from an OpenAPI document, shaped for the generator.

use http::Method;
use serde_json::Value;
use std::collections::BTreeMap;

/// Location where a parameter appears in an HTTP request.
///
/// Corresponds to the OpenAPI `in` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterLocation {
    /// Path parameter (e.g. `/users/{id}`).
    Path,
    /// Query string parameter (e.g. `?limit=10`).
    Query,
    /// HTTP header parameter.
    Header,
    /// Cookie parameter.
    Cookie,
}

impl From<oas3::spec::ParameterIn> for ParameterLocation {
    fn from(location: oas3::spec::ParameterIn) -> Self {
        match location {
            oas3::spec::ParameterIn::Path => ParameterLocation::Path,
            oas3::spec::ParameterIn::Query => ParameterLocation::Query,
            oas3::spec::ParameterIn::Header => ParameterLocation::Header,
            oas3::spec::ParameterIn::Cookie => ParameterLocation::Cookie,
        }
    }
}

impl std::fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterLocation::Path => write!(f, "path"),
            ParameterLocation::Query => write!(f, "query"),
            ParameterLocation::Header => write!(f, "header"),
            ParameterLocation::Cookie => write!(f, "cookie"),
        }
    }
}

/// One operation parameter.
#[derive(Debug, Clone)]
pub struct ParameterMeta {
    /// Parameter name as declared in the spec.
    pub name: String,
    /// Where the parameter is carried.
    pub location: ParameterLocation,
    /// Whether the parameter must be present.
    pub required: bool,
    /// JSON Schema for the parameter value, refs expanded.
    pub schema: Option<Value>,
}

impl ParameterMeta {
    /// The schema's primitive `type`, defaulting to `string`.
    pub fn schema_type(&self) -> &str {
        self.schema
            .as_ref()
            .and_then(|s| s.get("type"))
            .and_then(|t| t.as_str())
            .unwrap_or("string")
    }
}

/// One request-body media type and its schema.
#[derive(Debug, Clone)]
pub struct BodyMedia {
    /// Media type token, e.g. `application/json`.
    pub content_type: String,
    /// Schema for this media type, refs expanded.
    pub schema: Option<Value>,
    /// Name of the referenced component schema, when the body is a `$ref`.
    pub schema_name: Option<String>,
}

/// Vendor extensions surfaced to the generator as metadata comments.
#[derive(Debug, Clone, Default)]
pub struct KatanaExtensions {
    /// `x-katana-cache`.
    pub cache: Option<String>,
    /// `x-katana-alloc`.
    pub alloc: Option<String>,
    /// `x-katana-rate-limit`.
    pub rate_limit: Option<String>,
}

impl KatanaExtensions {
    /// True when no extension is set.
    pub fn is_empty(&self) -> bool {
        self.cache.is_none() && self.alloc.is_none() && self.rate_limit.is_none()
    }
}

/// Metadata for a single API route derived from an OpenAPI operation.
#[derive(Debug, Clone)]
pub struct RouteMeta {
    /// HTTP method.
    pub method: Method,
    /// Path pattern with `{param}` placeholders.
    pub path_pattern: String,
    /// The `operationId`; also the generated handler method name.
    pub operation_id: String,
    /// Operation summary, if present.
    pub summary: Option<String>,
    /// Path, query, header and cookie parameters.
    pub parameters: Vec<ParameterMeta>,
    /// Request-body media types in declaration order.
    pub request_bodies: Vec<BodyMedia>,
    /// Whether the request body is required.
    pub request_body_required: bool,
    /// Response media types this operation can produce, in declaration
    /// order, de-duplicated.
    pub produces: Vec<String>,
    /// `x-katana-*` vendor extensions.
    pub extensions: KatanaExtensions,
}

impl RouteMeta {
    /// Media types this operation consumes.
    pub fn consumes(&self) -> Vec<String> {
        self.request_bodies
            .iter()
            .map(|b| b.content_type.clone())
            .collect()
    }

    /// Parameters at `location`, in declaration order.
    pub fn params_at(&self, location: ParameterLocation) -> impl Iterator<Item = &ParameterMeta> {
        self.parameters.iter().filter(move |p| p.location == location)
    }

    /// True when the path contains no `{param}` segments (eligible for the
    /// hash-based fast router).
    pub fn is_static_path(&self) -> bool {
        !self.path_pattern.contains('{')
    }
}

/// A fully loaded OpenAPI document, reduced to what the framework needs.
#[derive(Debug, Clone)]
pub struct SpecDocument {
    /// API title from the `info` block.
    pub title: String,
    /// URL-safe slug derived from the title.
    pub slug: String,
    /// One entry per operation, ordered by path then method.
    pub routes: Vec<RouteMeta>,
    /// Named component schemas, refs expanded, keyed by schema name.
    pub schemas: BTreeMap<String, Value>,
}
