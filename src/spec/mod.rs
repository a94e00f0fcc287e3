//! OpenAPI subset ingestion: document loading and route-metadata
//! extraction for the code generator and the spec-first serve mode.

mod build;
mod load;
mod types;

pub use build::{
    build_document, expand_schema_refs, extract_named_schemas, extract_parameters,
    extract_produces, extract_request_bodies, resolve_schema_ref,
};
pub use load::{load_spec, load_spec_from_str};
pub use types::{
    BodyMedia, KatanaExtensions, ParameterLocation, ParameterMeta, RouteMeta, SpecDocument,
};

/// A problem found while validating a spec, with enough location context to
/// act on it.
#[derive(Debug)]
pub struct ValidationIssue {
    /// Where in the spec the issue sits (e.g. `/pets/{petId} GET`).
    pub location: String,
    /// Machine-readable issue kind.
    pub kind: String,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    /// Create an issue.
    pub fn new(
        location: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ValidationIssue {
            location: location.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.location, self.message)
    }
}

/// Fail the load when validation issues were collected, reporting all of
/// them at once.
pub fn fail_if_issues(issues: Vec<ValidationIssue>) -> anyhow::Result<()> {
    if issues.is_empty() {
        return Ok(());
    }
    let report = issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    anyhow::bail!("spec validation failed with {} issue(s):\n{report}", issues.len())
}
