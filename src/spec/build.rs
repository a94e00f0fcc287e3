//! Extraction of route metadata from a parsed OpenAPI document.

use super::types::{
    BodyMedia, KatanaExtensions, ParameterLocation, ParameterMeta, RouteMeta, SpecDocument,
};
use super::ValidationIssue;
use oas3::spec::{ObjectOrReference, Parameter};
use oas3::OpenApiV3Spec;
use serde_json::Value;
use std::collections::BTreeMap;

/// Resolve a `#/components/schemas/<name>` reference to its schema object.
pub fn resolve_schema_ref<'a>(
    spec: &'a OpenApiV3Spec,
    ref_path: &str,
) -> Option<&'a oas3::spec::ObjectSchema> {
    let name = ref_path.strip_prefix("#/components/schemas/")?;
    spec.components
        .as_ref()?
        .schemas
        .get(name)
        .and_then(|schema_ref| match schema_ref {
            ObjectOrReference::Object(schema) => Some(schema),
            _ => None,
        })
}

/// Recursively replace `$ref` nodes with their resolved schemas, tagging
/// each expansion with `x-ref-name` so the generator can recover the
/// component name.
pub fn expand_schema_refs(spec: &OpenApiV3Spec, value: &mut Value) {
    match value {
        Value::Object(obj) => {
            if let Some(ref_path) = obj.get("$ref").and_then(|v| v.as_str()) {
                if let Some(schema) = resolve_schema_ref(spec, ref_path) {
                    let name = ref_path
                        .strip_prefix("#/components/schemas/")
                        .map(str::to_string);
                    if let Ok(mut new_val) = serde_json::to_value(schema) {
                        expand_schema_refs(spec, &mut new_val);
                        if let (Some(name), Value::Object(o)) = (name, &mut new_val) {
                            o.insert("x-ref-name".to_string(), Value::String(name));
                        }
                        *value = new_val;
                        return;
                    }
                }
            }
            for v in obj.values_mut() {
                expand_schema_refs(spec, v);
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                expand_schema_refs(spec, v);
            }
        }
        _ => {}
    }
}

fn resolve_parameter_ref<'a>(spec: &'a OpenApiV3Spec, ref_path: &str) -> Option<&'a Parameter> {
    let name = ref_path.strip_prefix("#/components/parameters/")?;
    spec.components
        .as_ref()?
        .parameters
        .get(name)
        .and_then(|param_ref| match param_ref {
            ObjectOrReference::Object(param) => Some(param),
            _ => None,
        })
}

/// Resolve parameter references and extract metadata for path, query,
/// header and cookie parameters.
pub fn extract_parameters(
    spec: &OpenApiV3Spec,
    params: &[ObjectOrReference<Parameter>],
) -> Vec<ParameterMeta> {
    let mut out = Vec::new();
    for p in params {
        let param = match p {
            ObjectOrReference::Object(obj) => Some(obj),
            ObjectOrReference::Ref { ref_path } => resolve_parameter_ref(spec, ref_path),
        };
        if let Some(param) = param {
            let mut schema = param.schema.as_ref().and_then(|s| match s {
                ObjectOrReference::Object(obj) => serde_json::to_value(obj).ok(),
                ObjectOrReference::Ref { ref_path } => resolve_schema_ref(spec, ref_path)
                    .and_then(|schema| serde_json::to_value(schema).ok()),
            });
            if let Some(ref mut val) = schema {
                expand_schema_refs(spec, val);
            }
            out.push(ParameterMeta {
                name: param.name.clone(),
                location: ParameterLocation::from(param.location),
                required: param.required.unwrap_or(false),
                schema,
            });
        }
    }
    out
}

/// Extract the request-body media types and their schemas.
pub fn extract_request_bodies(
    spec: &OpenApiV3Spec,
    operation: &oas3::spec::Operation,
) -> (Vec<BodyMedia>, bool) {
    let mut required = false;
    let mut bodies = Vec::new();

    if let Some(ObjectOrReference::Object(req_body)) = operation.request_body.as_ref() {
        required = req_body.required.unwrap_or(false);
        for (content_type, media) in &req_body.content {
            let mut schema_name = None;
            let mut schema = match media.schema.as_ref() {
                Some(ObjectOrReference::Object(schema_obj)) => {
                    serde_json::to_value(schema_obj).ok()
                }
                Some(ObjectOrReference::Ref { ref_path }) => {
                    schema_name = ref_path
                        .strip_prefix("#/components/schemas/")
                        .map(str::to_string);
                    resolve_schema_ref(spec, ref_path).and_then(|s| serde_json::to_value(s).ok())
                }
                None => None,
            };
            if let Some(ref mut val) = schema {
                expand_schema_refs(spec, val);
                if schema_name.is_none() {
                    schema_name = val
                        .get("x-ref-name")
                        .and_then(|v| v.as_str())
                        .map(str::to_string);
                }
            }
            bodies.push(BodyMedia {
                content_type: content_type.clone(),
                schema,
                schema_name,
            });
        }
    }
    (bodies, required)
}

/// Collect the response media types an operation can produce, in
/// declaration order, de-duplicated.
pub fn extract_produces(operation: &oas3::spec::Operation) -> Vec<String> {
    let mut produces: Vec<String> = Vec::new();
    if let Some(responses) = operation.responses.as_ref() {
        for resp_ref in responses.values() {
            if let ObjectOrReference::Object(resp) = resp_ref {
                for content_type in resp.content.keys() {
                    if !produces.iter().any(|p| p == content_type) {
                        produces.push(content_type.clone());
                    }
                }
            }
        }
    }
    produces
}

fn string_extension(operation: &oas3::spec::Operation, key: &str) -> Option<String> {
    operation.extensions.get(key).and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    })
}

/// Pull the `x-katana-*` vendor extensions off an operation.
pub fn extract_extensions(operation: &oas3::spec::Operation) -> KatanaExtensions {
    KatanaExtensions {
        cache: string_extension(operation, "x-katana-cache"),
        alloc: string_extension(operation, "x-katana-alloc"),
        rate_limit: string_extension(operation, "x-katana-rate-limit"),
    }
}

fn resolve_operation_id(
    operation: &oas3::spec::Operation,
    location: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<String> {
    operation
        .operation_id
        .clone()
        .or_else(|| {
            operation.extensions.iter().find_map(|(key, val)| {
                if key.starts_with("x-handler") {
                    if let Value::String(s) = val {
                        return Some(s.clone());
                    }
                }
                None
            })
        })
        .or_else(|| {
            issues.push(ValidationIssue::new(
                location,
                "missing_operation_id",
                "operation has neither operationId nor an x-handler-* extension",
            ));
            None
        })
}

/// Expanded named component schemas, for DTO generation.
pub fn extract_named_schemas(spec: &OpenApiV3Spec) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    if let Some(components) = spec.components.as_ref() {
        for (name, schema_ref) in &components.schemas {
            if let ObjectOrReference::Object(schema) = schema_ref {
                if let Ok(mut value) = serde_json::to_value(schema) {
                    expand_schema_refs(spec, &mut value);
                    out.insert(name.clone(), value);
                }
            }
        }
    }
    out
}

/// Build the reduced [`SpecDocument`] from a parsed OpenAPI spec.
///
/// Routes are ordered by path, then method — the ordering contract that
/// keeps generator output deterministic.
pub fn build_document(spec: &OpenApiV3Spec) -> anyhow::Result<SpecDocument> {
    let mut issues = Vec::new();
    let mut routes = Vec::new();

    let title = spec.info.title.clone();
    let slug = title
        .to_lowercase()
        .replace(|c: char| !c.is_ascii_alphanumeric(), "_")
        .trim_matches('_')
        .to_string();

    if let Some(paths_map) = spec.paths.as_ref() {
        for (path, item) in paths_map {
            for (method, operation) in item.methods() {
                let location = format!("{path} {method}");
                let operation_id = match resolve_operation_id(operation, &location, &mut issues) {
                    Some(id) => id,
                    None => continue,
                };

                let mut parameters = Vec::new();
                parameters.extend(extract_parameters(spec, &item.parameters));
                parameters.extend(extract_parameters(spec, &operation.parameters));

                for param in &parameters {
                    if param.location == ParameterLocation::Path && !param.required {
                        issues.push(ValidationIssue::new(
                            &location,
                            "optional_path_param",
                            format!("path parameter '{}' must be required", param.name),
                        ));
                    }
                }

                let (request_bodies, request_body_required) =
                    extract_request_bodies(spec, operation);

                routes.push(RouteMeta {
                    method: method.clone(),
                    path_pattern: path.clone(),
                    operation_id,
                    summary: operation.summary.clone(),
                    parameters,
                    request_bodies,
                    request_body_required,
                    produces: extract_produces(operation),
                    extensions: extract_extensions(operation),
                });
            }
        }
    }

    routes.sort_by(|a, b| {
        a.path_pattern
            .cmp(&b.path_pattern)
            .then_with(|| a.method.as_str().cmp(b.method.as_str()))
    });

    super::fail_if_issues(issues)?;
    Ok(SpecDocument {
        title,
        slug,
        routes,
        schemas: extract_named_schemas(spec),
    })
}
