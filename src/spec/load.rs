//! OpenAPI document loading.
//!
//! JSON and YAML are both accepted. Unknown path-item verbs are stripped
//! before typed parsing so that a spec carrying tooling-specific keys still
//! loads; genuinely unsupported constructs surface as validation issues
//! with their spec location.

use super::build::build_document;
use super::types::SpecDocument;
use anyhow::Context;
use oas3::OpenApiV3Spec;
use std::path::Path;

fn strip_unknown_verbs(val: &mut serde_json::Value) {
    const METHODS: [&str; 8] = [
        "get", "post", "put", "delete", "patch", "options", "head", "trace",
    ];

    if let Some(serde_json::Value::Object(paths_map)) = val.get_mut("paths") {
        for item in paths_map.values_mut() {
            if let serde_json::Value::Object(obj) = item {
                let keys: Vec<String> = obj.keys().cloned().collect();
                for k in keys {
                    let lk = k.to_ascii_lowercase();
                    let keep = match lk.as_str() {
                        "summary" | "description" | "servers" | "parameters" | "$ref" => true,
                        m if METHODS.contains(&m) => true,
                        _ => k.starts_with("x-"),
                    };
                    if !keep {
                        obj.remove(&k);
                    }
                }
            }
        }
    }
}

fn parse_value(value: serde_json::Value) -> anyhow::Result<SpecDocument> {
    let mut value = value;
    strip_unknown_verbs(&mut value);
    let spec: OpenApiV3Spec =
        serde_json::from_value(value).context("document is not a supported OpenAPI 3.x spec")?;
    build_document(&spec)
}

/// Load an OpenAPI document from text (JSON, falling back to YAML).
pub fn load_spec_from_str(text: &str) -> anyhow::Result<SpecDocument> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => serde_yaml::from_str(text).context("spec is neither valid JSON nor YAML")?,
    };
    parse_value(value)
}

/// Load an OpenAPI document from a file. The extension picks the format:
/// `.yaml`/`.yml` parse as YAML, everything else as JSON.
pub fn load_spec(path: impl AsRef<Path>) -> anyhow::Result<SpecDocument> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read spec file {}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
        .unwrap_or(false);
    let value: serde_json::Value = if is_yaml {
        serde_yaml::from_str(&content)
            .with_context(|| format!("invalid YAML in {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("invalid JSON in {}", path.display()))?
    };
    parse_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::ParameterLocation;
    use serde_json::json;

    #[test]
    fn strips_unknown_verbs() {
        let mut v = json!({
            "paths": {
                "/x": { "get": {}, "patch": {}, "unknown": {}, "x-keep": {} }
            }
        });
        strip_unknown_verbs(&mut v);
        assert!(v["paths"]["/x"].get("unknown").is_none());
        assert!(v["paths"]["/x"].get("get").is_some());
        assert!(v["paths"]["/x"].get("x-keep").is_some());
    }

    #[test]
    fn loads_minimal_spec() {
        let doc = load_spec_from_str(
            r##"{
                "openapi": "3.0.3",
                "info": { "title": "Pet Store", "version": "1.0.0" },
                "paths": {
                    "/pets/{petId}": {
                        "get": {
                            "operationId": "getPet",
                            "parameters": [{
                                "name": "petId",
                                "in": "path",
                                "required": true,
                                "schema": { "type": "integer" }
                            }],
                            "responses": {
                                "200": {
                                    "description": "OK",
                                    "content": { "application/json": {} }
                                }
                            }
                        }
                    }
                }
            }"##,
        )
        .unwrap();

        assert_eq!(doc.title, "Pet Store");
        assert_eq!(doc.slug, "pet_store");
        assert_eq!(doc.routes.len(), 1);
        let route = &doc.routes[0];
        assert_eq!(route.operation_id, "getPet");
        assert_eq!(route.path_pattern, "/pets/{petId}");
        assert_eq!(route.produces, vec!["application/json"]);
        let param = &route.parameters[0];
        assert_eq!(param.location, ParameterLocation::Path);
        assert_eq!(param.schema_type(), "integer");
    }

    #[test]
    fn missing_operation_id_is_reported_with_location() {
        let err = load_spec_from_str(
            r#"{
                "openapi": "3.0.3",
                "info": { "title": "Bad", "version": "1" },
                "paths": { "/a": { "get": { "responses": {} } } }
            }"#,
        )
        .unwrap_err();
        let text = format!("{err:#}");
        assert!(text.contains("/a"), "error should cite the path: {text}");
    }

    #[test]
    fn vendor_extensions_are_captured() {
        let doc = load_spec_from_str(
            r#"{
                "openapi": "3.0.3",
                "info": { "title": "Ext", "version": "1" },
                "paths": {
                    "/hot": {
                        "get": {
                            "operationId": "hotPath",
                            "x-katana-cache": "ttl=30s",
                            "x-katana-alloc": "arena",
                            "x-katana-rate-limit": "100/s",
                            "responses": { "200": { "description": "OK" } }
                        }
                    }
                }
            }"#,
        )
        .unwrap();
        let ext = &doc.routes[0].extensions;
        assert_eq!(ext.cache.as_deref(), Some("ttl=30s"));
        assert_eq!(ext.alloc.as_deref(), Some("arena"));
        assert_eq!(ext.rate_limit.as_deref(), Some("100/s"));
    }

    #[test]
    fn yaml_specs_load_too() {
        let doc = load_spec_from_str(
            "openapi: 3.0.3\ninfo:\n  title: Mini\n  version: '1'\npaths:\n  /ping:\n    get:\n      operationId: ping\n      responses:\n        '200':\n          description: OK\n",
        )
        .unwrap();
        assert_eq!(doc.routes[0].operation_id, "ping");
        assert!(doc.routes[0].is_static_path());
    }
}
