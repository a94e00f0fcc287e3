//! Mapping from OpenAPI schemas to generated Rust types.

use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// A field of a generated DTO struct.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Sanitized Rust field name (e.g. `user_id`).
    pub name: String,
    /// Original property name from the spec (for serde rename).
    pub original_name: String,
    /// Rust type, without the `Option` wrapper.
    pub ty: String,
    /// Whether the property is absent from the schema's `required` list.
    pub optional: bool,
}

/// A variant of a generated union (OpenAPI `oneOf`).
#[derive(Debug, Clone)]
pub struct VariantDef {
    /// Rust variant name.
    pub name: String,
    /// Discriminator value mapped to this variant, when it differs from
    /// the variant name.
    pub rename: Option<String>,
    /// Inner payload type.
    pub inner: String,
}

/// Shape of a generated type.
#[derive(Debug, Clone)]
pub enum TypeKind {
    /// Plain struct with named fields.
    Struct,
    /// Tagged (or untagged) sum over component schemas.
    Union {
        /// The discriminator property, when declared.
        tag: Option<String>,
    },
    /// Named primitive or array schema, emitted as a type alias.
    Alias(String),
}

/// One generated type: a struct per named object schema, an enum per
/// discriminated union, an alias otherwise.
#[derive(Debug, Clone)]
pub struct TypeDefinition {
    /// Rust type name.
    pub name: String,
    /// Struct, union, or alias.
    pub kind: TypeKind,
    /// Struct fields (empty for unions and aliases).
    pub fields: Vec<FieldDef>,
    /// Union variants (empty otherwise).
    pub variants: Vec<VariantDef>,
}

/// Convert `snake_case`/`kebab-case`/`camelCase` into `CamelCase`.
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper_next = true;
    for c in s.chars() {
        if c == '_' || c == '-' || c == ' ' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert `camelCase`/`kebab-case` into `snake_case`.
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;
    for c in s.chars() {
        if c == '-' || c == ' ' || c == '.' {
            if !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
        } else if c.is_ascii_uppercase() {
            if prev_lower && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    out.trim_matches('_').to_string()
}

/// Escape Rust keywords with raw-identifier syntax.
pub fn sanitize_identifier(name: &str) -> String {
    const KEYWORDS: &[&str] = &[
        "as", "break", "const", "continue", "crate", "else", "enum", "extern", "false", "fn",
        "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref",
        "return", "self", "Self", "static", "struct", "super", "trait", "true", "type", "unsafe",
        "use", "where", "while", "async", "await", "dyn",
    ];
    let mut s: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if s.is_empty() {
        s = "_".to_string();
    }
    if s.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        s.insert(0, '_');
    }
    if KEYWORDS.contains(&s.as_str()) {
        format!("r#{s}")
    } else {
        s
    }
}

/// The Rust type for `schema`, without any `Option` wrapper.
///
/// Objects carrying an `x-ref-name` (left behind by ref expansion) map to
/// their generated type; anonymous objects fall back to
/// `serde_json::Value`.
pub fn rust_type(schema: &Value) -> String {
    if let Some(name) = schema.get("x-ref-name").and_then(|v| v.as_str()) {
        return to_camel_case(name);
    }
    match schema.get("type").and_then(|t| t.as_str()) {
        Some("integer") => "i64".to_string(),
        Some("number") => "f64".to_string(),
        Some("boolean") => "bool".to_string(),
        Some("string") => "String".to_string(),
        Some("array") => {
            let inner = schema
                .get("items")
                .map(rust_type)
                .unwrap_or_else(|| "serde_json::Value".to_string());
            format!("Vec<{inner}>")
        }
        // Anonymous objects and unions have no generated name to refer to.
        _ => "serde_json::Value".to_string(),
    }
}

/// True for generated (named) types, false for primitives and `Vec`s of
/// primitives.
pub fn is_named_type(ty: &str) -> bool {
    let primitives = ["String", "i32", "i64", "f32", "f64", "bool", "serde_json::Value"];
    let inner = ty
        .strip_prefix("Vec<")
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(ty);
    !primitives.contains(&inner) && matches!(inner.chars().next(), Some('A'..='Z'))
}

fn build_struct(name: &str, schema: &Value) -> TypeDefinition {
    let required: HashSet<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    let mut fields = Vec::new();
    if let Some(props) = schema.get("properties").and_then(|p| p.as_object()) {
        for (prop_name, prop_schema) in props {
            fields.push(FieldDef {
                name: sanitize_identifier(&to_snake_case(prop_name)),
                original_name: prop_name.clone(),
                ty: rust_type(prop_schema),
                optional: !required.contains(prop_name.as_str()),
            });
        }
    }

    TypeDefinition {
        name: to_camel_case(name),
        kind: TypeKind::Struct,
        fields,
        variants: Vec::new(),
    }
}

fn build_union(name: &str, schema: &Value, one_of: &[Value]) -> TypeDefinition {
    let tag = schema
        .get("discriminator")
        .and_then(|d| d.get("propertyName"))
        .and_then(|p| p.as_str())
        .map(str::to_string);

    // Invert the discriminator mapping so each variant can carry its wire
    // tag value.
    let mut tag_by_ref: BTreeMap<String, String> = BTreeMap::new();
    if let Some(mapping) = schema
        .get("discriminator")
        .and_then(|d| d.get("mapping"))
        .and_then(|m| m.as_object())
    {
        for (tag_value, ref_path) in mapping {
            if let Some(ref_name) = ref_path
                .as_str()
                .and_then(|p| p.strip_prefix("#/components/schemas/"))
            {
                tag_by_ref.insert(ref_name.to_string(), tag_value.clone());
            }
        }
    }

    let mut variants = Vec::new();
    for variant_schema in one_of {
        let ref_name = variant_schema
            .get("x-ref-name")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        if let Some(ref_name) = ref_name {
            let variant = to_camel_case(&ref_name);
            let rename = tag_by_ref.get(&ref_name).cloned().filter(|t| *t != variant);
            variants.push(VariantDef {
                name: variant.clone(),
                rename,
                inner: variant,
            });
        }
    }

    TypeDefinition {
        name: to_camel_case(name),
        kind: TypeKind::Union { tag },
        fields: Vec::new(),
        variants,
    }
}

/// Build type definitions for every named component schema.
///
/// Deterministic: iterates the (sorted) schema map and emits one type per
/// entry — structs for objects, enums for `oneOf` unions, aliases for
/// named primitives and arrays.
pub fn build_type_definitions(schemas: &BTreeMap<String, Value>) -> Vec<TypeDefinition> {
    let mut out = Vec::new();
    for (name, schema) in schemas {
        if let Some(one_of) = schema.get("oneOf").and_then(|v| v.as_array()) {
            out.push(build_union(name, schema, one_of));
        } else if schema.get("properties").is_some()
            || schema.get("type").and_then(|t| t.as_str()) == Some("object")
        {
            out.push(build_struct(name, schema));
        } else {
            out.push(TypeDefinition {
                name: to_camel_case(name),
                kind: TypeKind::Alias(rust_type(schema)),
                fields: Vec::new(),
                variants: Vec::new(),
            });
        }
    }
    out
}
