//! Artifact generation: turns a loaded [`SpecDocument`] into the set of
//! Rust source files described by the generator contract.
//!
//! Output is deterministic — routes arrive ordered by path then method,
//! schemas come out of a sorted map, and every list below preserves those
//! orders — so regenerating from the same spec yields identical bytes.

use super::schema::{
    build_type_definitions, is_named_type, rust_type, sanitize_identifier, to_camel_case,
    to_snake_case, FieldDef, TypeDefinition, TypeKind,
};
use super::templates::{
    write_artifact, BodyEnumData, DispatchTemplate, FastArmData, FieldData, HandlerMethodData,
    HandlersTemplate, ModTemplate, ParserData, ParsersTemplate, RegistrationData, RouteData,
    RoutesTemplate, StubData, TypeData, TypesTemplate, ValidatorData, ValidatorsTemplate,
    VariantData,
};
use crate::spec::{BodyMedia, ParameterLocation, RouteMeta, SpecDocument};
use anyhow::Context;
use askama::Template;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// How a parameter value is parsed in a stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    Int,
    Num,
    Bool,
    Str,
}

impl ParamKind {
    fn from_schema_type(ty: &str) -> Self {
        match ty {
            "integer" => ParamKind::Int,
            "number" => ParamKind::Num,
            "boolean" => ParamKind::Bool,
            _ => ParamKind::Str,
        }
    }

    fn rust_type(self) -> &'static str {
        match self {
            ParamKind::Int => "i64",
            ParamKind::Num => "f64",
            ParamKind::Bool => "bool",
            ParamKind::Str => "&str",
        }
    }

    fn parse_fn(self) -> &'static str {
        match self {
            ParamKind::Int => "parse_i64",
            ParamKind::Num => "parse_f64",
            ParamKind::Bool => "parse_bool",
            ParamKind::Str => "",
        }
    }
}

#[derive(Debug, Clone)]
struct ParamPlan {
    rust_name: String,
    spec_name: String,
    location: ParameterLocation,
    required: bool,
    kind: ParamKind,
}

#[derive(Debug, Clone)]
struct BodyArm {
    parse_call: String,
    /// Enum variant wrapping this media's value, for multi-schema bodies.
    variant: Option<String>,
    /// `validate_*` function for the parsed type, when one exists.
    validate_fn: Option<String>,
}

#[derive(Debug, Clone)]
struct BodyPlan {
    /// Handler argument type.
    ty: String,
    /// Generated enum name when media types map to different schemas.
    enum_name: Option<String>,
    arms: Vec<BodyArm>,
    consumes_const: String,
}

struct OperationPlan {
    route: RouteMeta,
    method_name: String,
    stub_name: String,
    const_prefix: String,
    params: Vec<ParamPlan>,
    body: Option<BodyPlan>,
    produces_const: Option<String>,
}

/// Well-known header names map to `Field` constants instead of runtime
/// string lookups.
fn header_lookup_expr(name: &str) -> String {
    const KNOWN: [(&str, &str); 9] = [
        ("content-type", "Field::ContentType"),
        ("content-length", "Field::ContentLength"),
        ("transfer-encoding", "Field::TransferEncoding"),
        ("accept", "Field::Accept"),
        ("connection", "Field::Connection"),
        ("cookie", "Field::Cookie"),
        ("host", "Field::Host"),
        ("authorization", "Field::Authorization"),
        ("user-agent", "Field::UserAgent"),
    ];
    let lower = name.to_ascii_lowercase();
    for (known, constant) in KNOWN {
        if lower == known {
            return format!("req.headers.get({constant})");
        }
    }
    format!("req.headers.get_str({name:?})")
}

fn body_media_plan(
    media: &BodyMedia,
    validated: &HashSet<String>,
) -> (String, String, Option<String>) {
    if let Some(name) = media.schema_name.as_deref() {
        let ty = to_camel_case(name);
        let parse = format!("parse_{}(req.body)", to_snake_case(name));
        let validate = validated
            .contains(&ty)
            .then(|| format!("validate_{}", to_snake_case(name)));
        return (ty, parse, validate);
    }
    let ty = media
        .schema
        .as_ref()
        .map(rust_type)
        .unwrap_or_else(|| "serde_json::Value".to_string());
    // An inline schema can still resolve to a generated type when ref
    // expansion left an `x-ref-name` behind; treat it like a DTO.
    if is_named_type(&ty) && !ty.starts_with("Vec<") {
        let parse = format!("parse_{}(req.body)", to_snake_case(&ty));
        let validate = validated
            .contains(&ty)
            .then(|| format!("validate_{}", to_snake_case(&ty)));
        return (ty, parse, validate);
    }
    let parse = match ty.as_str() {
        "Vec<i64>" => "parse_i64_array(req.body)".to_string(),
        "Vec<f64>" => "parse_f64_array(req.body)".to_string(),
        "Vec<bool>" => "parse_bool_array(req.body)".to_string(),
        "Vec<String>" => "parse_string_array(req.body)".to_string(),
        _ => "parse_json_value(req.body)".to_string(),
    };
    let ty = if parse.starts_with("parse_json_value") {
        "serde_json::Value".to_string()
    } else {
        ty
    };
    (ty, parse, None)
}

fn plan_operations(doc: &SpecDocument, validated: &HashSet<String>) -> Vec<OperationPlan> {
    let mut seen = HashSet::new();
    let mut plans = Vec::new();

    for route in &doc.routes {
        let mut method_name = sanitize_identifier(&to_snake_case(&route.operation_id));
        if !seen.insert(method_name.clone()) {
            let mut counter = 1;
            loop {
                let candidate = format!("{method_name}_{counter}");
                if seen.insert(candidate.clone()) {
                    println!("⚠️  Duplicate operationId '{method_name}' → using '{candidate}'");
                    method_name = candidate;
                    break;
                }
                counter += 1;
            }
        }
        let const_prefix = method_name.to_uppercase();

        let mut params = Vec::new();
        for location in [
            ParameterLocation::Path,
            ParameterLocation::Query,
            ParameterLocation::Header,
            ParameterLocation::Cookie,
        ] {
            for p in route.params_at(location) {
                params.push(ParamPlan {
                    rust_name: sanitize_identifier(&to_snake_case(&p.name)),
                    spec_name: p.name.clone(),
                    location,
                    // Path parameters are always required.
                    required: p.required || location == ParameterLocation::Path,
                    kind: ParamKind::from_schema_type(p.schema_type()),
                });
            }
        }

        let body = if route.request_bodies.is_empty() {
            None
        } else {
            let consumes_const = format!("{const_prefix}_CONSUMES");
            let media_plans: Vec<(String, String, Option<String>)> = route
                .request_bodies
                .iter()
                .map(|media| body_media_plan(media, validated))
                .collect();

            let mut distinct: Vec<&str> = Vec::new();
            for (ty, _, _) in &media_plans {
                if !distinct.contains(&ty.as_str()) {
                    distinct.push(ty);
                }
            }

            if distinct.len() > 1 {
                // Different media types parse to different schemas: the
                // handler receives a sum type.
                let enum_name = format!("{}Body", to_camel_case(&method_name));
                let arms = media_plans
                    .iter()
                    .map(|(ty, parse, validate)| BodyArm {
                        parse_call: parse.clone(),
                        variant: Some(variant_name(ty)),
                        validate_fn: validate.clone(),
                    })
                    .collect();
                Some(BodyPlan {
                    ty: enum_name.clone(),
                    enum_name: Some(enum_name),
                    arms,
                    consumes_const,
                })
            } else {
                let arms = media_plans
                    .iter()
                    .map(|(_, parse, validate)| BodyArm {
                        parse_call: parse.clone(),
                        variant: None,
                        validate_fn: validate.clone(),
                    })
                    .collect();
                Some(BodyPlan {
                    ty: distinct[0].to_string(),
                    enum_name: None,
                    arms,
                    consumes_const,
                })
            }
        };

        plans.push(OperationPlan {
            stub_name: format!("dispatch_{method_name}"),
            produces_const: (!route.produces.is_empty())
                .then(|| format!("{const_prefix}_PRODUCES")),
            route: route.clone(),
            method_name,
            const_prefix,
            params,
            body,
        });
    }
    plans
}

/// Enum variant name for a body type (`Vec<f64>` → `F64Array`,
/// `serde_json::Value` → `Json`, named types keep their name).
fn variant_name(ty: &str) -> String {
    if is_named_type(ty) && !ty.starts_with("Vec<") {
        return ty.to_string();
    }
    match ty {
        "serde_json::Value" => "Json".to_string(),
        "Vec<i64>" => "I64Array".to_string(),
        "Vec<f64>" => "F64Array".to_string(),
        "Vec<bool>" => "BoolArray".to_string(),
        "Vec<String>" => "StringArray".to_string(),
        other => to_camel_case(other),
    }
}

fn slice_literal(items: &[String]) -> String {
    if items.is_empty() {
        "&[]".to_string()
    } else {
        let inner = items
            .iter()
            .map(|s| format!("{s:?}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("&[{inner}]")
    }
}

fn types_data(defs: &[TypeDefinition]) -> Vec<TypeData> {
    defs.iter()
        .map(|def| {
            let doc = format!("`{}` from the OpenAPI components.", def.name);
            match &def.kind {
                TypeKind::Alias(ty) => TypeData {
                    name: def.name.clone(),
                    doc,
                    is_struct: false,
                    is_union: false,
                    is_alias: true,
                    alias_ty: ty.clone(),
                    tag_attr: String::new(),
                    fields: Vec::new(),
                    variants: Vec::new(),
                },
                TypeKind::Struct => TypeData {
                    name: def.name.clone(),
                    doc,
                    is_struct: true,
                    is_union: false,
                    is_alias: false,
                    alias_ty: String::new(),
                    tag_attr: String::new(),
                    fields: def.fields.iter().map(field_data).collect(),
                    variants: Vec::new(),
                },
                TypeKind::Union { tag } => TypeData {
                    name: def.name.clone(),
                    doc,
                    is_struct: false,
                    is_union: true,
                    is_alias: false,
                    alias_ty: String::new(),
                    tag_attr: match tag {
                        Some(tag) => format!("#[serde(tag = {tag:?})]"),
                        None => "#[serde(untagged)]".to_string(),
                    },
                    fields: Vec::new(),
                    variants: def
                        .variants
                        .iter()
                        .map(|v| VariantData {
                            attrs: v
                                .rename
                                .as_ref()
                                .map(|r| vec![format!("#[serde(rename = {r:?})]")])
                                .unwrap_or_default(),
                            decl: format!("{}({}),", v.name, v.inner),
                        })
                        .collect(),
                },
            }
        })
        .collect()
}

fn field_data(field: &FieldDef) -> FieldData {
    let mut attrs = Vec::new();
    let plain_name = field.name.trim_start_matches("r#");
    if field.original_name != plain_name {
        attrs.push(format!("#[serde(rename = {:?})]", field.original_name));
    }
    if field.optional {
        attrs.push("#[serde(skip_serializing_if = \"Option::is_none\")]".to_string());
        FieldData {
            attrs,
            decl: format!("pub {}: Option<{}>,", field.name, field.ty),
        }
    } else {
        FieldData {
            attrs,
            decl: format!("pub {}: {},", field.name, field.ty),
        }
    }
}

fn parsers_data(defs: &[TypeDefinition]) -> Vec<ParserData> {
    let mut parsers = vec![
        ParserData {
            doc: "Parse an arbitrary JSON body.".to_string(),
            fn_name: "parse_json_value".to_string(),
            ty: "serde_json::Value".to_string(),
        },
        ParserData {
            doc: "Parse a JSON array of integers.".to_string(),
            fn_name: "parse_i64_array".to_string(),
            ty: "Vec<i64>".to_string(),
        },
        ParserData {
            doc: "Parse a JSON array of numbers.".to_string(),
            fn_name: "parse_f64_array".to_string(),
            ty: "Vec<f64>".to_string(),
        },
        ParserData {
            doc: "Parse a JSON array of booleans.".to_string(),
            fn_name: "parse_bool_array".to_string(),
            ty: "Vec<bool>".to_string(),
        },
        ParserData {
            doc: "Parse a JSON array of strings.".to_string(),
            fn_name: "parse_string_array".to_string(),
            ty: "Vec<String>".to_string(),
        },
    ];
    for def in defs {
        parsers.push(ParserData {
            doc: format!("Parse a `{}` request body.", def.name),
            fn_name: format!("parse_{}", to_snake_case(&def.name)),
            ty: def.name.clone(),
        });
    }
    parsers
}

fn number_literal(value: &Value, as_float: bool) -> Option<String> {
    let num = value.as_f64()?;
    if as_float {
        Some(format!("{num:?}"))
    } else {
        Some(format!("{}", num as i64))
    }
}

/// Build the check lines for one struct field. Returns the lines with
/// their final indentation; regex statics accumulate into `statics`.
fn field_check_lines(
    type_name: &str,
    field: &FieldDef,
    prop: &Value,
    statics: &mut Vec<String>,
) -> Vec<String> {
    let mut checks = Vec::new();
    let original = &field.original_name;
    let bind = field.name.trim_start_matches("r#").to_string();
    let access = if field.optional {
        bind.clone()
    } else {
        format!("value.{}", field.name)
    };

    match field.ty.as_str() {
        "i64" | "f64" => {
            let as_float = field.ty == "f64";
            if let Some(min) = prop.get("minimum").and_then(|v| number_literal(v, as_float)) {
                checks.push(format!("if {access} < {min} {{"));
                checks.push(format!(
                    "    return Some(ValidationError::new({original:?}, \"must be >= {min}\"));"
                ));
                checks.push("}".to_string());
            }
            if let Some(max) = prop.get("maximum").and_then(|v| number_literal(v, as_float)) {
                checks.push(format!("if {access} > {max} {{"));
                checks.push(format!(
                    "    return Some(ValidationError::new({original:?}, \"must be <= {max}\"));"
                ));
                checks.push("}".to_string());
            }
        }
        "String" => {
            if let Some(min) = prop.get("minLength").and_then(|v| v.as_u64()) {
                checks.push(format!("if {access}.chars().count() < {min} {{"));
                checks.push(format!(
                    "    return Some(ValidationError::new({original:?}, \"length must be >= {min}\"));"
                ));
                checks.push("}".to_string());
            }
            if let Some(max) = prop.get("maxLength").and_then(|v| v.as_u64()) {
                checks.push(format!("if {access}.chars().count() > {max} {{"));
                checks.push(format!(
                    "    return Some(ValidationError::new({original:?}, \"length must be <= {max}\"));"
                ));
                checks.push("}".to_string());
            }
            if let Some(pattern) = prop.get("pattern").and_then(|v| v.as_str()) {
                let static_name = format!(
                    "PATTERN_{}_{}",
                    to_snake_case(type_name).to_uppercase(),
                    bind.to_uppercase()
                );
                statics.push(format!(
                    "static {static_name}: Lazy<Regex> =\n    Lazy::new(|| Regex::new({pattern:?}).expect(\"invalid pattern in spec\"));"
                ));
                checks.push(format!("if !{static_name}.is_match({access}.as_str()) {{"));
                checks.push(format!(
                    "    return Some(ValidationError::new({original:?}, \"does not match {}\"));",
                    pattern.replace('"', "'")
                ));
                checks.push("}".to_string());
            }
            if let Some(allowed) = prop.get("enum").and_then(|v| v.as_array()) {
                let values: Vec<&str> = allowed.iter().filter_map(|v| v.as_str()).collect();
                if !values.is_empty() {
                    let list = values
                        .iter()
                        .map(|v| format!("{v:?}"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    checks.push(format!("if ![{list}].contains(&{access}.as_str()) {{"));
                    checks.push(format!(
                        "    return Some(ValidationError::new({original:?}, \"must be one of: {}\"));",
                        values.join(", ")
                    ));
                    checks.push("}".to_string());
                }
            }
        }
        ty if ty.starts_with("Vec<") => {
            if let Some(min) = prop.get("minItems").and_then(|v| v.as_u64()) {
                checks.push(format!("if {access}.len() < {min} {{"));
                checks.push(format!(
                    "    return Some(ValidationError::new({original:?}, \"must have >= {min} items\"));"
                ));
                checks.push("}".to_string());
            }
            if let Some(max) = prop.get("maxItems").and_then(|v| v.as_u64()) {
                checks.push(format!("if {access}.len() > {max} {{"));
                checks.push(format!(
                    "    return Some(ValidationError::new({original:?}, \"must have <= {max} items\"));"
                ));
                checks.push("}".to_string());
            }
        }
        _ => {}
    }

    if checks.is_empty() {
        return checks;
    }

    let mut lines = Vec::new();
    if field.optional {
        let by_ref = matches!(field.ty.as_str(), "i64" | "f64" | "bool")
            .then_some("")
            .unwrap_or("ref ");
        lines.push(format!("    if let Some({by_ref}{bind}) = value.{} {{", field.name));
        for check in checks {
            lines.push(format!("        {check}"));
        }
        lines.push("    }".to_string());
    } else {
        for check in checks {
            lines.push(format!("    {check}"));
        }
    }
    lines
}

fn validators_data(
    schemas: &BTreeMap<String, Value>,
    defs: &[TypeDefinition],
) -> (Vec<String>, Vec<ValidatorData>, HashSet<String>) {
    let mut statics = Vec::new();
    let mut validators = Vec::new();
    let mut validated = HashSet::new();

    // Structs first: unions depend on which payload types got validators.
    for def in defs {
        if !matches!(def.kind, TypeKind::Struct) {
            continue;
        }
        let schema = schemas
            .iter()
            .find(|(name, _)| to_camel_case(name) == def.name)
            .map(|(_, schema)| schema);
        let props = schema
            .and_then(|s| s.get("properties"))
            .and_then(|p| p.as_object());
        let mut checks = Vec::new();
        if let Some(props) = props {
            for field in &def.fields {
                if let Some(prop) = props.get(&field.original_name) {
                    checks.extend(field_check_lines(&def.name, field, prop, &mut statics));
                }
            }
        }
        if !checks.is_empty() {
            validated.insert(def.name.clone());
            validators.push(ValidatorData {
                doc: format!("Validate a `{}` against its schema constraints.", def.name),
                fn_name: format!("validate_{}", to_snake_case(&def.name)),
                ty: def.name.clone(),
                checks,
            });
        }
    }

    for def in defs {
        if !matches!(def.kind, TypeKind::Union { .. }) {
            continue;
        }
        if !def.variants.iter().any(|v| validated.contains(&v.inner)) {
            continue;
        }
        let mut checks = Vec::new();
        for variant in &def.variants {
            if validated.contains(&variant.inner) {
                checks.push(format!(
                    "    if let {}::{}(inner) = value {{",
                    def.name, variant.name
                ));
                checks.push(format!(
                    "        if let Some(err) = validate_{}(inner) {{",
                    to_snake_case(&variant.inner)
                ));
                checks.push("            return Some(err);".to_string());
                checks.push("        }".to_string());
                checks.push("    }".to_string());
            }
        }
        validated.insert(def.name.clone());
        validators.push(ValidatorData {
            doc: format!("Validate a `{}` by its active variant.", def.name),
            fn_name: format!("validate_{}", to_snake_case(&def.name)),
            ty: def.name.clone(),
            checks,
        });
    }

    (statics, validators, validated)
}

fn param_source_expr(param: &ParamPlan) -> String {
    match param.location {
        ParameterLocation::Path => format!("ctx.param({:?})", param.spec_name),
        ParameterLocation::Query => format!("query_param(req.target, {:?})", param.spec_name),
        ParameterLocation::Header => header_lookup_expr(&param.spec_name),
        ParameterLocation::Cookie => format!(
            "cookie_param(req.headers.get(Field::Cookie), {:?})",
            param.spec_name
        ),
    }
}

fn param_binding_lines(param: &ParamPlan) -> Vec<String> {
    let name = &param.rust_name;
    let spec = &param.spec_name;
    let source = param_source_expr(param);
    let mut lines = Vec::new();

    let invalid = if param.location == ParameterLocation::Path {
        format!("invalid path param {spec}")
    } else {
        format!("invalid param {spec}")
    };
    let missing = if param.location == ParameterLocation::Path {
        format!("missing path param {spec}")
    } else {
        format!("missing param {spec}")
    };

    match (param.kind, param.required) {
        (ParamKind::Str, true) => {
            lines.push(format!("    let {name} = match {source} {{"));
            lines.push("        Some(v) => v,".to_string());
            lines.push("        None => {".to_string());
            lines.push(format!(
                "            return Response::error(ProblemDetails::bad_request({missing:?}));"
            ));
            lines.push("        }".to_string());
            lines.push("    };".to_string());
        }
        (ParamKind::Str, false) => {
            lines.push(format!("    let {name} = {source};"));
        }
        (kind, true) => {
            let parse = kind.parse_fn();
            lines.push(format!(
                "    let {name} = match {source}.and_then({parse}) {{"
            ));
            lines.push("        Some(v) => v,".to_string());
            lines.push("        None => {".to_string());
            lines.push(format!(
                "            return Response::error(ProblemDetails::bad_request({invalid:?}));"
            ));
            lines.push("        }".to_string());
            lines.push("    };".to_string());
        }
        (kind, false) => {
            let parse = kind.parse_fn();
            lines.push(format!("    let {name} = match {source} {{"));
            lines.push(format!("        Some(raw) => match {parse}(raw) {{"));
            lines.push("            Some(v) => Some(v),".to_string());
            lines.push("            None => {".to_string());
            lines.push(format!(
                "                return Response::error(ProblemDetails::bad_request({invalid:?}));"
            ));
            lines.push("            }".to_string());
            lines.push("        },".to_string());
            lines.push("        None => None,".to_string());
            lines.push("    };".to_string());
        }
    }
    lines
}

fn stub_lines(plan: &OperationPlan) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(produces_const) = &plan.produces_const {
        lines.push(format!(
            "    let negotiated = match negotiate({produces_const}, req.headers.get(Field::Accept)) {{"
        ));
        lines.push("        Some(ct) => ct,".to_string());
        lines.push("        None => {".to_string());
        lines.push(
            "            return Response::error(ProblemDetails::not_acceptable(\"unsupported Accept header\"));"
                .to_string(),
        );
        lines.push("        }".to_string());
        lines.push("    };".to_string());
    }

    for param in &plan.params {
        lines.extend(param_binding_lines(param));
    }

    if let Some(body) = &plan.body {
        let consumes_const = &body.consumes_const;
        lines.push(format!(
            "    let matched_ct = match match_content_type(req.headers.get(Field::ContentType), {consumes_const}) {{"
        ));
        lines.push("        Some(idx) => idx,".to_string());
        lines.push("        None => {".to_string());
        lines.push(
            "            return Response::error(ProblemDetails::unsupported_media_type(\"unsupported Content-Type\"));"
                .to_string(),
        );
        lines.push("        }".to_string());
        lines.push("    };".to_string());

        lines.push("    let body = match matched_ct {".to_string());
        for (idx, arm) in body.arms.iter().enumerate() {
            let parse = &arm.parse_call;
            let wrap = |expr: String| match (&body.enum_name, &arm.variant) {
                (Some(enum_name), Some(variant)) => format!("{enum_name}::{variant}({expr})"),
                _ => expr,
            };
            lines.push(format!("        {idx} => {}", wrap(format!("match {parse} {{"))));
            lines.push("            Some(v) => v,".to_string());
            lines.push("            None => {".to_string());
            lines.push(
                "                return Response::error(ProblemDetails::bad_request(\"invalid request body\"));"
                    .to_string(),
            );
            lines.push("            }".to_string());
            if body.enum_name.is_some() {
                lines.push("        }),".to_string());
            } else {
                lines.push("        },".to_string());
            }
        }
        lines.push("        _ => {".to_string());
        lines.push(
            "            return Response::error(ProblemDetails::unsupported_media_type(\"unsupported Content-Type\"));"
                .to_string(),
        );
        lines.push("        }".to_string());
        lines.push("    };".to_string());

        // Validation.
        if let Some(enum_name) = &body.enum_name {
            if body.arms.iter().any(|arm| arm.validate_fn.is_some()) {
                lines.push("    match &body {".to_string());
                for arm in &body.arms {
                    let variant = arm.variant.as_deref().unwrap_or("Json");
                    match &arm.validate_fn {
                        Some(validate) => {
                            lines.push(format!("        {enum_name}::{variant}(inner) => {{"));
                            lines.push(format!(
                                "            if let Some(err) = {validate}(inner) {{"
                            ));
                            lines.push("                return validation_problem(&err);".to_string());
                            lines.push("            }".to_string());
                            lines.push("        }".to_string());
                        }
                        None => {
                            lines.push(format!("        {enum_name}::{variant}(_) => {{}}"));
                        }
                    }
                }
                lines.push("    }".to_string());
            }
        } else if let Some(validate) = body.arms.first().and_then(|a| a.validate_fn.as_ref()) {
            lines.push(format!("    if let Some(err) = {validate}(&body) {{"));
            lines.push("        return validation_problem(&err);".to_string());
            lines.push("    }".to_string());
        }
    }

    // Handler call inside the context scope; the guard pops the
    // thread-local on every exit path.
    let mut args: Vec<String> = plan.params.iter().map(|p| p.rust_name.clone()).collect();
    if plan.body.is_some() {
        args.push("body".to_string());
    }
    lines.push("    let scope = ContextScope::enter(req, &*ctx);".to_string());
    lines.push(format!(
        "    let mut resp = handler.{}({});",
        plan.method_name,
        args.join(", ")
    ));
    lines.push("    drop(scope);".to_string());

    if plan.produces_const.is_some() {
        lines.push("    if resp.header(\"Content-Type\").is_none() {".to_string());
        lines.push("        resp.set_header(\"Content-Type\", negotiated);".to_string());
        lines.push("    }".to_string());
    }
    lines.push("    resp".to_string());
    lines
}

fn handler_method_data(plan: &OperationPlan) -> HandlerMethodData {
    let mut docs = Vec::new();
    docs.push(format!(
        "/// {} {}",
        plan.route.method, plan.route.path_pattern
    ));
    if let Some(summary) = &plan.route.summary {
        docs.push("///".to_string());
        docs.push(format!("/// {summary}"));
    }
    let ext = &plan.route.extensions;
    if !ext.is_empty() {
        docs.push("///".to_string());
        if let Some(cache) = &ext.cache {
            docs.push(format!("/// @cache: {cache}"));
        }
        if let Some(alloc) = &ext.alloc {
            docs.push(format!("/// @alloc: {alloc}"));
        }
        if let Some(rate_limit) = &ext.rate_limit {
            docs.push(format!("/// @rate-limit: {rate_limit}"));
        }
    }

    let mut args: Vec<String> = Vec::new();
    for param in &plan.params {
        let base = param.kind.rust_type();
        let ty = if param.required {
            base.to_string()
        } else {
            format!("Option<{base}>")
        };
        args.push(format!("{}: {}", param.rust_name, ty));
    }
    if let Some(body) = &plan.body {
        args.push(format!("body: {}", body.ty));
    }

    let arg_list = if args.is_empty() {
        String::new()
    } else {
        format!(", {}", args.join(", "))
    };
    HandlerMethodData {
        docs,
        signature: format!("fn {}(&self{arg_list}) -> Response;", plan.method_name),
    }
}

fn registration_lines(plan: &OperationPlan) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push("    {".to_string());
    lines.push("        let handler = handler.clone();".to_string());
    lines.push("        routes.push(".to_string());
    lines.push("            RouteEntry::new(".to_string());
    lines.push(format!("                Method::{},", plan.route.method.as_str()));
    lines.push(format!("                {:?},", plan.route.path_pattern));
    lines.push(format!(
        "                handler_fn(move |req, ctx| {}(req, ctx, handler.as_ref())),",
        plan.stub_name
    ));
    lines.push("            )".to_string());
    if let Some(body) = &plan.body {
        lines.push(format!(
            "            .with_consumes({}.iter().map(|s| s.to_string()).collect())",
            body.consumes_const
        ));
    }
    if let Some(produces_const) = &plan.produces_const {
        lines.push(format!(
            "            .with_produces({produces_const}.iter().map(|s| s.to_string()).collect())"
        ));
    }
    lines.push("        );".to_string());
    lines.push("    }".to_string());
    lines
}

/// Generate all artifacts for `doc` into `out_dir`.
///
/// Existing files are left alone unless `force` is set.
pub fn generate_artifacts(doc: &SpecDocument, out_dir: &Path, force: bool) -> anyhow::Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let defs = build_type_definitions(&doc.schemas);
    let (statics, validators, validated) = validators_data(&doc.schemas, &defs);
    let plans = plan_operations(doc, &validated);

    write_artifact(
        out_dir,
        "types.rs",
        TypesTemplate {
            title: doc.title.clone(),
            types: types_data(&defs),
        }
        .render(),
        force,
    )?;

    write_artifact(
        out_dir,
        "parsers.rs",
        ParsersTemplate {
            title: doc.title.clone(),
            parsers: parsers_data(&defs),
        }
        .render(),
        force,
    )?;

    write_artifact(
        out_dir,
        "validators.rs",
        ValidatorsTemplate {
            title: doc.title.clone(),
            statics,
            validators,
        }
        .render(),
        force,
    )?;

    write_artifact(
        out_dir,
        "routes.rs",
        RoutesTemplate {
            title: doc.title.clone(),
            routes: doc
                .routes
                .iter()
                .map(|route| RouteData {
                    path: route.path_pattern.clone(),
                    method: route.method.to_string(),
                    operation_id: route.operation_id.clone(),
                    consumes: slice_literal(&route.consumes()),
                    produces: slice_literal(&route.produces),
                })
                .collect(),
        }
        .render(),
        force,
    )?;

    let body_enums: Vec<BodyEnumData> = plans
        .iter()
        .filter_map(|plan| {
            let body = plan.body.as_ref()?;
            let enum_name = body.enum_name.clone()?;
            let mut variants = Vec::new();
            for (arm, media) in body.arms.iter().zip(plan.route.request_bodies.iter()) {
                let variant = arm.variant.clone().unwrap_or_else(|| "Json".to_string());
                let ty = media
                    .schema_name
                    .as_deref()
                    .map(to_camel_case)
                    .unwrap_or_else(|| {
                        media
                            .schema
                            .as_ref()
                            .map(rust_type)
                            .unwrap_or_else(|| "serde_json::Value".to_string())
                    });
                let decl = format!("{variant}({ty}),");
                if !variants.contains(&decl) {
                    variants.push(decl);
                }
            }
            Some(BodyEnumData {
                doc: format!(
                    "Request body for `{}`, keyed by the matched media type.",
                    plan.method_name
                ),
                name: enum_name,
                variants,
            })
        })
        .collect();

    write_artifact(
        out_dir,
        "handlers.rs",
        HandlersTemplate {
            title: doc.title.clone(),
            body_enums,
            methods: plans.iter().map(handler_method_data).collect(),
        }
        .render(),
        force,
    )?;

    let mut consts = Vec::new();
    for plan in &plans {
        if let Some(produces_const) = &plan.produces_const {
            consts.push(format!(
                "/// Media types `{}` can produce.\npub const {produces_const}: &[&str] = {};",
                plan.method_name,
                slice_literal(&plan.route.produces)
            ));
        }
        if let Some(body) = &plan.body {
            consts.push(format!(
                "/// Media types `{}` accepts.\npub const {}: &[&str] = {};",
                plan.method_name,
                body.consumes_const,
                slice_literal(&plan.route.consumes())
            ));
        }
    }

    let mut hash_consts = Vec::new();
    let mut fast_arms = Vec::new();
    for plan in &plans {
        if !plan.route.is_static_path() {
            continue;
        }
        let hash_name = format!("HASH_{}", plan.const_prefix);
        hash_consts.push(format!(
            "/// FNV-1a hash of `{}`.\npub const {hash_name}: u64 = fnv1a_hash({:?});",
            plan.route.path_pattern, plan.route.path_pattern
        ));
        fast_arms.push(FastArmData {
            lines: vec![
                format!(
                    "            {hash_name} if path == {:?} && req.method == Method::{} => {{",
                    plan.route.path_pattern,
                    plan.route.method.as_str()
                ),
                format!(
                    "                return {}(req, ctx, self.handler.as_ref());",
                    plan.stub_name
                ),
                "            }".to_string(),
            ],
        });
    }

    write_artifact(
        out_dir,
        "dispatch.rs",
        DispatchTemplate {
            title: doc.title.clone(),
            consts,
            stubs: plans
                .iter()
                .map(|plan| StubData {
                    doc: format!("{} {}", plan.route.method, plan.route.path_pattern),
                    fn_name: plan.stub_name.clone(),
                    lines: stub_lines(plan),
                })
                .collect(),
            registrations: plans
                .iter()
                .map(|plan| RegistrationData {
                    lines: registration_lines(plan),
                })
                .collect(),
            hash_consts,
            fast_arms,
        }
        .render(),
        force,
    )?;

    write_artifact(
        out_dir,
        "mod.rs",
        ModTemplate {
            title: doc.title.clone(),
        }
        .render(),
        force,
    )?;

    Ok(())
}
