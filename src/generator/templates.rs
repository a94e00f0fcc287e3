//! Askama templates for the generated artifacts.
//!
//! The templates stay close to plain substitution: everything conditional
//! per operation (parameter bindings, body parsing, validation arms) is
//! precomputed as source lines by [`super::project`] and rendered with
//! simple loops.

use askama::Template;
use anyhow::Context;
use std::fs;
use std::path::Path;

/// A DTO ready for rendering.
pub struct TypeData {
    /// Rust type name.
    pub name: String,
    /// Doc line for the item.
    pub doc: String,
    /// Exactly one of the three shape flags is set.
    pub is_struct: bool,
    pub is_union: bool,
    pub is_alias: bool,
    /// Aliased type when `is_alias`.
    pub alias_ty: String,
    /// Serde tagging attribute when `is_union`.
    pub tag_attr: String,
    /// Struct fields when `is_struct`.
    pub fields: Vec<FieldData>,
    /// Enum variants when `is_union`.
    pub variants: Vec<VariantData>,
}

/// One struct field: its attributes and declaration line.
pub struct FieldData {
    pub attrs: Vec<String>,
    pub decl: String,
}

/// One enum variant: its attributes and declaration line.
pub struct VariantData {
    pub attrs: Vec<String>,
    pub decl: String,
}

/// `types.rs`: one typed struct per named schema.
#[derive(Template)]
#[template(path = "types.rs.txt", escape = "none")]
pub struct TypesTemplate {
    pub title: String,
    pub types: Vec<TypeData>,
}

/// One generated parse function.
pub struct ParserData {
    pub doc: String,
    pub fn_name: String,
    pub ty: String,
}

/// `parsers.rs`: `parse_T` per DTO and per array-of-primitive leaf.
#[derive(Template)]
#[template(path = "parsers.rs.txt", escape = "none")]
pub struct ParsersTemplate {
    pub title: String,
    pub parsers: Vec<ParserData>,
}

/// One generated validator: its checks are prerendered lines.
pub struct ValidatorData {
    pub doc: String,
    pub fn_name: String,
    pub ty: String,
    pub checks: Vec<String>,
}

/// `validators.rs`: `validate_T` per DTO with schema constraints.
#[derive(Template)]
#[template(path = "validators.rs.txt", escape = "none")]
pub struct ValidatorsTemplate {
    pub title: String,
    /// `static PATTERN_...: Lazy<Regex>` items.
    pub statics: Vec<String>,
    pub validators: Vec<ValidatorData>,
}

/// One route-table row, list fields prerendered as slice literals.
pub struct RouteData {
    pub path: String,
    pub method: String,
    pub operation_id: String,
    pub consumes: String,
    pub produces: String,
}

/// `routes.rs`: the static route table.
#[derive(Template)]
#[template(path = "routes.rs.txt", escape = "none")]
pub struct RoutesTemplate {
    pub title: String,
    pub routes: Vec<RouteData>,
}

/// A per-operation body enum (multiple media types with distinct schemas).
pub struct BodyEnumData {
    pub doc: String,
    pub name: String,
    /// Variant declaration lines.
    pub variants: Vec<String>,
}

/// One handler-trait method.
pub struct HandlerMethodData {
    /// Doc-comment lines (`/// ...`), including `x-katana-*` metadata.
    pub docs: Vec<String>,
    /// Full signature line ending in `;`.
    pub signature: String,
}

/// `handlers.rs`: the abstract handler interface.
#[derive(Template)]
#[template(path = "handlers.rs.txt", escape = "none")]
pub struct HandlersTemplate {
    pub title: String,
    pub body_enums: Vec<BodyEnumData>,
    pub methods: Vec<HandlerMethodData>,
}

/// One dispatch stub; its body is prerendered lines.
pub struct StubData {
    pub doc: String,
    pub fn_name: String,
    pub lines: Vec<String>,
}

/// One `make_router` registration block.
pub struct RegistrationData {
    pub lines: Vec<String>,
}

/// One fast-router match arm.
pub struct FastArmData {
    pub lines: Vec<String>,
}

/// `dispatch.rs`: stubs, router factory and the hash fast path.
#[derive(Template)]
#[template(path = "dispatch.rs.txt", escape = "none")]
pub struct DispatchTemplate {
    pub title: String,
    /// `pub const *_PRODUCES/_CONSUMES` lines.
    pub consts: Vec<String>,
    pub stubs: Vec<StubData>,
    pub registrations: Vec<RegistrationData>,
    pub hash_consts: Vec<String>,
    pub fast_arms: Vec<FastArmData>,
}

/// `mod.rs`: module declarations for the generated tree.
#[derive(Template)]
#[template(path = "mod.rs.txt", escape = "none")]
pub struct ModTemplate {
    pub title: String,
}

/// Render a template into `dir/name`, honoring `force` for existing files.
pub fn write_artifact(
    dir: &Path,
    name: &str,
    rendered: askama::Result<String>,
    force: bool,
) -> anyhow::Result<()> {
    let path = dir.join(name);
    if path.exists() && !force {
        println!("⚠️  Skipping existing file: {path:?}");
        return Ok(());
    }
    let rendered = rendered.with_context(|| format!("failed to render {name}"))?;
    fs::write(&path, rendered).with_context(|| format!("failed to write {}", path.display()))?;
    println!("✅ Generated {path:?}");
    Ok(())
}
