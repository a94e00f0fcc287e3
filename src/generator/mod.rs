//! Offline code generator: OpenAPI document in, compiling Rust artifacts
//! out — DTOs, parsers, validators, the route table, the handler
//! interface, dispatch stubs and the hash-based fast router.

mod project;
mod schema;
mod templates;

pub use project::generate_artifacts;
pub use schema::{
    build_type_definitions, is_named_type, rust_type, sanitize_identifier, to_camel_case,
    to_snake_case, FieldDef, TypeDefinition, TypeKind, VariantDef,
};
