//! OpenAPI-driven HTTP/1.1 serving framework.
//!
//! The request-handling layer is *generated*: `katana generate` consumes an
//! OpenAPI 3.x document and emits typed DTOs, parsers, validators, a route
//! table, an abstract handler trait and per-operation dispatch stubs. At
//! runtime the server drives those artifacts with a reactor-per-core
//! edge-triggered event loop, arena-scoped request memory and a
//! non-blocking incremental HTTP/1.1 parser.

pub mod arena;
pub mod cli;
pub mod dispatch;
pub mod echo;
pub mod generator;
pub mod http;
pub mod middleware;
pub mod net;
pub mod ring;
pub mod router;
pub mod server;
pub mod shutdown;
pub mod spec;

pub use spec::{
    load_spec, load_spec_from_str, ParameterLocation, ParameterMeta, RouteMeta, SpecDocument,
};
