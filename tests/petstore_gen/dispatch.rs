// Generated by `katana generate` from "Pet Store". Do not edit by hand.
//
// One dispatch stub per operation, executing in fixed order: content
// negotiation, path parameters, query/header/cookie parameters, body
// media match + parse, validation, handler call, Content-Type
// post-processing. Any failing step returns its problem response
// immediately.

#![allow(dead_code, unused_imports, unused_variables, unused_mut)]

use std::sync::Arc;

use http::Method;
use katana::dispatch::{
    cookie_param, fnv1a_hash, match_content_type, negotiate, parse_bool, parse_f64, parse_i64,
    query_param, validation_problem,
};
use katana::http::context::ContextScope;
use katana::http::{Field, ProblemDetails, Request, RequestContext, Response};
use katana::router::{handler_fn, RouteEntry, Router};

use super::handlers::*;
use super::parsers::*;
use super::types::*;
use super::validators::*;

/// Media types `list_pets` can produce.
pub const LIST_PETS_PRODUCES: &[&str] = &["application/json"];

/// Media types `create_pet` can produce.
pub const CREATE_PET_PRODUCES: &[&str] = &["application/json"];

/// Media types `create_pet` accepts.
pub const CREATE_PET_CONSUMES: &[&str] = &["application/json"];

/// Media types `get_pet` can produce.
pub const GET_PET_PRODUCES: &[&str] = &["application/json"];

/// GET /pets
pub fn dispatch_list_pets(
    req: &Request<'_>,
    ctx: &mut RequestContext<'_>,
    handler: &dyn ApiHandler,
) -> Response {
    let negotiated = match negotiate(LIST_PETS_PRODUCES, req.headers.get(Field::Accept)) {
        Some(ct) => ct,
        None => {
            return Response::error(ProblemDetails::not_acceptable("unsupported Accept header"));
        }
    };
    let limit = match query_param(req.target, "limit") {
        Some(raw) => match parse_i64(raw) {
            Some(v) => Some(v),
            None => {
                return Response::error(ProblemDetails::bad_request("invalid param limit"));
            }
        },
        None => None,
    };
    let scope = ContextScope::enter(req, &*ctx);
    let mut resp = handler.list_pets(limit);
    drop(scope);
    if resp.header("Content-Type").is_none() {
        resp.set_header("Content-Type", negotiated);
    }
    resp
}

/// POST /pets
pub fn dispatch_create_pet(
    req: &Request<'_>,
    ctx: &mut RequestContext<'_>,
    handler: &dyn ApiHandler,
) -> Response {
    let negotiated = match negotiate(CREATE_PET_PRODUCES, req.headers.get(Field::Accept)) {
        Some(ct) => ct,
        None => {
            return Response::error(ProblemDetails::not_acceptable("unsupported Accept header"));
        }
    };
    let matched_ct = match match_content_type(req.headers.get(Field::ContentType), CREATE_PET_CONSUMES) {
        Some(idx) => idx,
        None => {
            return Response::error(ProblemDetails::unsupported_media_type("unsupported Content-Type"));
        }
    };
    let body = match matched_ct {
        0 => match parse_pet(req.body) {
            Some(v) => v,
            None => {
                return Response::error(ProblemDetails::bad_request("invalid request body"));
            }
        },
        _ => {
            return Response::error(ProblemDetails::unsupported_media_type("unsupported Content-Type"));
        }
    };
    if let Some(err) = validate_pet(&body) {
        return validation_problem(&err);
    }
    let scope = ContextScope::enter(req, &*ctx);
    let mut resp = handler.create_pet(body);
    drop(scope);
    if resp.header("Content-Type").is_none() {
        resp.set_header("Content-Type", negotiated);
    }
    resp
}

/// GET /pets/{petId}
pub fn dispatch_get_pet(
    req: &Request<'_>,
    ctx: &mut RequestContext<'_>,
    handler: &dyn ApiHandler,
) -> Response {
    let negotiated = match negotiate(GET_PET_PRODUCES, req.headers.get(Field::Accept)) {
        Some(ct) => ct,
        None => {
            return Response::error(ProblemDetails::not_acceptable("unsupported Accept header"));
        }
    };
    let pet_id = match ctx.param("petId").and_then(parse_i64) {
        Some(v) => v,
        None => {
            return Response::error(ProblemDetails::bad_request("invalid path param petId"));
        }
    };
    let x_trace = req.headers.get_str("X-Trace");
    let session = cookie_param(req.headers.get(Field::Cookie), "session");
    let scope = ContextScope::enter(req, &*ctx);
    let mut resp = handler.get_pet(pet_id, x_trace, session);
    drop(scope);
    if resp.header("Content-Type").is_none() {
        resp.set_header("Content-Type", negotiated);
    }
    resp
}

/// Build the general router over `handler`.
pub fn make_router(handler: Arc<dyn ApiHandler>) -> Router {
    let mut routes = Vec::new();
    {
        let handler = handler.clone();
        routes.push(
            RouteEntry::new(
                Method::GET,
                "/pets",
                handler_fn(move |req, ctx| dispatch_list_pets(req, ctx, handler.as_ref())),
            )
            .with_produces(LIST_PETS_PRODUCES.iter().map(|s| s.to_string()).collect())
        );
    }
    {
        let handler = handler.clone();
        routes.push(
            RouteEntry::new(
                Method::POST,
                "/pets",
                handler_fn(move |req, ctx| dispatch_create_pet(req, ctx, handler.as_ref())),
            )
            .with_consumes(CREATE_PET_CONSUMES.iter().map(|s| s.to_string()).collect())
            .with_produces(CREATE_PET_PRODUCES.iter().map(|s| s.to_string()).collect())
        );
    }
    {
        let handler = handler.clone();
        routes.push(
            RouteEntry::new(
                Method::GET,
                "/pets/{petId}",
                handler_fn(move |req, ctx| dispatch_get_pet(req, ctx, handler.as_ref())),
            )
            .with_produces(GET_PET_PRODUCES.iter().map(|s| s.to_string()).collect())
        );
    }
    Router::new(routes)
}

/// FNV-1a hash of `/pets`.
pub const HASH_LIST_PETS: u64 = fnv1a_hash("/pets");

/// FNV-1a hash of `/pets`.
pub const HASH_CREATE_PET: u64 = fnv1a_hash("/pets");

/// Hash-switch front end for parameter-free routes.
///
/// FNV-1a over the query-stripped path selects a precomputed constant;
/// the arm verifies path equality and method before calling the
/// operation's stub directly. Dynamic paths, hash collisions and method
/// mismatches fall through to the general router, preserving correctness.
pub struct FastRouter {
    handler: Arc<dyn ApiHandler>,
    fallback: Router,
}

impl FastRouter {
    /// Build the fast router and its general fallback over `handler`.
    pub fn new(handler: Arc<dyn ApiHandler>) -> Self {
        FastRouter {
            fallback: make_router(handler.clone()),
            handler,
        }
    }

    /// Dispatch a request, preferring the hash fast path.
    pub fn dispatch<'a>(&'a self, req: &Request<'a>, ctx: &mut RequestContext<'a>) -> Response {
        let path = req.path();
        match fnv1a_hash(path) {
            HASH_LIST_PETS if path == "/pets" && req.method == Method::GET => {
                return dispatch_list_pets(req, ctx, self.handler.as_ref());
            }
            HASH_CREATE_PET if path == "/pets" && req.method == Method::POST => {
                return dispatch_create_pet(req, ctx, self.handler.as_ref());
            }
            _ => {}
        }
        self.fallback.dispatch_or_problem(req, ctx)
    }
}

/// Serve `handler` with default server settings.
pub fn serve(handler: Arc<dyn ApiHandler>, port: u16) -> std::io::Result<()> {
    katana::server::Server::new(make_router(handler))
        .listen(port)
        .run()
}
