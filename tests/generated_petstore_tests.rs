//! Exercises the generator-output contract against a checked-in artifact
//! set produced from `tests/fixtures/petstore.json`.

#[path = "petstore_gen/mod.rs"]
mod petstore_gen;

use http::{Method, StatusCode};
use katana::arena::Arena;
use katana::http::{HeaderMap, Request, RequestContext, Response};
use petstore_gen::dispatch::{
    dispatch_create_pet, dispatch_list_pets, FastRouter, HASH_CREATE_PET, HASH_LIST_PETS,
};
use petstore_gen::handlers::ApiHandler;
use petstore_gen::parsers::{parse_f64_array, parse_pet};
use petstore_gen::routes::ROUTES;
use petstore_gen::types::Pet;
use petstore_gen::validators::validate_pet;
use std::sync::Arc;

struct TestHandler;

impl ApiHandler for TestHandler {
    fn list_pets(&self, limit: Option<i64>) -> Response {
        Response::json(format!(r#"{{"limit":{}}}"#, limit.unwrap_or(-1)))
    }

    fn create_pet(&self, body: Pet) -> Response {
        Response::json(format!(r#"{{"created":{}}}"#, body.id))
    }

    fn get_pet(&self, pet_id: i64, x_trace: Option<&str>, _session: Option<&str>) -> Response {
        Response::json(format!(
            r#"{{"id":{},"trace":{}}}"#,
            pet_id,
            x_trace.is_some()
        ))
    }
}

fn make_request<'a>(method: Method, target: &'a str, headers: HeaderMap<'a>) -> Request<'a> {
    Request {
        method,
        target,
        headers,
        body: &[],
    }
}

fn pet(id: i64, name: &str, status: Option<&str>) -> Pet {
    Pet {
        id,
        name: name.to_string(),
        status: status.map(str::to_string),
    }
}

#[test]
fn parser_round_trips_valid_values() {
    let original = pet(7, "rex", Some("available"));
    assert!(validate_pet(&original).is_none());
    let bytes = serde_json::to_vec(&original).unwrap();
    let parsed = parse_pet(&bytes).unwrap();
    assert_eq!(parsed, original);
}

#[test]
fn parser_accepts_what_validators_reject() {
    // Negative coverage: every declared constraint has a value the parser
    // accepts and the validator rejects.
    let bad_id = parse_pet(br#"{"id":0,"name":"rex"}"#).unwrap();
    assert_eq!(validate_pet(&bad_id).unwrap().field, "id");

    let bad_name = parse_pet(br#"{"id":1,"name":""}"#).unwrap();
    assert_eq!(validate_pet(&bad_name).unwrap().field, "name");

    let bad_status = parse_pet(br#"{"id":1,"name":"rex","status":"hiding"}"#).unwrap();
    assert_eq!(validate_pet(&bad_status).unwrap().field, "status");
}

#[test]
fn array_of_primitives_parses_directly() {
    let values = parse_f64_array(b"[1.0, 2.0, 3.0, 4.0, 5.0]").unwrap();
    assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    assert!(parse_f64_array(b"[1.0, \"x\"]").is_none());
}

#[test]
fn route_table_matches_the_document() {
    assert_eq!(ROUTES.len(), 3);
    let create = ROUTES.iter().find(|r| r.operation_id == "createPet").unwrap();
    assert_eq!(create.method, "POST");
    assert_eq!(create.consumes, &["application/json"]);
    assert_eq!(create.produces, &["application/json"]);
}

#[test]
fn stub_binds_query_params_and_negotiates() {
    let arena = Arena::new();

    let req = make_request(Method::GET, "/pets?limit=5", HeaderMap::new());
    let mut ctx = RequestContext::new(&arena);
    let resp = dispatch_list_pets(&req, &mut ctx, &TestHandler);
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.header("Content-Type"), Some("application/json"));
    assert_eq!(resp.body, r#"{"limit":5}"#);

    let req = make_request(Method::GET, "/pets?limit=abc", HeaderMap::new());
    let mut ctx = RequestContext::new(&arena);
    let resp = dispatch_list_pets(&req, &mut ctx, &TestHandler);
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.body.contains("invalid param limit"));

    let mut headers = HeaderMap::new();
    headers.insert("Accept", "image/png");
    let req = make_request(Method::GET, "/pets", headers);
    let mut ctx = RequestContext::new(&arena);
    let resp = dispatch_list_pets(&req, &mut ctx, &TestHandler);
    assert_eq!(resp.status, StatusCode::NOT_ACCEPTABLE);
}

#[test]
fn stub_enforces_content_type_parse_and_validation() {
    let arena = Arena::new();

    // Missing Content-Type is 415.
    let req = make_request(Method::POST, "/pets", HeaderMap::new());
    let mut ctx = RequestContext::new(&arena);
    let resp = dispatch_create_pet(&req, &mut ctx, &TestHandler);
    assert_eq!(resp.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    // Malformed JSON is 400.
    let mut headers = HeaderMap::new();
    headers.insert("Content-Type", "application/json");
    let mut req = make_request(Method::POST, "/pets", headers);
    req.body = b"{not json";
    let mut ctx = RequestContext::new(&arena);
    let resp = dispatch_create_pet(&req, &mut ctx, &TestHandler);
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.body.contains("invalid request body"));

    // Parseable but constraint-violating body is 400 with `field: message`.
    let mut headers = HeaderMap::new();
    headers.insert("Content-Type", "application/json");
    let mut req = make_request(Method::POST, "/pets", headers);
    req.body = br#"{"id":0,"name":"rex"}"#;
    let mut ctx = RequestContext::new(&arena);
    let resp = dispatch_create_pet(&req, &mut ctx, &TestHandler);
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.body.contains("id: must be >= 1"));

    // A valid body reaches the handler.
    let mut headers = HeaderMap::new();
    headers.insert("Content-Type", "application/json; charset=utf-8");
    let mut req = make_request(Method::POST, "/pets", headers);
    req.body = br#"{"id":3,"name":"rex"}"#;
    let mut ctx = RequestContext::new(&arena);
    let resp = dispatch_create_pet(&req, &mut ctx, &TestHandler);
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, r#"{"created":3}"#);
}

#[test]
fn fast_router_dispatches_static_routes_and_falls_through() {
    let router = FastRouter::new(Arc::new(TestHandler));
    let arena = Arena::new();

    // Static path takes the hash fast path.
    let req = make_request(Method::GET, "/pets", HeaderMap::new());
    let mut ctx = RequestContext::new(&arena);
    let resp = router.dispatch(&req, &mut ctx);
    assert_eq!(resp.status, StatusCode::OK);

    // Same hash, different method: second arm.
    assert_eq!(HASH_LIST_PETS, HASH_CREATE_PET);

    // Dynamic path falls through to the general router.
    let req = make_request(Method::GET, "/pets/11", HeaderMap::new());
    let mut ctx = RequestContext::new(&arena);
    let resp = router.dispatch(&req, &mut ctx);
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains(r#""id":11"#));

    // Method mismatch on a static path: 405 from the fallback with Allow.
    let req = make_request(Method::PUT, "/pets", HeaderMap::new());
    let mut ctx = RequestContext::new(&arena);
    let resp = router.dispatch(&req, &mut ctx);
    assert_eq!(resp.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(resp.header("Allow"), Some("GET, POST"));
}

#[test]
fn handler_reaches_request_through_context_scope() {
    struct ContextPeeker;
    impl ApiHandler for ContextPeeker {
        fn list_pets(&self, _limit: Option<i64>) -> Response {
            let target = katana::http::context::with_current(|req, _ctx| req.target.to_string())
                .unwrap_or_default();
            Response::text(target)
        }
        fn create_pet(&self, _body: Pet) -> Response {
            Response::text("")
        }
        fn get_pet(&self, _pet_id: i64, _x: Option<&str>, _s: Option<&str>) -> Response {
            Response::text("")
        }
    }

    let arena = Arena::new();
    let req = make_request(Method::GET, "/pets?limit=2", HeaderMap::new());
    let mut ctx = RequestContext::new(&arena);
    let resp = dispatch_list_pets(&req, &mut ctx, &ContextPeeker);
    assert_eq!(resp.body, "/pets?limit=2");
    // The scope was popped before the stub returned.
    assert!(katana::http::context::with_current(|_, _| ()).is_none());
}

#[test]
fn regenerating_the_fixture_covers_the_same_surface() {
    let spec = std::fs::read_to_string(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/petstore.json"
    ))
    .unwrap();
    let doc = katana::load_spec_from_str(&spec).unwrap();
    let dir = tempfile::tempdir().unwrap();
    katana::generator::generate_artifacts(&doc, dir.path(), true).unwrap();

    let dispatch = std::fs::read_to_string(dir.path().join("dispatch.rs")).unwrap();
    for needle in [
        "pub fn dispatch_list_pets",
        "pub fn dispatch_create_pet",
        "pub fn dispatch_get_pet",
        "pub const HASH_LIST_PETS: u64 = fnv1a_hash(\"/pets\");",
        "pub struct FastRouter",
        "validate_pet(&body)",
    ] {
        assert!(dispatch.contains(needle), "missing {needle}");
    }
    let handlers = std::fs::read_to_string(dir.path().join("handlers.rs")).unwrap();
    assert!(handlers
        .contains("fn get_pet(&self, pet_id: i64, x_trace: Option<&str>, session: Option<&str>) -> Response;"));
}
