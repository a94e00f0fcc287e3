//! Spec-first echo serving.
//!
//! `katana serve` runs the full serving plane before any code has been
//! generated: every operation in the document is answered by an echo
//! handler that reflects the matched operation, path parameters, query
//! parameters and body back as JSON. Useful for smoke-testing a spec and
//! the routing it induces.

use crate::http::Response;
use crate::router::{handler_fn, RouteEntry, Router};
use crate::spec::SpecDocument;
use serde_json::Value;

/// Build a router answering every operation of `doc` with an echo handler.
pub fn echo_router(doc: &SpecDocument) -> Router {
    let mut routes = Vec::new();
    for route in &doc.routes {
        let operation_id = route.operation_id.clone();
        routes.push(
            RouteEntry::new(
                route.method.clone(),
                &route.path_pattern,
                handler_fn(move |req, ctx| {
                    let params: serde_json::Map<String, Value> = ctx
                        .params
                        .iter()
                        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                        .collect();
                    let query: serde_json::Map<String, Value> = req
                        .query()
                        .map(|q| {
                            url::form_urlencoded::parse(q.as_bytes())
                                .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
                                .collect()
                        })
                        .unwrap_or_default();
                    let body: Value = if req.body.is_empty() {
                        Value::Null
                    } else {
                        serde_json::from_slice(req.body).unwrap_or(Value::Null)
                    };
                    let echo = serde_json::json!({
                        "operation_id": operation_id,
                        "method": req.method.as_str(),
                        "path": req.path(),
                        "params": params,
                        "query": query,
                        "body": body,
                    });
                    Response::json(echo.to_string())
                }),
            )
            .with_consumes(route.consumes())
            .with_produces(route.produces.clone()),
        );
    }
    Router::new(routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::http::{HeaderMap, Request, RequestContext};
    use http::Method;

    #[test]
    fn echoes_operation_and_params() {
        let doc = crate::spec::load_spec_from_str(
            r#"{
                "openapi": "3.0.3",
                "info": { "title": "Echo", "version": "1" },
                "paths": {
                    "/things/{id}": {
                        "get": {
                            "operationId": "getThing",
                            "parameters": [{
                                "name": "id", "in": "path", "required": true,
                                "schema": { "type": "string" }
                            }],
                            "responses": { "200": { "description": "OK" } }
                        }
                    }
                }
            }"#,
        )
        .unwrap();
        let router = echo_router(&doc);

        let arena = Arena::new();
        let req = Request {
            method: Method::GET,
            target: "/things/7?verbose=yes",
            headers: HeaderMap::new(),
            body: &[],
        };
        let mut ctx = RequestContext::new(&arena);
        let resp = router.dispatch_or_problem(&req, &mut ctx);
        assert_eq!(resp.status.as_u16(), 200);
        let echo: serde_json::Value = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(echo["operation_id"], "getThing");
        assert_eq!(echo["params"]["id"], "7");
        assert_eq!(echo["query"]["verbose"], "yes");
    }
}
