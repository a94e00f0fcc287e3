//! Request-span tracing middleware.

use super::{Middleware, Next};
use crate::http::{Request, RequestContext, Response};
use std::time::Instant;
use tracing::info;

/// Logs one structured event per request with method, path, status and
/// latency.
#[derive(Debug, Default)]
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn handle<'a>(
        &self,
        req: &Request<'a>,
        ctx: &mut RequestContext<'a>,
        next: Next<'_, 'a>,
    ) -> Response {
        let start = Instant::now();
        let resp = next.run(req, ctx);
        info!(
            method = %req.method,
            path = req.path(),
            status = resp.status.as_u16(),
            latency_us = start.elapsed().as_micros() as u64,
            "request handled"
        );
        resp
    }
}
