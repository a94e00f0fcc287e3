//! Onion middleware for route dispatch.
//!
//! Each route carries an ordered chain `[m1, m2, ..., mk]`. Execution is
//! strictly nested: `m1` runs around `m2`, which runs around the handler.
//! A middleware that never calls [`Next::run`] short-circuits the request;
//! the post-`next` code of middleware it skipped does not run.

mod tracing_mw;

pub use tracing_mw::TracingMiddleware;

use crate::http::{Request, RequestContext, Response};
use crate::router::HandlerFn;
use std::sync::Arc;

/// A layer in a route's middleware chain.
pub trait Middleware: Send + Sync {
    /// Process the request. Call `next.run(req, ctx)` to continue down the
    /// chain; returning without doing so short-circuits with this
    /// middleware's response.
    fn handle<'a>(
        &self,
        req: &Request<'a>,
        ctx: &mut RequestContext<'a>,
        next: Next<'_, 'a>,
    ) -> Response;
}

/// The remainder of a middleware chain, ending at the route handler.
pub struct Next<'c, 'a> {
    chain: &'c [Arc<dyn Middleware>],
    handler: &'c HandlerFn,
    _marker: std::marker::PhantomData<&'a ()>,
}

impl<'c, 'a> Next<'c, 'a> {
    /// Start a chain over `chain` with `handler` at its core.
    pub fn new(chain: &'c [Arc<dyn Middleware>], handler: &'c HandlerFn) -> Self {
        Next {
            chain,
            handler,
            _marker: std::marker::PhantomData,
        }
    }

    /// Run the rest of the chain and return its response.
    pub fn run(self, req: &Request<'a>, ctx: &mut RequestContext<'a>) -> Response {
        match self.chain.split_first() {
            Some((mw, rest)) => mw.handle(
                req,
                ctx,
                Next {
                    chain: rest,
                    handler: self.handler,
                    _marker: std::marker::PhantomData,
                },
            ),
            None => (self.handler)(req, ctx),
        }
    }
}
