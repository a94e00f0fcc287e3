//! Path-pattern router with literal-over-parameter precedence.
//!
//! The route table is sorted once at construction so that for any URI a
//! literal segment beats a `{param}` segment at the same depth
//! (`/users/me` wins over `/users/{id}`). Matching walks the sorted order
//! and stops at the first hit, extracting path parameters as zero-copy
//! slices of the URI. Registration order is kept separately because it
//! defines the `Allow` header ordering on 405 responses.

use crate::http::{Params, ProblemDetails, Request, RequestContext, Response};
use crate::middleware::{Middleware, Next};
use http::Method;
use std::sync::Arc;
use tracing::{debug, info};

/// One segment of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must match the URI segment byte-for-byte.
    Literal(String),
    /// Matches any non-empty segment and captures it under this name.
    Param(String),
}

/// A decomposed route path such as `/orders/{orderId}/items/{itemId}`.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse a pattern string. Segments wrapped in `{}` become parameters.
    pub fn parse(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                if let Some(name) = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                    Segment::Param(name.to_string())
                } else {
                    Segment::Literal(s.to_string())
                }
            })
            .collect();
        PathPattern {
            raw: pattern.to_string(),
            segments,
        }
    }

    /// The original pattern text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when the pattern has no `{param}` segments.
    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Match `path` (query already stripped), appending captured parameters
    /// to `params` on success. Leaves `params` untouched on a miss.
    pub fn match_path<'a>(&'a self, path: &'a str, params: &mut Params<'a>) -> bool {
        let mut iter = path.split('/').filter(|s| !s.is_empty());
        let checkpoint = params.len();
        for segment in &self.segments {
            let part = match iter.next() {
                Some(p) => p,
                None => {
                    params.truncate(checkpoint);
                    return false;
                }
            };
            match segment {
                Segment::Literal(lit) => {
                    if lit != part {
                        params.truncate(checkpoint);
                        return false;
                    }
                }
                Segment::Param(name) => params.push((name.as_str(), part)),
            }
        }
        if iter.next().is_some() {
            params.truncate(checkpoint);
            return false;
        }
        true
    }

    /// Precedence ordering: segment-by-segment, literals before parameters
    /// at equal depth. Ties fall back to segment count so the sort is
    /// total.
    fn precedence_cmp(&self, other: &PathPattern) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        for (a, b) in self.segments.iter().zip(other.segments.iter()) {
            let ord = match (a, b) {
                (Segment::Literal(x), Segment::Literal(y)) => x.cmp(y),
                (Segment::Literal(_), Segment::Param(_)) => Ordering::Less,
                (Segment::Param(_), Segment::Literal(_)) => Ordering::Greater,
                (Segment::Param(_), Segment::Param(_)) => Ordering::Equal,
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.segments.len().cmp(&other.segments.len())
    }
}

/// Route handler: borrows the request and context, returns an owned
/// response.
pub type HandlerFn =
    Arc<dyn for<'a> Fn(&Request<'a>, &mut RequestContext<'a>) -> Response + Send + Sync>;

/// Wrap a closure as a [`HandlerFn`].
pub fn handler_fn<F>(f: F) -> HandlerFn
where
    F: for<'a> Fn(&Request<'a>, &mut RequestContext<'a>) -> Response + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Immutable routing table entry.
#[derive(Clone)]
pub struct RouteEntry {
    /// HTTP method this entry answers.
    pub method: Method,
    /// Decomposed path pattern.
    pub pattern: PathPattern,
    /// The handler invoked after the middleware chain.
    pub handler: HandlerFn,
    /// Onion middleware chain, outermost first.
    pub middleware: Vec<Arc<dyn Middleware>>,
    /// Accepted request media types (empty: no body declared).
    pub consumes: Vec<String>,
    /// Producible response media types (empty: no negotiation).
    pub produces: Vec<String>,
}

impl RouteEntry {
    /// Create an entry with no middleware and no media-type lists.
    pub fn new(method: Method, pattern: &str, handler: HandlerFn) -> Self {
        RouteEntry {
            method,
            pattern: PathPattern::parse(pattern),
            handler,
            middleware: Vec::new(),
            consumes: Vec::new(),
            produces: Vec::new(),
        }
    }

    /// Attach an onion middleware chain (outermost first).
    pub fn with_middleware(mut self, middleware: Vec<Arc<dyn Middleware>>) -> Self {
        self.middleware = middleware;
        self
    }

    /// Declare the media types this route consumes.
    pub fn with_consumes(mut self, consumes: Vec<String>) -> Self {
        self.consumes = consumes;
        self
    }

    /// Declare the media types this route produces.
    pub fn with_produces(mut self, produces: Vec<String>) -> Self {
        self.produces = produces;
        self
    }
}

/// Routing failure, turned into a problem-details response by
/// [`Router::dispatch_or_problem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No pattern matched the path.
    NotFound,
    /// A pattern matched but not with this method; carries the methods
    /// registered for the path, in registration order.
    MethodNotAllowed(Vec<Method>),
}

/// Request router.
pub struct Router {
    /// Entries in registration order (defines the `Allow` ordering).
    routes: Vec<RouteEntry>,
    /// Indices into `routes`, sorted by pattern precedence.
    order: Vec<usize>,
}

impl Router {
    /// Build a router from `routes`, computing the precedence order once.
    pub fn new(routes: Vec<RouteEntry>) -> Self {
        let mut order: Vec<usize> = (0..routes.len()).collect();
        order.sort_by(|&a, &b| routes[a].pattern.precedence_cmp(&routes[b].pattern));
        info!(routes = routes.len(), "routing table built");
        Router { routes, order }
    }

    /// All registered entries, in registration order.
    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    /// Match and execute a route.
    ///
    /// Strips the query string, finds the highest-precedence matching
    /// pattern for the request method, binds `ctx.params`, then runs the
    /// middleware onion around the handler.
    pub fn dispatch<'a>(
        &'a self,
        req: &Request<'a>,
        ctx: &mut RequestContext<'a>,
    ) -> Result<Response, DispatchError> {
        let path = req.path();
        let mut path_matched = false;

        for &idx in &self.order {
            let route = &self.routes[idx];
            let mut params = Params::new();
            if !route.pattern.match_path(path, &mut params) {
                continue;
            }
            if route.method != req.method {
                path_matched = true;
                continue;
            }

            debug!(
                method = %req.method,
                path,
                pattern = route.pattern.as_str(),
                "route matched"
            );
            ctx.params = params;
            let next = Next::new(&route.middleware, &route.handler);
            return Ok(next.run(req, ctx));
        }

        if path_matched {
            let mut allowed: Vec<Method> = Vec::new();
            for route in &self.routes {
                let mut scratch = Params::new();
                if route.pattern.match_path(path, &mut scratch) && !allowed.contains(&route.method)
                {
                    allowed.push(route.method.clone());
                }
            }
            debug!(method = %req.method, path, ?allowed, "method not allowed");
            Err(DispatchError::MethodNotAllowed(allowed))
        } else {
            debug!(method = %req.method, path, "no route matched");
            Err(DispatchError::NotFound)
        }
    }

    /// Like [`dispatch`](Self::dispatch), but synthesizes 404/405 problem
    /// responses (with an accurate `Allow` header) instead of errors.
    pub fn dispatch_or_problem<'a>(
        &'a self,
        req: &Request<'a>,
        ctx: &mut RequestContext<'a>,
    ) -> Response {
        match self.dispatch(req, ctx) {
            Ok(resp) => resp,
            Err(DispatchError::NotFound) => Response::error(ProblemDetails::not_found(format!(
                "no route matches {}",
                req.path()
            ))),
            Err(DispatchError::MethodNotAllowed(allowed)) => {
                let allow = allowed
                    .iter()
                    .map(|m| m.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut resp = Response::error(ProblemDetails::method_not_allowed(format!(
                    "{} is not allowed on {}",
                    req.method,
                    req.path()
                )));
                resp.set_header("Allow", &allow);
                resp
            }
        }
    }
}
