//! Scoped thread-local handler context.
//!
//! Generated handler methods have clean signatures (typed parameters plus
//! an optional body) with no `&Request`/`&RequestContext` pair. When a
//! handler does need the raw request or the arena, it reaches them through
//! this module: the dispatch stub pushes a [`ContextScope`] before the
//! handler call and the guard pops it on every exit path, so the
//! thread-local is always unwound before the stub returns.
//!
//! Connections never migrate between reactor threads, which is what makes
//! a thread-local stack the right shape here.

use super::request::{Request, RequestContext};
use std::cell::RefCell;
use std::marker::PhantomData;

#[derive(Clone, Copy)]
struct Frame {
    req: *const Request<'static>,
    ctx: *const RequestContext<'static>,
}

thread_local! {
    static STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// RAII guard keeping the current request reachable from handler code.
///
/// The raw pointers stored in the thread-local are valid for exactly the
/// guard's lifetime: the guard borrows the request and context for `'a`,
/// and the `Drop` impl pops the frame before those borrows can end.
pub struct ContextScope<'a> {
    _marker: PhantomData<&'a ()>,
}

impl<'a> ContextScope<'a> {
    /// Push `req`/`ctx` as the current handler context.
    pub fn enter(req: &'a Request<'a>, ctx: &'a RequestContext<'a>) -> Self {
        let frame = Frame {
            req: req as *const Request<'a> as *const Request<'static>,
            ctx: ctx as *const RequestContext<'a> as *const RequestContext<'static>,
        };
        STACK.with(|stack| stack.borrow_mut().push(frame));
        ContextScope {
            _marker: PhantomData,
        }
    }
}

impl Drop for ContextScope<'_> {
    fn drop(&mut self) {
        STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Run `f` with the innermost request/context, if a dispatch is in flight
/// on this thread.
pub fn with_current<R>(f: impl FnOnce(&Request<'_>, &RequestContext<'_>) -> R) -> Option<R> {
    let frame = STACK.with(|stack| stack.borrow().last().copied());
    frame.map(|frame| {
        // Valid: the frame was pushed by a live ContextScope further up
        // this thread's stack, which borrows both referents.
        let req: &Request<'_> = unsafe { &*frame.req };
        let ctx: &RequestContext<'_> = unsafe { &*frame.ctx };
        f(req, ctx)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::http::headers::HeaderMap;
    use http::Method;

    fn make_request(target: &str) -> Request<'_> {
        Request {
            method: Method::GET,
            target,
            headers: HeaderMap::new(),
            body: &[],
        }
    }

    #[test]
    fn scope_exposes_and_unwinds() {
        let arena = Arena::new();
        let mut ctx = RequestContext::new(&arena);
        let req = make_request("/widgets/7");
        ctx.params.push(("id", "7"));

        assert!(with_current(|_, _| ()).is_none());
        {
            let _scope = ContextScope::enter(&req, &ctx);
            let seen = with_current(|req, ctx| {
                (req.target.to_string(), ctx.param("id").map(str::to_string))
            });
            assert_eq!(seen, Some(("/widgets/7".to_string(), Some("7".to_string()))));
        }
        assert!(with_current(|_, _| ()).is_none());
    }

    #[test]
    fn scopes_nest_innermost_first() {
        let arena = Arena::new();
        let outer_ctx = RequestContext::new(&arena);
        let inner_ctx = RequestContext::new(&arena);
        let outer_req = make_request("/outer");
        let inner_req = make_request("/inner");

        let _outer = ContextScope::enter(&outer_req, &outer_ctx);
        {
            let _inner = ContextScope::enter(&inner_req, &inner_ctx);
            assert_eq!(
                with_current(|req, _| req.target.to_string()),
                Some("/inner".to_string())
            );
        }
        assert_eq!(
            with_current(|req, _| req.target.to_string()),
            Some("/outer".to_string())
        );
    }
}
