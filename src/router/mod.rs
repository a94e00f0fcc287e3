//! Route table, pattern matching and dispatch.

mod core;

pub use core::{
    handler_fn, DispatchError, HandlerFn, PathPattern, RouteEntry, Router, Segment,
};
