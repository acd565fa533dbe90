//! Method + path-pattern router.
//!
//! Routes are tried in registration order; within a matching route each
//! handler of the chain runs in turn until one answers. The first answer ends
//! the whole dispatch.

mod pattern;
mod route;

pub use pattern::{compile_expr, PathPattern};
pub use route::{RouteMethod, Router, RouterOptions};
