//! Dispatcher module exports.
//!
//! Re-exports the handler traits so downstream consumers can depend on this
//! module directly.

pub mod handler;

pub use handler::{handler, pass, reply, HandlerResult, RequestHandler, RouteHandler};
