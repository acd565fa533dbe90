//! routable RPC library entry.
//!
//! Wires the pending-call registry, path router and transports into a
//! session that speaks the envelope protocol over one duplex channel. It is
//! consumed by the demo binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod dispatch;
pub mod router;
pub mod server;
pub mod services;
pub mod session;
pub mod transport;

pub use dispatch::{handler, pass, reply, HandlerResult, RequestHandler, RouteHandler};
pub use router::{Router, RouterOptions};
pub use session::{PendingCalls, SendOptions, Session, SessionState};
