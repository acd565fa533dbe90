//! routable core: transport-agnostic protocol primitives and error types.
//!
//! This crate defines the wire-level envelope, the request/response payload
//! shapes and their structural schemas, and the error surface shared by the
//! session runtime and its callers. It intentionally carries no transport or
//! runtime dependencies so it can be reused in multiple contexts.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed or hostile input must surface as `RoutableError`, never a crash.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;
pub mod schema;

/// Shared result type.
pub use error::{Result, RoutableError};
pub use protocol::envelope::{Envelope, EnvelopeType};
pub use protocol::frame::Frame;
pub use protocol::message::{Method, Query, QueryValue, Request, Response};
