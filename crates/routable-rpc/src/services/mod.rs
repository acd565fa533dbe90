//! Built-in request services.
//!
//! Each service exposes a `routes` constructor producing a ready
//! [`Router`](crate::router::Router) that a session can listen with.

pub mod examples;

pub use examples::{Example, ExampleStore};
