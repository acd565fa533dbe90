//! Protocol modules (frames, envelopes, payloads).
//!
//! - Frames: what the transport carries (text or binary).
//! - Envelopes: JSON objects correlating a payload with a request id.
//! - Messages: the HTTP-like request/response payload shapes.
//!
//! All parsers are panic-free: malformed input is reported as `RoutableError`
//! instead of panicking, keeping a session alive on hostile traffic.

pub mod envelope;
pub mod frame;
pub mod message;
