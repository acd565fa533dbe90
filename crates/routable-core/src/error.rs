//! Shared error type across routable crates.

use serde_json::{json, Value};
use thiserror::Error;

use crate::schema::ValidationErrors;

/// Peer-facing error codes (stable API, carried in ERROR envelopes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Outbound request failed its schema.
    InvalidRequest,
    /// Decoded value does not satisfy its schema.
    NonConforming,
    /// Frame is not text or not JSON.
    MalformedInput,
    /// No terminal envelope before the deadline.
    Timeout,
    /// No pending call for the id.
    NotFound,
    /// The peer answered with an ERROR envelope.
    Remote,
    /// Transport failure.
    Transport,
    /// Transport closed.
    Closed,
    /// Invalid input to a local API.
    BadRequest,
    /// Unsupported config/protocol version.
    UnsupportedVersion,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in ERROR envelope payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::NonConforming => "NON_CONFORMING",
            ErrorCode::MalformedInput => "MALFORMED_INPUT",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Remote => "REMOTE",
            ErrorCode::Transport => "TRANSPORT",
            ErrorCode::Closed => "CLOSED",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, RoutableError>;

/// Unified error type used by core and rpc.
#[derive(Debug, Clone, Error)]
pub enum RoutableError {
    #[error("invalid request: {0}")]
    InvalidRequest(ValidationErrors),
    #[error("payload is non conforming: {0}")]
    NonConforming(ValidationErrors),
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("timeout waiting for {0}")]
    Timeout(String),
    #[error("pending call \"{0}\" not found")]
    NotFound(String),
    #[error("remote error: {0}")]
    Remote(Value),
    #[error("transport: {0}")]
    Transport(String),
    #[error("closed (code={code}): {reason}")]
    Closed { code: u16, reason: String },
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl RoutableError {
    /// Map internal error to a stable peer-facing code.
    pub fn code(&self) -> ErrorCode {
        match self {
            RoutableError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            RoutableError::NonConforming(_) => ErrorCode::NonConforming,
            RoutableError::MalformedInput(_) => ErrorCode::MalformedInput,
            RoutableError::Timeout(_) => ErrorCode::Timeout,
            RoutableError::NotFound(_) => ErrorCode::NotFound,
            RoutableError::Remote(_) => ErrorCode::Remote,
            RoutableError::Transport(_) => ErrorCode::Transport,
            RoutableError::Closed { .. } => ErrorCode::Closed,
            RoutableError::BadRequest(_) => ErrorCode::BadRequest,
            RoutableError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            RoutableError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// ERROR envelope payload for this failure.
    pub fn to_payload(&self) -> Value {
        json!({
            "code": self.code().as_str(),
            "message": self.to_string(),
        })
    }
}
