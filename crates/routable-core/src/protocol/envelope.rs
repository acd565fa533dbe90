//! Envelope codec (JSON text frames).
//!
//! Every frame on the wire is one object `{ id, type, payload }`. Requests get
//! a fresh time-ordered id; responses and errors echo the request's id.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, RoutableError};
use crate::protocol::frame::Frame;
use crate::schema;

/// Envelope type tag (field name is `type` in JSON).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EnvelopeType {
    Request,
    Response,
    Error,
}

impl EnvelopeType {
    pub fn as_str(self) -> &'static str {
        match self {
            EnvelopeType::Request => "REQUEST",
            EnvelopeType::Response => "RESPONSE",
            EnvelopeType::Error => "ERROR",
        }
    }
}

/// Wire envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    /// Correlation id.
    pub id: String,
    /// Message type.
    #[serde(rename = "type")]
    pub kind: EnvelopeType,
    /// Opaque payload (never null on the wire).
    pub payload: Value,
}

/// Generate a fresh correlation id (UUIDv7: unique and sortable by creation time).
pub fn next_id() -> String {
    Uuid::now_v7().to_string()
}

impl Envelope {
    /// Wrap an outbound request payload under a fresh id.
    pub fn wrap_request(payload: Value) -> Self {
        Self {
            id: next_id(),
            kind: EnvelopeType::Request,
            payload,
        }
    }

    /// Wrap a reply to request `id`.
    pub fn wrap_response(id: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            kind: EnvelopeType::Response,
            payload,
        }
    }

    /// Wrap a failure answering request `id`.
    pub fn wrap_error(id: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            kind: EnvelopeType::Error,
            payload,
        }
    }

    /// Decode a frame.
    ///
    /// Returns `Ok(None)` when the envelope is well formed but its type is not
    /// `expected`, so type-filtering callers can skip it quietly.
    pub fn parse(frame: &Frame, expected: Option<EnvelopeType>) -> Result<Option<Self>> {
        match frame {
            Frame::Text(text) => Self::parse_text(text, expected),
            Frame::Binary(_) => Err(RoutableError::MalformedInput("data is not a string".into())),
        }
    }

    /// Decode a text frame (see [`Envelope::parse`]).
    pub fn parse_text(text: &str, expected: Option<EnvelopeType>) -> Result<Option<Self>> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| RoutableError::MalformedInput(format!("invalid envelope json: {e}")))?;

        schema::check(&schema::ENVELOPE, &value).map_err(RoutableError::NonConforming)?;

        let env: Envelope = serde_json::from_value(value)
            .map_err(|e| RoutableError::Internal(format!("envelope decode failed: {e}")))?;

        match expected {
            Some(kind) if kind != env.kind => {
                tracing::trace!(id = %env.id, got = env.kind.as_str(), want = kind.as_str(), "envelope type skipped");
                Ok(None)
            }
            _ => Ok(Some(env)),
        }
    }

    /// Encode as a JSON text frame.
    pub fn to_frame(&self) -> Result<Frame> {
        serde_json::to_string(self)
            .map(Frame::Text)
            .map_err(|e| RoutableError::Internal(format!("envelope encode failed: {e}")))
    }
}
