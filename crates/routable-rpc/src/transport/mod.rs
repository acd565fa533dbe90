//! Transport layer.
//!
//! A transport is an already-connected, ordered, message-framed duplex channel.
//! It exposes its readiness and a send/close primitive; everything it observes
//! (open, frames, errors, close) arrives as [`TransportEvent`]s on one mpsc
//! receiver consumed by exactly one session.

pub mod mem;
pub mod ws;

use async_trait::async_trait;
use tokio::sync::mpsc;

use routable_core::error::Result;
use routable_core::Frame;

/// Readiness codes, numbered like the WebSocket `readyState`.
pub mod ready_state {
    pub const CONNECTING: u16 = 0;
    pub const OPEN: u16 = 1;
    pub const CLOSING: u16 = 2;
    pub const CLOSED: u16 = 3;
}

/// Details of a transport close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
    pub was_clean: bool,
}

impl CloseInfo {
    /// Normal closure (1000).
    pub fn normal() -> Self {
        Self {
            code: 1000,
            reason: String::new(),
            was_clean: true,
        }
    }

    /// Connection dropped without a close handshake (1006).
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: 1006,
            reason: reason.into(),
            was_clean: false,
        }
    }
}

/// Everything a transport reports to its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open,
    Message(Frame),
    Error(String),
    Close(CloseInfo),
}

/// Receiving half handed to the session together with the transport.
pub type EventRx = mpsc::Receiver<TransportEvent>;

/// Queue depth for event and outbound channels.
pub(crate) const CHANNEL_CAPACITY: usize = 1024;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Current readiness (see [`ready_state`]); other values mean unknown.
    fn ready_state(&self) -> u16;

    /// Remote URL, used to make relative request URLs absolute.
    fn url(&self) -> Option<String> {
        None
    }

    async fn send(&self, frame: Frame) -> Result<()>;

    /// Request closure; completion is reported as a `Close` event.
    async fn close(&self) -> Result<()>;
}
