//! In-process transport pair.
//!
//! Both endpoints share one readiness value, start CONNECTING, and become OPEN
//! when either side calls [`MemTransport::establish`]. Frames sent on one side
//! arrive as `Message` events on the other.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use routable_core::error::{Result, RoutableError};
use routable_core::Frame;

use super::{ready_state, CloseInfo, EventRx, Transport, TransportEvent, CHANNEL_CAPACITY};

struct Link {
    state: AtomicU16,
    url: Option<String>,
    a_tx: mpsc::Sender<TransportEvent>,
    b_tx: mpsc::Sender<TransportEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    A,
    B,
}

/// One end of an in-process link.
pub struct MemTransport {
    link: Arc<Link>,
    side: Side,
}

/// A transport plus the receiver its session consumes.
pub struct MemEndpoint {
    pub transport: Arc<MemTransport>,
    pub events: EventRx,
}

/// Create a linked pair of endpoints (CONNECTING).
pub fn pair() -> (MemEndpoint, MemEndpoint) {
    pair_with_url(None)
}

/// Like [`pair`], with a URL reported by both ends.
pub fn pair_with_url(url: Option<String>) -> (MemEndpoint, MemEndpoint) {
    let (a_tx, a_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (b_tx, b_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let link = Arc::new(Link {
        state: AtomicU16::new(ready_state::CONNECTING),
        url,
        a_tx,
        b_tx,
    });

    let a = MemEndpoint {
        transport: Arc::new(MemTransport {
            link: Arc::clone(&link),
            side: Side::A,
        }),
        events: a_rx,
    };
    let b = MemEndpoint {
        transport: Arc::new(MemTransport {
            link,
            side: Side::B,
        }),
        events: b_rx,
    };
    (a, b)
}

impl MemTransport {
    fn own_tx(&self) -> &mpsc::Sender<TransportEvent> {
        match self.side {
            Side::A => &self.link.a_tx,
            Side::B => &self.link.b_tx,
        }
    }

    fn peer_tx(&self) -> &mpsc::Sender<TransportEvent> {
        match self.side {
            Side::A => &self.link.b_tx,
            Side::B => &self.link.a_tx,
        }
    }

    async fn broadcast(&self, event: TransportEvent) {
        let _ = self.link.a_tx.send(event.clone()).await;
        let _ = self.link.b_tx.send(event).await;
    }

    /// Mark the link OPEN and notify both ends.
    pub async fn establish(&self) {
        self.link.state.store(ready_state::OPEN, Ordering::SeqCst);
        self.broadcast(TransportEvent::Open).await;
    }

    /// Deliver an arbitrary event to this end's own session.
    pub async fn inject(&self, event: TransportEvent) {
        let _ = self.own_tx().send(event).await;
    }

    /// Report a transport error to this end.
    pub async fn fail(&self, msg: impl Into<String>) {
        self.inject(TransportEvent::Error(msg.into())).await;
    }

    /// Drop the link without a close handshake.
    pub async fn sever(&self, reason: impl Into<String>) {
        self.link.state.store(ready_state::CLOSED, Ordering::SeqCst);
        self.broadcast(TransportEvent::Close(CloseInfo::abnormal(reason)))
            .await;
    }
}

#[async_trait]
impl Transport for MemTransport {
    fn ready_state(&self) -> u16 {
        self.link.state.load(Ordering::SeqCst)
    }

    fn url(&self) -> Option<String> {
        self.link.url.clone()
    }

    async fn send(&self, frame: Frame) -> Result<()> {
        let state = self.ready_state();
        if state != ready_state::OPEN {
            return Err(RoutableError::Transport(format!(
                "send on non-open transport (ready_state={state})"
            )));
        }
        self.peer_tx()
            .send(TransportEvent::Message(frame))
            .await
            .map_err(|_| RoutableError::Transport("peer event channel closed".into()))
    }

    async fn close(&self) -> Result<()> {
        if self.link.state.swap(ready_state::CLOSED, Ordering::SeqCst) == ready_state::CLOSED {
            return Ok(());
        }
        self.broadcast(TransportEvent::Close(CloseInfo::normal())).await;
        Ok(())
    }
}
