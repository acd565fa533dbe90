//! WebSocket transport over an accepted axum socket.
//!
//! Responsibilities:
//! - Split the socket into a writer task fed by an outbound queue and a reader
//!   task that turns WS messages into `TransportEvent`s
//! - Answer pings; surface close frames and stream end as `Close`
//!
//! The socket is already upgraded, so the transport starts OPEN and never
//! emits an `Open` event.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use routable_core::error::{Result, RoutableError};
use routable_core::Frame;

use super::{ready_state, CloseInfo, EventRx, Transport, TransportEvent, CHANNEL_CAPACITY};

/// Close code used when the peer sends a close frame without a status.
const NO_STATUS: u16 = 1005;

pub struct WsTransport {
    state: Arc<AtomicU16>,
    out_tx: mpsc::Sender<Message>,
    url: Option<String>,
}

impl WsTransport {
    /// Take ownership of an upgraded socket.
    pub fn accept(socket: WebSocket, url: Option<String>) -> (Arc<Self>, EventRx) {
        let (ev_tx, ev_rx) = mpsc::channel::<TransportEvent>(CHANNEL_CAPACITY);
        let (out_tx, mut out_rx) = mpsc::channel::<Message>(CHANNEL_CAPACITY);
        let (mut ws_tx, mut ws_rx) = socket.split();
        let state = Arc::new(AtomicU16::new(ready_state::OPEN));

        // ---- outbound writer
        tokio::spawn(async move {
            while let Some(m) = out_rx.recv().await {
                let closing = matches!(m, Message::Close(_));
                if ws_tx.send(m).await.is_err() {
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        // ---- inbound reader
        let reader_state = Arc::clone(&state);
        let pong_tx = out_tx.clone();
        tokio::spawn(async move {
            loop {
                let Some(incoming) = ws_rx.next().await else {
                    reader_state.store(ready_state::CLOSED, Ordering::SeqCst);
                    let _ = ev_tx
                        .send(TransportEvent::Close(CloseInfo::abnormal("stream ended")))
                        .await;
                    break;
                };

                let msg = match incoming {
                    Ok(msg) => msg,
                    Err(e) => {
                        let _ = ev_tx.send(TransportEvent::Error(e.to_string())).await;
                        reader_state.store(ready_state::CLOSED, Ordering::SeqCst);
                        let _ = ev_tx
                            .send(TransportEvent::Close(CloseInfo::abnormal(e.to_string())))
                            .await;
                        break;
                    }
                };

                match msg {
                    Message::Text(s) => {
                        let _ = ev_tx.send(TransportEvent::Message(Frame::Text(s))).await;
                    }
                    Message::Binary(b) => {
                        let frame = Frame::Binary(Bytes::from(b));
                        let _ = ev_tx.send(TransportEvent::Message(frame)).await;
                    }
                    Message::Ping(payload) => {
                        let _ = pong_tx.send(Message::Pong(payload)).await;
                    }
                    Message::Pong(_) => {}
                    Message::Close(cf) => {
                        reader_state.store(ready_state::CLOSED, Ordering::SeqCst);
                        let (code, reason) = cf
                            .map(|f| (f.code, f.reason.into_owned()))
                            .unwrap_or((NO_STATUS, String::new()));
                        let info = CloseInfo {
                            code,
                            reason,
                            was_clean: true,
                        };
                        let _ = ev_tx.send(TransportEvent::Close(info)).await;
                        break;
                    }
                }
            }
        });

        let transport = Arc::new(Self { state, out_tx, url });
        (transport, ev_rx)
    }
}

#[async_trait]
impl Transport for WsTransport {
    fn ready_state(&self) -> u16 {
        self.state.load(Ordering::SeqCst)
    }

    fn url(&self) -> Option<String> {
        self.url.clone()
    }

    async fn send(&self, frame: Frame) -> Result<()> {
        let state = self.ready_state();
        if state != ready_state::OPEN {
            return Err(RoutableError::Transport(format!(
                "send on non-open socket (ready_state={state})"
            )));
        }
        let msg = match frame {
            Frame::Text(s) => Message::Text(s),
            Frame::Binary(b) => Message::Binary(b.to_vec()),
        };
        self.out_tx
            .send(msg)
            .await
            .map_err(|_| RoutableError::Transport("outbound channel closed".into()))
    }

    async fn close(&self) -> Result<()> {
        let prev = self.state.swap(ready_state::CLOSING, Ordering::SeqCst);
        if prev == ready_state::CLOSED || prev == ready_state::CLOSING {
            self.state.store(prev, Ordering::SeqCst);
            return Ok(());
        }
        let frame = CloseFrame {
            code: 1000,
            reason: "".into(),
        };
        self.out_tx
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|_| RoutableError::Transport("outbound channel closed".into()))
    }
}
