//! Axum wiring (HTTP -> WS upgrade).
//!
//! Every accepted socket becomes one [`Session`] listening with the shared
//! service router.

use axum::{
    extract::{ws::WebSocket, ws::WebSocketUpgrade, State},
    http::{header, HeaderMap},
    response::Response,
    routing::get,
    Router,
};

use crate::app_state::AppState;
use crate::session::Session;
use crate::transport::ws::WsTransport;

pub const WS_PATH: &str = "/v1/ws";

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(WS_PATH, get(ws_upgrade))
        .with_state(state)
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let url = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|host| format!("ws://{host}{WS_PATH}"));
    ws.on_upgrade(move |socket| run_session(socket, url, state))
}

async fn run_session(socket: WebSocket, url: Option<String>, state: AppState) {
    let (transport, events) = WsTransport::accept(socket, url);
    let session = Session::new(transport, events, state.cfg().session.clone());
    session.listen_shared(state.listener());

    tracing::info!(state = %session.state(), "session started");
    session.closed().await;

    let outstanding = session.pending().size();
    tracing::info!(outstanding, "session ended");
}
