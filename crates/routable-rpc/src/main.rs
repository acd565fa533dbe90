//! routable demo server.
//!
//! - WebSocket endpoint: /v1/ws
//! - One session per socket, answering the `examples` service
//! - Tracing span per session

use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use routable_core::error::{Result, RoutableError};
use routable_rpc::{app_state, config, server};

const CONFIG_PATH: &str = "routable.yaml";

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, code = e.code().as_str(), "routable-rpc failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cfg = if Path::new(CONFIG_PATH).exists() {
        config::load_from_file(CONFIG_PATH)?
    } else {
        tracing::info!(path = CONFIG_PATH, "config not found; using defaults");
        config::RoutableConfig::default()
    };
    let listen: SocketAddr = cfg
        .server
        .listen
        .parse()
        .map_err(|e| RoutableError::BadRequest(format!("server.listen is not a SocketAddr: {e}")))?;

    let state = app_state::AppState::new(cfg)?;
    let app = server::build_router(state);

    tracing::info!(%listen, "routable-rpc starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| RoutableError::Transport(format!("bind {listen} failed: {e}")))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| RoutableError::Transport(format!("server failed: {e}")))
}
