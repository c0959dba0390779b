//! Axum WebSocket upgrade handler.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::app_state::AppState;

/// `GET /ws`: Upgrade HTTP connection to WebSocket.
///
/// A failed handshake is logged and otherwise ignored.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let hub = state.hub.clone();
    let settings = Arc::clone(&state.connection);

    ws.on_failed_upgrade(move |err| {
        tracing::error!(remote_addr = %remote, error = %err, "websocket upgrade failed");
    })
    .on_upgrade(move |socket| run_connection(socket, remote, hub, settings))
}
