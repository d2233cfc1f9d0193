// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime WebSocket endpoint.
//!
//! `GET /ws?token=...` authenticates the credential during the handshake,
//! resolves it to exactly one tenant, and joins the client to that tenant's
//! topic only. Frames are server-to-client JSON events; client frames other
//! than Close are ignored. A subscriber that lags behind the channel
//! capacity silently loses the skipped events.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    #[serde(default)]
    token: Option<String>,
}

/// WebSocket upgrade handler. Auth happens before the upgrade so a bad
/// credential gets a plain HTTP 401, not a doomed socket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
) -> Response {
    let credential = params.token.unwrap_or_default();
    let tenant_id = match state.connect_auth.authenticate(&credential).await {
        Ok(tenant_id) => tenant_id,
        Err(err) => return ApiError(err).into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, tenant_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, tenant_id: String) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut events = state.broadcaster.subscribe(&tenant_id);

    tracing::debug!(tenant = %tenant_id, "websocket subscriber connected");

    let sender_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                // Skipped events are simply lost; the stream continues.
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "websocket subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Drain client frames until the connection closes.
    while let Some(Ok(msg)) = ws_receiver.next().await {
        if let Message::Close(_) = msg {
            break;
        }
    }

    sender_task.abort();
    tracing::debug!(tenant = %tenant_id, "websocket subscriber disconnected");
}
