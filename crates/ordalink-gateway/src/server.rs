// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use ordalink_core::OrdalinkError;
use ordalink_oauth::OAuthConnectFlow;
use ordalink_realtime::{Broadcaster, ConnectAuth};
use ordalink_webhook::WebhookIngestionPipeline;

use crate::handlers;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<WebhookIngestionPipeline>,
    pub oauth: Arc<OAuthConnectFlow>,
    pub broadcaster: Arc<Broadcaster>,
    /// Credential check for websocket connects.
    pub connect_auth: Arc<dyn ConnectAuth>,
    /// Process start time for uptime reporting.
    pub start_time: std::time::Instant,
}

/// Build the full route table.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/webhooks/incoming", post(handlers::post_incoming))
        .route(
            "/webhooks/incoming/{token_or_id}",
            post(handlers::post_incoming_with_token),
        )
        .route("/webhooks/orders", post(handlers::post_orders))
        .route(
            "/webhooks/orders/{token_or_id}",
            post(handlers::post_orders_with_token),
        )
        .route("/webhooks/button", post(handlers::post_button))
        .route("/oauth/start", get(handlers::get_oauth_start))
        .route("/oauth/callback", get(handlers::get_oauth_callback))
        .route("/oauth/credentials", post(handlers::post_oauth_credentials))
        .route("/oauth/disconnect", post(handlers::post_oauth_disconnect))
        .route(
            "/settings/webhook-token",
            post(handlers::post_rotate_webhook_token),
        )
        .route("/settings/relay", post(handlers::post_relay_settings))
        .route("/messages/send", post(handlers::post_send_message))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until the process is stopped.
pub async fn start_server(host: &str, port: u16, state: AppState) -> Result<(), OrdalinkError> {
    let app = router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| OrdalinkError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| OrdalinkError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}
