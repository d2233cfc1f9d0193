// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers: webhook ingress, button actions, order sync,
//! OAuth start/callback, credential management, tenant settings, outbound
//! send, health.

use std::collections::{BTreeMap, HashMap};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Redirect;
use axum::Json;
use serde::{Deserialize, Serialize};

use ordalink_core::types::{Message, MessageKind, Order};
use ordalink_core::OrdalinkError;
use ordalink_oauth::CallbackQuery;
use ordalink_webhook::{
    ButtonOutcome, ButtonPayload, IncomingMessage, OrderSyncOutcome, ProviderOrder,
    ResolutionHints,
};

use crate::error::ApiError;
use crate::server::AppState;

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OrderSyncResponse {
    Created { order: Order },
    /// The event id was seen before; accepted without a new row.
    Duplicate,
}

#[derive(Debug, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ButtonResponse {
    OrderSettled { order: Order },
    SupportRequested { message: Message },
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub authorize_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub store_domain: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Serialize)]
pub struct CredentialsResponse {
    pub masked_client_secret: String,
}

#[derive(Debug, Serialize)]
pub struct RotateTokenResponse {
    /// Full token, shown once at rotation time.
    pub webhook_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RelaySettingsRequest {
    /// Absent or empty clears the relay.
    #[serde(default)]
    pub relay_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub customer_id: String,
    pub content: String,
    #[serde(default)]
    pub kind: Option<MessageKind>,
    #[serde(default)]
    pub media_url: Option<String>,
}

/// GET /health
pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// POST /webhooks/incoming
pub async fn post_incoming(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(payload): Json<IncomingMessage>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    ingest_message(state, None, query, headers, payload).await
}

/// POST /webhooks/incoming/{token_or_id}
pub async fn post_incoming_with_token(
    State(state): State<AppState>,
    Path(token_or_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(payload): Json<IncomingMessage>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    ingest_message(state, Some(token_or_id), query, headers, payload).await
}

async fn ingest_message(
    state: AppState,
    token_or_id: Option<String>,
    query: HashMap<String, String>,
    headers: HeaderMap,
    payload: IncomingMessage,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let hints = resolution_hints(token_or_id, &query, &headers, payload.phone.clone());
    let message = state.pipeline.ingest_message(hints, payload).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /webhooks/orders
pub async fn post_orders(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(payload): Json<ProviderOrder>,
) -> Result<Json<OrderSyncResponse>, ApiError> {
    ingest_order(state, None, query, headers, payload).await
}

/// POST /webhooks/orders/{token_or_id}
pub async fn post_orders_with_token(
    State(state): State<AppState>,
    Path(token_or_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(payload): Json<ProviderOrder>,
) -> Result<Json<OrderSyncResponse>, ApiError> {
    ingest_order(state, Some(token_or_id), query, headers, payload).await
}

async fn ingest_order(
    state: AppState,
    token_or_id: Option<String>,
    query: HashMap<String, String>,
    headers: HeaderMap,
    payload: ProviderOrder,
) -> Result<Json<OrderSyncResponse>, ApiError> {
    let hints = resolution_hints(token_or_id, &query, &headers, None);
    let outcome = state.pipeline.ingest_order(hints, payload, "store").await?;
    Ok(Json(match outcome {
        OrderSyncOutcome::Created(order) => OrderSyncResponse::Created { order },
        OrderSyncOutcome::Duplicate => OrderSyncResponse::Duplicate,
    }))
}

/// POST /webhooks/button
pub async fn post_button(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(payload): Json<ButtonPayload>,
) -> Result<Json<ButtonResponse>, ApiError> {
    let hints = resolution_hints(None, &query, &headers, payload.phone.clone());
    let outcome = state.pipeline.handle_button(hints, payload).await?;
    Ok(Json(match outcome {
        ButtonOutcome::OrderSettled(order) => ButtonResponse::OrderSettled { order },
        ButtonOutcome::SupportRequested(message) => ButtonResponse::SupportRequested { message },
    }))
}

/// GET /oauth/start
///
/// The caller's tenant identity arrives via `x-tenant-id`, supplied by the
/// upstream auth layer in front of this service.
pub async fn get_oauth_start(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StartResponse>, ApiError> {
    let tenant_id = required_tenant(&headers)?;
    let outcome = state.oauth.start(&tenant_id).await?;
    Ok(Json(StartResponse {
        authorize_url: outcome.authorize_url,
    }))
}

/// GET /oauth/callback
pub async fn get_oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
) -> Result<Redirect, ApiError> {
    let ip = client_ip(&headers);
    let url = state
        .oauth
        .callback(CallbackQuery::from_pairs(query), ip.as_deref())
        .await?;
    Ok(Redirect::to(&url))
}

/// POST /oauth/credentials
pub async fn post_oauth_credentials(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<CredentialsResponse>, ApiError> {
    let tenant_id = required_tenant(&headers)?;
    let ip = client_ip(&headers);
    let masked = state
        .oauth
        .save_credentials(
            &tenant_id,
            &body.store_domain,
            &body.client_id,
            &body.client_secret,
            ip.as_deref(),
        )
        .await?;
    Ok(Json(CredentialsResponse {
        masked_client_secret: masked,
    }))
}

/// POST /oauth/disconnect
pub async fn post_oauth_disconnect(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let tenant_id = required_tenant(&headers)?;
    let ip = client_ip(&headers);
    state.oauth.disconnect(&tenant_id, ip.as_deref()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /settings/webhook-token
pub async fn post_rotate_webhook_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RotateTokenResponse>, ApiError> {
    let tenant_id = required_tenant(&headers)?;
    let webhook_token = state.pipeline.rotate_webhook_token(&tenant_id).await?;
    Ok(Json(RotateTokenResponse { webhook_token }))
}

/// POST /settings/relay
pub async fn post_relay_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RelaySettingsRequest>,
) -> Result<StatusCode, ApiError> {
    let tenant_id = required_tenant(&headers)?;
    state
        .pipeline
        .configure_relay(&tenant_id, body.relay_url.as_deref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /messages/send
pub async fn post_send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let tenant_id = required_tenant(&headers)?;
    let message = state
        .pipeline
        .send_outgoing(
            &tenant_id,
            &body.customer_id,
            &body.content,
            body.kind.unwrap_or(MessageKind::Text),
            body.media_url,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Assemble tenant-resolution hints from path, query, headers, and payload.
///
/// Precedence within each hint: path segment over `tenant_id` query over
/// `x-tenant-id` header; `shop` query over `x-store-domain` header.
pub(crate) fn resolution_hints(
    token_or_id: Option<String>,
    query: &HashMap<String, String>,
    headers: &HeaderMap,
    phone: Option<String>,
) -> ResolutionHints {
    let token_or_id = token_or_id
        .or_else(|| query.get("tenant_id").cloned())
        .or_else(|| header_value(headers, "x-tenant-id"))
        .filter(|v| !v.is_empty());
    let shop_domain = query
        .get("shop")
        .cloned()
        .or_else(|| header_value(headers, "x-store-domain"))
        .filter(|v| !v.is_empty());
    ResolutionHints {
        token_or_id,
        phone: phone.filter(|p| !p.is_empty()),
        shop_domain,
    }
}

fn required_tenant(headers: &HeaderMap) -> Result<String, OrdalinkError> {
    header_value(headers, "x-tenant-id")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| OrdalinkError::Validation("x-tenant-id header is required".to_string()))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Original client address; first entry of `x-forwarded-for` when present.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_value(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
        .filter(|ip| !ip.is_empty())
}
