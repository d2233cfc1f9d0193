// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types shared across the Ordalink workspace.
//!
//! Timestamps are RFC 3339 strings throughout; SQLite stores them as TEXT and
//! lexicographic order matches chronological order for this format.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// An account/store owner. Owns customers, orders, audit rows, OAuth states.
///
/// `store_client_secret` and `store_access_token` hold vault ciphertext, never
/// plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub email: String,
    /// Opaque per-tenant webhook credential (`whk_` + 16 hex chars). Unique
    /// across all tenants.
    pub webhook_token: Option<String>,
    pub store_domain: Option<String>,
    pub store_client_id: Option<String>,
    pub store_client_secret: Option<String>,
    pub store_access_token: Option<String>,
    /// Outbound relay URL for operator-sent messages. `None` disables relay.
    pub relay_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// An end-user contact, scoped to one tenant by phone number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub tenant_id: String,
    pub phone_number: String,
    pub name: Option<String>,
    pub unread_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Message content type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Voice,
}

/// Message direction relative to the tenant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// Message delivery status. The only mutable field of a persisted message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sending,
    Sent,
    Delivered,
    Read,
    Failed,
}

/// A chat message. Immutable once created, except `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub customer_id: String,
    pub content: String,
    pub kind: MessageKind,
    pub direction: Direction,
    pub status: MessageStatus,
    pub media_url: Option<String>,
    pub duration_secs: Option<i64>,
    pub created_at: String,
}

/// Order lifecycle state. `Confirmed` and `Cancelled` are terminal and
/// immutable; transitions only move out of `Pending`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl OrderStatus {
    /// Whether this state admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Cancelled)
    }
}

/// An e-commerce order synced from the store provider.
///
/// `customer_name`/`customer_phone` are denormalized at creation time so the
/// order display never depends on a customer join; deleting a customer still
/// cascades to their orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub tenant_id: String,
    pub customer_id: Option<String>,
    pub external_order_id: Option<String>,
    pub order_number: String,
    pub total: f64,
    pub status: OrderStatus,
    pub customer_name: String,
    pub customer_phone: String,
    /// Raw line-items JSON blob as received from the provider.
    pub items: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A pending OAuth CSRF state. Single-use, 15-minute TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthState {
    pub id: String,
    pub tenant_id: String,
    pub state: String,
    pub expires_at: String,
}

/// Sentinel actor for audit rows written outside any authenticated context.
pub const SYSTEM_ACTOR: &str = "system";

/// An append-only audit log row. Never mutated or deleted except by tenant
/// cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    /// Tenant id, or [`SYSTEM_ACTOR`] when unauthenticated.
    pub actor: String,
    pub action: String,
    pub ip_address: Option<String>,
    pub metadata: Option<String>,
    pub created_at: String,
}

/// A webhook trace row. Multiple rows may share one `correlation_id` across
/// retries and fan-out of a single logical request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookLogEntry {
    pub id: String,
    pub tenant_id: String,
    pub direction: Direction,
    pub event_type: String,
    pub status: String,
    pub correlation_id: String,
    pub payload: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
}

/// Current UTC time as an RFC 3339 string with millisecond precision.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Fresh random UUID v4 string, used as the primary key for all entities.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
