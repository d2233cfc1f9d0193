// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The webhook ingestion pipeline.
//!
//! One entry point per inbound surface: chat messages, provider order sync,
//! and button actions, plus the outbound send path. Each entry resolves the
//! tenant, applies its durable writes, and broadcasts only after those writes
//! succeed. Webhook trace rows are best-effort and never fail the request.

use std::sync::Arc;

use tracing::{info, warn};

use ordalink_audit::AuditService;
use ordalink_config::model::WebhookConfig;
use ordalink_core::types::{
    new_id, now_rfc3339, Direction, Message, MessageKind, MessageStatus, Order, OrderStatus,
    Tenant, WebhookLogEntry,
};
use ordalink_core::OrdalinkError;
use ordalink_realtime::{Broadcaster, RealtimeEvent};
use ordalink_storage::{queries, Database};

use crate::orders::{OrderStateMachine, ReplyIntent};
use crate::payload::{
    ButtonAction, ButtonPayload, IncomingMessage, ProviderOrder, UNKNOWN_PHONE,
};
use crate::relay::{OutboundMessage, RelayClient};
use crate::resolver::{ResolutionHints, TenantResolver};
use crate::token::generate_webhook_token;
use crate::upsert::CustomerUpsertService;

/// Result of an order-sync delivery.
#[derive(Debug, Clone)]
pub enum OrderSyncOutcome {
    Created(Order),
    /// The event id was already processed; accepted with no new row.
    Duplicate,
}

/// Result of a button action.
#[derive(Debug, Clone)]
pub enum ButtonOutcome {
    OrderSettled(Order),
    SupportRequested(Message),
}

/// Orchestrates resolution, upsert, persistence, state machine, and fan-out.
pub struct WebhookIngestionPipeline {
    db: Arc<Database>,
    broadcaster: Arc<Broadcaster>,
    resolver: TenantResolver,
    customers: CustomerUpsertService,
    orders: OrderStateMachine,
    audit: AuditService,
    relay: RelayClient,
}

impl WebhookIngestionPipeline {
    pub fn new(
        db: Arc<Database>,
        broadcaster: Arc<Broadcaster>,
        audit: AuditService,
        config: &WebhookConfig,
    ) -> Result<Self, OrdalinkError> {
        Ok(Self {
            resolver: TenantResolver::new(db.clone(), config.allow_first_tenant_fallback),
            customers: CustomerUpsertService::new(db.clone(), broadcaster.clone()),
            orders: OrderStateMachine::new(db.clone(), broadcaster.clone()),
            relay: RelayClient::new(config.relay_timeout_secs)?,
            db,
            broadcaster,
            audit,
        })
    }

    /// Ingest one inbound chat message.
    ///
    /// Message persistence is unconditional and fatal on failure; the reply
    /// intent is applied afterwards against the customer's latest pending
    /// order.
    pub async fn ingest_message(
        &self,
        mut hints: ResolutionHints,
        payload: IncomingMessage,
    ) -> Result<Message, OrdalinkError> {
        let correlation_id = new_id();
        let phone = non_empty(payload.phone.as_deref())
            .ok_or_else(|| OrdalinkError::Validation("phone is required".to_string()))?
            .to_string();
        let content = non_empty(payload.content.as_deref())
            .ok_or_else(|| OrdalinkError::Validation("content is required".to_string()))?
            .to_string();

        if hints.phone.is_none() {
            hints.phone = Some(phone.clone());
        }
        let tenant = self.resolver.resolve(&hints).await?;

        let (customer, _created) = self
            .customers
            .find_or_create(&tenant.id, &phone, payload.name.as_deref())
            .await?;

        let message = Message {
            id: new_id(),
            customer_id: customer.id.clone(),
            content: content.clone(),
            kind: payload.kind.unwrap_or(MessageKind::Text),
            direction: Direction::Incoming,
            status: MessageStatus::Sent,
            media_url: payload.media_url.clone(),
            duration_secs: payload.duration_secs,
            created_at: now_rfc3339(),
        };
        queries::messages::insert_message(&self.db, &message).await?;

        self.customers.increment_unread(&customer.id).await?;
        self.broadcaster
            .publish(&tenant.id, &RealtimeEvent::MessageNew(message.clone()));

        let settled = match ReplyIntent::parse(&content) {
            Some(intent) => {
                self.orders
                    .apply_reply(&customer.id, &tenant.id, intent)
                    .await?
            }
            None => None,
        };

        self.trace(
            &tenant.id,
            &correlation_id,
            Direction::Incoming,
            "message",
            "success",
            None,
        )
        .await;
        if settled.is_some() {
            self.trace(
                &tenant.id,
                &correlation_id,
                Direction::Incoming,
                "order",
                "success",
                None,
            )
            .await;
        }
        info!(tenant = %tenant.id, customer = %customer.id, "message ingested");
        Ok(message)
    }

    /// Ingest one provider order-sync delivery.
    ///
    /// Deduped twice: by the `(source, external id)` idempotency key before
    /// any side effect, and again by the order table's unique index.
    pub async fn ingest_order(
        &self,
        hints: ResolutionHints,
        payload: ProviderOrder,
        source: &str,
    ) -> Result<OrderSyncOutcome, OrdalinkError> {
        let correlation_id = new_id();
        let tenant = self.resolver.resolve(&hints).await?;
        let normalized = payload.normalize();

        if let Some(external_id) = &normalized.external_order_id {
            let key = format!("{source}:{external_id}");
            let first_time =
                queries::webhook_logs::mark_processed(&self.db, &key, &tenant.id, source).await?;
            if !first_time {
                self.trace(
                    &tenant.id,
                    &correlation_id,
                    Direction::Incoming,
                    "order",
                    "duplicate",
                    None,
                )
                .await;
                info!(tenant = %tenant.id, key, "duplicate order delivery collapsed");
                return Ok(OrderSyncOutcome::Duplicate);
            }
        }

        let customer_id = if normalized.customer_phone != UNKNOWN_PHONE {
            let (customer, _) = self
                .customers
                .find_or_create(
                    &tenant.id,
                    &normalized.customer_phone,
                    Some(&normalized.customer_name),
                )
                .await?;
            Some(customer.id)
        } else {
            None
        };

        let order = Order {
            id: new_id(),
            tenant_id: tenant.id.clone(),
            customer_id,
            external_order_id: normalized.external_order_id.clone(),
            order_number: normalized.order_number.clone(),
            total: normalized.total,
            status: OrderStatus::Pending,
            customer_name: normalized.customer_name.clone(),
            customer_phone: normalized.customer_phone.clone(),
            items: normalized.items.clone(),
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
        };
        let (stored, _created) = self.orders.create(&order).await?;

        self.trace(
            &tenant.id,
            &correlation_id,
            Direction::Incoming,
            "order",
            "success",
            None,
        )
        .await;
        Ok(OrderSyncOutcome::Created(stored))
    }

    /// Handle a structured button / quick-reply action.
    pub async fn handle_button(
        &self,
        hints: ResolutionHints,
        payload: ButtonPayload,
    ) -> Result<ButtonOutcome, OrdalinkError> {
        let correlation_id = new_id();
        let tenant = self.resolver.resolve(&hints).await?;

        match payload.action {
            ButtonAction::Confirm | ButtonAction::Cancel => {
                let to = if payload.action == ButtonAction::Confirm {
                    OrderStatus::Confirmed
                } else {
                    OrderStatus::Cancelled
                };
                let order = self.settle_target(&tenant, &payload, to).await?;
                self.trace(
                    &tenant.id,
                    &correlation_id,
                    Direction::Incoming,
                    "button",
                    "success",
                    None,
                )
                .await;
                Ok(ButtonOutcome::OrderSettled(order))
            }
            ButtonAction::Support => {
                let phone = non_empty(payload.phone.as_deref()).ok_or_else(|| {
                    OrdalinkError::Validation("phone is required for support requests".to_string())
                })?;
                let (customer, _) = self
                    .customers
                    .find_or_create(&tenant.id, phone, None)
                    .await?;
                let message = Message {
                    id: new_id(),
                    customer_id: customer.id.clone(),
                    content: "Customer requested support".to_string(),
                    kind: MessageKind::Text,
                    direction: Direction::Incoming,
                    status: MessageStatus::Sent,
                    media_url: None,
                    duration_secs: None,
                    created_at: now_rfc3339(),
                };
                queries::messages::insert_message(&self.db, &message).await?;
                self.customers.increment_unread(&customer.id).await?;
                self.broadcaster
                    .publish(&tenant.id, &RealtimeEvent::MessageNew(message.clone()));
                self.trace(
                    &tenant.id,
                    &correlation_id,
                    Direction::Incoming,
                    "button",
                    "success",
                    None,
                )
                .await;
                Ok(ButtonOutcome::SupportRequested(message))
            }
        }
    }

    /// Persist and relay one operator-sent message.
    ///
    /// The message row always lands; relay failure downgrades its status to
    /// `failed` and is otherwise non-fatal.
    pub async fn send_outgoing(
        &self,
        tenant_id: &str,
        customer_id: &str,
        content: &str,
        kind: MessageKind,
        media_url: Option<String>,
    ) -> Result<Message, OrdalinkError> {
        let correlation_id = new_id();
        let tenant = queries::tenants::get_tenant(&self.db, tenant_id)
            .await?
            .ok_or(OrdalinkError::NotFoundOrUnauthorized { entity: "tenant" })?;
        let customer = self
            .customers
            .get(customer_id, tenant_id)
            .await?
            .ok_or(OrdalinkError::NotFoundOrUnauthorized { entity: "customer" })?;

        let mut message = Message {
            id: new_id(),
            customer_id: customer.id.clone(),
            content: content.to_string(),
            kind,
            direction: Direction::Outgoing,
            status: MessageStatus::Sending,
            media_url,
            duration_secs: None,
            created_at: now_rfc3339(),
        };
        queries::messages::insert_message(&self.db, &message).await?;
        self.broadcaster
            .publish(tenant_id, &RealtimeEvent::MessageNew(message.clone()));

        let final_status = match &tenant.relay_url {
            Some(url) => {
                let outbound = OutboundMessage {
                    phone: customer.phone_number.clone(),
                    content: message.content.clone(),
                    kind: message.kind,
                    media_url: message.media_url.clone(),
                    timestamp: message.created_at.clone(),
                };
                match self.relay.forward(url, &outbound).await {
                    Ok(()) => MessageStatus::Sent,
                    Err(e) => {
                        warn!(error = %e, tenant = %tenant_id, "relay delivery failed");
                        self.trace(
                            tenant_id,
                            &correlation_id,
                            Direction::Outgoing,
                            "message",
                            "failed",
                            Some(e.to_string()),
                        )
                        .await;
                        MessageStatus::Failed
                    }
                }
            }
            // No relay configured: local-only delivery.
            None => MessageStatus::Sent,
        };

        queries::messages::update_status(&self.db, &message.id, tenant_id, final_status).await?;
        message.status = final_status;
        self.broadcaster.publish(
            tenant_id,
            &RealtimeEvent::MessageStatus {
                id: message.id.clone(),
                status: final_status,
            },
        );
        if final_status != MessageStatus::Failed {
            self.trace(
                tenant_id,
                &correlation_id,
                Direction::Outgoing,
                "message",
                "success",
                None,
            )
            .await;
        }
        Ok(message)
    }

    /// Issue or rotate the tenant's inbound webhook token.
    ///
    /// The old token stops resolving the moment the update lands; the caller
    /// must hand the returned token to the operator now, it is not readable
    /// again through this path.
    pub async fn rotate_webhook_token(&self, tenant_id: &str) -> Result<String, OrdalinkError> {
        let token = generate_webhook_token();
        queries::tenants::set_webhook_token(&self.db, tenant_id, &token).await?;
        self.audit
            .log_account_change(tenant_id, "webhook_token_rotated", None, None)
            .await;
        Ok(token)
    }

    /// Set or clear the tenant's outbound relay URL. Empty strings clear.
    pub async fn configure_relay(
        &self,
        tenant_id: &str,
        relay_url: Option<&str>,
    ) -> Result<(), OrdalinkError> {
        let relay_url = relay_url.map(str::trim).filter(|u| !u.is_empty());
        if let Some(url) = relay_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(OrdalinkError::Validation(
                    "relay_url must be an http(s) URL".to_string(),
                ));
            }
        }
        queries::tenants::set_relay_url(&self.db, tenant_id, relay_url).await?;
        self.audit
            .log_account_change(tenant_id, "relay_url_updated", None, None)
            .await;
        Ok(())
    }

    /// Audit-trail reader, exposed for the gateway.
    pub fn audit(&self) -> &AuditService {
        &self.audit
    }

    async fn settle_target(
        &self,
        tenant: &Tenant,
        payload: &ButtonPayload,
        to: OrderStatus,
    ) -> Result<Order, OrdalinkError> {
        if let Some(order_id) = &payload.order_id {
            return self.orders.transition(order_id, &tenant.id, to).await;
        }
        let phone = non_empty(payload.phone.as_deref()).ok_or_else(|| {
            OrdalinkError::Validation("phone or order_id is required".to_string())
        })?;
        let customer = queries::customers::find_by_phone(&self.db, &tenant.id, phone)
            .await?
            .ok_or(OrdalinkError::NotFoundOrUnauthorized { entity: "customer" })?;
        let pending = queries::orders::latest_pending_for_customer(&self.db, &customer.id)
            .await?
            .ok_or(OrdalinkError::NotFoundOrUnauthorized { entity: "order" })?;
        self.orders.transition(&pending.id, &tenant.id, to).await
    }

    /// Best-effort webhook trace row. Every row of one pipeline invocation
    /// carries that invocation's correlation id so the rows group together.
    async fn trace(
        &self,
        tenant_id: &str,
        correlation_id: &str,
        direction: Direction,
        event_type: &str,
        status: &str,
        error: Option<String>,
    ) {
        let entry = WebhookLogEntry {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            direction,
            event_type: event_type.to_string(),
            status: status.to_string(),
            correlation_id: correlation_id.to_string(),
            payload: None,
            error,
            created_at: now_rfc3339(),
        };
        if let Err(e) = queries::webhook_logs::insert_log(&self.db, &entry).await {
            tracing::error!(error = %e, "webhook trace write failed");
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
