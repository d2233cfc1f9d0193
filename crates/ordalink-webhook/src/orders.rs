// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Order lifecycle and the text-driven state machine.
//!
//! `pending -> {confirmed, cancelled}`; both terminal states are immutable.
//! The transition itself is a conditional update in storage, so concurrent
//! duplicate replies settle the order exactly once. Broadcasts fire only
//! after the durable write.

use std::sync::Arc;

use tracing::info;

use ordalink_core::types::{Order, OrderStatus};
use ordalink_core::OrdalinkError;
use ordalink_realtime::{Broadcaster, OrderEventAction, RealtimeEvent};
use ordalink_storage::{queries, Database};

/// Keyword sets matched by substring containment against lowercased,
/// trimmed message content.
const CONFIRM_KEYWORDS: [&str; 4] = ["confirm", "تأكيد", "موافق", "نعم"];
const CANCEL_KEYWORDS: [&str; 4] = ["cancel", "إلغاء", "لا", "رفض"];

/// What a free-text reply asks for, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyIntent {
    Confirm,
    Cancel,
}

impl ReplyIntent {
    /// Parse message content into an intent. Confirm keywords win over
    /// cancel keywords when both appear.
    pub fn parse(content: &str) -> Option<Self> {
        let normalized = content.trim().to_lowercase();
        if CONFIRM_KEYWORDS.iter().any(|k| normalized.contains(k)) {
            return Some(Self::Confirm);
        }
        if CANCEL_KEYWORDS.iter().any(|k| normalized.contains(k)) {
            return Some(Self::Cancel);
        }
        None
    }

    fn target_status(self) -> OrderStatus {
        match self {
            Self::Confirm => OrderStatus::Confirmed,
            Self::Cancel => OrderStatus::Cancelled,
        }
    }
}

/// Order creation and transitions, with realtime notification.
pub struct OrderStateMachine {
    db: Arc<Database>,
    broadcaster: Arc<Broadcaster>,
}

impl OrderStateMachine {
    pub fn new(db: Arc<Database>, broadcaster: Arc<Broadcaster>) -> Self {
        Self { db, broadcaster }
    }

    /// Insert an order, deduplicating on `(tenant, external id)`. Emits
    /// `order:update (action=created)` only when this call created the row;
    /// a redelivered provider event is acknowledged without a second event.
    pub async fn create(&self, order: &Order) -> Result<(Order, bool), OrdalinkError> {
        let (stored, created) = queries::orders::create_order(&self.db, order).await?;
        if created {
            self.broadcaster.publish(
                &stored.tenant_id,
                &RealtimeEvent::OrderUpdate {
                    order: stored.clone(),
                    action: OrderEventAction::Created,
                },
            );
        }
        Ok((stored, created))
    }

    /// Transition an order out of `pending`. Tenant ownership is re-checked
    /// inside the conditional update; emits `order:update (action=updated)`
    /// only after durable success.
    pub async fn transition(
        &self,
        order_id: &str,
        tenant_id: &str,
        to: OrderStatus,
    ) -> Result<Order, OrdalinkError> {
        let order = queries::orders::transition(&self.db, order_id, tenant_id, to).await?;
        info!(order = %order.id, status = %order.status, "order transitioned");
        self.broadcaster.publish(
            tenant_id,
            &RealtimeEvent::OrderUpdate {
                order: order.clone(),
                action: OrderEventAction::Updated,
            },
        );
        Ok(order)
    }

    /// Apply a parsed reply intent to the customer's most recent `pending`
    /// order.
    ///
    /// No pending order is a no-op: either the customer has no orders at all
    /// or their latest order already settled, and a stray keyword in later
    /// chatter must not error or reopen anything.
    pub async fn apply_reply(
        &self,
        customer_id: &str,
        tenant_id: &str,
        intent: ReplyIntent,
    ) -> Result<Option<Order>, OrdalinkError> {
        let Some(pending) =
            queries::orders::latest_pending_for_customer(&self.db, customer_id).await?
        else {
            return Ok(None);
        };
        let order = self
            .transition(&pending.id, tenant_id, intent.target_status())
            .await?;
        Ok(Some(order))
    }

    /// Tenant-scoped lookup.
    pub async fn get(
        &self,
        order_id: &str,
        tenant_id: &str,
    ) -> Result<Option<Order>, OrdalinkError> {
        queries::orders::get_order(&self.db, order_id, tenant_id).await
    }
}
