// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire-level event envelope: `{"event": "<name>", "data": {...}}`.

use serde::Serialize;

use ordalink_core::types::{Customer, Message, MessageStatus, Order};

/// What happened to an order, carried alongside the full order payload so
/// clients need no follow-up fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderEventAction {
    Created,
    Updated,
}

/// One realtime event as delivered to websocket clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum RealtimeEvent {
    #[serde(rename = "customer:new")]
    CustomerNew(Customer),
    #[serde(rename = "customer:updated")]
    CustomerUpdated(Customer),
    #[serde(rename = "customer:deleted")]
    CustomerDeleted { id: String },
    /// Operator opened the conversation; unread counter was reset.
    #[serde(rename = "customer:read")]
    CustomerRead(Customer),
    #[serde(rename = "message:new")]
    MessageNew(Message),
    #[serde(rename = "message:status")]
    MessageStatus { id: String, status: MessageStatus },
    #[serde(rename = "order:update")]
    OrderUpdate {
        order: Order,
        action: OrderEventAction,
    },
    #[serde(rename = "stats:update")]
    StatsUpdate { unread_total: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordalink_core::types::{new_id, now_rfc3339, OrderStatus};

    fn sample_order() -> Order {
        Order {
            id: new_id(),
            tenant_id: "t1".to_string(),
            customer_id: None,
            external_order_id: Some("shop-1".to_string()),
            order_number: "#1001".to_string(),
            total: 10.0,
            status: OrderStatus::Confirmed,
            customer_name: "Ali".to_string(),
            customer_phone: "+100".to_string(),
            items: None,
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
        }
    }

    #[test]
    fn envelope_has_event_and_data_keys() {
        let event = RealtimeEvent::OrderUpdate {
            order: sample_order(),
            action: OrderEventAction::Updated,
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(json["event"], "order:update");
        assert_eq!(json["data"]["action"], "updated");
        assert_eq!(json["data"]["order"]["order_number"], "#1001");
        assert_eq!(json["data"]["order"]["status"], "confirmed");
    }

    #[test]
    fn deletion_event_carries_only_the_id() {
        let event = RealtimeEvent::CustomerDeleted {
            id: "c-9".to_string(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(json["event"], "customer:deleted");
        assert_eq!(json["data"]["id"], "c-9");
    }

    #[test]
    fn message_status_event_serializes_lowercase() {
        let event = RealtimeEvent::MessageStatus {
            id: "m-1".to_string(),
            status: MessageStatus::Delivered,
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(json["event"], "message:status");
        assert_eq!(json["data"]["status"], "delivered");
    }
}
