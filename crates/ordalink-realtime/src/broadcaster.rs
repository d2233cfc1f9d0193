// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-tenant broadcast topics.

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::trace;

use crate::events::RealtimeEvent;

/// Events buffered per topic before slow subscribers start lagging. A lagged
/// subscriber is disconnected by the gateway rather than stalling publishers.
const CHANNEL_CAPACITY: usize = 256;

/// Fans events out to websocket subscribers, one topic per tenant.
///
/// Publishing to a tenant with no subscribers is a no-op. Cross-tenant
/// delivery is impossible by construction: a subscription is keyed by the
/// tenant id established during connection auth.
#[derive(Default)]
pub struct Broadcaster {
    topics: DashMap<String, broadcast::Sender<String>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize and deliver an event to every subscriber of `tenant_id`.
    /// Never blocks, never fails the caller.
    pub fn publish(&self, tenant_id: &str, event: &RealtimeEvent) {
        let Some(tx) = self.topics.get(tenant_id) else {
            return;
        };
        match serde_json::to_string(event) {
            Ok(json) => {
                // Err means zero receivers; nothing to do.
                let delivered = tx.send(json).unwrap_or(0);
                trace!(tenant = tenant_id, delivered, "event published");
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize realtime event");
            }
        }
    }

    /// Subscribe to one tenant's topic, creating it on first use.
    pub fn subscribe(&self, tenant_id: &str) -> broadcast::Receiver<String> {
        self.topics
            .entry(tenant_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Number of live subscribers on a tenant's topic.
    pub fn subscriber_count(&self, tenant_id: &str) -> usize {
        self.topics
            .get(tenant_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RealtimeEvent;

    fn stats_event(total: i64) -> RealtimeEvent {
        RealtimeEvent::StatsUpdate {
            unread_total: total,
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let b = Broadcaster::new();
        let mut rx = b.subscribe("t1");

        b.publish("t1", &stats_event(3));

        let json = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "stats:update");
        assert_eq!(value["data"]["unread_total"], 3);
    }

    #[tokio::test]
    async fn tenants_never_see_each_others_events() {
        let b = Broadcaster::new();
        let mut rx_t1 = b.subscribe("t1");
        let mut rx_t2 = b.subscribe("t2");

        b.publish("t1", &stats_event(1));

        assert!(rx_t1.recv().await.is_ok());
        assert!(
            rx_t2.try_recv().is_err(),
            "t2 must not receive t1's events"
        );
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_noop() {
        let b = Broadcaster::new();
        // Must not panic or create a topic.
        b.publish("ghost", &stats_event(0));
        assert_eq!(b.subscriber_count("ghost"), 0);
    }

    #[tokio::test]
    async fn multiple_subscribers_all_receive() {
        let b = Broadcaster::new();
        let mut rx1 = b.subscribe("t1");
        let mut rx2 = b.subscribe("t1");
        assert_eq!(b.subscriber_count("t1"), 2);

        b.publish("t1", &stats_event(7));

        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }
}
