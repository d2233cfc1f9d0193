// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Customer upsert and lifecycle, with realtime notification.
//!
//! Broadcasts always happen after the durable write, and only for the write
//! that actually happened: a `find_or_create` that found an existing row
//! emits nothing.

use std::sync::Arc;

use ordalink_core::types::Customer;
use ordalink_core::OrdalinkError;
use ordalink_realtime::{Broadcaster, RealtimeEvent};
use ordalink_storage::{queries, Database};

/// Tenant-scoped customer operations.
pub struct CustomerUpsertService {
    db: Arc<Database>,
    broadcaster: Arc<Broadcaster>,
}

impl CustomerUpsertService {
    pub fn new(db: Arc<Database>, broadcaster: Arc<Broadcaster>) -> Self {
        Self { db, broadcaster }
    }

    /// Find or create the customer for `(tenant, phone)`. Emits
    /// `customer:new` only when this call created the row.
    pub async fn find_or_create(
        &self,
        tenant_id: &str,
        phone_number: &str,
        name: Option<&str>,
    ) -> Result<(Customer, bool), OrdalinkError> {
        let (customer, created) =
            queries::customers::find_or_create(&self.db, tenant_id, phone_number, name).await?;
        if created {
            self.broadcaster
                .publish(tenant_id, &RealtimeEvent::CustomerNew(customer.clone()));
        }
        Ok((customer, created))
    }

    /// Bump the unread counter; emits `customer:updated` and a refreshed
    /// `stats:update`.
    pub async fn increment_unread(&self, customer_id: &str) -> Result<Customer, OrdalinkError> {
        let customer = queries::customers::increment_unread(&self.db, customer_id).await?;
        self.broadcaster.publish(
            &customer.tenant_id,
            &RealtimeEvent::CustomerUpdated(customer.clone()),
        );
        self.publish_stats(&customer.tenant_id).await;
        Ok(customer)
    }

    /// Reset the unread counter (operator opened the conversation); emits
    /// `customer:read` and a refreshed `stats:update`.
    pub async fn reset_unread(
        &self,
        customer_id: &str,
        tenant_id: &str,
    ) -> Result<Customer, OrdalinkError> {
        let customer = queries::customers::reset_unread(&self.db, customer_id, tenant_id).await?;
        self.broadcaster
            .publish(tenant_id, &RealtimeEvent::CustomerRead(customer.clone()));
        self.publish_stats(tenant_id).await;
        Ok(customer)
    }

    /// Tenant-wide unread total, pushed so dashboards need no poll. Failures
    /// only cost the event.
    async fn publish_stats(&self, tenant_id: &str) {
        match queries::customers::total_unread(&self.db, tenant_id).await {
            Ok(total) => self.broadcaster.publish(
                tenant_id,
                &RealtimeEvent::StatsUpdate {
                    unread_total: total,
                },
            ),
            Err(e) => tracing::warn!(error = %e, "unread total query failed"),
        }
    }

    /// Operator renamed a contact; emits `customer:updated`.
    pub async fn rename(
        &self,
        customer_id: &str,
        tenant_id: &str,
        name: &str,
    ) -> Result<Customer, OrdalinkError> {
        let customer =
            queries::customers::rename_customer(&self.db, customer_id, tenant_id, name).await?;
        self.broadcaster
            .publish(tenant_id, &RealtimeEvent::CustomerUpdated(customer.clone()));
        Ok(customer)
    }

    /// Tenant-scoped lookup.
    pub async fn get(
        &self,
        customer_id: &str,
        tenant_id: &str,
    ) -> Result<Option<Customer>, OrdalinkError> {
        queries::customers::get_customer(&self.db, customer_id, tenant_id).await
    }

    /// Delete a customer. A missing or foreign id yields the single merged
    /// not-found-or-unauthorized error so cross-tenant existence never leaks.
    /// Emits `customer:deleted` on success.
    pub async fn delete(&self, customer_id: &str, tenant_id: &str) -> Result<(), OrdalinkError> {
        queries::customers::delete_customer(&self.db, customer_id, tenant_id).await?;
        self.broadcaster.publish(
            tenant_id,
            &RealtimeEvent::CustomerDeleted {
                id: customer_id.to_string(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordalink_config::model::StorageConfig;
    use ordalink_core::types::Tenant;
    use tempfile::tempdir;

    async fn setup() -> (
        CustomerUpsertService,
        Arc<Broadcaster>,
        tempfile::TempDir,
    ) {
        let dir = tempdir().unwrap();
        let config = StorageConfig {
            database_path: dir.path().join("upsert.db").to_str().unwrap().to_string(),
            wal_mode: true,
        };
        let db = Arc::new(Database::open(&config).await.unwrap());
        for (id, email) in [("t1", "a@example.com"), ("t2", "b@example.com")] {
            queries::tenants::create_tenant(
                &db,
                &Tenant {
                    id: id.to_string(),
                    email: email.to_string(),
                    webhook_token: None,
                    store_domain: None,
                    store_client_id: None,
                    store_client_secret: None,
                    store_access_token: None,
                    relay_url: None,
                    created_at: "2026-01-01T00:00:00.000Z".to_string(),
                    updated_at: "2026-01-01T00:00:00.000Z".to_string(),
                },
            )
            .await
            .unwrap();
        }
        let broadcaster = Arc::new(Broadcaster::new());
        (
            CustomerUpsertService::new(db, broadcaster.clone()),
            broadcaster,
            dir,
        )
    }

    fn event_name(json: &str) -> String {
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        value["event"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn creation_broadcasts_customer_new_once() {
        let (svc, broadcaster, _dir) = setup().await;
        let mut rx = broadcaster.subscribe("t1");

        let (_, created) = svc.find_or_create("t1", "+100", None).await.unwrap();
        assert!(created);
        assert_eq!(event_name(&rx.recv().await.unwrap()), "customer:new");

        // Second contact: no event.
        let (_, created) = svc.find_or_create("t1", "+100", None).await.unwrap();
        assert!(!created);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn counter_events_follow_durable_writes() {
        let (svc, broadcaster, _dir) = setup().await;
        let (customer, _) = svc.find_or_create("t1", "+100", None).await.unwrap();
        let mut rx = broadcaster.subscribe("t1");

        let bumped = svc.increment_unread(&customer.id).await.unwrap();
        assert_eq!(bumped.unread_count, 1);
        assert_eq!(event_name(&rx.recv().await.unwrap()), "customer:updated");
        let stats = rx.recv().await.unwrap();
        assert_eq!(event_name(&stats), "stats:update");
        let value: serde_json::Value = serde_json::from_str(&stats).unwrap();
        assert_eq!(value["data"]["unread_total"], 1);

        let read = svc.reset_unread(&customer.id, "t1").await.unwrap();
        assert_eq!(read.unread_count, 0);
        assert_eq!(event_name(&rx.recv().await.unwrap()), "customer:read");
        let stats = rx.recv().await.unwrap();
        assert_eq!(event_name(&stats), "stats:update");
        let value: serde_json::Value = serde_json::from_str(&stats).unwrap();
        assert_eq!(value["data"]["unread_total"], 0);
    }

    #[tokio::test]
    async fn delete_is_tenant_scoped_and_broadcasts() {
        let (svc, broadcaster, _dir) = setup().await;
        let (customer, _) = svc.find_or_create("t1", "+100", None).await.unwrap();
        let mut rx = broadcaster.subscribe("t1");

        // Foreign tenant: merged error, no event.
        let err = svc.delete(&customer.id, "t2").await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND_OR_UNAUTHORIZED");
        assert!(rx.try_recv().is_err());

        svc.delete(&customer.id, "t1").await.unwrap();
        assert_eq!(event_name(&rx.recv().await.unwrap()), "customer:deleted");
    }

    #[tokio::test]
    async fn rename_broadcasts_updated() {
        let (svc, broadcaster, _dir) = setup().await;
        let (customer, _) = svc.find_or_create("t1", "+100", None).await.unwrap();
        let mut rx = broadcaster.subscribe("t1");

        let renamed = svc.rename(&customer.id, "t1", "Mona").await.unwrap();
        assert_eq!(renamed.name.as_deref(), Some("Mona"));
        assert_eq!(event_name(&rx.recv().await.unwrap()), "customer:updated");
    }
}
