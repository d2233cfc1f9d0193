// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Customer upsert and unread-counter operations.
//!
//! `find_or_create` and the counter updates are single atomic statements (or
//! insert-then-select on one serialized connection) so concurrent webhook
//! deliveries for the same phone number cannot duplicate a customer or lose
//! counter increments.

use rusqlite::{params, OptionalExtension};

use ordalink_core::types::{new_id, now_rfc3339, Customer};
use ordalink_core::OrdalinkError;

use crate::database::{map_tr_err, Database};

const CUSTOMER_COLUMNS: &str =
    "id, tenant_id, phone_number, name, unread_count, created_at, updated_at";

fn map_customer_row(row: &rusqlite::Row<'_>) -> Result<Customer, rusqlite::Error> {
    Ok(Customer {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        phone_number: row.get(2)?,
        name: row.get(3)?,
        unread_count: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Find the customer for `(tenant_id, phone_number)`, creating it if absent.
///
/// Returns the customer and whether this call created it. Duplicate inserts
/// racing on the unique key resolve via `ON CONFLICT DO NOTHING`; the loser
/// re-reads the winner's row.
pub async fn find_or_create(
    db: &Database,
    tenant_id: &str,
    phone_number: &str,
    name: Option<&str>,
) -> Result<(Customer, bool), OrdalinkError> {
    let tenant_id = tenant_id.to_string();
    let phone_number = phone_number.to_string();
    let name = name.map(String::from);
    let id = new_id();
    let now = now_rfc3339();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO customers
                   (id, tenant_id, phone_number, name, unread_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
                 ON CONFLICT(tenant_id, phone_number) DO NOTHING",
                params![id, tenant_id, phone_number, name, now],
            )?;
            let customer = conn.query_row(
                &format!(
                    "SELECT {CUSTOMER_COLUMNS} FROM customers
                     WHERE tenant_id = ?1 AND phone_number = ?2"
                ),
                params![tenant_id, phone_number],
                map_customer_row,
            )?;
            Ok((customer, inserted > 0))
        })
        .await
        .map_err(map_tr_err)
}

/// Get a customer by id, scoped to its tenant.
pub async fn get_customer(
    db: &Database,
    id: &str,
    tenant_id: &str,
) -> Result<Option<Customer>, OrdalinkError> {
    let id = id.to_string();
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let customer = conn
                .query_row(
                    &format!(
                        "SELECT {CUSTOMER_COLUMNS} FROM customers
                         WHERE id = ?1 AND tenant_id = ?2"
                    ),
                    params![id, tenant_id],
                    map_customer_row,
                )
                .optional()?;
            Ok(customer)
        })
        .await
        .map_err(map_tr_err)
}

/// All customers for a tenant, most recently active first.
pub async fn list_customers(
    db: &Database,
    tenant_id: &str,
) -> Result<Vec<Customer>, OrdalinkError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CUSTOMER_COLUMNS} FROM customers
                 WHERE tenant_id = ?1
                 ORDER BY updated_at DESC"
            ))?;
            let rows = stmt.query_map(params![tenant_id], map_customer_row)?;
            let mut customers = Vec::new();
            for row in rows {
                customers.push(row?);
            }
            Ok(customers)
        })
        .await
        .map_err(map_tr_err)
}

/// Find an existing customer by phone within one tenant, without creating.
pub async fn find_by_phone(
    db: &Database,
    tenant_id: &str,
    phone_number: &str,
) -> Result<Option<Customer>, OrdalinkError> {
    let tenant_id = tenant_id.to_string();
    let phone_number = phone_number.to_string();
    db.connection()
        .call(move |conn| {
            let customer = conn
                .query_row(
                    &format!(
                        "SELECT {CUSTOMER_COLUMNS} FROM customers
                         WHERE tenant_id = ?1 AND phone_number = ?2"
                    ),
                    params![tenant_id, phone_number],
                    map_customer_row,
                )
                .optional()?;
            Ok(customer)
        })
        .await
        .map_err(map_tr_err)
}

/// Find any customer with this phone number across all tenants, earliest
/// created first. Used only by webhook tenant resolution.
pub async fn find_by_phone_any_tenant(
    db: &Database,
    phone_number: &str,
) -> Result<Option<Customer>, OrdalinkError> {
    let phone_number = phone_number.to_string();
    db.connection()
        .call(move |conn| {
            let customer = conn
                .query_row(
                    &format!(
                        "SELECT {CUSTOMER_COLUMNS} FROM customers
                         WHERE phone_number = ?1
                         ORDER BY created_at ASC LIMIT 1"
                    ),
                    params![phone_number],
                    map_customer_row,
                )
                .optional()?;
            Ok(customer)
        })
        .await
        .map_err(map_tr_err)
}

/// Bump the unread counter by one and return the updated customer.
///
/// The increment is relative (`unread_count + 1`), never a write of a value
/// read earlier, so concurrent bumps all land.
pub async fn increment_unread(db: &Database, id: &str) -> Result<Customer, OrdalinkError> {
    let id = id.to_string();
    let now = now_rfc3339();
    let customer = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE customers
                 SET unread_count = unread_count + 1, updated_at = ?1
                 WHERE id = ?2",
                params![now, id],
            )?;
            let customer = conn
                .query_row(
                    &format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"),
                    params![id],
                    map_customer_row,
                )
                .optional()?;
            Ok(customer)
        })
        .await
        .map_err(map_tr_err)?;
    customer.ok_or(OrdalinkError::NotFoundOrUnauthorized { entity: "customer" })
}

/// Reset the unread counter to zero (operator opened the conversation).
pub async fn reset_unread(
    db: &Database,
    id: &str,
    tenant_id: &str,
) -> Result<Customer, OrdalinkError> {
    let id = id.to_string();
    let tenant_id = tenant_id.to_string();
    let now = now_rfc3339();
    let customer = db
        .connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE customers SET unread_count = 0, updated_at = ?1
                 WHERE id = ?2 AND tenant_id = ?3",
                params![now, id, tenant_id],
            )?;
            if n == 0 {
                return Ok(None);
            }
            let customer = conn
                .query_row(
                    &format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"),
                    params![id],
                    map_customer_row,
                )
                .optional()?;
            Ok(customer)
        })
        .await
        .map_err(map_tr_err)?;
    customer.ok_or(OrdalinkError::NotFoundOrUnauthorized { entity: "customer" })
}

/// Sum of unread counters across a tenant's customers.
pub async fn total_unread(db: &Database, tenant_id: &str) -> Result<i64, OrdalinkError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let total = conn.query_row(
                "SELECT COALESCE(SUM(unread_count), 0) FROM customers WHERE tenant_id = ?1",
                params![tenant_id],
                |row| row.get(0),
            )?;
            Ok(total)
        })
        .await
        .map_err(map_tr_err)
}

/// Rename a customer, scoped to its tenant.
pub async fn rename_customer(
    db: &Database,
    id: &str,
    tenant_id: &str,
    name: &str,
) -> Result<Customer, OrdalinkError> {
    let id = id.to_string();
    let tenant_id = tenant_id.to_string();
    let name = name.to_string();
    let now = now_rfc3339();
    let customer = db
        .connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE customers SET name = ?1, updated_at = ?2
                 WHERE id = ?3 AND tenant_id = ?4",
                params![name, now, id, tenant_id],
            )?;
            if n == 0 {
                return Ok(None);
            }
            let customer = conn
                .query_row(
                    &format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"),
                    params![id],
                    map_customer_row,
                )
                .optional()?;
            Ok(customer)
        })
        .await
        .map_err(map_tr_err)?;
    customer.ok_or(OrdalinkError::NotFoundOrUnauthorized { entity: "customer" })
}

/// Delete a customer, scoped to its tenant. Messages and orders cascade with
/// the row.
pub async fn delete_customer(
    db: &Database,
    id: &str,
    tenant_id: &str,
) -> Result<(), OrdalinkError> {
    let id = id.to_string();
    let tenant_id = tenant_id.to_string();
    let changed = db
        .connection()
        .call(move |conn| {
            let n = conn.execute(
                "DELETE FROM customers WHERE id = ?1 AND tenant_id = ?2",
                params![id, tenant_id],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(OrdalinkError::NotFoundOrUnauthorized { entity: "customer" });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::tenants::tests::{make_tenant, open_test_db};
    use crate::queries::tenants::create_tenant;

    async fn setup_two_tenants() -> (Database, tempfile::TempDir) {
        let (db, dir) = open_test_db().await;
        create_tenant(&db, &make_tenant("t1", "a@example.com", None))
            .await
            .unwrap();
        create_tenant(&db, &make_tenant("t2", "b@example.com", None))
            .await
            .unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn find_or_create_creates_then_reuses() {
        let (db, _dir) = setup_two_tenants().await;

        let (c1, created1) = find_or_create(&db, "t1", "+201234567890", None)
            .await
            .unwrap();
        assert!(created1);
        assert_eq!(c1.phone_number, "+201234567890");
        assert_eq!(c1.unread_count, 0);

        let (c2, created2) = find_or_create(&db, "t1", "+201234567890", Some("Ali"))
            .await
            .unwrap();
        assert!(!created2);
        assert_eq!(c2.id, c1.id);
        // A later name hint does not overwrite the existing row.
        assert_eq!(c2.name, None);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn same_phone_different_tenants_are_distinct() {
        let (db, _dir) = setup_two_tenants().await;

        let (c1, _) = find_or_create(&db, "t1", "+100", None).await.unwrap();
        let (c2, created) = find_or_create(&db, "t2", "+100", None).await.unwrap();
        assert!(created, "same phone under another tenant is a new customer");
        assert_ne!(c1.id, c2.id);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn tenant_scoping_hides_other_tenants_customers() {
        let (db, _dir) = setup_two_tenants().await;
        let (c, _) = find_or_create(&db, "t1", "+100", None).await.unwrap();

        assert!(get_customer(&db, &c.id, "t1").await.unwrap().is_some());
        assert!(get_customer(&db, &c.id, "t2").await.unwrap().is_none());

        let err = reset_unread(&db, &c.id, "t2").await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND_OR_UNAUTHORIZED");

        let err = delete_customer(&db, &c.id, "t2").await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND_OR_UNAUTHORIZED");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unread_counter_increments_and_resets() {
        let (db, _dir) = setup_two_tenants().await;
        let (c, _) = find_or_create(&db, "t1", "+100", None).await.unwrap();

        increment_unread(&db, &c.id).await.unwrap();
        increment_unread(&db, &c.id).await.unwrap();
        let bumped = increment_unread(&db, &c.id).await.unwrap();
        assert_eq!(bumped.unread_count, 3);

        let reset = reset_unread(&db, &c.id, "t1").await.unwrap();
        assert_eq!(reset.unread_count, 0);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn total_unread_sums_per_tenant() {
        let (db, _dir) = setup_two_tenants().await;
        let (a, _) = find_or_create(&db, "t1", "+100", None).await.unwrap();
        let (b, _) = find_or_create(&db, "t1", "+200", None).await.unwrap();
        let (other, _) = find_or_create(&db, "t2", "+300", None).await.unwrap();

        increment_unread(&db, &a.id).await.unwrap();
        increment_unread(&db, &a.id).await.unwrap();
        increment_unread(&db, &b.id).await.unwrap();
        increment_unread(&db, &other.id).await.unwrap();

        assert_eq!(total_unread(&db, "t1").await.unwrap(), 3);
        assert_eq!(total_unread(&db, "t2").await.unwrap(), 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_increments_all_land() {
        let (db, _dir) = setup_two_tenants().await;
        let (c, _) = find_or_create(&db, "t1", "+100", None).await.unwrap();

        let db = std::sync::Arc::new(db);
        let mut handles = Vec::new();
        for _ in 0..10 {
            let db = db.clone();
            let id = c.id.clone();
            handles.push(tokio::spawn(async move {
                increment_unread(&db, &id).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let after = get_customer(&db, &c.id, "t1").await.unwrap().unwrap();
        assert_eq!(after.unread_count, 10);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn find_by_phone_any_tenant_prefers_earliest() {
        let (db, _dir) = setup_two_tenants().await;

        // t2's customer first, then t1's; lookup returns the earlier row.
        let (first, _) = find_or_create(&db, "t2", "+555", None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        find_or_create(&db, "t1", "+555", None).await.unwrap();

        let found = find_by_phone_any_tenant(&db, "+555").await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
        assert!(find_by_phone_any_tenant(&db, "+999").await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn rename_and_list() {
        let (db, _dir) = setup_two_tenants().await;
        let (c, _) = find_or_create(&db, "t1", "+100", None).await.unwrap();

        let renamed = rename_customer(&db, &c.id, "t1", "Mona").await.unwrap();
        assert_eq!(renamed.name.as_deref(), Some("Mona"));

        let all = list_customers(&db, "t1").await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(list_customers(&db, "t2").await.unwrap().is_empty());

        db.close().await.unwrap();
    }
}
