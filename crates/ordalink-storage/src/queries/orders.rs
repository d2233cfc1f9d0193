// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Order persistence and the pending-only transition.
//!
//! Two invariants are enforced at the SQL level rather than in service code:
//! one order per `(tenant, external_order_id)` via a partial unique index,
//! and transitions that only fire while the row is still `pending` via a
//! conditional `UPDATE`. Concurrent confirm/cancel attempts therefore race
//! safely; exactly one wins.

use rusqlite::{params, OptionalExtension};

use ordalink_core::types::{Order, OrderStatus};
use ordalink_core::OrdalinkError;

use crate::database::{map_tr_err, parse_enum, Database};

const ORDER_COLUMNS: &str = "id, tenant_id, customer_id, external_order_id, order_number, \
     total, status, customer_name, customer_phone, items, created_at, updated_at";

fn map_order_row(row: &rusqlite::Row<'_>) -> Result<Order, rusqlite::Error> {
    Ok(Order {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        customer_id: row.get(2)?,
        external_order_id: row.get(3)?,
        order_number: row.get(4)?,
        total: row.get(5)?,
        status: parse_enum(6, row.get(6)?)?,
        customer_name: row.get(7)?,
        customer_phone: row.get(8)?,
        items: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Insert an order, deduplicating on `(tenant_id, external_order_id)` when an
/// external id is present.
///
/// Returns the stored order and whether this call created it. A redelivered
/// provider webhook finds the existing row untouched.
pub async fn create_order(db: &Database, order: &Order) -> Result<(Order, bool), OrdalinkError> {
    let order = order.clone();
    let result = db
        .connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO orders
                   (id, tenant_id, customer_id, external_order_id, order_number,
                    total, status, customer_name, customer_phone, items,
                    created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(tenant_id, external_order_id)
                   WHERE external_order_id IS NOT NULL
                   DO NOTHING",
                params![
                    order.id,
                    order.tenant_id,
                    order.customer_id,
                    order.external_order_id,
                    order.order_number,
                    order.total,
                    order.status.to_string(),
                    order.customer_name,
                    order.customer_phone,
                    order.items,
                    order.created_at,
                    order.updated_at,
                ],
            )?;
            if inserted > 0 {
                let stored = conn.query_row(
                    &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"),
                    params![order.id],
                    map_order_row,
                )?;
                return Ok((stored, true));
            }
            // Conflict on the external id: return the existing row.
            let existing = conn.query_row(
                &format!(
                    "SELECT {ORDER_COLUMNS} FROM orders
                     WHERE tenant_id = ?1 AND external_order_id = ?2"
                ),
                params![order.tenant_id, order.external_order_id],
                map_order_row,
            )?;
            Ok((existing, false))
        })
        .await
        .map_err(map_tr_err)?;
    Ok(result)
}

/// Get an order by id, scoped to its tenant.
pub async fn get_order(
    db: &Database,
    id: &str,
    tenant_id: &str,
) -> Result<Option<Order>, OrdalinkError> {
    let id = id.to_string();
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let order = conn
                .query_row(
                    &format!(
                        "SELECT {ORDER_COLUMNS} FROM orders
                         WHERE id = ?1 AND tenant_id = ?2"
                    ),
                    params![id, tenant_id],
                    map_order_row,
                )
                .optional()?;
            Ok(order)
        })
        .await
        .map_err(map_tr_err)
}

/// All orders for a tenant, newest first.
pub async fn list_orders(db: &Database, tenant_id: &str) -> Result<Vec<Order>, OrdalinkError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders
                 WHERE tenant_id = ?1
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map(params![tenant_id], map_order_row)?;
            let mut orders = Vec::new();
            for row in rows {
                orders.push(row?);
            }
            Ok(orders)
        })
        .await
        .map_err(map_tr_err)
}

/// The customer's most recent order still in `pending`, if any. This is the
/// order a confirm/cancel reply applies to.
pub async fn latest_pending_for_customer(
    db: &Database,
    customer_id: &str,
) -> Result<Option<Order>, OrdalinkError> {
    let customer_id = customer_id.to_string();
    db.connection()
        .call(move |conn| {
            let order = conn
                .query_row(
                    &format!(
                        "SELECT {ORDER_COLUMNS} FROM orders
                         WHERE customer_id = ?1 AND status = 'pending'
                         ORDER BY created_at DESC LIMIT 1"
                    ),
                    params![customer_id],
                    map_order_row,
                )
                .optional()?;
            Ok(order)
        })
        .await
        .map_err(map_tr_err)
}

/// Move an order out of `pending` into a terminal state.
///
/// The `status = 'pending'` guard makes the update conditional: of two
/// concurrent transitions exactly one sees a changed row. Zero changed rows
/// means either the order does not exist under this tenant
/// (`NotFoundOrUnauthorized`) or it already settled (`InvalidTransition`).
pub async fn transition(
    db: &Database,
    id: &str,
    tenant_id: &str,
    to: OrderStatus,
) -> Result<Order, OrdalinkError> {
    if !to.is_terminal() {
        return Err(OrdalinkError::InvalidTransition {
            from: OrderStatus::Pending,
            to,
        });
    }
    let id_owned = id.to_string();
    let tenant_owned = tenant_id.to_string();
    let now = ordalink_core::types::now_rfc3339();
    let changed = db
        .connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE orders SET status = ?1, updated_at = ?2
                 WHERE id = ?3 AND tenant_id = ?4 AND status = 'pending'",
                params![to.to_string(), now, id_owned, tenant_owned],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)?;

    let current = get_order(db, id, tenant_id).await?;
    match (changed, current) {
        (n, Some(order)) if n > 0 => Ok(order),
        (_, Some(order)) => Err(OrdalinkError::InvalidTransition {
            from: order.status,
            to,
        }),
        (_, None) => Err(OrdalinkError::NotFoundOrUnauthorized { entity: "order" }),
    }
}
