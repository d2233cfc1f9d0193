// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message persistence. Messages are append-only; only `status` mutates.

use rusqlite::params;

use ordalink_core::types::{Message, MessageStatus};
use ordalink_core::OrdalinkError;

use crate::database::{map_tr_err, parse_enum, Database};

const MESSAGE_COLUMNS: &str =
    "id, customer_id, content, kind, direction, status, media_url, duration_secs, created_at";

fn map_message_row(row: &rusqlite::Row<'_>) -> Result<Message, rusqlite::Error> {
    Ok(Message {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        content: row.get(2)?,
        kind: parse_enum(3, row.get(3)?)?,
        direction: parse_enum(4, row.get(4)?)?,
        status: parse_enum(5, row.get(5)?)?,
        media_url: row.get(6)?,
        duration_secs: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Insert a new message.
pub async fn insert_message(db: &Database, msg: &Message) -> Result<(), OrdalinkError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages
                   (id, customer_id, content, kind, direction, status,
                    media_url, duration_secs, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    msg.id,
                    msg.customer_id,
                    msg.content,
                    msg.kind.to_string(),
                    msg.direction.to_string(),
                    msg.status.to_string(),
                    msg.media_url,
                    msg.duration_secs,
                    msg.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Messages for one conversation in chronological order, scoped through the
/// customer's tenant.
pub async fn messages_for_customer(
    db: &Database,
    customer_id: &str,
    tenant_id: &str,
) -> Result<Vec<Message>, OrdalinkError> {
    let customer_id = customer_id.to_string();
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE customer_id = ?1
                   AND EXISTS (SELECT 1 FROM customers c
                               WHERE c.id = ?1 AND c.tenant_id = ?2)
                 ORDER BY created_at ASC"
            ))?;
            let rows = stmt.query_map(params![customer_id, tenant_id], map_message_row)?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

/// Update a message's delivery status, scoped through the customer's tenant.
pub async fn update_status(
    db: &Database,
    message_id: &str,
    tenant_id: &str,
    status: MessageStatus,
) -> Result<(), OrdalinkError> {
    let message_id = message_id.to_string();
    let tenant_id = tenant_id.to_string();
    let changed = db
        .connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE messages SET status = ?1
                 WHERE id = ?2
                   AND customer_id IN (SELECT id FROM customers WHERE tenant_id = ?3)",
                params![status.to_string(), message_id, tenant_id],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(OrdalinkError::NotFoundOrUnauthorized { entity: "message" });
    }
    Ok(())
}
