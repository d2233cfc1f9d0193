// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only audit log rows.
//!
//! There is deliberately no update or single-row delete here; rows only
//! disappear when their owning tenant is deleted.

use rusqlite::params;
use rusqlite::types::Value;

use ordalink_core::types::AuditLogEntry;
use ordalink_core::OrdalinkError;

use crate::database::{map_tr_err, Database};

const AUDIT_COLUMNS: &str = "id, actor, action, ip_address, metadata, created_at";

fn map_audit_row(row: &rusqlite::Row<'_>) -> Result<AuditLogEntry, rusqlite::Error> {
    Ok(AuditLogEntry {
        id: row.get(0)?,
        actor: row.get(1)?,
        action: row.get(2)?,
        ip_address: row.get(3)?,
        metadata: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Filters for [`list_entries`]. Empty filters list everything.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub actor: Option<String>,
    pub action: Option<String>,
    /// Inclusive RFC 3339 lower bound on `created_at`.
    pub start: Option<String>,
    /// Inclusive RFC 3339 upper bound on `created_at`.
    pub end: Option<String>,
    pub limit: Option<i64>,
}

/// Append one audit row.
pub async fn insert_entry(db: &Database, entry: &AuditLogEntry) -> Result<(), OrdalinkError> {
    let entry = entry.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO audit_log (id, actor, action, ip_address, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.id,
                    entry.actor,
                    entry.action,
                    entry.ip_address,
                    entry.metadata,
                    entry.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// List audit rows matching the query, newest first.
pub async fn list_entries(
    db: &Database,
    query: AuditQuery,
) -> Result<Vec<AuditLogEntry>, OrdalinkError> {
    db.connection()
        .call(move |conn| {
            let mut sql = format!("SELECT {AUDIT_COLUMNS} FROM audit_log WHERE 1 = 1");
            let mut values: Vec<Value> = Vec::new();

            if let Some(actor) = query.actor {
                sql.push_str(" AND actor = ?");
                values.push(Value::Text(actor));
            }
            if let Some(action) = query.action {
                sql.push_str(" AND action = ?");
                values.push(Value::Text(action));
            }
            if let Some(start) = query.start {
                sql.push_str(" AND created_at >= ?");
                values.push(Value::Text(start));
            }
            if let Some(end) = query.end {
                sql.push_str(" AND created_at <= ?");
                values.push(Value::Text(end));
            }
            sql.push_str(" ORDER BY created_at DESC");
            if let Some(limit) = query.limit {
                sql.push_str(" LIMIT ?");
                values.push(Value::Integer(limit));
            }

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(values), map_audit_row)?;
            let mut entries = Vec::new();
            for row in rows {
                entries.push(row?);
            }
            Ok(entries)
        })
        .await
        .map_err(map_tr_err)
}
