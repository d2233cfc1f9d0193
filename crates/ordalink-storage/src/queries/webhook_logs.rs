// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook trace rows and the idempotency ledger.

use rusqlite::params;

use ordalink_core::types::WebhookLogEntry;
use ordalink_core::OrdalinkError;

use crate::database::{map_tr_err, parse_enum, Database};

const LOG_COLUMNS: &str =
    "id, tenant_id, direction, event_type, status, correlation_id, payload, error, created_at";

fn map_log_row(row: &rusqlite::Row<'_>) -> Result<WebhookLogEntry, rusqlite::Error> {
    Ok(WebhookLogEntry {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        direction: parse_enum(2, row.get(2)?)?,
        event_type: row.get(3)?,
        status: row.get(4)?,
        correlation_id: row.get(5)?,
        payload: row.get(6)?,
        error: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Append one webhook trace row.
pub async fn insert_log(db: &Database, log: &WebhookLogEntry) -> Result<(), OrdalinkError> {
    let log = log.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO webhook_log
                   (id, tenant_id, direction, event_type, status,
                    correlation_id, payload, error, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    log.id,
                    log.tenant_id,
                    log.direction.to_string(),
                    log.event_type,
                    log.status,
                    log.correlation_id,
                    log.payload,
                    log.error,
                    log.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// All trace rows sharing one correlation id, in arrival order.
pub async fn logs_for_correlation(
    db: &Database,
    correlation_id: &str,
) -> Result<Vec<WebhookLogEntry>, OrdalinkError> {
    let correlation_id = correlation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LOG_COLUMNS} FROM webhook_log
                 WHERE correlation_id = ?1
                 ORDER BY created_at ASC"
            ))?;
            let rows = stmt.query_map(params![correlation_id], map_log_row)?;
            let mut logs = Vec::new();
            for row in rows {
                logs.push(row?);
            }
            Ok(logs)
        })
        .await
        .map_err(map_tr_err)
}

/// Recent trace rows for a tenant, newest first.
pub async fn logs_for_tenant(
    db: &Database,
    tenant_id: &str,
    limit: i64,
) -> Result<Vec<WebhookLogEntry>, OrdalinkError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LOG_COLUMNS} FROM webhook_log
                 WHERE tenant_id = ?1
                 ORDER BY created_at DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![tenant_id, limit], map_log_row)?;
            let mut logs = Vec::new();
            for row in rows {
                logs.push(row?);
            }
            Ok(logs)
        })
        .await
        .map_err(map_tr_err)
}

/// Record an external event id as processed.
///
/// Returns `true` the first time a key is seen and `false` on every replay.
/// The caller must check this BEFORE applying the event's side effects.
pub async fn mark_processed(
    db: &Database,
    idempotency_key: &str,
    tenant_id: &str,
    source: &str,
) -> Result<bool, OrdalinkError> {
    let idempotency_key = idempotency_key.to_string();
    let tenant_id = tenant_id.to_string();
    let source = source.to_string();
    let now = ordalink_core::types::now_rfc3339();
    let inserted = db
        .connection()
        .call(move |conn| {
            let n = conn.execute(
                "INSERT OR IGNORE INTO processed_webhooks
                   (idempotency_key, tenant_id, source, processed_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![idempotency_key, tenant_id, source, now],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)?;
    Ok(inserted > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::tenants::tests::{make_tenant, open_test_db};
    use crate::queries::tenants::create_tenant;
    use ordalink_core::types::Direction;

    fn log(id: &str, tenant: &str, correlation: &str, created_at: &str) -> WebhookLogEntry {
        WebhookLogEntry {
            id: id.to_string(),
            tenant_id: tenant.to_string(),
            direction: Direction::Incoming,
            event_type: "message".to_string(),
            status: "success".to_string(),
            correlation_id: correlation.to_string(),
            payload: Some(r#"{"content":"hi"}"#.to_string()),
            error: None,
            created_at: created_at.to_string(),
        }
    }

    async fn setup() -> (Database, tempfile::TempDir) {
        let (db, dir) = open_test_db().await;
        create_tenant(&db, &make_tenant("t1", "a@example.com", None))
            .await
            .unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn correlation_groups_related_rows_in_order() {
        let (db, _dir) = setup().await;
        insert_log(&db, &log("w2", "t1", "corr-1", "2026-01-01T00:00:02.000Z"))
            .await
            .unwrap();
        insert_log(&db, &log("w1", "t1", "corr-1", "2026-01-01T00:00:01.000Z"))
            .await
            .unwrap();
        insert_log(&db, &log("w3", "t1", "corr-2", "2026-01-01T00:00:03.000Z"))
            .await
            .unwrap();

        let group = logs_for_correlation(&db, "corr-1").await.unwrap();
        assert_eq!(group.len(), 2);
        assert_eq!(group[0].id, "w1");
        assert_eq!(group[1].id, "w2");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn tenant_listing_is_newest_first_and_capped() {
        let (db, _dir) = setup().await;
        for i in 0..4 {
            insert_log(
                &db,
                &log(
                    &format!("w{i}"),
                    "t1",
                    "corr",
                    &format!("2026-01-01T00:00:0{i}.000Z"),
                ),
            )
            .await
            .unwrap();
        }

        let recent = logs_for_tenant(&db, "t1", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, "w3");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn mark_processed_detects_replays() {
        let (db, _dir) = setup().await;

        let first = mark_processed(&db, "evt-1", "t1", "orders").await.unwrap();
        assert!(first);

        let replay = mark_processed(&db, "evt-1", "t1", "orders").await.unwrap();
        assert!(!replay, "replayed key must report already-processed");

        let other = mark_processed(&db, "evt-2", "t1", "orders").await.unwrap();
        assert!(other);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn idempotency_keys_are_scoped_per_tenant() {
        let (db, _dir) = setup().await;
        create_tenant(&db, &make_tenant("t2", "b@example.com", None))
            .await
            .unwrap();

        assert!(mark_processed(&db, "evt-1", "t1", "orders").await.unwrap());
        assert!(
            mark_processed(&db, "evt-1", "t2", "orders").await.unwrap(),
            "another tenant's identical key is a distinct event"
        );
        db.close().await.unwrap();
    }
}
