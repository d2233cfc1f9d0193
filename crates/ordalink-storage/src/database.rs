// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection handle.
//!
//! Wraps a `tokio-rusqlite` connection, which serializes all access through a
//! dedicated thread. SQLite in WAL mode with a single writer gives us
//! transactional safety without connection pooling.

use tracing::debug;

use ordalink_config::model::StorageConfig;
use ordalink_core::OrdalinkError;

/// Handle to the SQLite database.
///
/// Cheap to clone is not a goal; share it behind an `Arc` at the service
/// layer. All queries go through [`Database::connection`] and the typed
/// functions in [`crate::queries`].
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if necessary) the database at `path`, apply PRAGMAs,
    /// and run any pending migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, OrdalinkError> {
        let path = config.database_path.clone();
        let wal_mode = config.wal_mode;

        // Migrations need a plain synchronous connection; run them on a
        // blocking thread before the async handle opens.
        tokio::task::spawn_blocking(move || -> Result<(), OrdalinkError> {
            let mut conn = rusqlite::Connection::open(&path).map_err(map_sql_err)?;
            if wal_mode {
                conn.execute_batch("PRAGMA journal_mode = WAL;")
                    .map_err(map_sql_err)?;
            }
            crate::migrations::run_migrations(&mut conn)
        })
        .await
        .map_err(|e| OrdalinkError::Internal(format!("migration task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(&config.database_path)
            .await
            .map_err(map_sql_err)?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(
                "PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;
                 PRAGMA synchronous = NORMAL;",
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path = %config.database_path, wal = wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The underlying serialized connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL ahead of shutdown.
    pub async fn close(&self) -> Result<(), OrdalinkError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

/// Map a `tokio-rusqlite` error into the storage error variant.
pub(crate) fn map_tr_err(err: tokio_rusqlite::Error) -> OrdalinkError {
    OrdalinkError::Storage {
        source: Box::new(err),
    }
}

/// Map a bare `rusqlite` error into the storage error variant.
pub(crate) fn map_sql_err(err: rusqlite::Error) -> OrdalinkError {
    OrdalinkError::Storage {
        source: Box::new(err),
    }
}

/// Parse a TEXT column into a strum-backed enum inside a row mapper,
/// reporting failures as a column conversion error.
pub(crate) fn parse_enum<T>(idx: usize, value: String) -> Result<T, rusqlite::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_for(path: &std::path::Path) -> StorageConfig {
        StorageConfig {
            database_path: path.to_str().unwrap().to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn open_creates_database_and_runs_migrations() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("open.db");
        let db = Database::open(&config_for(&db_path)).await.unwrap();
        assert!(db_path.exists());

        // Schema tables exist after migration.
        let count: i64 = db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                let n = conn.query_row(
                    "SELECT count(*) FROM sqlite_master
                     WHERE type = 'table' AND name IN
                       ('tenants', 'customers', 'messages', 'orders',
                        'oauth_states', 'audit_log', 'webhook_log',
                        'processed_webhooks')",
                    [],
                    |row| row.get(0),
                )?;
                Ok(n)
            })
            .await
            .unwrap();
        assert_eq!(count, 8);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn open_is_idempotent_across_restarts() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("reopen.db");
        let config = config_for(&db_path);

        let db = Database::open(&config).await.unwrap();
        db.close().await.unwrap();
        drop(db);

        // Second open must not re-run migrations destructively.
        let db = Database::open(&config).await.unwrap();
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let dir = tempdir().unwrap();
        let db = Database::open(&config_for(&dir.path().join("fk.db")))
            .await
            .unwrap();

        let result = db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO customers
                       (id, tenant_id, phone_number, unread_count, created_at, updated_at)
                     VALUES ('c1', 'missing-tenant', '+100', 0, '2026', '2026')",
                    [],
                )?;
                Ok(())
            })
            .await;
        assert!(result.is_err(), "orphan customer insert should fail");
    }
}
