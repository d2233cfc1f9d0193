// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-use OAuth CSRF states.
//!
//! A state is consumed by deleting it in the same statement that reads it
//! (`DELETE ... RETURNING`), so a replayed callback can never claim the same
//! state twice.

use rusqlite::{params, OptionalExtension};

use ordalink_core::types::OAuthState;
use ordalink_core::OrdalinkError;

use crate::database::{map_tr_err, Database};

/// Store a fresh state for a tenant, discarding any previous outstanding
/// handshake for the same tenant.
pub async fn create_state(db: &Database, state: &OAuthState) -> Result<(), OrdalinkError> {
    let state = state.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM oauth_states WHERE tenant_id = ?1",
                params![state.tenant_id],
            )?;
            tx.execute(
                "INSERT INTO oauth_states (id, tenant_id, state, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![state.id, state.tenant_id, state.state, state.expires_at],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Atomically claim an unexpired state, consuming it.
///
/// Returns `None` if the state is unknown, already claimed, or expired at
/// `now`; callers cannot distinguish the three, which is deliberate.
pub async fn claim_state(
    db: &Database,
    state_value: &str,
    now: &str,
) -> Result<Option<OAuthState>, OrdalinkError> {
    let state_value = state_value.to_string();
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let claimed = conn
                .query_row(
                    "DELETE FROM oauth_states
                     WHERE state = ?1 AND expires_at > ?2
                     RETURNING id, tenant_id, state, expires_at",
                    params![state_value, now],
                    |row| {
                        Ok(OAuthState {
                            id: row.get(0)?,
                            tenant_id: row.get(1)?,
                            state: row.get(2)?,
                            expires_at: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(claimed)
        })
        .await
        .map_err(map_tr_err)
}

/// Drop states that expired at or before `now`. Returns how many were removed.
pub async fn purge_expired(db: &Database, now: &str) -> Result<usize, OrdalinkError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "DELETE FROM oauth_states WHERE expires_at <= ?1",
                params![now],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)
}
