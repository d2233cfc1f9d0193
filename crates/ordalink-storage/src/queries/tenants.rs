// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant CRUD and credential updates.
//!
//! Lookups used by webhook tenant resolution (`get_by_webhook_token`,
//! `find_by_store_domain`, `first_tenant`) all live here; the resolution
//! ladder itself belongs to the webhook crate.

use rusqlite::{params, OptionalExtension};

use ordalink_core::types::{now_rfc3339, Tenant};
use ordalink_core::OrdalinkError;

use crate::database::{map_tr_err, Database};

const TENANT_COLUMNS: &str = "id, email, webhook_token, store_domain, store_client_id, \
     store_client_secret, store_access_token, relay_url, created_at, updated_at";

fn map_tenant_row(row: &rusqlite::Row<'_>) -> Result<Tenant, rusqlite::Error> {
    Ok(Tenant {
        id: row.get(0)?,
        email: row.get(1)?,
        webhook_token: row.get(2)?,
        store_domain: row.get(3)?,
        store_client_id: row.get(4)?,
        store_client_secret: row.get(5)?,
        store_access_token: row.get(6)?,
        relay_url: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Insert a new tenant. Fails if the email or webhook token is taken.
pub async fn create_tenant(db: &Database, tenant: &Tenant) -> Result<(), OrdalinkError> {
    let tenant = tenant.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tenants
                   (id, email, webhook_token, store_domain, store_client_id,
                    store_client_secret, store_access_token, relay_url,
                    created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    tenant.id,
                    tenant.email,
                    tenant.webhook_token,
                    tenant.store_domain,
                    tenant.store_client_id,
                    tenant.store_client_secret,
                    tenant.store_access_token,
                    tenant.relay_url,
                    tenant.created_at,
                    tenant.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a tenant by id.
pub async fn get_tenant(db: &Database, id: &str) -> Result<Option<Tenant>, OrdalinkError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let tenant = conn
                .query_row(
                    &format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = ?1"),
                    params![id],
                    map_tenant_row,
                )
                .optional()?;
            Ok(tenant)
        })
        .await
        .map_err(map_tr_err)
}

/// Look up the tenant owning an inbound webhook token.
pub async fn get_by_webhook_token(
    db: &Database,
    token: &str,
) -> Result<Option<Tenant>, OrdalinkError> {
    let token = token.to_string();
    db.connection()
        .call(move |conn| {
            let tenant = conn
                .query_row(
                    &format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE webhook_token = ?1"),
                    params![token],
                    map_tenant_row,
                )
                .optional()?;
            Ok(tenant)
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a tenant by exact store domain.
pub async fn find_by_store_domain(
    db: &Database,
    domain: &str,
) -> Result<Option<Tenant>, OrdalinkError> {
    let domain = domain.to_string();
    db.connection()
        .call(move |conn| {
            let tenant = conn
                .query_row(
                    &format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE store_domain = ?1"),
                    params![domain],
                    map_tenant_row,
                )
                .optional()?;
            Ok(tenant)
        })
        .await
        .map_err(map_tr_err)
}

/// The earliest-created tenant, used as the single-tenant fallback during
/// webhook resolution.
pub async fn first_tenant(db: &Database) -> Result<Option<Tenant>, OrdalinkError> {
    db.connection()
        .call(move |conn| {
            let tenant = conn
                .query_row(
                    &format!(
                        "SELECT {TENANT_COLUMNS} FROM tenants
                         ORDER BY created_at ASC LIMIT 1"
                    ),
                    [],
                    map_tenant_row,
                )
                .optional()?;
            Ok(tenant)
        })
        .await
        .map_err(map_tr_err)
}

/// Save store OAuth app credentials. The client secret must already be vault
/// ciphertext.
pub async fn update_store_credentials(
    db: &Database,
    id: &str,
    store_domain: &str,
    client_id: &str,
    encrypted_client_secret: &str,
) -> Result<(), OrdalinkError> {
    let id = id.to_string();
    let store_domain = store_domain.to_string();
    let client_id = client_id.to_string();
    let secret = encrypted_client_secret.to_string();
    let now = now_rfc3339();
    let changed = db
        .connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE tenants
                 SET store_domain = ?1, store_client_id = ?2,
                     store_client_secret = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![store_domain, client_id, secret, now, id],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(OrdalinkError::NotFoundOrUnauthorized { entity: "tenant" });
    }
    Ok(())
}

/// Store the encrypted access token after a completed OAuth exchange.
pub async fn set_access_token(
    db: &Database,
    id: &str,
    encrypted_access_token: &str,
    store_domain: &str,
) -> Result<(), OrdalinkError> {
    let id = id.to_string();
    let token = encrypted_access_token.to_string();
    let store_domain = store_domain.to_string();
    let now = now_rfc3339();
    let changed = db
        .connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE tenants
                 SET store_access_token = ?1, store_domain = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![token, store_domain, now, id],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(OrdalinkError::NotFoundOrUnauthorized { entity: "tenant" });
    }
    Ok(())
}

/// Disconnect the store: drop the access token and app credentials.
pub async fn clear_store_connection(db: &Database, id: &str) -> Result<(), OrdalinkError> {
    let id = id.to_string();
    let now = now_rfc3339();
    let changed = db
        .connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE tenants
                 SET store_access_token = NULL, store_client_id = NULL,
                     store_client_secret = NULL, updated_at = ?1
                 WHERE id = ?2",
                params![now, id],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(OrdalinkError::NotFoundOrUnauthorized { entity: "tenant" });
    }
    Ok(())
}

/// Replace the tenant's webhook token (rotation).
pub async fn set_webhook_token(
    db: &Database,
    id: &str,
    token: &str,
) -> Result<(), OrdalinkError> {
    let id = id.to_string();
    let token = token.to_string();
    let now = now_rfc3339();
    let changed = db
        .connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE tenants SET webhook_token = ?1, updated_at = ?2 WHERE id = ?3",
                params![token, now, id],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(OrdalinkError::NotFoundOrUnauthorized { entity: "tenant" });
    }
    Ok(())
}

/// Set or clear the outbound relay URL.
pub async fn set_relay_url(
    db: &Database,
    id: &str,
    relay_url: Option<&str>,
) -> Result<(), OrdalinkError> {
    let id = id.to_string();
    let relay_url = relay_url.map(String::from);
    let now = now_rfc3339();
    let changed = db
        .connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE tenants SET relay_url = ?1, updated_at = ?2 WHERE id = ?3",
                params![relay_url, now, id],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(OrdalinkError::NotFoundOrUnauthorized { entity: "tenant" });
    }
    Ok(())
}

/// Delete a tenant and everything it owns.
///
/// Customers, messages, orders, OAuth states, and webhook logs go via FK
/// cascade; audit rows have no FK (the `system` actor is not a tenant) so
/// they are removed explicitly in the same transaction.
pub async fn delete_tenant(db: &Database, id: &str) -> Result<(), OrdalinkError> {
    let id = id.to_string();
    let changed = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM audit_log WHERE actor = ?1", params![id])?;
            let n = tx.execute("DELETE FROM tenants WHERE id = ?1", params![id])?;
            tx.commit()?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(OrdalinkError::NotFoundOrUnauthorized { entity: "tenant" });
    }
    Ok(())
}
