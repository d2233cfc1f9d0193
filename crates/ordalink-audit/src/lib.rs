// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only audit trail.
//!
//! Every security-relevant event (OAuth steps, credential changes, rejected
//! HMACs) lands here with an actor, an action, and optional request context.
//! Writes are best-effort: a failed audit insert is logged and swallowed so
//! it can never fail the operation being audited.

use std::sync::Arc;

use tracing::{error, warn};

use ordalink_core::types::{new_id, now_rfc3339, AuditLogEntry, SYSTEM_ACTOR};
use ordalink_core::OrdalinkError;
use ordalink_storage::queries::audit::{self, AuditQuery};
use ordalink_storage::Database;

pub use ordalink_storage::queries::audit::AuditQuery as AuditFilter;

/// Writes and reads audit rows. Cheap to clone.
#[derive(Clone)]
pub struct AuditService {
    db: Arc<Database>,
}

impl AuditService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Record an account or credential change made by `actor`.
    pub async fn log_account_change(
        &self,
        actor: &str,
        action: &str,
        ip_address: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) {
        self.append(actor, action.to_string(), ip_address, metadata)
            .await;
    }

    /// Record an OAuth lifecycle step. Actions are namespaced `oauth_<step>`.
    pub async fn log_oauth_event(
        &self,
        actor: &str,
        step: &str,
        ip_address: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) {
        self.append(actor, format!("oauth_{step}"), ip_address, metadata)
            .await;
    }

    /// Record a rejected request before any tenant is authenticated. Actions
    /// are namespaced `security_violation_<kind>` and attributed to the
    /// `system` actor.
    pub async fn log_security_violation(
        &self,
        kind: &str,
        ip_address: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) {
        warn!(kind, ip = ?ip_address, "security violation");
        self.append(
            SYSTEM_ACTOR,
            format!("security_violation_{kind}"),
            ip_address,
            metadata,
        )
        .await;
    }

    /// Query audit rows, newest first.
    pub async fn get_audit_logs(
        &self,
        filter: AuditQuery,
    ) -> Result<Vec<AuditLogEntry>, OrdalinkError> {
        audit::list_entries(&self.db, filter).await
    }

    async fn append(
        &self,
        actor: &str,
        action: String,
        ip_address: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) {
        let entry = AuditLogEntry {
            id: new_id(),
            actor: actor.to_string(),
            action,
            ip_address: ip_address.map(String::from),
            metadata: metadata.map(|m| m.to_string()),
            created_at: now_rfc3339(),
        };
        if let Err(e) = audit::insert_entry(&self.db, &entry).await {
            error!(error = %e, action = %entry.action, "audit write failed");
        }
    }
}
