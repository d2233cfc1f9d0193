// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection-time authentication for websocket subscribers.
//!
//! The credential is presented once, at connect; the tenant id it resolves to
//! fixes the topic for the connection's whole lifetime.

use std::sync::Arc;

use async_trait::async_trait;

use ordalink_core::OrdalinkError;
use ordalink_storage::{queries, Database};

/// Resolves a connect credential to a tenant id, or rejects the connection.
#[async_trait]
pub trait ConnectAuth: Send + Sync {
    async fn authenticate(&self, credential: &str) -> Result<String, OrdalinkError>;
}

/// Default [`ConnectAuth`]: the tenant's webhook token doubles as the
/// websocket connect credential.
pub struct WebhookTokenAuth {
    db: Arc<Database>,
}

impl WebhookTokenAuth {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConnectAuth for WebhookTokenAuth {
    async fn authenticate(&self, credential: &str) -> Result<String, OrdalinkError> {
        if credential.is_empty() {
            return Err(OrdalinkError::Unauthorized(
                "missing connect credential".to_string(),
            ));
        }
        let tenant = queries::tenants::get_by_webhook_token(&self.db, credential)
            .await?
            .ok_or_else(|| {
                OrdalinkError::Unauthorized("invalid connect credential".to_string())
            })?;
        Ok(tenant.id)
    }
}
