// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant resolution from ambiguous inbound identifiers.
//!
//! Inbound webhooks identify their tenant in whatever way the sending bridge
//! happens to support: a `whk_` token in the path, a legacy tenant id, a
//! known customer phone number, or a store-domain hint. The resolver tries
//! these in a fixed order and is a pure read; it never creates anything.

use std::sync::Arc;

use tracing::warn;

use ordalink_core::types::Tenant;
use ordalink_core::OrdalinkError;
use ordalink_storage::{queries, Database};

use crate::token::is_webhook_token;

/// Canonical suffix stripped from (and re-appended to) store-domain hints.
const STORE_DOMAIN_SUFFIX: &str = ".myshopify.com";

/// Everything an inbound request carried that might identify its tenant.
#[derive(Debug, Clone, Default)]
pub struct ResolutionHints {
    /// Path segment: webhook token or legacy tenant id.
    pub token_or_id: Option<String>,
    /// Sender phone number from the payload.
    pub phone: Option<String>,
    /// Store-domain hint from header, query, or payload.
    pub shop_domain: Option<String>,
}

/// Maps [`ResolutionHints`] to exactly one tenant.
pub struct TenantResolver {
    db: Arc<Database>,
    /// Whether an unmatched request may fall back to the earliest-registered
    /// tenant. Safe for single-tenant installs, unsafe in real multi-tenant
    /// production.
    allow_first_tenant_fallback: bool,
}

impl TenantResolver {
    pub fn new(db: Arc<Database>, allow_first_tenant_fallback: bool) -> Self {
        Self {
            db,
            allow_first_tenant_fallback,
        }
    }

    /// Resolve the hints to a tenant.
    ///
    /// A `whk_`-prefixed identifier is authoritative: it either matches a
    /// tenant or the request fails `INVALID_TOKEN` without trying anything
    /// else. Weaker hints fall through the ladder; `NO_TENANT_FOUND` is
    /// returned only when nothing matched and the fallback is unavailable.
    pub async fn resolve(&self, hints: &ResolutionHints) -> Result<Tenant, OrdalinkError> {
        if let Some(identifier) = hints.token_or_id.as_deref() {
            if is_webhook_token(identifier) {
                return queries::tenants::get_by_webhook_token(&self.db, identifier)
                    .await?
                    .ok_or(OrdalinkError::InvalidToken);
            }
            // Legacy tenant id in the token position.
            if let Some(tenant) = queries::tenants::get_tenant(&self.db, identifier).await? {
                return Ok(tenant);
            }
        }

        if let Some(phone) = hints.phone.as_deref() {
            if let Some(customer) =
                queries::customers::find_by_phone_any_tenant(&self.db, phone).await?
            {
                if let Some(tenant) =
                    queries::tenants::get_tenant(&self.db, &customer.tenant_id).await?
                {
                    return Ok(tenant);
                }
            }
        }

        if let Some(shop) = hints.shop_domain.as_deref() {
            if let Some(tenant) = self.resolve_by_store_domain(shop).await? {
                return Ok(tenant);
            }
        }

        if self.allow_first_tenant_fallback {
            if let Some(tenant) = queries::tenants::first_tenant(&self.db).await? {
                warn!(
                    tenant = %tenant.id,
                    "tenant resolved by first-tenant fallback; unsafe outside single-tenant installs"
                );
                return Ok(tenant);
            }
        }

        Err(OrdalinkError::NoTenantFound(describe(hints)))
    }

    /// Try the domain hint as sent, with the canonical suffix stripped, and
    /// with it re-appended.
    async fn resolve_by_store_domain(
        &self,
        shop: &str,
    ) -> Result<Option<Tenant>, OrdalinkError> {
        let normalized = shop.trim().to_lowercase();
        let bare = normalized
            .strip_suffix(STORE_DOMAIN_SUFFIX)
            .unwrap_or(&normalized)
            .to_string();
        let full = format!("{bare}{STORE_DOMAIN_SUFFIX}");

        for candidate in [normalized.as_str(), bare.as_str(), full.as_str()] {
            if let Some(tenant) =
                queries::tenants::find_by_store_domain(&self.db, candidate).await?
            {
                return Ok(Some(tenant));
            }
        }
        Ok(None)
    }
}

fn describe(hints: &ResolutionHints) -> String {
    format!(
        "no tenant matched (identifier: {}, phone: {}, shop: {})",
        hints.token_or_id.as_deref().unwrap_or("-"),
        hints.phone.as_deref().unwrap_or("-"),
        hints.shop_domain.as_deref().unwrap_or("-"),
    )
}
