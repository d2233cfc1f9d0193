// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The connect flow itself: start, callback, credential management.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use ordalink_audit::AuditService;
use ordalink_config::model::OAuthConfig;
use ordalink_core::types::{new_id, now_rfc3339, OAuthState};
use ordalink_core::OrdalinkError;
use ordalink_storage::{queries, Database};
use ordalink_vault::EncryptionService;

use crate::signature;

/// Lifetime of an issued CSRF state.
const STATE_TTL_MINUTES: i64 = 15;

/// Random bytes behind the hex state value (64 hex chars on the wire).
const STATE_BYTES: usize = 32;

/// Result of a successful `start`.
#[derive(Debug, Clone)]
pub struct StartOutcome {
    pub authorize_url: String,
    pub state: String,
}

/// The raw callback query string, keyed and sorted. The provider signs every
/// parameter except `hmac`, so the whole set must be kept, not just the known
/// fields.
#[derive(Debug, Clone, Default)]
pub struct CallbackQuery {
    params: BTreeMap<String, String>,
}

impl CallbackQuery {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            params: pairs.into_iter().collect(),
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    fn signed_params(&self) -> BTreeMap<String, String> {
        self.params
            .iter()
            .filter(|(k, _)| k.as_str() != "hmac")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

/// Orchestrates the two-step store connect handshake.
pub struct OAuthConnectFlow {
    db: Arc<Database>,
    vault: Arc<EncryptionService>,
    audit: AuditService,
    config: OAuthConfig,
    http: reqwest::Client,
}

impl OAuthConnectFlow {
    pub fn new(
        db: Arc<Database>,
        vault: Arc<EncryptionService>,
        audit: AuditService,
        config: OAuthConfig,
    ) -> Result<Self, OrdalinkError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.exchange_timeout_secs))
            .build()
            .map_err(|e| OrdalinkError::Internal(format!("failed to build oauth client: {e}")))?;
        Ok(Self {
            db,
            vault,
            audit,
            config,
            http,
        })
    }

    /// Begin the handshake for a tenant: persist a fresh single-use state
    /// and build the authorize URL from the tenant's stored app credentials.
    pub async fn start(&self, tenant_id: &str) -> Result<StartOutcome, OrdalinkError> {
        let tenant = queries::tenants::get_tenant(&self.db, tenant_id)
            .await?
            .ok_or(OrdalinkError::NotFoundOrUnauthorized { entity: "tenant" })?;

        let (Some(domain), Some(client_id), Some(_secret)) = (
            tenant.store_domain.as_deref(),
            tenant.store_client_id.as_deref(),
            tenant.store_client_secret.as_deref(),
        ) else {
            return Err(OrdalinkError::CredentialsNotConfigured);
        };
        let redirect_uri = self.config.redirect_uri.as_deref().ok_or_else(|| {
            OrdalinkError::Config("oauth.redirect_uri is not configured".to_string())
        })?;

        let state = random_state();
        queries::oauth_states::create_state(
            &self.db,
            &OAuthState {
                id: new_id(),
                tenant_id: tenant.id.clone(),
                state: state.clone(),
                expires_at: rfc3339_in_minutes(STATE_TTL_MINUTES),
            },
        )
        .await?;

        let mut url = reqwest::Url::parse(&format!("https://{domain}/admin/oauth/authorize"))
            .map_err(|e| OrdalinkError::Validation(format!("invalid store domain: {e}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", client_id)
            .append_pair("scope", &self.config.scopes)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("state", &state);

        info!(tenant = %tenant.id, "oauth handshake started");
        Ok(StartOutcome {
            authorize_url: url.to_string(),
            state,
        })
    }

    /// Complete the handshake. Returns the redirect URL for the operator's
    /// browser.
    ///
    /// Order matters: the state is claimed (and thereby consumed) first, so
    /// a replayed callback dies before any HMAC work; an HMAC mismatch is
    /// audited and rejected before any token-exchange call leaves the
    /// process.
    pub async fn callback(
        &self,
        query: CallbackQuery,
        ip_address: Option<&str>,
    ) -> Result<String, OrdalinkError> {
        let code = query
            .get("code")
            .ok_or_else(|| OrdalinkError::Validation("code is required".to_string()))?;
        let state_value = query
            .get("state")
            .ok_or_else(|| OrdalinkError::Validation("state is required".to_string()))?;
        let shop = query
            .get("shop")
            .ok_or_else(|| OrdalinkError::Validation("shop is required".to_string()))?;

        let claimed = queries::oauth_states::claim_state(&self.db, state_value, &now_rfc3339())
            .await?;
        let Some(claimed) = claimed else {
            self.audit
                .log_security_violation(
                    "state_mismatch",
                    ip_address,
                    Some(json!({ "shop": shop })),
                )
                .await;
            return Err(OrdalinkError::Unauthorized(
                "oauth state is missing, expired, or already used".to_string(),
            ));
        };

        let tenant = queries::tenants::get_tenant(&self.db, &claimed.tenant_id)
            .await?
            .ok_or(OrdalinkError::NotFoundOrUnauthorized { entity: "tenant" })?;
        let encrypted_secret = tenant
            .store_client_secret
            .as_deref()
            .ok_or(OrdalinkError::CredentialsNotConfigured)?;
        let client_secret = self.vault.decrypt(encrypted_secret)?;
        let client_id = tenant
            .store_client_id
            .as_deref()
            .ok_or(OrdalinkError::CredentialsNotConfigured)?;

        let provided_hmac = query.get("hmac").unwrap_or("");
        if !signature::verify(&client_secret, &query.signed_params(), provided_hmac) {
            self.audit
                .log_security_violation(
                    "hmac_failure",
                    ip_address,
                    Some(json!({ "shop": shop, "tenant": tenant.id })),
                )
                .await;
            return Err(OrdalinkError::Unauthorized(
                "callback signature verification failed".to_string(),
            ));
        }

        let access_token = self
            .exchange_code(shop, client_id, &client_secret, code)
            .await?;
        let encrypted_token = self.vault.encrypt(&access_token)?;
        queries::tenants::set_access_token(&self.db, &tenant.id, &encrypted_token, shop).await?;

        self.audit
            .log_oauth_event(&tenant.id, "connect", ip_address, Some(json!({ "shop": shop })))
            .await;
        info!(tenant = %tenant.id, shop, "store connected");
        Ok(self.config.success_url.clone())
    }

    /// Save store app credentials for a tenant; the client secret is
    /// encrypted before it touches storage. Returns the masked secret for
    /// display.
    pub async fn save_credentials(
        &self,
        tenant_id: &str,
        store_domain: &str,
        client_id: &str,
        client_secret: &str,
        ip_address: Option<&str>,
    ) -> Result<String, OrdalinkError> {
        if store_domain.trim().is_empty() || client_id.trim().is_empty()
            || client_secret.trim().is_empty()
        {
            return Err(OrdalinkError::Validation(
                "store_domain, client_id, and client_secret are required".to_string(),
            ));
        }
        let encrypted = self.vault.encrypt(client_secret)?;
        queries::tenants::update_store_credentials(
            &self.db,
            tenant_id,
            store_domain,
            client_id,
            &encrypted,
        )
        .await?;
        self.audit
            .log_account_change(
                tenant_id,
                "credentials_saved",
                ip_address,
                Some(json!({ "store_domain": store_domain })),
            )
            .await;
        Ok(EncryptionService::mask_secret(client_secret, 4))
    }

    /// Disconnect the store: wipe token and app credentials.
    pub async fn disconnect(
        &self,
        tenant_id: &str,
        ip_address: Option<&str>,
    ) -> Result<(), OrdalinkError> {
        queries::tenants::clear_store_connection(&self.db, tenant_id).await?;
        self.audit
            .log_oauth_event(tenant_id, "disconnect", ip_address, None)
            .await;
        Ok(())
    }

    /// The tenant's client secret, decrypted and masked for display.
    pub async fn masked_client_secret(
        &self,
        tenant_id: &str,
    ) -> Result<Option<String>, OrdalinkError> {
        let tenant = queries::tenants::get_tenant(&self.db, tenant_id)
            .await?
            .ok_or(OrdalinkError::NotFoundOrUnauthorized { entity: "tenant" })?;
        let Some(encrypted) = tenant.store_client_secret.as_deref() else {
            return Ok(None);
        };
        let plaintext = self.vault.decrypt(encrypted)?;
        Ok(Some(EncryptionService::mask_secret(&plaintext, 4)))
    }

    async fn exchange_code(
        &self,
        shop: &str,
        client_id: &str,
        client_secret: &str,
        code: &str,
    ) -> Result<String, OrdalinkError> {
        let response = self
            .http
            .post(token_endpoint(shop))
            .json(&json!({
                "client_id": client_id,
                "client_secret": client_secret,
                "code": code,
            }))
            .send()
            .await
            .map_err(|e| OrdalinkError::Upstream {
                message: format!("token exchange with {shop} failed"),
                source: Some(Box::new(e)),
            })?;

        if !response.status().is_success() {
            return Err(OrdalinkError::Upstream {
                message: format!("token exchange with {shop} returned {}", response.status()),
                source: None,
            });
        }
        let body: AccessTokenResponse =
            response.json().await.map_err(|e| OrdalinkError::Upstream {
                message: "token exchange returned an unreadable body".to_string(),
                source: Some(Box::new(e)),
            })?;
        Ok(body.access_token)
    }
}

/// Shop domains normally arrive bare (`acme.myshopify.com`); an explicit
/// scheme is honored so local test doubles can stand in for the provider.
fn token_endpoint(shop: &str) -> String {
    if shop.starts_with("http://") || shop.starts_with("https://") {
        format!("{shop}/admin/oauth/access_token")
    } else {
        format!("https://{shop}/admin/oauth/access_token")
    }
}

fn random_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn rfc3339_in_minutes(minutes: i64) -> String {
    (chrono::Utc::now() + chrono::Duration::minutes(minutes))
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordalink_config::model::{SecurityConfig, StorageConfig};
    use ordalink_core::types::Tenant;
    use ordalink_storage::queries::audit::AuditQuery;
    use tempfile::tempdir;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Harness {
        flow: OAuthConnectFlow,
        db: Arc<Database>,
        audit: AuditService,
        vault: Arc<EncryptionService>,
        _dir: tempfile::TempDir,
    }

    async fn setup() -> Harness {
        let dir = tempdir().unwrap();
        let storage = StorageConfig {
            database_path: dir.path().join("oauth.db").to_str().unwrap().to_string(),
            wal_mode: true,
        };
        let db = Arc::new(Database::open(&storage).await.unwrap());
        let vault = Arc::new(EncryptionService::new(&SecurityConfig {
            encryption_key: Some(
                "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f".to_string(),
            ),
        }));
        let audit = AuditService::new(db.clone());
        let flow = OAuthConnectFlow::new(
            db.clone(),
            vault.clone(),
            audit.clone(),
            OAuthConfig {
                redirect_uri: Some("https://crm.example.com/oauth/callback".to_string()),
                scopes: "read_orders,write_webhooks".to_string(),
                success_url: "https://crm.example.com/settings?store=connected".to_string(),
                exchange_timeout_secs: 5,
            },
        )
        .unwrap();
        Harness {
            flow,
            db,
            audit,
            vault,
            _dir: dir,
        }
    }

    async fn seed_tenant(h: &Harness, with_credentials: bool) {
        let secret_enc = if with_credentials {
            Some(h.vault.encrypt("shpss_supersecret").unwrap())
        } else {
            None
        };
        queries::tenants::create_tenant(
            &h.db,
            &Tenant {
                id: "t1".to_string(),
                email: "a@example.com".to_string(),
                webhook_token: None,
                store_domain: with_credentials.then(|| "acme.myshopify.com".to_string()),
                store_client_id: with_credentials.then(|| "client-1".to_string()),
                store_client_secret: secret_enc,
                store_access_token: None,
                relay_url: None,
                created_at: now_rfc3339(),
                updated_at: now_rfc3339(),
            },
        )
        .await
        .unwrap();
    }

    fn signed_callback(shop: &str, state: &str, code: &str) -> CallbackQuery {
        let mut params: BTreeMap<String, String> = BTreeMap::new();
        params.insert("code".to_string(), code.to_string());
        params.insert("state".to_string(), state.to_string());
        params.insert("shop".to_string(), shop.to_string());
        params.insert("timestamp".to_string(), "1700000000".to_string());
        let hmac = signature::sign("shpss_supersecret", &params);
        params.insert("hmac".to_string(), hmac);
        CallbackQuery::from_pairs(params)
    }

    #[tokio::test]
    async fn start_without_credentials_is_rejected() {
        let h = setup().await;
        seed_tenant(&h, false).await;
        let err = h.flow.start("t1").await.unwrap_err();
        assert_eq!(err.code(), "CREDENTIALS_NOT_CONFIGURED");
    }

    #[tokio::test]
    async fn start_issues_state_and_authorize_url() {
        let h = setup().await;
        seed_tenant(&h, true).await;

        let outcome = h.flow.start("t1").await.unwrap();
        assert_eq!(outcome.state.len(), 64);
        assert!(outcome.authorize_url.starts_with(
            "https://acme.myshopify.com/admin/oauth/authorize?"
        ));
        assert!(outcome.authorize_url.contains("client_id=client-1"));
        assert!(outcome.authorize_url.contains(&outcome.state));

        // The state is claimable exactly once.
        let claimed = queries::oauth_states::claim_state(&h.db, &outcome.state, &now_rfc3339())
            .await
            .unwrap();
        assert_eq!(claimed.unwrap().tenant_id, "t1");
    }

    #[tokio::test]
    async fn callback_missing_params_is_validation_error() {
        let h = setup().await;
        let query = CallbackQuery::from_pairs([("code".to_string(), "abc".to_string())]);
        let err = h.flow.callback(query, None).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn unknown_state_is_unauthorized_with_audit_and_no_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let h = setup().await;
        seed_tenant(&h, true).await;

        let query = signed_callback(&server.uri(), "never-issued", "code-1");
        let err = h.flow.callback(query, Some("203.0.113.9")).await.unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");

        let violations = h
            .audit
            .get_audit_logs(AuditQuery {
                action: Some("security_violation_state_mismatch".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(violations.len(), 1);
    }

    #[tokio::test]
    async fn hmac_mismatch_is_audited_and_rejected() {
        let h = setup().await;
        seed_tenant(&h, true).await;
        let outcome = h.flow.start("t1").await.unwrap();

        let mut query = signed_callback("acme.myshopify.com", &outcome.state, "code-1");
        query.params.insert("hmac".to_string(), hex::encode([0u8; 32]));

        let err = h.flow.callback(query, Some("203.0.113.9")).await.unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");

        let violations = h
            .audit
            .get_audit_logs(AuditQuery {
                action: Some("security_violation_hmac_failure".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].ip_address.as_deref(), Some("203.0.113.9"));
    }

    #[tokio::test]
    async fn successful_callback_stores_encrypted_token_and_consumes_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/admin/oauth/access_token"))
            .and(body_partial_json(serde_json::json!({
                "client_id": "client-1",
                "code": "code-1"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "shpat_fresh_token"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let h = setup().await;
        seed_tenant(&h, true).await;
        let outcome = h.flow.start("t1").await.unwrap();

        let redirect = h
            .flow
            .callback(signed_callback(&server.uri(), &outcome.state, "code-1"), None)
            .await
            .unwrap();
        assert_eq!(redirect, "https://crm.example.com/settings?store=connected");

        // Token stored encrypted, decryptable back to the exchanged value.
        let tenant = queries::tenants::get_tenant(&h.db, "t1").await.unwrap().unwrap();
        let stored = tenant.store_access_token.unwrap();
        assert_ne!(stored, "shpat_fresh_token");
        assert_eq!(h.vault.decrypt(&stored).unwrap(), "shpat_fresh_token");

        // Connect audit row exists.
        let connects = h
            .audit
            .get_audit_logs(AuditQuery {
                action: Some("oauth_connect".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(connects.len(), 1);

        // Replay with the same state dies at the claim.
        let err = h
            .flow
            .callback(signed_callback(&server.uri(), &outcome.state, "code-1"), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn failed_exchange_is_upstream_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let h = setup().await;
        seed_tenant(&h, true).await;
        let outcome = h.flow.start("t1").await.unwrap();

        let err = h
            .flow
            .callback(signed_callback(&server.uri(), &outcome.state, "code-1"), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UPSTREAM_FAILURE");

        // No token was stored.
        let tenant = queries::tenants::get_tenant(&h.db, "t1").await.unwrap().unwrap();
        assert!(tenant.store_access_token.is_none());
    }

    #[tokio::test]
    async fn save_credentials_encrypts_and_masks() {
        let h = setup().await;
        seed_tenant(&h, false).await;

        let masked = h
            .flow
            .save_credentials("t1", "acme.myshopify.com", "client-1", "shpss_supersecret", None)
            .await
            .unwrap();
        assert!(masked.ends_with("cret"));
        assert!(masked.starts_with("****"));

        let tenant = queries::tenants::get_tenant(&h.db, "t1").await.unwrap().unwrap();
        let stored = tenant.store_client_secret.unwrap();
        assert_ne!(stored, "shpss_supersecret");
        assert_eq!(h.vault.decrypt(&stored).unwrap(), "shpss_supersecret");

        assert_eq!(
            h.flow.masked_client_secret("t1").await.unwrap().unwrap(),
            masked
        );
    }

    #[tokio::test]
    async fn disconnect_clears_connection_and_audits() {
        let h = setup().await;
        seed_tenant(&h, true).await;

        h.flow.disconnect("t1", None).await.unwrap();

        let tenant = queries::tenants::get_tenant(&h.db, "t1").await.unwrap().unwrap();
        assert!(tenant.store_client_secret.is_none());
        assert!(tenant.store_access_token.is_none());

        let rows = h
            .audit
            .get_audit_logs(AuditQuery {
                action: Some("oauth_disconnect".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
