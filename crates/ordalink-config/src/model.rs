// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Ordalink CRM core.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Ordalink configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OrdalinkConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// At-rest encryption settings.
    #[serde(default)]
    pub security: SecurityConfig,

    /// Store OAuth connect flow settings.
    #[serde(default)]
    pub oauth: OAuthConfig,

    /// Webhook ingestion settings.
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    "ordalink.db".to_string()
}

fn default_true() -> bool {
    true
}

/// At-rest encryption configuration.
///
/// The key is validated lazily on first encrypt/decrypt, not at process
/// start, so installs that never touch the OAuth flow can run without one.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityConfig {
    /// 256-bit AES key as 64 hex characters. `None` disables the vault until
    /// first use fails with a configuration error.
    #[serde(default)]
    pub encryption_key: Option<String>,
}

/// Store OAuth connect flow configuration. Process-wide; per-tenant client
/// credentials live in storage.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OAuthConfig {
    /// Redirect URI registered with the store provider. Required to start a
    /// connect flow.
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// Comma-separated scope list for the authorize URL.
    #[serde(default = "default_scopes")]
    pub scopes: String,

    /// Where to send the operator's browser after a successful callback.
    #[serde(default = "default_success_url")]
    pub success_url: String,

    /// Bounded timeout for the token-exchange call, in seconds.
    #[serde(default = "default_exchange_timeout")]
    pub exchange_timeout_secs: u64,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            redirect_uri: None,
            scopes: default_scopes(),
            success_url: default_success_url(),
            exchange_timeout_secs: default_exchange_timeout(),
        }
    }
}

fn default_scopes() -> String {
    "read_orders,write_webhooks".to_string()
}

fn default_success_url() -> String {
    "http://localhost:3000/settings?store=connected".to_string()
}

fn default_exchange_timeout() -> u64 {
    10
}

/// Webhook ingestion configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    /// When no token, legacy id, phone, or domain hint resolves a tenant,
    /// fall back to the earliest-registered tenant. Safe only for
    /// single-tenant installs; a warning is logged on every use.
    #[serde(default = "default_true")]
    pub allow_first_tenant_fallback: bool,

    /// Bounded timeout for outbound relay calls, in seconds.
    #[serde(default = "default_relay_timeout")]
    pub relay_timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            allow_first_tenant_fallback: true,
            relay_timeout_secs: default_relay_timeout(),
        }
    }
}

fn default_relay_timeout() -> u64 {
    10
}
