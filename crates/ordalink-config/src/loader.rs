// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./ordalink.toml` > `~/.config/ordalink/ordalink.toml`
//! > `/etc/ordalink/ordalink.toml` with environment variable overrides via the
//! `ORDALINK_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::OrdalinkConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/ordalink/ordalink.toml` (system-wide)
/// 3. `~/.config/ordalink/ordalink.toml` (user XDG config)
/// 4. `./ordalink.toml` (local directory)
/// 5. `ORDALINK_*` environment variables
pub fn load_config() -> Result<OrdalinkConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(OrdalinkConfig::default()))
        .merge(Toml::file("/etc/ordalink/ordalink.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("ordalink/ordalink.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("ordalink.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env vars).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<OrdalinkConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(OrdalinkConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<OrdalinkConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(OrdalinkConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `ORDALINK_SECURITY_ENCRYPTION_KEY` must
/// map to `security.encryption_key`, not `security.encryption.key`.
fn env_provider() -> Env {
    Env::prefixed("ORDALINK_").map(|key| {
        // `key` is the env var name with prefix stripped, in its original
        // (upper) case. Lowercase before matching section prefixes.
        // Example: ORDALINK_OAUTH_REDIRECT_URI -> "oauth_redirect_uri"
        let key_str = key.as_str().to_ascii_lowercase();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("security_", "security.", 1)
            .replacen("oauth_", "oauth.", 1)
            .replacen("webhook_", "webhook.", 1);
        mapped.into()
    })
}
