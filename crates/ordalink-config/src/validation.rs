// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as valid bind addresses and well-formed URLs. The
//! encryption key is deliberately NOT validated here: the vault validates it
//! lazily on first use so installs that never touch encrypted credentials can
//! run without one.

use crate::diagnostic::ConfigError;
use crate::model::OrdalinkConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &OrdalinkConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // Validate server.host is not empty and looks like an IP or hostname.
    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("server.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if !LOG_LEVELS.contains(&config.server.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "server.log_level must be one of {}, got `{}`",
                LOG_LEVELS.join(", "),
                config.server.log_level
            ),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if let Some(uri) = &config.oauth.redirect_uri
        && !is_http_url(uri)
    {
        errors.push(ConfigError::Validation {
            message: format!("oauth.redirect_uri `{uri}` must be an http(s) URL"),
        });
    }

    if !is_http_url(&config.oauth.success_url) {
        errors.push(ConfigError::Validation {
            message: format!(
                "oauth.success_url `{}` must be an http(s) URL",
                config.oauth.success_url
            ),
        });
    }

    if config.oauth.exchange_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "oauth.exchange_timeout_secs must be at least 1".to_string(),
        });
    }

    if config.webhook.relay_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "webhook.relay_timeout_secs must be at least 1".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
