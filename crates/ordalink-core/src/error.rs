// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Ordalink CRM core.

use thiserror::Error;

use crate::types::OrderStatus;

/// The primary error type used across all Ordalink crates.
///
/// Every variant maps to a stable wire code via [`OrdalinkError::code`]; the
/// gateway derives HTTP status codes from the same mapping. Not-found and
/// unauthorized are deliberately merged into one variant so responses never
/// leak whether an entity exists under another tenant.
#[derive(Debug, Error)]
pub enum OrdalinkError {
    /// Request payload failed validation (missing or malformed fields).
    #[error("validation error: {0}")]
    Validation(String),

    /// Entity missing or owned by another tenant. Single merged variant by
    /// design; callers must not be able to distinguish the two cases.
    #[error("{entity} not found or unauthorized")]
    NotFoundOrUnauthorized { entity: &'static str },

    /// A webhook token had the recognized format but matched no tenant.
    #[error("invalid webhook token")]
    InvalidToken,

    /// No tenant could be resolved for an inbound webhook call.
    #[error("no tenant found: {0}")]
    NoTenantFound(String),

    /// OAuth start requires store domain, client id, and client secret.
    #[error("store credentials not configured")]
    CredentialsNotConfigured,

    /// Missing/expired OAuth state, HMAC mismatch, or bad connect credential.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Configuration errors (missing or malformed encryption key, redirect URI).
    #[error("configuration error: {0}")]
    Config(String),

    /// Ciphertext could not be decrypted (bad format, tag mismatch, wrong key).
    #[error("decryption failure: {0}")]
    Decryption(String),

    /// An order transition out of a terminal state was attempted.
    #[error("invalid order transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// External collaborator (relay, OAuth token endpoint) failed or was unreachable.
    #[error("upstream failure: {message}")]
    Upstream {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Outbound call exceeded its bounded timeout.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Storage backend errors (connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl OrdalinkError {
    /// Stable wire code for API error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFoundOrUnauthorized { .. } => "NOT_FOUND_OR_UNAUTHORIZED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::NoTenantFound(_) => "NO_TENANT_FOUND",
            Self::CredentialsNotConfigured => "CREDENTIALS_NOT_CONFIGURED",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Decryption(_) => "DECRYPTION_FAILURE",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Upstream { .. } | Self::Timeout { .. } => "UPSTREAM_FAILURE",
            Self::Storage { .. } | Self::Internal(_) => "SERVER_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            OrdalinkError::Validation("x".into()).code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            OrdalinkError::NotFoundOrUnauthorized { entity: "order" }.code(),
            "NOT_FOUND_OR_UNAUTHORIZED"
        );
        assert_eq!(OrdalinkError::InvalidToken.code(), "INVALID_TOKEN");
        assert_eq!(
            OrdalinkError::NoTenantFound("empty".into()).code(),
            "NO_TENANT_FOUND"
        );
        assert_eq!(
            OrdalinkError::CredentialsNotConfigured.code(),
            "CREDENTIALS_NOT_CONFIGURED"
        );
        assert_eq!(
            OrdalinkError::Unauthorized("state".into()).code(),
            "UNAUTHORIZED"
        );
        assert_eq!(OrdalinkError::Config("key".into()).code(), "CONFIG_ERROR");
        assert_eq!(
            OrdalinkError::Decryption("tag".into()).code(),
            "DECRYPTION_FAILURE"
        );
        assert_eq!(
            OrdalinkError::Timeout {
                duration: std::time::Duration::from_secs(10)
            }
            .code(),
            "UPSTREAM_FAILURE"
        );
    }

    #[test]
    fn not_found_message_is_merged() {
        let err = OrdalinkError::NotFoundOrUnauthorized { entity: "customer" };
        // One merged message, never separate not-found vs unauthorized wording.
        assert_eq!(err.to_string(), "customer not found or unauthorized");
    }
}
