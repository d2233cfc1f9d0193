// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error-to-response mapping.
//!
//! Every handler returns `Result<_, ApiError>`; the wire envelope is always
//! `{"error": "...", "code": "...", "timestamp": "..."}` with an HTTP status
//! derived from the stable error code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use ordalink_core::types::now_rfc3339;
use ordalink_core::OrdalinkError;

/// Wrapper so `?` works directly on domain errors in handlers.
#[derive(Debug)]
pub struct ApiError(pub OrdalinkError);

impl From<OrdalinkError> for ApiError {
    fn from(err: OrdalinkError) -> Self {
        Self(err)
    }
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: String,
    code: &'static str,
    timestamp: String,
}

/// HTTP status for a stable error code.
pub fn status_for(err: &OrdalinkError) -> StatusCode {
    match err.code() {
        "VALIDATION_ERROR" | "CREDENTIALS_NOT_CONFIGURED" => StatusCode::BAD_REQUEST,
        "INVALID_TOKEN" | "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
        "NOT_FOUND_OR_UNAUTHORIZED" | "NO_TENANT_FOUND" => StatusCode::NOT_FOUND,
        "INVALID_TRANSITION" => StatusCode::CONFLICT,
        "UPSTREAM_FAILURE" => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = ErrorEnvelope {
            error: self.0.to_string(),
            code: self.0.code(),
            timestamp: now_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}
