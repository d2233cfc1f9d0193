// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook token format: `whk_` followed by 16 hex characters.

use rand::rngs::OsRng;
use rand::RngCore;

/// Prefix marking a path segment as a webhook token rather than a tenant id.
pub const TOKEN_PREFIX: &str = "whk_";

/// Random bytes behind the hex part of the token.
const TOKEN_BYTES: usize = 8;

/// Generate a fresh webhook token from the system CSPRNG.
pub fn generate_webhook_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("{TOKEN_PREFIX}{}", hex::encode(bytes))
}

/// Whether an inbound identifier claims to be a webhook token. A claimed
/// token that fails lookup is rejected outright; it never falls back to
/// legacy-id interpretation.
pub fn is_webhook_token(identifier: &str) -> bool {
    identifier.starts_with(TOKEN_PREFIX)
}
