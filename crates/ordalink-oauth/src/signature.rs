// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Callback HMAC verification.
//!
//! The provider signs the callback query string with the app's client
//! secret: HMAC-SHA256 over all parameters except `hmac`, sorted
//! lexicographically by key and joined `key=value&key=value`. Comparison is
//! constant-time via `Mac::verify_slice`.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Build the canonical message the provider signed.
///
/// `params` must already exclude the `hmac` parameter; `BTreeMap` iteration
/// supplies the lexicographic key order.
pub fn canonical_message(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Verify a hex-encoded HMAC against the canonical message, keyed by the
/// tenant's client secret. Malformed hex fails verification rather than
/// erroring.
pub fn verify(secret: &str, params: &BTreeMap<String, String>, provided_hex: &str) -> bool {
    let Ok(provided) = hex::decode(provided_hex) else {
        return false;
    };
    // Key length is unrestricted for HMAC; new_from_slice cannot fail.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(canonical_message(params).as_bytes());
    mac.verify_slice(&provided).is_ok()
}

/// Sign a parameter set the way the provider does. Test-support and
/// documentation of the scheme in one place.
pub fn sign(secret: &str, params: &BTreeMap<String, String>) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
    mac.update(canonical_message(params).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
