// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`EncryptionService`]: the at-rest secret envelope used for store client
//! secrets and access tokens.
//!
//! Wire format is three colon-separated base64 segments:
//! `base64(nonce):base64(tag):base64(ciphertext)`. The key comes from
//! `security.encryption_key` (64 hex characters, 32 bytes) and is validated
//! lazily on first use, never at process start.

use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use ordalink_config::model::SecurityConfig;
use ordalink_core::OrdalinkError;

use crate::crypto::{self, NONCE_LEN, TAG_LEN};

/// Required key length in bytes (AES-256).
const KEY_LEN: usize = 32;

/// Encrypts and decrypts tenant secrets with AES-256-GCM.
///
/// `encrypt` is non-deterministic: identical plaintext yields a different
/// ciphertext on every call. `decrypt(encrypt(x)) == x` for all strings,
/// including empty and multi-megabyte inputs.
pub struct EncryptionService {
    configured_key: Option<String>,
    key: OnceLock<Result<[u8; KEY_LEN], String>>,
}

impl EncryptionService {
    /// Create a service from security configuration. The key is not parsed
    /// or validated until the first encrypt/decrypt call.
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            configured_key: config.encryption_key.clone(),
            key: OnceLock::new(),
        }
    }

    /// Encrypt plaintext, returning `nonce:tag:ciphertext` (base64 segments).
    pub fn encrypt(&self, plaintext: &str) -> Result<String, OrdalinkError> {
        let key = self.key()?;
        let (nonce, tag, ciphertext) = crypto::seal(&key, plaintext.as_bytes())?;
        Ok(format!(
            "{}:{}:{}",
            BASE64.encode(nonce),
            BASE64.encode(tag),
            BASE64.encode(ciphertext)
        ))
    }

    /// Decrypt a `nonce:tag:ciphertext` envelope produced by [`encrypt`].
    ///
    /// Rejects any input that does not split into exactly three segments, and
    /// any envelope whose tag or payload was altered after encryption.
    ///
    /// [`encrypt`]: EncryptionService::encrypt
    pub fn decrypt(&self, envelope: &str) -> Result<String, OrdalinkError> {
        let key = self.key()?;

        let parts: Vec<&str> = envelope.split(':').collect();
        if parts.len() != 3 {
            return Err(OrdalinkError::Decryption(format!(
                "invalid ciphertext format: expected nonce:tag:ciphertext, got {} segment(s)",
                parts.len()
            )));
        }

        let nonce_bytes = decode_segment(parts[0], "nonce")?;
        let tag_bytes = decode_segment(parts[1], "tag")?;
        let ciphertext = decode_segment(parts[2], "ciphertext")?;

        let nonce: [u8; NONCE_LEN] = nonce_bytes.try_into().map_err(|_| {
            OrdalinkError::Decryption(format!("nonce segment must be {NONCE_LEN} bytes"))
        })?;
        let tag: [u8; TAG_LEN] = tag_bytes.try_into().map_err(|_| {
            OrdalinkError::Decryption(format!("tag segment must be {TAG_LEN} bytes"))
        })?;

        let plaintext = crypto::open(&key, &nonce, &tag, &ciphertext)?;
        String::from_utf8(plaintext)
            .map_err(|_| OrdalinkError::Decryption("plaintext is not valid UTF-8".to_string()))
    }

    /// Mask a secret for display, keeping only the last `visible_chars`
    /// characters. Inputs no longer than `visible_chars` become `"****"`.
    pub fn mask_secret(secret: &str, visible_chars: usize) -> String {
        let len = secret.chars().count();
        if len <= visible_chars {
            return "****".to_string();
        }

        let stars = "*".repeat((len - visible_chars).max(4));
        let visible: String = secret
            .chars()
            .skip(len - visible_chars)
            .collect();
        format!("{stars}{visible}")
    }

    /// Parse and cache the configured key, failing fast on first use when it
    /// is absent, empty, or malformed.
    fn key(&self) -> Result<[u8; KEY_LEN], OrdalinkError> {
        let cached = self.key.get_or_init(|| parse_key(self.configured_key.as_deref()));
        match cached {
            Ok(key) => Ok(*key),
            Err(message) => Err(OrdalinkError::Config(message.clone())),
        }
    }
}

fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>, OrdalinkError> {
    BASE64
        .decode(segment)
        .map_err(|_| OrdalinkError::Decryption(format!("{name} segment is not valid base64")))
}

fn parse_key(configured: Option<&str>) -> Result<[u8; KEY_LEN], String> {
    let hex_key = match configured {
        Some(k) if !k.trim().is_empty() => k.trim(),
        _ => {
            return Err(
                "security.encryption_key is not set (expected 64 hex characters)".to_string(),
            )
        }
    };

    let bytes = hex::decode(hex_key)
        .map_err(|_| "security.encryption_key is not valid hex".to_string())?;

    bytes.try_into().map_err(|b: Vec<u8>| {
        format!(
            "security.encryption_key must be {KEY_LEN} bytes (64 hex characters), got {} bytes",
            b.len()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn service_with_key() -> EncryptionService {
        let key = hex::encode(crate::crypto::generate_random_key());
        EncryptionService::new(&SecurityConfig {
            encryption_key: Some(key),
        })
    }

    #[test]
    fn roundtrip_simple_string() {
        let svc = service_with_key();
        let ct = svc.encrypt("shpat_1234567890abcdef").unwrap();
        assert_eq!(svc.decrypt(&ct).unwrap(), "shpat_1234567890abcdef");
    }

    #[test]
    fn roundtrip_empty_string() {
        let svc = service_with_key();
        let ct = svc.encrypt("").unwrap();
        assert_eq!(svc.decrypt(&ct).unwrap(), "");
    }

    #[test]
    fn roundtrip_large_input() {
        let svc = service_with_key();
        let plaintext = "x".repeat(200 * 1024);
        let ct = svc.encrypt(&plaintext).unwrap();
        assert_eq!(svc.decrypt(&ct).unwrap(), plaintext);
    }

    #[test]
    fn encrypt_is_non_deterministic() {
        let svc = service_with_key();
        let ct1 = svc.encrypt("same plaintext").unwrap();
        let ct2 = svc.encrypt("same plaintext").unwrap();
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn envelope_has_three_base64_segments() {
        let svc = service_with_key();
        let ct = svc.encrypt("hello").unwrap();
        let parts: Vec<&str> = ct.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(BASE64.decode(parts[0]).unwrap().len(), NONCE_LEN);
        assert_eq!(BASE64.decode(parts[1]).unwrap().len(), TAG_LEN);
    }

    #[test]
    fn decrypt_rejects_wrong_segment_count() {
        let svc = service_with_key();
        for bad in ["", "abc", "a:b", "a:b:c:d"] {
            let err = svc.decrypt(bad).unwrap_err();
            assert_eq!(err.code(), "DECRYPTION_FAILURE", "input: {bad:?}");
        }
    }

    #[test]
    fn decrypt_rejects_tampered_tag() {
        let svc = service_with_key();
        let ct = svc.encrypt("integrity matters").unwrap();
        let mut parts: Vec<String> = ct.split(':').map(String::from).collect();
        let mut tag = BASE64.decode(&parts[1]).unwrap();
        tag[0] ^= 0x01;
        parts[1] = BASE64.encode(tag);
        assert!(svc.decrypt(&parts.join(":")).is_err());
    }

    #[test]
    fn decrypt_rejects_tampered_payload() {
        let svc = service_with_key();
        let ct = svc.encrypt("integrity matters").unwrap();
        let mut parts: Vec<String> = ct.split(':').map(String::from).collect();
        let mut payload = BASE64.decode(&parts[2]).unwrap();
        payload[0] ^= 0x01;
        parts[2] = BASE64.encode(payload);
        assert!(svc.decrypt(&parts.join(":")).is_err());
    }

    #[test]
    fn decrypt_rejects_non_base64_segment() {
        let svc = service_with_key();
        let err = svc.decrypt("!!:!!:!!").unwrap_err();
        assert_eq!(err.code(), "DECRYPTION_FAILURE");
    }

    #[test]
    fn missing_key_fails_on_first_use_not_construction() {
        let svc = EncryptionService::new(&SecurityConfig {
            encryption_key: None,
        });
        let err = svc.encrypt("x").unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn empty_key_fails_with_config_error() {
        let svc = EncryptionService::new(&SecurityConfig {
            encryption_key: Some("  ".to_string()),
        });
        assert_eq!(svc.encrypt("x").unwrap_err().code(), "CONFIG_ERROR");
    }

    #[test]
    fn short_key_fails_with_config_error() {
        let svc = EncryptionService::new(&SecurityConfig {
            encryption_key: Some("deadbeef".to_string()),
        });
        assert_eq!(svc.decrypt("a:b:c").unwrap_err().code(), "CONFIG_ERROR");
    }

    #[test]
    fn mask_secret_short_inputs() {
        assert_eq!(EncryptionService::mask_secret("abcd", 4), "****");
        assert_eq!(EncryptionService::mask_secret("", 4), "****");
        assert_eq!(EncryptionService::mask_secret("", 0), "****");
        assert_eq!(EncryptionService::mask_secret("ab", 4), "****");
    }

    #[test]
    fn mask_secret_keeps_last_visible_chars() {
        let masked = EncryptionService::mask_secret("abcde", 4);
        assert!(masked.ends_with("bcde"));
        // At least 4 stars even when only one char is hidden.
        assert!(masked.starts_with("****"));
        assert_eq!(masked, "****bcde");
    }

    #[test]
    fn mask_secret_long_input() {
        let masked = EncryptionService::mask_secret("shpss_0123456789abcdef", 4);
        assert!(masked.ends_with("cdef"));
        assert_eq!(masked.len(), 22);
        assert!(masked[..18].chars().all(|c| c == '*'));
    }

    proptest! {
        #[test]
        fn roundtrip_identity_for_arbitrary_strings(s in ".*") {
            let svc = service_with_key();
            let ct = svc.encrypt(&s).unwrap();
            prop_assert_eq!(svc.decrypt(&ct).unwrap(), s);
        }
    }
}
