// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Low-level AES-256-GCM seal/open operations with detached tags.
//!
//! Every call to [`seal`] generates a fresh random 128-bit nonce via the
//! system CSPRNG. Nonce reuse would be catastrophic for GCM security. The
//! nonce is 16 bytes (not GCM's usual 12) because the persisted ciphertext
//! format carries a 16-byte nonce segment.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::AeadInPlace;
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, KeyInit};
use rand::rngs::OsRng;
use rand::RngCore;

use ordalink_core::OrdalinkError;

/// AES-256-GCM parameterized with a 16-byte nonce.
type Cipher = AesGcm<Aes256, U16>;

/// Nonce length in bytes.
pub const NONCE_LEN: usize = 16;

/// Authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Encrypt plaintext with AES-256-GCM using a random 16-byte nonce.
///
/// Returns `(nonce, tag, ciphertext)` as separate parts so the caller can
/// serialize them independently.
pub fn seal(
    key: &[u8; 32],
    plaintext: &[u8],
) -> Result<([u8; NONCE_LEN], [u8; TAG_LEN], Vec<u8>), OrdalinkError> {
    let cipher = Cipher::new_from_slice(key)
        .map_err(|_| OrdalinkError::Internal("failed to create AES-256-GCM cipher".to_string()))?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let mut buf = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(&nonce), b"", &mut buf)
        .map_err(|_| OrdalinkError::Internal("AES-256-GCM encryption failed".to_string()))?;

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(&tag);

    Ok((nonce, tag_bytes, buf))
}

/// Decrypt ciphertext with AES-256-GCM.
///
/// Returns the decrypted plaintext, or a decryption failure if the key is
/// wrong or the nonce, tag, or ciphertext were tampered with.
pub fn open(
    key: &[u8; 32],
    nonce: &[u8; NONCE_LEN],
    tag: &[u8; TAG_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>, OrdalinkError> {
    let cipher = Cipher::new_from_slice(key)
        .map_err(|_| OrdalinkError::Internal("failed to create AES-256-GCM cipher".to_string()))?;

    let mut buf = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(nonce),
            b"",
            &mut buf,
            GenericArray::from_slice(tag),
        )
        .map_err(|_| {
            OrdalinkError::Decryption(
                "authentication failed -- wrong key or corrupted data".to_string(),
            )
        })?;

    Ok(buf)
}

/// Generate a random 32-byte key suitable for AES-256-GCM.
pub fn generate_random_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let key = generate_random_key();
        let plaintext = b"store access token value";

        let (nonce, tag, ciphertext) = seal(&key, plaintext).unwrap();
        let decrypted = open(&key, &nonce, &tag, &ciphertext).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn seal_produces_different_output_for_same_plaintext() {
        let key = generate_random_key();
        let plaintext = b"same input twice";

        let (nonce1, _, ct1) = seal(&key, plaintext).unwrap();
        let (nonce2, _, ct2) = seal(&key, plaintext).unwrap();

        // Random nonces should differ.
        assert_ne!(nonce1, nonce2);
        // Ciphertext should differ due to different nonces.
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn open_with_wrong_key_fails() {
        let key1 = generate_random_key();
        let key2 = generate_random_key();

        let (nonce, tag, ciphertext) = seal(&key1, b"secret data").unwrap();
        assert!(open(&key2, &nonce, &tag, &ciphertext).is_err());
    }

    #[test]
    fn ciphertext_same_length_as_plaintext_with_detached_tag() {
        let key = generate_random_key();
        let (_, _, ciphertext) = seal(&key, b"hello").unwrap();
        assert_eq!(ciphertext.len(), 5);
    }

    #[test]
    fn tampered_ciphertext_fails_decryption() {
        let key = generate_random_key();
        let (nonce, tag, mut ciphertext) = seal(&key, b"do not tamper").unwrap();
        ciphertext[0] ^= 0x01;
        assert!(open(&key, &nonce, &tag, &ciphertext).is_err());
    }

    #[test]
    fn tampered_tag_fails_decryption() {
        let key = generate_random_key();
        let (nonce, mut tag, ciphertext) = seal(&key, b"do not tamper").unwrap();
        tag[0] ^= 0x01;
        assert!(open(&key, &nonce, &tag, &ciphertext).is_err());
    }
}
