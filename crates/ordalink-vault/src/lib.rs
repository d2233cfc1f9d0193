// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! At-rest secret encryption for the Ordalink CRM core.
//!
//! Tenant store credentials and access tokens are never persisted in
//! plaintext. [`EncryptionService`] seals them with AES-256-GCM into a
//! `nonce:tag:ciphertext` base64 envelope keyed by a process-wide 256-bit key.

pub mod crypto;
pub mod service;

pub use service::EncryptionService;
