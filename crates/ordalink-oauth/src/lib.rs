// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store OAuth connect flow.
//!
//! Two-step handshake with an external e-commerce store: `start` issues a
//! single-use CSRF state and an authorize URL; `callback` atomically claims
//! the state, verifies the provider HMAC against the tenant's client secret,
//! exchanges the code for an access token, and persists that token encrypted.

pub mod flow;
pub mod signature;

pub use flow::{CallbackQuery, OAuthConnectFlow, StartOutcome};
