// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket gateway for the Ordalink CRM core.
//!
//! Routes webhook ingress, button actions, order sync, the OAuth connect
//! flow, outbound message sends, and the per-tenant realtime channel onto
//! the underlying services. All responses share one error envelope with
//! stable codes.

pub mod error;
pub mod handlers;
pub mod server;
pub mod ws;

pub use server::{router, start_server, AppState};
