// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant-isolated realtime event broadcast.
//!
//! Services publish [`RealtimeEvent`]s after their durable write commits; the
//! gateway's websocket handler subscribes each authenticated connection to
//! exactly its own tenant's topic. Publishing is fire-and-forget: no
//! subscribers, slow subscribers, and serialization all never block or fail
//! the publishing request.

pub mod auth;
pub mod broadcaster;
pub mod events;

pub use auth::{ConnectAuth, WebhookTokenAuth};
pub use broadcaster::Broadcaster;
pub use events::{OrderEventAction, RealtimeEvent};
