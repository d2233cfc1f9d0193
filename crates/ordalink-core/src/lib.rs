// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Ordalink CRM.
//!
//! This crate provides the workspace-wide error taxonomy and the domain model
//! types (tenants, customers, messages, orders, audit entries). It contains no
//! I/O; storage and services build on top of it.

pub mod error;
pub mod types;

pub use error::OrdalinkError;
pub use types::{
    AuditLogEntry, Customer, Direction, Message, MessageKind, MessageStatus, OAuthState, Order,
    OrderStatus, Tenant, WebhookLogEntry, SYSTEM_ACTOR,
};
