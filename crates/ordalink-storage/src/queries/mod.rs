// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per table family.

pub mod audit;
pub mod customers;
pub mod messages;
pub mod oauth_states;
pub mod orders;
pub mod tenants;
pub mod webhook_logs;
