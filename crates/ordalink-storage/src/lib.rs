// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Ordalink CRM core.
//!
//! WAL-mode SQLite with embedded migrations and a single-writer concurrency
//! model via `tokio-rusqlite`. All multi-tenant invariants that must hold
//! under concurrent webhook delivery (customer uniqueness, order idempotency,
//! single-use OAuth states, pending-only order transitions) are enforced here
//! with atomic conditional statements, not read-then-write sequences.

pub mod database;
pub mod migrations;
pub mod queries;

pub use database::Database;
