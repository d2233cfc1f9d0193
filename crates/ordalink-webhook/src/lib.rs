// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook ingestion for the Ordalink CRM core.
//!
//! Everything between "an HTTP request arrived with some ambiguous tenant
//! hints" and "durable rows exist and subscribers were notified" lives here:
//! tenant resolution, customer upsert, message persistence, the text-driven
//! order state machine, provider order normalization, and the outbound relay.

pub mod orders;
pub mod payload;
pub mod pipeline;
pub mod relay;
pub mod resolver;
pub mod token;
pub mod upsert;

pub use orders::{OrderStateMachine, ReplyIntent};
pub use payload::{ButtonAction, ButtonPayload, IncomingMessage, ProviderOrder};
pub use pipeline::{ButtonOutcome, OrderSyncOutcome, WebhookIngestionPipeline};
pub use relay::{OutboundMessage, RelayClient};
pub use resolver::{ResolutionHints, TenantResolver};
pub use token::{generate_webhook_token, is_webhook_token};
pub use upsert::CustomerUpsertService;
