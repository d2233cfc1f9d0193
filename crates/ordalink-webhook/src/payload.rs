// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound payload shapes and provider order normalization.
//!
//! Providers disagree on where the customer phone lives and whether totals
//! are strings; everything is normalized here before the pipeline touches
//! storage.

use serde::Deserialize;

use ordalink_core::types::MessageKind;

/// Sentinel used when no phone number could be extracted from an order.
pub const UNKNOWN_PHONE: &str = "unknown";

/// A normalized inbound chat message.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub phone: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub kind: Option<MessageKind>,
    pub media_url: Option<String>,
    pub duration_secs: Option<i64>,
    /// Sender display name, used only when creating a new customer.
    pub name: Option<String>,
}

/// A button / quick-reply action payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ButtonPayload {
    pub action: ButtonAction,
    pub phone: Option<String>,
    /// Explicit order to act on; defaults to the customer's latest pending.
    pub order_id: Option<String>,
}

/// Providers send these capitalized (`"Confirm"`); lowercase is accepted too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonAction {
    #[serde(alias = "Confirm")]
    Confirm,
    #[serde(alias = "Cancel")]
    Cancel,
    #[serde(alias = "Support")]
    Support,
}

/// Provider-shaped order payload (e-commerce order-sync webhook). Unknown
/// fields are ignored; everything here is optional because providers omit
/// freely.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderOrder {
    /// External order id; may arrive as a number or a string.
    pub id: Option<serde_json::Value>,
    /// Display number, e.g. `"#1001"`.
    pub name: Option<String>,
    pub order_number: Option<serde_json::Value>,
    pub total_price: Option<serde_json::Value>,
    pub customer: Option<ProviderCustomer>,
    pub shipping_address: Option<ProviderAddress>,
    pub billing_address: Option<ProviderAddress>,
    pub phone: Option<String>,
    pub line_items: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderCustomer {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderAddress {
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// Provider order reduced to exactly what storage needs.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedOrder {
    pub external_order_id: Option<String>,
    pub order_number: String,
    pub total: f64,
    pub customer_name: String,
    pub customer_phone: String,
    pub items: Option<String>,
}

impl ProviderOrder {
    /// Collapse the provider payload into a [`NormalizedOrder`].
    ///
    /// Phone fallback chain: customer, then shipping, then billing, then the
    /// top-level field, sanitized to digits and `+`; empty results become the
    /// `"unknown"` sentinel. Unparseable totals become `0.0`.
    pub fn normalize(&self) -> NormalizedOrder {
        let phone = self
            .customer
            .as_ref()
            .and_then(|c| c.phone.as_deref())
            .or_else(|| self.shipping_address.as_ref().and_then(|a| a.phone.as_deref()))
            .or_else(|| self.billing_address.as_ref().and_then(|a| a.phone.as_deref()))
            .or(self.phone.as_deref())
            .map(sanitize_phone)
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| UNKNOWN_PHONE.to_string());

        let name = self
            .customer
            .as_ref()
            .map(|c| {
                [c.first_name.as_deref(), c.last_name.as_deref()]
                    .iter()
                    .flatten()
                    .copied()
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|n| !n.trim().is_empty())
            .or_else(|| {
                self.shipping_address
                    .as_ref()
                    .and_then(|a| a.name.clone())
                    .filter(|n| !n.trim().is_empty())
            })
            .unwrap_or_else(|| "Unknown".to_string());

        let external_order_id = self.id.as_ref().map(value_to_string);
        let order_number = self
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| self.order_number.as_ref().map(value_to_string))
            .or_else(|| external_order_id.clone())
            .unwrap_or_else(|| "unknown".to_string());

        let total = match &self.total_price {
            Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0.0),
            _ => 0.0,
        };

        NormalizedOrder {
            external_order_id,
            order_number,
            total,
            customer_name: name,
            customer_phone: phone,
            items: self.line_items.as_ref().map(|v| v.to_string()),
        }
    }
}

/// Keep digits and a leading-or-anywhere `+`; drop spacing, dashes, parens.
pub fn sanitize_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect()
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
