// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound message relay.
//!
//! Operator-sent messages are forwarded to the tenant's configured relay URL
//! (the bridge that actually talks to the messaging provider). Delivery is
//! best-effort with a bounded timeout; the caller decides what a failure
//! means, and for message sending it is never fatal to local persistence.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use ordalink_core::types::MessageKind;
use ordalink_core::OrdalinkError;

/// Normalized payload delivered to the relay endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    pub phone: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    pub timestamp: String,
}

/// HTTP client for the per-tenant relay URL.
pub struct RelayClient {
    http: reqwest::Client,
}

impl RelayClient {
    pub fn new(timeout_secs: u64) -> Result<Self, OrdalinkError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| OrdalinkError::Internal(format!("failed to build relay client: {e}")))?;
        Ok(Self { http })
    }

    /// POST the payload to the relay URL. Timeouts, connection failures, and
    /// non-2xx responses all surface as `UPSTREAM_FAILURE`.
    pub async fn forward(
        &self,
        relay_url: &str,
        payload: &OutboundMessage,
    ) -> Result<(), OrdalinkError> {
        let response = self
            .http
            .post(relay_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| OrdalinkError::Upstream {
                message: format!("relay request to {relay_url} failed"),
                source: Some(Box::new(e)),
            })?;

        if !response.status().is_success() {
            return Err(OrdalinkError::Upstream {
                message: format!(
                    "relay at {relay_url} returned {}",
                    response.status()
                ),
                source: None,
            });
        }
        debug!(url = relay_url, "outbound message relayed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordalink_core::types::now_rfc3339;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload() -> OutboundMessage {
        OutboundMessage {
            phone: "+201234567890".to_string(),
            content: "Your order shipped".to_string(),
            kind: MessageKind::Text,
            media_url: None,
            timestamp: now_rfc3339(),
        }
    }

    #[tokio::test]
    async fn forwards_normalized_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/relay"))
            .and(body_partial_json(serde_json::json!({
                "phone": "+201234567890",
                "content": "Your order shipped",
                "type": "text"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = RelayClient::new(10).unwrap();
        client
            .forward(&format!("{}/relay", server.uri()), &payload())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_2xx_is_upstream_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = RelayClient::new(10).unwrap();
        let err = client.forward(&server.uri(), &payload()).await.unwrap_err();
        assert_eq!(err.code(), "UPSTREAM_FAILURE");
    }

    #[tokio::test]
    async fn unreachable_relay_is_upstream_failure() {
        // Reserved port with nothing listening.
        let client = RelayClient::new(1).unwrap();
        let err = client
            .forward("http://127.0.0.1:9/relay", &payload())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UPSTREAM_FAILURE");
    }
}
