// SPDX-FileCopyrightText: 2026 Ordalink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ordalink serve` command implementation.
//!
//! Opens storage (running migrations), wires the webhook pipeline, OAuth
//! flow, audit trail, and realtime broadcaster together, and serves the
//! gateway until the process is stopped.

use std::sync::Arc;

use tracing::info;

use ordalink_audit::AuditService;
use ordalink_config::OrdalinkConfig;
use ordalink_core::OrdalinkError;
use ordalink_gateway::AppState;
use ordalink_oauth::OAuthConnectFlow;
use ordalink_realtime::{Broadcaster, ConnectAuth, WebhookTokenAuth};
use ordalink_storage::Database;
use ordalink_vault::EncryptionService;
use ordalink_webhook::WebhookIngestionPipeline;

/// Runs the `ordalink serve` command.
pub async fn run_serve(config: OrdalinkConfig) -> Result<(), OrdalinkError> {
    init_tracing(&config.server.log_level);

    info!("starting ordalink serve");

    let db = Arc::new(Database::open(&config.storage).await?);
    info!(path = %config.storage.database_path, "storage ready");

    let broadcaster = Arc::new(Broadcaster::new());
    let audit = AuditService::new(db.clone());
    let vault = Arc::new(EncryptionService::new(&config.security));

    let pipeline = Arc::new(WebhookIngestionPipeline::new(
        db.clone(),
        broadcaster.clone(),
        audit.clone(),
        &config.webhook,
    )?);
    let oauth = Arc::new(OAuthConnectFlow::new(
        db.clone(),
        vault,
        audit,
        config.oauth.clone(),
    )?);
    let connect_auth: Arc<dyn ConnectAuth> = Arc::new(WebhookTokenAuth::new(db.clone()));

    let state = AppState {
        pipeline,
        oauth,
        broadcaster,
        connect_auth,
        start_time: std::time::Instant::now(),
    };

    ordalink_gateway::start_server(&config.server.host, config.server.port, state).await
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ordalink={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn full_wiring_from_config() {
        let dir = tempdir().unwrap();
        let mut config = OrdalinkConfig::default();
        config.storage.database_path = dir.path().join("serve.db").to_str().unwrap().to_string();

        let db = Arc::new(Database::open(&config.storage).await.unwrap());
        let broadcaster = Arc::new(Broadcaster::new());
        let audit = AuditService::new(db.clone());
        let vault = Arc::new(EncryptionService::new(&config.security));

        let pipeline = Arc::new(
            WebhookIngestionPipeline::new(
                db.clone(),
                broadcaster.clone(),
                audit.clone(),
                &config.webhook,
            )
            .unwrap(),
        );
        let oauth = Arc::new(
            OAuthConnectFlow::new(db.clone(), vault, audit, config.oauth.clone()).unwrap(),
        );
        let connect_auth: Arc<dyn ConnectAuth> = Arc::new(WebhookTokenAuth::new(db.clone()));

        let state = AppState {
            pipeline,
            oauth,
            broadcaster,
            connect_auth,
            start_time: std::time::Instant::now(),
        };
        let _router = ordalink_gateway::router(state);
    }
}
