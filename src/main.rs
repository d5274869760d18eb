//! Gigstack n8n node host
//!
//! Serves the Gigstack action node and trigger over HTTP.
//!
//! ## Endpoints
//!
//! - `POST /webhook/gigstack` - Trigger delivery from Gigstack
//! - `POST /execute` - Run an action node operation over a batch of items
//! - `GET /credentials/test` - Verify the configured API token
//! - `GET /healthz` - Health check
//!
//! ## Trigger lifecycle
//!
//! With `WEBHOOK_URL` and `GIGSTACK_TRIGGER_EVENTS` set, the host adopts or
//! creates a Gigstack webhook on startup and deletes it on Ctrl-C.

use anyhow::Context;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gigstack_n8n::config::{AppState, Config};
use gigstack_n8n::handlers::router;
use gigstack_n8n::trigger::{WebhookManager, WebhookStaticData};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gigstack_n8n=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();
    let bind_addr = config.bind_addr();

    info!("Starting Gigstack node host");
    info!("Gigstack API: {} ({})", config.base_url, config.environment);
    info!("Binding to: {}", bind_addr);

    let state = AppState::new(config).context("failed to build Gigstack client")?;

    // Activate the trigger
    let trigger = state
        .config
        .trigger_settings()
        .map(|settings| WebhookManager::new(state.transport.clone(), settings));
    let static_data_path = state.config.static_data_path.clone();
    let mut static_data = WebhookStaticData::load(&static_data_path).await?;

    match &trigger {
        Some(manager) => {
            if manager.activate(&mut static_data).await? {
                static_data.save(&static_data_path).await?;
                info!(
                    callback = %manager.settings().callback_url,
                    "Trigger active for {} event(s)",
                    manager.settings().events.len()
                );
            } else {
                warn!("Trigger could not be registered with Gigstack");
            }
        }
        None => info!("Trigger disabled (set WEBHOOK_URL and GIGSTACK_TRIGGER_EVENTS)"),
    }

    // Log delivered records
    let mut deliveries = state.deliveries.subscribe();
    tokio::spawn(async move {
        loop {
            match deliveries.recv().await {
                Ok(record) => {
                    let event = record
                        .json
                        .get("event")
                        .and_then(Value::as_str)
                        .unwrap_or("-")
                        .to_string();
                    let payload = Value::Object(record.json);
                    info!(event = %event, "Gigstack event: {}", payload);
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Delivery log lagging"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let app = router(state.clone());

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", bind_addr))?;

    info!("Server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // Deactivate the trigger
    if let Some(manager) = &trigger {
        if manager.delete(&mut static_data).await {
            info!("Trigger deactivated");
        } else {
            warn!("Trigger webhook was not deleted; id kept for the next run");
        }
        static_data.save(&static_data_path).await?;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
