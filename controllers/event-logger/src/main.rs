//! Kubernetes Event Logger
//!
//! Watches one resource collection and logs every change notification.
//! Failed watch attempts are retried forever; the process runs until killed.

mod config;

use anyhow::Result;
use config::Config;
use kubernetes_client::WatchEvent;
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn log_event(event: Value) {
    match WatchEvent::from_value(event) {
        Ok(event) => info!(
            kind = event.kind().unwrap_or("-"),
            name = event.name().unwrap_or("-"),
            resource_version = event.resource_version().unwrap_or("-"),
            "{:?}",
            event.event_type
        ),
        Err(e) => warn!("Unrecognised watch record: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Kubernetes event logger");

    let config = Config::from_env()?;

    info!("Configuration:");
    info!("  API server: {}", config.api_url.as_deref().unwrap_or("in-cluster"));
    info!("  Endpoint: {}", config.endpoint);
    info!("  Snapshot: {}", config.snapshot);
    info!("  Resume policy: {:?}", config.resume_policy);
    if let Some(resource_version) = &config.resource_version {
        info!("  Resource version: {}", resource_version);
    }

    let client = config.client_factory()?.construct_client()?;

    if config.snapshot {
        client
            .watch_with_snapshot(&config.endpoint, log_event, |snapshot| {
                let items = snapshot["items"].as_array().map_or(0, Vec::len);
                info!(items, "Initial snapshot received");
            })
            .await;
    } else {
        client.watch(&config.endpoint, log_event).await;
    }

    Ok(())
}
