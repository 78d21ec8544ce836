//! Portwatch daemon entry point.

use log::{error, info};
use tokio::signal;

mod config;
mod error;
mod monitor;
mod notify;
mod reconcile;
mod source;
mod store;
mod types;

use config::{Config, SourceKind};
use monitor::Monitor;
use notify::WebhookNotifier;
use source::{DockerSource, PortainerSource, RetryPolicy, SnapshotSource};
use store::JsonFileStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Pick up a local .env before reading configuration
    dotenv::dotenv().ok();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Load configuration; anything missing is fatal here, before the loop
    let cfg = Config::load()?;
    info!(
        "Starting portwatch: source={:?}, interval={}s, state={}",
        cfg.source,
        cfg.poll_interval,
        cfg.state_file.display()
    );

    let policy = RetryPolicy {
        max_attempts: cfg.max_attempts,
        delay: cfg.retry_delay(),
        short_circuit_statuses: cfg.short_circuit_statuses.clone(),
    };

    // One client for the Portainer API and the webhook
    let client = reqwest::Client::builder()
        .timeout(cfg.request_timeout())
        .build()?;

    let source: Box<dyn SnapshotSource> = match cfg.source {
        SourceKind::Portainer => Box::new(PortainerSource::with_client(
            client.clone(),
            cfg.api_url.as_deref().unwrap_or_default(),
            cfg.api_key.as_deref().unwrap_or_default(),
            policy,
        )),
        SourceKind::Docker => Box::new(DockerSource::new(cfg.docker_endpoint.clone())?),
    };

    let notifier = WebhookNotifier::new(client, cfg.webhook_url.clone().unwrap_or_default());
    let store = JsonFileStore::new(cfg.state_file.clone());
    info!("Snapshot file: {}", store.path().display());

    let mut monitor = Monitor::new(
        source,
        notifier,
        store,
        cfg.poll_interval(),
        cfg.message_limit,
    );

    // Poll until Ctrl+C
    tokio::select! {
        _ = monitor.run() => {}
        res = signal::ctrl_c() => match res {
            Ok(()) => info!("Received Ctrl+C, shutting down..."),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        },
    }

    info!("Shutdown complete.");
    Ok(())
}
