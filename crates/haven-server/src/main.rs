//! # Haven Server
//!
//! Bridges home-safety IoT devices to dashboard observers and the store.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! haven
//!
//! # Run with custom config
//! # (first existing file of haven.toml, /etc/haven/haven.toml,
//! #  ~/.config/haven/haven.toml is used)
//!
//! # Run with environment variables
//! HAVEN_PORT=8080 HAVEN_HOST=0.0.0.0 haven
//! ```

mod config;
mod handlers;
mod metrics;

use anyhow::Result;
use haven_bus::Bus;
use haven_core::{EventRouter, ObserverHub, PersistenceGateway, RouterConfig};
use haven_store::{PostgresPersistenceGateway, StoreClient};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "haven=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting Haven server on {}:{}", config.host, config.port);

    // Initialize metrics
    if config.metrics.enabled {
        metrics::init_metrics();
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            tracing::error!("Failed to start metrics server: {}", e);
        }
    }

    // The store is a best-effort collaborator: a dead database must not
    // stop the real-time path, so startup only warns.
    let store_client = StoreClient::new(&config.store)?;
    if let Err(e) = store_client.ping().await {
        tracing::warn!("Store unreachable at startup, persisting best-effort: {e}");
    }
    let store: Arc<dyn PersistenceGateway> = Arc::new(PostgresPersistenceGateway::new(
        store_client,
        config.store.retry,
    ));

    // Device bus: one session carries both ingest and command publish.
    let bus = Bus::connect(&config.bus);
    let commands = Arc::new(bus.command_gateway());

    let hub = Arc::new(ObserverHub::new());
    let router = Arc::new(EventRouter::new(
        Arc::clone(&hub),
        Arc::clone(&store),
        commands,
        RouterConfig {
            write_queue_capacity: config.router.write_queue_capacity,
        },
    ));

    let subscription = bus.spawn_ingest(Arc::clone(&router));

    let state = Arc::new(handlers::AppState {
        hub,
        router: Arc::clone(&router),
        store,
    });

    handlers::run_server(&config, state, shutdown_signal()).await?;

    // Close the bus first so no new writes arrive, then let pending
    // persistence writes finish up to the configured bound.
    subscription.shutdown().await;
    router
        .shutdown(Duration::from_millis(config.shutdown.drain_ms))
        .await;

    tracing::info!("Haven server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
