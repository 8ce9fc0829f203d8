//! EventHub Server
//!
//! Serves the booking API and the payment provider callbacks.
//!
//! This binary:
//! - Loads configuration from the environment (and `.env`)
//! - Exposes Prometheus metrics on `METRICS_PORT`
//! - Connects to `PostgreSQL` and runs migrations
//!   (or keeps everything in memory with `EVENTHUB_STORE=memory`)
//! - Serves HTTP until Ctrl+C
//!
//! # Usage
//!
//! ```bash
//! RAZORPAY_KEY_ID=rzp_test_... RAZORPAY_KEY_SECRET=... RAZORPAY_WEBHOOK_SECRET=... \
//!   cargo run --bin server
//! ```

use anyhow::Context;
use eventhub::gateway::RazorpayClient;
use eventhub::store::{BookingStore, InMemoryStore, PostgresStore};
use eventhub::{api, metrics, Config, EventHub};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,eventhub=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting EventHub server...");

    let config = Config::from_env();
    tracing::info!(
        port = config.server.port,
        public_base_url = %config.server.public_base_url,
        test_mode = config.gateway.is_test_mode(),
        "Configuration loaded"
    );

    // Metrics
    let metrics_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.metrics_port)
        .parse()
        .context("invalid metrics address")?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .context("failed to install Prometheus exporter")?;
    metrics::register_business_metrics();
    tracing::info!(%metrics_addr, "✓ Metrics exporter listening");

    let gateway = Arc::new(RazorpayClient::new(&config.gateway).context("failed to build payment client")?);

    if std::env::var("EVENTHUB_STORE").is_ok_and(|store| store == "memory") {
        tracing::warn!("Using in-memory store; data is lost on shutdown");
        let hub = EventHub::new(InMemoryStore::new(), gateway, config.clone());
        return serve(hub, &config).await;
    }

    let store = PostgresStore::connect(&config.postgres)
        .await
        .context("failed to connect to PostgreSQL")?;
    store.migrate().await.context("migrations failed")?;
    tracing::info!("✓ PostgreSQL connected and migrated");

    let hub = EventHub::new(store, gateway, config.clone());
    serve(hub, &config).await
}

async fn serve<S: BookingStore>(hub: EventHub<S>, config: &Config) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(%addr, "EventHub is running! Press Ctrl+C to shutdown");

    axum::serve(listener, api::router(Arc::new(hub)))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down gracefully...");
        })
        .await
        .context("server error")?;
    Ok(())
}
