//! Webhook Engine API Server
//!
//! Main binary for running the API server and the delivery engine.
//!
//! # Environment Variables
//!
//! - `WEBHOOK_CONFIG`: Path to a TOML configuration file (same as `--config`)
//! - `API_PORT`: Port to listen on (default: 8080)
//! - `API_HOST`: Host to bind to (default: 0.0.0.0)
//! - `RUST_LOG`: Log filter (default: info)

use std::{env, path::PathBuf, sync::Arc};

use clap::Parser;
use tracing_subscriber::EnvFilter;
use webhook_api::{
    ApiConfig, ApiServer, AppConfig, AppState, LogFormat, API_VERSION,
};
use webhook_core::{InMemoryStore, PrometheusEventMetrics, SystemClock, WebhookEngine};

/// Webhook engine API server
#[derive(Parser)]
#[command(name = "webhook-api")]
#[command(about = "Publish events and deliver them to registered webhooks", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, env = "WEBHOOK_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    config.apply_env_overrides(|name| env::var(name).ok())?;

    init_tracing(config.log_format);

    let metrics_registry = prometheus::Registry::new();
    let metrics = PrometheusEventMetrics::new(&metrics_registry)?;

    let engine = WebhookEngine::start(
        &config.engine,
        Arc::new(InMemoryStore::new()),
        Arc::new(SystemClock),
        Arc::new(metrics),
    )?;

    let state = AppState::from_engine(&engine, metrics_registry);
    let server = ApiServer::new(ApiConfig::from(&config.server), state);

    tracing::info!("Starting webhook engine API server");
    tracing::info!("API version: {}", API_VERSION);

    let served = server.serve().await;
    engine.shutdown().await;
    served
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}
