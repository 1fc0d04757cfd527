//! sync-relay binary entry point.
//!
//! Usage:
//! ```bash
//! expense-sync-relay --config relay.toml
//! ```

use expense_sync_relay::config::Config;
use expense_sync_relay::http::{build_router, health};
use expense_sync_relay::server::IngestRelay;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load_or_default(&get_config_path())?;
    let relay = Arc::new(IngestRelay::open(config).await?);
    health::init_start_time();

    let listener = relay.bind().await?;
    tracing::info!(
        "sync-relay v{} listening on {}",
        env!("CARGO_PKG_VERSION"),
        relay.config().server.bind_address
    );

    axum::serve(listener, build_router(relay))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("sync-relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

fn get_config_path() -> PathBuf {
    std::env::args()
        .skip_while(|arg| arg != "--config")
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("relay.toml"))
}
