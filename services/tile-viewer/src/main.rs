//! Tile viewer.
//!
//! Connects to an aggregation service over WebSocket, loads every tile of
//! one zoom level (plus a wrapped column, which shares its fetches with the
//! original), and writes the rendered tiles as PNG or HTML files.

mod config;
mod output;
mod viewer;

use anyhow::Result;
use clap::Parser;
use renderer::{MarkupBackend, RasterBackend};
use tokio::sync::broadcast;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use config::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // RUST_LOG wins over --log-level when set
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = args.into_config()?;
    info!(
        ws_url = %config.transport.ws_url,
        index = %config.layer.index,
        kind = config.layer.kind.name(),
        zoom = config.zoom,
        "Starting tile viewer"
    );

    // Shutdown signal
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_tx_clone.send(()).ok();
    });

    let report = if config.layer.kind.is_raster() {
        viewer::run(config, RasterBackend::new(), shutdown_tx).await?
    } else {
        viewer::run(config, MarkupBackend::new(), shutdown_tx).await?
    };

    info!(
        requested = report.requested,
        shared = report.shared,
        resolved = report.resolved,
        failed = report.failed,
        written = report.written.len(),
        "Done"
    );

    Ok(())
}
