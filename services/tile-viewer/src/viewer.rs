//! One viewer run: connect, load a zoom level, wait, write.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tile_layer::{HttpPayloadLoader, LoadOutcome, TileLayer};
use tokio::sync::broadcast;
use tracing::{info, warn};
use transport::{run_websocket, Transport, WebSocketConnection};

use crate::config::ViewerConfig;
use crate::output::{viewport, write_tile, TileOutput};

/// Summary of a run.
#[derive(Debug, Default)]
pub struct ViewReport {
    pub requested: usize,
    pub shared: usize,
    pub resolved: usize,
    pub failed: usize,
    pub written: Vec<PathBuf>,
}

pub async fn run<B: TileOutput>(
    config: ViewerConfig,
    backend: B,
    shutdown: broadcast::Sender<()>,
) -> Result<ViewReport> {
    std::fs::create_dir_all(&config.out_dir)?;

    let connection = WebSocketConnection::new();
    let transport = Transport::new(connection.clone(), config.transport.base_url.clone());
    let driver = tokio::spawn(run_websocket(
        config.transport.clone(),
        connection,
        transport.clone(),
        shutdown.subscribe(),
    ));

    let loader = Arc::new(HttpPayloadLoader::new(config.transport.http_timeout)?);
    let strategy = config.layer.kind.extrema_strategy();
    let mut layer = TileLayer::new(
        config.layer.clone(),
        transport.clone(),
        loader,
        backend,
        strategy,
    );
    layer.set_zoom(config.zoom);

    match tokio::time::timeout(config.wait, layer.load_meta()).await {
        Ok(Ok(meta)) => info!(
            doc_count = ?meta.doc_count,
            min = ?meta.min,
            max = ?meta.max,
            "Layer metadata"
        ),
        Ok(Err(e)) => warn!(error = %e, "Layer metadata unavailable"),
        Err(_) => warn!("Timed out waiting for layer metadata"),
    }

    let mut report = ViewReport::default();
    let mut placed = Vec::new();
    for raw in viewport(config.zoom) {
        let handle = layer.create_tile();
        match layer.load_tile(handle, raw)? {
            LoadOutcome::Fetching => report.requested += 1,
            LoadOutcome::Waiting | LoadOutcome::Drawn => report.shared += 1,
            LoadOutcome::OutOfRange => continue,
        }
        placed.push((handle, raw));
    }
    info!(
        tiles = placed.len(),
        requested = report.requested,
        shared = report.shared,
        "Viewport loaded"
    );

    match tokio::time::timeout(config.wait, layer.run_until_idle()).await {
        Ok(idle) => {
            report.resolved = idle.resolved;
            report.failed = idle.failed;
            info!(
                resolved = idle.resolved,
                failed = idle.failed,
                refetched = idle.refetched,
                full_redraws = idle.full_redraws,
                draws = idle.draws,
                "All tiles settled"
            );
        }
        Err(_) => warn!(
            outstanding = layer.outstanding(),
            "Timed out waiting for tiles, writing what arrived"
        ),
    }

    for (handle, raw) in &placed {
        if let Some(path) = write_tile(layer.backend(), *handle, raw, &config.out_dir)? {
            report.written.push(path);
        }
    }

    let stats = transport.stats();
    info!(
        sent = stats.sent,
        coalesced = stats.coalesced,
        replayed = stats.replayed,
        coalescing_ratio = stats.coalescing_ratio(),
        written = report.written.len(),
        "Viewer run complete"
    );

    shutdown.send(()).ok();
    driver.await.ok();
    Ok(report)
}
