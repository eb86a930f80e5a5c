use std::{
    io::{self, BufRead},
    sync::{Arc, mpsc},
};

use anomaly_core::ViewportBounds;
use anomaly_server::{ServerOptions, ServerState, spawn_anomaly_server};
use anomaly_store::{BoundingBoxQueryService, MemoryStore, load_geojson};
use anyhow::{Context, Result, bail};
use tokio::sync::mpsc as async_mpsc;
use tracing::{info, warn};
use viewport_client::{AnomalyFetchClient, AnomalySource, MarkerReconciler, spawn_session};

use crate::{
    config::{ClientConfig, PanConfig, QueryConfig, ServeConfig, parse_viewport},
    console::ConsoleSurface,
    telemetry,
};

/// Load the data file, serve it until Ctrl+C.
pub fn serve(config: ServeConfig) -> Result<()> {
    let anomalies = load_geojson(&config.data_path)
        .with_context(|| format!("failed to load {}", config.data_path.display()))?;
    let store = MemoryStore::new(anomalies, config.grid_cell);
    let queries = BoundingBoxQueryService::new(Arc::new(store));
    let metrics = telemetry::init_metrics_recorder()?.clone();

    let server = spawn_anomaly_server(
        ServerState::new(queries, Some(metrics)),
        ServerOptions {
            bind: config.bind,
            workers: config.workers,
        },
    )?;
    info!(
        "Serving anomalies at http://{}/api/anomalies (Ctrl+C to stop)",
        server.local_addr()
    );

    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    if let Err(err) = ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    }) {
        warn!("Failed to install Ctrl+C handler: {err}");
    }
    let _ = stop_rx.recv();

    info!("Shutting down anomaly server");
    server.stop();
    Ok(())
}

/// One fetch and render for a single bounding box.
pub fn query(config: QueryConfig) -> Result<()> {
    let client = fetch_client(&config.client)?;
    let runtime = client_runtime()?;

    let anomalies = runtime
        .block_on(client.fetch(config.bounds))
        .with_context(|| format!("failed to fetch anomalies for {}", config.bounds))?;

    let mut surface = ConsoleSurface::stdout();
    MarkerReconciler::new().reconcile(&mut surface, &anomalies);
    surface.write_markers()?;
    Ok(())
}

/// Replay viewports from stdin through a debounced session.
pub fn pan(config: PanConfig) -> Result<()> {
    let client = Arc::new(fetch_client(&config.client)?);
    let runtime = client_runtime()?;

    let (viewport_tx, mut viewport_rx) = async_mpsc::unbounded_channel();
    telemetry::spawn_thread("stdin-viewports", move || read_viewports(viewport_tx))
        .context("failed to spawn stdin reader")?;

    runtime.block_on(async move {
        let Some(initial) = viewport_rx.recv().await else {
            bail!("no viewport on stdin; expected lines of `west south east north`");
        };

        let session = spawn_session(client, ConsoleSurface::stdout(), config.debounce, initial);
        while let Some(bounds) = viewport_rx.recv().await {
            if !session.viewport_changed(bounds) {
                break;
            }
        }
        session.settled().await;

        let mut surface = session
            .shutdown()
            .await
            .context("viewport session ended abnormally")?;
        info!("Session finished after {} renders", surface.renders());
        surface.write_markers()?;
        Ok(())
    })
}

fn fetch_client(config: &ClientConfig) -> Result<AnomalyFetchClient> {
    AnomalyFetchClient::new(&config.api_base, config.timeout)
        .with_context(|| format!("cannot use API base {:?}", config.api_base))
}

fn client_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")
}

fn read_viewports(viewports: async_mpsc::UnboundedSender<ViewportBounds>) {
    for (index, line) in io::stdin().lock().lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!("Stopped reading stdin: {err}");
                return;
            }
        };
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        match parse_viewport(&line) {
            Ok(bounds) => {
                if viewports.send(bounds).is_err() {
                    return;
                }
            }
            Err(err) => warn!("Skipping viewport on line {}: {err:#}", index + 1),
        }
    }
}
