use std::{net::SocketAddr, path::PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::{
    commands,
    config::{PanConfig, QueryConfig, ServeConfig},
    telemetry,
};

/// Road anomaly viewport service and client front-ends.
#[derive(Debug, Parser)]
#[command(name = "roadscan", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the bounding-box anomaly API from a GeoJSON file.
    Serve(ServeArgs),
    /// Fetch and render the anomalies inside one bounding box.
    Query(QueryArgs),
    /// Replay viewports from stdin through a debounced session.
    Pan(PanArgs),
}

/// CLI arguments accepted by the `serve` subcommand.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// GeoJSON file holding the anomaly documents.
    #[arg(long = "data", value_name = "PATH")]
    pub data: PathBuf,
    /// Socket address the HTTP server binds to.
    #[arg(long = "bind", value_name = "ADDR", default_value = "0.0.0.0:3001")]
    pub bind: SocketAddr,
    /// Number of HTTP worker threads.
    #[arg(long = "workers", value_name = "N")]
    pub workers: Option<usize>,
    /// Spatial index cell size in degrees.
    #[arg(long = "grid-cell", value_name = "DEGREES")]
    pub grid_cell: Option<f64>,
    /// Emit Chrome trace JSON for post-mortem analysis.
    #[arg(long = "chrome-trace", value_name = "PATH")]
    pub chrome_trace: Option<PathBuf>,
}

/// Connection flags shared by the client subcommands.
#[derive(Debug, Args)]
pub struct ApiArgs {
    /// API base URL; falls back to `ROADSCAN_API`.
    #[arg(long = "api", value_name = "URL")]
    pub api: Option<String>,
    /// Per-request timeout in milliseconds.
    #[arg(long = "timeout-ms", value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

/// CLI arguments accepted by the `query` subcommand.
#[derive(Debug, Args)]
pub struct QueryArgs {
    #[command(flatten)]
    pub api: ApiArgs,
    /// Bounding box as `west,south,east,north`.
    #[arg(long = "bbox", value_name = "W,S,E,N", allow_hyphen_values = true)]
    pub bbox: String,
}

/// CLI arguments accepted by the `pan` subcommand.
#[derive(Debug, Args)]
pub struct PanArgs {
    #[command(flatten)]
    pub api: ApiArgs,
    /// Quiet period before a viewport change triggers a fetch.
    #[arg(long = "debounce-ms", value_name = "MS")]
    pub debounce_ms: Option<u64>,
}

pub fn handle_command(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve(args) => {
            let config = ServeConfig::try_from(args)?;
            let _telemetry = telemetry::init(&config.telemetry)?;
            commands::serve(config)
        }
        Command::Query(args) => {
            let config = QueryConfig::try_from(args)?;
            let _telemetry = telemetry::init(&Default::default())?;
            commands::query(config)
        }
        Command::Pan(args) => {
            let config = PanConfig::try_from(args)?;
            let _telemetry = telemetry::init(&Default::default())?;
            commands::pan(config)
        }
    }
}
