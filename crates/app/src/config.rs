//! Translation of CLI arguments into validated per-command configuration.

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anomaly_core::ViewportBounds;
use anomaly_store::DEFAULT_CELL_DEGREES;
use anyhow::{Context, Result, anyhow, bail};
use viewport_client::{DEFAULT_DEBOUNCE, DEFAULT_TIMEOUT};

use crate::cli::{ApiArgs, PanArgs, QueryArgs, ServeArgs};

pub const API_ENV: &str = "ROADSCAN_API";
pub const DEFAULT_API: &str = "http://localhost:3001/api";
const DEFAULT_WORKERS: usize = 2;

#[derive(Clone, Debug, Default)]
/// Optional tracing outputs beyond the console log.
pub struct TelemetryOptions {
    /// Write a Chrome trace JSON file capturing spans.
    pub chrome_trace_path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub data_path: PathBuf,
    pub bind: SocketAddr,
    pub workers: usize,
    pub grid_cell: f64,
    pub telemetry: TelemetryOptions,
}

impl TryFrom<ServeArgs> for ServeConfig {
    type Error = anyhow::Error;

    fn try_from(args: ServeArgs) -> Result<Self> {
        let workers = args.workers.unwrap_or(DEFAULT_WORKERS);
        if workers == 0 {
            bail!("--workers must be at least 1");
        }

        let grid_cell = args.grid_cell.unwrap_or(DEFAULT_CELL_DEGREES);
        if !grid_cell.is_finite() || grid_cell <= 0.0 {
            bail!("--grid-cell must be a positive number of degrees");
        }

        Ok(Self {
            data_path: args.data,
            bind: args.bind,
            workers,
            grid_cell,
            telemetry: TelemetryOptions {
                chrome_trace_path: args.chrome_trace,
            },
        })
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_base: String,
    pub timeout: Duration,
}

impl ClientConfig {
    fn from_args(args: ApiArgs, env_api: Option<String>) -> Result<Self> {
        let api_base = args
            .api
            .or(env_api.filter(|value| !value.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_API.to_string());

        let timeout = match args.timeout_ms {
            Some(0) => bail!("--timeout-ms must be at least 1"),
            Some(ms) => Duration::from_millis(ms),
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self { api_base, timeout })
    }
}

#[derive(Clone, Debug)]
pub struct QueryConfig {
    pub client: ClientConfig,
    pub bounds: ViewportBounds,
}

impl TryFrom<QueryArgs> for QueryConfig {
    type Error = anyhow::Error;

    fn try_from(args: QueryArgs) -> Result<Self> {
        let bounds = parse_viewport(&args.bbox).context("--bbox is invalid")?;
        Ok(Self {
            client: ClientConfig::from_args(args.api, std::env::var(API_ENV).ok())?,
            bounds,
        })
    }
}

#[derive(Clone, Debug)]
pub struct PanConfig {
    pub client: ClientConfig,
    pub debounce: Duration,
}

impl TryFrom<PanArgs> for PanConfig {
    type Error = anyhow::Error;

    fn try_from(args: PanArgs) -> Result<Self> {
        let debounce = args
            .debounce_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DEBOUNCE);
        Ok(Self {
            client: ClientConfig::from_args(args.api, std::env::var(API_ENV).ok())?,
            debounce,
        })
    }
}

/// Parse `west south east north`, separated by commas or whitespace.
pub fn parse_viewport(text: &str) -> Result<ViewportBounds> {
    let parts: Vec<&str> = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect();
    let [west, south, east, north] = parts.as_slice() else {
        bail!("expected four coordinates (west, south, east, north), got {text:?}");
    };

    let coordinate = |name: &str, value: &str| -> Result<f64> {
        value
            .parse::<f64>()
            .map_err(|_| anyhow!("{name} coordinate {value:?} is not a number"))
    };
    let bounds = ViewportBounds::new(
        coordinate("west", *west)?,
        coordinate("south", *south)?,
        coordinate("east", *east)?,
        coordinate("north", *north)?,
    )?;
    Ok(bounds)
}
