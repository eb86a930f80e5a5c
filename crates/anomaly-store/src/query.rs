//! Bounding-box query contract shared by every transport.
//!
//! Raw parameters arrive as optional strings so that "absent", "empty" and
//! "unparseable" can be told apart. A missing parameter and a malformed one
//! are both caller errors. An inverted region is not an error: it matches
//! nothing, since antimeridian wraparound is not supported.

use std::{sync::Arc, time::Instant};

use anomaly_core::{Anomaly, BoundsError, ViewportBounds};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::store::{AnomalyStore, StoreError};

/// Error text returned when any of the four parameters is absent.
pub const MISSING_PARAMETERS: &str = "Missing bounding box parameters";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BoundsParams {
    #[serde(rename = "minLng")]
    pub min_lng: Option<String>,
    #[serde(rename = "minLat")]
    pub min_lat: Option<String>,
    #[serde(rename = "maxLng")]
    pub max_lng: Option<String>,
    #[serde(rename = "maxLat")]
    pub max_lat: Option<String>,
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Missing bounding box parameters")]
    MissingParameters,
    #[error("Invalid bounding box parameter {name}: {value:?}")]
    InvalidParameter { name: &'static str, value: String },
    #[error("anomaly store unavailable")]
    Unavailable(#[source] StoreError),
}

impl QueryError {
    /// True for errors caused by the request rather than the backend.
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            QueryError::MissingParameters | QueryError::InvalidParameter { .. }
        )
    }
}

/// Validate raw parameters. `Ok(None)` is an inverted region that matches
/// nothing.
pub fn parse_bounds(params: &BoundsParams) -> Result<Option<ViewportBounds>, QueryError> {
    let raw = [
        ("minLng", params.min_lng.as_deref()),
        ("minLat", params.min_lat.as_deref()),
        ("maxLng", params.max_lng.as_deref()),
        ("maxLat", params.max_lat.as_deref()),
    ];
    if raw
        .iter()
        .any(|(_, value)| value.is_none_or(|v| v.trim().is_empty()))
    {
        return Err(QueryError::MissingParameters);
    }

    let mut parsed = [0f64; 4];
    for (slot, (name, value)) in parsed.iter_mut().zip(raw) {
        let value = value.unwrap_or_default().trim();
        *slot = value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| QueryError::InvalidParameter {
                name,
                value: value.to_string(),
            })?;
    }

    let [west, south, east, north] = parsed;
    match ViewportBounds::new(west, south, east, north) {
        Ok(bounds) => Ok(Some(bounds)),
        Err(BoundsError::Inverted { axis, min, max }) => {
            debug!("Inverted {axis} range {min} > {max}; treating region as empty");
            Ok(None)
        }
        Err(BoundsError::NonFinite { name, value }) => Err(QueryError::InvalidParameter {
            name,
            value: value.to_string(),
        }),
    }
}

#[derive(Clone)]
/// Stateless query front over a shared read-only store.
pub struct BoundingBoxQueryService {
    store: Arc<dyn AnomalyStore>,
}

impl BoundingBoxQueryService {
    pub fn new(store: Arc<dyn AnomalyStore>) -> Self {
        Self { store }
    }

    pub fn document_count(&self) -> usize {
        self.store.document_count()
    }

    /// Validate raw parameters and run the containment query.
    pub fn find_within(&self, params: &BoundsParams) -> Result<Vec<Anomaly>, QueryError> {
        let outcome = parse_bounds(params).and_then(|bounds| match bounds {
            Some(bounds) => self.find_within_bounds(&bounds),
            None => Ok(Vec::new()),
        });
        if let Err(err) = &outcome {
            let label = if err.is_bad_request() {
                "bad_request"
            } else {
                "unavailable"
            };
            metrics::counter!("anomaly_queries_total", "outcome" => label).increment(1);
        }
        outcome
    }

    /// Containment query for an already validated rectangle.
    pub fn find_within_bounds(&self, bounds: &ViewportBounds) -> Result<Vec<Anomaly>, QueryError> {
        let started = Instant::now();
        let anomalies = self
            .store
            .find_within(bounds)
            .map_err(QueryError::Unavailable)?;
        metrics::counter!("anomaly_queries_total", "outcome" => "ok").increment(1);
        metrics::histogram!("anomaly_query_seconds").record(started.elapsed().as_secs_f64());
        metrics::histogram!("anomaly_query_results").record(anomalies.len() as f64);
        debug!("{} anomalies within {bounds}", anomalies.len());
        Ok(anomalies)
    }
}
