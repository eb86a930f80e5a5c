//! Shared domain types for the RoadScan viewport pipeline.
//!
//! - `feature`: GeoJSON Feature representation of a road anomaly.
//! - `bounds`: validated viewport rectangles and their wire encoding.
//! - `severity`: count → tier/color classification.
//! - `stats`: per-viewport tier tallies.

pub use bounds::{Axis, BoundsError, COORD_PRECISION, ViewportBounds};
pub use feature::{
    Anomaly, AnomalyProperties, FeatureError, FeatureKind, GeometryKind, PointGeometry,
    SeverityMismatch,
};
pub use severity::{
    Classification, HIGH_THRESHOLD, MEDIUM_THRESHOLD, Severity, classify,
};
pub use stats::ViewportStats;

mod bounds;
mod feature;
mod severity;
mod stats;
