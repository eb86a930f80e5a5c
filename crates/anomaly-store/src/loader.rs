use std::path::Path;

use anomaly_core::Anomaly;
use serde::Deserialize;
use tracing::{info, warn};

use crate::store::StoreError;

#[derive(Deserialize)]
enum CollectionKind {
    FeatureCollection,
}

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    _kind: CollectionKind,
    features: Vec<Anomaly>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Features(Vec<Anomaly>),
    Collection(FeatureCollection),
}

/// Load anomalies from a GeoJSON file holding either a bare array of
/// Features or a `FeatureCollection`.
pub fn load_geojson(path: &Path) -> Result<Vec<Anomaly>, StoreError> {
    let bytes = std::fs::read(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let anomalies = parse_geojson(&bytes, path)?;
    info!(
        "Loaded {} anomalies from {}",
        anomalies.len(),
        path.display()
    );
    Ok(anomalies)
}

/// Parse and validate GeoJSON bytes. `origin` only labels errors.
pub fn parse_geojson(bytes: &[u8], origin: &Path) -> Result<Vec<Anomaly>, StoreError> {
    let document: Document = serde_json::from_slice(bytes).map_err(|source| StoreError::Parse {
        path: origin.to_path_buf(),
        source,
    })?;
    let anomalies = match document {
        Document::Features(features) => features,
        Document::Collection(collection) => collection.features,
    };

    let mut mismatched = 0usize;
    for (index, anomaly) in anomalies.iter().enumerate() {
        anomaly
            .validate()
            .map_err(|source| StoreError::InvalidDocument {
                path: origin.to_path_buf(),
                index,
                source,
            })?;
        if anomaly.severity_mismatch().is_some() {
            mismatched += 1;
        }
    }
    if mismatched > 0 {
        warn!(
            "{mismatched} of {} anomalies in {} carry a stored severity that disagrees with their count; the count-derived tier is used",
            anomalies.len(),
            origin.display()
        );
    }

    Ok(anomalies)
}
