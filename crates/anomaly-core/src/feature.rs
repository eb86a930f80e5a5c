//! GeoJSON Feature representation of a road anomaly.
//!
//! Documents are stored and served as `Point` Features with
//! `[longitude, latitude]` coordinates. The optional stored `severity` is
//! carried through for inspection only; rendering always uses the tier
//! derived from `count`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::severity::Severity;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    #[default]
    Feature,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryKind {
    #[default]
    Point,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointGeometry {
    #[serde(rename = "type", default)]
    pub kind: GeometryKind,
    /// `[longitude, latitude]`.
    pub coordinates: [f64; 2],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnomalyProperties {
    pub road_name: String,
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: FeatureKind,
    pub geometry: PointGeometry,
    pub properties: AnomalyProperties,
}

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("road_name must not be empty")]
    EmptyRoadName,
    #[error("coordinates [{longitude}, {latitude}] are outside WGS84 range")]
    OutOfRange { longitude: f64, latitude: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// A stored severity that disagrees with the tier derived from `count`.
pub struct SeverityMismatch {
    pub stored: Severity,
    pub derived: Severity,
}

impl Anomaly {
    pub fn new(longitude: f64, latitude: f64, road_name: impl Into<String>, count: u32) -> Self {
        Self {
            id: None,
            kind: FeatureKind::Feature,
            geometry: PointGeometry {
                kind: GeometryKind::Point,
                coordinates: [longitude, latitude],
            },
            properties: AnomalyProperties {
                road_name: road_name.into(),
                count,
                severity: None,
            },
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_stored_severity(mut self, severity: Severity) -> Self {
        self.properties.severity = Some(severity);
        self
    }

    pub fn longitude(&self) -> f64 {
        self.geometry.coordinates[0]
    }

    pub fn latitude(&self) -> f64 {
        self.geometry.coordinates[1]
    }

    pub fn road_name(&self) -> &str {
        &self.properties.road_name
    }

    pub fn count(&self) -> u32 {
        self.properties.count
    }

    /// Authoritative tier, always recomputed from `count`.
    pub fn severity(&self) -> Severity {
        Severity::from_count(self.properties.count)
    }

    pub fn severity_mismatch(&self) -> Option<SeverityMismatch> {
        let stored = self.properties.severity?;
        let derived = self.severity();
        (stored != derived).then_some(SeverityMismatch { stored, derived })
    }

    /// Check the invariants a loaded document must satisfy before it is served.
    pub fn validate(&self) -> Result<(), FeatureError> {
        if self.properties.road_name.trim().is_empty() {
            return Err(FeatureError::EmptyRoadName);
        }
        let (longitude, latitude) = (self.longitude(), self.latitude());
        if !(-180.0..=180.0).contains(&longitude) || !(-90.0..=90.0).contains(&latitude) {
            return Err(FeatureError::OutOfRange {
                longitude,
                latitude,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_stored_document_shape() {
        let value = json!({
            "_id": "65f1c0ffee",
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [-87.6298, 41.8781] },
            "properties": { "road_name": "W Madison St", "count": 12, "severity": "medium" }
        });
        let anomaly: Anomaly = serde_json::from_value(value).unwrap();
        assert_eq!(anomaly.id.as_deref(), Some("65f1c0ffee"));
        assert_eq!(anomaly.longitude(), -87.6298);
        assert_eq!(anomaly.latitude(), 41.8781);
        assert_eq!(anomaly.road_name(), "W Madison St");
        assert_eq!(anomaly.severity(), Severity::Medium);
        assert_eq!(anomaly.severity_mismatch(), None);
    }

    #[test]
    fn serializes_longitude_first() {
        let anomaly = Anomaly::new(-87.65, 41.87, "N Halsted St", 5);
        let value = serde_json::to_value(&anomaly).unwrap();
        assert_eq!(value["type"], "Feature");
        assert_eq!(value["geometry"]["type"], "Point");
        assert_eq!(value["geometry"]["coordinates"], json!([-87.65, 41.87]));
        assert!(value.get("_id").is_none());
        assert!(value["properties"].get("severity").is_none());
    }

    #[test]
    fn type_tags_default_when_absent() {
        let value = json!({
            "geometry": { "coordinates": [1.0, 2.0] },
            "properties": { "road_name": "A1", "count": 3 }
        });
        let anomaly: Anomaly = serde_json::from_value(value).unwrap();
        assert_eq!(anomaly.kind, FeatureKind::Feature);
        assert_eq!(anomaly.geometry.kind, GeometryKind::Point);
    }

    #[test]
    fn negative_count_is_rejected_at_decode() {
        let value = json!({
            "geometry": { "coordinates": [1.0, 2.0] },
            "properties": { "road_name": "A1", "count": -1 }
        });
        assert!(serde_json::from_value::<Anomaly>(value).is_err());
    }

    #[test]
    fn stored_severity_disagreement_is_reported() {
        let anomaly = Anomaly::new(0.0, 0.0, "Ring Rd", 25).with_stored_severity(Severity::Low);
        assert_eq!(
            anomaly.severity_mismatch(),
            Some(SeverityMismatch {
                stored: Severity::Low,
                derived: Severity::High,
            })
        );
        assert_eq!(anomaly.severity(), Severity::High);
    }

    #[test]
    fn validate_checks_name_and_range() {
        assert_eq!(
            Anomaly::new(0.0, 0.0, "  ", 1).validate(),
            Err(FeatureError::EmptyRoadName)
        );
        assert!(matches!(
            Anomaly::new(200.0, 41.8, "Off the map", 1).validate(),
            Err(FeatureError::OutOfRange { .. })
        ));
        assert!(Anomaly::new(-87.6, 41.8, "Ok", 1).validate().is_ok());
    }
}
