use std::{io, path::PathBuf};

use anomaly_core::{Anomaly, FeatureError, ViewportBounds};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("anomaly store unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("failed to read anomaly data from {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse anomaly data in {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("anomaly #{index} in {path:?} is invalid")]
    InvalidDocument {
        path: PathBuf,
        index: usize,
        #[source]
        source: FeatureError,
    },
}

/// Read-only source of anomalies supporting box-containment queries.
///
/// Implementations must report backend failures as errors rather than an
/// empty result, since an empty list means "no anomalies in view".
pub trait AnomalyStore: Send + Sync {
    /// Every anomaly whose location lies in the closed rectangle.
    fn find_within(&self, bounds: &ViewportBounds) -> Result<Vec<Anomaly>, StoreError>;

    /// Number of documents held, used for startup logging and health output.
    fn document_count(&self) -> usize;
}
