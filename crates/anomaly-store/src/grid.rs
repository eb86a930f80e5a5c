use std::collections::HashMap;

use anomaly_core::{Anomaly, ViewportBounds};
use tracing::warn;

use crate::store::{AnomalyStore, StoreError};

/// Default grid cell edge in degrees (roughly 1 km of latitude).
pub const DEFAULT_CELL_DEGREES: f64 = 0.01;

type CellKey = (i64, i64);

/// In-memory store with a uniform-grid index over point coordinates.
pub struct MemoryStore {
    anomalies: Vec<Anomaly>,
    cells: HashMap<CellKey, Vec<usize>>,
    /// Lowest and highest occupied cell on each axis.
    extent: Option<(CellKey, CellKey)>,
    cell_degrees: f64,
}

impl MemoryStore {
    pub fn new(anomalies: Vec<Anomaly>, cell_degrees: f64) -> Self {
        let cell_degrees = if cell_degrees.is_finite() && cell_degrees > 0.0 {
            cell_degrees
        } else {
            warn!("Invalid grid cell size {cell_degrees}; using {DEFAULT_CELL_DEGREES}");
            DEFAULT_CELL_DEGREES
        };

        let mut cells: HashMap<CellKey, Vec<usize>> = HashMap::new();
        for (idx, anomaly) in anomalies.iter().enumerate() {
            let key = cell_of(cell_degrees, anomaly.longitude(), anomaly.latitude());
            cells.entry(key).or_default().push(idx);
        }
        let extent = cells.keys().fold(None, |extent, &(x, y)| match extent {
            None => Some(((x, y), (x, y))),
            Some(((lo_x, lo_y), (hi_x, hi_y))) => {
                Some(((lo_x.min(x), lo_y.min(y)), (hi_x.max(x), hi_y.max(y))))
            }
        });

        Self {
            anomalies,
            cells,
            extent,
            cell_degrees,
        }
    }

    pub fn with_default_grid(anomalies: Vec<Anomaly>) -> Self {
        Self::new(anomalies, DEFAULT_CELL_DEGREES)
    }

    pub fn cell_degrees(&self) -> f64 {
        self.cell_degrees
    }

    /// Indices of anomalies in cells overlapping `bounds`, in load order.
    fn candidates(&self, bounds: &ViewportBounds) -> Vec<usize> {
        let Some(((lo_x, lo_y), (hi_x, hi_y))) = self.extent else {
            return Vec::new();
        };
        // Cells outside the occupied extent hold nothing, so the range is
        // clamped to it. This keeps huge finite boxes cheap.
        let (min_x, min_y) = cell_of(self.cell_degrees, bounds.west(), bounds.south());
        let (max_x, max_y) = cell_of(self.cell_degrees, bounds.east(), bounds.north());
        let (min_x, max_x) = (min_x.max(lo_x), max_x.min(hi_x));
        let (min_y, max_y) = (min_y.max(lo_y), max_y.min(hi_y));
        if min_x > max_x || min_y > max_y {
            return Vec::new();
        }

        let span = max_x
            .abs_diff(min_x)
            .checked_add(1)
            .zip(max_y.abs_diff(min_y).checked_add(1))
            .and_then(|(width, height)| width.checked_mul(height));
        let scan_range = span.is_some_and(|span| span <= self.cells.len() as u64);

        let mut hits: Vec<usize> = if scan_range {
            (min_x..=max_x)
                .flat_map(|x| (min_y..=max_y).map(move |y| (x, y)))
                .filter_map(|key| self.cells.get(&key))
                .flatten()
                .copied()
                .collect()
        } else {
            // Viewport covers more cells than are occupied; walk the occupied ones.
            self.cells
                .iter()
                .filter(|((x, y), _)| (min_x..=max_x).contains(x) && (min_y..=max_y).contains(y))
                .flat_map(|(_, indices)| indices.iter().copied())
                .collect()
        };
        hits.sort_unstable();
        hits
    }
}

impl AnomalyStore for MemoryStore {
    fn find_within(&self, bounds: &ViewportBounds) -> Result<Vec<Anomaly>, StoreError> {
        Ok(self
            .candidates(bounds)
            .into_iter()
            .map(|idx| &self.anomalies[idx])
            .filter(|anomaly| bounds.contains(anomaly.longitude(), anomaly.latitude()))
            .cloned()
            .collect())
    }

    fn document_count(&self) -> usize {
        self.anomalies.len()
    }
}

fn cell_of(cell_degrees: f64, longitude: f64, latitude: f64) -> CellKey {
    (
        (longitude / cell_degrees).floor() as i64,
        (latitude / cell_degrees).floor() as i64,
    )
}
