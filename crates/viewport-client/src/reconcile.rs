//! Full-replacement marker reconciliation.
//!
//! Every render tears down the previous marker set before adding the new
//! one; there is no diffing. The debounce window already bounds how often
//! this runs.

use anomaly_core::{Anomaly, ViewportStats};
use tracing::warn;

use crate::{marker::build_marker, surface::RenderSurface};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconcileReport {
    pub stats: ViewportStats,
    /// Anomalies whose stored severity disagreed with their count.
    pub severity_mismatches: usize,
}

#[derive(Debug, Default)]
pub struct MarkerReconciler {
    rendered: usize,
    stats: ViewportStats,
    generation: u64,
}

impl MarkerReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Markers currently on the surface.
    pub fn rendered(&self) -> usize {
        self.rendered
    }

    pub fn stats(&self) -> ViewportStats {
        self.stats
    }

    /// Number of completed renders.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replace everything on `surface` with markers for `anomalies` and
    /// publish the recomputed stats.
    pub fn reconcile<S: RenderSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        anomalies: &[Anomaly],
    ) -> ReconcileReport {
        surface.clear_markers();

        let mut severity_mismatches = 0;
        for (index, anomaly) in anomalies.iter().enumerate() {
            if let Some(mismatch) = anomaly.severity_mismatch() {
                severity_mismatches += 1;
                warn!(
                    "Stored severity {:?} for {} ({} defects) disagrees with derived {:?}; rendering derived tier",
                    mismatch.stored,
                    anomaly.road_name(),
                    anomaly.count(),
                    mismatch.derived
                );
            }
            surface.add_marker(build_marker(index, anomaly));
        }
        let stats = ViewportStats::tally(anomalies);
        debug_assert!(stats.is_consistent());

        surface.publish_stats(stats);

        if severity_mismatches > 0 {
            metrics::counter!("viewport_severity_mismatches_total")
                .increment(severity_mismatches as u64);
        }
        self.rendered = stats.total;
        self.stats = stats;
        self.generation += 1;

        ReconcileReport {
            stats,
            severity_mismatches,
        }
    }
}
