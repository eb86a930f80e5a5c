use anomaly_core::ViewportStats;

use crate::marker::Marker;

/// Display seam for the map widget and the stats panel.
pub trait RenderSurface {
    fn clear_markers(&mut self);
    fn add_marker(&mut self, marker: Marker);
    fn publish_stats(&mut self, stats: ViewportStats);
}

#[derive(Debug, Default)]
/// Surface that keeps what it was asked to render. Backs the CLI front-ends
/// and tests.
pub struct MemorySurface {
    markers: Vec<Marker>,
    stats: Option<ViewportStats>,
    renders: usize,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// Last published stats, `None` before the first successful render.
    pub fn stats(&self) -> Option<ViewportStats> {
        self.stats
    }

    /// Number of full clears performed.
    pub fn renders(&self) -> usize {
        self.renders
    }
}

impl RenderSurface for MemorySurface {
    fn clear_markers(&mut self) {
        self.markers.clear();
        self.renders += 1;
    }

    fn add_marker(&mut self, marker: Marker) {
        self.markers.push(marker);
    }

    fn publish_stats(&mut self, stats: ViewportStats) {
        self.stats = Some(stats);
    }
}
