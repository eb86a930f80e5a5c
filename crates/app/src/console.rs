use std::io::{self, Write};

use anomaly_core::ViewportStats;
use viewport_client::{Marker, RenderSurface};

/// Render surface for terminal front-ends: keeps the current markers and
/// writes one JSON stats line per render.
pub struct ConsoleSurface<W> {
    out: W,
    markers: Vec<Marker>,
    renders: usize,
}

impl ConsoleSurface<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleSurface<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            markers: Vec::new(),
            renders: 0,
        }
    }

    pub fn renders(&self) -> usize {
        self.renders
    }

    /// One line per marker: severity, color, position and label.
    pub fn write_markers(&mut self) -> io::Result<()> {
        for marker in &self.markers {
            writeln!(
                self.out,
                "{:<6} {} {:>11.6},{:>10.6}  {}",
                marker.severity.label(),
                marker.color,
                marker.position[0],
                marker.position[1],
                marker.label
            )?;
        }
        self.out.flush()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RenderSurface for ConsoleSurface<W> {
    fn clear_markers(&mut self) {
        self.markers.clear();
        self.renders += 1;
    }

    fn add_marker(&mut self, marker: Marker) {
        self.markers.push(marker);
    }

    fn publish_stats(&mut self, stats: ViewportStats) {
        let line = serde_json::to_string(&stats).unwrap_or_default();
        if let Err(err) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            tracing::warn!("Failed to write viewport stats: {err}");
        }
    }
}
