use serde::{Deserialize, Serialize};

use crate::{feature::Anomaly, severity::Severity};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Tier tallies for the anomalies currently in view.
pub struct ViewportStats {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl ViewportStats {
    pub fn tally<'a>(anomalies: impl IntoIterator<Item = &'a Anomaly>) -> Self {
        let mut stats = Self::default();
        for anomaly in anomalies {
            stats.record(anomaly.severity());
        }
        stats
    }

    pub fn record(&mut self, tier: Severity) {
        self.total += 1;
        match tier {
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }

    /// Tiers partition the total.
    pub fn is_consistent(&self) -> bool {
        self.high + self.medium + self.low == self.total
    }
}
