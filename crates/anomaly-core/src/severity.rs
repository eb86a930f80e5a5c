use serde::{Deserialize, Serialize};

/// Lowest count classified as [`Severity::High`].
pub const HIGH_THRESHOLD: u32 = 20;
/// Lowest count classified as [`Severity::Medium`].
pub const MEDIUM_THRESHOLD: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Severity tier derived from an anomaly's defect count.
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Tier for a defect count. Color selection and stats tallying both go
    /// through here so the boundaries cannot drift apart.
    pub fn from_count(count: u32) -> Self {
        if count >= HIGH_THRESHOLD {
            Severity::High
        } else if count >= MEDIUM_THRESHOLD {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Upper-case label shown in popups.
    pub fn label(self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }

    /// Marker color as a CSS hex string.
    pub fn color(self) -> &'static str {
        match self {
            Severity::Low => "#22c55e",
            Severity::Medium => "#f59e0b",
            Severity::High => "#ef4444",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    pub tier: Severity,
    pub color: &'static str,
}

/// Map a defect count to its tier and display color.
pub fn classify(count: u32) -> Classification {
    let tier = Severity::from_count(count);
    Classification {
        tier,
        color: tier.color(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_map_consistently() {
        assert_eq!(classify(0).tier, Severity::Low);
        assert_eq!(classify(9).tier, Severity::Low);
        assert_eq!(classify(10).tier, Severity::Medium);
        assert_eq!(classify(19).tier, Severity::Medium);
        assert_eq!(classify(20).tier, Severity::High);
        assert_eq!(classify(u32::MAX).tier, Severity::High);
    }

    #[test]
    fn color_follows_tier() {
        for count in [0, 9, 10, 19, 20, 250] {
            let classification = classify(count);
            assert_eq!(classification.color, classification.tier.color());
        }
        assert_eq!(classify(9).color, "#22c55e");
        assert_eq!(classify(10).color, "#f59e0b");
        assert_eq!(classify(20).color, "#ef4444");
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Severity::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
        let parsed: Severity = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(parsed, Severity::High);
    }
}
