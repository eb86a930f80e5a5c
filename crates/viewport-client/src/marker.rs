use std::fmt::Write;

use anomaly_core::{Anomaly, Severity, classify};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
/// Identity of a marker within one render pass: the stored id when present,
/// otherwise the anomaly's position in the response.
pub enum MarkerKey {
    Id(String),
    Index(usize),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
/// Render-ready marker handed to the map surface.
pub struct Marker {
    pub key: MarkerKey,
    /// `[longitude, latitude]`.
    pub position: [f64; 2],
    pub severity: Severity,
    pub color: &'static str,
    pub label: String,
    pub popup_html: String,
}

pub fn build_marker(index: usize, anomaly: &Anomaly) -> Marker {
    let classification = classify(anomaly.count());
    let key = anomaly
        .id
        .clone()
        .map_or(MarkerKey::Index(index), MarkerKey::Id);
    Marker {
        key,
        position: [anomaly.longitude(), anomaly.latitude()],
        severity: classification.tier,
        color: classification.color,
        label: format!("{} ({})", anomaly.road_name(), anomaly.count()),
        popup_html: popup_html(anomaly.road_name(), anomaly.count(), classification.tier),
    }
}

/// Popup body: road name, count tinted with the tier color, severity badge.
pub fn popup_html(road_name: &str, count: u32, severity: Severity) -> String {
    let color = severity.color();
    let mut html = String::with_capacity(384);
    html.push_str("<div class=\"popup-content\">");
    let _ = write!(html, "<div class=\"popup-road\">{}</div>", escape_html(road_name));
    let _ = write!(
        html,
        "<div class=\"popup-row\"><span class=\"popup-label\">Anomalies</span>\
         <span class=\"popup-count\" style=\"color:{color}\">{count}</span></div>"
    );
    let _ = write!(
        html,
        "<div class=\"popup-row\"><span class=\"popup-label\">Severity</span>\
         <span class=\"popup-severity\" style=\"background:{color}\">{}</span></div>",
        severity.label()
    );
    html.push_str("</div>");
    html
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
