//! JSON output format for profile reports
//!
//! `--format json` renders the same numbers as the text report, for machine parsing.

use serde::{Deserialize, Serialize};

use crate::report::ProfileReport;

/// One anchor line of the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonAnchor {
    /// Anchor id in the table
    pub id: usize,
    /// Region label
    pub label: String,
    /// Completed invocations
    pub hit_count: u64,
    /// Cycles spent in the region itself
    pub exclusive_cycles: u64,
    /// Cycles spent in regions it called
    pub children_cycles: u64,
    /// Inclusive cycles of the outermost invocations
    pub root_elapsed_cycles: u64,
    /// Exclusive cycles as a percentage of the run
    pub self_percent: f64,
    /// Inclusive cycles as a percentage of the run (only when it differs from exclusive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inclusive_percent: Option<f64>,
    /// Exclusive time in milliseconds (null when the frequency is unavailable)
    pub exclusive_ms: Option<f64>,
}

/// Root JSON output structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonOutput {
    /// Format version identifier
    pub version: String,
    /// Format name
    pub format: String,
    /// Cycles covered by the run
    pub total_cycles: u64,
    /// Cycle counter ticks per second (null when unavailable)
    pub cpu_frequency: Option<u64>,
    /// Run duration in milliseconds (null when the frequency is unavailable)
    pub total_ms: Option<f64>,
    /// Populated anchors in id order
    pub anchors: Vec<JsonAnchor>,
}

impl JsonOutput {
    /// Convert a finished report
    pub fn from_report(report: &ProfileReport) -> Self {
        let anchors = report
            .anchors
            .iter()
            .map(|anchor| JsonAnchor {
                id: anchor.id,
                label: anchor.label.clone(),
                hit_count: anchor.hit_count,
                exclusive_cycles: anchor.exclusive_cycles,
                children_cycles: anchor.children_cycles,
                root_elapsed_cycles: anchor.root_elapsed_cycles,
                self_percent: report.percent(anchor.exclusive_cycles),
                inclusive_percent: anchor
                    .has_children()
                    .then(|| report.percent(anchor.root_elapsed_cycles)),
                exclusive_ms: report.millis(anchor.exclusive_cycles),
            })
            .collect();

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "haversine-profile-v1".to_string(),
            total_cycles: report.total_cycles,
            cpu_frequency: report.frequency,
            total_ms: report.millis(report.total_cycles),
            anchors,
        }
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::AnchorSummary;

    fn report(frequency: Option<u64>) -> ProfileReport {
        ProfileReport {
            total_cycles: 200,
            frequency,
            anchors: vec![
                AnchorSummary {
                    id: 0,
                    label: "outer".to_string(),
                    hit_count: 1,
                    exclusive_cycles: 60,
                    children_cycles: 40,
                    root_elapsed_cycles: 100,
                },
                AnchorSummary {
                    id: 1,
                    label: "inner".to_string(),
                    hit_count: 4,
                    exclusive_cycles: 40,
                    children_cycles: 0,
                    root_elapsed_cycles: 40,
                },
            ],
        }
    }

    #[test]
    fn test_json_output_creation() {
        let output = JsonOutput::from_report(&report(Some(1_000)));
        assert_eq!(output.format, "haversine-profile-v1");
        assert_eq!(output.total_cycles, 200);
        assert_eq!(output.total_ms, Some(200.0));
        assert_eq!(output.anchors.len(), 2);
        assert_eq!(output.anchors[0].self_percent, 30.0);
        assert_eq!(output.anchors[0].inclusive_percent, Some(50.0));
        assert_eq!(output.anchors[1].inclusive_percent, None);
        assert_eq!(output.anchors[1].exclusive_ms, Some(40.0));
    }

    #[test]
    fn test_json_serialization() {
        let json = JsonOutput::from_report(&report(Some(1_000)))
            .to_json()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["cpu_frequency"], 1000);
        assert_eq!(value["anchors"][1]["label"], "inner");
        assert_eq!(value["anchors"][1]["hit_count"], 4);
    }

    #[test]
    fn test_optional_fields_omitted() {
        let json = JsonOutput::from_report(&report(None)).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["cpu_frequency"].is_null());
        assert!(value["total_ms"].is_null());
        assert!(value["anchors"][0]["exclusive_ms"].is_null());
        assert!(value["anchors"][1].get("inclusive_percent").is_none());
    }
}
