//! End-of-run profile report
//!
//! A [`ProfileReport`] is a snapshot of the anchor table plus the run's total cycles and
//! the calibrated counter frequency. The text rendering looks like:
//!
//! ```text
//! Total time: 412.3301ms (CPU freq 2995200000)
//!   Read[1]: 60211043 (4.87%) 20.1025ms
//!   Parse[1]: 893112090 (72.31%, 77.18% w/children) 298.1811ms
//! ```
//!
//! Without a frequency the header reads `Total time: N cycles (CPU freq unavailable)` and
//! every millisecond figure is dropped. The header is always printed, so a report on a host
//! without a usable wall clock still shows the run's total cycles.

use std::fmt;

use crate::anchor::AnchorTable;
use crate::calibration::cycles_to_ms;

/// Final numbers for one anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorSummary {
    pub id: usize,
    pub label: String,
    pub hit_count: u64,
    pub exclusive_cycles: u64,
    pub children_cycles: u64,
    pub root_elapsed_cycles: u64,
}

impl AnchorSummary {
    /// Whether the inclusive window differs from exclusive time, i.e. the region had children
    pub fn has_children(&self) -> bool {
        self.root_elapsed_cycles != self.exclusive_cycles
    }
}

/// Snapshot of a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileReport {
    /// Cycles between profiler creation and [`crate::profiler::Profiler::finish`]
    pub total_cycles: u64,
    /// Counter ticks per second, `None` when calibration failed
    pub frequency: Option<u64>,
    /// Populated anchors in id order
    pub anchors: Vec<AnchorSummary>,
}

impl ProfileReport {
    /// Build a report from every anchor that completed at least once
    pub fn from_table(table: &AnchorTable, total_cycles: u64, frequency: Option<u64>) -> Self {
        let anchors = table
            .populated()
            .map(|(id, anchor)| AnchorSummary {
                id,
                label: anchor.label.clone(),
                hit_count: anchor.hit_count,
                exclusive_cycles: anchor.exclusive_cycles(),
                children_cycles: anchor.children_cycles,
                root_elapsed_cycles: anchor.root_elapsed_cycles,
            })
            .collect();

        Self {
            total_cycles,
            frequency: frequency.filter(|&freq| freq > 0),
            anchors,
        }
    }

    /// `cycles` as a percentage of the run total; 0 for an empty run
    pub fn percent(&self, cycles: u64) -> f64 {
        if self.total_cycles == 0 {
            0.0
        } else {
            100.0 * cycles as f64 / self.total_cycles as f64
        }
    }

    /// `cycles` in milliseconds, when the frequency is known
    pub fn millis(&self, cycles: u64) -> Option<f64> {
        self.frequency.map(|freq| cycles_to_ms(cycles, freq))
    }

    pub fn anchor(&self, label: &str) -> Option<&AnchorSummary> {
        self.anchors.iter().find(|anchor| anchor.label == label)
    }

    /// Print the text rendering to stdout
    pub fn print(&self) {
        print!("{}", self);
    }
}

impl fmt::Display for ProfileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.frequency {
            Some(freq) => writeln!(
                f,
                "Total time: {:.4}ms (CPU freq {})",
                cycles_to_ms(self.total_cycles, freq),
                freq
            )?,
            None => writeln!(
                f,
                "Total time: {} cycles (CPU freq unavailable)",
                self.total_cycles
            )?,
        }

        for anchor in &self.anchors {
            write!(
                f,
                "  {}[{}]: {} ({:.2}%",
                anchor.label,
                anchor.hit_count,
                anchor.exclusive_cycles,
                self.percent(anchor.exclusive_cycles)
            )?;
            if anchor.has_children() {
                write!(
                    f,
                    ", {:.2}% w/children",
                    self.percent(anchor.root_elapsed_cycles)
                )?;
            }
            write!(f, ")")?;
            if let Some(ms) = self.millis(anchor.exclusive_cycles) {
                write!(f, " {:.4}ms", ms)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(label: &str, exclusive: u64, root: u64) -> AnchorSummary {
        AnchorSummary {
            id: 0,
            label: label.to_string(),
            hit_count: 1,
            exclusive_cycles: exclusive,
            children_cycles: root - exclusive,
            root_elapsed_cycles: root,
        }
    }

    #[test]
    fn test_render_with_frequency() {
        let report = ProfileReport {
            total_cycles: 2_000_000,
            frequency: Some(1_000_000_000),
            anchors: vec![summary("Sum", 1_000_000, 1_000_000)],
        };
        let text = report.to_string();
        assert_eq!(
            text,
            "Total time: 2.0000ms (CPU freq 1000000000)\n  Sum[1]: 1000000 (50.00%) 1.0000ms\n"
        );
    }

    #[test]
    fn test_render_without_frequency_has_no_millis() {
        let report = ProfileReport {
            total_cycles: 100,
            frequency: None,
            anchors: vec![summary("Parse", 60, 100)],
        };
        let text = report.to_string();
        assert!(!text.contains("ms"), "unexpected millis:\n{}", text);
        assert!(text.contains("Total time: 100 cycles (CPU freq unavailable)"));
        assert!(text.contains("  Parse[1]: 60 (60.00%, 100.00% w/children)\n"));
    }

    #[test]
    fn test_inclusive_only_when_different() {
        let report = ProfileReport {
            total_cycles: 100,
            frequency: None,
            anchors: vec![summary("Leaf", 40, 40)],
        };
        assert!(!report.to_string().contains("w/children"));
    }

    #[test]
    fn test_zero_total_does_not_divide() {
        let report = ProfileReport {
            total_cycles: 0,
            frequency: None,
            anchors: vec![summary("Empty", 0, 0)],
        };
        assert_eq!(report.percent(0), 0.0);
        assert!(report.to_string().contains("(0.00%)"));
    }

    #[test]
    fn test_from_table_skips_unfinished_anchors() {
        let mut table = AnchorTable::with_capacity(4);
        table.register("never_run");
        let report = ProfileReport::from_table(&table, 10, Some(0));
        assert!(report.anchors.is_empty());
        assert_eq!(report.frequency, None);
        assert_eq!(report.to_string(), "Total time: 10 cycles (CPU freq unavailable)\n");
    }

    #[test]
    fn test_anchor_lookup_by_label() {
        let report = ProfileReport {
            total_cycles: 10,
            frequency: None,
            anchors: vec![summary("a", 1, 1), summary("b", 2, 2)],
        };
        assert_eq!(report.anchor("b").unwrap().exclusive_cycles, 2);
        assert!(report.anchor("c").is_none());
    }
}
