//! Profiler configuration
//!
//! Read from the environment by default; the binary layers its CLI flags on top.

use crate::anchor::DEFAULT_ANCHOR_CAPACITY;
use crate::calibration::DEFAULT_CALIBRATION_WAIT_MS;
use crate::cli::ReportFormat;

/// Enables profiling when set to exactly `"true"`
pub const ENV_ENABLED: &str = "PROFILER";
/// Number of addressable anchor ids
pub const ENV_CAPACITY: &str = "PROFILER_CAPACITY";
/// Calibration busy-wait in milliseconds
pub const ENV_CALIBRATION_MS: &str = "PROFILER_CALIBRATION_MS";

/// Configuration for a profiling run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilerConfig {
    /// Whether instrumentation records anything at all
    pub enabled: bool,
    /// Number of addressable anchor ids
    pub capacity: usize,
    /// Busy-wait used to calibrate the cycle counter
    pub calibration_wait_ms: u64,
    /// Report rendering
    pub format: ReportFormat,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: DEFAULT_ANCHOR_CAPACITY,
            calibration_wait_ms: DEFAULT_CALIBRATION_WAIT_MS,
            format: ReportFormat::Text,
        }
    }
}

impl ProfilerConfig {
    /// Configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            enabled: lookup(ENV_ENABLED).as_deref() == Some("true"),
            capacity: parse_var(&lookup, ENV_CAPACITY, defaults.capacity)
                .filter(|&capacity| capacity > 0)
                .unwrap_or(defaults.capacity),
            calibration_wait_ms: parse_var(&lookup, ENV_CALIBRATION_MS, defaults.calibration_wait_ms)
                .unwrap_or(defaults.calibration_wait_ms),
            format: defaults.format,
        }
    }
}

/// Parse `key` if set. `None` when the value is malformed.
fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Some(default),
        Some(raw) => match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(key, value = %raw, "ignoring malformed profiler setting");
                None
            }
        },
    }
}
