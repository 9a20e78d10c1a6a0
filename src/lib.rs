//! Haversine - benchmark harness with a cycle-accurate nested-region profiler
//!
//! The profiler measures cycle-counter ticks per labeled region, separates a region's own
//! time from time spent in the regions it calls, and survives recursive re-entry without
//! double-counting. The haversine modules are the workload it was built to measure.

pub mod anchor;
pub mod calibration;
pub mod cli;
pub mod config;
pub mod error;
pub mod generate;
pub mod global;
pub mod haversine;
pub mod json_output;
pub mod pairs;
pub mod profiler;
pub mod report;
pub mod timestamp;

pub use anchor::{Anchor, AnchorId, AnchorTable};
pub use config::ProfilerConfig;
pub use error::{DataError, ProfilerError};
pub use profiler::Profiler;
pub use report::ProfileReport;
pub use timestamp::{HardwareClock, ManualClock, TimestampSource};
