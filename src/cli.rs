//! CLI argument parsing for the haversine harness

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Output format for the profile report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable text format (default)
    #[default]
    Text,
    /// JSON format for machine parsing
    Json,
}

/// Distribution of generated coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Distribution {
    /// Independent uniform points
    Uniform,
    /// Points scattered around a few random centres
    Cluster,
}

#[derive(Parser, Debug)]
#[command(name = "haversine")]
#[command(version)]
#[command(about = "Haversine distance benchmark with a cycle-accurate region profiler", long_about = None)]
pub struct Cli {
    /// Enable profiling regardless of the PROFILER environment variable
    #[arg(long = "profile", global = true)]
    pub profile: bool,

    /// Profile report format (text or json)
    #[arg(long = "format", value_enum, default_value = "text", global = true)]
    pub format: ReportFormat,

    /// Busy-wait used to calibrate the cycle counter, in milliseconds
    #[arg(long = "calibration-ms", value_name = "MS", global = true)]
    pub calibration_ms: Option<u64>,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a pairs JSON file and its reference answer
    Generate {
        /// Coordinate distribution
        #[arg(value_enum)]
        distribution: Distribution,

        /// Random seed
        seed: u64,

        /// Number of coordinate pairs to generate
        count: u64,

        /// Directory receiving the output files
        #[arg(long = "out-dir", value_name = "DIR", default_value = ".")]
        out_dir: PathBuf,
    },

    /// Compute the mean haversine distance of a pairs file
    Process {
        /// Pairs JSON file
        input: PathBuf,

        /// Reference answer (.f64) to validate against
        answers: Option<PathBuf>,
    },
}
