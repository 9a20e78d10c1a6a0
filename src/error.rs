//! Error types for the profiler and the benchmark data files

use std::panic::Location;
use thiserror::Error;

/// Errors raised by malformed instrumentation.
///
/// None of these abort the profiled program: the global API reports them on stderr and
/// skips the offending operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfilerError {
    #[error("Out of bounds anchor id in {location}: {id} (capacity {capacity})")]
    AnchorOutOfRange {
        id: usize,
        capacity: usize,
        location: &'static Location<'static>,
    },

    #[error("End for anchor {id} in {location}, but it was never started")]
    UnknownAnchor {
        id: usize,
        location: &'static Location<'static>,
    },

    #[error("End for anchor {id} ({label}) in {location} with no open block")]
    NoOpenBlock {
        id: usize,
        label: String,
        location: &'static Location<'static>,
    },

    #[error("Profiler re-entered in {location} while already in use, call skipped")]
    Reentered {
        location: &'static Location<'static>,
    },
}

impl ProfilerError {
    /// The anchor id the failing call referred to, if any
    pub fn id(&self) -> Option<usize> {
        match self {
            ProfilerError::AnchorOutOfRange { id, .. }
            | ProfilerError::UnknownAnchor { id, .. }
            | ProfilerError::NoOpenBlock { id, .. } => Some(*id),
            ProfilerError::Reentered { .. } => None,
        }
    }
}

/// Errors reading or writing pair and answer files
#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid pairs JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Answer file holds {0} bytes, expected at least 8")]
    AnswerFileTooShort(usize),

    #[error("Pair file contains no pairs")]
    EmptyPairs,

    #[error("Pair count must be between 1 and {max}, got {count}")]
    InvalidPairCount { count: u64, max: u64 },
}
