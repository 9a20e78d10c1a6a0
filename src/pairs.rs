//! Coordinate pair files and reference answer files
//!
//! Pairs are stored as `{ "pairs": [ { "x0": .., "y0": .., "x1": .., "y1": .. }, ... ] }`.
//! The reference answer is a single little-endian f64: the mean haversine distance.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// One pair of points, longitude (`x`) and latitude (`y`) in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pair {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

/// Top-level structure of a pairs file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairsFile {
    pub pairs: Vec<Pair>,
}

/// Parse the pairs document held in `json`
pub fn parse_pairs(json: &str) -> Result<Vec<Pair>, DataError> {
    let file: PairsFile = serde_json::from_str(json)?;
    if file.pairs.is_empty() {
        return Err(DataError::EmptyPairs);
    }
    Ok(file.pairs)
}

/// Read and parse a pairs file
pub fn read_pairs(path: &Path) -> Result<Vec<Pair>, DataError> {
    let json = fs::read_to_string(path)?;
    parse_pairs(&json)
}

/// Stream `pairs` into a pairs file, returning how many were written.
///
/// Pairs are serialized as they are pulled from the iterator, so the whole set never has to
/// be held in memory.
pub fn write_pairs<I>(path: &Path, pairs: I) -> Result<u64, DataError>
where
    I: IntoIterator<Item = Pair>,
{
    let mut out = BufWriter::new(fs::File::create(path)?);
    write!(out, "{{\n\t\"pairs\": [")?;
    let mut written = 0u64;
    for pair in pairs {
        write!(out, "{}\n\t\t", if written == 0 { "" } else { "," })?;
        serde_json::to_writer(&mut out, &pair)?;
        written += 1;
    }
    write!(out, "\n\t]\n}}\n")?;
    out.flush()?;
    Ok(written)
}

/// Read the first f64 of an answer file
pub fn read_answer(path: &Path) -> Result<f64, DataError> {
    let bytes = fs::read(path)?;
    let head: [u8; 8] = bytes
        .get(..8)
        .and_then(|head| head.try_into().ok())
        .ok_or(DataError::AnswerFileTooShort(bytes.len()))?;
    Ok(f64::from_le_bytes(head))
}

/// Write `value` as an answer file
pub fn write_answer(path: &Path, value: f64) -> Result<(), DataError> {
    fs::write(path, value.to_le_bytes())?;
    Ok(())
}
