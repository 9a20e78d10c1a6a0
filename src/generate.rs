//! Synthetic coordinate pair generation
//!
//! Produces pairs plus the expected mean haversine distance, so a later run can validate
//! its sum against the reference answer. Pairs are generated lazily and streamed to disk,
//! so the pair count is bounded by disk space rather than memory.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cli::Distribution;
use crate::error::DataError;
use crate::haversine::{reference_haversine, EARTH_RADIUS};
use crate::pairs::{write_answer, write_pairs, Pair};

/// Refuse to generate this many pairs or more
pub const MAX_PAIR_COUNT: u64 = 1 << 34;

/// Radius of a cluster, in degrees
const CLUSTER_RADIUS: f64 = 30.0;

/// Seeded, lazy source of `count` pairs
#[derive(Debug, Clone)]
pub struct PairGenerator {
    rng: StdRng,
    distribution: Distribution,
    next: u64,
    count: u64,
    cluster_every: u64,
    centre: (f64, f64),
}

impl PairGenerator {
    /// Generator for `count` pairs from `seed`. `count` must be in `1..MAX_PAIR_COUNT`.
    pub fn new(distribution: Distribution, seed: u64, count: u64) -> Result<Self, DataError> {
        if count == 0 || count >= MAX_PAIR_COUNT {
            return Err(DataError::InvalidPairCount {
                count,
                max: MAX_PAIR_COUNT - 1,
            });
        }
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            distribution,
            next: 0,
            count,
            cluster_every: count / 64 + 1,
            centre: (0.0, 0.0),
        })
    }

    /// Total pairs this generator yields
    pub fn total(&self) -> u64 {
        self.count
    }

    /// A random point within [`CLUSTER_RADIUS`] of the current centre, clamped to valid
    /// coordinates
    fn near_centre(&mut self) -> (f64, f64) {
        let radius = CLUSTER_RADIUS * self.rng.gen::<f64>();
        let x = self.centre.0 + self.rng.gen_range(-radius..=radius);
        let y = self.centre.1 + self.rng.gen_range(-radius..=radius);
        (x.clamp(-180.0, 180.0), y.clamp(-90.0, 90.0))
    }
}

impl Iterator for PairGenerator {
    type Item = Pair;

    fn next(&mut self) -> Option<Pair> {
        if self.next >= self.count {
            return None;
        }
        let i = self.next;
        self.next += 1;

        let pair = match self.distribution {
            Distribution::Uniform => Pair {
                x0: self.rng.gen::<f64>() * 180.0,
                y0: self.rng.gen::<f64>() * 90.0,
                x1: self.rng.gen::<f64>() * 180.0,
                y1: self.rng.gen::<f64>() * 90.0,
            },
            Distribution::Cluster => {
                if i % self.cluster_every == 0 {
                    self.centre = (
                        self.rng.gen_range(-180.0..180.0),
                        self.rng.gen_range(-90.0..90.0),
                    );
                    tracing::trace!(x = self.centre.0, y = self.centre.1, "new cluster centre");
                }
                let (x0, y0) = self.near_centre();
                let (x1, y1) = self.near_centre();
                Pair { x0, y0, x1, y1 }
            }
        };
        Some(pair)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.count - self.next).ok();
        (remaining.unwrap_or(usize::MAX), remaining)
    }
}

/// What [`generate_to`] wrote
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub pairs_path: PathBuf,
    pub answer_path: PathBuf,
    pub count: u64,
    pub expected_mean: f64,
}

/// Output file names for `count` pairs: `(pairs json, answer f64)`
pub fn output_paths(dir: &Path, count: u64) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("data_{}_pairs.json", count)),
        dir.join(format!("data_{}_haveranswers.f64", count)),
    )
}

/// Generate `count` pairs from `seed` into `dir`, streaming each pair to the pairs file and
/// accumulating the expected mean as `sum(d / count)`.
pub fn generate_to(
    dir: &Path,
    distribution: Distribution,
    seed: u64,
    count: u64,
) -> Result<Generated, DataError> {
    let pairs = PairGenerator::new(distribution, seed, count)?;
    let (pairs_path, answer_path) = output_paths(dir, count);

    let coef = 1.0 / count as f64;
    let mut expected_mean = 0.0;
    let written = write_pairs(
        &pairs_path,
        pairs.inspect(|p| {
            expected_mean += coef * reference_haversine(p.x0, p.y0, p.x1, p.y1, EARTH_RADIUS);
        }),
    )?;
    write_answer(&answer_path, expected_mean)?;

    Ok(Generated {
        pairs_path,
        answer_path,
        count: written,
        expected_mean,
    })
}
