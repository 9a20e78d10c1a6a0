//! Nested region profiler
//!
//! Measures elapsed cycle-counter ticks per labeled region, separating a region's own time
//! from the time spent in regions it calls, and tolerating recursive re-entry.
//!
//! Attribution works with one "current parent" id and a block stack per anchor:
//!
//! - `start` pushes a block remembering the current parent and the anchor's inclusive
//!   total at that moment, then makes the anchor the current parent.
//! - `end` pops the block, charges the elapsed cycles to the anchor and to its parent's
//!   children bucket, and restores the anchor's inclusive total to
//!   `snapshot + elapsed`. An inner recursive frame therefore never inflates the inclusive
//!   window of the outer frame: the outer frame's end overwrites it from its own snapshot.
//!
//! Starts and ends must nest (LIFO). Mis-nested instrumentation is not detected beyond
//! ends that have no open block; it degrades the numbers but never panics.

use std::cell::OnceCell;
use std::panic::Location;

use crate::anchor::{ActiveBlock, AnchorId, AnchorTable};
use crate::calibration::estimate_frequency;
use crate::config::ProfilerConfig;
use crate::error::ProfilerError;
use crate::report::ProfileReport;
use crate::timestamp::{HardwareClock, TimestampSource};

/// Accounting state for one profiling run
#[derive(Debug)]
pub struct Profiler<C: TimestampSource = HardwareClock> {
    clock: C,
    table: AnchorTable,
    current_parent: Option<usize>,
    start_cycles: u64,
    end_cycles: Option<u64>,
    calibration_wait_ms: u64,
    frequency: OnceCell<Option<u64>>,
}

impl Profiler<HardwareClock> {
    /// Start a run on the hardware clocks with default settings
    pub fn hardware() -> Self {
        Self::new(HardwareClock)
    }
}

impl<C: TimestampSource> Profiler<C> {
    /// Start a run, recording the run's first cycle count
    pub fn new(clock: C) -> Self {
        Self::with_config(clock, &ProfilerConfig::default())
    }

    /// Start a run with the table capacity and calibration wait from `config`
    pub fn with_config(clock: C, config: &ProfilerConfig) -> Self {
        let start_cycles = clock.read_cycle_counter();
        Self {
            clock,
            table: AnchorTable::with_capacity(config.capacity),
            current_parent: None,
            start_cycles,
            end_cycles: None,
            calibration_wait_ms: config.calibration_wait_ms,
            frequency: OnceCell::new(),
        }
    }

    /// Use a known counter frequency instead of calibrating. `None` marks it unavailable.
    pub fn with_frequency(self, frequency: Option<u64>) -> Self {
        let frequency = OnceCell::from(frequency.filter(|&freq| freq > 0));
        Self { frequency, ..self }
    }

    /// Open a block for the region at raw id `id`.
    ///
    /// Allocates the anchor on first use and (re)sets its label. Out-of-range ids leave the
    /// table untouched.
    #[track_caller]
    pub fn start(&mut self, id: usize, label: &str) -> Result<(), ProfilerError> {
        self.start_at(id, label, Location::caller())
    }

    pub(crate) fn start_at(
        &mut self,
        id: usize,
        label: &str,
        location: &'static Location<'static>,
    ) -> Result<(), ProfilerError> {
        if !self.table.in_range(id) {
            return Err(ProfilerError::AnchorOutOfRange {
                id,
                capacity: self.table.capacity(),
                location,
            });
        }

        let anchor = self.table.get_or_insert(id, label);
        if anchor.label != label {
            anchor.label.clear();
            anchor.label.push_str(label);
        }
        self.open_block(id);
        Ok(())
    }

    /// Close the innermost open block of the region at raw id `id`
    #[track_caller]
    pub fn end(&mut self, id: usize) -> Result<(), ProfilerError> {
        self.end_at(id, Location::caller())
    }

    pub(crate) fn end_at(
        &mut self,
        id: usize,
        location: &'static Location<'static>,
    ) -> Result<(), ProfilerError> {
        let end_cycles = self.clock.read_cycle_counter();

        if !self.table.in_range(id) {
            return Err(ProfilerError::AnchorOutOfRange {
                id,
                capacity: self.table.capacity(),
                location,
            });
        }
        let anchor = self
            .table
            .get_mut(id)
            .ok_or(ProfilerError::UnknownAnchor { id, location })?;
        let block = anchor.blocks.pop().ok_or_else(|| ProfilerError::NoOpenBlock {
            id,
            label: anchor.label.clone(),
            location,
        })?;

        let elapsed = end_cycles.wrapping_sub(block.start_cycles);
        anchor.elapsed_cycles = anchor.elapsed_cycles.wrapping_add(elapsed);
        anchor.root_elapsed_cycles = block.prior_root_elapsed.wrapping_add(elapsed);
        anchor.hit_count += 1;

        if let Some(parent) = block.parent.and_then(|parent| self.table.get_mut(parent)) {
            parent.children_cycles = parent.children_cycles.wrapping_add(elapsed);
        }
        self.current_parent = block.parent;
        Ok(())
    }

    /// Handle for the region named `label`, allocating a slot on first registration
    pub fn register(&mut self, label: &str) -> AnchorId {
        self.table.register(label)
    }

    /// Open a block for a registered region
    #[track_caller]
    pub fn enter(&mut self, id: AnchorId) -> Result<(), ProfilerError> {
        self.enter_at(id, Location::caller())
    }

    pub(crate) fn enter_at(
        &mut self,
        id: AnchorId,
        location: &'static Location<'static>,
    ) -> Result<(), ProfilerError> {
        if self.table.get(id.0).is_none() {
            return Err(ProfilerError::UnknownAnchor { id: id.0, location });
        }
        self.open_block(id.0);
        Ok(())
    }

    /// Close the innermost open block of a registered region
    #[track_caller]
    pub fn exit(&mut self, id: AnchorId) -> Result<(), ProfilerError> {
        self.end_at(id.0, Location::caller())
    }

    /// Time `f` as one block of the region at `id`.
    ///
    /// `f` receives the profiler so it can open nested regions.
    ///
    /// # Example
    /// ```
    /// use haversine::profiler::Profiler;
    /// use haversine::timestamp::ManualClock;
    ///
    /// let clock = ManualClock::new();
    /// let mut profiler = Profiler::new(&clock);
    /// let sum = profiler
    ///     .time(0, "outer", |p| {
    ///         clock.advance(10);
    ///         p.time(1, "inner", |_| {
    ///             clock.advance(5);
    ///             2 + 2
    ///         })
    ///         .unwrap()
    ///     })
    ///     .unwrap();
    /// assert_eq!(sum, 4);
    /// assert_eq!(profiler.table().get(0).unwrap().exclusive_cycles(), 10);
    /// ```
    #[track_caller]
    pub fn time<F, R>(&mut self, id: usize, label: &str, f: F) -> Result<R, ProfilerError>
    where
        F: FnOnce(&mut Self) -> R,
    {
        let location = Location::caller();
        self.start_at(id, label, location)?;
        let result = f(self);
        self.end_at(id, location)?;
        Ok(result)
    }

    /// Push a block on an allocated, in-range anchor and make it the current parent
    fn open_block(&mut self, id: usize) {
        let parent = self.current_parent;
        self.current_parent = Some(id);

        if let Some(anchor) = self.table.get_mut(id) {
            let mut block = ActiveBlock {
                start_cycles: 0,
                parent,
                prior_root_elapsed: anchor.root_elapsed_cycles,
            };
            // Read last so bookkeeping above stays outside the measured window
            block.start_cycles = self.clock.read_cycle_counter();
            anchor.blocks.push(block);
        }
    }

    /// Record the run's last cycle count (first call only) and produce the report.
    ///
    /// Calibrates the counter frequency if it has not been resolved yet.
    pub fn finish(&mut self) -> ProfileReport {
        let end_cycles = *self
            .end_cycles
            .get_or_insert_with(|| self.clock.read_cycle_counter());

        for (id, anchor) in self.table.iter() {
            if anchor.open_blocks() > 0 {
                tracing::debug!(id, label = %anchor.label, open = anchor.open_blocks(), "anchor still open at end of run");
            }
        }

        let total_cycles = end_cycles.wrapping_sub(self.start_cycles);
        ProfileReport::from_table(&self.table, total_cycles, self.frequency())
    }

    /// Counter frequency in ticks per second, calibrated on first use
    pub fn frequency(&self) -> Option<u64> {
        *self
            .frequency
            .get_or_init(|| estimate_frequency(&self.clock, self.calibration_wait_ms))
    }

    pub fn table(&self) -> &AnchorTable {
        &self.table
    }

    /// Anchor id currently executing, if any
    pub fn current_parent(&self) -> Option<usize> {
        self.current_parent
    }

    pub fn start_cycles(&self) -> u64 {
        self.start_cycles
    }

    /// Last cycle count of the run, once [`Profiler::finish`] has been called
    pub fn end_cycles(&self) -> Option<u64> {
        self.end_cycles
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}
