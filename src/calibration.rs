//! Cycle counter frequency estimation
//!
//! The cycle counter has no architecturally guaranteed rate, so converting cycles to
//! milliseconds needs a calibration: spin on the OS timer for a fixed wall-clock interval
//! and compare how far each clock moved.
//!
//! The spin costs a fixed busy-wait (100ms by default) each time it runs. It runs once per
//! report, never per region: a longer wait gives a tighter estimate at the price of that
//! much extra latency when the report is produced.

use crate::timestamp::{TimestampSource, OS_TIMER_FREQ};

/// Default calibration interval in milliseconds
pub const DEFAULT_CALIBRATION_WAIT_MS: u64 = 100;

/// Consecutive unchanged OS timer reads after which the clock is considered stalled
pub const STALL_LIMIT: u32 = 1 << 24;

/// Estimate the cycle counter frequency in ticks per second.
///
/// Returns `None` when the OS timer did not advance during the wait (`wait_millis == 0`,
/// or a timer that stays put for [`STALL_LIMIT`] reads) or the counter did not move. The
/// frequency is then unavailable and no millisecond figure can be derived from it.
///
/// # Example
/// ```
/// use haversine::calibration::estimate_frequency;
/// use haversine::timestamp::ManualClock;
///
/// // A clock whose wall time never moves cannot be calibrated.
/// let clock = ManualClock::new();
/// assert_eq!(estimate_frequency(&clock, 100), None);
/// ```
pub fn estimate_frequency<C: TimestampSource + ?Sized>(clock: &C, wait_millis: u64) -> Option<u64> {
    let os_wait = OS_TIMER_FREQ * wait_millis / 1000;

    let cpu_start = clock.read_cycle_counter();
    let os_start = clock.read_wall_clock();

    let mut os_elapsed = 0u64;
    let mut unchanged = 0u32;
    while os_elapsed < os_wait {
        let elapsed = clock.read_wall_clock().saturating_sub(os_start);
        if elapsed == os_elapsed {
            unchanged += 1;
            if unchanged >= STALL_LIMIT {
                tracing::warn!(os_elapsed, "OS timer stalled during calibration");
                break;
            }
        } else {
            unchanged = 0;
            os_elapsed = elapsed;
        }
    }

    let cpu_elapsed = clock.read_cycle_counter().wrapping_sub(cpu_start);

    if os_elapsed == 0 {
        tracing::debug!(wait_millis, "OS timer did not advance, frequency unavailable");
        return None;
    }

    let freq = (OS_TIMER_FREQ as u128 * cpu_elapsed as u128 / os_elapsed as u128) as u64;
    tracing::debug!(freq, cpu_elapsed, os_elapsed, "calibrated cycle counter");

    if freq == 0 {
        None
    } else {
        Some(freq)
    }
}

/// Convert a cycle count to milliseconds at `freq` ticks per second
pub fn cycles_to_ms(cycles: u64, freq: u64) -> f64 {
    1000.0 * cycles as f64 / freq as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Each wall-clock read moves time forward by `step_us`; the cycle counter
    /// reads `ratio` cycles per microsecond of the last observed wall time.
    struct LockstepClock {
        wall_us: Cell<u64>,
        observed_us: Cell<u64>,
        step_us: u64,
        ratio: u64,
    }

    impl LockstepClock {
        fn new(step_us: u64, ratio: u64) -> Self {
            Self {
                wall_us: Cell::new(0),
                observed_us: Cell::new(0),
                step_us,
                ratio,
            }
        }
    }

    impl TimestampSource for LockstepClock {
        fn read_cycle_counter(&self) -> u64 {
            self.observed_us.get() * self.ratio
        }

        fn read_wall_clock(&self) -> u64 {
            let now = self.wall_us.get();
            self.observed_us.set(now);
            self.wall_us.set(now + self.step_us);
            now
        }
    }

    #[test]
    fn test_lockstep_clock_estimate() {
        let clock = LockstepClock::new(1_000, 3_000);
        // 3000 cycles per microsecond == 3 GHz
        assert_eq!(estimate_frequency(&clock, 100), Some(3_000_000_000));
    }

    #[test]
    fn test_zero_wait_is_unavailable() {
        let clock = LockstepClock::new(1_000, 3_000);
        assert_eq!(estimate_frequency(&clock, 0), None);
    }

    #[test]
    fn test_frozen_cycle_counter_is_unavailable() {
        let clock = LockstepClock::new(10, 0);
        assert_eq!(estimate_frequency(&clock, 1), None);
    }

    #[test]
    fn test_coarse_wall_clock_overshoot() {
        // A 7ms tick against a 10ms wait overshoots to 14ms; the ratio still holds
        let clock = LockstepClock::new(7_000, 2_500);
        assert_eq!(estimate_frequency(&clock, 10), Some(2_500_000_000));
    }

    #[test]
    fn test_stalled_wall_clock_is_unavailable() {
        let clock = crate::timestamp::ManualClock::new();
        clock.advance(1_000);
        assert_eq!(estimate_frequency(&clock, 100), None);
    }

    #[test]
    fn test_cycles_to_ms() {
        assert_eq!(cycles_to_ms(3_000_000, 3_000_000_000), 1.0);
        assert_eq!(cycles_to_ms(0, 1), 0.0);
    }
}
