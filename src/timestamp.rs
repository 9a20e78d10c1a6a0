//! Timestamp sources for the profiler
//!
//! The profiler reads two clocks: a free-running hardware cycle counter used for every
//! region entry and exit, and a coarse monotonic wall clock used only to calibrate the
//! counter's frequency. Both sit behind [`TimestampSource`] so tests can drive the
//! accounting with deterministic clocks.

use std::cell::Cell;
use std::sync::OnceLock;
use std::time::Instant;

/// Resolution of the OS wall clock, in ticks per second (microseconds).
pub const OS_TIMER_FREQ: u64 = 1_000_000;

/// A pair of clocks: the cycle counter and the OS wall clock
pub trait TimestampSource {
    /// Current value of the cycle counter. Monotonically non-decreasing.
    fn read_cycle_counter(&self) -> u64;

    /// Microseconds since an arbitrary, fixed epoch. Monotonic.
    fn read_wall_clock(&self) -> u64;
}

/// Process-wide epoch for the wall clock and the counter fallback
fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Read the hardware cycle counter directly.
///
/// Single instruction on x86_64 (`rdtsc`) and aarch64 (`mrs cntvct_el0`). Other
/// architectures fall back to nanoseconds since the process epoch.
#[inline(always)]
pub fn read_cpu_timer() -> u64 {
    #[cfg(target_arch = "x86_64")]
    {
        // SAFETY: rdtsc has no preconditions and is available on every x86_64 CPU.
        unsafe { core::arch::x86_64::_rdtsc() }
    }
    #[cfg(target_arch = "aarch64")]
    {
        let val: u64;
        // SAFETY: cntvct_el0 is readable from EL0 on every aarch64 OS we target.
        unsafe { core::arch::asm!("mrs {}, cntvct_el0", out(reg) val) };
        val
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        epoch().elapsed().as_nanos() as u64
    }
}

/// Read the OS timer in [`OS_TIMER_FREQ`] ticks
#[inline]
pub fn read_os_timer() -> u64 {
    epoch().elapsed().as_micros() as u64
}

/// The real clocks of the machine
#[derive(Debug, Clone, Copy, Default)]
pub struct HardwareClock;

impl TimestampSource for HardwareClock {
    #[inline(always)]
    fn read_cycle_counter(&self) -> u64 {
        read_cpu_timer()
    }

    #[inline]
    fn read_wall_clock(&self) -> u64 {
        read_os_timer()
    }
}

/// A clock that only moves when told to.
///
/// Cycle counter and wall clock are independent; reading either never advances it.
/// Useful for exercising the profiler's accounting with exact tick counts.
///
/// # Example
/// ```
/// use haversine::timestamp::{ManualClock, TimestampSource};
///
/// let clock = ManualClock::new();
/// clock.advance(40);
/// assert_eq!(clock.read_cycle_counter(), 40);
/// assert_eq!(clock.read_cycle_counter(), 40);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    cycles: Cell<u64>,
    wall_us: Cell<u64>,
}

impl ManualClock {
    /// Create a clock with both counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the cycle counter by `ticks`
    pub fn advance(&self, ticks: u64) {
        self.cycles.set(self.cycles.get() + ticks);
    }

    /// Advance the wall clock by `micros`
    pub fn advance_wall(&self, micros: u64) {
        self.wall_us.set(self.wall_us.get() + micros);
    }

    /// Current cycle counter value
    pub fn now(&self) -> u64 {
        self.cycles.get()
    }
}

impl TimestampSource for ManualClock {
    fn read_cycle_counter(&self) -> u64 {
        self.cycles.get()
    }

    fn read_wall_clock(&self) -> u64 {
        self.wall_us.get()
    }
}

impl<T: TimestampSource + ?Sized> TimestampSource for &T {
    fn read_cycle_counter(&self) -> u64 {
        (**self).read_cycle_counter()
    }

    fn read_wall_clock(&self) -> u64 {
        (**self).read_wall_clock()
    }
}
