//! Per-thread profiler for inline instrumentation
//!
//! Instrumented code calls these functions (or the [`profile_block!`](crate::profile_block)
//! macro) without threading a [`Profiler`] through every signature. Each thread owns its own
//! run, so the "current parent" pointer is never shared between threads.
//!
//! The run is configured from the environment on first use: unless `PROFILER=true`, every
//! operation here is a no-op. [`init`] replaces the thread's run with an explicit
//! configuration.
//!
//! Malformed instrumentation (out-of-range ids, ends without a start, instrumented code
//! reached from inside [`with_profiler`]) is reported on stderr and skipped; it never aborts
//! the program.

use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::panic::Location;
use std::thread::LocalKey;

use crate::anchor::AnchorId;
use crate::cli::ReportFormat;
use crate::config::ProfilerConfig;
use crate::error::ProfilerError;
use crate::json_output::JsonOutput;
use crate::profiler::Profiler;
use crate::report::ProfileReport;
use crate::timestamp::HardwareClock;

struct ThreadRun {
    profiler: Option<Profiler>,
    /// Bumped by every `init`, invalidating call-site handle caches and open guards
    generation: u64,
}

impl ThreadRun {
    fn new(config: &ProfilerConfig, generation: u64) -> Self {
        let profiler = config
            .enabled
            .then(|| Profiler::with_config(HardwareClock, config));
        Self {
            profiler,
            generation,
        }
    }
}

thread_local! {
    static CONFIG: RefCell<ProfilerConfig> = RefCell::new(ProfilerConfig::from_env());
    static RUN: RefCell<ThreadRun> = RefCell::new(ThreadRun::new(&config(), 0));
}

/// Handle cached by a `profile_block!` call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedAnchor {
    generation: u64,
    id: AnchorId,
}

/// Slot type behind each `profile_block!` call site
pub type AnchorCache = Cell<Option<CachedAnchor>>;

fn report_error(err: &ProfilerError) {
    eprintln!("{}", err);
}

/// Run `f` on this thread's run.
///
/// `None` when the run is already borrowed further up the stack (instrumented code called
/// from inside [`with_profiler`]) or the thread is being torn down.
fn with_run<R>(
    location: &'static Location<'static>,
    f: impl FnOnce(&mut ThreadRun) -> R,
) -> Option<R> {
    RUN.try_with(|run| match run.try_borrow_mut() {
        Ok(mut run) => Some(f(&mut run)),
        Err(_) => {
            report_error(&ProfilerError::Reentered { location });
            None
        }
    })
    .ok()
    .flatten()
}

fn profiler_at<R>(
    location: &'static Location<'static>,
    f: impl FnOnce(&mut Profiler) -> R,
) -> Option<R> {
    with_run(location, |run| run.profiler.as_mut().map(f)).flatten()
}

/// Replace this thread's run with one configured by `config`.
///
/// Skipped (and reported on stderr) when called from inside [`with_profiler`].
#[track_caller]
pub fn init(config: ProfilerConfig) {
    let replaced = with_run(Location::caller(), |run| {
        let generation = run.generation + 1;
        tracing::debug!(enabled = config.enabled, capacity = config.capacity, generation, "profiler run started");
        *run = ThreadRun::new(&config, generation);
    });
    if replaced.is_some() {
        let _ = CONFIG.try_with(|current| *current.borrow_mut() = config);
    }
}

/// Whether this thread's run records anything
pub fn is_enabled() -> bool {
    config().enabled
}

/// Configuration of this thread's run
pub fn config() -> ProfilerConfig {
    CONFIG
        .try_with(|config| config.borrow().clone())
        .unwrap_or_default()
}

/// Run `f` against this thread's profiler, if profiling is enabled.
///
/// Instrumentation reached from inside `f` cannot see the profiler: it is reported on stderr
/// and skipped.
#[track_caller]
pub fn with_profiler<R>(f: impl FnOnce(&mut Profiler) -> R) -> Option<R> {
    profiler_at(Location::caller(), f)
}

/// Open a block for the region at raw id `id`
#[track_caller]
pub fn time_function_start(id: usize, label: &str) {
    let location = Location::caller();
    profiler_at(location, |profiler| {
        if let Err(err) = profiler.start_at(id, label, location) {
            report_error(&err);
        }
    });
}

/// Close the innermost open block of the region at raw id `id`
#[track_caller]
pub fn time_function_end(id: usize) {
    let location = Location::caller();
    profiler_at(location, |profiler| {
        if let Err(err) = profiler.end_at(id, location) {
            report_error(&err);
        }
    });
}

/// Handle for the region named `label`, `None` when profiling is disabled
#[track_caller]
pub fn register(label: &str) -> Option<AnchorId> {
    profiler_at(Location::caller(), |profiler| profiler.register(label))
}

/// Closes its block when dropped
#[must_use = "the region ends when the guard is dropped"]
#[derive(Debug)]
pub struct ZoneGuard {
    open: Option<(u64, usize)>,
    location: &'static Location<'static>,
    _not_send: PhantomData<*const ()>,
}

impl ZoneGuard {
    fn inactive(location: &'static Location<'static>) -> Self {
        Self {
            open: None,
            location,
            _not_send: PhantomData,
        }
    }

    /// Whether this guard actually opened a block
    pub fn is_active(&self) -> bool {
        self.open.is_some()
    }
}

impl Drop for ZoneGuard {
    fn drop(&mut self) {
        let Some((generation, id)) = self.open else {
            return;
        };
        let location = self.location;
        with_run(location, |run| {
            if run.generation != generation {
                return;
            }
            if let Some(profiler) = run.profiler.as_mut() {
                if let Err(err) = profiler.end_at(id, location) {
                    report_error(&err);
                }
            }
        });
    }
}

/// Time the rest of the enclosing scope under raw id `id`
#[track_caller]
pub fn scope(id: usize, label: &str) -> ZoneGuard {
    let location = Location::caller();
    with_run(location, |run| {
        let generation = run.generation;
        let Some(profiler) = run.profiler.as_mut() else {
            return ZoneGuard::inactive(location);
        };
        match profiler.start_at(id, label, location) {
            Ok(()) => ZoneGuard {
                open: Some((generation, id)),
                location,
                _not_send: PhantomData,
            },
            Err(err) => {
                report_error(&err);
                ZoneGuard::inactive(location)
            }
        }
    })
    .unwrap_or_else(|| ZoneGuard::inactive(location))
}

/// Time the rest of the enclosing scope under the region named `label`
#[track_caller]
pub fn enter(label: &str) -> ZoneGuard {
    let location = Location::caller();
    with_run(location, |run| {
        let generation = run.generation;
        match run.profiler.as_mut() {
            Some(profiler) => {
                let id = profiler.register(label);
                open_registered(profiler, generation, id, location)
            }
            None => ZoneGuard::inactive(location),
        }
    })
    .unwrap_or_else(|| ZoneGuard::inactive(location))
}

/// Like [`enter`], but resolves the handle through a per-call-site cache.
///
/// Used by [`profile_block!`](crate::profile_block).
#[track_caller]
pub fn enter_cached(cache: &'static LocalKey<AnchorCache>, label: &str) -> ZoneGuard {
    let location = Location::caller();
    with_run(location, |run| {
        let generation = run.generation;
        let Some(profiler) = run.profiler.as_mut() else {
            return ZoneGuard::inactive(location);
        };

        let id = match cache.with(Cell::get) {
            Some(cached) if cached.generation == generation => cached.id,
            _ => {
                let id = profiler.register(label);
                cache.with(|slot| slot.set(Some(CachedAnchor { generation, id })));
                id
            }
        };
        open_registered(profiler, generation, id, location)
    })
    .unwrap_or_else(|| ZoneGuard::inactive(location))
}

fn open_registered(
    profiler: &mut Profiler,
    generation: u64,
    id: AnchorId,
    location: &'static Location<'static>,
) -> ZoneGuard {
    match profiler.enter_at(id, location) {
        Ok(()) => ZoneGuard {
            open: Some((generation, id.index())),
            location,
            _not_send: PhantomData,
        },
        Err(err) => {
            report_error(&err);
            ZoneGuard::inactive(location)
        }
    }
}

/// End this thread's run and return its report, `None` when profiling is disabled
#[track_caller]
pub fn finish() -> Option<ProfileReport> {
    profiler_at(Location::caller(), Profiler::finish)
}

/// End this thread's run and print the report to stdout in the configured format.
///
/// Does nothing when profiling is disabled.
pub fn print_report() -> anyhow::Result<()> {
    let Some(report) = finish() else {
        return Ok(());
    };
    match config().format {
        ReportFormat::Text => {
            println!();
            report.print();
        }
        ReportFormat::Json => println!("{}", JsonOutput::from_report(&report).to_json()?),
    }
    Ok(())
}

/// Time the rest of the enclosing scope as the region `label` on this thread's profiler.
///
/// The anchor handle is registered once per call site and cached.
///
/// # Example
/// ```
/// use haversine::profile_block;
///
/// fn checksum(data: &[u8]) -> u32 {
///     profile_block!("checksum");
///     data.iter().map(|&b| b as u32).sum()
/// }
///
/// assert_eq!(checksum(&[1, 2, 3]), 6);
/// ```
#[macro_export]
macro_rules! profile_block {
    ($label:expr) => {
        let _profile_zone = {
            ::std::thread_local! {
                static ANCHOR: $crate::global::AnchorCache = const { ::std::cell::Cell::new(None) };
            }
            $crate::global::enter_cached(&ANCHOR, $label)
        };
    };
}

/// Time the rest of the enclosing scope under a caller-chosen anchor id.
///
/// # Example
/// ```
/// use haversine::profile_scope;
///
/// fn parse() {
///     profile_scope!(3, "parse");
/// }
///
/// parse();
/// ```
#[macro_export]
macro_rules! profile_scope {
    ($id:expr, $label:expr) => {
        let _profile_zone = $crate::global::scope($id, $label);
    };
}
