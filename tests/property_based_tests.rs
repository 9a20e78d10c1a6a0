//! Property-based tests for cycle attribution
//!
//! A random program of opens, closes and clock advances is run against the profiler and
//! against a straightforward model that tracks spans directly. Both must agree.

use std::collections::HashMap;

use haversine::profiler::Profiler;
use haversine::timestamp::ManualClock;
use proptest::prelude::*;

const ANCHORS: usize = 5;

#[derive(Debug, Clone)]
enum Op {
    Open(usize),
    Close,
    Advance(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..ANCHORS).prop_map(Op::Open),
        Just(Op::Close),
        (1u64..50).prop_map(Op::Advance),
    ]
}

/// Expected totals derived from the spans of each invocation
#[derive(Debug, Default)]
struct Model {
    hits: HashMap<usize, u64>,
    /// Sum of the spans of invocations with no same-id ancestor
    outer_span: HashMap<usize, u64>,
    /// Ticks that elapsed while at least one region was open
    covered: u64,
}

fn close(profiler: &mut Profiler<&ManualClock>, stack: &mut Vec<(usize, u64)>, model: &mut Model) {
    let Some((id, opened_at)) = stack.pop() else {
        return;
    };
    profiler.end(id).unwrap();
    *model.hits.entry(id).or_default() += 1;
    if !stack.iter().any(|&(other, _)| other == id) {
        *model.outer_span.entry(id).or_default() += profiler.clock().now() - opened_at;
    }
}

/// Run `ops` through the profiler, closing whatever is left open at the end.
///
/// With `allow_recursion` false an `Open` of an id already on the stack is skipped.
fn run<'c>(clock: &'c ManualClock, ops: &[Op], allow_recursion: bool) -> (Profiler<&'c ManualClock>, Model) {
    let mut profiler = Profiler::new(clock).with_frequency(None);
    let mut model = Model::default();
    let mut stack: Vec<(usize, u64)> = Vec::new();

    for op in ops {
        match *op {
            Op::Open(id) => {
                if !allow_recursion && stack.iter().any(|&(other, _)| other == id) {
                    continue;
                }
                profiler.start(id, &format!("region{}", id)).unwrap();
                stack.push((id, clock.now()));
            }
            Op::Close => close(&mut profiler, &mut stack, &mut model),
            Op::Advance(ticks) => {
                clock.advance(ticks);
                if !stack.is_empty() {
                    model.covered += ticks;
                }
            }
        }
    }
    while !stack.is_empty() {
        close(&mut profiler, &mut stack, &mut model);
    }
    (profiler, model)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_without_recursion_exclusive_plus_children_is_inclusive(
        ops in prop::collection::vec(op(), 0..80),
    ) {
        let clock = ManualClock::new();
        let (profiler, model) = run(&clock, &ops, false);

        for (id, anchor) in profiler.table().iter() {
            prop_assert_eq!(
                anchor.root_elapsed_cycles,
                anchor.exclusive_cycles() + anchor.children_cycles,
                "anchor {}", id
            );
            prop_assert_eq!(anchor.hit_count, model.hits.get(&id).copied().unwrap_or(0));
            prop_assert_eq!(
                anchor.root_elapsed_cycles,
                model.outer_span.get(&id).copied().unwrap_or(0)
            );
        }
    }

    #[test]
    fn prop_exclusive_time_partitions_covered_time(
        ops in prop::collection::vec(op(), 0..80),
        allow_recursion in any::<bool>(),
    ) {
        let clock = ManualClock::new();
        let (profiler, model) = run(&clock, &ops, allow_recursion);

        let exclusive: u64 = profiler
            .table()
            .iter()
            .map(|(_, anchor)| anchor.exclusive_cycles())
            .sum();
        prop_assert_eq!(exclusive, model.covered);
        prop_assert_eq!(profiler.current_parent(), None);
    }

    #[test]
    fn prop_recursive_inclusive_counts_outermost_span_once(
        ops in prop::collection::vec(op(), 0..80),
    ) {
        let clock = ManualClock::new();
        let (profiler, model) = run(&clock, &ops, true);

        for (id, anchor) in profiler.table().iter() {
            prop_assert_eq!(
                anchor.root_elapsed_cycles,
                model.outer_span.get(&id).copied().unwrap_or(0),
                "anchor {}", id
            );
            prop_assert_eq!(anchor.hit_count, model.hits.get(&id).copied().unwrap_or(0));
            prop_assert_eq!(anchor.open_blocks(), 0);
            // Self time across every frame fits inside the outermost window
            prop_assert!(
                anchor.exclusive_cycles() <= anchor.root_elapsed_cycles,
                "anchor {}: exclusive {} > inclusive {}",
                id,
                anchor.exclusive_cycles(),
                anchor.root_elapsed_cycles
            );
        }
    }

    #[test]
    fn prop_report_percentages_bounded(
        ops in prop::collection::vec(op(), 1..80),
    ) {
        let clock = ManualClock::new();
        let (mut profiler, _) = run(&clock, &ops, true);
        let report = profiler.finish();

        for anchor in &report.anchors {
            let percent = report.percent(anchor.exclusive_cycles);
            prop_assert!((0.0..=100.0).contains(&percent), "{} -> {}", anchor.label, percent);
            prop_assert!(anchor.root_elapsed_cycles <= report.total_cycles);
        }
    }
}
