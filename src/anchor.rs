//! Per-region accumulators and the table that owns them
//!
//! An [`Anchor`] collects the timing statistics of one labeled code region across the whole
//! run. Anchors live in an [`AnchorTable`] indexed by a small integer id, either chosen by the
//! call site or handed out by [`AnchorTable::register`].

use std::collections::HashMap;
use std::fmt;

/// Default number of addressable anchor ids
pub const DEFAULT_ANCHOR_CAPACITY: usize = 4096;

/// Opaque handle to an anchor slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId(pub(crate) usize);

impl AnchorId {
    /// The raw table index behind this handle
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One in-flight invocation of a region, alive between its start and end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveBlock {
    /// Cycle counter at entry
    pub start_cycles: u64,
    /// Anchor that was executing when this block started
    pub parent: Option<usize>,
    /// The anchor's `root_elapsed_cycles` when this block started
    pub prior_root_elapsed: u64,
}

/// Timing statistics for one labeled region
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Anchor {
    /// Display name, overwritten by every start
    pub label: String,
    /// Sum of every completed block's elapsed cycles, recursive frames included
    pub elapsed_cycles: u64,
    /// Cycles spent in regions started while this one was the current parent
    pub children_cycles: u64,
    /// Inclusive cycles of the outermost invocations
    pub root_elapsed_cycles: u64,
    /// Completed ends
    pub hit_count: u64,
    /// Open blocks, innermost last
    pub(crate) blocks: Vec<ActiveBlock>,
}

impl Anchor {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..Default::default()
        }
    }

    /// Cycles spent in this region itself, excluding nested regions
    pub fn exclusive_cycles(&self) -> u64 {
        self.elapsed_cycles.wrapping_sub(self.children_cycles)
    }

    /// Number of blocks started but not yet ended
    pub fn open_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the region ever completed, and so belongs in a report
    pub fn is_populated(&self) -> bool {
        self.hit_count > 0
    }
}

/// Anchor storage for one run.
///
/// Slots are allocated lazily. Raw ids must stay below [`AnchorTable::capacity`]; the
/// registration API grows that capacity when every slot is taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorTable {
    slots: Vec<Option<Anchor>>,
    capacity: usize,
    registered: HashMap<String, usize>,
}

impl Default for AnchorTable {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_ANCHOR_CAPACITY)
    }
}

impl AnchorTable {
    /// Create a table addressing ids `0..capacity`
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            capacity,
            registered: HashMap::new(),
        }
    }

    /// Number of addressable ids
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether `id` may be addressed
    pub fn in_range(&self, id: usize) -> bool {
        id < self.capacity
    }

    /// Anchor at `id`, if it has ever been started
    pub fn get(&self, id: usize) -> Option<&Anchor> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: usize) -> Option<&mut Anchor> {
        self.slots.get_mut(id).and_then(Option::as_mut)
    }

    /// Anchor at `id`, allocating it on first use. `id` must be in range.
    pub(crate) fn get_or_insert(&mut self, id: usize, label: &str) -> &mut Anchor {
        debug_assert!(self.in_range(id));
        if self.slots.len() <= id {
            self.slots.resize_with(id + 1, || None);
        }
        self.slots[id].get_or_insert_with(|| Anchor::new(label))
    }

    /// Handle for the region named `label`.
    ///
    /// Idempotent per label. Takes the lowest slot never touched by a raw-id start, growing
    /// the capacity when none is free.
    pub fn register(&mut self, label: &str) -> AnchorId {
        if let Some(&id) = self.registered.get(label) {
            return AnchorId(id);
        }

        let id = match self.slots.iter().position(Option::is_none) {
            Some(free) => free,
            None => {
                let next = self.slots.len();
                if next >= self.capacity {
                    let grown = (self.capacity * 2).max(1);
                    tracing::debug!(from = self.capacity, to = grown, "growing anchor table");
                    self.capacity = grown;
                }
                self.slots.push(None);
                next
            }
        };

        self.slots[id] = Some(Anchor::new(label));
        self.registered.insert(label.to_string(), id);
        AnchorId(id)
    }

    /// Every allocated anchor with its id, in id order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Anchor)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|anchor| (id, anchor)))
    }

    /// Anchors that completed at least once, in id order
    pub fn populated(&self) -> impl Iterator<Item = (usize, &Anchor)> {
        self.iter().filter(|(_, anchor)| anchor.is_populated())
    }

    /// Number of allocated anchors
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
