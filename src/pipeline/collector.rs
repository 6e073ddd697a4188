//! Input-ordered result assembly.
//!
//! Stage completions arrive in whatever order the store answers. Every
//! item was tagged with its input index at ingestion; the collector slots
//! completions by that index and drains them in index order, so the final
//! sequence depends only on where an item entered the run, never on when
//! its calls finished.

use std::collections::BTreeMap;

use crate::record::Record;

/// Reordering buffer keyed by ingestion index.
#[derive(Debug, Default)]
pub(crate) struct OrderedCollector {
    slots: BTreeMap<u64, Record>,
}

impl OrderedCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot a surviving record at its input position.
    pub fn insert(&mut self, index: u64, record: Record) {
        debug_assert!(
            !self.slots.contains_key(&index),
            "one surviving record per input index"
        );
        self.slots.insert(index, record);
    }

    /// Number of records collected so far.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Consume the collector, yielding records in input order.
    pub fn into_ordered(self) -> Vec<Record> {
        self.slots.into_values().collect()
    }
}
