//! Mapping from subscription ids to registered sinks.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::dispatch::SinkEntry;
use super::rate::RateHint;

/// Registered sinks, keyed by subscription id in subscription order.
#[derive(Default)]
pub(crate) struct SinkRegistry {
    entries: BTreeMap<u64, Arc<SinkEntry>>,
    next_id: u64,
}

impl SinkRegistry {
    pub(crate) fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Subscription id already holding the sink with this identity, if any.
    pub(crate) fn find_key(&self, key: usize) -> Option<u64> {
        self.entries
            .values()
            .find(|entry| entry.key == key)
            .map(|entry| entry.id)
    }

    pub(crate) fn insert(&mut self, entry: Arc<SinkEntry>) {
        self.entries.insert(entry.id, entry);
    }

    pub(crate) fn remove(&mut self, id: u64) -> Option<Arc<SinkEntry>> {
        self.entries.remove(&id)
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<SinkEntry>> {
        self.entries.values().cloned().collect()
    }

    /// Fastest rate requested by any registered sink.
    pub(crate) fn fastest_rate(&self) -> Option<RateHint> {
        self.entries.values().map(|entry| entry.rate).min()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
