use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::tools::now_ms;

/// Last-access table shared by the RAM and disk tiers.
///
/// Stamps are wall-clock milliseconds, bumped so that every touch on the same
/// table is strictly later than the previous one. Cloning shares the table.
#[derive(Debug, Clone, Default)]
pub struct AccessTimes {
    entries: Arc<DashMap<String, u64>>,
    last: Arc<AtomicU64>,
}

impl AccessTimes {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_stamp(&self) -> u64 {
        let now = now_ms();
        let mut current = self.last.load(Ordering::SeqCst);
        loop {
            let next = now.max(current + 1);
            match self
                .last
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }

    /// Record an access to `key` now and return the stamp.
    pub fn touch(&self, key: &str) -> u64 {
        let stamp = self.next_stamp();
        self.entries.insert(key.to_string(), stamp);
        stamp
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        self.entries.get(key).map(|entry| *entry.value())
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Up to `limit` records, most recent first.
    pub fn recent(&self, limit: usize) -> Vec<(String, u64)> {
        let mut records: Vec<(String, u64)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        records.sort_by(|a, b| b.1.cmp(&a.1));
        records.truncate(limit);
        records
    }

    /// Among `keys`, the one with the oldest recorded access.
    ///
    /// Keys without a record are ignored; `None` when none has one.
    pub fn oldest_of<'a, I>(&self, keys: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        keys.into_iter()
            .filter_map(|key| self.get(key).map(|stamp| (key, stamp)))
            .min_by_key(|(_, stamp)| *stamp)
            .map(|(key, _)| key)
    }
}
