use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::audio::{AudioFormat, AudioStream};
use crate::tools::now_ms;

use super::access::AccessTimes;

/// A decoded payload held in memory.
#[derive(Debug, Clone)]
pub struct RamCacheEntry {
    pub data: Arc<[u8]>,
    pub format: AudioFormat,
    pub filename: String,
    pub created_at: u64,
    seq: u64,
}

impl RamCacheEntry {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// In-process tier for small, hot payloads.
///
/// Never persisted. Every stored payload is a private copy so later mutation
/// of the caller's buffer cannot leak into cached audio.
#[derive(Debug)]
pub struct RamCacheStore {
    entries: HashMap<String, RamCacheEntry>,
    max_entries: usize,
    access: AccessTimes,
    next_seq: u64,
}

impl RamCacheStore {
    pub fn new(max_entries: usize, access: AccessTimes) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries,
            access,
            next_seq: 0,
        }
    }

    /// Fresh stream over the cached bytes of `key`.
    pub fn get(&self, key: &str) -> Option<AudioStream> {
        self.entries
            .get(key)
            .map(|entry| AudioStream::from_bytes(entry.format, entry.data.clone()))
    }

    /// Store a copy of `bytes` under `key`, evicting the least recently used
    /// entry first when the tier is full. Returns the evicted key.
    pub fn put(
        &mut self,
        key: &str,
        bytes: &[u8],
        format: AudioFormat,
        filename: &str,
    ) -> Option<String> {
        let mut evicted = None;
        if !self.entries.contains_key(key) && !self.has_room() {
            evicted = self.evict_oldest();
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            key.to_string(),
            RamCacheEntry {
                data: Arc::from(bytes),
                format,
                filename: filename.to_string(),
                created_at: now_ms(),
                seq,
            },
        );
        debug!("ram cache: stored {} ({} bytes)", filename, bytes.len());
        evicted
    }

    /// Drop the least recently used entry.
    ///
    /// Ordered by access time; entries without an access record fall back to
    /// creation time, then insertion order. The access record is kept.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let victim = self
            .access
            .oldest_of(self.entries.keys().map(String::as_str))
            .map(str::to_string)
            .or_else(|| {
                self.entries
                    .iter()
                    .min_by_key(|(_, entry)| (entry.created_at, entry.seq))
                    .map(|(key, _)| key.clone())
            })?;

        if let Some(entry) = self.entries.remove(&victim) {
            debug!(
                "ram cache: evicted {} ({} bytes)",
                entry.filename,
                entry.data.len()
            );
        }
        Some(victim)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn has_room(&self) -> bool {
        self.entries.len() < self.max_entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.values().map(|entry| entry.len() as u64).sum()
    }

    /// Remove every entry and return how many were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Entries sorted by key.
    pub fn entries(&self) -> Vec<(&str, &RamCacheEntry)> {
        let mut listed: Vec<(&str, &RamCacheEntry)> = self
            .entries
            .iter()
            .map(|(key, entry)| (key.as_str(), entry))
            .collect();
        listed.sort_by(|a, b| a.0.cmp(b.0));
        listed
    }
}
