//! Two-tier decode cache.
//!
//! [`CacheCoordinator::resolve`] looks a source up in RAM, then on disk
//! (validated by content hash), and finally decodes it, admitting the result
//! to exactly one tier based on the source file size.

pub mod access;
pub mod disk;
pub mod hasher;
pub mod ram;
pub mod report;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::audio::{AudioStream, SourceDecoder};
use crate::error::AudioError;
use crate::tools::{minutes_since, now_ms};

pub use access::AccessTimes;
pub use disk::{CacheMetadata, DiskCacheEntry, DiskCacheStore, StoredFiles};
pub use hasher::content_hash;
pub use ram::{RamCacheEntry, RamCacheStore};
pub use report::{AccessRecord, CacheInfo, CacheStats, CacheStatus, ClearedCounts, EntryStatus};

const MIB: u64 = 1024 * 1024;
const RECENT_ACCESS_LISTED: usize = 10;

/// Capacity and admission limits of both tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLimits {
    pub ram_entries: usize,
    /// Largest source file admitted to RAM.
    pub ram_max_bytes: u64,
    pub disk_entries: usize,
    /// Largest source file admitted to disk.
    pub disk_max_bytes: u64,
    /// Age after which disk files are removed at startup.
    pub retention: Duration,
    /// How recent an access must be for `optimize` to promote an entry.
    pub optimize_window: Duration,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            ram_entries: 4,
            ram_max_bytes: 10 * MIB,
            disk_entries: 50,
            disk_max_bytes: 50 * MIB,
            retention: Duration::from_secs(7 * 24 * 60 * 60),
            optimize_window: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    ram_hits: u64,
    disk_hits: u64,
    misses: u64,
}

/// Owner of both tiers and the shared access table.
pub struct CacheCoordinator {
    ram: RamCacheStore,
    disk: DiskCacheStore,
    access: AccessTimes,
    limits: CacheLimits,
    decoder: Arc<dyn SourceDecoder>,
    counters: Counters,
}

impl CacheCoordinator {
    /// Coordinator for `cache_dir`. Touches nothing on disk until
    /// [`startup`](Self::startup).
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        limits: CacheLimits,
        decoder: Arc<dyn SourceDecoder>,
    ) -> Self {
        let access = AccessTimes::new();
        Self {
            ram: RamCacheStore::new(limits.ram_entries, access.clone()),
            disk: DiskCacheStore::new(cache_dir, limits.disk_entries, access.clone()),
            access,
            limits,
            decoder,
            counters: Counters::default(),
        }
    }

    /// Reset the RAM tier, prepare the cache folder, drop expired files and
    /// load the disk index. Returns the number of disk entries available.
    pub fn startup(&mut self) -> Result<usize, AudioError> {
        self.ram.clear();
        self.access.clear();
        self.disk.ensure_dir()?;
        self.disk.cleanup_expired(self.limits.retention);
        let loaded = match self.disk.load_index() {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!("cache: failed to load disk index: {}", err);
                0
            }
        };
        if loaded > 0 {
            info!("cache: {} decoded tracks available from disk", loaded);
        }
        Ok(loaded)
    }

    pub fn limits(&self) -> &CacheLimits {
        &self.limits
    }

    pub fn decoder(&self) -> &Arc<dyn SourceDecoder> {
        &self.decoder
    }

    pub fn ram(&self) -> &RamCacheStore {
        &self.ram
    }

    pub fn disk(&self) -> &DiskCacheStore {
        &self.disk
    }

    pub fn access(&self) -> &AccessTimes {
        &self.access
    }

    /// Playable stream for `source`, served from the cheapest tier available.
    ///
    /// Cache failures never fail the request; only decoding the source can.
    pub fn resolve(&mut self, filename: &str, source: &Path) -> Result<AudioStream, AudioError> {
        let key = source.to_string_lossy().into_owned();
        self.access.touch(&key);

        if let Some(stream) = self.ram.get(&key) {
            self.counters.ram_hits += 1;
            debug!("cache: RAM hit {}", filename);
            return Ok(stream);
        }

        if let Some(stream) = self.resolve_from_disk(&key, filename, source) {
            self.counters.disk_hits += 1;
            return Ok(stream);
        }

        self.counters.misses += 1;
        debug!("cache: miss {}, decoding source", filename);
        self.decode_and_admit(&key, filename, source)
    }

    fn resolve_from_disk(&mut self, key: &str, filename: &str, source: &Path) -> Option<AudioStream> {
        let entry = self.disk.lookup(key)?.clone();
        if !self.disk.is_valid(&entry, source) {
            info!("cache: disk entry for {} is stale, removing", filename);
            self.disk.remove(key);
            self.access.touch(key);
            return None;
        }

        let stream = match self.disk.load(key) {
            Ok(stream) => stream,
            Err(err) => {
                warn!("cache: disk load failed for {}: {}", filename, err);
                return None;
            }
        };
        debug!("cache: disk hit {}", filename);

        if entry.file_size <= self.limits.ram_max_bytes
            && self.ram.has_room()
            && !self.ram.contains(key)
        {
            let format = *stream.format();
            match stream.read_all() {
                Ok(bytes) => {
                    self.ram.put(key, &bytes, format, &entry.filename);
                    info!("cache: promoted {} to RAM", filename);
                    return self.ram.get(key);
                }
                Err(err) => {
                    warn!("cache: disk read failed for {}: {}", filename, err);
                    return None;
                }
            }
        }

        Some(stream)
    }

    fn decode_and_admit(
        &mut self,
        key: &str,
        filename: &str,
        source: &Path,
    ) -> Result<AudioStream, AudioError> {
        let stream = self.decoder.decode(source)?;
        let format = *stream.format();
        let bytes: Arc<[u8]> = Arc::from(stream.read_all()?);

        let source_size = fs::metadata(source)
            .map(|meta| meta.len())
            .unwrap_or(bytes.len() as u64);

        if source_size <= self.limits.ram_max_bytes && self.ram.has_room() {
            self.ram.put(key, &bytes, format, filename);
            info!("cache: stored {} in RAM", filename);
        } else if source_size <= self.limits.disk_max_bytes {
            if !self.disk.contains(key) && !self.disk.has_room() {
                self.disk.evict_oldest();
            }
            match self.disk.store(key, &bytes, format, filename, source) {
                Ok(_) => info!("cache: stored {} on disk", filename),
                Err(err) => warn!("cache: failed to store {} on disk: {}", filename, err),
            }
        } else {
            info!(
                "cache: {} too large to cache ({} bytes)",
                filename, source_size
            );
        }

        Ok(AudioStream::from_bytes(format, bytes))
    }

    /// Drop both tiers, their files and the access table.
    pub fn clear_all(&mut self) -> ClearedCounts {
        let cleared = ClearedCounts {
            ram: self.ram.clear(),
            disk: self.disk.clear(),
        };
        self.access.clear();
        info!(
            "cache: cleared {} RAM and {} disk entries",
            cleared.ram, cleared.disk
        );
        cleared
    }

    pub fn clear_ram(&mut self) -> usize {
        let cleared = self.ram.clear();
        info!("cache: cleared {} RAM entries", cleared);
        cleared
    }

    pub fn clear_disk(&mut self) -> usize {
        let cleared = self.disk.clear();
        info!("cache: cleared {} disk entries", cleared);
        cleared
    }

    /// Promote recently played disk entries into free RAM slots.
    /// Returns how many were promoted.
    pub fn optimize(&mut self) -> usize {
        let window_ms = self.limits.optimize_window.as_millis() as u64;
        let now = now_ms();
        let mut candidates: Vec<(String, u64)> = self
            .disk
            .entries()
            .into_iter()
            .filter(|(key, entry)| {
                entry.file_size <= self.limits.ram_max_bytes && !self.ram.contains(key)
            })
            .filter_map(|(key, _)| {
                self.access
                    .get(key)
                    .filter(|stamp| now.saturating_sub(*stamp) < window_ms)
                    .map(|stamp| (key.to_string(), stamp))
            })
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1));

        let mut promoted = 0;
        for (key, _) in candidates {
            if !self.ram.has_room() {
                break;
            }
            let filename = match self.disk.lookup(&key) {
                Some(entry) => entry.filename.clone(),
                None => continue,
            };
            let loaded = self
                .disk
                .load(&key)
                .and_then(|stream| {
                    let format = *stream.format();
                    Ok((format, stream.read_all()?))
                });
            match loaded {
                Ok((format, bytes)) => {
                    self.ram.put(&key, &bytes, format, &filename);
                    info!("cache: optimize promoted {}", filename);
                    promoted += 1;
                }
                Err(err) => warn!("cache: optimize could not promote {}: {}", filename, err),
            }
        }
        promoted
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            ram_entries: self.ram.len(),
            ram_capacity: self.ram.capacity(),
            ram_bytes: self.ram.total_bytes(),
            disk_entries: self.disk.len(),
            disk_capacity: self.disk.capacity(),
            disk_bytes: self.disk.total_bytes(),
            ram_hits: self.counters.ram_hits,
            disk_hits: self.counters.disk_hits,
            misses: self.counters.misses,
            access_records: self.access.len(),
        }
    }

    pub fn status(&self) -> CacheStatus {
        let ram = self
            .ram
            .entries()
            .into_iter()
            .map(|(key, entry)| EntryStatus {
                key: key.to_string(),
                filename: entry.filename.clone(),
                bytes: entry.len() as u64,
                age_minutes: minutes_since(entry.created_at),
            })
            .collect();
        let disk = self
            .disk
            .entries()
            .into_iter()
            .map(|(key, entry)| EntryStatus {
                key: key.to_string(),
                filename: entry.filename.clone(),
                bytes: entry.file_size,
                age_minutes: minutes_since(entry.creation_time),
            })
            .collect();
        let recent = self
            .access
            .recent(RECENT_ACCESS_LISTED)
            .into_iter()
            .map(|(key, stamp)| AccessRecord {
                key,
                minutes_ago: minutes_since(stamp),
            })
            .collect();
        CacheStatus { ram, disk, recent }
    }

    pub fn info(&self) -> CacheInfo {
        CacheInfo {
            folder: self.disk.dir().display().to_string(),
            ram_max_entries: self.limits.ram_entries,
            ram_max_file_bytes: self.limits.ram_max_bytes,
            disk_max_entries: self.limits.disk_entries,
            disk_max_file_bytes: self.limits.disk_max_bytes,
            retention_days: self.limits.retention.as_secs() / (24 * 60 * 60),
            ram_bytes: self.ram.total_bytes(),
            stored_files: self.disk.stored_files(),
        }
    }

    pub fn persist_index(&self) -> Result<(), AudioError> {
        self.disk.save_index()
    }
}
