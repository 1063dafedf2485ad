//! Read-only snapshots of cache state for status commands and JSON output.

use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::tools::format_file_size;

use super::disk::StoredFiles;

/// Counters and occupancy of both tiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub ram_entries: usize,
    pub ram_capacity: usize,
    pub ram_bytes: u64,
    pub disk_entries: usize,
    pub disk_capacity: usize,
    pub disk_bytes: u64,
    pub ram_hits: u64,
    pub disk_hits: u64,
    pub misses: u64,
    pub access_records: usize,
}

impl CacheStats {
    pub fn requests(&self) -> u64 {
        self.ram_hits + self.disk_hits + self.misses
    }

    /// Fraction of requests served from either tier.
    pub fn hit_rate(&self) -> f64 {
        match self.requests() {
            0 => 0.0,
            total => (self.ram_hits + self.disk_hits) as f64 / total as f64,
        }
    }
}

impl Display for CacheStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "RAM:  {}/{} entries, {}",
            self.ram_entries,
            self.ram_capacity,
            format_file_size(self.ram_bytes)
        )?;
        writeln!(
            f,
            "Disk: {}/{} entries, {}",
            self.disk_entries,
            self.disk_capacity,
            format_file_size(self.disk_bytes)
        )?;
        write!(
            f,
            "Hits: {} ram, {} disk, {} misses ({:.0}% hit rate)",
            self.ram_hits,
            self.disk_hits,
            self.misses,
            self.hit_rate() * 100.0
        )
    }
}

/// One cached track as listed by [`CacheStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryStatus {
    pub key: String,
    pub filename: String,
    pub bytes: u64,
    pub age_minutes: u64,
}

/// One access-table record, newest first in [`CacheStatus::recent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessRecord {
    pub key: String,
    pub minutes_ago: u64,
}

/// Per-entry listing of both tiers plus recent accesses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub ram: Vec<EntryStatus>,
    pub disk: Vec<EntryStatus>,
    pub recent: Vec<AccessRecord>,
}

impl Display for CacheStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "RAM cache ({} entries):", self.ram.len())?;
        for entry in &self.ram {
            writeln!(
                f,
                "  {} {} ({} min)",
                entry.filename,
                format_file_size(entry.bytes),
                entry.age_minutes
            )?;
        }
        writeln!(f, "Disk cache ({} entries):", self.disk.len())?;
        for entry in &self.disk {
            writeln!(
                f,
                "  {} {} ({} min)",
                entry.filename,
                format_file_size(entry.bytes),
                entry.age_minutes
            )?;
        }
        write!(f, "Recent accesses:")?;
        for record in &self.recent {
            write!(f, "\n  {} ({} min ago)", record.key, record.minutes_ago)?;
        }
        Ok(())
    }
}

/// Static configuration and on-disk footprint of the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheInfo {
    pub folder: String,
    pub ram_max_entries: usize,
    pub ram_max_file_bytes: u64,
    pub disk_max_entries: usize,
    pub disk_max_file_bytes: u64,
    pub retention_days: u64,
    pub ram_bytes: u64,
    pub stored_files: StoredFiles,
}

impl Display for CacheInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Cache folder: {}", self.folder)?;
        writeln!(
            f,
            "RAM limit:  {} files up to {} each",
            self.ram_max_entries,
            format_file_size(self.ram_max_file_bytes)
        )?;
        writeln!(
            f,
            "Disk limit: {} files up to {} each",
            self.disk_max_entries,
            format_file_size(self.disk_max_file_bytes)
        )?;
        writeln!(f, "Retention: {} days", self.retention_days)?;
        writeln!(f, "RAM in use: {}", format_file_size(self.ram_bytes))?;
        write!(
            f,
            "Files on disk: {} ({})",
            self.stored_files.count,
            format_file_size(self.stored_files.bytes)
        )
    }
}

/// Entries dropped by [`CacheCoordinator::clear_all`](super::CacheCoordinator::clear_all).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClearedCounts {
    pub ram: usize,
    pub disk: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_counts_both_tiers() {
        let stats = CacheStats {
            ram_hits: 2,
            disk_hits: 1,
            misses: 1,
            ..CacheStats::default()
        };
        assert_eq!(stats.requests(), 4);
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert!(stats.to_string().contains("75% hit rate"));
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn stats_serialize_to_json() {
        let json = serde_json::to_value(CacheStats::default()).unwrap();
        assert_eq!(json["ram_capacity"], 0);
        assert!(json.get("misses").is_some());
    }
}
