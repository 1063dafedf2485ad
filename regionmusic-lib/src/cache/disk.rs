//! Persistent tier: decoded payloads on disk with JSON sidecars and an index.
//!
//! Each entry is a pair of files named `<sanitized filename>_<hash>`:
//! `.cache` holds the raw PCM payload and `.meta` the [`CacheMetadata`]
//! describing it. `cache_index.json` maps source paths to metadata and is
//! rewritten after every change.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::audio::{AudioFormat, AudioStream, Encoding};
use crate::error::AudioError;
use crate::paths::CACHE_INDEX_FILE;
use crate::tools::now_ms;

use super::access::AccessTimes;
use super::hasher::{content_hash, HASH_LEN};

const PAYLOAD_EXT: &str = "cache";
const META_EXT: &str = "meta";
const README_FILE: &str = "README.txt";
const MAX_BASE_NAME: usize = 50;

/// Replace every character outside `[A-Za-z0-9._-]` with `_` and cap the
/// result at 50 characters.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_BASE_NAME)
        .collect()
}

/// Base name (without extension) of the files backing an entry.
pub fn cache_file_name(filename: &str, hash: &str) -> String {
    let hash: String = hash.chars().take(HASH_LEN).collect();
    format!("{}_{}", sanitize_filename(filename), hash)
}

/// Sidecar and index record for one disk entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    pub filename: String,
    pub original_path: String,
    pub original_hash: String,
    pub creation_time: u64,
    pub format_encoding: Encoding,
    pub sample_rate: f32,
    pub sample_size_in_bits: u16,
    pub channels: u16,
    pub frame_size: u16,
    pub frame_rate: f32,
    pub big_endian: bool,
}

impl CacheMetadata {
    /// Why an index record cannot be trusted, if it cannot.
    fn defect(&self) -> Option<&'static str> {
        if self.original_hash.len() != HASH_LEN
            || !self.original_hash.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Some("malformed hash");
        }
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Some("bad sample rate");
        }
        if self.channels == 0 || self.frame_size == 0 {
            return Some("bad frame layout");
        }
        None
    }

    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat {
            encoding: self.format_encoding,
            sample_rate: self.sample_rate,
            sample_size_in_bits: self.sample_size_in_bits,
            channels: self.channels,
            frame_size: self.frame_size,
            frame_rate: self.frame_rate,
            big_endian: self.big_endian,
        }
    }
}

/// In-memory view of one disk entry.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskCacheEntry {
    pub filename: String,
    pub original_path: String,
    pub original_hash: String,
    pub format: AudioFormat,
    pub file_size: u64,
    pub creation_time: u64,
    pub cache_file_name: String,
}

impl DiskCacheEntry {
    fn from_metadata(metadata: CacheMetadata, file_size: u64) -> Self {
        let format = metadata.audio_format();
        let cache_file_name = cache_file_name(&metadata.filename, &metadata.original_hash);
        Self {
            filename: metadata.filename,
            original_path: metadata.original_path,
            original_hash: metadata.original_hash,
            format,
            file_size,
            creation_time: metadata.creation_time,
            cache_file_name,
        }
    }

    pub fn metadata(&self) -> CacheMetadata {
        CacheMetadata {
            filename: self.filename.clone(),
            original_path: self.original_path.clone(),
            original_hash: self.original_hash.clone(),
            creation_time: self.creation_time,
            format_encoding: self.format.encoding,
            sample_rate: self.format.sample_rate,
            sample_size_in_bits: self.format.sample_size_in_bits,
            channels: self.format.channels,
            frame_size: self.format.frame_size,
            frame_rate: self.format.frame_rate,
            big_endian: self.format.big_endian,
        }
    }

    pub fn payload_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.{}", self.cache_file_name, PAYLOAD_EXT))
    }

    pub fn meta_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.{}", self.cache_file_name, META_EXT))
    }
}

/// Count and total size of `.cache`/`.meta` files found in the cache folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoredFiles {
    pub count: usize,
    pub bytes: u64,
}

/// Disk tier keyed by source path.
#[derive(Debug)]
pub struct DiskCacheStore {
    dir: PathBuf,
    index: HashMap<String, DiskCacheEntry>,
    max_entries: usize,
    access: AccessTimes,
}

impl DiskCacheStore {
    /// Store rooted at `dir`. No filesystem work happens until
    /// [`ensure_dir`](Self::ensure_dir) or [`load_index`](Self::load_index).
    pub fn new(dir: impl Into<PathBuf>, max_entries: usize, access: AccessTimes) -> Self {
        Self {
            dir: dir.into(),
            index: HashMap::new(),
            max_entries,
            access,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(CACHE_INDEX_FILE)
    }

    /// Create the cache folder, seeding a README on first creation.
    pub fn ensure_dir(&self) -> Result<(), AudioError> {
        let existed = self.dir.is_dir();
        fs::create_dir_all(&self.dir)?;
        let readme = self.dir.join(README_FILE);
        if !existed || !readme.exists() {
            fs::write(&readme, README_TEXT)?;
            debug!("disk cache: wrote {}", readme.display());
        }
        Ok(())
    }

    pub fn lookup(&self, key: &str) -> Option<&DiskCacheEntry> {
        self.index.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// True when `source` still exists and hashes to the entry's fingerprint.
    pub fn is_valid(&self, entry: &DiskCacheEntry, source: &Path) -> bool {
        if !source.exists() {
            return false;
        }
        match content_hash(source) {
            Ok(hash) => hash == entry.original_hash,
            Err(err) => {
                warn!("disk cache: cannot hash {}: {}", source.display(), err);
                false
            }
        }
    }

    /// Write `payload` and its sidecar, then record the entry in the index.
    ///
    /// On a write failure any partial files are removed and the index is left
    /// unchanged.
    pub fn store(
        &mut self,
        key: &str,
        payload: &[u8],
        format: AudioFormat,
        filename: &str,
        source: &Path,
    ) -> Result<DiskCacheEntry, AudioError> {
        let hash = content_hash(source)?;
        let metadata = CacheMetadata {
            filename: filename.to_string(),
            original_path: key.to_string(),
            original_hash: hash,
            creation_time: now_ms(),
            format_encoding: format.encoding,
            sample_rate: format.sample_rate,
            sample_size_in_bits: format.sample_size_in_bits,
            channels: format.channels,
            frame_size: format.frame_size,
            frame_rate: format.frame_rate,
            big_endian: format.big_endian,
        };
        let entry = DiskCacheEntry::from_metadata(metadata, payload.len() as u64);
        let payload_path = entry.payload_path(&self.dir);
        let meta_path = entry.meta_path(&self.dir);

        let written = fs::write(&payload_path, payload)
            .map_err(AudioError::from)
            .and_then(|_| serde_json::to_string_pretty(&entry.metadata()).map_err(AudioError::from))
            .and_then(|json| fs::write(&meta_path, json).map_err(AudioError::from));
        if let Err(err) = written {
            let _ = fs::remove_file(&payload_path);
            let _ = fs::remove_file(&meta_path);
            return Err(err);
        }

        if let Some(previous) = self.index.insert(key.to_string(), entry.clone()) {
            if previous.cache_file_name != entry.cache_file_name {
                self.delete_files(&previous);
            }
        }
        info!(
            "disk cache: stored {} ({} bytes) as {}",
            filename, entry.file_size, entry.cache_file_name
        );
        self.save_index_logged();
        Ok(entry)
    }

    /// Open a stream over the payload of the entry stored under `key`.
    ///
    /// A missing payload file drops the entry from the index and yields
    /// `CacheFileMissing`.
    pub fn load(&mut self, key: &str) -> Result<AudioStream, AudioError> {
        let entry = self
            .index
            .get(key)
            .cloned()
            .ok_or_else(|| AudioError::CacheFileMissing(PathBuf::from(key)))?;
        let payload_path = entry.payload_path(&self.dir);

        match File::open(&payload_path) {
            Ok(file) => {
                let len = file.metadata().map(|m| m.len()).unwrap_or(entry.file_size);
                Ok(AudioStream::from_reader(
                    entry.format,
                    Box::new(BufReader::new(file)),
                    Some(len),
                ))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(
                    "disk cache: payload missing for {}, dropping entry",
                    entry.filename
                );
                self.remove(key);
                Err(AudioError::CacheFileMissing(payload_path))
            }
            Err(err) => Err(AudioError::Io(err)),
        }
    }

    /// Delete the entry's files, forget it and its access record.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.index.remove(key) {
            Some(entry) => {
                self.delete_files(&entry);
                self.access.remove(key);
                self.save_index_logged();
                true
            }
            None => false,
        }
    }

    /// Drop the least recently used entry, falling back to creation time for
    /// entries never accessed.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let victim = self
            .index
            .iter()
            .min_by_key(|(key, entry)| {
                (
                    self.access.get(key).unwrap_or(entry.creation_time),
                    key.to_string(),
                )
            })
            .map(|(key, _)| key.clone())?;

        if let Some(entry) = self.index.get(&victim) {
            info!("disk cache: evicted {}", entry.filename);
        }
        self.remove(&victim);
        Some(victim)
    }

    fn delete_files(&self, entry: &DiskCacheEntry) {
        for path in [entry.payload_path(&self.dir), entry.meta_path(&self.dir)] {
            if let Err(err) = fs::remove_file(&path) {
                if err.kind() != ErrorKind::NotFound {
                    warn!("disk cache: failed to delete {}: {}", path.display(), err);
                }
            }
        }
    }

    /// Rebuild the index from `cache_index.json`.
    ///
    /// Entries that fail to parse or whose files are gone are skipped.
    /// Returns the number of entries loaded.
    pub fn load_index(&mut self) -> Result<usize, AudioError> {
        self.index.clear();
        let index_path = self.index_path();
        let json = match fs::read_to_string(&index_path) {
            Ok(json) => json,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("disk cache: no index yet at {}", index_path.display());
                return Ok(0);
            }
            Err(err) => return Err(err.into()),
        };

        let raw: Map<String, Value> = serde_json::from_str(&json)?;
        let mut dropped = 0usize;
        for (key, value) in raw {
            let metadata: CacheMetadata = match serde_json::from_value(value) {
                Ok(metadata) => metadata,
                Err(err) => {
                    warn!("disk cache: skipping corrupt index entry {}: {}", key, err);
                    dropped += 1;
                    continue;
                }
            };
            if let Some(defect) = metadata.defect() {
                warn!("disk cache: skipping index entry {}: {}", key, defect);
                dropped += 1;
                continue;
            }

            let entry = DiskCacheEntry::from_metadata(metadata, 0);
            let payload_path = entry.payload_path(&self.dir);
            let meta_path = entry.meta_path(&self.dir);
            let size = match (fs::metadata(&payload_path), meta_path.exists()) {
                (Ok(meta), true) => meta.len(),
                _ => {
                    warn!("disk cache: files lost for {}", entry.filename);
                    dropped += 1;
                    continue;
                }
            };
            self.index.insert(key, DiskCacheEntry { file_size: size, ..entry });
        }

        info!(
            "disk cache: index loaded, {} valid entries, {} dropped",
            self.index.len(),
            dropped
        );
        if dropped > 0 {
            self.save_index_logged();
        }
        Ok(self.index.len())
    }

    /// Overwrite `cache_index.json` with the current index.
    pub fn save_index(&self) -> Result<(), AudioError> {
        let serializable: BTreeMap<&str, CacheMetadata> = self
            .index
            .iter()
            .map(|(key, entry)| (key.as_str(), entry.metadata()))
            .collect();
        let json = serde_json::to_string_pretty(&serializable)?;
        fs::write(self.index_path(), json)?;
        debug!("disk cache: index saved ({} entries)", self.index.len());
        Ok(())
    }

    fn save_index_logged(&self) {
        if let Err(err) = self.save_index() {
            warn!("disk cache: failed to save index: {}", err);
        }
    }

    fn cache_files(&self) -> Vec<PathBuf> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(_) => return Vec::new(),
        };
        read_dir
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext == PAYLOAD_EXT || ext == META_EXT)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Delete `.cache`/`.meta` files last modified more than `retention` ago.
    /// Files whose modification time cannot be read are deleted too.
    pub fn cleanup_expired(&self, retention: Duration) -> usize {
        let cutoff = SystemTime::now()
            .checked_sub(retention)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut removed = 0;
        for path in self.cache_files() {
            let expired = fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .map(|modified| modified < cutoff)
                .unwrap_or(true);
            if !expired {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!("disk cache: removed expired {}", path.display());
                    removed += 1;
                }
                Err(err) => warn!("disk cache: failed to remove {}: {}", path.display(), err),
            }
        }
        if removed > 0 {
            info!("disk cache: cleaned up {} expired files", removed);
        }
        removed
    }

    /// Delete every payload, sidecar and the index file. Returns the number
    /// of indexed entries dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.index.len();
        for key in self.index.keys() {
            self.access.remove(key);
        }
        self.index.clear();
        for path in self.cache_files() {
            if let Err(err) = fs::remove_file(&path) {
                warn!("disk cache: failed to remove {}: {}", path.display(), err);
            }
        }
        match fs::remove_file(self.index_path()) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!("disk cache: failed to remove index: {}", err),
        }
        count
    }

    /// Totals over the `.cache`/`.meta` files present on disk.
    pub fn stored_files(&self) -> StoredFiles {
        self.cache_files()
            .iter()
            .filter_map(|path| fs::metadata(path).ok())
            .fold(StoredFiles::default(), |acc, meta| StoredFiles {
                count: acc.count + 1,
                bytes: acc.bytes + meta.len(),
            })
    }

    pub fn has_room(&self) -> bool {
        self.index.len() < self.max_entries
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn total_bytes(&self) -> u64 {
        self.index.values().map(|entry| entry.file_size).sum()
    }

    /// Entries sorted by key.
    pub fn entries(&self) -> Vec<(&str, &DiskCacheEntry)> {
        let mut listed: Vec<(&str, &DiskCacheEntry)> = self
            .index
            .iter()
            .map(|(key, entry)| (key.as_str(), entry))
            .collect();
        listed.sort_by(|a, b| a.0.cmp(b.0));
        listed
    }
}

const README_TEXT: &str = "\
Region Music audio cache
========================
This folder holds pre-decoded audio so tracks start without decoding again.

LAYOUT
- <name>_<hash>.cache : decoded PCM payload
- <name>_<hash>.meta  : JSON description of the payload format
- cache_index.json    : index of every cached track, keyed by source path

POLICY
- RAM tier : up to 4 tracks of at most 10 MB each
- Disk tier: up to 50 tracks of at most 50 MB each
- Files untouched for 7 days are removed at startup

Everything here is generated. Deleting the folder is safe; it is rebuilt
on demand.

COMMANDS
- CACHE_STATS, CACHE_STATUS, CACHE_INFO
- CACHE_CLEAR, CACHE_RAM_CLEAR, CACHE_DISK_CLEAR, CACHE_OPTIMIZE
";

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn format() -> AudioFormat {
        AudioFormat::pcm_s16le(22_050, 2)
    }

    fn source(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    fn key(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn sanitizes_and_truncates_names() {
        assert_eq!(sanitize_filename("boss fight (v2).ogg"), "boss_fight__v2_.ogg");
        assert_eq!(sanitize_filename("Día.wav"), "D_a.wav");
        let long = "x".repeat(80);
        assert_eq!(sanitize_filename(&long).len(), 50);
        assert_eq!(
            cache_file_name("a b.ogg", "0123456789abcdef0123"),
            "a_b.ogg_0123456789abcdef"
        );
    }

    #[test]
    fn store_then_load_round_trips_payload() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let src = source(dir.path(), "theme.ogg", b"source bytes");
        let mut store = DiskCacheStore::new(&cache_dir, 50, AccessTimes::new());
        store.ensure_dir().unwrap();

        let entry = store
            .store(&key(&src), &[9, 8, 7, 6], format(), "theme.ogg", &src)
            .unwrap();
        assert!(entry.payload_path(&cache_dir).exists());
        assert!(entry.meta_path(&cache_dir).exists());
        assert!(cache_dir.join(README_FILE).exists());
        assert!(store.is_valid(&entry, &src));

        let stream = store.load(&key(&src)).unwrap();
        assert_eq!(*stream.format(), format());
        assert_eq!(stream.read_all().unwrap(), vec![9, 8, 7, 6]);

        let sidecar = fs::read_to_string(entry.meta_path(&cache_dir)).unwrap();
        assert!(sidecar.contains("\"originalHash\""));
        assert!(sidecar.contains("\"PCM_SIGNED\""));
    }

    #[test]
    fn changed_source_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(dir.path(), "a.wav", b"one");
        let mut store = DiskCacheStore::new(dir.path().join("cache"), 50, AccessTimes::new());
        store.ensure_dir().unwrap();
        let entry = store.store(&key(&src), &[1], format(), "a.wav", &src).unwrap();

        fs::write(&src, b"two").unwrap();
        assert!(!store.is_valid(&entry, &src));
        fs::remove_file(&src).unwrap();
        assert!(!store.is_valid(&entry, &src));
    }

    #[test]
    fn index_survives_a_fresh_store_and_drops_lost_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let kept = source(dir.path(), "kept.ogg", b"kept");
        let lost = source(dir.path(), "lost track.ogg", b"lost");

        let (kept_entry, lost_entry) = {
            let mut store = DiskCacheStore::new(&cache_dir, 50, AccessTimes::new());
            store.ensure_dir().unwrap();
            let kept_entry = store.store(&key(&kept), &[1, 2], format(), "kept.ogg", &kept).unwrap();
            let lost_entry = store
                .store(&key(&lost), &[3, 4], format(), "lost track.ogg", &lost)
                .unwrap();
            (kept_entry, lost_entry)
        };
        fs::remove_file(lost_entry.payload_path(&cache_dir)).unwrap();

        let mut reloaded = DiskCacheStore::new(&cache_dir, 50, AccessTimes::new());
        assert_eq!(reloaded.load_index().unwrap(), 1);
        let entry = reloaded.lookup(&key(&kept)).unwrap();
        assert_eq!(entry.file_size, 2);
        assert_eq!(entry.format, format());
        assert_eq!(entry.metadata(), kept_entry.metadata());
        assert_eq!(entry.cache_file_name, kept_entry.cache_file_name);
        assert!(reloaded.lookup(&key(&lost)).is_none());

        let mut again = DiskCacheStore::new(&cache_dir, 50, AccessTimes::new());
        assert_eq!(again.load_index().unwrap(), 1);
    }

    #[test]
    fn corrupt_index_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let src = source(dir.path(), "ok.wav", b"ok");
        {
            let mut store = DiskCacheStore::new(&cache_dir, 50, AccessTimes::new());
            store.ensure_dir().unwrap();
            store.store(&key(&src), &[1], format(), "ok.wav", &src).unwrap();
        }

        let index_path = cache_dir.join(CACHE_INDEX_FILE);
        let mut raw: Map<String, Value> =
            serde_json::from_str(&fs::read_to_string(&index_path).unwrap()).unwrap();
        raw.insert("broken".to_string(), serde_json::json!({ "filename": 3 }));
        fs::write(&index_path, serde_json::to_string(&raw).unwrap()).unwrap();

        let mut store = DiskCacheStore::new(&cache_dir, 50, AccessTimes::new());
        assert_eq!(store.load_index().unwrap(), 1);
        assert!(store.contains(&key(&src)));
    }

    #[test]
    fn untrustworthy_index_records_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let src = source(dir.path(), "ok.wav", b"ok");
        let good = {
            let mut store = DiskCacheStore::new(&cache_dir, 50, AccessTimes::new());
            store.ensure_dir().unwrap();
            store.store(&key(&src), &[1], format(), "ok.wav", &src).unwrap()
        };

        let index_path = cache_dir.join(CACHE_INDEX_FILE);
        let mut raw: Map<String, Value> =
            serde_json::from_str(&fs::read_to_string(&index_path).unwrap()).unwrap();
        let record = serde_json::to_value(good.metadata()).unwrap();
        let variant = |field: &str, value: Value| {
            let mut record = record.clone();
            record[field] = value;
            record
        };
        raw.insert("accented".into(), variant("originalHash", "aaaaaaaaaaaaaaaébc".into()));
        raw.insert("short".into(), variant("originalHash", "abc".into()));
        raw.insert("silent".into(), variant("sampleRate", 0.0.into()));
        raw.insert("mono0".into(), variant("channels", 0.into()));
        raw.insert("frame0".into(), variant("frameSize", 0.into()));
        fs::write(&index_path, serde_json::to_string(&raw).unwrap()).unwrap();

        let mut store = DiskCacheStore::new(&cache_dir, 50, AccessTimes::new());
        assert_eq!(store.load_index().unwrap(), 1);
        assert!(store.contains(&key(&src)));

        let rewritten = fs::read_to_string(&index_path).unwrap();
        assert!(!rewritten.contains("accented"));
        assert!(!rewritten.contains("frame0"));
    }

    #[test]
    fn cache_file_name_cuts_on_char_boundaries() {
        assert_eq!(cache_file_name("a.ogg", "aaaaaaaaaaaaaaaébc"), "a.ogg_aaaaaaaaaaaaaaaé");
        assert_eq!(cache_file_name("a.ogg", "abc"), "a.ogg_abc");
    }

    #[test]
    fn missing_payload_self_heals() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let src = source(dir.path(), "a.ogg", b"a");
        let mut store = DiskCacheStore::new(&cache_dir, 50, AccessTimes::new());
        store.ensure_dir().unwrap();
        let entry = store.store(&key(&src), &[1], format(), "a.ogg", &src).unwrap();
        fs::remove_file(entry.payload_path(&cache_dir)).unwrap();

        let err = store.load(&key(&src)).unwrap_err();
        assert!(matches!(err, AudioError::CacheFileMissing(_)));
        assert!(!store.contains(&key(&src)));
        assert!(!entry.meta_path(&cache_dir).exists());
    }

    #[test]
    fn evicts_least_recently_accessed_entry() {
        let dir = tempfile::tempdir().unwrap();
        let access = AccessTimes::new();
        let mut store = DiskCacheStore::new(dir.path().join("cache"), 2, access.clone());
        store.ensure_dir().unwrap();
        let a = source(dir.path(), "a.ogg", b"a");
        let b = source(dir.path(), "b.ogg", b"b");
        store.store(&key(&a), &[1], format(), "a.ogg", &a).unwrap();
        access.touch(&key(&a));
        store.store(&key(&b), &[2], format(), "b.ogg", &b).unwrap();
        access.touch(&key(&b));
        access.touch(&key(&a));
        assert!(!store.has_room());

        assert_eq!(store.evict_oldest(), Some(key(&b)));
        assert_eq!(store.len(), 1);
        assert!(access.get(&key(&b)).is_none());
        assert_eq!(store.stored_files().count, 2);
    }

    #[test]
    fn expired_files_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let src = source(dir.path(), "old.ogg", b"old");
        let mut store = DiskCacheStore::new(&cache_dir, 50, AccessTimes::new());
        store.ensure_dir().unwrap();
        let entry = store.store(&key(&src), &[1, 2, 3], format(), "old.ogg", &src).unwrap();

        let eight_days = Duration::from_secs(8 * 24 * 60 * 60);
        let stale = SystemTime::now() - eight_days;
        for path in [entry.payload_path(&cache_dir), entry.meta_path(&cache_dir)] {
            File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(stale)
                .unwrap();
        }

        let removed = store.cleanup_expired(Duration::from_secs(7 * 24 * 60 * 60));
        assert_eq!(removed, 2);
        assert_eq!(store.load_index().unwrap(), 0);
    }

    #[test]
    fn clear_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let src = source(dir.path(), "a.ogg", b"a");
        let mut store = DiskCacheStore::new(&cache_dir, 50, AccessTimes::new());
        store.ensure_dir().unwrap();
        store.store(&key(&src), &[1], format(), "a.ogg", &src).unwrap();

        assert_eq!(store.clear(), 1);
        assert_eq!(store.stored_files(), StoredFiles::default());
        assert!(!cache_dir.join(CACHE_INDEX_FILE).exists());
        assert!(cache_dir.join(README_FILE).exists());

        let mut buf = String::new();
        File::open(cache_dir.join(README_FILE))
            .unwrap()
            .read_to_string(&mut buf)
            .unwrap();
        assert!(buf.contains("cache_index.json"));
    }
}
