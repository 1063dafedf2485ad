//! Read-only queries and cache maintenance for [`MusicManager`].

use std::fs;

use log::warn;

use crate::audio::SourceDecoder;
use crate::cache::{CacheInfo, CacheStats, CacheStatus, ClearedCounts};
use crate::paths::{has_supported_extension, SUPPORTED_EXTENSIONS};

use super::state::PlaybackPhase;
use super::{MusicFile, MusicManager};

impl MusicManager {
    /// Initialized, music folder present and fade pool running.
    pub fn is_system_healthy(&self) -> bool {
        let initialized = self.lock_core().initialized;
        let healthy = initialized && self.paths.music_dir.is_dir() && self.fades.is_alive();
        if !healthy {
            warn!("music system is not healthy");
        }
        healthy
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.lock_core().state.phase()
    }

    /// File name of the current track.
    pub fn now_playing(&self) -> Option<String> {
        self.lock_core()
            .state
            .current()
            .map(|session| session.filename().to_string())
    }

    /// File name of the track fading out, if any.
    pub fn fading_out(&self) -> Option<String> {
        self.lock_core()
            .state
            .previous()
            .map(|session| session.filename().to_string())
    }

    /// Whether `filename` in the music folder has a supported extension and
    /// probes as decodable.
    pub fn can_decode(&self, filename: &str) -> bool {
        let decoder = self.lock_core().cache.decoder().clone();
        has_supported_extension(filename) && decoder.can_decode(&self.paths.track(filename))
    }

    /// Supported source files in the music folder, sorted by name.
    pub fn list_music_files(&self) -> Vec<MusicFile> {
        let decoder = self.lock_core().cache.decoder().clone();
        self.scan_music_files(decoder.as_ref())
    }

    pub(super) fn scan_music_files(&self, decoder: &dyn SourceDecoder) -> Vec<MusicFile> {
        let entries = match fs::read_dir(&self.paths.music_dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    "cannot list music folder {}: {}",
                    self.paths.music_dir.display(),
                    err
                );
                return Vec::new();
            }
        };

        let mut files: Vec<MusicFile> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                if !has_supported_extension(&name) {
                    return None;
                }
                let size = entry.metadata().map(|meta| meta.len()).unwrap_or(0);
                let decodable = decoder.can_decode(&entry.path());
                Some(MusicFile {
                    name,
                    size,
                    decodable,
                })
            })
            .collect();
        files.sort_by(|a, b| a.name.cmp(&b.name));
        files
    }

    /// Each recognized extension with whether the decoder handles it.
    pub fn supported_formats(&self) -> Vec<(&'static str, bool)> {
        let decoder = self.lock_core().cache.decoder().clone();
        SUPPORTED_EXTENSIONS
            .iter()
            .map(|ext| (*ext, decoder.supports_extension(ext)))
            .collect()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.lock_core().cache.stats()
    }

    pub fn cache_status(&self) -> CacheStatus {
        self.lock_core().cache.status()
    }

    pub fn cache_info(&self) -> CacheInfo {
        self.lock_core().cache.info()
    }

    /// Empty both tiers and delete their files.
    pub fn clear_cache(&self) -> ClearedCounts {
        let mut core = self.lock_core();
        self.initialize_locked(&mut core);
        core.cache.clear_all()
    }

    pub fn clear_ram_cache(&self) -> usize {
        self.lock_core().cache.clear_ram()
    }

    pub fn clear_disk_cache(&self) -> usize {
        let mut core = self.lock_core();
        self.initialize_locked(&mut core);
        core.cache.clear_disk()
    }

    /// Promote recently played disk entries into RAM.
    pub fn optimize_cache(&self) -> usize {
        let mut core = self.lock_core();
        self.initialize_locked(&mut core);
        core.cache.optimize()
    }
}
