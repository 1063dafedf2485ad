//! Filesystem layout relative to the application data directory.

use std::path::{Path, PathBuf};

/// Source audio extensions recognized by the music folder.
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["wav", "ogg"];

/// Name of the disk cache index inside the cache folder.
pub const CACHE_INDEX_FILE: &str = "cache_index.json";

/// Resolved locations of the music folder, cache folder and settings file.
///
/// ```text
/// <data>/music/                     source .wav / .ogg files
/// <data>/music/cache/               *.cache, *.meta, cache_index.json
/// <data>/config/<app>.properties    playback settings
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub music_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub config_file: PathBuf,
}

impl AppPaths {
    /// Build the layout under `data_dir` for an application called `app_name`.
    pub fn new(data_dir: impl AsRef<Path>, app_name: &str) -> Self {
        let data_dir = data_dir.as_ref();
        let music_dir = data_dir.join("music");
        let cache_dir = music_dir.join("cache");
        let config_file = data_dir
            .join("config")
            .join(format!("{}.properties", app_name));
        Self {
            music_dir,
            cache_dir,
            config_file,
        }
    }

    /// Path of a track inside the music folder.
    pub fn track(&self, filename: &str) -> PathBuf {
        self.music_dir.join(filename)
    }
}

/// Lowercased extension of `filename` without the dot, if any.
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// True when `filename` carries one of [`SUPPORTED_EXTENSIONS`].
pub fn has_supported_extension(filename: &str) -> bool {
    extension_of(filename)
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}
