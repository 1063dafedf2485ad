use std::path::PathBuf;

use thiserror::Error;

/// Error type shared by the cache tiers, decoder and playback controller.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("music file name is empty")]
    EmptyFileName,

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audio line unavailable: {0}")]
    LineUnavailable(String),

    #[error("cache file missing: {}", .0.display())]
    CacheFileMissing(PathBuf),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl AudioError {
    /// Map an open/read failure on `path` to `FileNotFound` when the file is absent.
    pub(crate) fn from_io(path: &std::path::Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound(path.to_path_buf())
        } else {
            Self::Io(err)
        }
    }
}
