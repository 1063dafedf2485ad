//! # Region Music Library
//!
//! Playback and hybrid caching core for region-triggered background music.
//! A requested file name is resolved through a RAM tier, a persistent disk
//! tier and finally a full decode, then played on an audio line with
//! optional crossfades between the outgoing and incoming track.

pub mod audio;
pub mod cache;
pub mod command;
pub mod error;
pub mod notice;
pub mod paths;
pub mod playback;
mod tools;

pub use command::{Command, CommandError};
pub use error::AudioError;
pub use notice::{Notice, NoticeLevel, NoticeSink};
pub use paths::AppPaths;
pub use playback::settings::MusicSettings;
pub use playback::{ManagerOptions, MusicFile, MusicManager, PlaybackPhase};
pub use tools::format_file_size;
