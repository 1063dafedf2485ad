//! Dispatch of parsed [`Command`]s onto the controller.

use log::debug;

use crate::command::Command;
use crate::error::AudioError;
use crate::notice::NoticeLevel;
use crate::paths::SUPPORTED_EXTENSIONS;
use crate::tools::format_file_size;

use super::MusicManager;

impl MusicManager {
    /// Run one command, reporting outcomes as notices.
    ///
    /// Only a failed `Play` returns an error; every other command reports
    /// problems through notices.
    pub fn handle(&self, command: Command) -> Result<(), AudioError> {
        debug!("handling {:?}", command);
        match command {
            Command::Play {
                filename,
                looping,
                fade,
            } => return self.play(&filename, looping, fade),
            Command::Stop { fade } => {
                self.stop(fade);
                self.notify(NoticeLevel::Info, "Music stopped");
            }
            Command::Volume(position) => {
                self.set_volume(position);
                self.notify(
                    NoticeLevel::Info,
                    format!("Music volume set to {}%", (position * 100.0).round()),
                );
            }
            Command::GetVolume => {
                self.notify(
                    NoticeLevel::Info,
                    format!(
                        "Music volume: {}%",
                        (self.current_volume() * 100.0).round()
                    ),
                );
            }
            Command::Config => {
                let settings = self.settings();
                self.notify(
                    NoticeLevel::Info,
                    format!(
                        "modVolume={:.3} maxModVolume={:.3} fadeDuration={}s fadeInterval={}ms fadeInStart={:.2} ({})",
                        settings.mod_volume,
                        settings.max_mod_volume,
                        settings.fade_duration,
                        settings.fade_interval,
                        settings.fade_in_start,
                        self.paths.config_file.display()
                    ),
                );
            }
            Command::List => self.announce_music_files(),
            Command::Init => {
                self.force_reinitialize();
                self.announce_music_files();
            }
            Command::Formats => {
                for (ext, supported) in self.supported_formats() {
                    let level = if supported {
                        NoticeLevel::Info
                    } else {
                        NoticeLevel::Warning
                    };
                    self.notify(
                        level,
                        format!(
                            "{}: {}",
                            ext.to_uppercase(),
                            if supported { "supported" } else { "not supported" }
                        ),
                    );
                }
            }
            Command::Shutdown => {
                self.shutdown();
                self.notify(NoticeLevel::Info, "Music system shut down");
            }
            Command::CacheStats => {
                self.initialize();
                self.notify(NoticeLevel::Info, self.cache_stats().to_string());
            }
            Command::CacheClear => {
                let cleared = self.clear_cache();
                self.notify(
                    NoticeLevel::Success,
                    format!(
                        "Cache cleared ({} RAM, {} disk entries)",
                        cleared.ram, cleared.disk
                    ),
                );
            }
            Command::CacheStatus => {
                self.initialize();
                self.notify(NoticeLevel::Info, self.cache_status().to_string());
            }
            Command::CacheInfo => {
                self.initialize();
                self.notify(NoticeLevel::Info, self.cache_info().to_string());
            }
            Command::CacheRamClear => {
                let cleared = self.clear_ram_cache();
                self.notify(
                    NoticeLevel::Success,
                    format!("RAM cache cleared ({} entries)", cleared),
                );
            }
            Command::CacheDiskClear => {
                let cleared = self.clear_disk_cache();
                self.notify(
                    NoticeLevel::Success,
                    format!("Disk cache cleared ({} entries)", cleared),
                );
            }
            Command::CacheOptimize => {
                let promoted = self.optimize_cache();
                self.notify(
                    NoticeLevel::Success,
                    format!("Cache optimized ({} promoted to RAM)", promoted),
                );
            }
        }
        Ok(())
    }

    fn announce_music_files(&self) {
        if !self.paths.music_dir.is_dir() {
            self.notify(
                NoticeLevel::Warning,
                format!("Music folder not found: {}", self.paths.music_dir.display()),
            );
            return;
        }

        let files = self.list_music_files();
        if files.is_empty() {
            self.notify(
                NoticeLevel::Warning,
                format!("No music files in {}", self.paths.music_dir.display()),
            );
            self.notify(
                NoticeLevel::Info,
                format!("Supported formats: {}", SUPPORTED_EXTENSIONS.join(", ")),
            );
            return;
        }

        self.notify(
            NoticeLevel::Info,
            format!("Music files ({}):", files.len()),
        );
        for file in files {
            let marker = if file.decodable { "ok" } else { "unreadable" };
            self.notify(
                NoticeLevel::Info,
                format!(
                    "  {} ({}) [{}]",
                    file.name,
                    format_file_size(file.size),
                    marker
                ),
            );
        }
    }
}
