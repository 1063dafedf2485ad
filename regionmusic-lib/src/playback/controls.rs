//! Lifecycle and transport controls for [`MusicManager`].

use std::fs;
use std::path::Path;
use std::time::Instant;

use log::{debug, error, info, warn};

use crate::error::AudioError;
use crate::notice::NoticeLevel;
use crate::paths::{extension_of, SUPPORTED_EXTENSIONS};

use super::fade::FadeRamp;
use super::settings::MusicSettings;
use super::state::PlaybackSession;
use super::{AudioCore, MusicManager};

const MUSIC_README_FILE: &str = "README.txt";

const MUSIC_README_TEXT: &str = "\
Region Music folder
-------------------
Place the audio files used by music regions in this folder.

Supported formats:
- WAV (recommended): PCM, 44.1 kHz, 16-bit plays everywhere
- OGG: Vorbis streams only

Usage:
- MUSIC:<file>:<loop>:<fade> plays a file, e.g. MUSIC:tavern.ogg:true:true
- STOP or STOP:true stops playback, optionally fading out
- LIST shows which files were found and whether they decode

Tips:
- Keep file names simple, without spaces or special characters
- Settings live in config/<app>.properties
- INIT reinitializes the audio system and reloads the cache
";

fn write_music_readme(music_dir: &Path) {
    let readme = music_dir.join(MUSIC_README_FILE);
    if readme.exists() {
        return;
    }
    match fs::write(&readme, MUSIC_README_TEXT) {
        Ok(()) => info!("created help file {}", readme.display()),
        Err(err) => warn!("failed to create help file {}: {}", readme.display(), err),
    }
}

impl MusicManager {
    /// Prepare folders, the output device, the disk cache and settings.
    ///
    /// Does nothing when already initialized.
    pub fn initialize(&self) {
        let mut core = self.lock_core();
        self.initialize_locked(&mut core);
    }

    pub(super) fn initialize_locked(&self, core: &mut AudioCore) {
        if core.initialized {
            return;
        }

        match fs::create_dir_all(&self.paths.music_dir) {
            Ok(()) => write_music_readme(&self.paths.music_dir),
            Err(err) => warn!(
                "failed to create music folder {}: {}",
                self.paths.music_dir.display(),
                err
            ),
        }

        if let Err(err) = self.output.probe() {
            self.notify(
                NoticeLevel::Warning,
                format!("Audio output unavailable: {}", err),
            );
        }

        if let Err(err) = core.cache.startup() {
            warn!("cache startup failed: {}", err);
        }

        core.settings = MusicSettings::load_or_default(&self.paths.config_file);
        core.initialized = true;

        let files = self.scan_music_files(core.cache.decoder().as_ref());
        info!(
            "music system initialized ({} output, {} files in {})",
            self.output.name(),
            files.len(),
            self.paths.music_dir.display()
        );
        for file in &files {
            debug!("  {} ({} bytes, decodable={})", file.name, file.size, file.decodable);
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.lock_core().initialized
    }

    /// Stop everything and reload from disk. The RAM tier is dropped; the
    /// disk tier survives.
    pub fn force_reinitialize(&self) {
        let mut core = self.lock_core();
        self.stop_locked(&mut core, true);
        if let Some(previous) = core.state.take_previous() {
            previous.release();
        }
        core.cache.clear_ram();
        core.initialized = false;
        self.initialize_locked(&mut core);
    }

    /// Stop playback, persist the disk index and mark uninitialized.
    pub fn shutdown(&self) {
        let mut core = self.lock_core();
        self.stop_locked(&mut core, true);
        if let Some(previous) = core.state.take_previous() {
            previous.release();
        }
        if let Err(err) = core.cache.persist_index() {
            warn!("failed to save cache index on shutdown: {}", err);
        }
        core.initialized = false;
        info!("music system shut down");
    }

    /// Play `filename` from the music folder, replacing whatever plays now.
    ///
    /// With `fade` the outgoing track fades out while the new one fades in.
    ///
    /// # Errors
    /// Any failure leaves nothing current; a user notice is emitted as well.
    pub fn play(&self, filename: &str, looping: bool, fade: bool) -> Result<(), AudioError> {
        let started = Instant::now();
        let mut core = self.lock_core();
        self.initialize_locked(&mut core);
        self.stop_locked(&mut core, fade);

        match self.start_session(&mut core, filename.trim(), looping, fade) {
            Ok(ext) => {
                drop(core);
                self.notify(
                    NoticeLevel::Success,
                    format!(
                        "Playing: {} ({}) in {}ms",
                        filename.trim(),
                        ext.to_uppercase(),
                        started.elapsed().as_millis()
                    ),
                );
                Ok(())
            }
            Err(err) => {
                drop(core);
                error!("failed to play {:?}: {}", filename, err);
                self.notify(
                    NoticeLevel::Error,
                    format!("Cannot play {}: {}", filename.trim(), err),
                );
                Err(err)
            }
        }
    }

    fn start_session(
        &self,
        core: &mut AudioCore,
        filename: &str,
        looping: bool,
        fade: bool,
    ) -> Result<String, AudioError> {
        if filename.is_empty() {
            return Err(AudioError::EmptyFileName);
        }
        let path = self.paths.track(filename);
        if !path.is_file() {
            return Err(AudioError::FileNotFound(path));
        }
        let ext = extension_of(filename)
            .filter(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
            .ok_or_else(|| {
                AudioError::UnsupportedFormat(format!(
                    "{} (supported: {})",
                    filename,
                    SUPPORTED_EXTENSIONS.join(", ")
                ))
            })?;

        let stream = core.cache.resolve(filename, &path)?;
        let mut line = self.output.open_line(stream, looping)?;

        let id = core.next_session_id();
        let settings = core.settings;
        let target = settings.clamp_gain(settings.mod_volume);

        let session = if fade && line.supports_gain() {
            let start = settings.clamp_gain(settings.fade_in_gain());
            line.set_gain(start);
            line.start();
            let mut session = PlaybackSession::new(id, filename, line);
            let token = self.fades.fade_in(
                self.fade_link(),
                id,
                FadeRamp::new(start, target, settings.fade_duration()),
                settings.fade_tick(),
            );
            if token.is_none() {
                session.line_mut().set_gain(target);
            }
            session.set_fade(token);
            session
        } else {
            if line.supports_gain() {
                line.set_gain(target);
            }
            line.start();
            PlaybackSession::new(id, filename, line)
        };

        debug!(
            "session {} started for {} (looping={}, fade={})",
            id, filename, looping, fade
        );
        if let Some(displaced) = core.state.set_current(session) {
            displaced.release();
        }
        Ok(ext)
    }

    /// Stop the current track, fading it out when `fade` is set and the line
    /// supports gain. A track already fading out is cut immediately.
    pub fn stop(&self, fade: bool) {
        let mut core = self.lock_core();
        self.stop_locked(&mut core, fade);
    }

    /// Leaves the state `Idle`, possibly with a fresh fade-out running.
    pub(super) fn stop_locked(&self, core: &mut AudioCore, fade: bool) {
        if let Some(previous) = core.state.take_previous() {
            debug!("cutting fade-out of {}", previous.filename());
            previous.release();
        }

        let mut current = match core.state.take_current() {
            Some(current) => current,
            None => return,
        };

        let line = current.line();
        if !(fade && line.supports_gain() && line.is_running()) {
            debug!("stopping {} immediately", current.filename());
            current.release();
            return;
        }

        current.cancel_fade();
        let from = current.line().gain();
        let id = current.id();
        debug!("fading out {} from {:.3}", current.filename(), from);
        core.state.set_previous(current);

        let token = self.fades.fade_out(
            self.fade_link(),
            id,
            from,
            core.settings.fade_duration(),
            core.settings.fade_tick(),
        );
        match token {
            Some(token) => {
                if let Some(previous) = core.state.previous_mut() {
                    previous.set_fade(Some(token));
                }
            }
            None => {
                if let Some(previous) = core.state.take_previous() {
                    previous.release();
                }
            }
        }
    }

    /// Stop if something is playing; warn otherwise.
    pub fn pause(&self, fade: bool) {
        let mut core = self.lock_core();
        if core.state.current().is_none() {
            drop(core);
            self.notify(NoticeLevel::Warning, "No music is playing");
            return;
        }
        self.stop_locked(&mut core, fade);
        drop(core);
        self.notify(NoticeLevel::Info, "Music paused");
    }

    /// Restart `filename` from a clean system unless something already plays.
    pub fn resume(&self, filename: &str, looping: bool, fade: bool) -> Result<(), AudioError> {
        let playing = self
            .lock_core()
            .state
            .current()
            .map(|session| session.line().is_running())
            .unwrap_or(false);
        if playing {
            self.notify(NoticeLevel::Warning, "Music is already playing");
            return Ok(());
        }
        self.force_reinitialize();
        self.play(filename, looping, fade)
    }
}
