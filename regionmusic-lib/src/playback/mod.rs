//! Playback controller.
//!
//! [`MusicManager`] owns the audio lock, the decode cache, the fade pool and
//! the session hand-off between the current track and the one fading out.

mod commands;
mod controls;
pub mod fade;
pub mod settings;
mod state;
mod status;
mod volume;

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::Serialize;

use crate::audio::{AudioOutput, SourceDecoder, SymphoniaDecoder};
use crate::cache::{CacheCoordinator, CacheLimits};
use crate::notice::{self, Notice, NoticeLevel, NoticeSink};
use crate::paths::AppPaths;

use fade::{FadeScheduler, FadeTarget, SessionSlot, TickOutcome};
use settings::MusicSettings;
use state::PlaybackState;

pub use state::{PlaybackPhase, PlaybackSession};

/// Construction options for [`MusicManager`].
#[derive(Clone)]
pub struct ManagerOptions {
    pub limits: CacheLimits,
    pub decoder: Arc<dyn SourceDecoder>,
    /// Receives user notices. Runs on the calling thread, sometimes while the
    /// audio lock is held, so it must not call back into the manager.
    pub notices: Option<NoticeSink>,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            limits: CacheLimits::default(),
            decoder: SymphoniaDecoder::shared(),
            notices: None,
        }
    }
}

/// One source file in the music folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MusicFile {
    pub name: String,
    pub size: u64,
    /// Whether the decoder accepted the file on a probe.
    pub decodable: bool,
}

/// Everything guarded by the audio lock.
pub(crate) struct AudioCore {
    pub(crate) settings: MusicSettings,
    pub(crate) state: PlaybackState,
    pub(crate) cache: CacheCoordinator,
    pub(crate) initialized: bool,
    next_session_id: u64,
}

impl AudioCore {
    fn next_session_id(&mut self) -> u64 {
        let id = self.next_session_id;
        self.next_session_id += 1;
        id
    }
}

/// Region music controller.
///
/// Cloning yields another handle to the same controller. All public
/// operations serialize on one audio lock; fade ramps run on a worker pool
/// and re-acquire that lock on every tick.
#[derive(Clone)]
pub struct MusicManager {
    core: Arc<Mutex<AudioCore>>,
    paths: AppPaths,
    output: Arc<dyn AudioOutput>,
    fades: Arc<FadeScheduler>,
    notices: Option<NoticeSink>,
}

impl MusicManager {
    /// Controller using the Symphonia decoder and default cache limits.
    pub fn new(paths: AppPaths, output: Arc<dyn AudioOutput>) -> Self {
        Self::with_options(paths, output, ManagerOptions::default())
    }

    pub fn with_options(paths: AppPaths, output: Arc<dyn AudioOutput>, options: ManagerOptions) -> Self {
        let cache = CacheCoordinator::new(paths.cache_dir.clone(), options.limits, options.decoder);
        let core = AudioCore {
            settings: MusicSettings::default(),
            state: PlaybackState::default(),
            cache,
            initialized: false,
            next_session_id: 1,
        };
        Self {
            core: Arc::new(Mutex::new(core)),
            paths,
            output,
            fades: Arc::new(FadeScheduler::new()),
            notices: options.notices,
        }
    }

    /// Controller playing through the default audio device.
    #[cfg(feature = "rodio-output")]
    pub fn with_device(paths: AppPaths, options: ManagerOptions) -> Self {
        Self::with_options(paths, Arc::new(crate::audio::RodioOutput::new()), options)
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    fn lock_core(&self) -> MutexGuard<'_, AudioCore> {
        self.core.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fade_link(&self) -> Arc<dyn FadeTarget> {
        Arc::new(FadeLink {
            core: Arc::downgrade(&self.core),
        })
    }

    fn notify(&self, level: NoticeLevel, text: impl Into<String>) {
        notice::emit(self.notices.as_ref(), Notice::new(level, text));
    }
}

/// Ramp workers' view of the sessions.
struct FadeLink {
    core: Weak<Mutex<AudioCore>>,
}

impl FadeLink {
    fn with_core<R>(&self, f: impl FnOnce(&mut AudioCore) -> R) -> Option<R> {
        let core = self.core.upgrade()?;
        let mut guard = core.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Some(f(&mut guard))
    }
}

impl FadeTarget for FadeLink {
    fn apply(&self, slot: SessionSlot, id: u64, gain: f32) -> TickOutcome {
        self.with_core(|core| {
            let gain = core.settings.clamp_gain(gain);
            let session = match slot {
                SessionSlot::Current => core.state.current_mut(),
                SessionSlot::Previous => core.state.previous_mut(),
            };
            let session = match session {
                Some(session) if session.id() == id => session,
                _ => return TickOutcome::Detached,
            };
            let line = session.line_mut();
            if !line.is_open() || !line.supports_gain() || !line.is_running() {
                return TickOutcome::Broken;
            }
            line.set_gain(gain);
            TickOutcome::Applied
        })
        .unwrap_or(TickOutcome::Detached)
    }

    fn release(&self, slot: SessionSlot, id: u64) {
        let released = self.with_core(|core| {
            let owned = match slot {
                SessionSlot::Current => core.state.current().map(|s| s.id()) == Some(id),
                SessionSlot::Previous => core.state.previous().map(|s| s.id()) == Some(id),
            };
            if !owned {
                return false;
            }
            let session = match slot {
                SessionSlot::Current => core.state.take_current(),
                SessionSlot::Previous => core.state.take_previous(),
            };
            match session {
                Some(session) => {
                    session.release();
                    true
                }
                None => false,
            }
        });
        if released == Some(true) {
            log::debug!("fade released {:?} session {}", slot, id);
        }
    }
}
