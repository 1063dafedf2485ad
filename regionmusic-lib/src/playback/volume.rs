//! Volume and fade setting accessors for [`MusicManager`].
//!
//! Every setter persists the settings file.

use log::debug;

use super::settings::MusicSettings;
use super::{AudioCore, MusicManager};

impl MusicManager {
    /// Snapshot of the active settings.
    pub fn settings(&self) -> MusicSettings {
        self.lock_core().settings
    }

    /// Slider position in `[0, 1]`.
    pub fn current_volume(&self) -> f32 {
        self.lock_core().settings.slider_position()
    }

    /// Move the volume slider and apply the result to the current track.
    pub fn set_volume(&self, position: f32) {
        self.update_settings(|settings| settings.set_slider_position(position));
    }

    /// Gain applied to playing lines.
    pub fn mod_volume(&self) -> f32 {
        self.lock_core().settings.mod_volume
    }

    pub fn max_mod_volume(&self) -> f32 {
        self.lock_core().settings.max_mod_volume
    }

    pub fn set_max_mod_volume(&self, volume: f32) {
        self.update_settings(|settings| settings.set_max_mod_volume(volume));
    }

    /// Fade length in seconds.
    pub fn fade_duration(&self) -> f32 {
        self.lock_core().settings.fade_duration
    }

    pub fn set_fade_duration(&self, seconds: f32) {
        self.update_settings(|settings| settings.set_fade_duration(seconds));
    }

    pub fn fade_in_start(&self) -> f32 {
        self.lock_core().settings.fade_in_start
    }

    pub fn set_fade_in_start(&self, fraction: f32) {
        self.update_settings(|settings| settings.set_fade_in_start(fraction));
    }

    /// Milliseconds between ramp ticks.
    pub fn fade_interval(&self) -> u64 {
        self.lock_core().settings.fade_interval
    }

    pub fn set_fade_interval(&self, millis: u64) {
        self.update_settings(|settings| settings.set_fade_interval(millis));
    }

    fn update_settings(&self, change: impl FnOnce(&mut MusicSettings)) {
        let mut core = self.lock_core();
        let before = core.settings.mod_volume;
        change(&mut core.settings);
        if core.settings.mod_volume != before {
            apply_current_gain(&mut core);
        }
        core.settings.save_logged(&self.paths.config_file);
    }
}

/// Drive the current line at `mod_volume`, overriding a running fade-in.
fn apply_current_gain(core: &mut AudioCore) {
    let gain = core.settings.clamp_gain(core.settings.mod_volume);
    if let Some(current) = core.state.current_mut() {
        if current.line().supports_gain() {
            current.cancel_fade();
            current.line_mut().set_gain(gain);
            debug!("applied gain {:.3} to {}", gain, current.filename());
        }
    }
}
