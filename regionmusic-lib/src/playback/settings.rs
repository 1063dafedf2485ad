//! Persisted playback settings (`config/<app>.properties`).

use std::fs;
use std::path::Path;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::AudioError;

const DEFAULT_MOD_VOLUME: f32 = 0.85;
const DEFAULT_MAX_MOD_VOLUME: f32 = 0.85;
const DEFAULT_FADE_DURATION: f32 = 5.0;
const DEFAULT_FADE_INTERVAL_MS: u64 = 50;
const DEFAULT_FADE_IN_START: f32 = 0.45;

const MIN_FADE_DURATION: f32 = 0.1;
const MIN_FADE_INTERVAL_MS: u64 = 10;
const MAX_FADE_INTERVAL_MS: u64 = 500;

/// Volume and fade parameters.
///
/// `mod_volume` is the gain applied to playing lines; the slider position
/// shown to users maps onto `[fade_in_start * max_mod_volume, max_mod_volume]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicSettings {
    pub mod_volume: f32,
    pub max_mod_volume: f32,
    /// Fade length in seconds.
    pub fade_duration: f32,
    /// Milliseconds between ramp ticks.
    pub fade_interval: u64,
    /// Fraction of `mod_volume` a fade-in starts from.
    pub fade_in_start: f32,
}

impl Default for MusicSettings {
    fn default() -> Self {
        Self {
            mod_volume: DEFAULT_MOD_VOLUME,
            max_mod_volume: DEFAULT_MAX_MOD_VOLUME,
            fade_duration: DEFAULT_FADE_DURATION,
            fade_interval: DEFAULT_FADE_INTERVAL_MS,
            fade_in_start: DEFAULT_FADE_IN_START,
        }
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl MusicSettings {
    /// Load from `path`.
    ///
    /// A missing file is created with defaults. Any read or parse error resets
    /// to defaults and rewrites the file.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            let defaults = Self::default();
            defaults.save_logged(path);
            info!("settings: created {}", path.display());
            return defaults;
        }

        match Self::load(path) {
            Ok(settings) => {
                debug!("settings: loaded {:?}", settings);
                settings
            }
            Err(err) => {
                warn!(
                    "settings: failed to load {} ({}), restoring defaults",
                    path.display(),
                    err
                );
                let defaults = Self::default();
                defaults.save_logged(path);
                defaults
            }
        }
    }

    /// Strictly parse `path`; unknown keys are ignored, absent keys default.
    pub fn load(path: &Path) -> Result<Self, AudioError> {
        #[allow(deprecated)]
        let iter = dotenv::from_path_iter(path)
            .map_err(|err| AudioError::Config(format!("{}: {}", path.display(), err)))?;

        let mut settings = Self::default();
        for item in iter {
            let (key, value) = item.map_err(|err| AudioError::Config(err.to_string()))?;
            let value = value.trim();
            let bad = |key: &str| AudioError::Config(format!("invalid value for {}: {}", key, value));
            match key.as_str() {
                "modVolume" => settings.mod_volume = value.parse().map_err(|_| bad("modVolume"))?,
                "maxModVolume" => {
                    settings.max_mod_volume = value.parse().map_err(|_| bad("maxModVolume"))?
                }
                "fadeDuration" => {
                    settings.fade_duration = value.parse().map_err(|_| bad("fadeDuration"))?
                }
                "fadeInterval" => {
                    settings.fade_interval = value.parse().map_err(|_| bad("fadeInterval"))?
                }
                "fadeInStart" => {
                    settings.fade_in_start = value.parse().map_err(|_| bad("fadeInStart"))?
                }
                other => debug!("settings: ignoring unknown key {}", other),
            }
        }
        settings.normalize();
        Ok(settings)
    }

    /// Overwrite `path` with a comment header and the five keys.
    pub fn save(&self, path: &Path) -> Result<(), AudioError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let body = format!(
            "# Region Music configuration\n\
             modVolume={}\n\
             maxModVolume={}\n\
             fadeDuration={}\n\
             fadeInterval={}\n\
             fadeInStart={}\n",
            self.mod_volume,
            self.max_mod_volume,
            self.fade_duration,
            self.fade_interval,
            self.fade_in_start
        );
        fs::write(path, body)?;
        debug!("settings: saved {}", path.display());
        Ok(())
    }

    pub(crate) fn save_logged(&self, path: &Path) {
        if let Err(err) = self.save(path) {
            warn!("settings: failed to save {}: {}", path.display(), err);
        }
    }

    /// Apply every clamp; `mod_volume` is bounded by the already clamped max.
    pub fn normalize(&mut self) {
        self.max_mod_volume = clamp_unit(self.max_mod_volume);
        self.mod_volume = clamp_unit(self.mod_volume).min(self.max_mod_volume);
        self.fade_duration = if self.fade_duration.is_nan() {
            DEFAULT_FADE_DURATION
        } else {
            self.fade_duration.max(MIN_FADE_DURATION)
        };
        self.fade_interval = self
            .fade_interval
            .clamp(MIN_FADE_INTERVAL_MS, MAX_FADE_INTERVAL_MS);
        self.fade_in_start = clamp_unit(self.fade_in_start);
    }

    /// Lowest `mod_volume` reachable from the slider.
    pub fn volume_floor(&self) -> f32 {
        self.fade_in_start * self.max_mod_volume
    }

    /// Slider position in `[0, 1]` for the current `mod_volume`.
    ///
    /// When the slider range is empty the position reads as full.
    pub fn slider_position(&self) -> f32 {
        let floor = self.volume_floor();
        let span = self.max_mod_volume - floor;
        if span <= f32::EPSILON {
            return 1.0;
        }
        (self.mod_volume - floor) / span
    }

    /// Map slider position `position` onto `mod_volume`.
    pub fn set_slider_position(&mut self, position: f32) {
        let floor = self.volume_floor();
        let volume = floor + (self.max_mod_volume - floor) * position;
        self.mod_volume = if volume.is_nan() {
            floor
        } else {
            volume.clamp(floor, self.max_mod_volume)
        };
    }

    pub fn set_fade_duration(&mut self, seconds: f32) {
        self.fade_duration = seconds;
        self.normalize();
    }

    pub fn set_fade_interval(&mut self, millis: u64) {
        self.fade_interval = millis;
        self.normalize();
    }

    /// Set the ceiling; `mod_volume` follows it down if needed.
    pub fn set_max_mod_volume(&mut self, volume: f32) {
        self.max_mod_volume = volume;
        self.normalize();
    }

    pub fn set_fade_in_start(&mut self, fraction: f32) {
        self.fade_in_start = fraction;
        self.normalize();
    }

    /// Gain a fade-in starts from.
    pub fn fade_in_gain(&self) -> f32 {
        self.fade_in_start * self.mod_volume
    }

    pub fn fade_duration(&self) -> Duration {
        Duration::from_secs_f32(self.fade_duration)
    }

    pub fn fade_tick(&self) -> Duration {
        Duration::from_millis(self.fade_interval)
    }

    /// Clamp a gain to what lines may be driven at.
    pub fn clamp_gain(&self, gain: f32) -> f32 {
        if gain.is_nan() {
            0.0
        } else {
            gain.clamp(0.0, self.max_mod_volume)
        }
    }
}
