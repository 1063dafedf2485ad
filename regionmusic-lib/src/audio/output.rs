//! Audio output seam: something that turns an [`AudioStream`] into an
//! audible, gain-controllable line.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::AudioError;

use super::stream::AudioStream;

/// An open playback line owning its stream.
///
/// Lines are created stopped; [`start`](PlaybackLine::start) begins output.
pub trait PlaybackLine: Send {
    /// Whether [`set_gain`](PlaybackLine::set_gain) has any effect.
    fn supports_gain(&self) -> bool;
    /// Set linear gain. Callers clamp.
    fn set_gain(&mut self, gain: f32);
    fn gain(&self) -> f32;
    fn start(&mut self);
    /// False once the line has been closed.
    fn is_open(&self) -> bool;
    /// True while started, open and not yet drained.
    fn is_running(&self) -> bool;
    /// Stop output and release the device resources. Idempotent.
    fn close(&mut self);
}

/// Factory for [`PlaybackLine`]s.
pub trait AudioOutput: Send + Sync {
    /// Open a stopped line over `stream`, repeating forever when `looping`.
    ///
    /// # Errors
    /// `LineUnavailable` when the device cannot provide a line,
    /// `UnsupportedFormat` when the stream layout cannot be played.
    fn open_line(
        &self,
        stream: AudioStream,
        looping: bool,
    ) -> Result<Box<dyn PlaybackLine>, AudioError>;

    /// Check that a line could be opened at all.
    fn probe(&self) -> Result<(), AudioError>;

    /// Short name used in log lines.
    fn name(&self) -> &'static str;
}

/// Output that accepts every stream and plays nothing.
#[derive(Debug, Default)]
pub struct NullOutput {
    opened: AtomicU64,
}

impl NullOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of lines opened so far.
    pub fn lines_opened(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }
}

impl AudioOutput for NullOutput {
    fn open_line(
        &self,
        stream: AudioStream,
        looping: bool,
    ) -> Result<Box<dyn PlaybackLine>, AudioError> {
        if !stream.format().is_playable() {
            return Err(AudioError::UnsupportedFormat(format!(
                "{:?}",
                stream.format()
            )));
        }
        self.opened.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "null output: opened line ({:?} frames, looping={})",
            stream.frame_length(),
            looping
        );
        Ok(Box::new(NullLine {
            open: true,
            running: false,
            gain: 1.0,
        }))
    }

    fn probe(&self) -> Result<(), AudioError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

#[derive(Debug)]
struct NullLine {
    open: bool,
    running: bool,
    gain: f32,
}

impl PlaybackLine for NullLine {
    fn supports_gain(&self) -> bool {
        true
    }

    fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    fn gain(&self) -> f32 {
        self.gain
    }

    fn start(&mut self) {
        if self.open {
            self.running = true;
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn is_running(&self) -> bool {
        self.open && self.running
    }

    fn close(&mut self) {
        self.open = false;
        self.running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::AudioFormat;
    use std::sync::Arc;

    #[test]
    fn null_line_tracks_gain_and_lifecycle() {
        let output = NullOutput::new();
        let stream = AudioStream::from_bytes(AudioFormat::pcm_s16le(8_000, 1), Arc::from(vec![0u8; 4]));
        let mut line = output.open_line(stream, true).unwrap();

        assert!(line.is_open());
        assert!(!line.is_running());
        line.set_gain(0.25);
        line.start();
        assert!(line.is_running());
        assert_eq!(line.gain(), 0.25);

        line.close();
        line.close();
        assert!(!line.is_open());
        assert!(!line.is_running());
        assert_eq!(output.lines_opened(), 1);
    }
}
