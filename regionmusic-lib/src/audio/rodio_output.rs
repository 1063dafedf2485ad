//! Device output through `rodio`.
//!
//! The output stream is opened on a dedicated thread that keeps it alive for
//! the lifetime of [`RodioOutput`]; lines are `Sink`s connected to its mixer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};
use rodio::buffer::SamplesBuffer;
use rodio::mixer::Mixer;
use rodio::{OutputStream, OutputStreamBuilder, Sink, Source};

use crate::error::AudioError;

use super::output::{AudioOutput, PlaybackLine};
use super::stream::AudioStream;

const OUTPUT_STREAM_OPEN_RETRIES: usize = 20;
const OUTPUT_STREAM_OPEN_RETRY_MS: u64 = 100;

struct StreamThread {
    mixer: Mixer,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// [`AudioOutput`] playing through the default output device.
///
/// The device is opened lazily on the first line request or probe and then
/// reused. A failed open is retried on the next request.
#[derive(Default)]
pub struct RodioOutput {
    stream: Mutex<Option<StreamThread>>,
}

impl RodioOutput {
    pub fn new() -> Self {
        Self::default()
    }

    fn mixer(&self) -> Result<Mixer, AudioError> {
        let mut slot = self
            .stream
            .lock()
            .map_err(|_| AudioError::LineUnavailable("output state poisoned".to_string()))?;
        if let Some(stream) = slot.as_ref() {
            return Ok(stream.mixer.clone());
        }

        let stream = spawn_stream_thread()?;
        let mixer = stream.mixer.clone();
        *slot = Some(stream);
        Ok(mixer)
    }
}

impl Drop for RodioOutput {
    fn drop(&mut self) {
        let stream = match self.stream.get_mut() {
            Ok(slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(mut stream) = stream {
            stream.shutdown.store(true, Ordering::SeqCst);
            if let Some(handle) = stream.handle.take() {
                handle.thread().unpark();
                let _ = handle.join();
            }
        }
    }
}

fn open_output_stream_with_retry() -> Result<OutputStream, String> {
    let mut last_error = String::new();
    for attempt in 1..=OUTPUT_STREAM_OPEN_RETRIES {
        match OutputStreamBuilder::open_default_stream() {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                last_error = err.to_string();
                if attempt == OUTPUT_STREAM_OPEN_RETRIES {
                    error!(
                        "failed to open default output stream after {} attempts: {}",
                        OUTPUT_STREAM_OPEN_RETRIES, err
                    );
                    break;
                }
                warn!(
                    "open_default_stream attempt {}/{} failed: {}",
                    attempt, OUTPUT_STREAM_OPEN_RETRIES, err
                );
                thread::sleep(Duration::from_millis(OUTPUT_STREAM_OPEN_RETRY_MS));
            }
        }
    }
    Err(last_error)
}

fn spawn_stream_thread() -> Result<StreamThread, AudioError> {
    let (mixer_tx, mixer_rx) = mpsc::channel();
    let shutdown = Arc::new(AtomicBool::new(false));
    let thread_shutdown = shutdown.clone();

    let handle = thread::Builder::new()
        .name("audio-output".to_string())
        .spawn(move || {
            let mut stream = match open_output_stream_with_retry() {
                Ok(stream) => stream,
                Err(err) => {
                    let _ = mixer_tx.send(Err(err));
                    return;
                }
            };
            stream.log_on_drop(false);
            if mixer_tx.send(Ok(stream.mixer().clone())).is_err() {
                return;
            }
            while !thread_shutdown.load(Ordering::SeqCst) {
                thread::park();
            }
            debug!("audio output thread exiting");
        })
        .map_err(|err| AudioError::LineUnavailable(err.to_string()))?;

    match mixer_rx.recv() {
        Ok(Ok(mixer)) => {
            info!("opened default audio output");
            Ok(StreamThread {
                mixer,
                shutdown,
                handle: Some(handle),
            })
        }
        Ok(Err(err)) => {
            let _ = handle.join();
            Err(AudioError::LineUnavailable(err))
        }
        Err(_) => {
            let _ = handle.join();
            Err(AudioError::LineUnavailable(
                "audio output thread exited".to_string(),
            ))
        }
    }
}

impl AudioOutput for RodioOutput {
    fn open_line(
        &self,
        stream: AudioStream,
        looping: bool,
    ) -> Result<Box<dyn PlaybackLine>, AudioError> {
        let format = *stream.format();
        let bytes = stream.read_all()?;
        let samples = format.to_f32_samples(&bytes)?;
        let mixer = self.mixer()?;

        let sink = Sink::connect_new(&mixer);
        sink.pause();
        let source = SamplesBuffer::new(format.channels, format.sample_rate as u32, samples);
        if looping {
            sink.append(source.repeat_infinite());
        } else {
            sink.append(source);
        }

        Ok(Box::new(RodioLine { sink, open: true }))
    }

    fn probe(&self) -> Result<(), AudioError> {
        self.mixer().map(|_| ())
    }

    fn name(&self) -> &'static str {
        "rodio"
    }
}

struct RodioLine {
    sink: Sink,
    open: bool,
}

impl PlaybackLine for RodioLine {
    fn supports_gain(&self) -> bool {
        true
    }

    fn set_gain(&mut self, gain: f32) {
        self.sink.set_volume(gain);
    }

    fn gain(&self) -> f32 {
        self.sink.volume()
    }

    fn start(&mut self) {
        if self.open {
            self.sink.play();
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn is_running(&self) -> bool {
        self.open && !self.sink.is_paused() && !self.sink.empty()
    }

    fn close(&mut self) {
        if self.open {
            self.sink.stop();
            self.open = false;
        }
    }
}

impl Drop for RodioLine {
    fn drop(&mut self) {
        self.close();
    }
}
