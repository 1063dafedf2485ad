//! Source decoding into the normalized playable PCM layout.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{
    DecoderOptions, CODEC_TYPE_NULL, CODEC_TYPE_PCM_S16LE, CODEC_TYPE_VORBIS,
};
use symphonia::core::errors::Error;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::AudioError;
use crate::paths::{has_supported_extension, SUPPORTED_EXTENSIONS};

use super::format::AudioFormat;
use super::stream::AudioStream;

/// Most channels kept in the normalized layout.
const MAX_OUTPUT_CHANNELS: usize = 2;

/// Turns a source file into a playable [`AudioStream`].
pub trait SourceDecoder: Send + Sync {
    /// Decode `path` fully into signed 16-bit little-endian PCM.
    fn decode(&self, path: &Path) -> Result<AudioStream, AudioError>;

    /// True when `path` looks decodable without producing any samples.
    fn can_decode(&self, path: &Path) -> bool;

    /// True when files with extension `ext` (lowercase, no dot) can be decoded.
    fn supports_extension(&self, ext: &str) -> bool {
        SUPPORTED_EXTENSIONS.contains(&ext)
    }
}

/// [`SourceDecoder`] backed by Symphonia's default codec registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Shared handle suitable for `ManagerOptions`.
    pub fn shared() -> Arc<dyn SourceDecoder> {
        Arc::new(Self)
    }
}

fn open_reader(path: &Path) -> Result<Box<dyn FormatReader>, AudioError> {
    let src = File::open(path).map_err(|err| AudioError::from_io(path, err))?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|err| AudioError::UnsupportedFormat(format!("{}: {}", path.display(), err)))?;

    Ok(probed.format)
}

impl SourceDecoder for SymphoniaDecoder {
    fn decode(&self, path: &Path) -> Result<AudioStream, AudioError> {
        let mut format = open_reader(path)?;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                AudioError::UnsupportedFormat(format!("{}: no audio track", path.display()))
            })?;
        let track_id = track.id;

        let dec_opts: DecoderOptions = Default::default();
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &dec_opts)
            .map_err(|err| AudioError::UnsupportedFormat(err.to_string()))?;

        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
        let mut source_channels = track
            .codec_params
            .channels
            .map(|channels| channels.count())
            .unwrap_or(0);
        let mut pcm: Vec<u8> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(Error::IoError(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break
                }
                Err(Error::ResetRequired) => break,
                Err(err) => return Err(map_symphonia_error(err)),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(Error::DecodeError(msg)) => {
                    warn!("skipping undecodable packet in {}: {}", path.display(), msg);
                    continue;
                }
                Err(err) => return Err(map_symphonia_error(err)),
            };

            let spec = *decoded.spec();
            sample_rate = spec.rate;
            source_channels = spec.channels.count();
            if source_channels == 0 {
                continue;
            }

            let mut buffer = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
            buffer.copy_interleaved_ref(decoded);

            let kept = source_channels.min(MAX_OUTPUT_CHANNELS);
            for frame in buffer.samples().chunks_exact(source_channels) {
                for sample in &frame[..kept] {
                    pcm.extend_from_slice(&sample.to_le_bytes());
                }
            }
        }

        if sample_rate == 0 || source_channels == 0 {
            return Err(AudioError::UnsupportedFormat(format!(
                "{}: missing sample rate or channel layout",
                path.display()
            )));
        }

        let channels = source_channels.min(MAX_OUTPUT_CHANNELS) as u16;
        let audio_format = AudioFormat::pcm_s16le(sample_rate, channels);
        debug!(
            "decoded {} ({} Hz, {} ch -> {} ch, {} bytes)",
            path.display(),
            sample_rate,
            source_channels,
            channels,
            pcm.len()
        );

        Ok(AudioStream::from_bytes(audio_format, Arc::from(pcm)))
    }

    fn can_decode(&self, path: &Path) -> bool {
        let supported = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(has_supported_extension)
            .unwrap_or(false);
        if !supported {
            return false;
        }
        match open_reader(path) {
            Ok(format) => format
                .tracks()
                .iter()
                .any(|t| t.codec_params.codec != CODEC_TYPE_NULL),
            Err(err) => {
                debug!("cannot decode {}: {}", path.display(), err);
                false
            }
        }
    }

    fn supports_extension(&self, ext: &str) -> bool {
        let codec = match ext {
            "wav" => CODEC_TYPE_PCM_S16LE,
            "ogg" => CODEC_TYPE_VORBIS,
            _ => return false,
        };
        symphonia::default::get_codecs().get_codec(codec).is_some()
    }
}

fn map_symphonia_error(err: Error) -> AudioError {
    match err {
        Error::IoError(err) => AudioError::Io(err),
        Error::Unsupported(what) => AudioError::UnsupportedFormat(what.to_string()),
        other => AudioError::UnsupportedFormat(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn write_wav(path: &Path, channels: u16, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
        for frame in 0..frames {
            for channel in 0..channels {
                writer
                    .write_sample((frame as i16 * 10) + channel as i16)
                    .expect("write sample");
            }
        }
        writer.finalize().expect("finalize wav");
    }

    #[test]
    fn decodes_stereo_wav_to_s16le() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 2, 500);

        let stream = SymphoniaDecoder::new().decode(&path).unwrap();
        let format = *stream.format();
        assert_eq!(format, AudioFormat::pcm_s16le(22_050, 2));

        let bytes = stream.read_all().unwrap();
        assert_eq!(bytes.len(), 500 * 4);
        assert_eq!(&bytes[..8], &[0, 0, 1, 0, 10, 0, 11, 0]);
    }

    #[test]
    fn downmixes_to_first_two_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surround.wav");
        write_wav(&path, 4, 100);

        let mut stream = SymphoniaDecoder::new().decode(&path).unwrap();
        assert_eq!(stream.format().channels, 2);

        let mut first_frame = [0u8; 4];
        stream.read_exact(&mut first_frame).unwrap();
        assert_eq!(first_frame, [0, 0, 1, 0]);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = SymphoniaDecoder::new()
            .decode(&dir.path().join("absent.ogg"))
            .unwrap_err();
        assert!(matches!(err, AudioError::FileNotFound(_)));
    }

    #[test]
    fn garbage_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.ogg");
        std::fs::write(&path, b"definitely not an ogg stream").unwrap();

        let decoder = SymphoniaDecoder::new();
        assert!(!decoder.can_decode(&path));
        assert!(matches!(
            decoder.decode(&path),
            Err(AudioError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn can_decode_requires_known_extension() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("ok.wav");
        write_wav(&wav, 1, 10);
        let renamed = dir.path().join("ok.mp3");
        std::fs::copy(&wav, &renamed).unwrap();

        let decoder = SymphoniaDecoder::new();
        assert!(decoder.can_decode(&wav));
        assert!(!decoder.can_decode(&renamed));
    }

    #[test]
    fn default_registry_covers_wav_and_ogg() {
        let decoder = SymphoniaDecoder::new();
        assert!(decoder.supports_extension("wav"));
        assert!(decoder.supports_extension("ogg"));
        assert!(!decoder.supports_extension("mp3"));
    }
}
