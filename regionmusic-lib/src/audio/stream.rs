//! Readable PCM stream handed from the cache tiers to the audio output.

use std::io::{Cursor, Read};
use std::sync::Arc;

use super::format::AudioFormat;

/// A decoded PCM byte stream together with its layout.
///
/// Streams built from cached bytes share the underlying buffer; every
/// [`AudioStream::from_bytes`] call yields an independent read position.
pub struct AudioStream {
    format: AudioFormat,
    reader: Box<dyn Read + Send>,
    byte_len: Option<u64>,
}

impl AudioStream {
    /// Stream over an in-memory payload.
    pub fn from_bytes(format: AudioFormat, bytes: Arc<[u8]>) -> Self {
        let byte_len = Some(bytes.len() as u64);
        Self {
            format,
            reader: Box::new(Cursor::new(bytes)),
            byte_len,
        }
    }

    /// Stream over an arbitrary reader, e.g. an open `.cache` file.
    pub fn from_reader(
        format: AudioFormat,
        reader: Box<dyn Read + Send>,
        byte_len: Option<u64>,
    ) -> Self {
        Self {
            format,
            reader,
            byte_len,
        }
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    /// Payload length in bytes when known up front.
    pub fn byte_len(&self) -> Option<u64> {
        self.byte_len
    }

    /// Length in frames when the payload length is known.
    pub fn frame_length(&self) -> Option<u64> {
        self.byte_len.map(|len| self.format.frames_in(len))
    }

    /// Drain the remaining payload into memory.
    pub fn read_all(mut self) -> std::io::Result<Vec<u8>> {
        let mut data = Vec::with_capacity(self.byte_len.unwrap_or(0) as usize);
        self.reader.read_to_end(&mut data)?;
        Ok(data)
    }
}

impl Read for AudioStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl std::fmt::Debug for AudioStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioStream")
            .field("format", &self.format)
            .field("byte_len", &self.byte_len)
            .finish()
    }
}
