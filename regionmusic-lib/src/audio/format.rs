//! PCM format description and sample conversion helpers.

use serde::{Deserialize, Serialize};

use crate::error::AudioError;

/// Sample encoding of a PCM payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    #[serde(rename = "PCM_SIGNED")]
    PcmSigned,
    #[serde(rename = "PCM_UNSIGNED")]
    PcmUnsigned,
    #[serde(rename = "PCM_FLOAT")]
    PcmFloat,
}

/// Layout of an interleaved PCM byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub encoding: Encoding,
    pub sample_rate: f32,
    pub sample_size_in_bits: u16,
    pub channels: u16,
    pub frame_size: u16,
    pub frame_rate: f32,
    pub big_endian: bool,
}

impl AudioFormat {
    /// Signed 16-bit little-endian PCM, the normalized playable layout.
    pub fn pcm_s16le(sample_rate: u32, channels: u16) -> Self {
        Self {
            encoding: Encoding::PcmSigned,
            sample_rate: sample_rate as f32,
            sample_size_in_bits: 16,
            channels,
            frame_size: channels * 2,
            frame_rate: sample_rate as f32,
            big_endian: false,
        }
    }

    /// True when a line can consume this layout without conversion.
    pub fn is_playable(&self) -> bool {
        self.channels > 0
            && self.frame_size > 0
            && matches!(
                (self.encoding, self.sample_size_in_bits),
                (Encoding::PcmSigned, 8 | 16 | 24 | 32)
                    | (Encoding::PcmUnsigned, 8)
                    | (Encoding::PcmFloat, 32)
            )
    }

    /// Number of whole frames in a payload of `bytes` length.
    pub fn frames_in(&self, bytes: u64) -> u64 {
        if self.frame_size == 0 {
            return 0;
        }
        bytes / self.frame_size as u64
    }

    /// Convert an interleaved payload to `f32` samples in `[-1, 1]`.
    ///
    /// # Errors
    /// Returns `UnsupportedFormat` for layouts that [`is_playable`](Self::is_playable)
    /// rejects.
    pub fn to_f32_samples(&self, bytes: &[u8]) -> Result<Vec<f32>, AudioError> {
        if !self.is_playable() {
            return Err(AudioError::UnsupportedFormat(format!(
                "{:?} {}-bit",
                self.encoding, self.sample_size_in_bits
            )));
        }

        let width = (self.sample_size_in_bits / 8) as usize;
        let samples = bytes
            .chunks_exact(width)
            .map(|chunk| self.convert_sample(chunk))
            .collect();
        Ok(samples)
    }

    fn convert_sample(&self, chunk: &[u8]) -> f32 {
        let ordered = |chunk: &[u8]| -> [u8; 4] {
            let mut raw = [0u8; 4];
            if self.big_endian {
                for (i, byte) in chunk.iter().rev().enumerate() {
                    raw[i] = *byte;
                }
            } else {
                raw[..chunk.len()].copy_from_slice(chunk);
            }
            raw
        };

        match (self.encoding, chunk.len()) {
            (Encoding::PcmUnsigned, 1) => (chunk[0] as i16 - 128) as f32 / 128.0,
            (Encoding::PcmSigned, 1) => chunk[0] as i8 as f32 / 128.0,
            (Encoding::PcmSigned, 2) => {
                let raw = ordered(chunk);
                i16::from_le_bytes([raw[0], raw[1]]) as f32 / 32_768.0
            }
            (Encoding::PcmSigned, 3) => {
                let raw = ordered(chunk);
                let value = i32::from_le_bytes([raw[0], raw[1], raw[2], 0]) << 8 >> 8;
                value as f32 / 8_388_608.0
            }
            (Encoding::PcmSigned, 4) => i32::from_le_bytes(ordered(chunk)) as f32 / 2_147_483_648.0,
            (Encoding::PcmFloat, 4) => f32::from_le_bytes(ordered(chunk)),
            _ => 0.0,
        }
    }
}
