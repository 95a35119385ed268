//! Raw PCM audio
//!
//! Audio travels through the system as interleaved little-endian 16-bit
//! mono samples. Conversions to normalized `f32` happen only where a
//! measurement or an encoder needs them.

use std::io::Cursor;

use crate::error::TranscriptionError;

/// Default capture rate used when a client does not announce one
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Bytes per 16-bit sample
pub const BYTES_PER_SAMPLE: usize = 2;

/// Owned buffer of 16-bit LE mono PCM at a known sample rate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmAudio {
    data: Vec<u8>,
    sample_rate: u32,
}

impl PcmAudio {
    /// Wrap raw PCM bytes
    pub fn new(data: Vec<u8>, sample_rate: u32) -> Self {
        Self { data, sample_rate }
    }

    /// Empty buffer at the given rate
    pub fn empty(sample_rate: u32) -> Self {
        Self::new(Vec::new(), sample_rate)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append raw bytes to the end of the buffer
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Number of whole samples (a trailing odd byte is ignored)
    pub fn sample_count(&self) -> usize {
        self.data.len() / BYTES_PER_SAMPLE
    }

    /// Duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.sample_count() as u64 * 1000) / self.sample_rate as u64
    }

    /// Samples normalized to [-1.0, 1.0]
    pub fn samples(&self) -> impl Iterator<Item = f32> + '_ {
        self.data
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
    }

    /// Root-mean-square energy of the normalized samples, 0.0 for empty audio
    pub fn rms(&self) -> f32 {
        rms(self.as_bytes())
    }

    /// Encode as a 16-bit mono WAV file
    pub fn to_wav(&self) -> Result<Vec<u8>, TranscriptionError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut out = Vec::with_capacity(self.data.len() + 44);
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut out), spec)
                .map_err(|e| TranscriptionError::InvalidAudio(e.to_string()))?;
            for pair in self.data.chunks_exact(BYTES_PER_SAMPLE) {
                writer
                    .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                    .map_err(|e| TranscriptionError::InvalidAudio(e.to_string()))?;
            }
            writer
                .finalize()
                .map_err(|e| TranscriptionError::InvalidAudio(e.to_string()))?;
        }
        Ok(out)
    }
}

/// Root-mean-square energy of raw 16-bit LE PCM bytes
pub fn rms(pcm: &[u8]) -> f32 {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for pair in pcm.chunks_exact(BYTES_PER_SAMPLE) {
        let sample = i16::from_le_bytes([pair[0], pair[1]]) as f64 / 32768.0;
        sum += sample * sample;
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }
    (sum / count as f64).sqrt() as f32
}
