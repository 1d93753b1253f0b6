//! Decoded input unit types
//!
//! A unit is one discrete piece of input to a modality analyzer: a decoded
//! video frame or a decoded audio chunk. Units are produced by the codec and
//! never carry encoded wire payloads.

use std::sync::Arc;
use std::time::Duration;

/// Decoded video frame (8-bit grayscale)
///
/// Frames are converted to luma at decode time; the detector backends and
/// quality assessment work on luma statistics only.
#[derive(Clone)]
pub struct VideoFrame {
    /// Grayscale pixel data, row-major, `width * height` bytes
    pub luma: Arc<[u8]>,
    /// Frame width in pixels (> 0)
    pub width: u32,
    /// Frame height in pixels (> 0)
    pub height: u32,
    /// Arrival timestamp as fractional epoch seconds
    pub timestamp: f64,
}

impl std::fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

impl VideoFrame {
    pub fn new(luma: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            luma: luma.into(),
            width,
            height,
            timestamp: crate::epoch_seconds(),
        }
    }

    /// Mean pixel brightness in [0, 255]
    pub fn brightness_mean(&self) -> f32 {
        if self.luma.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.luma.iter().map(|&p| p as u64).sum();
        sum as f32 / self.luma.len() as f32
    }

    /// Standard deviation of pixel brightness
    pub fn brightness_std(&self) -> f32 {
        if self.luma.is_empty() {
            return 0.0;
        }
        let mean = self.brightness_mean();
        let var: f32 = self
            .luma
            .iter()
            .map(|&p| {
                let d = p as f32 - mean;
                d * d
            })
            .sum::<f32>()
            / self.luma.len() as f32;
        var.sqrt()
    }
}

/// Decoded audio chunk (mono f32 samples, normalized to [-1.0, 1.0])
#[derive(Clone)]
pub struct AudioChunk {
    /// Raw audio samples
    pub samples: Arc<[f32]>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Duration as reported by the client envelope
    pub duration: Duration,
    /// Arrival timestamp as fractional epoch seconds
    pub timestamp: f64,
}

impl std::fmt::Debug for AudioChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioChunk")
            .field("samples_len", &self.samples.len())
            .field("sample_rate", &self.sample_rate)
            .field("duration", &self.duration)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

impl AudioChunk {
    pub fn new(samples: Vec<f32>, sample_rate: u32, duration: Duration) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
            duration,
            timestamp: crate::epoch_seconds(),
        }
    }

    /// Convert from PCM16 bytes (little-endian)
    pub fn from_pcm16(bytes: &[u8], sample_rate: u32, duration: Duration) -> Self {
        const PCM16_NORMALIZE: f32 = 32768.0;

        let samples: Vec<f32> = bytes
            .chunks_exact(2)
            .map(|chunk| {
                let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
                sample as f32 / PCM16_NORMALIZE
            })
            .collect();

        Self::new(samples, sample_rate, duration)
    }

    /// Duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }

    /// RMS energy of the chunk
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum_squares: f32 = self.samples.iter().map(|s| s * s).sum();
        (sum_squares / self.samples.len() as f32).sqrt()
    }
}
