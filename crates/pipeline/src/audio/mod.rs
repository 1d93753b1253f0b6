//! Audio track: speech feature extraction
//!
//! A DSP-driven `SpeechAnalyzer` backend: RMS volume, fundamental frequency
//! via autocorrelation, speech rate from energy onsets, articulation
//! clarity from spectral flatness, and a feature-driven vocal emotion
//! label. A model-backed extractor plugs in behind the same trait.

use realfft::RealFftPlanner;

use interview_engine_core::{
    AudioAnalysis, AudioChunk, Error, Result, SpeechAnalyzer, VocalEmotion,
};

/// RMS below this is treated as silence
const SPEECH_RMS_FLOOR: f32 = 0.01;
/// Pitch search range in Hz
const PITCH_MIN_HZ: f32 = 50.0;
const PITCH_MAX_HZ: f32 = 400.0;
/// Autocorrelation peak below this is unvoiced
const VOICING_FLOOR: f32 = 0.3;
/// Energy-onset analysis window in milliseconds
const ONSET_WINDOW_MS: u32 = 25;
/// Syllables per word, for the words-per-minute estimate
const SYLLABLES_PER_WORD: f32 = 1.5;

pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Mean fundamental frequency via normalized autocorrelation.
    fn pitch_hz(samples: &[f32], sample_rate: u32) -> f32 {
        let window: &[f32] = if samples.len() > 2048 {
            let mid = samples.len() / 2;
            &samples[mid - 1024..mid + 1024]
        } else {
            samples
        };

        let energy: f32 = window.iter().map(|s| s * s).sum();
        if energy <= f32::EPSILON {
            return 0.0;
        }

        let min_lag = (sample_rate as f32 / PITCH_MAX_HZ) as usize;
        let max_lag = ((sample_rate as f32 / PITCH_MIN_HZ) as usize).min(window.len() / 2);
        if min_lag == 0 || min_lag >= max_lag {
            return 0.0;
        }

        let mut best_lag = 0;
        let mut best_corr = 0.0f32;
        for lag in min_lag..max_lag {
            let corr: f32 = window[..window.len() - lag]
                .iter()
                .zip(&window[lag..])
                .map(|(a, b)| a * b)
                .sum();
            let normalized = corr / energy;
            if normalized > best_corr {
                best_corr = normalized;
                best_lag = lag;
            }
        }

        if best_corr < VOICING_FLOOR || best_lag == 0 {
            0.0
        } else {
            sample_rate as f32 / best_lag as f32
        }
    }

    /// Words per minute estimated from energy-burst onsets.
    fn speech_rate_wpm(samples: &[f32], sample_rate: u32, duration_ms: u64) -> f32 {
        if duration_ms == 0 {
            return 0.0;
        }
        let window = (sample_rate * ONSET_WINDOW_MS / 1000) as usize;
        if window == 0 {
            return 0.0;
        }

        let frame_rms: Vec<f32> = samples
            .chunks(window)
            .map(|c| {
                let sum: f32 = c.iter().map(|s| s * s).sum();
                (sum / c.len() as f32).sqrt()
            })
            .collect();

        let peak = frame_rms.iter().cloned().fold(0.0f32, f32::max);
        let threshold = (peak * 0.3).max(SPEECH_RMS_FLOOR);

        let mut onsets = 0u32;
        let mut in_speech = false;
        for &rms in &frame_rms {
            let speaking = rms >= threshold;
            if speaking && !in_speech {
                onsets += 1;
            }
            in_speech = speaking;
        }

        let words = onsets as f32 / SYLLABLES_PER_WORD;
        let wpm = words * 60_000.0 / duration_ms as f32;
        wpm.clamp(0.0, 600.0)
    }

    /// Articulation clarity as inverse spectral flatness.
    ///
    /// A tonal (voiced, articulated) spectrum has low flatness; broadband
    /// noise has flatness near 1.
    fn clarity(samples: &[f32]) -> Result<f32> {
        let n = 1024.min(samples.len());
        // Round down to a power of two for the FFT
        let n = 1 << (usize::BITS - 1 - n.leading_zeros());
        if n < 64 {
            return Ok(0.0);
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);
        let mut input = fft.make_input_vec();
        let mut spectrum = fft.make_output_vec();

        let start = (samples.len() - n) / 2;
        input.copy_from_slice(&samples[start..start + n]);

        fft.process(&mut input, &mut spectrum)
            .map_err(|e| Error::Inference(format!("fft failed: {}", e)))?;

        // Skip DC; guard against log(0)
        let mags: Vec<f32> = spectrum[1..].iter().map(|c| c.norm().max(1e-10)).collect();
        let arith = mags.iter().sum::<f32>() / mags.len() as f32;
        if arith <= 1e-10 {
            return Ok(0.0);
        }
        let log_mean = mags.iter().map(|m| m.ln()).sum::<f32>() / mags.len() as f32;
        let flatness = (log_mean.exp() / arith).clamp(0.0, 1.0);

        Ok((1.0 - flatness).clamp(0.0, 1.0))
    }

    fn classify(
        pitch_hz: f32,
        rate_wpm: f32,
        volume: f32,
        clarity: f32,
    ) -> (VocalEmotion, f32) {
        if pitch_hz > 180.0 && rate_wpm > 160.0 {
            (VocalEmotion::Excited, (0.5 + volume).clamp(0.0, 1.0))
        } else if clarity < 0.4 && rate_wpm > 140.0 {
            (VocalEmotion::Stressed, (0.4 + (0.4 - clarity)).clamp(0.0, 1.0))
        } else if rate_wpm < 60.0 && pitch_hz < 120.0 {
            (VocalEmotion::Flat, (0.3 + volume).clamp(0.0, 1.0))
        } else {
            (VocalEmotion::Calm, (0.3 + clarity * 0.5).clamp(0.0, 1.0))
        }
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechAnalyzer for FeatureExtractor {
    fn extract(&self, chunk: &AudioChunk) -> Result<AudioAnalysis> {
        if chunk.samples.is_empty() {
            return Err(Error::Inference("empty audio chunk".to_string()));
        }

        let volume = chunk.rms();
        if volume < SPEECH_RMS_FLOOR {
            // Valid chunk, no speech in it
            return Ok(AudioAnalysis {
                detected: false,
                volume_mean: volume.max(f32::EPSILON),
                ..AudioAnalysis::degraded(chunk.timestamp, chunk.duration_ms())
            });
        }

        let pitch_mean_hz = Self::pitch_hz(&chunk.samples, chunk.sample_rate);
        let speech_rate_wpm =
            Self::speech_rate_wpm(&chunk.samples, chunk.sample_rate, chunk.duration_ms());
        let clarity = Self::clarity(&chunk.samples)?;
        let volume_mean = volume.clamp(f32::EPSILON, 1.0);
        let (emotion, emotion_confidence) =
            Self::classify(pitch_mean_hz, speech_rate_wpm, volume_mean, clarity);

        Ok(AudioAnalysis {
            timestamp: chunk.timestamp,
            detected: true,
            emotion,
            emotion_confidence,
            speech_rate_wpm,
            pitch_mean_hz,
            volume_mean,
            clarity,
            duration_ms: chunk.duration_ms(),
        })
    }

    fn name(&self) -> &'static str {
        "dsp-features"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sine_chunk(freq: f32, seconds: f32, amplitude: f32) -> AudioChunk {
        let sample_rate = 16000u32;
        let n = (sample_rate as f32 * seconds) as usize;
        let samples: Vec<f32> = (0..n)
            .map(|i| {
                amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin()
            })
            .collect();
        AudioChunk::new(
            samples,
            sample_rate,
            Duration::from_millis((seconds * 1000.0) as u64),
        )
    }

    #[test]
    fn test_silence_not_detected() {
        let chunk = AudioChunk::new(vec![0.0; 16000], 16000, Duration::from_secs(1));
        let result = FeatureExtractor::new().extract(&chunk).unwrap();
        assert!(!result.detected);
        assert_eq!(result.emotion, VocalEmotion::Calm);
        assert!(result.volume_mean > 0.0);
    }

    #[test]
    fn test_pitch_of_sine() {
        let chunk = sine_chunk(150.0, 1.0, 0.5);
        let pitch = FeatureExtractor::pitch_hz(&chunk.samples, chunk.sample_rate);
        assert!(
            (pitch - 150.0).abs() < 10.0,
            "expected ~150 Hz, got {}",
            pitch
        );
    }

    #[test]
    fn test_sine_is_clear() {
        let chunk = sine_chunk(200.0, 0.5, 0.5);
        let clarity = FeatureExtractor::clarity(&chunk.samples).unwrap();
        assert!(clarity > 0.8, "tonal signal should be clear, got {}", clarity);
    }

    #[test]
    fn test_bounded_fields() {
        let chunk = sine_chunk(220.0, 0.5, 0.8);
        let result = FeatureExtractor::new().extract(&chunk).unwrap();
        assert!(result.detected);
        assert!((0.0..=1.0).contains(&result.emotion_confidence));
        assert!((0.0..=1.0).contains(&result.clarity));
        assert!(result.volume_mean > 0.0 && result.volume_mean <= 1.0);
        assert!(result.speech_rate_wpm >= 0.0);
        assert!(result.pitch_mean_hz >= 0.0);
    }

    #[test]
    fn test_empty_chunk_is_error() {
        let chunk = AudioChunk::new(vec![], 16000, Duration::from_millis(10));
        assert!(FeatureExtractor::new().extract(&chunk).is_err());
    }
}
