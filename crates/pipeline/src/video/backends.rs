//! Face/emotion detector backends and the ordered fallback chain
//!
//! The built-in backends are luma-statistics heuristics standing behind the
//! same `FaceDetector` trait a model-backed detector would implement. The
//! chain tries backends in order; if every backend fails (or times out) it
//! returns the degraded default carrying the frame's quality flags, so the
//! failure never propagates past the analyzer boundary.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use interview_engine_core::{
    Emotion, Error, FaceDetector, HeadPose, Result, VideoAnalysis, VideoFrame,
};

use super::quality::assess_quality;

/// Scale emotion scores so they sum to 100.
fn normalize_scores(mut scores: BTreeMap<Emotion, f32>) -> BTreeMap<Emotion, f32> {
    let sum: f32 = scores.values().sum();
    if sum > 0.0 {
        for v in scores.values_mut() {
            *v = (*v / sum * 100.0).clamp(0.0, 100.0);
        }
    } else {
        scores.insert(Emotion::Neutral, 100.0);
    }
    scores
}

fn argmax(scores: &BTreeMap<Emotion, f32>) -> Emotion {
    scores
        .iter()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(e, _)| *e)
        .unwrap_or(Emotion::Neutral)
}

/// Primary backend: center-weighted luma statistics
///
/// Treats the middle half of the frame as the face region. Detection
/// requires texture there; pose is estimated from brightness asymmetry
/// between frame halves.
pub struct CenterWeightedDetector {
    /// Minimum center-region brightness std for a detection
    texture_floor: f32,
}

impl CenterWeightedDetector {
    pub fn new() -> Self {
        Self { texture_floor: 10.0 }
    }

    fn region_stats(frame: &VideoFrame, x0: u32, x1: u32, y0: u32, y1: u32) -> (f32, f32) {
        let w = frame.width as usize;
        let mut sum = 0.0f64;
        let mut count = 0u64;
        for y in y0..y1 {
            for x in x0..x1 {
                sum += frame.luma[y as usize * w + x as usize] as f64;
                count += 1;
            }
        }
        if count == 0 {
            return (0.0, 0.0);
        }
        let mean = (sum / count as f64) as f32;
        let mut var = 0.0f64;
        for y in y0..y1 {
            for x in x0..x1 {
                let d = frame.luma[y as usize * w + x as usize] as f32 - mean;
                var += (d * d) as f64;
            }
        }
        (mean, ((var / count as f64) as f32).sqrt())
    }
}

impl Default for CenterWeightedDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceDetector for CenterWeightedDetector {
    fn detect(&self, frame: &VideoFrame) -> Result<VideoAnalysis> {
        let (w, h) = (frame.width, frame.height);
        if w < 8 || h < 8 {
            return Err(Error::Inference("frame too small".to_string()));
        }

        let (center_mean, center_std) =
            Self::region_stats(frame, w / 4, 3 * w / 4, h / 4, 3 * h / 4);
        if center_std < self.texture_floor {
            return Err(Error::Inference("no textured center region".to_string()));
        }

        let (left_mean, _) = Self::region_stats(frame, 0, w / 2, 0, h);
        let (right_mean, _) = Self::region_stats(frame, w / 2, w, 0, h);
        let (top_mean, _) = Self::region_stats(frame, 0, w, 0, h / 2);
        let (bottom_mean, _) = Self::region_stats(frame, 0, w, h / 2, h);

        let yaw = (right_mean - left_mean) / 255.0 * 45.0;
        let pitch = (bottom_mean - top_mean) / 255.0 * 45.0;
        let roll = (center_mean - (left_mean + right_mean) / 2.0) / 255.0 * 10.0;
        let gaze_on_target = yaw.abs() < 15.0 && pitch.abs() < 12.0;

        let brightness = (center_mean / 255.0).clamp(0.0, 1.0);
        let contrast = (center_std / 64.0).clamp(0.0, 1.0);

        let mut scores = BTreeMap::new();
        scores.insert(Emotion::Neutral, 30.0);
        scores.insert(Emotion::Happy, 40.0 * brightness * contrast);
        scores.insert(Emotion::Sad, 30.0 * (1.0 - brightness));
        scores.insert(Emotion::Angry, 25.0 * contrast * (1.0 - brightness));
        scores.insert(Emotion::Surprise, 20.0 * contrast);
        scores.insert(Emotion::Fear, 10.0 * (1.0 - contrast));
        scores.insert(Emotion::Disgust, 5.0 * contrast * (1.0 - brightness));
        let scores = normalize_scores(scores);

        Ok(VideoAnalysis {
            timestamp: frame.timestamp,
            detected: true,
            dominant_emotion: argmax(&scores),
            emotion_scores: scores,
            head_pose: HeadPose { pitch, yaw, roll },
            gaze_on_target,
            quality_flags: Vec::new(),
            backend: self.name(),
        })
    }

    fn name(&self) -> &'static str {
        "center-luma"
    }
}

/// Fallback backend: global luma histogram
///
/// Coarser than the center-weighted variant; used when the primary fails.
pub struct HistogramDetector;

impl FaceDetector for HistogramDetector {
    fn detect(&self, frame: &VideoFrame) -> Result<VideoAnalysis> {
        if frame.luma.is_empty() {
            return Err(Error::Inference("empty frame".to_string()));
        }

        let mut bins = [0u64; 32];
        for &p in frame.luma.iter() {
            bins[(p / 8) as usize] += 1;
        }
        let total = frame.luma.len() as f64;
        let entropy: f64 = bins
            .iter()
            .filter(|&&c| c > 0)
            .map(|&c| {
                let p = c as f64 / total;
                -p * p.log2()
            })
            .sum();

        if entropy < 2.0 {
            return Err(Error::Inference("insufficient luma entropy".to_string()));
        }

        // Brightness centroid offset from frame center stands in for gaze
        let (w, h) = (frame.width as f64, frame.height as f64);
        let mut wx = 0.0f64;
        let mut wy = 0.0f64;
        let mut weight = 0.0f64;
        for (i, &p) in frame.luma.iter().enumerate() {
            let x = (i % frame.width as usize) as f64;
            let y = (i / frame.width as usize) as f64;
            wx += x * p as f64;
            wy += y * p as f64;
            weight += p as f64;
        }
        let (cx, cy) = if weight > 0.0 {
            (wx / weight, wy / weight)
        } else {
            (w / 2.0, h / 2.0)
        };
        let yaw = ((cx / w) - 0.5) as f32 * 60.0;
        let pitch = ((cy / h) - 0.5) as f32 * 60.0;
        let gaze_on_target = yaw.abs() < 15.0 && pitch.abs() < 12.0;

        let spread = (entropy / 5.0).clamp(0.0, 1.0) as f32;
        let mut scores = BTreeMap::new();
        scores.insert(Emotion::Neutral, 60.0);
        scores.insert(Emotion::Happy, 20.0 * spread);
        scores.insert(Emotion::Sad, 10.0 * (1.0 - spread));
        scores.insert(Emotion::Surprise, 10.0 * spread);
        let scores = normalize_scores(scores);

        Ok(VideoAnalysis {
            timestamp: frame.timestamp,
            detected: true,
            dominant_emotion: argmax(&scores),
            emotion_scores: scores,
            head_pose: HeadPose {
                pitch,
                yaw,
                roll: 0.0,
            },
            gaze_on_target,
            quality_flags: Vec::new(),
            backend: self.name(),
        })
    }

    fn name(&self) -> &'static str {
        "luma-histogram"
    }
}

/// Ordered fallback chain over detector backends
///
/// Backends are shared, read-mostly, across all sessions. `analyze` never
/// fails: exhaustion yields the degraded default with the captured quality
/// flags.
pub struct DetectorChain {
    backends: Vec<Arc<dyn FaceDetector>>,
}

impl DetectorChain {
    pub fn new(backends: Vec<Arc<dyn FaceDetector>>) -> Self {
        Self { backends }
    }

    /// Built-in heuristic backends in preference order.
    pub fn default_chain() -> Self {
        Self::new(vec![
            Arc::new(CenterWeightedDetector::new()),
            Arc::new(HistogramDetector),
        ])
    }

    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    /// Run the chain on one frame.
    ///
    /// Each backend call is offloaded to the blocking pool and bounded by
    /// `timeout`; a timeout is treated as a backend failure. A timed-out
    /// native call is not interrupted mid-call, its eventual result is
    /// simply ignored.
    pub async fn analyze(&self, frame: &VideoFrame, timeout: Duration) -> VideoAnalysis {
        let report = assess_quality(frame);

        for backend in &self.backends {
            let name = backend.name();
            let b = Arc::clone(backend);
            let f = frame.clone();
            let call = tokio::task::spawn_blocking(move || b.detect(&f));

            match tokio::time::timeout(timeout, call).await {
                Ok(Ok(Ok(mut result))) => {
                    result.quality_flags = report.flags.clone();
                    result.backend = name;
                    return result;
                }
                Ok(Ok(Err(e))) => {
                    tracing::debug!(backend = name, error = %e, "Detector backend failed, advancing");
                }
                Ok(Err(e)) => {
                    tracing::warn!(backend = name, error = %e, "Detector task failed, advancing");
                }
                Err(_) => {
                    tracing::warn!(
                        backend = name,
                        timeout_ms = timeout.as_millis() as u64,
                        "Detector backend timed out, advancing"
                    );
                }
            }
        }

        tracing::debug!(
            flags = ?report.flags,
            "All detector backends exhausted, returning degraded result"
        );
        VideoAnalysis::degraded(frame.timestamp, report.flags)
    }
}
