//! Per-modality analysis result types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Facial emotion labels
///
/// Fixed vocabulary shared by all detector backends. `Neutral` is the
/// degraded default when detection fails.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    #[default]
    Neutral,
    Happy,
    Sad,
    Angry,
    Surprise,
    Fear,
    Disgust,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Neutral,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Surprise,
        Emotion::Fear,
        Emotion::Disgust,
    ];

    /// Lowercase wire name, matching the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Surprise => "surprise",
            Emotion::Fear => "fear",
            Emotion::Disgust => "disgust",
        }
    }
}

/// Vocal emotion labels for the audio track
///
/// `Calm` is the degraded default when extraction fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VocalEmotion {
    #[default]
    Calm,
    Excited,
    Stressed,
    Flat,
}

/// Head pose angles in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct HeadPose {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

/// Frame quality diagnostics
///
/// Computed independently of detection so upstream diagnostics remain
/// available even when every backend fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    TooDark,
    TooBright,
    Blurry,
}

/// Result of analyzing one video frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoAnalysis {
    /// Fractional epoch seconds
    pub timestamp: f64,
    /// Whether a face was detected
    pub detected: bool,
    /// Dominant emotion after smoothing
    pub dominant_emotion: Emotion,
    /// Per-label scores in [0, 100]
    pub emotion_scores: BTreeMap<Emotion, f32>,
    /// Estimated head pose
    pub head_pose: HeadPose,
    /// Whether gaze is on the camera/screen target
    pub gaze_on_target: bool,
    /// Frame quality diagnostics
    pub quality_flags: Vec<QualityFlag>,
    /// Which detector backend produced this result
    pub backend: &'static str,
}

impl VideoAnalysis {
    /// Degraded default: no detection, neutral label, quality flags kept.
    pub fn degraded(timestamp: f64, quality_flags: Vec<QualityFlag>) -> Self {
        let mut emotion_scores = BTreeMap::new();
        emotion_scores.insert(Emotion::Neutral, 100.0);
        Self {
            timestamp,
            detected: false,
            dominant_emotion: Emotion::Neutral,
            emotion_scores,
            head_pose: HeadPose::default(),
            gaze_on_target: false,
            quality_flags,
            backend: "none",
        }
    }
}

/// Result of analyzing one audio chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioAnalysis {
    /// Fractional epoch seconds
    pub timestamp: f64,
    /// Whether speech was detected
    pub detected: bool,
    /// Vocal emotion label
    pub emotion: VocalEmotion,
    /// Confidence in the emotion label, [0, 1]
    pub emotion_confidence: f32,
    /// Estimated speech rate in words per minute, >= 0
    pub speech_rate_wpm: f32,
    /// Mean fundamental frequency in Hz, >= 0
    pub pitch_mean_hz: f32,
    /// Mean volume, (0, 1]
    pub volume_mean: f32,
    /// Articulation clarity, [0, 1]
    pub clarity: f32,
    /// Source chunk duration in milliseconds
    pub duration_ms: u64,
}

impl AudioAnalysis {
    /// Degraded default: no detection, calm label, zeroed features.
    pub fn degraded(timestamp: f64, duration_ms: u64) -> Self {
        Self {
            timestamp,
            detected: false,
            emotion: VocalEmotion::Calm,
            emotion_confidence: 0.0,
            speech_rate_wpm: 0.0,
            pitch_mean_hz: 0.0,
            volume_mean: f32::EPSILON,
            clarity: 0.0,
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emotion_default_is_neutral() {
        assert_eq!(Emotion::default(), Emotion::Neutral);
        assert_eq!(VocalEmotion::default(), VocalEmotion::Calm);
    }

    #[test]
    fn test_emotion_wire_names() {
        let json = serde_json::to_string(&Emotion::Surprise).unwrap();
        assert_eq!(json, "\"surprise\"");
        assert_eq!(Emotion::Surprise.as_str(), "surprise");
    }

    #[test]
    fn test_degraded_video_defaults() {
        let r = VideoAnalysis::degraded(0.0, vec![QualityFlag::TooDark]);
        assert!(!r.detected);
        assert_eq!(r.dominant_emotion, Emotion::Neutral);
        assert_eq!(r.quality_flags, vec![QualityFlag::TooDark]);
    }
}
