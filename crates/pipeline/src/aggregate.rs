//! Metrics aggregator
//!
//! Pure function of the two modality windows. Deterministic given the same
//! snapshot contents, which keeps the fusion math unit-testable without any
//! pipeline machinery.

use interview_engine_core::{
    AggregatedMetrics, BodyLanguage, Emotion, MicroExpressions, Severity, Suggestion,
};

use crate::state::StateSnapshot;

/// Labels contributing to the confidence score
const POSITIVE_LABELS: [Emotion; 3] = [Emotion::Happy, Emotion::Neutral, Emotion::Surprise];
/// Labels contributing to the tension score
const NEGATIVE_LABELS: [Emotion; 3] = [Emotion::Angry, Emotion::Fear, Emotion::Sad];

/// Head pose variance normalization, degrees squared per axis
const POSE_VARIANCE_NORM: f32 = 900.0;

/// Maximum suggestions per analysis update
const MAX_SUGGESTIONS: usize = 3;

fn clamp100(v: f32) -> f32 {
    v.clamp(0.0, 100.0)
}

/// Fraction of recent frames with gaze on target, as a percentage.
fn eye_contact_ratio(video: &[interview_engine_core::VideoAnalysis]) -> f32 {
    if video.is_empty() {
        return 0.0;
    }
    let on_target = video.iter().filter(|v| v.gaze_on_target).count();
    clamp100(on_target as f32 / video.len() as f32 * 100.0)
}

/// `1 - normalized variance` of (pitch, yaw, roll) over the window.
fn head_stability(video: &[interview_engine_core::VideoAnalysis]) -> f32 {
    if video.len() < 2 {
        // A single observation has no variance to judge
        return if video.is_empty() { 0.0 } else { 100.0 };
    }

    let n = video.len() as f32;
    let axis_variance = |f: fn(&interview_engine_core::VideoAnalysis) -> f32| {
        let mean = video.iter().map(f).sum::<f32>() / n;
        video
            .iter()
            .map(|v| {
                let d = f(v) - mean;
                d * d
            })
            .sum::<f32>()
            / n
    };

    let var = (axis_variance(|v| v.head_pose.pitch)
        + axis_variance(|v| v.head_pose.yaw)
        + axis_variance(|v| v.head_pose.roll))
        / 3.0;
    let normalized = (var / POSE_VARIANCE_NORM).clamp(0.0, 1.0);
    clamp100((1.0 - normalized) * 100.0)
}

fn label_sum(scores: &std::collections::BTreeMap<Emotion, f32>, labels: &[Emotion]) -> f32 {
    labels
        .iter()
        .map(|l| scores.get(l).copied().unwrap_or(0.0))
        .sum()
}

/// Suggestion rule table, evaluated in fixed priority order; the first
/// matching rule wins per category.
fn suggestions(eye_contact: f32, tension: f32, confidence: f32) -> Vec<Suggestion> {
    let mut out = Vec::new();

    if eye_contact < 50.0 {
        out.push(Suggestion {
            severity: Severity::Warning,
            message: "增加眼神交流".to_string(),
        });
    }
    if tension > 70.0 {
        out.push(Suggestion {
            severity: Severity::Warning,
            message: "适当放松".to_string(),
        });
    }
    if confidence > 80.0 && tension < 30.0 {
        out.push(Suggestion {
            severity: Severity::Success,
            message: "表现出色".to_string(),
        });
    }
    if out.is_empty() {
        out.push(Suggestion {
            severity: Severity::Info,
            message: "继续保持".to_string(),
        });
    }

    // Highest severity first; stable so rule order breaks ties
    out.sort_by(|a, b| b.severity.rank().cmp(&a.severity.rank()));
    out.truncate(MAX_SUGGESTIONS);
    out
}

/// Fuse both modality windows into one set of behavioral scores.
pub fn aggregate(snapshot: &StateSnapshot) -> AggregatedMetrics {
    let latest_video = snapshot.video.last();

    let (dominant_emotion, confidence, video_tension) = match latest_video {
        Some(v) => (
            v.dominant_emotion.as_str().to_string(),
            clamp100(label_sum(&v.emotion_scores, &POSITIVE_LABELS)),
            clamp100(label_sum(&v.emotion_scores, &NEGATIVE_LABELS)),
        ),
        None => (Emotion::Neutral.as_str().to_string(), 0.0, 0.0),
    };

    // Blend in the audio tension proxy (inverse clarity) when speech was
    // actually detected in the latest chunk
    let tension = match snapshot.audio.last().filter(|a| a.detected) {
        Some(a) => {
            let audio_proxy = clamp100((1.0 - a.clarity) * 100.0);
            clamp100(0.7 * video_tension + 0.3 * audio_proxy)
        }
        None => video_tension,
    };

    let eye_contact = eye_contact_ratio(&snapshot.video);
    let stability = head_stability(&snapshot.video);
    let focus = clamp100(0.6 * eye_contact + 0.4 * stability);
    let posture_score = clamp100(0.5 * confidence + 0.5 * stability);

    AggregatedMetrics {
        micro_expressions: MicroExpressions {
            dominant_emotion,
            confidence,
            tension,
            focus,
        },
        body_language: BodyLanguage {
            eye_contact_ratio: eye_contact,
            head_stability: stability,
            posture_score,
        },
        suggestions: suggestions(eye_contact, tension, confidence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_engine_core::{AudioAnalysis, HeadPose, VideoAnalysis};
    use std::collections::BTreeMap;

    fn video(dominant: Emotion, scores: &[(Emotion, f32)], gaze: bool, pose: HeadPose) -> VideoAnalysis {
        VideoAnalysis {
            timestamp: 0.0,
            detected: true,
            dominant_emotion: dominant,
            emotion_scores: scores.iter().copied().collect::<BTreeMap<_, _>>(),
            head_pose: pose,
            gaze_on_target: gaze,
            quality_flags: Vec::new(),
            backend: "test",
        }
    }

    fn happy_window(n: usize, gaze: bool) -> Vec<VideoAnalysis> {
        (0..n)
            .map(|_| {
                video(
                    Emotion::Happy,
                    &[(Emotion::Happy, 90.0), (Emotion::Neutral, 10.0)],
                    gaze,
                    HeadPose::default(),
                )
            })
            .collect()
    }

    #[test]
    fn test_empty_snapshot_is_neutral() {
        let m = aggregate(&StateSnapshot::default());
        assert_eq!(m.micro_expressions.dominant_emotion, "neutral");
        assert_eq!(m.micro_expressions.confidence, 0.0);
        assert!(m.is_clamped());
        assert_eq!(m.suggestions.len(), 1);
        assert_eq!(m.suggestions[0].severity, Severity::Info);
    }

    #[test]
    fn test_happy_window_scores() {
        let snap = StateSnapshot {
            video: happy_window(5, true),
            audio: vec![],
        };
        let m = aggregate(&snap);
        assert_eq!(m.micro_expressions.dominant_emotion, "happy");
        assert!((m.micro_expressions.confidence - 100.0).abs() < 0.01);
        assert_eq!(m.micro_expressions.tension, 0.0);
        assert_eq!(m.body_language.eye_contact_ratio, 100.0);
        assert_eq!(m.body_language.head_stability, 100.0);
        assert!(m.is_clamped());
    }

    #[test]
    fn test_tension_blends_audio_proxy() {
        let mut audio = AudioAnalysis::degraded(0.0, 1000);
        audio.detected = true;
        audio.clarity = 0.0; // proxy 100

        let snap = StateSnapshot {
            video: vec![video(
                Emotion::Angry,
                &[(Emotion::Angry, 50.0)],
                true,
                HeadPose::default(),
            )],
            audio: vec![audio],
        };
        let m = aggregate(&snap);
        // 0.7 * 50 + 0.3 * 100 = 65
        assert!((m.micro_expressions.tension - 65.0).abs() < 0.01);
    }

    #[test]
    fn test_undetected_audio_not_blended() {
        let snap = StateSnapshot {
            video: vec![video(
                Emotion::Angry,
                &[(Emotion::Angry, 50.0)],
                true,
                HeadPose::default(),
            )],
            audio: vec![AudioAnalysis::degraded(0.0, 1000)],
        };
        let m = aggregate(&snap);
        assert!((m.micro_expressions.tension - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_unstable_head_lowers_stability() {
        let poses = [
            HeadPose { pitch: -40.0, yaw: 40.0, roll: 0.0 },
            HeadPose { pitch: 40.0, yaw: -40.0, roll: 0.0 },
            HeadPose { pitch: -40.0, yaw: 40.0, roll: 0.0 },
            HeadPose { pitch: 40.0, yaw: -40.0, roll: 0.0 },
        ];
        let snap = StateSnapshot {
            video: poses
                .iter()
                .map(|p| video(Emotion::Neutral, &[(Emotion::Neutral, 100.0)], true, *p))
                .collect(),
            audio: vec![],
        };
        let m = aggregate(&snap);
        assert!(m.body_language.head_stability < 50.0);
        assert!(m.is_clamped());
    }

    #[test]
    fn test_low_eye_contact_warning_ordered_first() {
        let mut window = happy_window(5, false); // gaze off target
        window.extend(happy_window(2, true));
        let snap = StateSnapshot {
            video: window,
            audio: vec![],
        };
        let m = aggregate(&snap);
        assert!(m.body_language.eye_contact_ratio < 50.0);
        let warning = m
            .suggestions
            .iter()
            .position(|s| s.severity == Severity::Warning && s.message.contains("眼神"))
            .expect("eye contact warning present");
        for (i, s) in m.suggestions.iter().enumerate() {
            if matches!(s.severity, Severity::Info | Severity::Success) {
                assert!(warning < i, "warning must precede info/success");
            }
        }
    }

    #[test]
    fn test_success_when_confident_and_relaxed() {
        let snap = StateSnapshot {
            video: happy_window(5, true),
            audio: vec![],
        };
        let m = aggregate(&snap);
        assert!(m
            .suggestions
            .iter()
            .any(|s| s.severity == Severity::Success));
    }

    #[test]
    fn test_at_most_three_suggestions() {
        // Force both warnings plus the fallback path
        let snap = StateSnapshot {
            video: vec![video(
                Emotion::Angry,
                &[(Emotion::Angry, 95.0)],
                false,
                HeadPose::default(),
            )],
            audio: vec![],
        };
        let m = aggregate(&snap);
        assert!(m.suggestions.len() <= 3);
        // Severity is non-increasing through the list
        for pair in m.suggestions.windows(2) {
            assert!(pair[0].severity.rank() >= pair[1].severity.rank());
        }
    }
}
