//! Aggregated behavioral metric types
//!
//! Produced by the metrics aggregator from the two modality windows and
//! serialized verbatim into the outbound `analysis_update` envelope.

use serde::{Deserialize, Serialize};

/// Micro-expression scores, all in [0, 100]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicroExpressions {
    pub dominant_emotion: String,
    pub confidence: f32,
    pub tension: f32,
    pub focus: f32,
}

/// Body language scores, all in [0, 100]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyLanguage {
    pub eye_contact_ratio: f32,
    pub head_stability: f32,
    pub posture_score: f32,
}

/// Suggestion severity, ordered `Error > Warning > Info > Success`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Sort key: higher severity first.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Error => 3,
            Severity::Warning => 2,
            Severity::Info => 1,
            Severity::Success => 0,
        }
    }
}

/// Advisory message attached to an analysis update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub severity: Severity,
    pub message: String,
}

/// Fused behavioral scores for one analysis update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    pub micro_expressions: MicroExpressions,
    pub body_language: BodyLanguage,
    pub suggestions: Vec<Suggestion>,
}

impl AggregatedMetrics {
    /// Check that every bounded field is within its declared range.
    pub fn is_clamped(&self) -> bool {
        let in_range = |v: f32| (0.0..=100.0).contains(&v);
        in_range(self.micro_expressions.confidence)
            && in_range(self.micro_expressions.tension)
            && in_range(self.micro_expressions.focus)
            && in_range(self.body_language.eye_contact_ratio)
            && in_range(self.body_language.head_stability)
            && in_range(self.body_language.posture_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error.rank() > Severity::Warning.rank());
        assert!(Severity::Warning.rank() > Severity::Info.rank());
        assert!(Severity::Info.rank() > Severity::Success.rank());
    }

    #[test]
    fn test_suggestion_wire_format() {
        let s = Suggestion {
            severity: Severity::Warning,
            message: "增加眼神交流".to_string(),
        };
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["type"], "warning");
        assert_eq!(json["message"], "增加眼神交流");
    }
}
