//! Core traits and types for the interview analysis engine
//!
//! This crate provides foundational types used across all other crates:
//! - Decoded unit types (video frames, audio chunks)
//! - Per-modality analysis result types
//! - Aggregated behavioral metric types
//! - The fixed-capacity rolling buffer used for smoothing
//! - Capability traits for pluggable detector/extractor backends
//! - Error types

pub mod analysis;
pub mod buffer;
pub mod error;
pub mod metrics;
pub mod traits;
pub mod unit;

pub use analysis::{
    AudioAnalysis, Emotion, HeadPose, QualityFlag, VideoAnalysis, VocalEmotion,
};
pub use buffer::RollingBuffer;
pub use error::{Error, Result};
pub use metrics::{AggregatedMetrics, BodyLanguage, MicroExpressions, Severity, Suggestion};
pub use traits::{EventSink, FaceDetector, SpeechAnalyzer};
pub use unit::{AudioChunk, VideoFrame};

/// Current wall-clock time as fractional epoch seconds, as carried in
/// outbound envelopes and analysis timestamps.
pub fn epoch_seconds() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
