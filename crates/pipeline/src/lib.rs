//! Real-time multimodal analysis pipeline
//!
//! One `AnalysisPipeline` per live session. Inbound units (decoded video
//! frames and audio chunks) flow through bounded recency-biased queues into
//! per-modality worker tasks, which drive the detector/extractor backends
//! with ordered fallback, update the session's rolling state, and broadcast
//! fused behavioral metrics.

pub mod aggregate;
pub mod audio;
pub mod codec;
pub mod orchestrator;
pub mod perf;
pub mod queue;
pub mod state;
pub mod video;

pub use aggregate::aggregate;
pub use audio::FeatureExtractor;
pub use codec::{decode_audio, decode_video};
pub use orchestrator::{AnalysisPipeline, PipelineEvent};
pub use perf::{Modality, ModalitySummary, PerfMonitor, PerfRating, PerfSummary};
pub use queue::RecencyQueue;
pub use state::{SessionState, StateSnapshot};
pub use video::{DetectorChain, EmotionSmoother};

use thiserror::Error;

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The pipeline no longer accepts units; the session is closing.
    #[error("Pipeline stopped")]
    Stopped,
}
