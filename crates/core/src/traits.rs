//! Capability traits for pluggable backends
//!
//! The engine never calls a concrete model directly. Detector and extractor
//! implementations live behind these traits so backends can be swapped,
//! chained for ordered fallback, or mocked in tests.

use async_trait::async_trait;

use crate::analysis::{AudioAnalysis, VideoAnalysis};
use crate::error::Result;
use crate::unit::{AudioChunk, VideoFrame};

/// Face/emotion detector backend for the video track
///
/// Implementations may block on native model calls; the analyzer offloads
/// every invocation to a worker thread. Backends are shared across sessions
/// and must be safe for concurrent invocation.
pub trait FaceDetector: Send + Sync {
    /// Analyze one frame.
    ///
    /// Fails with `Error::ModelUnavailable` or `Error::Inference`; the
    /// analyzer then advances to the next backend in the chain.
    fn detect(&self, frame: &VideoFrame) -> Result<VideoAnalysis>;

    /// Backend name recorded in results and logs.
    fn name(&self) -> &'static str;
}

/// Speech feature extractor backend for the audio track
pub trait SpeechAnalyzer: Send + Sync {
    /// Extract features from one chunk.
    fn extract(&self, chunk: &AudioChunk) -> Result<AudioAnalysis>;

    /// Backend name recorded in logs.
    fn name(&self) -> &'static str;
}

/// Send capability for outbound JSON envelopes
///
/// The external transport (a socket wrapper) implements this; the engine
/// only pushes serialized envelopes through it and never learns how the
/// session was authenticated or where events go.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Push one serialized envelope to the client.
    async fn send(&self, payload: String) -> Result<()>;
}
