//! Analysis pipeline orchestrator
//!
//! One `AnalysisPipeline` per live session. Each modality gets its own
//! worker task fed by a recency-biased bounded queue, which enforces
//! at-most-one in-flight analysis per session per modality: the single
//! consumer never starts a new unit before the previous one completes.
//!
//! Results for a stopped session are discarded rather than forcibly
//! aborted, so a native inference call is never interrupted mid-call.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use interview_engine_config::EngineConfig;
use interview_engine_core::{
    epoch_seconds, AggregatedMetrics, AudioAnalysis, AudioChunk, SpeechAnalyzer, VideoFrame,
};

use crate::aggregate::aggregate;
use crate::audio::FeatureExtractor;
use crate::perf::{Modality, PerfMonitor, PerfSummary};
use crate::queue::RecencyQueue;
use crate::state::SessionState;
use crate::video::{DetectorChain, EmotionSmoother};
use crate::PipelineError;

/// Smoothing half-life for video emotion scores, in frames
const EMOTION_HALF_LIFE_FRAMES: f32 = 3.0;

/// Events broadcast by the pipeline
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// New fused metrics are available
    MetricsUpdate {
        timestamp: f64,
        metrics: AggregatedMetrics,
    },
    /// Periodic per-session performance summary
    PerformanceSummary(PerfSummary),
}

/// Per-session analysis pipeline
pub struct AnalysisPipeline {
    session_id: String,
    state: Arc<SessionState>,
    video_queue: Arc<RecencyQueue<VideoFrame>>,
    audio_queue: Arc<RecencyQueue<AudioChunk>>,
    events: broadcast::Sender<PipelineEvent>,
    alive: Arc<AtomicBool>,
    smoother: Arc<Mutex<EmotionSmoother>>,
    perf: Arc<PerfMonitor>,
}

impl AnalysisPipeline {
    /// Create a pipeline with the built-in detector chain and extractor.
    pub fn new(session_id: impl Into<String>, config: &EngineConfig, perf: Arc<PerfMonitor>) -> Self {
        Self::with_backends(
            session_id,
            config,
            perf,
            Arc::new(DetectorChain::default_chain()),
            Arc::new(FeatureExtractor::new()),
        )
    }

    /// Create a pipeline with caller-supplied backends (used by tests and
    /// deployments with model-backed detectors).
    pub fn with_backends(
        session_id: impl Into<String>,
        config: &EngineConfig,
        perf: Arc<PerfMonitor>,
        detectors: Arc<DetectorChain>,
        speech: Arc<dyn SpeechAnalyzer>,
    ) -> Self {
        let session_id = session_id.into();
        let state = Arc::new(SessionState::new(config.buffer_capacity));
        let video_queue = Arc::new(RecencyQueue::new(config.queue_depth));
        let audio_queue = Arc::new(RecencyQueue::new(config.queue_depth));
        let (events, _) = broadcast::channel(32);
        let alive = Arc::new(AtomicBool::new(true));
        let smoother = Arc::new(Mutex::new(EmotionSmoother::new(EMOTION_HALF_LIFE_FRAMES)));
        let adapter_timeout = Duration::from_millis(config.adapter_timeout_ms);

        // Video worker
        {
            let session_id = session_id.clone();
            let queue = video_queue.clone();
            let state = state.clone();
            let events = events.clone();
            let alive = alive.clone();
            let smoother = smoother.clone();
            let perf = perf.clone();
            tokio::spawn(async move {
                while let Some(frame) = queue.pop().await {
                    if !alive.load(Ordering::Acquire) {
                        break;
                    }
                    let started = Instant::now();
                    let mut analysis = detectors.analyze(&frame, adapter_timeout).await;
                    let elapsed = started.elapsed();

                    if !alive.load(Ordering::Acquire) {
                        tracing::debug!(session_id = %session_id, "Discarding video result for stopped session");
                        break;
                    }

                    // Smooth the raw label scores before taking the arg-max
                    let (dominant, scores) = smoother.lock().apply(&analysis.emotion_scores);
                    analysis.dominant_emotion = dominant;
                    analysis.emotion_scores = scores;

                    let summary_due =
                        perf.record(&session_id, Modality::Video, elapsed, Duration::ZERO);
                    state.push_video(analysis, elapsed);

                    let metrics = aggregate(&state.snapshot());
                    let _ = events.send(PipelineEvent::MetricsUpdate {
                        timestamp: epoch_seconds(),
                        metrics,
                    });
                    if summary_due {
                        let _ = events
                            .send(PipelineEvent::PerformanceSummary(perf.snapshot(&session_id)));
                    }
                }
                tracing::debug!(session_id = %session_id, "Video worker exited");
            });
        }

        // Audio worker
        {
            let session_id = session_id.clone();
            let queue = audio_queue.clone();
            let state = state.clone();
            let events = events.clone();
            let alive = alive.clone();
            let perf = perf.clone();
            tokio::spawn(async move {
                while let Some(chunk) = queue.pop().await {
                    if !alive.load(Ordering::Acquire) {
                        break;
                    }
                    let started = Instant::now();
                    let analysis =
                        run_speech_adapter(&session_id, &speech, &chunk, adapter_timeout).await;
                    let elapsed = started.elapsed();

                    if !alive.load(Ordering::Acquire) {
                        tracing::debug!(session_id = %session_id, "Discarding audio result for stopped session");
                        break;
                    }

                    let summary_due =
                        perf.record(&session_id, Modality::Audio, elapsed, chunk.duration);
                    state.push_audio(analysis, elapsed);

                    let metrics = aggregate(&state.snapshot());
                    let _ = events.send(PipelineEvent::MetricsUpdate {
                        timestamp: epoch_seconds(),
                        metrics,
                    });
                    if summary_due {
                        let _ = events
                            .send(PipelineEvent::PerformanceSummary(perf.snapshot(&session_id)));
                    }
                }
                tracing::debug!(session_id = %session_id, "Audio worker exited");
            });
        }

        Self {
            session_id,
            state,
            video_queue,
            audio_queue,
            events,
            alive,
            smoother,
            perf,
        }
    }

    /// Enqueue a decoded video frame.
    pub fn process_video(&self, frame: VideoFrame) -> Result<(), PipelineError> {
        if !self.alive.load(Ordering::Acquire) || !self.video_queue.push(frame) {
            return Err(PipelineError::Stopped);
        }
        Ok(())
    }

    /// Enqueue a decoded audio chunk.
    pub fn process_audio(&self, chunk: AudioChunk) -> Result<(), PipelineError> {
        if !self.alive.load(Ordering::Acquire) || !self.audio_queue.push(chunk) {
            return Err(PipelineError::Stopped);
        }
        Ok(())
    }

    /// Subscribe to pipeline events.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Clear rolling state, counters, queues, and smoothing history back to
    /// the empty-session state. Idempotent.
    pub fn reset(&self) {
        self.video_queue.clear();
        self.audio_queue.clear();
        self.state.reset();
        self.smoother.lock().reset();
        tracing::debug!(session_id = %self.session_id, "Pipeline reset");
    }

    /// Stop the pipeline cooperatively. In-flight adapter calls finish but
    /// their results are discarded.
    pub fn stop(&self) {
        self.alive.store(false, Ordering::Release);
        self.video_queue.close();
        self.audio_queue.close();
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    /// Non-blocking read of this session's performance accumulators.
    pub fn performance_snapshot(&self) -> PerfSummary {
        self.perf.snapshot(&self.session_id)
    }

    /// Units evicted by the recency policy (for logs and tests).
    pub fn dropped_units(&self) -> (u64, u64) {
        (self.video_queue.dropped(), self.audio_queue.dropped())
    }
}

impl Drop for AnalysisPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run the speech adapter with offload and timeout; failure or timeout
/// yields the degraded default so extraction errors never escape the
/// analyzer boundary.
async fn run_speech_adapter(
    session_id: &str,
    speech: &Arc<dyn SpeechAnalyzer>,
    chunk: &AudioChunk,
    timeout: Duration,
) -> AudioAnalysis {
    let name = speech.name();
    let backend = speech.clone();
    let input = chunk.clone();
    let call = tokio::task::spawn_blocking(move || backend.extract(&input));

    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(Ok(analysis))) => analysis,
        Ok(Ok(Err(e))) => {
            tracing::debug!(session_id = %session_id, backend = name, error = %e, "Speech extraction failed, using degraded result");
            AudioAnalysis::degraded(chunk.timestamp, chunk.duration_ms())
        }
        Ok(Err(e)) => {
            tracing::warn!(session_id = %session_id, backend = name, error = %e, "Speech extraction task failed");
            AudioAnalysis::degraded(chunk.timestamp, chunk.duration_ms())
        }
        Err(_) => {
            tracing::warn!(
                session_id = %session_id,
                backend = name,
                timeout_ms = timeout.as_millis() as u64,
                "Speech extraction timed out"
            );
            AudioAnalysis::degraded(chunk.timestamp, chunk.duration_ms())
        }
    }
}
