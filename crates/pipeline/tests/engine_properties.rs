//! End-to-end pipeline behavior tests with instrumented backends.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use interview_engine_config::EngineConfig;
use interview_engine_core::{
    AudioAnalysis, AudioChunk, Emotion, FaceDetector, HeadPose, Result as CoreResult,
    SpeechAnalyzer, VideoAnalysis, VideoFrame,
};
use interview_engine_pipeline::{
    AnalysisPipeline, DetectorChain, FeatureExtractor, PerfMonitor, PipelineError, PipelineEvent,
};

/// Detector that reports a fixed emotion and tracks concurrent invocations.
struct ScriptedDetector {
    emotion: Emotion,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    delay: Duration,
}

impl ScriptedDetector {
    fn new(emotion: Emotion, delay: Duration) -> Self {
        Self {
            emotion,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            delay,
        }
    }
}

impl FaceDetector for ScriptedDetector {
    fn detect(&self, frame: &VideoFrame) -> CoreResult<VideoAnalysis> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut scores = BTreeMap::new();
        scores.insert(self.emotion, 90.0);
        scores.insert(Emotion::Neutral, 10.0);
        Ok(VideoAnalysis {
            timestamp: frame.timestamp,
            detected: true,
            dominant_emotion: self.emotion,
            emotion_scores: scores,
            head_pose: HeadPose::default(),
            gaze_on_target: true,
            quality_flags: Vec::new(),
            backend: "scripted",
        })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

struct NullSpeech;

impl SpeechAnalyzer for NullSpeech {
    fn extract(&self, chunk: &AudioChunk) -> CoreResult<AudioAnalysis> {
        Ok(AudioAnalysis::degraded(chunk.timestamp, chunk.duration_ms()))
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

fn perf() -> Arc<PerfMonitor> {
    Arc::new(PerfMonitor::new(Duration::from_secs(3600), 1_000_000))
}

fn frame() -> VideoFrame {
    let luma: Vec<u8> = (0..32 * 32).map(|i| (i % 251) as u8).collect();
    VideoFrame::new(luma, 32, 32)
}

fn pipeline_with(
    config: &EngineConfig,
    detector: Arc<ScriptedDetector>,
) -> AnalysisPipeline {
    AnalysisPipeline::with_backends(
        "test-session",
        config,
        perf(),
        Arc::new(DetectorChain::new(vec![detector])),
        Arc::new(NullSpeech),
    )
}

/// Wait for up to `n` metric updates, returning the last one seen.
async fn drain_updates(
    rx: &mut tokio::sync::broadcast::Receiver<PipelineEvent>,
    n: usize,
) -> Option<interview_engine_core::AggregatedMetrics> {
    let mut last = None;
    for _ in 0..n {
        match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Ok(PipelineEvent::MetricsUpdate { metrics, .. })) => last = Some(metrics),
            Ok(Ok(_)) => {}
            _ => break,
        }
    }
    last
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sustained_happy_input_converges() {
    let detector = Arc::new(ScriptedDetector::new(Emotion::Happy, Duration::ZERO));
    let pipeline = pipeline_with(&EngineConfig::default(), detector);
    let mut rx = pipeline.subscribe();

    for _ in 0..5 {
        pipeline.process_video(frame()).unwrap();
        // Pace the feed so nothing is evicted by the recency policy
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let metrics = drain_updates(&mut rx, 5).await.expect("metrics emitted");
    assert_eq!(metrics.micro_expressions.dominant_emotion, "happy");
    assert!(metrics.micro_expressions.confidence > 80.0);
    assert!(metrics.micro_expressions.tension < 10.0);
    assert!(metrics.is_clamped());
    assert_eq!(pipeline.dropped_units(), (0, 0));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_at_most_one_video_analysis_in_flight() {
    let detector = Arc::new(ScriptedDetector::new(
        Emotion::Neutral,
        Duration::from_millis(30),
    ));
    let max_in_flight = detector.max_in_flight.clone();
    let pipeline = pipeline_with(&EngineConfig::default(), detector);
    let mut rx = pipeline.subscribe();

    // Flood faster than the detector can drain
    for _ in 0..10 {
        let _ = pipeline.process_video(frame());
    }
    drain_updates(&mut rx, 4).await;

    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_recency_policy_evicts_oldest() {
    let detector = Arc::new(ScriptedDetector::new(
        Emotion::Neutral,
        Duration::from_millis(50),
    ));
    let mut config = EngineConfig::default();
    config.queue_depth = 2;
    let pipeline = pipeline_with(&config, detector);

    for _ in 0..10 {
        pipeline.process_video(frame()).unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (video_dropped, _) = pipeline.dropped_units();
    assert!(video_dropped > 0, "flooding must trigger eviction");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reset_is_idempotent() {
    let detector = Arc::new(ScriptedDetector::new(Emotion::Happy, Duration::ZERO));
    let pipeline = pipeline_with(&EngineConfig::default(), detector);
    let mut rx = pipeline.subscribe();

    pipeline.process_video(frame()).unwrap();
    drain_updates(&mut rx, 1).await.expect("one update");

    pipeline.reset();
    pipeline.reset();

    let snap = pipeline.state().snapshot();
    assert!(snap.video.is_empty());
    assert!(snap.audio.is_empty());
    assert!(pipeline.is_alive(), "reset must not stop the pipeline");

    // Still accepts and processes input afterward
    pipeline.process_video(frame()).unwrap();
    assert!(drain_updates(&mut rx, 1).await.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_rejects_further_input() {
    let detector = Arc::new(ScriptedDetector::new(Emotion::Neutral, Duration::ZERO));
    let pipeline = pipeline_with(&EngineConfig::default(), detector);

    pipeline.stop();
    assert!(!pipeline.is_alive());
    assert!(matches!(
        pipeline.process_video(frame()),
        Err(PipelineError::Stopped)
    ));
    let chunk = AudioChunk::new(vec![0.0; 160], 16000, Duration::from_millis(10));
    assert!(matches!(
        pipeline.process_audio(chunk),
        Err(PipelineError::Stopped)
    ));

    // Stop is idempotent
    pipeline.stop();
    assert!(!pipeline.is_alive());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_audio_path_updates_metrics() {
    let detector = Arc::new(ScriptedDetector::new(Emotion::Neutral, Duration::ZERO));
    let pipeline = AnalysisPipeline::with_backends(
        "audio-session",
        &EngineConfig::default(),
        perf(),
        Arc::new(DetectorChain::new(vec![detector])),
        Arc::new(FeatureExtractor::new()),
    );
    let mut rx = pipeline.subscribe();

    let samples: Vec<f32> = (0..16000)
        .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 150.0 * i as f32 / 16000.0).sin())
        .collect();
    let chunk = AudioChunk::new(samples, 16000, Duration::from_secs(1));
    pipeline.process_audio(chunk).unwrap();

    let metrics = drain_updates(&mut rx, 1).await.expect("audio metrics");
    assert!(metrics.is_clamped());

    let (count, _) = pipeline.state().audio_counters();
    assert_eq!(count, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_performance_summary_due_by_units() {
    let detector = Arc::new(ScriptedDetector::new(Emotion::Neutral, Duration::ZERO));
    let monitor = Arc::new(PerfMonitor::new(Duration::from_secs(3600), 3));
    let pipeline = AnalysisPipeline::with_backends(
        "perf-session",
        &EngineConfig::default(),
        monitor,
        Arc::new(DetectorChain::new(vec![detector])),
        Arc::new(NullSpeech),
    );
    let mut rx = pipeline.subscribe();

    let mut saw_summary = false;
    for _ in 0..4 {
        pipeline.process_video(frame()).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    for _ in 0..8 {
        match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Ok(PipelineEvent::PerformanceSummary(summary))) => {
                saw_summary = true;
                let video = summary.video.expect("video stats present");
                assert!(video.count >= 3);
                assert!(video.fps.is_some());
                break;
            }
            Ok(Ok(_)) => {}
            _ => break,
        }
    }
    assert!(saw_summary, "summary must be emitted after 3 units");
}
