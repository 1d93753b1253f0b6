//! Per-session rolling state
//!
//! Bounded rolling buffers of recent per-unit results plus cumulative
//! counters. The two modality tracks are updated independently, but the
//! aggregator only ever sees them through `snapshot()`, never a partial
//! write.

use parking_lot::Mutex;
use std::time::Duration;

use interview_engine_core::{AudioAnalysis, RollingBuffer, VideoAnalysis};

/// One modality's rolling window and cumulative counters
struct Track<T> {
    buffer: RollingBuffer<T>,
    count: u64,
    total_time: Duration,
}

impl<T> Track<T> {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: RollingBuffer::new(capacity),
            count: 0,
            total_time: Duration::ZERO,
        }
    }

    fn push(&mut self, result: T, elapsed: Duration) {
        self.buffer.push(result);
        self.count += 1;
        self.total_time += elapsed;
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.count = 0;
        self.total_time = Duration::ZERO;
    }
}

/// Consistent read of both modality windows, oldest first
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    pub video: Vec<VideoAnalysis>,
    pub audio: Vec<AudioAnalysis>,
}

/// Session-owned rolling state
pub struct SessionState {
    video: Mutex<Track<VideoAnalysis>>,
    audio: Mutex<Track<AudioAnalysis>>,
}

impl SessionState {
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            video: Mutex::new(Track::new(buffer_capacity)),
            audio: Mutex::new(Track::new(buffer_capacity)),
        }
    }

    pub fn push_video(&self, result: VideoAnalysis, elapsed: Duration) {
        self.video.lock().push(result, elapsed);
    }

    pub fn push_audio(&self, result: AudioAnalysis, elapsed: Duration) {
        self.audio.lock().push(result, elapsed);
    }

    /// Latest consistent view of both windows
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            video: self.video.lock().buffer.snapshot(),
            audio: self.audio.lock().buffer.snapshot(),
        }
    }

    /// Cumulative (count, total processing time) for the video track
    pub fn video_counters(&self) -> (u64, Duration) {
        let t = self.video.lock();
        (t.count, t.total_time)
    }

    /// Cumulative (count, total processing time) for the audio track
    pub fn audio_counters(&self) -> (u64, Duration) {
        let t = self.audio.lock();
        (t.count, t.total_time)
    }

    /// Clear both windows and counters back to the empty-session state.
    pub fn reset(&self) {
        self.video.lock().reset();
        self.audio.lock().reset();
    }
}
