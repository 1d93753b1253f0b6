//! Performance monitor
//!
//! Times every adapter call, keeps per-session and process-wide
//! accumulators, classifies each modality against fixed latency thresholds,
//! and decides when a periodic summary is due (every N seconds or M
//! processed units, whichever first).
//!
//! The process-wide accumulator is the only cross-session mutable shared
//! state in the engine; per-session accumulators are detached when the
//! session closes, process-wide ones persist.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Video avg latency below this is excellent
const VIDEO_EXCELLENT_MS: f64 = 10.0;
/// Video avg latency below this is acceptable
const VIDEO_ACCEPTABLE_MS: f64 = 33.0;
/// Audio real-time ratio above this is excellent
const AUDIO_EXCELLENT_RATIO: f64 = 10.0;
/// Audio real-time ratio above this is acceptable
const AUDIO_ACCEPTABLE_RATIO: f64 = 1.0;

/// Operation kind being timed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Video,
    Audio,
}

/// Performance classification against fixed thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerfRating {
    Excellent,
    Acceptable,
    Degraded,
}

#[derive(Debug, Clone, Default)]
struct Accum {
    count: u64,
    total: Duration,
    min: Option<Duration>,
    max: Duration,
    /// Total input unit duration, for the audio real-time ratio
    unit_total: Duration,
}

impl Accum {
    fn record(&mut self, elapsed: Duration, unit_duration: Duration) {
        self.count += 1;
        self.total += elapsed;
        self.min = Some(self.min.map_or(elapsed, |m| m.min(elapsed)));
        self.max = self.max.max(elapsed);
        self.unit_total += unit_duration;
    }

    fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.total.as_secs_f64() * 1000.0 / self.count as f64
    }

    fn summarize(&self, modality: Modality) -> Option<ModalitySummary> {
        if self.count == 0 {
            return None;
        }
        let avg_ms = self.avg_ms();
        let (fps, real_time_ratio, rating) = match modality {
            Modality::Video => {
                let fps = if avg_ms > 0.0 { 1000.0 / avg_ms } else { 0.0 };
                let rating = if avg_ms < VIDEO_EXCELLENT_MS {
                    PerfRating::Excellent
                } else if avg_ms < VIDEO_ACCEPTABLE_MS {
                    PerfRating::Acceptable
                } else {
                    PerfRating::Degraded
                };
                (Some(fps), None, rating)
            }
            Modality::Audio => {
                let unit_avg_ms = self.unit_total.as_secs_f64() * 1000.0 / self.count as f64;
                let ratio = if avg_ms > 0.0 { unit_avg_ms / avg_ms } else { 0.0 };
                let rating = if ratio > AUDIO_EXCELLENT_RATIO {
                    PerfRating::Excellent
                } else if ratio > AUDIO_ACCEPTABLE_RATIO {
                    PerfRating::Acceptable
                } else {
                    PerfRating::Degraded
                };
                (None, Some(ratio), rating)
            }
        };

        Some(ModalitySummary {
            count: self.count,
            avg_ms,
            min_ms: self.min.unwrap_or_default().as_secs_f64() * 1000.0,
            max_ms: self.max.as_secs_f64() * 1000.0,
            fps,
            real_time_ratio,
            rating,
        })
    }
}

/// One modality's summarized statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModalitySummary {
    pub count: u64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    /// Derived frame rate, video only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    /// Unit-duration / processing-duration, audio only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_time_ratio: Option<f64>,
    pub rating: PerfRating,
}

/// Summary of both modalities, as carried in the `performance_summary`
/// envelope
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PerfSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<ModalitySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<ModalitySummary>,
}

struct SessionAccum {
    video: Accum,
    audio: Accum,
    last_summary: Instant,
    units_since_summary: u64,
}

impl SessionAccum {
    fn new() -> Self {
        Self {
            video: Accum::default(),
            audio: Accum::default(),
            last_summary: Instant::now(),
            units_since_summary: 0,
        }
    }
}

/// Cross-cutting performance monitor shared by all sessions
pub struct PerfMonitor {
    sessions: DashMap<String, SessionAccum>,
    global: Mutex<(Accum, Accum)>, // (video, audio)
    summary_interval: Duration,
    summary_every_units: u64,
}

impl PerfMonitor {
    pub fn new(summary_interval: Duration, summary_every_units: u64) -> Self {
        Self {
            sessions: DashMap::new(),
            global: Mutex::new((Accum::default(), Accum::default())),
            summary_interval,
            summary_every_units: summary_every_units.max(1),
        }
    }

    /// Record one timed adapter call.
    ///
    /// Returns `true` when a periodic summary is due for this session; the
    /// due-counter resets on return.
    pub fn record(
        &self,
        session_id: &str,
        modality: Modality,
        elapsed: Duration,
        unit_duration: Duration,
    ) -> bool {
        {
            let mut global = self.global.lock();
            match modality {
                Modality::Video => global.0.record(elapsed, unit_duration),
                Modality::Audio => global.1.record(elapsed, unit_duration),
            }
        }

        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(SessionAccum::new);
        match modality {
            Modality::Video => entry.video.record(elapsed, unit_duration),
            Modality::Audio => entry.audio.record(elapsed, unit_duration),
        }
        entry.units_since_summary += 1;

        let due = entry.units_since_summary >= self.summary_every_units
            || entry.last_summary.elapsed() >= self.summary_interval;
        if due {
            entry.units_since_summary = 0;
            entry.last_summary = Instant::now();
        }
        due
    }

    /// Non-blocking read of one session's accumulators.
    pub fn snapshot(&self, session_id: &str) -> PerfSummary {
        match self.sessions.get(session_id) {
            Some(entry) => PerfSummary {
                video: entry.video.summarize(Modality::Video),
                audio: entry.audio.summarize(Modality::Audio),
            },
            None => PerfSummary::default(),
        }
    }

    /// Non-blocking read of the process-wide accumulators.
    pub fn global_snapshot(&self) -> PerfSummary {
        let global = self.global.lock();
        PerfSummary {
            video: global.0.summarize(Modality::Video),
            audio: global.1.summarize(Modality::Audio),
        }
    }

    /// Detach a closed session's accumulators. Process-wide totals persist.
    pub fn detach(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> PerfMonitor {
        PerfMonitor::new(Duration::from_secs(3600), 1000)
    }

    #[test]
    fn test_video_fps_and_rating() {
        let m = monitor();
        for _ in 0..10 {
            m.record("s1", Modality::Video, Duration::from_millis(5), Duration::ZERO);
        }
        let summary = m.snapshot("s1").video.unwrap();
        assert_eq!(summary.count, 10);
        assert!((summary.avg_ms - 5.0).abs() < 0.5);
        assert!((summary.fps.unwrap() - 200.0).abs() < 20.0);
        assert_eq!(summary.rating, PerfRating::Excellent);
    }

    #[test]
    fn test_audio_real_time_ratio() {
        let m = monitor();
        // 3000 ms of audio processed in 10 ms => ratio ~300
        m.record(
            "s1",
            Modality::Audio,
            Duration::from_millis(10),
            Duration::from_millis(3000),
        );
        let summary = m.snapshot("s1").audio.unwrap();
        let ratio = summary.real_time_ratio.unwrap();
        assert!((ratio - 300.0).abs() < 5.0, "got {}", ratio);
        assert_eq!(summary.rating, PerfRating::Excellent);
    }

    #[test]
    fn test_degraded_ratings() {
        let m = monitor();
        m.record("s1", Modality::Video, Duration::from_millis(50), Duration::ZERO);
        assert_eq!(m.snapshot("s1").video.unwrap().rating, PerfRating::Degraded);

        // Slower than real time
        m.record(
            "s1",
            Modality::Audio,
            Duration::from_millis(500),
            Duration::from_millis(100),
        );
        assert_eq!(m.snapshot("s1").audio.unwrap().rating, PerfRating::Degraded);
    }

    #[test]
    fn test_summary_due_by_unit_count() {
        let m = PerfMonitor::new(Duration::from_secs(3600), 3);
        assert!(!m.record("s1", Modality::Video, Duration::from_millis(1), Duration::ZERO));
        assert!(!m.record("s1", Modality::Video, Duration::from_millis(1), Duration::ZERO));
        assert!(m.record("s1", Modality::Video, Duration::from_millis(1), Duration::ZERO));
        // Counter reset after emission
        assert!(!m.record("s1", Modality::Video, Duration::from_millis(1), Duration::ZERO));
    }

    #[test]
    fn test_detach_keeps_global() {
        let m = monitor();
        m.record("s1", Modality::Video, Duration::from_millis(5), Duration::ZERO);
        m.detach("s1");
        assert!(m.snapshot("s1").video.is_none());
        assert_eq!(m.global_snapshot().video.unwrap().count, 1);
    }

    #[test]
    fn test_min_max_tracking() {
        let m = monitor();
        m.record("s1", Modality::Video, Duration::from_millis(2), Duration::ZERO);
        m.record("s1", Modality::Video, Duration::from_millis(8), Duration::ZERO);
        let s = m.snapshot("s1").video.unwrap();
        assert!((s.min_ms - 2.0).abs() < 0.5);
        assert!((s.max_ms - 8.0).abs() < 0.5);
    }
}
