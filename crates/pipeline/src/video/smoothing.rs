//! Exponentially weighted smoothing of emotion score maps
//!
//! Raw per-frame label scores are smoothed before taking the arg-max so a
//! single noisy frame cannot flip the dominant label.

use std::collections::BTreeMap;

use interview_engine_core::Emotion;

pub struct EmotionSmoother {
    alpha: f32,
    scores: BTreeMap<Emotion, f32>,
    initialized: bool,
}

impl EmotionSmoother {
    /// `half_life_frames` is the number of frames after which an old
    /// observation's weight has decayed to one half.
    pub fn new(half_life_frames: f32) -> Self {
        let half_life = half_life_frames.max(0.1);
        let alpha = 1.0 - 0.5f32.powf(1.0 / half_life);
        Self {
            alpha,
            scores: BTreeMap::new(),
            initialized: false,
        }
    }

    /// Fold one raw score map into the running average; returns the smoothed
    /// map and its arg-max label.
    pub fn apply(&mut self, raw: &BTreeMap<Emotion, f32>) -> (Emotion, BTreeMap<Emotion, f32>) {
        if !self.initialized {
            self.scores = raw.clone();
            self.initialized = true;
        } else {
            for emotion in Emotion::ALL {
                let observed = raw.get(&emotion).copied().unwrap_or(0.0);
                let entry = self.scores.entry(emotion).or_insert(0.0);
                *entry += self.alpha * (observed - *entry);
            }
        }

        let dominant = self
            .scores
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(e, _)| *e)
            .unwrap_or(Emotion::Neutral);

        (dominant, self.scores.clone())
    }

    /// Forget all history (session reset).
    pub fn reset(&mut self) {
        self.scores.clear();
        self.initialized = false;
    }
}
