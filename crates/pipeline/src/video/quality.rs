//! Frame quality assessment
//!
//! Computed independently of detection so diagnostics survive backend
//! failure: brightness mean/std against dark/bright thresholds, blur via
//! high-frequency (Laplacian) variance.

use interview_engine_core::{QualityFlag, VideoFrame};

/// Brightness below this mean is flagged too dark
const DARK_THRESHOLD: f32 = 60.0;
/// Brightness above this mean is flagged too bright
const BRIGHT_THRESHOLD: f32 = 200.0;
/// Laplacian variance below this is flagged blurry
const BLUR_THRESHOLD: f32 = 60.0;

#[derive(Debug, Clone)]
pub struct QualityReport {
    pub brightness_mean: f32,
    pub brightness_std: f32,
    pub sharpness: f32,
    pub flags: Vec<QualityFlag>,
}

/// Assess one frame's capture quality.
pub fn assess_quality(frame: &VideoFrame) -> QualityReport {
    let brightness_mean = frame.brightness_mean();
    let brightness_std = frame.brightness_std();
    let sharpness = laplacian_variance(frame);

    let mut flags = Vec::new();
    if brightness_mean < DARK_THRESHOLD {
        flags.push(QualityFlag::TooDark);
    } else if brightness_mean > BRIGHT_THRESHOLD {
        flags.push(QualityFlag::TooBright);
    }
    if sharpness < BLUR_THRESHOLD {
        flags.push(QualityFlag::Blurry);
    }

    QualityReport {
        brightness_mean,
        brightness_std,
        sharpness,
        flags,
    }
}

/// Variance of the 4-neighbor Laplacian response over interior pixels.
///
/// Sampled on a stride-2 grid to keep the hot path cheap on large frames.
fn laplacian_variance(frame: &VideoFrame) -> f32 {
    let w = frame.width as usize;
    let h = frame.height as usize;
    if w < 3 || h < 3 {
        return 0.0;
    }

    let px = |x: usize, y: usize| frame.luma[y * w + x] as f32;

    let mut responses = Vec::with_capacity((w / 2) * (h / 2));
    let mut y = 1;
    while y < h - 1 {
        let mut x = 1;
        while x < w - 1 {
            let lap =
                4.0 * px(x, y) - px(x - 1, y) - px(x + 1, y) - px(x, y - 1) - px(x, y + 1);
            responses.push(lap);
            x += 2;
        }
        y += 2;
    }

    if responses.is_empty() {
        return 0.0;
    }
    let mean = responses.iter().sum::<f32>() / responses.len() as f32;
    responses
        .iter()
        .map(|r| {
            let d = r - mean;
            d * d
        })
        .sum::<f32>()
        / responses.len() as f32
}
