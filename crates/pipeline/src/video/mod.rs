//! Video track: quality assessment, detector backends, ordered fallback,
//! and emotion score smoothing.

pub mod backends;
pub mod quality;
pub mod smoothing;

pub use backends::{CenterWeightedDetector, DetectorChain, HistogramDetector};
pub use quality::{assess_quality, QualityReport};
pub use smoothing::EmotionSmoother;
