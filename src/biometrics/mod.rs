// Keystroke dynamics engine: capture, timing extraction, profile building,
// liveness detection and scoring.
//
// Everything below `capture` is pure and synchronous over immutable inputs,
// so any number of authentication sessions can score in parallel.

pub mod capture;
pub mod liveness;
pub mod matching;
pub mod statistics;
pub mod timing;

use thiserror::Error;

pub use capture::KeystrokeCapture;
pub use liveness::detect_liveness;
pub use matching::{calculate_match, calculate_match_with, confidence_from_distance};
pub use statistics::{build_profile, build_profile_with};
pub use timing::extract_timings;

/// Error types for biometric operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BiometricsError {
    #[error("Insufficient data: at least one calibration attempt is required")]
    InsufficientData,

    #[error("Profile quality {quality} is below the minimum of {minimum}")]
    LowQualityProfile { quality: u32, minimum: u32 },

    #[error("Capture error: {0}")]
    Capture(String),
}
