// Core data model for keystroke rhythm authentication.
// All timing values are floating-point milliseconds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Define core types
pub type UserId = Uuid;
pub type Millis = f64;

/// One physical keystroke, already bound to the position it was typed at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawKeystroke {
    pub expected_char: char,
    pub key_code: u32,
    pub press_time: Millis,
    pub release_time: Millis,
}

impl RawKeystroke {
    pub fn new(
        expected_char: char,
        key_code: u32,
        press_time: Millis,
        release_time: Millis,
    ) -> Self {
        Self {
            expected_char,
            key_code,
            press_time,
            release_time,
        }
    }
}

/// A finished typing attempt as delivered by the capture surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedAttempt {
    pub typed_text: String,
    pub keystrokes: Vec<RawKeystroke>,
}

/// Timing features derived from one typed attempt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingVector {
    pub dwell_times: Vec<Millis>,
    pub flight_times: Vec<Millis>,
    pub dd_latencies: Vec<Millis>,
    pub total_time: Millis,
}

impl TimingVector {
    pub fn feature(&self, kind: FeatureKind) -> &[Millis] {
        match kind {
            FeatureKind::Dwell => &self.dwell_times,
            FeatureKind::Flight => &self.flight_times,
            FeatureKind::DownDown => &self.dd_latencies,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dwell_times.is_empty()
    }
}

/// The three timing features tracked per position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Dwell,
    Flight,
    #[serde(rename = "dd")]
    DownDown,
}

/// Per-position statistics for one feature, stored column-wise
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub mean: Vec<Millis>,
    pub mad: Vec<Millis>,
    pub min: Vec<Millis>,
    pub max: Vec<Millis>,
}

impl FeatureStats {
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }
}

/// Relative weight of each feature when combining scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeights {
    pub dwell: f64,
    pub flight: f64,
    pub dd: f64,
}

impl FeatureWeights {
    pub fn combine(&self, dwell: f64, flight: f64, dd: f64) -> f64 {
        dwell * self.dwell + flight * self.flight + dd * self.dd
    }
}

impl Default for FeatureWeights {
    fn default() -> Self {
        // Flight time is the most discriminative signal, dwell the least
        Self {
            dwell: 0.30,
            flight: 0.50,
            dd: 0.20,
        }
    }
}

/// Statistical typing profile built from calibration attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricProfile {
    pub dwell: FeatureStats,
    pub flight: FeatureStats,
    pub dd: FeatureStats,
    pub sample_count: usize,
    pub quality: u32, // 0 to 100
    pub created_at: DateTime<Utc>,
    pub target_text: String,
    pub text_length: usize,
}

impl BiometricProfile {
    pub fn feature(&self, kind: FeatureKind) -> &FeatureStats {
        match kind {
            FeatureKind::Dwell => &self.dwell,
            FeatureKind::Flight => &self.flight,
            FeatureKind::DownDown => &self.dd,
        }
    }
}

/// Anomaly codes raised by the liveness detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LivenessFlag {
    LowDwellVariance,
    SuspiciousDwellCv,
    LowFlightVariance,
    SuspiciousFlightCv,
    RepeatingDwellPattern,
    RepeatingFlightPattern,
}

/// Human-vs-scripted judgement for a single attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessResult {
    pub is_human: bool,
    pub score: f64, // 0.0 to 1.0
    pub flags: Vec<LivenessFlag>,
}

impl LivenessResult {
    pub fn has_flag(&self, flag: LivenessFlag) -> bool {
        self.flags.contains(&flag)
    }
}

/// Outcome of scoring one attempt against a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub distance: f64,   // lower is better
    pub confidence: u32, // 0 to 100
    pub dwell_score: f64,
    pub flight_score: f64,
    pub dd_score: f64,
    pub weights: FeatureWeights,
    pub liveness: LivenessResult,
}

/// A registered user with both enrolled typing profiles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub mantra_profile: BiometricProfile,
    pub secret_question: String,
    pub secret_answer: String,
    pub answer_profile: BiometricProfile,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Usernames are unique ignoring case
    pub fn username_key(&self) -> String {
        normalize_username(&self.username)
    }
}

pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}
