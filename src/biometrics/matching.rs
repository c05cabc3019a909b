use log::{debug, warn};

use super::liveness::detect_liveness;
use crate::config::MatchConfig;
use crate::models::{BiometricProfile, FeatureKind, FeatureStats, MatchResult, Millis, TimingVector};
use crate::utils::{finite_or, power_law_percent};

/// Score an attempt against a profile with the default parameters
pub fn calculate_match(vector: &TimingVector, profile: &BiometricProfile) -> MatchResult {
    calculate_match_with(vector, profile, &MatchConfig::default())
}

/// Scaled Manhattan distance between an attempt and a profile.
///
/// Each feature is scored independently, the three scores are combined with
/// the configured weights, and attempts that fail the liveness check are
/// pushed further away. Every field of the result is finite.
pub fn calculate_match_with(
    vector: &TimingVector,
    profile: &BiometricProfile,
    config: &MatchConfig,
) -> MatchResult {
    let dwell_score = feature_score(vector, profile, FeatureKind::Dwell, config);
    let flight_score = feature_score(vector, profile, FeatureKind::Flight, config);
    let dd_score = feature_score(vector, profile, FeatureKind::DownDown, config);

    let mut distance = config.weights.combine(dwell_score, flight_score, dd_score);

    let liveness = detect_liveness(vector);
    if !liveness.is_human {
        let penalty = (1.0 - liveness.score) * config.liveness_penalty_factor;
        warn!(
            "Liveness check failed (score {:.2}, flags {:?}); adding distance penalty {:.3}",
            liveness.score, liveness.flags, penalty
        );
        distance += penalty;
    }

    let distance = finite_or(distance, config.missing_penalty).max(0.0);
    let confidence = confidence_from_distance(distance);

    debug!(
        "Match scores: dwell {:.3}, flight {:.3}, dd {:.3} -> distance {:.3}, confidence {}",
        dwell_score, flight_score, dd_score, distance, confidence
    );

    MatchResult {
        distance,
        confidence,
        dwell_score,
        flight_score,
        dd_score,
        weights: config.weights,
        liveness,
    }
}

/// Convert a distance to a 0-100 confidence; 0 maps to 100 and it decays toward 0
pub fn confidence_from_distance(distance: f64) -> u32 {
    power_law_percent(distance.max(0.0))
}

fn feature_score(
    vector: &TimingVector,
    profile: &BiometricProfile,
    kind: FeatureKind,
    config: &MatchConfig,
) -> f64 {
    let score = scaled_manhattan(vector.feature(kind), profile.feature(kind), config);
    finite_or(score, config.missing_penalty)
}

/// Mean of capped per-position deviations, each scaled by that position's MAD.
/// Positions are compared up to the shortest of the attempt and the profile.
fn scaled_manhattan(values: &[Millis], stats: &FeatureStats, config: &MatchConfig) -> f64 {
    let comparable = values.len().min(stats.mean.len()).min(stats.mad.len());
    if comparable == 0 {
        return config.missing_penalty;
    }

    let total: f64 = (0..comparable)
        .map(|i| {
            let mad = stats.mad[i].max(config.min_mad);
            ((values[i] - stats.mean[i]).abs() / mad).min(config.penalty_cap)
        })
        .sum();

    total / comparable as f64
}
