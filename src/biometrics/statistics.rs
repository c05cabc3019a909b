use chrono::Utc;
use log::debug;

use super::BiometricsError;
use crate::config::ProfileConfig;
use crate::models::{BiometricProfile, FeatureKind, FeatureStats, Millis, TimingVector};
use crate::utils::{mean, mean_absolute_deviation, power_law_percent, std_dev};

/// Build a profile from calibration attempts with the default parameters
pub fn build_profile(
    attempts: &[TimingVector],
    target_text: &str,
) -> Result<BiometricProfile, BiometricsError> {
    build_profile_with(attempts, target_text, &ProfileConfig::default())
}

/// Aggregate calibration attempts into per-position statistics.
///
/// The result does not depend on the order of `attempts`. Quality is
/// reported but not enforced here; registration decides what is acceptable.
pub fn build_profile_with(
    attempts: &[TimingVector],
    target_text: &str,
    config: &ProfileConfig,
) -> Result<BiometricProfile, BiometricsError> {
    let valid: Vec<&TimingVector> = attempts.iter().filter(|a| !a.is_empty()).collect();
    if valid.is_empty() {
        return Err(BiometricsError::InsufficientData);
    }

    let sample_count = valid.len();
    let dwell = build_feature_stats(&valid, FeatureKind::Dwell, config);
    let flight = build_feature_stats(&valid, FeatureKind::Flight, config);
    let dd = build_feature_stats(&valid, FeatureKind::DownDown, config);

    let dwell_quality = feature_quality(&dwell);
    let flight_quality = feature_quality(&flight);
    let dd_quality = feature_quality(&dd);
    let quality = config
        .weights
        .combine(dwell_quality as f64, flight_quality as f64, dd_quality as f64)
        .round()
        .clamp(0.0, 100.0) as u32;

    debug!(
        "Built profile from {} attempts: quality {} (dwell {}, flight {}, dd {})",
        sample_count, quality, dwell_quality, flight_quality, dd_quality
    );

    Ok(BiometricProfile {
        dwell,
        flight,
        dd,
        sample_count,
        quality,
        created_at: Utc::now(),
        target_text: target_text.to_string(),
        text_length: target_text.chars().count(),
    })
}

/// Per-position mean, MAD, min and max of one feature across attempts
fn build_feature_stats(
    attempts: &[&TimingVector],
    kind: FeatureKind,
    config: &ProfileConfig,
) -> FeatureStats {
    let columns = transpose(attempts, kind);

    let mut flattened: Vec<Millis> = columns.iter().flatten().copied().collect();
    flattened.sort_by(f64::total_cmp);
    let global_mad = mean_absolute_deviation(&flattened);

    let sample_count = attempts.len();
    let sample_target = config.smoothing_sample_target;
    let smoothing = if sample_count < sample_target && sample_target > 0 {
        let target = sample_target as f64;
        ((target - sample_count as f64) / target).min(1.0) * config.smoothing_strength
    } else {
        0.0
    };

    let mut stats = FeatureStats::default();
    for column in &columns {
        let cleaned = remove_outliers(column, config.outlier_z_threshold);

        let position_mad = mean_absolute_deviation(&cleaned);
        let blended = position_mad * (1.0 - smoothing) + global_mad * smoothing;

        stats.mean.push(mean(&cleaned));
        stats.mad.push(blended.max(config.min_mad));
        stats.min.push(cleaned.first().copied().unwrap_or(0.0));
        stats.max.push(cleaned.last().copied().unwrap_or(0.0));
    }

    stats
}

/// Per-position value lists, each sorted so downstream sums are order independent.
/// Attempts shorter than the longest one only contribute the positions they have.
fn transpose(attempts: &[&TimingVector], kind: FeatureKind) -> Vec<Vec<Millis>> {
    let width = attempts.iter().map(|a| a.feature(kind).len()).max().unwrap_or(0);
    let mut columns = vec![Vec::with_capacity(attempts.len()); width];

    for attempt in attempts {
        for (position, value) in attempt.feature(kind).iter().enumerate() {
            columns[position].push(*value);
        }
    }

    for column in &mut columns {
        column.sort_by(f64::total_cmp);
    }
    columns
}

/// Drop values more than `z_threshold` population standard deviations from the mean.
/// Needs at least three values and a non-zero spread to say anything.
fn remove_outliers(values: &[Millis], z_threshold: f64) -> Vec<Millis> {
    if values.len() < 3 {
        return values.to_vec();
    }

    let avg = mean(values);
    let sd = std_dev(values);
    if sd == 0.0 {
        return values.to_vec();
    }

    values
        .iter()
        .copied()
        .filter(|v| (v - avg).abs() / sd <= z_threshold)
        .collect()
}

/// 0-100 consistency score from the average coefficient of variation
pub fn feature_quality(stats: &FeatureStats) -> u32 {
    let cvs: Vec<f64> = stats
        .mean
        .iter()
        .zip(&stats.mad)
        .filter(|(mean, _)| **mean > 0.0)
        .map(|(mean, mad)| mad / mean)
        .collect();

    if cvs.is_empty() {
        return 0;
    }

    power_law_percent(mean(&cvs))
}
