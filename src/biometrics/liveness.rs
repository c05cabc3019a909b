use crate::models::{LivenessFlag, LivenessResult, Millis, TimingVector};
use crate::utils::{mean, std_dev};

const MIN_VARIANCE_SAMPLES: usize = 3;
const MIN_DWELL_STD_DEV: Millis = 8.0;
const MIN_FLIGHT_STD_DEV: Millis = 15.0;
const MIN_COEFFICIENT_OF_VARIATION: f64 = 0.05;
const REPEAT_TOLERANCE: Millis = 5.0;

const LOW_VARIANCE_PENALTY: f64 = 0.4;
const LOW_CV_PENALTY: f64 = 0.3;
const REPEAT_PENALTY: f64 = 0.2;

const HUMAN_THRESHOLD: f64 = 0.5;

struct SeriesChecks {
    min_std_dev: Millis,
    low_variance: LivenessFlag,
    low_cv: LivenessFlag,
    repeating: LivenessFlag,
}

const DWELL_CHECKS: SeriesChecks = SeriesChecks {
    min_std_dev: MIN_DWELL_STD_DEV,
    low_variance: LivenessFlag::LowDwellVariance,
    low_cv: LivenessFlag::SuspiciousDwellCv,
    repeating: LivenessFlag::RepeatingDwellPattern,
};

const FLIGHT_CHECKS: SeriesChecks = SeriesChecks {
    min_std_dev: MIN_FLIGHT_STD_DEV,
    low_variance: LivenessFlag::LowFlightVariance,
    low_cv: LivenessFlag::SuspiciousFlightCv,
    repeating: LivenessFlag::RepeatingFlightPattern,
};

/// Judge whether an attempt was typed by a person.
///
/// Scripted or replayed input shows too little jitter: near-constant
/// dwell/flight times or runs of identical values. Every check that fires
/// subtracts its penalty from a starting score of 1.0.
pub fn detect_liveness(vector: &TimingVector) -> LivenessResult {
    let mut score = 1.0;
    let mut flags = Vec::new();

    score -= check_series(&vector.dwell_times, &DWELL_CHECKS, &mut flags);
    score -= check_series(&vector.flight_times, &FLIGHT_CHECKS, &mut flags);

    let score: f64 = score.clamp(0.0, 1.0);

    LivenessResult {
        is_human: score >= HUMAN_THRESHOLD,
        score,
        flags,
    }
}

fn check_series(values: &[Millis], checks: &SeriesChecks, flags: &mut Vec<LivenessFlag>) -> f64 {
    let mut penalty = 0.0;
    let sd = std_dev(values);

    if values.len() >= MIN_VARIANCE_SAMPLES && sd < checks.min_std_dev {
        flags.push(checks.low_variance);
        penalty += LOW_VARIANCE_PENALTY;
    }

    // A single value has no dispersion to judge
    let avg = mean(values);
    if values.len() >= 2 && avg > 0.0 && sd / avg < MIN_COEFFICIENT_OF_VARIATION {
        flags.push(checks.low_cv);
        penalty += LOW_CV_PENALTY;
    }

    if has_repeating_run(values) {
        flags.push(checks.repeating);
        penalty += REPEAT_PENALTY;
    }

    penalty
}

/// Three consecutive values all within the repeat tolerance of each other
fn has_repeating_run(values: &[Millis]) -> bool {
    values.windows(3).any(|w| {
        (w[0] - w[1]).abs() < REPEAT_TOLERANCE
            && (w[1] - w[2]).abs() < REPEAT_TOLERANCE
            && (w[0] - w[2]).abs() < REPEAT_TOLERANCE
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(dwell: &[f64], flight: &[f64]) -> TimingVector {
        TimingVector {
            dwell_times: dwell.to_vec(),
            flight_times: flight.to_vec(),
            dd_latencies: dwell.iter().zip(flight).map(|(d, f)| d + f).collect(),
            total_time: 0.0,
        }
    }

    fn human() -> TimingVector {
        vector(
            &[112.0, 87.0, 134.0, 96.0, 121.0, 78.0, 143.0, 101.0],
            &[160.0, 95.0, 240.0, 130.0, 60.0, 310.0, 180.0],
        )
    }

    #[test]
    fn test_human_typing_passes() {
        let result = detect_liveness(&human());
        assert!(result.is_human);
        assert_eq!(result.score, 1.0);
        assert!(result.flags.is_empty());
    }

    #[test]
    fn test_constant_dwell_is_flagged() {
        let mut attempt = human();
        attempt.dwell_times = vec![100.0; 10];
        attempt.flight_times = vec![160.0, 95.0, 240.0, 130.0, 60.0, 310.0, 180.0, 75.0, 205.0];

        let result = detect_liveness(&attempt);
        assert!(!result.is_human);
        assert!(result.has_flag(LivenessFlag::SuspiciousDwellCv));
        assert!(result.has_flag(LivenessFlag::LowDwellVariance));
        assert!(result.has_flag(LivenessFlag::RepeatingDwellPattern));
        assert!(result.score <= 0.3);
    }

    #[test]
    fn test_fully_robotic_input_scores_zero() {
        let result = detect_liveness(&vector(&[80.0; 6], &[120.0; 5]));
        assert!(!result.is_human);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.flags.len(), 6);
    }

    #[test]
    fn test_low_flight_variance_alone() {
        let mut attempt = human();
        // stddev ~12ms, cv well above 0.05, no three-in-a-row within 5ms
        attempt.flight_times = vec![200.0, 220.0, 190.0, 215.0, 185.0, 225.0, 195.0];

        let result = detect_liveness(&attempt);
        assert_eq!(result.flags, vec![LivenessFlag::LowFlightVariance]);
        assert!((result.score - 0.6).abs() < 1e-9);
        assert!(result.is_human);
    }

    #[test]
    fn test_repeating_run_detection() {
        assert!(has_repeating_run(&[100.0, 150.0, 151.0, 153.0, 90.0]));
        // Neighbours within 5ms but the ends 8ms apart: drift, not a repeat
        assert!(!has_repeating_run(&[100.0, 104.0, 108.0]));
        assert!(!has_repeating_run(&[100.0, 101.0]));
    }

    #[test]
    fn test_short_series_are_not_judged() {
        let result = detect_liveness(&vector(&[90.0], &[]));
        assert!(result.is_human);
        assert!(result.flags.is_empty());
        assert_eq!(result.score, 1.0);
    }
}
