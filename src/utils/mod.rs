pub mod logging;

/// Arithmetic mean; 0.0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0.0 for an empty slice
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Mean absolute deviation around the arithmetic mean
pub fn mean_absolute_deviation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = mean(values);
    values.iter().map(|v| (v - avg).abs()).sum::<f64>() / values.len() as f64
}

/// Maps a non-negative spread ratio or distance onto 0..=100 with `100 / (1 + x)^1.5`
pub fn power_law_percent(x: f64) -> u32 {
    let value = 100.0 / (1.0 + x).powf(1.5);
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0).round() as u32
}

/// Replace NaN and infinities with a fallback value
pub fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
    }

    #[test]
    fn test_std_dev_is_population() {
        // Population variance of [2, 4, 4, 4, 5, 5, 7, 9] is 4
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((std_dev(&values) - 2.0).abs() < 1e-12);
        assert_eq!(std_dev(&[5.0]), 0.0);
    }

    #[test]
    fn test_mean_absolute_deviation() {
        assert_eq!(mean_absolute_deviation(&[]), 0.0);
        assert_eq!(mean_absolute_deviation(&[1.0, 3.0]), 1.0);
        assert_eq!(mean_absolute_deviation(&[7.0, 7.0, 7.0]), 0.0);
    }

    #[test]
    fn test_power_law_percent() {
        assert_eq!(power_law_percent(0.0), 100);
        assert_eq!(power_law_percent(1.0), 35);
        assert_eq!(power_law_percent(f64::INFINITY), 0);
        assert!(power_law_percent(0.5) > power_law_percent(0.6));
    }

    #[test]
    fn test_finite_or() {
        assert_eq!(finite_or(f64::NAN, 10.0), 10.0);
        assert_eq!(finite_or(f64::INFINITY, 10.0), 10.0);
        assert_eq!(finite_or(1.5, 10.0), 1.5);
    }
}
