use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::FeatureWeights;

/// Minimum MAD used anywhere a per-position spread divides a deviation
pub const MIN_MAD_THRESHOLD: f64 = 40.0;

/// Environment variable pointing at an optional TOML configuration file
pub const CONFIG_PATH_VAR: &str = "KEYSTROKE_AUTH_CONFIG";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub profile: ProfileConfig,
    pub matching: MatchConfig,
    pub decision: DecisionThresholds,
    pub enrollment: EnrollmentConfig,
    pub storage: StorageConfig,
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogLevel(pub String);

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel("info".to_string())
    }
}

/// Parameters of the statistics builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub min_mad: f64,
    pub outlier_z_threshold: f64,
    /// Below this many calibration attempts the per-position MAD is smoothed
    pub smoothing_sample_target: usize,
    pub smoothing_strength: f64,
    pub weights: FeatureWeights,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            min_mad: MIN_MAD_THRESHOLD,
            outlier_z_threshold: 2.5,
            smoothing_sample_target: 8,
            smoothing_strength: 0.3,
            weights: FeatureWeights::default(),
        }
    }
}

/// Parameters of the scaled Manhattan scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub weights: FeatureWeights,
    pub min_mad: f64,
    pub penalty_cap: f64,
    /// Score used when a feature has no comparable positions or is not finite
    pub missing_penalty: f64,
    pub liveness_penalty_factor: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            weights: FeatureWeights::default(),
            min_mad: MIN_MAD_THRESHOLD,
            penalty_cap: 3.0,
            missing_penalty: 10.0,
            liveness_penalty_factor: 1.5,
        }
    }
}

/// Accept / reject / challenge thresholds of the decision policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionThresholds {
    pub accept_distance: f64,
    pub accept_confidence: u32,
    pub reject_distance: f64,
    pub reject_confidence: u32,
    pub reject_liveness_score: f64,
    pub mantra_weight: f64,
    pub answer_weight: f64,
    pub challenge_pass_distance: f64,
    pub challenge_pass_confidence: u32,
    pub challenge_liveness_floor: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            accept_distance: 0.55,
            accept_confidence: 55,
            reject_distance: 1.1,
            reject_confidence: 35,
            reject_liveness_score: 0.3,
            mantra_weight: 0.55,
            answer_weight: 0.45,
            challenge_pass_distance: 0.9,
            challenge_pass_confidence: 35,
            challenge_liveness_floor: 0.4,
        }
    }
}

/// Registration policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrollmentConfig {
    pub calibration_attempts: usize,
    pub min_profile_quality: u32,
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            calibration_attempts: 5,
            min_profile_quality: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/users"),
        }
    }
}

impl Config {
    /// Reject configurations the scorer and policy cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.enrollment.calibration_attempts == 0 {
            bail!("enrollment.calibration_attempts must be at least 1");
        }
        if self.enrollment.min_profile_quality > 100 {
            bail!("enrollment.min_profile_quality must be within 0..=100");
        }
        if self.matching.min_mad <= 0.0 || self.profile.min_mad <= 0.0 {
            bail!("min_mad must be positive");
        }
        for weights in [&self.matching.weights, &self.profile.weights] {
            if weights.dwell < 0.0 || weights.flight < 0.0 || weights.dd < 0.0 {
                bail!("feature weights must not be negative");
            }
        }
        if self.decision.accept_distance > self.decision.reject_distance {
            bail!("decision.accept_distance must not exceed decision.reject_distance");
        }
        Ok(())
    }
}

/// Load configuration from `.env`, an optional TOML file, and the environment
pub fn load_config() -> Result<Config> {
    let path = env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from);
    load_config_from(path.as_deref())
}

/// Load configuration, reading the given TOML file when present
pub fn load_config_from(path: Option<&Path>) -> Result<Config> {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    let mut config = match path {
        Some(path) => load_from_file(path)?,
        None => Config::default(),
    };

    apply_env_overrides(&mut config, env::vars());
    config.validate()?;

    Ok(config)
}

/// Load configuration from a TOML file
fn load_from_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file {}", path.display()))?;

    toml::from_str(&contents).context("Failed to parse configuration file")
}

/// Apply `KEYSTROKE_*` overrides; unparseable values are ignored
pub fn apply_env_overrides<I>(config: &mut Config, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let value = value.trim();

        match key.as_str() {
            "LOG_LEVEL" => config.log_level = LogLevel(value.to_string()),
            "KEYSTROKE_DATA_DIR" => config.storage.data_dir = PathBuf::from(value),
            "KEYSTROKE_CALIBRATION_ATTEMPTS" => {
                if let Ok(attempts) = value.parse() {
                    config.enrollment.calibration_attempts = attempts;
                }
            }
            "KEYSTROKE_MIN_PROFILE_QUALITY" => {
                if let Ok(quality) = value.parse() {
                    config.enrollment.min_profile_quality = quality;
                }
            }
            "KEYSTROKE_MIN_MAD" => {
                if let Ok(mad) = value.parse::<f64>() {
                    config.profile.min_mad = mad;
                    config.matching.min_mad = mad;
                }
            }
            "KEYSTROKE_ACCEPT_DISTANCE" => {
                if let Ok(distance) = value.parse() {
                    config.decision.accept_distance = distance;
                }
            }
            "KEYSTROKE_REJECT_DISTANCE" => {
                if let Ok(distance) = value.parse() {
                    config.decision.reject_distance = distance;
                }
            }
            "KEYSTROKE_CHALLENGE_PASS_DISTANCE" => {
                if let Ok(distance) = value.parse() {
                    config.decision.challenge_pass_distance = distance;
                }
            }
            "KEYSTROKE_ACCEPT_CONFIDENCE" => {
                if let Ok(confidence) = value.parse() {
                    config.decision.accept_confidence = confidence;
                }
            }
            "KEYSTROKE_REJECT_CONFIDENCE" => {
                if let Ok(confidence) = value.parse() {
                    config.decision.reject_confidence = confidence;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.enrollment.calibration_attempts, 5);
        assert_eq!(config.matching.min_mad, MIN_MAD_THRESHOLD);
        assert_eq!(config.decision.accept_distance, 0.55);
        assert_eq!(config.decision.reject_distance, 1.1);
        assert_eq!(config.decision.challenge_pass_distance, 0.9);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            vars(&[
                ("KEYSTROKE_ACCEPT_DISTANCE", "0.5"),
                ("KEYSTROKE_MIN_PROFILE_QUALITY", "35"),
                ("KEYSTROKE_DATA_DIR", "/tmp/users"),
                ("LOG_LEVEL", "debug"),
                ("UNRELATED", "1"),
            ]),
        );

        assert_eq!(config.decision.accept_distance, 0.5);
        assert_eq!(config.enrollment.min_profile_quality, 35);
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/users"));
        assert_eq!(config.log_level, LogLevel("debug".to_string()));
    }

    #[test]
    fn test_invalid_override_is_ignored() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, vars(&[("KEYSTROKE_REJECT_DISTANCE", "far")]));
        assert_eq!(config.decision.reject_distance, 1.1);
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            log_level = "warn"

            [decision]
            accept_distance = 0.5

            [enrollment]
            min_profile_quality = 35
            "#,
        )
        .unwrap();

        assert_eq!(config.decision.accept_distance, 0.5);
        assert_eq!(config.decision.reject_distance, 1.1);
        assert_eq!(config.enrollment.min_profile_quality, 35);
        assert_eq!(config.enrollment.calibration_attempts, 5);
        assert_eq!(config.log_level.0, "warn");
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let mut config = Config::default();
        config.decision.accept_distance = 2.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.enrollment.calibration_attempts = 0;
        assert!(config.validate().is_err());
    }
}
