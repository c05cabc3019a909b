// Re-export modules
pub mod biometrics;
pub mod config;
pub mod db;
pub mod models;
pub mod security;
pub mod utils;

pub use biometrics::{build_profile, calculate_match, extract_timings, BiometricsError};
pub use config::Config;
pub use security::{AuthError, AuthService};
