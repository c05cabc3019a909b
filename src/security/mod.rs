// src/security/mod.rs
pub mod authentication;
pub mod decision;

use thiserror::Error;

use crate::biometrics::BiometricsError;
use crate::db::StoreError;

pub use authentication::{
    AuthOutcome, AuthService, EnrollmentPhase, RegistrationProgress, RegistrationSession,
};
pub use decision::{
    AuthState, AuthenticationSession, ChallengeEvaluation, DecisionPolicy, DenialReason,
    PrimaryDecision,
};

/// Error types for registration and login
#[derive(Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Biometrics(#[from] BiometricsError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Typed text does not match the expected {0}")]
    TextMismatch(String),

    #[error("Keystrokes do not line up with the expected {0}")]
    MalformedAttempt(String),

    #[error("Registration incomplete: {0}")]
    RegistrationIncomplete(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}
