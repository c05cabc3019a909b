// Keystroke Rhythm Authentication: registration and login orchestration
//
// Registration collects calibration attempts for the mantra and the secret
// answer and builds one profile per phrase. Login scores the mantra, and
// when the policy asks for it, the secret answer.

use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::decision::{
    AuthState, AuthenticationSession, ChallengeEvaluation, DecisionPolicy, DenialReason,
};
use super::AuthError;
use crate::biometrics::{build_profile_with, calculate_match_with, extract_timings, BiometricsError};
use crate::config::{Config, EnrollmentConfig, ProfileConfig};
use crate::db::{StoreError, UserRepository};
use crate::models::{
    BiometricProfile, CapturedAttempt, MatchResult, RawKeystroke, TimingVector, UserId,
    UserProfile,
};

// Registration phase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentPhase {
    Mantra,
    Answer,
    Complete,
}

/// Snapshot of how far a registration has come
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationProgress {
    pub phase: EnrollmentPhase,
    pub mantra_attempts: usize,
    pub answer_attempts: usize,
    pub required_attempts: usize,
    pub mantra_quality: Option<u32>,
    pub answer_quality: Option<u32>,
}

/// Secret answers are compared ignoring case; whitespace counts as typed
fn answers_match(typed: &str, expected: &str) -> bool {
    typed.to_lowercase() == expected.to_lowercase()
}

/// Exactly one keystroke per character of `target`, each bound to that character
fn keystrokes_cover(keystrokes: &[RawKeystroke], target: &str) -> bool {
    keystrokes.len() == target.chars().count()
        && keystrokes
            .iter()
            .zip(target.chars())
            .all(|(key, c)| key.expected_char.to_lowercase().eq(c.to_lowercase()))
}

/// Calibration state for one user being enrolled
#[derive(Debug, Clone)]
pub struct RegistrationSession {
    username: String,
    mantra_text: String,
    secret_question: String,
    secret_answer: String,
    enrollment: EnrollmentConfig,
    profile_config: ProfileConfig,
    mantra_attempts: Vec<TimingVector>,
    answer_attempts: Vec<TimingVector>,
    mantra_profile: Option<BiometricProfile>,
    answer_profile: Option<BiometricProfile>,
}

impl RegistrationSession {
    pub fn new(
        username: &str,
        mantra_text: &str,
        secret_question: &str,
        secret_answer: &str,
        config: &Config,
    ) -> Result<Self, AuthError> {
        if username.trim().is_empty() {
            return Err(AuthError::InvalidParameters("username must not be empty".to_string()));
        }
        if mantra_text.is_empty() {
            return Err(AuthError::InvalidParameters("mantra must not be empty".to_string()));
        }
        if secret_question.trim().is_empty() || secret_answer.trim().is_empty() {
            return Err(AuthError::InvalidParameters(
                "secret question and answer must not be empty".to_string(),
            ));
        }

        Ok(Self {
            username: username.trim().to_string(),
            mantra_text: mantra_text.to_string(),
            secret_question: secret_question.trim().to_string(),
            secret_answer: secret_answer.trim().to_string(),
            enrollment: config.enrollment.clone(),
            profile_config: config.profile.clone(),
            mantra_attempts: Vec::new(),
            answer_attempts: Vec::new(),
            mantra_profile: None,
            answer_profile: None,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn phase(&self) -> EnrollmentPhase {
        match (&self.mantra_profile, &self.answer_profile) {
            (None, _) => EnrollmentPhase::Mantra,
            (Some(_), None) => EnrollmentPhase::Answer,
            (Some(_), Some(_)) => EnrollmentPhase::Complete,
        }
    }

    pub fn progress(&self) -> RegistrationProgress {
        RegistrationProgress {
            phase: self.phase(),
            mantra_attempts: self.mantra_attempts.len(),
            answer_attempts: self.answer_attempts.len(),
            required_attempts: self.enrollment.calibration_attempts,
            mantra_quality: self.mantra_profile.as_ref().map(|p| p.quality),
            answer_quality: self.answer_profile.as_ref().map(|p| p.quality),
        }
    }

    /// Add one calibration attempt to the current phase.
    ///
    /// Attempts with typing errors are refused and not counted. When a phase
    /// reaches the required count its profile is built; a profile below the
    /// quality floor discards that phase's attempts so the user re-types them.
    pub fn add_attempt(
        &mut self,
        attempt: &CapturedAttempt,
    ) -> Result<RegistrationProgress, AuthError> {
        match self.phase() {
            EnrollmentPhase::Mantra => {
                if attempt.typed_text != self.mantra_text {
                    return Err(AuthError::TextMismatch("mantra".to_string()));
                }
                if !keystrokes_cover(&attempt.keystrokes, &self.mantra_text) {
                    return Err(AuthError::MalformedAttempt("mantra".to_string()));
                }
                self.mantra_attempts.push(extract_timings(&attempt.keystrokes));

                if self.mantra_attempts.len() >= self.enrollment.calibration_attempts {
                    let profile = self.finish_phase(EnrollmentPhase::Mantra)?;
                    self.mantra_profile = Some(profile);
                }
            }
            EnrollmentPhase::Answer => {
                if !answers_match(&attempt.typed_text, &self.secret_answer) {
                    return Err(AuthError::TextMismatch("secret answer".to_string()));
                }
                if !keystrokes_cover(&attempt.keystrokes, &self.secret_answer) {
                    return Err(AuthError::MalformedAttempt("secret answer".to_string()));
                }
                self.answer_attempts.push(extract_timings(&attempt.keystrokes));

                if self.answer_attempts.len() >= self.enrollment.calibration_attempts {
                    let profile = self.finish_phase(EnrollmentPhase::Answer)?;
                    self.answer_profile = Some(profile);
                }
            }
            EnrollmentPhase::Complete => {
                return Err(AuthError::InvalidTransition(
                    "registration already has both profiles".to_string(),
                ));
            }
        }

        Ok(self.progress())
    }

    fn finish_phase(&mut self, phase: EnrollmentPhase) -> Result<BiometricProfile, AuthError> {
        let (attempts, target) = match phase {
            EnrollmentPhase::Mantra => (&mut self.mantra_attempts, &self.mantra_text),
            _ => (&mut self.answer_attempts, &self.secret_answer),
        };

        let profile = build_profile_with(attempts, target, &self.profile_config)?;
        let minimum = self.enrollment.min_profile_quality;

        if profile.quality < minimum {
            warn!(
                "Discarding {:?} calibration for {}: quality {} below {}",
                phase, self.username, profile.quality, minimum
            );
            attempts.clear();
            return Err(BiometricsError::LowQualityProfile {
                quality: profile.quality,
                minimum,
            }
            .into());
        }

        info!("{:?} profile for {} built with quality {}", phase, self.username, profile.quality);
        Ok(profile)
    }

    /// Turn a finished registration into a user record
    pub fn into_user(self) -> Result<UserProfile, AuthError> {
        let (mantra_profile, answer_profile) = match (self.mantra_profile, self.answer_profile) {
            (Some(mantra), Some(answer)) => (mantra, answer),
            (None, _) => {
                let reason = "mantra calibration pending".to_string();
                return Err(AuthError::RegistrationIncomplete(reason));
            }
            (_, None) => {
                let reason = "answer calibration pending".to_string();
                return Err(AuthError::RegistrationIncomplete(reason));
            }
        };

        Ok(UserProfile {
            id: Uuid::new_v4(),
            username: self.username,
            mantra_profile,
            secret_question: self.secret_question,
            secret_answer: self.secret_answer,
            answer_profile,
            created_at: Utc::now(),
            last_login: None,
        })
    }
}

/// What a login step produced, for the caller to present
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthOutcome {
    pub session_id: Uuid,
    pub username: String,
    pub state: AuthState,
    pub primary: Option<MatchResult>,
    pub challenge: Option<MatchResult>,
    pub challenge_evaluation: Option<ChallengeEvaluation>,
    /// Present while the session waits for the secret answer
    pub secret_question: Option<String>,
    pub denial_reason: Option<DenialReason>,
}

/// Registration and login on top of a user store
pub struct AuthService {
    repository: Arc<dyn UserRepository>,
    config: Config,
    policy: DecisionPolicy,
}

impl AuthService {
    pub fn new(repository: Arc<dyn UserRepository>, config: Config) -> Self {
        let policy = DecisionPolicy::new(config.decision.clone());
        Self {
            repository,
            config,
            policy,
        }
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    /// Start enrolling a user; fails early when the username is taken
    pub async fn start_registration(
        &self,
        username: &str,
        mantra_text: &str,
        secret_question: &str,
        secret_answer: &str,
    ) -> Result<RegistrationSession, AuthError> {
        if self.repository.find_by_username(username).await?.is_some() {
            return Err(StoreError::UsernameTaken(username.to_string()).into());
        }
        RegistrationSession::new(
            username,
            mantra_text,
            secret_question,
            secret_answer,
            &self.config,
        )
    }

    /// Persist a finished registration
    pub async fn complete_registration(
        &self,
        session: RegistrationSession,
    ) -> Result<UserProfile, AuthError> {
        let user = session.into_user()?;
        let user = self.repository.create(&user).await?;
        info!(
            "Registered {} ({}) with mantra quality {} and answer quality {}",
            user.username, user.id, user.mantra_profile.quality, user.answer_profile.quality
        );
        Ok(user)
    }

    /// Open a login session for a known user
    pub async fn begin_login(&self, username: &str) -> Result<AuthenticationSession, AuthError> {
        let user = self
            .repository
            .find_by_username(username)
            .await?
            .ok_or_else(|| StoreError::NotFound(username.to_string()))?;

        let mut session = AuthenticationSession::new();
        session.select_subject(user.id, &user.username)?;
        Ok(session)
    }

    /// Score the mantra attempt and advance the session
    pub async fn submit_mantra(
        &self,
        session: &mut AuthenticationSession,
        attempt: &CapturedAttempt,
    ) -> Result<AuthOutcome, AuthError> {
        if session.state != AuthState::AwaitingPrimaryInput {
            return Err(AuthError::InvalidTransition(format!(
                "mantra submitted in state {:?}",
                session.state
            )));
        }
        let user = self.session_user(session).await?;

        let target = &user.mantra_profile.target_text;
        if attempt.typed_text != *target || !keystrokes_cover(&attempt.keystrokes, target) {
            info!("Session {}: mantra text mismatch for {}", session.id, user.username);
            session.deny(DenialReason::TextMismatch)?;
        } else {
            let result = self.score(&attempt.keystrokes, &user.mantra_profile);
            session.record_primary(&self.policy, result)?;
        }

        self.finish_step(session, &user).await
    }

    /// Score the secret answer attempt; the outcome is final
    pub async fn submit_answer(
        &self,
        session: &mut AuthenticationSession,
        attempt: &CapturedAttempt,
    ) -> Result<AuthOutcome, AuthError> {
        if session.state != AuthState::AwaitingChallengeInput {
            return Err(AuthError::InvalidTransition(format!(
                "answer submitted in state {:?}",
                session.state
            )));
        }
        let user = self.session_user(session).await?;

        let answer = &user.secret_answer;
        if !answers_match(&attempt.typed_text, answer)
            || !keystrokes_cover(&attempt.keystrokes, answer)
        {
            info!("Session {}: secret answer mismatch for {}", session.id, user.username);
            session.deny(DenialReason::TextMismatch)?;
        } else {
            let result = self.score(&attempt.keystrokes, &user.answer_profile);
            session.record_challenge(&self.policy, result)?;
        }

        self.finish_step(session, &user).await
    }

    /// Score a captured attempt against a profile without touching any session
    pub fn score_attempt(
        &self,
        attempt: &CapturedAttempt,
        profile: &BiometricProfile,
    ) -> MatchResult {
        self.score(&attempt.keystrokes, profile)
    }

    pub async fn get_user(&self, username: &str) -> Result<UserProfile, AuthError> {
        Ok(self
            .repository
            .find_by_username(username)
            .await?
            .ok_or_else(|| StoreError::NotFound(username.to_string()))?)
    }

    pub async fn list_users(&self) -> Result<Vec<UserProfile>, AuthError> {
        Ok(self.repository.list().await?)
    }

    pub async fn delete_user(&self, id: UserId) -> Result<(), AuthError> {
        self.repository.delete(id).await?;
        info!("Deleted user {}", id);
        Ok(())
    }

    fn score(&self, keystrokes: &[RawKeystroke], profile: &BiometricProfile) -> MatchResult {
        let vector = extract_timings(keystrokes);
        calculate_match_with(&vector, profile, &self.config.matching)
    }

    async fn session_user(
        &self,
        session: &AuthenticationSession,
    ) -> Result<UserProfile, AuthError> {
        let user_id = session
            .user_id
            .ok_or_else(|| AuthError::InvalidTransition("session has no subject".to_string()))?;

        Ok(self
            .repository
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(user_id.to_string()))?)
    }

    async fn finish_step(
        &self,
        session: &AuthenticationSession,
        user: &UserProfile,
    ) -> Result<AuthOutcome, AuthError> {
        match session.state {
            AuthState::Granted => {
                self.repository.record_login(user.id, Utc::now()).await?;
                info!("Access granted to {}", user.username);
            }
            AuthState::Denied => {
                warn!("Access denied to {} ({:?})", user.username, session.denial_reason);
            }
            _ => {}
        }

        Ok(AuthOutcome {
            session_id: session.id,
            username: user.username.clone(),
            state: session.state,
            primary: session.primary.clone(),
            challenge: session.challenge.clone(),
            challenge_evaluation: session.challenge_evaluation.clone(),
            secret_question: (session.state == AuthState::AwaitingChallengeInput)
                .then(|| user.secret_question.clone()),
            denial_reason: session.denial_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryUserRepository;

    const MANTRA: &str = "open sesame";
    const ANSWER: &str = "rex";

    /// Deterministic jitter in [-8, 8] ms
    struct Jitter(u64);

    impl Jitter {
        fn next(&mut self) -> f64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((self.0 >> 33) % 17) as f64 - 8.0
        }
    }

    fn base_dwell(i: usize) -> f64 {
        85.0 + ((i * 37) % 60) as f64
    }

    fn base_flight(i: usize) -> f64 {
        60.0 + ((i * 53) % 150) as f64
    }

    /// Type `text` with the reference rhythm, shifted by the given offsets
    fn typed(text: &str, seed: u64, dwell_offset: f64, flight_offset: f64) -> CapturedAttempt {
        let mut jitter = Jitter(seed);
        let mut keystrokes = Vec::new();
        let mut t = 1_000.0;

        for (i, c) in text.chars().enumerate() {
            let press = t;
            let release = press + base_dwell(i) + dwell_offset + jitter.next();
            keystrokes.push(RawKeystroke::new(c, c as u32, press, release));
            t = release + base_flight(i) + flight_offset + jitter.next();
        }

        CapturedAttempt {
            typed_text: text.to_string(),
            keystrokes,
        }
    }

    fn service_with(config: Config) -> AuthService {
        AuthService::new(Arc::new(InMemoryUserRepository::new()), config)
    }

    async fn register(service: &AuthService, username: &str) -> UserProfile {
        let mut registration = service
            .start_registration(username, MANTRA, "First pet?", ANSWER)
            .await
            .unwrap();
        for seed in 0..5 {
            registration.add_attempt(&typed(MANTRA, seed, 0.0, 0.0)).unwrap();
        }
        assert_eq!(registration.phase(), EnrollmentPhase::Answer);
        for seed in 10..15 {
            registration.add_attempt(&typed(ANSWER, seed, 0.0, 0.0)).unwrap();
        }
        assert_eq!(registration.phase(), EnrollmentPhase::Complete);
        service.complete_registration(registration).await.unwrap()
    }

    #[tokio::test]
    async fn test_registration_builds_both_profiles() {
        let service = service_with(Config::default());
        let user = register(&service, "alice").await;

        assert_eq!(user.mantra_profile.sample_count, 5);
        assert_eq!(user.mantra_profile.text_length, MANTRA.len());
        assert_eq!(user.answer_profile.target_text, ANSWER);
        assert!(user.mantra_profile.quality >= 30);
        assert!(user.answer_profile.quality >= 30);
        assert_eq!(service.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_username_is_refused() {
        let service = service_with(Config::default());
        register(&service, "alice").await;
        let result = service.start_registration("ALICE", MANTRA, "q", "a").await;
        assert!(matches!(result, Err(AuthError::Store(StoreError::UsernameTaken(_)))));
    }

    #[tokio::test]
    async fn test_mistyped_calibration_is_not_counted() {
        let service = service_with(Config::default());
        let mut registration = service
            .start_registration("bob", MANTRA, "First pet?", ANSWER)
            .await
            .unwrap();

        let result = registration.add_attempt(&typed("open sesamr", 1, 0.0, 0.0));
        assert!(matches!(result, Err(AuthError::TextMismatch(_))));
        assert_eq!(registration.progress().mantra_attempts, 0);
    }

    #[tokio::test]
    async fn test_calibration_with_missing_keystrokes_is_not_counted() {
        let service = service_with(Config::default());
        let mut registration = service
            .start_registration("bob", MANTRA, "First pet?", ANSWER)
            .await
            .unwrap();

        // Text matches but only two positions were captured
        let mut short = typed(MANTRA, 1, 0.0, 0.0);
        short.keystrokes.truncate(2);
        let result = registration.add_attempt(&short);
        assert!(matches!(result, Err(AuthError::MalformedAttempt(_))));

        // Keystrokes bound to the wrong characters
        let mut shuffled = typed(MANTRA, 2, 0.0, 0.0);
        shuffled.keystrokes.reverse();
        let result = registration.add_attempt(&shuffled);
        assert!(matches!(result, Err(AuthError::MalformedAttempt(_))));

        assert_eq!(registration.progress().mantra_attempts, 0);
        registration.add_attempt(&typed(MANTRA, 3, 0.0, 0.0)).unwrap();
        assert_eq!(registration.progress().mantra_attempts, 1);
    }

    #[tokio::test]
    async fn test_padded_answer_is_not_counted() {
        let service = service_with(Config::default());
        let mut registration = service
            .start_registration("bob", MANTRA, "First pet?", ANSWER)
            .await
            .unwrap();
        for seed in 0..5 {
            registration.add_attempt(&typed(MANTRA, seed, 0.0, 0.0)).unwrap();
        }

        let result = registration.add_attempt(&typed(" rex", 40, 0.0, 0.0));
        assert!(matches!(result, Err(AuthError::TextMismatch(_))));
        assert_eq!(registration.progress().answer_attempts, 0);

        registration.add_attempt(&typed("REX", 41, 0.0, 0.0)).unwrap();
        assert_eq!(registration.progress().answer_attempts, 1);
    }

    #[test]
    fn test_answers_match_ignores_case_only() {
        assert!(answers_match("Rex", "rex"));
        assert!(!answers_match(" rex", "rex"));
        assert!(!answers_match("rex ", "rex"));
    }

    #[tokio::test]
    async fn test_low_quality_profile_is_discarded() {
        let mut config = Config::default();
        config.enrollment.min_profile_quality = 99;
        let service = service_with(config);
        let mut registration = service
            .start_registration("carol", MANTRA, "First pet?", ANSWER)
            .await
            .unwrap();

        for seed in 0..4 {
            registration.add_attempt(&typed(MANTRA, seed, 0.0, 0.0)).unwrap();
        }
        let result = registration.add_attempt(&typed(MANTRA, 4, 0.0, 0.0));
        assert!(matches!(
            result,
            Err(AuthError::Biometrics(BiometricsError::LowQualityProfile { minimum: 99, .. }))
        ));

        let progress = registration.progress();
        assert_eq!(progress.phase, EnrollmentPhase::Mantra);
        assert_eq!(progress.mantra_attempts, 0);
        assert!(matches!(
            registration.into_user(),
            Err(AuthError::RegistrationIncomplete(_))
        ));
    }

    #[tokio::test]
    async fn test_genuine_user_is_granted() {
        let service = service_with(Config::default());
        let user = register(&service, "alice").await;

        let mut session = service.begin_login("Alice").await.unwrap();
        let outcome = service
            .submit_mantra(&mut session, &typed(MANTRA, 99, 0.0, 0.0))
            .await
            .unwrap();

        assert_eq!(outcome.state, AuthState::Granted);
        assert!(outcome.secret_question.is_none());
        let primary = outcome.primary.unwrap();
        assert!(primary.liveness.is_human);
        assert!(primary.confidence >= 55);

        let stored = service.get_user("alice").await.unwrap();
        assert_eq!(stored.id, user.id);
        assert!(stored.last_login.is_some());
    }

    #[tokio::test]
    async fn test_impostor_is_denied() {
        let service = service_with(Config::default());
        register(&service, "alice").await;

        let mut session = service.begin_login("alice").await.unwrap();
        let outcome = service
            .submit_mantra(&mut session, &typed(MANTRA, 7, 150.0, 300.0))
            .await
            .unwrap();

        assert_eq!(outcome.state, AuthState::Denied);
        assert_eq!(outcome.denial_reason, Some(DenialReason::PrimaryRejected));
        assert!(service.get_user("alice").await.unwrap().last_login.is_none());
    }

    #[tokio::test]
    async fn test_borderline_rhythm_goes_through_challenge() {
        let service = service_with(Config::default());
        register(&service, "alice").await;

        let mut session = service.begin_login("alice").await.unwrap();
        let outcome = service
            .submit_mantra(&mut session, &typed(MANTRA, 21, 0.0, 40.0))
            .await
            .unwrap();
        assert_eq!(outcome.state, AuthState::AwaitingChallengeInput);
        assert_eq!(outcome.secret_question.as_deref(), Some("First pet?"));

        // Answer text is compared ignoring case
        let outcome = service
            .submit_answer(&mut session, &typed("Rex", 22, 0.0, 0.0))
            .await
            .unwrap();
        assert_eq!(outcome.state, AuthState::Granted);
        assert!(outcome.secret_question.is_none());
        let evaluation = outcome.challenge_evaluation.unwrap();
        assert!(evaluation.passed);
        assert!(evaluation.combined_distance < 0.9);

        // No third round
        assert!(service
            .submit_answer(&mut session, &typed(ANSWER, 23, 0.0, 0.0))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_challenge_with_wrong_rhythm_is_denied() {
        let service = service_with(Config::default());
        register(&service, "alice").await;

        let mut session = service.begin_login("alice").await.unwrap();
        service
            .submit_mantra(&mut session, &typed(MANTRA, 31, 0.0, 40.0))
            .await
            .unwrap();
        let outcome = service
            .submit_answer(&mut session, &typed(ANSWER, 32, 200.0, 400.0))
            .await
            .unwrap();

        assert_eq!(outcome.state, AuthState::Denied);
        assert_eq!(outcome.denial_reason, Some(DenialReason::ChallengeFailed));
    }

    #[tokio::test]
    async fn test_wrong_mantra_text_is_denied() {
        let service = service_with(Config::default());
        register(&service, "alice").await;

        let mut session = service.begin_login("alice").await.unwrap();
        let outcome = service
            .submit_mantra(&mut session, &typed("open sesamy", 3, 0.0, 0.0))
            .await
            .unwrap();
        assert_eq!(outcome.state, AuthState::Denied);
        assert_eq!(outcome.denial_reason, Some(DenialReason::TextMismatch));
        assert!(outcome.primary.is_none());
    }

    #[tokio::test]
    async fn test_login_with_missing_keystrokes_is_denied() {
        let service = service_with(Config::default());
        register(&service, "alice").await;

        let mut attempt = typed(MANTRA, 5, 0.0, 0.0);
        attempt.keystrokes.truncate(2);

        let mut session = service.begin_login("alice").await.unwrap();
        let outcome = service.submit_mantra(&mut session, &attempt).await.unwrap();
        assert_eq!(outcome.state, AuthState::Denied);
        assert_eq!(outcome.denial_reason, Some(DenialReason::TextMismatch));
        assert!(outcome.primary.is_none());
        assert!(service.get_user("alice").await.unwrap().last_login.is_none());
    }

    #[tokio::test]
    async fn test_unknown_user_and_out_of_order_input() {
        let service = service_with(Config::default());
        register(&service, "alice").await;

        assert!(matches!(
            service.begin_login("mallory").await,
            Err(AuthError::Store(StoreError::NotFound(_)))
        ));

        let mut session = service.begin_login("alice").await.unwrap();
        assert!(matches!(
            service.submit_answer(&mut session, &typed(ANSWER, 1, 0.0, 0.0)).await,
            Err(AuthError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_user() {
        let service = service_with(Config::default());
        let user = register(&service, "alice").await;
        service.delete_user(user.id).await.unwrap();
        assert!(service.list_users().await.unwrap().is_empty());
        assert!(service.delete_user(user.id).await.is_err());
    }
}
