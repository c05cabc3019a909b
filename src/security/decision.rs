// Two-stage accept / challenge / reject policy over match results

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthError;
use crate::biometrics::confidence_from_distance;
use crate::config::DecisionThresholds;
use crate::models::{MatchResult, UserId};

// Authentication session state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthState {
    SelectSubject,
    AwaitingPrimaryInput,
    AwaitingChallengeInput,
    Granted,
    Denied,
}

impl AuthState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuthState::Granted | AuthState::Denied)
    }
}

// Verdict after the primary phrase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrimaryDecision {
    Accept,
    Challenge,
    Reject,
}

// Why a session ended in Denied
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialReason {
    PrimaryRejected,
    ChallengeFailed,
    TextMismatch,
}

/// Combined score of the primary and challenge stages
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeEvaluation {
    pub combined_distance: f64,
    pub combined_confidence: u32,
    pub passed: bool,
}

/// Pure decision rules, parameterised by thresholds
#[derive(Clone, Debug, Default)]
pub struct DecisionPolicy {
    thresholds: DecisionThresholds,
}

impl DecisionPolicy {
    pub fn new(thresholds: DecisionThresholds) -> Self {
        Self { thresholds }
    }

    pub fn evaluate_primary(&self, result: &MatchResult) -> PrimaryDecision {
        let t = &self.thresholds;
        let liveness = &result.liveness;

        if result.distance < t.accept_distance
            && result.confidence >= t.accept_confidence
            && liveness.is_human
        {
            return PrimaryDecision::Accept;
        }

        if result.distance > t.reject_distance
            || result.confidence < t.reject_confidence
            || (!liveness.is_human && liveness.score < t.reject_liveness_score)
        {
            return PrimaryDecision::Reject;
        }

        PrimaryDecision::Challenge
    }

    pub fn evaluate_challenge(
        &self,
        primary_distance: f64,
        answer: &MatchResult,
    ) -> ChallengeEvaluation {
        let t = &self.thresholds;
        let combined_distance =
            primary_distance * t.mantra_weight + answer.distance * t.answer_weight;
        let combined_confidence = confidence_from_distance(combined_distance);

        let liveness_ok =
            answer.liveness.is_human || answer.liveness.score >= t.challenge_liveness_floor;
        let passed = combined_distance < t.challenge_pass_distance
            && combined_confidence >= t.challenge_pass_confidence
            && liveness_ok;

        ChallengeEvaluation {
            combined_distance,
            combined_confidence,
            passed,
        }
    }
}

/// One login attempt moving through the decision states
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationSession {
    pub id: Uuid,
    pub state: AuthState,
    pub user_id: Option<UserId>,
    pub username: Option<String>,
    pub primary: Option<MatchResult>,
    pub challenge: Option<MatchResult>,
    pub challenge_evaluation: Option<ChallengeEvaluation>,
    pub denial_reason: Option<DenialReason>,
    pub started_at: DateTime<Utc>,
}

impl AuthenticationSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: AuthState::SelectSubject,
            user_id: None,
            username: None,
            primary: None,
            challenge: None,
            challenge_evaluation: None,
            denial_reason: None,
            started_at: Utc::now(),
        }
    }

    pub fn select_subject(
        &mut self,
        user_id: UserId,
        username: &str,
    ) -> Result<AuthState, AuthError> {
        self.expect_state(AuthState::SelectSubject)?;
        self.user_id = Some(user_id);
        self.username = Some(username.to_string());
        self.state = AuthState::AwaitingPrimaryInput;
        Ok(self.state)
    }

    pub fn record_primary(
        &mut self,
        policy: &DecisionPolicy,
        result: MatchResult,
    ) -> Result<AuthState, AuthError> {
        self.expect_state(AuthState::AwaitingPrimaryInput)?;

        let decision = policy.evaluate_primary(&result);
        info!(
            "Session {}: primary distance {:.3}, confidence {} -> {:?}",
            self.id, result.distance, result.confidence, decision
        );

        self.primary = Some(result);
        self.state = match decision {
            PrimaryDecision::Accept => AuthState::Granted,
            PrimaryDecision::Challenge => AuthState::AwaitingChallengeInput,
            PrimaryDecision::Reject => {
                self.denial_reason = Some(DenialReason::PrimaryRejected);
                AuthState::Denied
            }
        };
        Ok(self.state)
    }

    /// The challenge outcome is final; there is no third round
    pub fn record_challenge(
        &mut self,
        policy: &DecisionPolicy,
        result: MatchResult,
    ) -> Result<AuthState, AuthError> {
        self.expect_state(AuthState::AwaitingChallengeInput)?;

        let primary_distance = self.primary.as_ref().map(|p| p.distance).ok_or_else(|| {
            AuthError::InvalidTransition("challenge recorded without a primary result".to_string())
        })?;

        let evaluation = policy.evaluate_challenge(primary_distance, &result);
        info!(
            "Session {}: combined distance {:.3}, confidence {} -> {}",
            self.id,
            evaluation.combined_distance,
            evaluation.combined_confidence,
            if evaluation.passed { "passed" } else { "failed" }
        );

        self.state = if evaluation.passed {
            AuthState::Granted
        } else {
            self.denial_reason = Some(DenialReason::ChallengeFailed);
            AuthState::Denied
        };
        self.challenge = Some(result);
        self.challenge_evaluation = Some(evaluation);
        Ok(self.state)
    }

    /// End the session without scoring, e.g. when the typed text was wrong
    pub fn deny(&mut self, reason: DenialReason) -> Result<AuthState, AuthError> {
        if self.state.is_terminal() || self.state == AuthState::SelectSubject {
            return Err(self.invalid_transition("deny"));
        }
        self.denial_reason = Some(reason);
        self.state = AuthState::Denied;
        Ok(self.state)
    }

    fn expect_state(&self, expected: AuthState) -> Result<(), AuthError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.invalid_transition(&format!("{:?}", expected)))
        }
    }

    fn invalid_transition(&self, wanted: &str) -> AuthError {
        AuthError::InvalidTransition(format!(
            "session {} is in state {:?}, cannot {}",
            self.id, self.state, wanted
        ))
    }
}

impl Default for AuthenticationSession {
    fn default() -> Self {
        Self::new()
    }
}
