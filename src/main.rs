use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use keystroke_auth::biometrics::BiometricsError;
use keystroke_auth::config;
use keystroke_auth::db::JsonUserRepository;
use keystroke_auth::models::CapturedAttempt;
use keystroke_auth::security::{AuthError, AuthService, AuthState, PrimaryDecision};
use keystroke_auth::utils::{self, logging};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a user from captured calibration attempts
    Enroll {
        #[arg(long)]
        username: String,
        #[arg(long)]
        mantra: String,
        #[arg(long)]
        question: String,
        #[arg(long)]
        answer: String,
        /// JSON array of captured mantra attempts
        #[arg(long)]
        mantra_attempts: PathBuf,
        /// JSON array of captured secret-answer attempts
        #[arg(long)]
        answer_attempts: PathBuf,
    },

    /// Authenticate a user from a captured mantra (and optional answer) attempt
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        mantra_attempt: PathBuf,
        #[arg(long)]
        answer_attempt: Option<PathBuf>,
    },

    /// Score many captured attempts against a stored profile
    Evaluate {
        #[arg(long)]
        username: String,
        #[arg(long)]
        attempts: PathBuf,
        #[arg(long, value_enum, default_value_t = Phrase::Mantra)]
        phrase: Phrase,
    },

    /// Manage registered users
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },
}

#[derive(Subcommand)]
enum UsersAction {
    /// List registered users
    List,
    /// Delete a user by id
    Delete { id: Uuid },
}

#[derive(Clone, Copy, ValueEnum)]
enum Phrase {
    Mantra,
    Answer,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => config::load_config_from(Some(path.as_path()))?,
        None => config::load_config()?,
    };

    // Initialize logging
    logging::init_logger(&config.log_level.0);

    let repository = JsonUserRepository::open(&config.storage.data_dir)
        .await
        .context("Failed to open user store")?;
    let service = AuthService::new(Arc::new(repository), config);

    match cli.command {
        Command::Enroll {
            username,
            mantra,
            question,
            answer,
            mantra_attempts,
            answer_attempts,
        } => {
            let mantra_attempts: Vec<CapturedAttempt> = read_json(&mantra_attempts)?;
            let answer_attempts: Vec<CapturedAttempt> = read_json(&answer_attempts)?;
            let phrases = Phrases {
                mantra: &mantra,
                question: &question,
                answer: &answer,
            };
            enroll(&service, &username, phrases, &mantra_attempts, &answer_attempts).await?;
        }
        Command::Login {
            username,
            mantra_attempt,
            answer_attempt,
        } => {
            let mantra_attempt: CapturedAttempt = read_json(&mantra_attempt)?;
            let answer_attempt: Option<CapturedAttempt> = answer_attempt
                .as_deref()
                .map(read_json::<CapturedAttempt>)
                .transpose()?;
            login(&service, &username, &mantra_attempt, answer_attempt.as_ref()).await?;
        }
        Command::Evaluate {
            username,
            attempts,
            phrase,
        } => {
            let attempts: Vec<CapturedAttempt> = read_json(&attempts)?;
            evaluate(&service, &username, &attempts, phrase).await?;
        }
        Command::Users { action } => match action {
            UsersAction::List => {
                let users = service.list_users().await?;
                let users: Vec<UserSummary> = users.iter().map(UserSummary::from).collect();
                print_json(&users)?;
            }
            UsersAction::Delete { id } => {
                service.delete_user(id).await?;
                print_json(&serde_json::json!({ "deleted": id }))?;
            }
        },
    }

    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserSummary {
    id: Uuid,
    username: String,
    secret_question: String,
    mantra_quality: u32,
    answer_quality: u32,
    created_at: chrono::DateTime<chrono::Utc>,
    last_login: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<&keystroke_auth::models::UserProfile> for UserSummary {
    fn from(user: &keystroke_auth::models::UserProfile) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            secret_question: user.secret_question.clone(),
            mantra_quality: user.mantra_profile.quality,
            answer_quality: user.answer_profile.quality,
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

/// Texts a user picks at enrollment
struct Phrases<'a> {
    mantra: &'a str,
    question: &'a str,
    answer: &'a str,
}

async fn enroll(
    service: &AuthService,
    username: &str,
    phrases: Phrases<'_>,
    mantra_attempts: &[CapturedAttempt],
    answer_attempts: &[CapturedAttempt],
) -> Result<()> {
    let mut registration = service
        .start_registration(username, phrases.mantra, phrases.question, phrases.answer)
        .await?;
    info!("Enrolling {}", registration.username());

    for attempt in mantra_attempts.iter().chain(answer_attempts) {
        match registration.add_attempt(attempt) {
            Ok(progress) => info!(
                "Calibration progress: {:?} mantra {}/{} answer {}/{}",
                progress.phase,
                progress.mantra_attempts,
                progress.required_attempts,
                progress.answer_attempts,
                progress.required_attempts
            ),
            Err(AuthError::TextMismatch(what)) => {
                warn!("Skipping calibration attempt with mistyped {}", what)
            }
            Err(AuthError::MalformedAttempt(what)) => {
                warn!("Skipping calibration attempt with malformed {} keystrokes", what)
            }
            Err(AuthError::Biometrics(BiometricsError::LowQualityProfile { quality, minimum })) => {
                bail!(
                    "Calibration too inconsistent (quality {} < {}); capture the attempts again",
                    quality,
                    minimum
                );
            }
            Err(AuthError::InvalidTransition(_)) => break,
            Err(e) => return Err(e.into()),
        }
    }

    let user = service.complete_registration(registration).await?;
    print_json(&UserSummary::from(&user))
}

async fn login(
    service: &AuthService,
    username: &str,
    mantra_attempt: &CapturedAttempt,
    answer_attempt: Option<&CapturedAttempt>,
) -> Result<()> {
    let mut session = service.begin_login(username).await?;
    let mut outcome = service.submit_mantra(&mut session, mantra_attempt).await?;

    if outcome.state == AuthState::AwaitingChallengeInput {
        match answer_attempt {
            Some(attempt) => outcome = service.submit_answer(&mut session, attempt).await?,
            None => info!("Challenge required; rerun with --answer-attempt"),
        }
    }

    print_json(&outcome)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluationReport {
    username: String,
    attempts: usize,
    accepted: usize,
    challenged: usize,
    rejected: usize,
    non_human: usize,
    mean_confidence: f64,
    mean_distance: f64,
}

async fn evaluate(
    service: &AuthService,
    username: &str,
    attempts: &[CapturedAttempt],
    phrase: Phrase,
) -> Result<()> {
    let user = service.get_user(username).await?;
    let profile = match phrase {
        Phrase::Mantra => &user.mantra_profile,
        Phrase::Answer => &user.answer_profile,
    };
    let policy = service.policy();

    // Scoring is pure, so attempts are scored in parallel
    let results: Vec<_> = attempts
        .par_iter()
        .map(|attempt| service.score_attempt(attempt, profile))
        .collect();

    let decisions: Vec<PrimaryDecision> =
        results.iter().map(|r| policy.evaluate_primary(r)).collect();
    let count = |wanted: PrimaryDecision| decisions.iter().filter(|d| **d == wanted).count();
    let confidences: Vec<f64> = results.iter().map(|r| r.confidence as f64).collect();
    let distances: Vec<f64> = results.iter().map(|r| r.distance).collect();

    print_json(&EvaluationReport {
        username: user.username.clone(),
        attempts: results.len(),
        accepted: count(PrimaryDecision::Accept),
        challenged: count(PrimaryDecision::Challenge),
        rejected: count(PrimaryDecision::Reject),
        non_human: results.iter().filter(|r| !r.liveness.is_human).count(),
        mean_confidence: utils::mean(&confidences),
        mean_distance: utils::mean(&distances),
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
