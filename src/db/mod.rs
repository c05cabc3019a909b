// User record storage

pub mod repositories;

use thiserror::Error;

pub use repositories::{InMemoryUserRepository, JsonUserRepository, UserRepository};

/// Error types for the user store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
