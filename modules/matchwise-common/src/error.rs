use thiserror::Error;
use uuid::Uuid;

/// Malformed input, rejected before anything is written.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{0} id must not be nil")]
    NilId(&'static str),

    #[error("provider and seeker are the same profile: {0}")]
    SelfPair(Uuid),

    #[error("score {0} is outside [0, 1]")]
    ScoreOutOfRange(f64),

    #[error("profile {0} has an empty display name")]
    EmptyDisplayName(Uuid),

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("unknown profile: {0}")]
    UnknownProfile(Uuid),

    #[error("recommendation {0} was already converted")]
    AlreadyConverted(Uuid),

    #[error("relationship {0} is closed and cannot change status")]
    ClosedRelationship(Uuid),
}

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0:#}")]
    Store(anyhow::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl MatchError {
    pub fn store(err: anyhow::Error) -> Self {
        MatchError::Store(err)
    }
}
