use crate::definitions::DefinitionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Insufficient resources: {detail}")]
    InsufficientResources { detail: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Invalid definitions: {0}")]
    InvalidDefinitions(#[from] DefinitionError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SimError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest { reason: reason.into() }
    }

    pub fn insufficient(detail: impl Into<String>) -> Self {
        Self::InsufficientResources { detail: detail.into() }
    }
}

pub type SimResult<T> = Result<T, SimError>;
