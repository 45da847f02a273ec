use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Group is full: {0}")]
    Capacity(String),

    #[error("Precondition not met: {0}")]
    Precondition(String),

    #[error("Invalid state transition: {0}")]
    InvalidState(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Amount mismatch: expected {expected} minor units, got {actual}")]
    AmountMismatch { expected: i64, actual: i64 },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// True when the underlying database error is a unique-constraint
    /// violation. Order assignment treats this as an expected race and
    /// retries once instead of surfacing it.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            CoreError::Database(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == rusqlite::ErrorCode::ConstraintViolation
            }
            _ => false,
        }
    }
}
