//! Domain errors for the circuit engine.

use thiserror::Error;

/// Coarse classification of a [`DomainError`], used by the request layer to
/// pick a response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidOperation,
    Unauthorized,
    Conflict,
    Internal,
}

impl ErrorKind {
    /// HTTP-like status code for this kind.
    pub const fn status_code(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::InvalidOperation => 400,
            Self::Unauthorized => 403,
            Self::Conflict => 409,
            Self::Internal => 500,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidOperation => "invalid_operation",
            Self::Unauthorized => "unauthorized",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        }
    }
}

/// Domain-level errors that can occur in the circuit engine.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Circuit not found: {0}")]
    CircuitNotFound(i64),

    #[error("Status not found: {0}")]
    StatusNotFound(i64),

    #[error("Step not found: {0}")]
    StepNotFound(i64),

    #[error("Action not found: {0}")]
    ActionNotFound(i64),

    #[error("Document not found: {0}")]
    DocumentNotFound(i64),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Concurrency conflict: {entity} {id} was modified")]
    ConcurrencyConflict { entity: String, id: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::CircuitNotFound(_)
            | Self::StatusNotFound(_)
            | Self::StepNotFound(_)
            | Self::ActionNotFound(_)
            | Self::DocumentNotFound(_) => ErrorKind::NotFound,
            Self::InvalidOperation(_) | Self::ValidationFailed(_) => ErrorKind::InvalidOperation,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::ConcurrencyConflict { .. } => ErrorKind::Conflict,
            Self::DatabaseError(_) | Self::SerializationError(_) => ErrorKind::Internal,
        }
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DomainError::InvalidOperation(format!("Duplicate key: {}", db.message()))
            }
            other => DomainError::DatabaseError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
