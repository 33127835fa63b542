//! Domain errors for the advisor engine.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur while processing a conversation.
///
/// Gate violations and malformed analysis are not errors: the decision
/// engine turns both into ordinary control flow.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Session already exists: {0}")]
    SessionAlreadyExists(Uuid),

    #[error("Concurrency conflict: session {session_id} was modified (expected version {expected_version})")]
    ConcurrencyConflict { session_id: Uuid, expected_version: u64 },

    #[error("Invalid conversation state for session {session_id}: {reason}")]
    InvalidState { session_id: Uuid, reason: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Message analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Response generation failed: {0}")]
    GenerationFailed(String),
}

impl DomainError {
    /// Whether the caller may re-read state and try the same turn again.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }

    /// Whether this failure belongs to the persistence layer and should be
    /// shown to the end user as a generic retry prompt.
    pub const fn is_persistence_failure(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict { .. } | Self::DatabaseError(_) | Self::SerializationError(_)
        )
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
