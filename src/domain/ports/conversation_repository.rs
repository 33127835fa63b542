use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::ConversationState;

/// Repository interface for conversation state persistence.
///
/// Commits are all-or-nothing per turn and guarded by the state's
/// `version`: a writer that read an older version loses.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Persist a new session.
    ///
    /// # Errors
    /// `SessionAlreadyExists` if the id is taken.
    async fn create(&self, state: &ConversationState) -> DomainResult<()>;

    /// Read the current state of a session.
    async fn get(&self, session_id: Uuid) -> DomainResult<Option<ConversationState>>;

    /// Replace the stored state if its version still equals `state.version`.
    ///
    /// Returns the new version on success.
    ///
    /// # Errors
    /// `ConcurrencyConflict` when another writer committed first,
    /// `SessionNotFound` when the session does not exist.
    async fn commit(&self, state: &ConversationState) -> DomainResult<u64>;

    /// Most recently updated sessions first.
    async fn list(&self, limit: usize) -> DomainResult<Vec<ConversationState>>;

    /// Remove a session.
    async fn delete(&self, session_id: Uuid) -> DomainResult<()>;
}
