//! In-memory ConversationRepository for tests and single-process use.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ConversationState;
use crate::domain::ports::ConversationRepository;

/// Same version semantics as the SQLite repository, without the disk.
#[derive(Debug, Default)]
pub struct InMemoryConversationRepository {
    sessions: RwLock<HashMap<Uuid, ConversationState>>,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn create(&self, state: &ConversationState) -> DomainResult<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&state.session_id) {
            return Err(DomainError::SessionAlreadyExists(state.session_id));
        }
        sessions.insert(state.session_id, state.clone());
        Ok(())
    }

    async fn get(&self, session_id: Uuid) -> DomainResult<Option<ConversationState>> {
        Ok(self.sessions.read().await.get(&session_id).cloned())
    }

    async fn commit(&self, state: &ConversationState) -> DomainResult<u64> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions
            .get_mut(&state.session_id)
            .ok_or(DomainError::SessionNotFound(state.session_id))?;

        if stored.version != state.version {
            return Err(DomainError::ConcurrencyConflict {
                session_id: state.session_id,
                expected_version: state.version,
            });
        }

        let mut next = state.clone();
        next.version = state.version + 1;
        *stored = next;
        Ok(state.version + 1)
    }

    async fn list(&self, limit: usize) -> DomainResult<Vec<ConversationState>> {
        let mut all: Vec<_> = self.sessions.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        all.truncate(limit);
        Ok(all)
    }

    async fn delete(&self, session_id: Uuid) -> DomainResult<()> {
        self.sessions
            .write()
            .await
            .remove(&session_id)
            .map(|_| ())
            .ok_or(DomainError::SessionNotFound(session_id))
    }
}
