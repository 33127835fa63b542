//! SQLite implementation of the ConversationRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::parse_uuid;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ConversationState, Phase};
use crate::domain::ports::ConversationRepository;

#[derive(Clone)]
pub struct SqliteConversationRepository {
    pool: SqlitePool,
}

impl SqliteConversationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn exists(&self, session_id: Uuid) -> DomainResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM conversation_sessions WHERE id = ?")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ConversationRow {
    id: String,
    version: i64,
    phase: String,
    state_json: String,
}

/// Rebuild a state from its row. A record that does not describe a valid
/// state is reported as such rather than as a decoding failure.
fn row_to_state(row: ConversationRow) -> DomainResult<ConversationState> {
    let session_id = parse_uuid(&row.id)?;
    let invalid = |reason: String| DomainError::InvalidState { session_id, reason };

    let phase: Phase = row.phase.parse().map_err(invalid)?;
    let mut state: ConversationState = serde_json::from_str(&row.state_json)
        .map_err(|e| invalid(format!("unreadable state document: {e}")))?;

    if state.session_id != session_id || state.phase != phase {
        return Err(invalid(format!(
            "state document disagrees with row (phase column {phase}, document {})",
            state.phase
        )));
    }

    state.version = u64::try_from(row.version)
        .map_err(|_| invalid(format!("negative version {}", row.version)))?;
    Ok(state)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl ConversationRepository for SqliteConversationRepository {
    async fn create(&self, state: &ConversationState) -> DomainResult<()> {
        if self.exists(state.session_id).await? {
            return Err(DomainError::SessionAlreadyExists(state.session_id));
        }

        let state_json = serde_json::to_string(state)?;
        sqlx::query(
            r#"INSERT INTO conversation_sessions
               (id, version, phase, turns_total, constraint_category, business_name,
                state_json, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(state.session_id.to_string())
        .bind(to_i64(state.version))
        .bind(state.phase.as_str())
        .bind(i64::from(state.turns_total))
        .bind(state.constraint_category.map(|c| c.as_str()))
        .bind(&state.module0_context.business_name)
        .bind(&state_json)
        .bind(state.created_at.to_rfc3339())
        .bind(state.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, session_id: Uuid) -> DomainResult<Option<ConversationState>> {
        let row: Option<ConversationRow> = sqlx::query_as(
            "SELECT id, version, phase, state_json FROM conversation_sessions WHERE id = ?",
        )
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_state).transpose()
    }

    async fn commit(&self, state: &ConversationState) -> DomainResult<u64> {
        let state_json = serde_json::to_string(state)?;
        let result = sqlx::query(
            r#"UPDATE conversation_sessions
               SET version = version + 1, phase = ?, turns_total = ?,
                   constraint_category = ?, state_json = ?, updated_at = ?
               WHERE id = ? AND version = ?"#,
        )
        .bind(state.phase.as_str())
        .bind(i64::from(state.turns_total))
        .bind(state.constraint_category.map(|c| c.as_str()))
        .bind(&state_json)
        .bind(state.updated_at.to_rfc3339())
        .bind(state.session_id.to_string())
        .bind(to_i64(state.version))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return if self.exists(state.session_id).await? {
                Err(DomainError::ConcurrencyConflict {
                    session_id: state.session_id,
                    expected_version: state.version,
                })
            } else {
                Err(DomainError::SessionNotFound(state.session_id))
            };
        }

        Ok(state.version + 1)
    }

    async fn list(&self, limit: usize) -> DomainResult<Vec<ConversationState>> {
        let rows: Vec<ConversationRow> = sqlx::query_as(
            r#"SELECT id, version, phase, state_json FROM conversation_sessions
               ORDER BY updated_at DESC LIMIT ?"#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_state).collect()
    }

    async fn delete(&self, session_id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM conversation_sessions WHERE id = ?")
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::SessionNotFound(session_id));
        }
        Ok(())
    }
}
