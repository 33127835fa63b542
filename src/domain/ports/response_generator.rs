use async_trait::async_trait;
use serde::Serialize;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Action, Phase};

/// Everything the generation layer receives for one turn.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub phase: Phase,
    pub action: Action,
    /// Base persona text with the selected overlay appended.
    pub instructions: String,
    pub user_message: String,
}

/// Produces the reply prose for a committed decision.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> DomainResult<String>;
}
