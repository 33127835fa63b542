use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ConversationState, UnifiedAnalysis};

/// Turns the user's latest message into structured signals.
///
/// A failure here never aborts a turn; the coordinator substitutes
/// neutral signals.
#[async_trait]
pub trait MessageAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        state: &ConversationState,
        message: &str,
    ) -> DomainResult<UnifiedAnalysis>;
}
