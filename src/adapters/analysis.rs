//! Analyzer adapters.

use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ConversationState, UnifiedAnalysis};
use crate::domain::ports::MessageAnalyzer;

/// Replays prepared analyses in order; neutral once the script runs out.
///
/// Used by the CLI's `--analysis` flag and by tests.
#[derive(Debug, Default)]
pub struct ScriptedAnalyzer {
    script: Mutex<VecDeque<UnifiedAnalysis>>,
}

impl ScriptedAnalyzer {
    pub fn new(script: impl IntoIterator<Item = UnifiedAnalysis>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
        }
    }

    /// One analysis parsed leniently from JSON.
    pub fn from_json(raw: &str) -> Self {
        Self::new([UnifiedAnalysis::from_json_str(raw)])
    }

    pub async fn push(&self, analysis: UnifiedAnalysis) {
        self.script.lock().await.push_back(analysis);
    }

    pub async fn remaining(&self) -> usize {
        self.script.lock().await.len()
    }
}

#[async_trait]
impl MessageAnalyzer for ScriptedAnalyzer {
    async fn analyze(
        &self,
        _state: &ConversationState,
        _message: &str,
    ) -> DomainResult<UnifiedAnalysis> {
        Ok(self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(UnifiedAnalysis::neutral))
    }
}
