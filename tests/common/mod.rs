//! Common test utilities for integration tests
//!
//! Shared fixtures and builders used across the integration test files.

#![allow(dead_code)]

use std::sync::Arc;

use constraint_advisor::adapters::{
    InMemoryConversationRepository, OverlayEchoGenerator, ScriptedAnalyzer,
};
use constraint_advisor::application::TurnCoordinator;
use constraint_advisor::domain::models::{
    ConstraintCategory, ConversationState, CoordinatorConfig, Module0Context, Phase,
    UnifiedAnalysis,
};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Fresh state placed in `phase`, as if `turns_total` turns had passed.
pub fn state_in(phase: Phase) -> ConversationState {
    let mut state = ConversationState::new(Module0Context::default(), 3);
    state.phase = phase;
    state.turns_total = 5;
    state
}

/// Intake answers for a small business that believes strategy is the issue.
pub fn module0() -> Module0Context {
    Module0Context {
        business_name: "Harbor Bakery".to_string(),
        business_stage: "growth".to_string(),
        stated_challenge: "orders slip and the team is always firefighting".to_string(),
        self_reported_constraint: Some(ConstraintCategory::Strategy),
    }
}

pub fn neutral() -> UnifiedAnalysis {
    UnifiedAnalysis::neutral()
}

pub fn affirms() -> UnifiedAnalysis {
    UnifiedAnalysis {
        affirms_hypothesis: true,
        ..Default::default()
    }
}

pub fn rejects() -> UnifiedAnalysis {
    UnifiedAnalysis {
        rejects_hypothesis: true,
        ..Default::default()
    }
}

pub fn low_effort() -> UnifiedAnalysis {
    UnifiedAnalysis {
        low_effort: true,
        ..Default::default()
    }
}

/// Retry settings that keep conflict tests fast.
pub fn fast_retries(max_commit_retries: u32) -> CoordinatorConfig {
    CoordinatorConfig {
        max_commit_retries,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
    }
}

/// Coordinator over an in-memory repository replaying `script`.
pub fn in_memory_coordinator(
    script: Vec<UnifiedAnalysis>,
) -> (
    Arc<InMemoryConversationRepository>,
    TurnCoordinator<InMemoryConversationRepository>,
) {
    let repository = Arc::new(InMemoryConversationRepository::new());
    let coordinator = TurnCoordinator::new(
        Arc::clone(&repository),
        Arc::new(ScriptedAnalyzer::new(script)),
        Arc::new(OverlayEchoGenerator),
    )
    .with_config(fast_retries(3));
    (repository, coordinator)
}
