//! Constraint advisor - orchestration engine for a diagnostic dialogue
//!
//! Each user message runs through a turn pipeline: signal analysis, a
//! deterministic decision over a monotonic phase machine, component rule
//! evaluation, an optimistic commit of the new state, and response
//! generation from a prompt overlay.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Conversation state, decisions and port traits
//! - **Service Layer** (`services`): Pure decision, cross-mapping and component engines
//! - **Application Layer** (`application`): The turn coordinator
//! - **Adapters** (`adapters`): SQLite and in-memory persistence, analyzer and generator stand-ins
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use constraint_advisor::adapters::{InMemoryConversationRepository, OverlayEchoGenerator, ScriptedAnalyzer};
//! use constraint_advisor::application::TurnCoordinator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let coordinator = TurnCoordinator::new(
//!         Arc::new(InMemoryConversationRepository::new()),
//!         Arc::new(ScriptedAnalyzer::default()),
//!         Arc::new(OverlayEchoGenerator),
//!     );
//!     let session = coordinator.start_session(Default::default()).await?;
//!     let turn = coordinator.process_turn(session.session_id, "We keep missing deadlines").await?;
//!     println!("{}", turn.reply);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{TurnCoordinator, TurnResponse};
pub use domain::models::{
    Action, Config, ConstraintCategory, ConversationState, Decision, DecisionRule,
    EffectiveState, Module0Context, Phase, UnifiedAnalysis,
};
pub use domain::ports::{ConversationRepository, MessageAnalyzer, ResponseGenerator};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{ComponentRegistry, ComponentRuleEngine, DecisionEngine, OverlayRegistry};
