pub mod action;
pub mod analysis;
pub mod component;
pub mod config;
pub mod conversation;
pub mod decision;
pub mod effective;
pub mod phase;

pub use action::{Action, PushbackLevel};
pub use analysis::{UnifiedAnalysis, ANALYSIS_SCHEMA_VERSION};
pub use component::{
    ComponentContext, ComponentFlags, ComponentPolicy, ComponentRule, ComponentType,
    PolicyConstraint, RenderedComponent, RuleCondition, ScoreKind, TriggerPoint,
};
pub use config::{
    ComponentsConfig, Config, CoordinatorConfig, DatabaseConfig, EngineConfig, LoggingConfig,
    OverlaysConfig,
};
pub use conversation::{
    ClosingSequence, ClosingStep, ClosingTrack, ConversationState, CrossMapPair, Module0Context,
    ScoreDelta, Scores, VarietyTracker, SURFACE_HISTORY_LIMIT,
};
pub use decision::{CounterUpdate, Decision, DecisionRule, OverlayKey, PhaseTransition, StateDelta};
pub use effective::EffectiveState;
pub use phase::{ConstraintCategory, Phase};
