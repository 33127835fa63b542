pub mod component_rules;
pub mod cross_mapping;
pub mod decision_engine;
pub mod overlay_registry;
pub mod variety;

pub use component_rules::{
    builtin_rules, ComponentOutcome, ComponentRegistry, ComponentRuleEngine, RegistryDocument,
};
pub use cross_mapping::{detect_upstream_constraint, should_attempt_cross_mapping};
pub use decision_engine::{DecisionEngine, GateOutcome};
pub use overlay_registry::OverlayRegistry;
pub use variety::should_skip_reflection;
