//! Component rule engine.
//!
//! Picks the auxiliary UI components that accompany a committed turn.
//! Rules are grouped by trigger point and scanned in descending priority;
//! the first rule whose condition holds claims its component type for the
//! turn. The type's policy then gets a hard veto, and a vetoed type is not
//! retried with a lower-priority rule.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Action, ClosingTrack, ComponentContext, ComponentFlags, ComponentPolicy, ComponentRule,
    ComponentType, Phase, PolicyConstraint, RenderedComponent, RuleCondition, TriggerPoint,
};

/// On-disk shape of a rule registry file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryDocument {
    #[serde(default)]
    pub rules: Vec<ComponentRule>,
    #[serde(default)]
    pub policies: Vec<ComponentPolicy>,
}

/// Immutable rule and policy set, built once at startup.
#[derive(Debug, Clone)]
pub struct ComponentRegistry {
    rules: HashMap<TriggerPoint, Vec<ComponentRule>>,
    policies: HashMap<ComponentType, ComponentPolicy>,
}

impl ComponentRegistry {
    /// Build a registry, rejecting duplicate rule names, duplicate policies
    /// and empty turn windows.
    pub fn new(rules: Vec<ComponentRule>, policies: Vec<ComponentPolicy>) -> DomainResult<Self> {
        let mut names = HashSet::new();
        for rule in &rules {
            if rule.name.trim().is_empty() {
                return Err(DomainError::ValidationFailed(
                    "component rule name cannot be empty".to_string(),
                ));
            }
            if !names.insert(rule.name.as_str()) {
                return Err(DomainError::ValidationFailed(format!(
                    "duplicate component rule name: {}",
                    rule.name
                )));
            }
        }

        let mut by_component = HashMap::new();
        for policy in policies {
            for constraint in &policy.constraints {
                if let PolicyConstraint::TurnWindow { min, max } = constraint {
                    if min > max {
                        return Err(DomainError::ValidationFailed(format!(
                            "policy for {} has an empty turn window {min}..={max}",
                            policy.component
                        )));
                    }
                }
            }
            let component = policy.component;
            if by_component.insert(component, policy).is_some() {
                return Err(DomainError::ValidationFailed(format!(
                    "more than one policy for component {component}"
                )));
            }
        }

        Ok(Self::assemble(rules, by_component))
    }

    fn assemble(
        rules: Vec<ComponentRule>,
        policies: HashMap<ComponentType, ComponentPolicy>,
    ) -> Self {
        let mut by_trigger: HashMap<TriggerPoint, Vec<ComponentRule>> = HashMap::new();
        for rule in rules {
            by_trigger.entry(rule.trigger).or_default().push(rule);
        }
        // Stable: equal priorities keep declaration order.
        for list in by_trigger.values_mut() {
            list.sort_by_key(|r| Reverse(r.priority));
        }
        Self {
            rules: by_trigger,
            policies,
        }
    }

    pub fn from_document(doc: RegistryDocument) -> DomainResult<Self> {
        Self::new(doc.rules, doc.policies)
    }

    pub fn from_yaml_str(yaml: &str) -> DomainResult<Self> {
        let doc: RegistryDocument = serde_yaml::from_str(yaml)
            .map_err(|e| DomainError::ValidationFailed(format!("invalid rule registry: {e}")))?;
        Self::from_document(doc)
    }

    /// The rule set shipped with the advisor.
    pub fn builtin() -> Self {
        let (rules, policies) = builtin_rules();
        let by_component = policies.into_iter().map(|p| (p.component, p)).collect();
        Self::assemble(rules, by_component)
    }

    /// Rules for `trigger`, highest priority first.
    pub fn rules_for(&self, trigger: TriggerPoint) -> &[ComponentRule] {
        self.rules
            .get(&trigger)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn policy_for(&self, component: ComponentType) -> Option<&ComponentPolicy> {
        self.policies.get(&component)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// What one evaluation produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentOutcome {
    pub rendered: Vec<RenderedComponent>,
    /// Single-use types rendered this turn; merged into the session's flags
    /// at commit.
    pub flags: ComponentFlags,
}

pub struct ComponentRuleEngine {
    registry: Arc<ComponentRegistry>,
}

impl ComponentRuleEngine {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Select and render components for one trigger point.
    ///
    /// Reads the context only; flag changes are returned, not applied.
    pub fn evaluate(&self, trigger: TriggerPoint, ctx: &ComponentContext<'_>) -> ComponentOutcome {
        let mut outcome = ComponentOutcome::default();
        let mut claimed = BTreeSet::new();

        for rule in self.registry.rules_for(trigger) {
            if claimed.contains(&rule.component) || !rule.condition.holds(ctx) {
                continue;
            }
            claimed.insert(rule.component);

            let permissive;
            let policy = match self.registry.policy_for(rule.component) {
                Some(policy) => policy,
                None => {
                    permissive = ComponentPolicy::permissive(rule.component);
                    &permissive
                }
            };

            if let Some(violation) = policy.first_violation(ctx) {
                debug!(
                    session_id = %ctx.state.session_id,
                    rule = %rule.name,
                    component = %rule.component,
                    ?violation,
                    "component vetoed by policy"
                );
                continue;
            }

            if policy.is_single_use() {
                outcome.flags.mark_shown(rule.component);
            }
            debug!(
                session_id = %ctx.state.session_id,
                rule = %rule.name,
                component = %rule.component,
                %trigger,
                "component selected"
            );
            outcome.rendered.push(render(rule, trigger, ctx));
        }

        outcome
    }
}

fn render(
    rule: &ComponentRule,
    trigger: TriggerPoint,
    ctx: &ComponentContext<'_>,
) -> RenderedComponent {
    let category = ctx
        .state
        .constraint_category
        .or(ctx.state.hypothesis)
        .map_or("undetermined", |c| c.as_str());
    let text = rule
        .text
        .replace("{category}", category)
        .replace("{phase}", ctx.phase().as_str())
        .replace("{turn}", &ctx.turn().to_string())
        .replace("{business_name}", &ctx.state.module0_context.business_name);

    let mut metadata = BTreeMap::new();
    metadata.insert("rule".to_string(), Value::from(rule.name.clone()));
    metadata.insert("priority".to_string(), Value::from(rule.priority));
    metadata.insert("trigger".to_string(), Value::from(trigger.as_str()));
    metadata.insert("phase".to_string(), Value::from(ctx.phase().as_str()));

    RenderedComponent {
        component_type: rule.component,
        text,
        metadata,
    }
}

/// Built-in rules and policies.
pub fn builtin_rules() -> (Vec<ComponentRule>, Vec<ComponentPolicy>) {
    let rules = vec![
        ComponentRule {
            name: "email-capture-diagnosed".to_string(),
            trigger: TriggerPoint::AfterResponse,
            component: ComponentType::EmailCapture,
            priority: 100,
            condition: RuleCondition::ConstraintIdentified,
            text: "Want a copy of your {category} diagnosis? Leave your email and we'll send it over."
                .to_string(),
        },
        ComponentRule {
            name: "email-capture-engaged".to_string(),
            trigger: TriggerPoint::AfterResponse,
            component: ComponentType::EmailCapture,
            priority: 50,
            condition: RuleCondition::TurnAtLeast { turn: 10 },
            text: "Leave your email to keep a record of this conversation.".to_string(),
        },
        ComponentRule {
            name: "email-capture-diagnosed-on-transition".to_string(),
            trigger: TriggerPoint::PhaseTransition,
            component: ComponentType::EmailCapture,
            priority: 100,
            condition: RuleCondition::ConstraintIdentified,
            text: "Want a copy of your {category} diagnosis? Leave your email and we'll send it over."
                .to_string(),
        },
        ComponentRule {
            name: "email-capture-engaged-on-transition".to_string(),
            trigger: TriggerPoint::PhaseTransition,
            component: ComponentType::EmailCapture,
            priority: 50,
            condition: RuleCondition::TurnAtLeast { turn: 10 },
            text: "Leave your email to keep a record of this conversation.".to_string(),
        },
        ComponentRule {
            name: "progress-indicator".to_string(),
            trigger: TriggerPoint::AfterResponse,
            component: ComponentType::ProgressIndicator,
            priority: 10,
            condition: RuleCondition::Always,
            text: String::new(),
        },
        ComponentRule {
            name: "summary-card-on-closing".to_string(),
            trigger: TriggerPoint::PhaseTransition,
            component: ComponentType::SummaryCard,
            priority: 100,
            condition: RuleCondition::PhaseIs {
                phase: Phase::Closing,
            },
            text: "{business_name}: your primary constraint is {category}.".to_string(),
        },
        ComponentRule {
            name: "booking-card-on-assisted-commit".to_string(),
            trigger: TriggerPoint::SessionComplete,
            component: ComponentType::BookingCard,
            priority: 100,
            condition: RuleCondition::ActionIs {
                action: Action::ActionCommitAssisted,
            },
            text: "Book a working session to put your {category} plan into motion.".to_string(),
        },
        ComponentRule {
            name: "resource-card-self-directed".to_string(),
            trigger: TriggerPoint::SessionComplete,
            component: ComponentType::ResourceCard,
            priority: 90,
            condition: RuleCondition::ClosingTrackIs {
                track: ClosingTrack::SelfDirected,
            },
            text: "A self-guided toolkit for working on your {category} constraint.".to_string(),
        },
    ];

    let policies = vec![
        ComponentPolicy {
            component: ComponentType::EmailCapture,
            constraints: vec![
                PolicyConstraint::TurnWindow { min: 10, max: 12 },
                PolicyConstraint::OncePerSession,
            ],
        },
        ComponentPolicy {
            component: ComponentType::SummaryCard,
            constraints: vec![PolicyConstraint::OncePerSession],
        },
        ComponentPolicy {
            component: ComponentType::ProgressIndicator,
            constraints: vec![PolicyConstraint::PhaseIn {
                phases: vec![
                    Phase::Diagnostic,
                    Phase::DepthInquiry,
                    Phase::Hypothesis,
                    Phase::CrossMapping,
                    Phase::BlockerCheck,
                ],
            }],
        },
        ComponentPolicy {
            component: ComponentType::BookingCard,
            constraints: vec![PolicyConstraint::OncePerSession],
        },
        ComponentPolicy {
            component: ComponentType::ResourceCard,
            constraints: vec![PolicyConstraint::OncePerSession],
        },
    ];

    (rules, policies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        ConstraintCategory, ConversationState, Decision, EffectiveState, Module0Context,
        UnifiedAnalysis,
    };

    fn context_parts(phase: Phase, turn: u32) -> (ConversationState, EffectiveState, Decision) {
        let mut state = ConversationState::new(Module0Context::default(), 3);
        state.phase = phase;
        state.turns_total = turn - 1;
        let effective = EffectiveState::derive(&state, &UnifiedAnalysis::neutral());
        state.turns_total = turn;
        let mut decision = Decision::post_completion();
        decision.phase = phase;
        decision.action = Action::DiagnosticQuestion;
        (state, effective, decision)
    }

    #[test]
    fn test_builtin_registry_is_valid() {
        let (rules, policies) = builtin_rules();
        let registry = ComponentRegistry::new(rules, policies).unwrap();
        assert_eq!(registry.rule_count(), ComponentRegistry::builtin().rule_count());
        let after = registry.rules_for(TriggerPoint::AfterResponse);
        assert!(after.windows(2).all(|w| w[0].priority >= w[1].priority));
    }

    #[test]
    fn test_progress_indicator_is_visual_only() {
        let engine = ComponentRuleEngine::new(Arc::new(ComponentRegistry::builtin()));
        let (state, effective, decision) = context_parts(Phase::Diagnostic, 3);
        let ctx = ComponentContext {
            state: &state,
            effective: &effective,
            decision: &decision,
        };

        let outcome = engine.evaluate(TriggerPoint::AfterResponse, &ctx);
        assert_eq!(outcome.rendered.len(), 1);
        assert_eq!(outcome.rendered[0].component_type, ComponentType::ProgressIndicator);
        assert!(outcome.rendered[0].text.is_empty());
        assert!(outcome.flags.is_empty());
    }

    #[test]
    fn test_email_capture_inside_window_sets_flag() {
        let engine = ComponentRuleEngine::new(Arc::new(ComponentRegistry::builtin()));
        let (mut state, effective, decision) = context_parts(Phase::BlockerCheck, 11);
        state.constraint_category = Some(ConstraintCategory::Execution);
        let ctx = ComponentContext {
            state: &state,
            effective: &effective,
            decision: &decision,
        };

        let outcome = engine.evaluate(TriggerPoint::AfterResponse, &ctx);
        let email = outcome
            .rendered
            .iter()
            .find(|c| c.component_type == ComponentType::EmailCapture)
            .unwrap();
        assert!(email.text.contains("execution"));
        assert_eq!(email.metadata["rule"], "email-capture-diagnosed");
        assert!(outcome.flags.is_shown(ComponentType::EmailCapture));
    }

    #[test]
    fn test_email_capture_on_transition_turn_inside_window() {
        let engine = ComponentRuleEngine::new(Arc::new(ComponentRegistry::builtin()));
        let (mut state, effective, decision) = context_parts(Phase::CrossMapping, 11);
        state.constraint_category = Some(ConstraintCategory::Strategy);
        let ctx = ComponentContext {
            state: &state,
            effective: &effective,
            decision: &decision,
        };

        let outcome = engine.evaluate(TriggerPoint::PhaseTransition, &ctx);
        let email = outcome
            .rendered
            .iter()
            .find(|c| c.component_type == ComponentType::EmailCapture)
            .unwrap();
        assert_eq!(email.metadata["rule"], "email-capture-diagnosed-on-transition");
        assert_eq!(email.metadata["trigger"], "phase_transition");
        assert!(outcome.flags.is_shown(ComponentType::EmailCapture));
    }

    #[test]
    fn test_email_capture_on_transition_respects_window() {
        let engine = ComponentRuleEngine::new(Arc::new(ComponentRegistry::builtin()));
        let (mut state, effective, decision) = context_parts(Phase::CrossMapping, 13);
        state.constraint_category = Some(ConstraintCategory::Strategy);
        let ctx = ComponentContext {
            state: &state,
            effective: &effective,
            decision: &decision,
        };

        let outcome = engine.evaluate(TriggerPoint::PhaseTransition, &ctx);
        assert!(outcome
            .rendered
            .iter()
            .all(|c| c.component_type != ComponentType::EmailCapture));
    }

    #[test]
    fn test_rule_without_policy_always_passes() {
        let registry = ComponentRegistry::from_yaml_str(
            r#"
rules:
  - name: booking-everywhere
    trigger: after_response
    component: booking_card
    condition:
      type: always
"#,
        )
        .unwrap();
        let engine = ComponentRuleEngine::new(Arc::new(registry));
        let (state, effective, decision) = context_parts(Phase::Intake, 1);
        let ctx = ComponentContext {
            state: &state,
            effective: &effective,
            decision: &decision,
        };
        let outcome = engine.evaluate(TriggerPoint::AfterResponse, &ctx);
        assert_eq!(outcome.rendered.len(), 1);
        assert!(outcome.flags.is_empty());
    }

    #[test]
    fn test_registry_rejects_bad_configuration() {
        let duplicate = r#"
rules:
  - { name: a, trigger: after_response, component: summary_card }
  - { name: a, trigger: phase_transition, component: summary_card }
"#;
        assert!(matches!(
            ComponentRegistry::from_yaml_str(duplicate),
            Err(DomainError::ValidationFailed(_))
        ));

        let inverted = r#"
policies:
  - component: email_capture
    constraints:
      - { type: turn_window, min: 12, max: 10 }
"#;
        assert!(ComponentRegistry::from_yaml_str(inverted).is_err());
        assert!(ComponentRegistry::from_yaml_str("rules: [").is_err());
    }
}
