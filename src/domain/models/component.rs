//! UI component rules, policies and the one-shot flag slice.
//!
//! Rules and policies are static configuration. A rule proposes a component
//! at a trigger point when its condition holds; a policy is a hard veto
//! evaluated afterwards and cannot be outranked by rule priority.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use super::action::Action;
use super::conversation::{ClosingTrack, ConversationState};
use super::decision::Decision;
use super::effective::EffectiveState;
use super::phase::Phase;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Kind of auxiliary UI element that may accompany a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    EmailCapture,
    SummaryCard,
    ProgressIndicator,
    BookingCard,
    ResourceCard,
}

impl ComponentType {
    pub const ALL: [Self; 5] = [
        Self::EmailCapture,
        Self::SummaryCard,
        Self::ProgressIndicator,
        Self::BookingCard,
        Self::ResourceCard,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmailCapture => "email_capture",
            Self::SummaryCard => "summary_card",
            Self::ProgressIndicator => "progress_indicator",
            Self::BookingCard => "booking_card",
            Self::ResourceCard => "resource_card",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point in turn processing at which component rules are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPoint {
    AfterResponse,
    PhaseTransition,
    SessionComplete,
}

impl TriggerPoint {
    pub const ALL: [Self; 3] = [
        Self::AfterResponse,
        Self::PhaseTransition,
        Self::SessionComplete,
    ];

    /// Exactly one trigger point per turn, chosen from the committed decision.
    pub fn for_decision(decision: &Decision) -> Self {
        match decision.transition {
            Some(t) if t.to == Phase::Complete => Self::SessionComplete,
            Some(_) => Self::PhaseTransition,
            None => Self::AfterResponse,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AfterResponse => "after_response",
            Self::PhaseTransition => "phase_transition",
            Self::SessionComplete => "session_complete",
        }
    }
}

impl fmt::Display for TriggerPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerPoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "after_response" => Ok(Self::AfterResponse),
            "phase_transition" => Ok(Self::PhaseTransition),
            "session_complete" => Ok(Self::SessionComplete),
            other => Err(format!("unknown trigger point: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation context
// ---------------------------------------------------------------------------

/// What rules and policies can see: the state as it will be committed, the
/// turn's working view, and the decision that produced it.
#[derive(Debug, Clone, Copy)]
pub struct ComponentContext<'a> {
    pub state: &'a ConversationState,
    pub effective: &'a EffectiveState,
    pub decision: &'a Decision,
}

impl ComponentContext<'_> {
    pub const fn turn(&self) -> u32 {
        self.effective.turn
    }

    pub const fn phase(&self) -> Phase {
        self.state.phase
    }
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

/// Score referenced by a `score_at_least` condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
    Clarity,
    Confidence,
    Capacity,
}

/// Business-rule predicate. Evaluated by [`RuleCondition::holds`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCondition {
    #[default]
    Always,
    PhaseIs { phase: Phase },
    PhaseAtLeast { phase: Phase },
    TurnAtLeast { turn: u32 },
    ActionIs { action: Action },
    ConstraintIdentified,
    ClosingTrackIs { track: ClosingTrack },
    ScoreAtLeast { score: ScoreKind, value: f64 },
    All { conditions: Vec<RuleCondition> },
    Any { conditions: Vec<RuleCondition> },
    Not { condition: Box<RuleCondition> },
}

impl RuleCondition {
    pub fn holds(&self, ctx: &ComponentContext<'_>) -> bool {
        match self {
            Self::Always => true,
            Self::PhaseIs { phase } => ctx.phase() == *phase,
            Self::PhaseAtLeast { phase } => ctx.phase() >= *phase,
            Self::TurnAtLeast { turn } => ctx.turn() >= *turn,
            Self::ActionIs { action } => ctx.decision.action == *action,
            Self::ConstraintIdentified => ctx.state.constraint_category.is_some(),
            Self::ClosingTrackIs { track } => ctx.state.closing_sequence.track == Some(*track),
            Self::ScoreAtLeast { score, value } => {
                let scores = &ctx.state.scores;
                let current = match score {
                    ScoreKind::Clarity => scores.clarity,
                    ScoreKind::Confidence => scores.confidence,
                    ScoreKind::Capacity => scores.capacity,
                };
                current >= *value
            }
            Self::All { conditions } => conditions.iter().all(|c| c.holds(ctx)),
            Self::Any { conditions } => conditions.iter().any(|c| c.holds(ctx)),
            Self::Not { condition } => !condition.holds(ctx),
        }
    }
}

// ---------------------------------------------------------------------------
// Rules and policies
// ---------------------------------------------------------------------------

/// Proposes `component` at `trigger` when `condition` holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRule {
    pub name: String,
    pub trigger: TriggerPoint,
    pub component: ComponentType,
    /// Higher wins within a component type.
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub condition: RuleCondition,
    /// Rendered text. Empty for purely visual components. `{category}`,
    /// `{phase}`, `{turn}` and `{business_name}` are substituted.
    #[serde(default)]
    pub text: String,
}

/// One hard constraint inside a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyConstraint {
    /// Inclusive turn window.
    TurnWindow { min: u32, max: u32 },
    OncePerSession,
    PhaseIn { phases: Vec<Phase> },
    PhaseAtLeast { phase: Phase },
}

impl PolicyConstraint {
    fn passes(&self, component: ComponentType, ctx: &ComponentContext<'_>) -> bool {
        match self {
            Self::TurnWindow { min, max } => (*min..=*max).contains(&ctx.turn()),
            Self::OncePerSession => !ctx.state.component_flags.is_shown(component),
            Self::PhaseIn { phases } => phases.contains(&ctx.phase()),
            Self::PhaseAtLeast { phase } => ctx.phase() >= *phase,
        }
    }
}

/// Conjunction of hard constraints guarding one component type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentPolicy {
    pub component: ComponentType,
    #[serde(default)]
    pub constraints: Vec<PolicyConstraint>,
}

impl ComponentPolicy {
    /// A policy with no constraints: everything passes.
    pub const fn permissive(component: ComponentType) -> Self {
        Self {
            component,
            constraints: Vec::new(),
        }
    }

    pub fn is_single_use(&self) -> bool {
        self.constraints.contains(&PolicyConstraint::OncePerSession)
    }

    /// The first constraint that fails, if any.
    pub fn first_violation(&self, ctx: &ComponentContext<'_>) -> Option<&PolicyConstraint> {
        self.constraints
            .iter()
            .find(|c| !c.passes(self.component, ctx))
    }
}

// ---------------------------------------------------------------------------
// Output and flags
// ---------------------------------------------------------------------------

/// A component selected for this turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedComponent {
    pub component_type: ComponentType,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

/// Single-use components already shown in a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentFlags {
    shown: BTreeSet<ComponentType>,
}

impl ComponentFlags {
    pub fn is_shown(&self, component: ComponentType) -> bool {
        self.shown.contains(&component)
    }

    /// Returns `false` if the flag was already set.
    pub fn mark_shown(&mut self, component: ComponentType) -> bool {
        self.shown.insert(component)
    }

    pub fn merge(&mut self, other: &Self) {
        self.shown.extend(other.shown.iter().copied());
    }

    pub fn iter(&self) -> impl Iterator<Item = ComponentType> + '_ {
        self.shown.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.shown.is_empty()
    }
}
