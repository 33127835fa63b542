//! Output of the decision engine for one turn.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::action::{Action, PushbackLevel};
use super::conversation::{ClosingSequence, CrossMapPair, ScoreDelta};
use super::phase::{ConstraintCategory, Phase};

/// Which stage of the decision algorithm produced the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionRule {
    HardGate,
    ResistancePivot,
    CrossMapRedirect,
    TacticalRedirect,
    LowEffortPushback,
    ClosingScript,
    DefaultPhase,
    PostCompletion,
}

impl DecisionRule {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HardGate => "hard_gate",
            Self::ResistancePivot => "resistance_pivot",
            Self::CrossMapRedirect => "cross_map_redirect",
            Self::TacticalRedirect => "tactical_redirect",
            Self::LowEffortPushback => "low_effort_pushback",
            Self::ClosingScript => "closing_script",
            Self::DefaultPhase => "default_phase",
            Self::PostCompletion => "post_completion",
        }
    }
}

impl fmt::Display for DecisionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A committed phase change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: Phase,
    pub to: Phase,
}

/// Key used to look up prompt overlay text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverlayKey {
    pub phase: Phase,
    pub action: Action,
}

/// New values for the per-turn counters owned by the decision engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterUpdate {
    pub resistance_tracking: u32,
    pub tactical_drift: u32,
    pub low_effort_streak: u32,
    pub turns_in_phase: u32,
}

/// Everything a decision changes in the decision-owned slice of
/// `ConversationState`. `None` means "leave unchanged".
///
/// Applied in one step by [`ConversationState::apply`](super::ConversationState::apply).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateDelta {
    pub scores: ScoreDelta,
    pub phase: Option<Phase>,
    pub counters: Option<CounterUpdate>,
    /// Set-once; ignored if the state already carries a diagnosis.
    pub constraint_category: Option<ConstraintCategory>,
    /// Outer `None` leaves the hypothesis alone, `Some(None)` clears it.
    pub hypothesis: Option<Option<ConstraintCategory>>,
    /// Set-once.
    pub root_signal: Option<ConstraintCategory>,
    pub surface_complaint: Option<ConstraintCategory>,
    pub pushback_level: Option<PushbackLevel>,
    pub closing: Option<ClosingSequence>,
    pub cross_map_attempt: Option<CrossMapPair>,
    pub record_action: Option<Action>,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// The decision engine's verdict for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    /// Phase in effect after this turn.
    pub phase: Phase,
    pub transition: Option<PhaseTransition>,
    pub rule: DecisionRule,
    pub delta: StateDelta,
    pub overlay: OverlayKey,
}

impl Decision {
    /// The single stable decision for a completed session.
    pub fn post_completion() -> Self {
        Self {
            action: Action::PostCompletion,
            phase: Phase::Complete,
            transition: None,
            rule: DecisionRule::PostCompletion,
            delta: StateDelta::default(),
            overlay: OverlayKey {
                phase: Phase::Complete,
                action: Action::PostCompletion,
            },
        }
    }

    pub const fn transitioned(&self) -> bool {
        self.transition.is_some()
    }
}
