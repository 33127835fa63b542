//! Conversational actions the generation layer can be instructed to perform.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::phase::Phase;

/// A specific conversational move for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    IntakeAcknowledge,
    DiagnosticQuestion,
    ReflectiveSummary,
    DepthInquiry,
    ExampleRequest,
    ClarifyingQuestion,
    PresentHypothesis,
    HypothesisPivot,
    CrossMapRedirect,
    CrossMapExplore,
    BlockerProbe,
    TacticalRedirect,
    PushbackGentle,
    PushbackDirect,
    PushbackFinal,
    ReflectSelfDirected,
    ReflectAssisted,
    ClosingBlockerCheck,
    ActionCommitAssisted,
    ActionCommitSelfDirected,
    PostCompletion,
}

impl Action {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IntakeAcknowledge => "intake_acknowledge",
            Self::DiagnosticQuestion => "diagnostic_question",
            Self::ReflectiveSummary => "reflective_summary",
            Self::DepthInquiry => "depth_inquiry",
            Self::ExampleRequest => "example_request",
            Self::ClarifyingQuestion => "clarifying_question",
            Self::PresentHypothesis => "present_hypothesis",
            Self::HypothesisPivot => "hypothesis_pivot",
            Self::CrossMapRedirect => "cross_map_redirect",
            Self::CrossMapExplore => "cross_map_explore",
            Self::BlockerProbe => "blocker_probe",
            Self::TacticalRedirect => "tactical_redirect",
            Self::PushbackGentle => "pushback_gentle",
            Self::PushbackDirect => "pushback_direct",
            Self::PushbackFinal => "pushback_final",
            Self::ReflectSelfDirected => "reflect_self_directed",
            Self::ReflectAssisted => "reflect_assisted",
            Self::ClosingBlockerCheck => "closing_blocker_check",
            Self::ActionCommitAssisted => "action_commit_assisted",
            Self::ActionCommitSelfDirected => "action_commit_self_directed",
            Self::PostCompletion => "post_completion",
        }
    }

    /// Reflective moves mirror the user's words back; too many close
    /// together read as mechanical.
    pub const fn is_reflective(self) -> bool {
        matches!(
            self,
            Self::ReflectiveSummary | Self::ReflectSelfDirected | Self::ReflectAssisted
        )
    }

    /// The canonical action for a phase when nothing overrides it.
    ///
    /// `Closing` has no canonical action: it runs its own two-turn script.
    pub const fn canonical_for(phase: Phase) -> Option<Self> {
        match phase {
            Phase::Intake => Some(Self::IntakeAcknowledge),
            Phase::Diagnostic => Some(Self::DiagnosticQuestion),
            Phase::DepthInquiry => Some(Self::DepthInquiry),
            Phase::Hypothesis => Some(Self::PresentHypothesis),
            Phase::CrossMapping => Some(Self::CrossMapExplore),
            Phase::BlockerCheck => Some(Self::BlockerProbe),
            Phase::Closing => None,
            Phase::Complete => Some(Self::PostCompletion),
        }
    }

    /// The designated substitute used when the canonical action would repeat.
    pub const fn alternate_for(phase: Phase) -> Option<Self> {
        match phase {
            Phase::Intake => Some(Self::DiagnosticQuestion),
            Phase::Diagnostic | Phase::Hypothesis | Phase::CrossMapping => {
                Some(Self::ReflectiveSummary)
            }
            Phase::DepthInquiry => Some(Self::ExampleRequest),
            Phase::BlockerCheck => Some(Self::ClarifyingQuestion),
            Phase::Closing | Phase::Complete => None,
        }
    }

    pub const fn pushback(level: PushbackLevel) -> Self {
        match level {
            PushbackLevel::None | PushbackLevel::Gentle => Self::PushbackGentle,
            PushbackLevel::Direct => Self::PushbackDirect,
            PushbackLevel::Final => Self::PushbackFinal,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Escalation level for low-effort pushback. Only ever moves up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushbackLevel {
    #[default]
    None,
    Gentle,
    Direct,
    Final,
}

impl PushbackLevel {
    /// The level used by the next pushback. `Final` is a ceiling.
    pub const fn escalate(self) -> Self {
        match self {
            Self::None => Self::Gentle,
            Self::Gentle => Self::Direct,
            Self::Direct | Self::Final => Self::Final,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alternate_differs_from_canonical() {
        for phase in Phase::ALL {
            if let (Some(canonical), Some(alternate)) =
                (Action::canonical_for(phase), Action::alternate_for(phase))
            {
                assert_ne!(canonical, alternate, "phase {phase}");
                assert_ne!(canonical, Action::ClarifyingQuestion, "phase {phase}");
            }
        }
    }

    #[test]
    fn test_pushback_escalation_is_monotonic() {
        let mut level = PushbackLevel::None;
        let mut seen = vec![level];
        for _ in 0..5 {
            let next = level.escalate();
            assert!(next >= level);
            level = next;
            seen.push(level);
        }
        assert_eq!(level, PushbackLevel::Final);
        assert_eq!(
            &seen[..4],
            &[
                PushbackLevel::None,
                PushbackLevel::Gentle,
                PushbackLevel::Direct,
                PushbackLevel::Final
            ]
        );
    }

    #[test]
    fn test_pushback_action_per_level() {
        assert_eq!(Action::pushback(PushbackLevel::Gentle), Action::PushbackGentle);
        assert_eq!(Action::pushback(PushbackLevel::Direct), Action::PushbackDirect);
        assert_eq!(Action::pushback(PushbackLevel::Final), Action::PushbackFinal);
    }

    #[test]
    fn test_action_serde_matches_as_str() {
        for action in [Action::HypothesisPivot, Action::ActionCommitSelfDirected] {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
        }
    }
}
