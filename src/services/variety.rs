//! Response-variety filter.
//!
//! Stops the engine from making the same conversational move twice in a
//! row, and from stacking reflective moves inside a short window.

use crate::domain::models::{Action, Phase, VarietyTracker};

/// True if `candidate` (or, for a reflective candidate, any reflective
/// move) appears within the `window` most recent actions.
pub fn should_skip_reflection(tracker: &VarietyTracker, candidate: Action, window: usize) -> bool {
    tracker.recent(window).any(|recent| {
        recent == candidate || (candidate.is_reflective() && recent.is_reflective())
    })
}

/// Canonical action for `phase`, passed through [`vary`]. Returns `None`
/// for phases without a canonical action.
pub fn default_action(tracker: &VarietyTracker, phase: Phase, window: usize) -> Option<Action> {
    Action::canonical_for(phase).map(|canonical| vary(tracker, phase, canonical, window))
}

/// `candidate`, or a substitute when it would repeat the last fired action.
///
/// The phase's alternate is preferred unless it is too recent or is the
/// candidate itself; then a clarifying question, and failing that the
/// phase's canonical action.
pub fn vary(tracker: &VarietyTracker, phase: Phase, candidate: Action, window: usize) -> Action {
    if tracker.last() != Some(candidate) {
        return candidate;
    }

    match Action::alternate_for(phase) {
        Some(alternate)
            if alternate != candidate && !should_skip_reflection(tracker, alternate, window) =>
        {
            alternate
        }
        Some(_) if candidate != Action::ClarifyingQuestion => Action::ClarifyingQuestion,
        _ => Action::canonical_for(phase)
            .filter(|canonical| *canonical != candidate)
            .unwrap_or(candidate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(actions: &[Action]) -> VarietyTracker {
        let mut tracker = VarietyTracker::new(3);
        for action in actions {
            tracker.record(*action);
        }
        tracker
    }

    #[test]
    fn test_exact_repeat_within_window_is_skipped() {
        let t = tracker(&[Action::DepthInquiry, Action::ExampleRequest]);
        assert!(should_skip_reflection(&t, Action::DepthInquiry, 3));
        assert!(!should_skip_reflection(&t, Action::DepthInquiry, 1));
    }

    #[test]
    fn test_reflective_moves_count_as_one_category() {
        let t = tracker(&[Action::ReflectAssisted, Action::DiagnosticQuestion]);
        assert!(should_skip_reflection(&t, Action::ReflectiveSummary, 3));
        assert!(!should_skip_reflection(&t, Action::ExampleRequest, 3));
    }

    #[test]
    fn test_empty_history_never_skips() {
        let t = VarietyTracker::new(3);
        assert!(!should_skip_reflection(&t, Action::ReflectiveSummary, 3));
        assert_eq!(
            default_action(&t, Phase::Diagnostic, 3),
            Some(Action::DiagnosticQuestion)
        );
    }

    #[test]
    fn test_repeat_uses_alternate() {
        let t = tracker(&[Action::DiagnosticQuestion]);
        assert_eq!(
            default_action(&t, Phase::Diagnostic, 3),
            Some(Action::ReflectiveSummary)
        );
    }

    #[test]
    fn test_recent_reflection_falls_back_to_clarifying_question() {
        let t = tracker(&[Action::ReflectiveSummary, Action::DiagnosticQuestion]);
        assert_eq!(
            default_action(&t, Phase::Diagnostic, 3),
            Some(Action::ClarifyingQuestion)
        );
    }

    #[test]
    fn test_closing_has_no_default() {
        assert_eq!(default_action(&VarietyTracker::new(3), Phase::Closing, 3), None);
    }

    #[test]
    fn test_repeated_gate_remedy_is_varied() {
        let t = tracker(&[Action::DepthInquiry]);
        assert_eq!(
            vary(&t, Phase::DepthInquiry, Action::DepthInquiry, 3),
            Action::ExampleRequest
        );
        assert_eq!(
            vary(&t, Phase::DepthInquiry, Action::PresentHypothesis, 3),
            Action::PresentHypothesis
        );
    }

    #[test]
    fn test_repeated_clarifying_question_falls_back_to_canonical() {
        let t = tracker(&[Action::ClarifyingQuestion]);
        assert_eq!(
            vary(&t, Phase::BlockerCheck, Action::ClarifyingQuestion, 3),
            Action::BlockerProbe
        );
    }
}
