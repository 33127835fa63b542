//! Per-turn working view: durable state merged with the current analysis.

use serde::Serialize;
use std::collections::BTreeSet;
use uuid::Uuid;

use super::action::PushbackLevel;
use super::analysis::UnifiedAnalysis;
use super::conversation::{
    ClosingSequence, ConversationState, CrossMapPair, Scores, VarietyTracker,
    SURFACE_HISTORY_LIMIT,
};
use super::phase::{ConstraintCategory, Phase};

/// "State as it should be evaluated for this turn."
///
/// Derived fresh every turn and never persisted. Counters here already
/// include this turn's signals; the committed values come from the
/// decision's delta.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveState {
    pub session_id: Uuid,
    pub phase: Phase,
    /// Number of the turn being processed (1-based).
    pub turn: u32,
    /// Turns already completed in `phase` before this one.
    pub turns_in_phase: u32,
    pub scores: Scores,
    pub constraint_category: Option<ConstraintCategory>,
    /// The user affirmed the hypothesis this turn and it became the diagnosis.
    pub newly_confirmed: bool,
    pub hypothesis: Option<ConstraintCategory>,
    pub hypothesis_changed: bool,
    pub root_signal: Option<ConstraintCategory>,
    pub surface_history: Vec<ConstraintCategory>,
    pub resistance_tracking: u32,
    pub tactical_drift: u32,
    pub low_effort_streak: u32,
    pub pushback_level: PushbackLevel,
    pub closing_sequence: ClosingSequence,
    pub cross_map_attempts: BTreeSet<CrossMapPair>,
    pub variety_tracker: VarietyTracker,
    pub signals: UnifiedAnalysis,
}

impl EffectiveState {
    pub fn derive(state: &ConversationState, analysis: &UnifiedAnalysis) -> Self {
        let signals = analysis.sanitized();

        let hypothesis = signals.suggested_category.or(state.hypothesis);
        let hypothesis_changed = state.hypothesis.is_some() && hypothesis != state.hypothesis;

        let resistance_tracking = if signals.affirms_hypothesis || hypothesis_changed {
            0
        } else if signals.rejects_hypothesis
            && hypothesis.is_some()
            && state.constraint_category.is_none()
        {
            state.resistance_tracking.saturating_add(1)
        } else {
            state.resistance_tracking
        };

        let newly_confirmed = state.constraint_category.is_none()
            && signals.affirms_hypothesis
            && hypothesis.is_some()
            && state.phase >= Phase::Hypothesis;
        let constraint_category = state
            .constraint_category
            .or(if newly_confirmed { hypothesis } else { None });

        let root_signal = state
            .root_signal
            .or(signals.root_signal)
            .or(state.module0_context.self_reported_constraint);

        let mut surface_history = state.surface_history.clone();
        if let Some(surface) = signals.surface_category {
            surface_history.push(surface);
            let overflow = surface_history.len().saturating_sub(SURFACE_HISTORY_LIMIT);
            surface_history.drain(..overflow);
        }

        let tactical_drift = if signals.tactical_question {
            state.tactical_drift.saturating_add(1)
        } else {
            0
        };
        let low_effort_streak = if signals.low_effort {
            state.low_effort_streak.saturating_add(1)
        } else {
            0
        };

        Self {
            session_id: state.session_id,
            phase: state.phase,
            turn: state.turns_total.saturating_add(1),
            turns_in_phase: state.turns_in_phase,
            scores: state.scores.apply(&signals.score_delta()),
            constraint_category,
            newly_confirmed,
            hypothesis,
            hypothesis_changed,
            root_signal,
            surface_history,
            resistance_tracking,
            tactical_drift,
            low_effort_streak,
            pushback_level: state.pushback_level,
            closing_sequence: state.closing_sequence,
            cross_map_attempts: state.cross_map_attempts.clone(),
            variety_tracker: state.variety_tracker.clone(),
            signals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::conversation::Module0Context;

    fn state_in(phase: Phase) -> ConversationState {
        let mut state = ConversationState::new(Module0Context::default(), 3);
        state.phase = phase;
        state
    }

    #[test]
    fn test_rejection_counts_only_against_a_hypothesis() {
        let state = state_in(Phase::Diagnostic);
        let rejects = UnifiedAnalysis {
            rejects_hypothesis: true,
            ..Default::default()
        };
        assert_eq!(EffectiveState::derive(&state, &rejects).resistance_tracking, 0);

        let mut state = state_in(Phase::Hypothesis);
        state.hypothesis = Some(ConstraintCategory::Execution);
        state.resistance_tracking = 1;
        assert_eq!(EffectiveState::derive(&state, &rejects).resistance_tracking, 2);
    }

    #[test]
    fn test_rejection_after_diagnosis_is_not_counted() {
        let mut state = state_in(Phase::BlockerCheck);
        state.hypothesis = Some(ConstraintCategory::Execution);
        state.constraint_category = Some(ConstraintCategory::Execution);
        let rejects = UnifiedAnalysis {
            rejects_hypothesis: true,
            ..Default::default()
        };
        assert_eq!(EffectiveState::derive(&state, &rejects).resistance_tracking, 0);
    }

    #[test]
    fn test_hypothesis_change_resets_resistance() {
        let mut state = state_in(Phase::Hypothesis);
        state.hypothesis = Some(ConstraintCategory::Execution);
        state.resistance_tracking = 1;

        let analysis = UnifiedAnalysis {
            rejects_hypothesis: true,
            suggested_category: Some(ConstraintCategory::Strategy),
            ..Default::default()
        };
        let eff = EffectiveState::derive(&state, &analysis);
        assert!(eff.hypothesis_changed);
        assert_eq!(eff.resistance_tracking, 0);
        assert_eq!(eff.hypothesis, Some(ConstraintCategory::Strategy));
    }

    #[test]
    fn test_affirmation_confirms_only_from_hypothesis_phase() {
        let affirms = UnifiedAnalysis {
            affirms_hypothesis: true,
            ..Default::default()
        };

        let mut early = state_in(Phase::DepthInquiry);
        early.hypothesis = Some(ConstraintCategory::Energy);
        let eff = EffectiveState::derive(&early, &affirms);
        assert!(!eff.newly_confirmed);
        assert!(eff.constraint_category.is_none());

        let mut ready = state_in(Phase::Hypothesis);
        ready.hypothesis = Some(ConstraintCategory::Energy);
        let eff = EffectiveState::derive(&ready, &affirms);
        assert!(eff.newly_confirmed);
        assert_eq!(eff.constraint_category, Some(ConstraintCategory::Energy));
    }

    #[test]
    fn test_root_signal_falls_back_to_intake_self_report() {
        let mut state = state_in(Phase::Diagnostic);
        state.module0_context.self_reported_constraint = Some(ConstraintCategory::Strategy);
        let eff = EffectiveState::derive(&state, &UnifiedAnalysis::neutral());
        assert_eq!(eff.root_signal, Some(ConstraintCategory::Strategy));
    }

    #[test]
    fn test_streak_counters_reset_on_clean_turn() {
        let mut state = state_in(Phase::Diagnostic);
        state.tactical_drift = 3;
        state.low_effort_streak = 2;
        let eff = EffectiveState::derive(&state, &UnifiedAnalysis::neutral());
        assert_eq!(eff.tactical_drift, 0);
        assert_eq!(eff.low_effort_streak, 0);
        assert_eq!(eff.turn, 1);
    }
}
