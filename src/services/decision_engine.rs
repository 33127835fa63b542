//! Decision engine: one action and at most one phase step per turn.
//!
//! Evaluation order, first match wins:
//! 1. phase advancement proposal, checked against the hard gates; a closed
//!    gate cancels the advance and leaves its remedy action pending
//! 2. overrides: resistance pivot, cross-map redirect, tactical redirect,
//!    low-effort pushback
//! 3. the pending gate remedy, passed through the variety filter
//! 4. the two-turn closing script
//! 5. the phase's default action, passed through the variety filter
//!
//! The engine is a pure function of its inputs. It never fails: unusable
//! analysis has already been reduced to neutral signals.

use tracing::{debug, info, warn};

use crate::domain::models::{
    Action, ClosingSequence, ClosingStep, ClosingTrack, ConstraintCategory, ConversationState,
    CounterUpdate, CrossMapPair, Decision, DecisionRule, EffectiveState, EngineConfig,
    OverlayKey, Phase, PhaseTransition, PushbackLevel, StateDelta, UnifiedAnalysis,
};
use crate::services::{cross_mapping, variety};

/// Result of checking a proposed phase step against its hard gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Open,
    Blocked { remedy: Action, reason: &'static str },
}

#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    config: EngineConfig,
}

impl DecisionEngine {
    pub const fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Select this turn's action and the state changes that go with it.
    pub fn decide(&self, state: &ConversationState, analysis: &UnifiedAnalysis) -> Decision {
        if state.phase.is_terminal() {
            debug!(session_id = %state.session_id, "session complete; post-completion reply");
            return Decision::post_completion();
        }

        let eff = EffectiveState::derive(state, analysis);
        let decision = self.evaluate(state, &eff);

        if let Some(t) = decision.transition {
            info!(
                session_id = %state.session_id,
                from = %t.from,
                to = %t.to,
                "phase transition"
            );
        }
        debug!(
            session_id = %state.session_id,
            turn = eff.turn,
            phase = %decision.phase,
            action = %decision.action,
            rule = %decision.rule,
            "decision made"
        );
        decision
    }

    fn evaluate(&self, state: &ConversationState, eff: &EffectiveState) -> Decision {
        let mut draft = Draft::new(state, eff);

        // A closed gate only cancels the advance; its remedy stands in for
        // the phase's default action below.
        let mut remedy = None;
        if let Some(target) = self.proposed_advance(state, eff) {
            match self.gate(target, eff) {
                GateOutcome::Open => draft.phase = target,
                GateOutcome::Blocked { remedy: action, reason } => {
                    debug!(
                        session_id = %eff.session_id,
                        from = %eff.phase,
                        to = %target,
                        reason,
                        "phase advance blocked by gate"
                    );
                    remedy = Some(action);
                }
            }
        }

        if let Some((action, rule)) = self.override_action(state, eff, &mut draft) {
            return draft.finish(action, rule);
        }

        if let Some(action) = remedy {
            let action = variety::vary(
                &eff.variety_tracker,
                draft.phase,
                action,
                self.config.variety_window,
            );
            return draft.finish(action, DecisionRule::HardGate);
        }

        if draft.phase == Phase::Closing {
            let action = self.closing_step(eff, &mut draft);
            return draft.finish(action, DecisionRule::ClosingScript);
        }

        let action = variety::default_action(
            &eff.variety_tracker,
            draft.phase,
            self.config.variety_window,
        )
        .unwrap_or(Action::ClarifyingQuestion);
        draft.finish(action, DecisionRule::DefaultPhase)
    }

    /// The next phase, if this turn has earned a step forward.
    ///
    /// Nothing advances while the user is pushing back on the hypothesis.
    fn proposed_advance(&self, state: &ConversationState, eff: &EffectiveState) -> Option<Phase> {
        let cfg = &self.config;
        if eff.resistance_tracking > 0 || state.resistance_tracking >= cfg.rejection_threshold {
            return None;
        }

        let done = eff.turns_in_phase;
        let ready = match eff.phase {
            Phase::Intake => done >= 1,
            Phase::Diagnostic => done >= cfg.min_diagnostic_turns,
            Phase::DepthInquiry => {
                done >= cfg.min_depth_turns
                    || eff.scores.clarity >= cfg.hypothesis_clarity_threshold
            }
            Phase::Hypothesis => eff.constraint_category.is_some(),
            Phase::CrossMapping => done >= 1,
            Phase::BlockerCheck => done >= 1 && !eff.signals.mentions_blockers(),
            Phase::Closing | Phase::Complete => false,
        };

        if ready {
            eff.phase.next()
        } else {
            None
        }
    }

    /// Preconditions for entering `target`.
    pub fn gate(&self, target: Phase, eff: &EffectiveState) -> GateOutcome {
        let cfg = &self.config;
        match target {
            Phase::Hypothesis if eff.hypothesis.is_none() => GateOutcome::Blocked {
                remedy: Action::DepthInquiry,
                reason: "no hypothesis candidate",
            },
            Phase::Hypothesis if eff.scores.clarity < cfg.hypothesis_clarity_threshold => {
                GateOutcome::Blocked {
                    remedy: Action::DepthInquiry,
                    reason: "clarity below hypothesis threshold",
                }
            }
            Phase::CrossMapping | Phase::Closing if eff.constraint_category.is_none() => {
                GateOutcome::Blocked {
                    remedy: Action::PresentHypothesis,
                    reason: "constraint category not confirmed",
                }
            }
            Phase::Closing if eff.scores.clarity < cfg.closing_clarity_threshold => {
                GateOutcome::Blocked {
                    remedy: Action::ClarifyingQuestion,
                    reason: "clarity below closing threshold",
                }
            }
            _ => GateOutcome::Open,
        }
    }

    fn override_action(
        &self,
        state: &ConversationState,
        eff: &EffectiveState,
        draft: &mut Draft<'_>,
    ) -> Option<(Action, DecisionRule)> {
        let cfg = &self.config;

        // Streaks are held at their threshold so a preempted redirect or a
        // continued low-effort run fires on the next qualifying turn.
        draft.counters.tactical_drift = eff.tactical_drift.min(cfg.tactical_drift_threshold);
        draft.counters.low_effort_streak = eff.low_effort_streak.min(cfg.low_effort_threshold);

        let resistance = state.resistance_tracking.max(eff.resistance_tracking);
        if resistance >= cfg.rejection_threshold {
            draft.counters.resistance_tracking = 0;
            draft.hypothesis = Some(None);
            return Some((Action::HypothesisPivot, DecisionRule::ResistancePivot));
        }

        if cross_mapping::should_attempt_cross_mapping(eff) {
            if let Some(pair) = cross_mapping::cross_map_pair(eff) {
                debug!(
                    session_id = %eff.session_id,
                    surface = %pair.surface,
                    root = %pair.root,
                    "cross-mapping surface complaint to upstream constraint"
                );
                draft.cross_map_attempt = Some(pair);
                draft.hypothesis = Some(Some(pair.root));
                draft.counters.resistance_tracking = 0;
                return Some((Action::CrossMapRedirect, DecisionRule::CrossMapRedirect));
            }
        }

        if eff.tactical_drift >= cfg.tactical_drift_threshold {
            draft.counters.tactical_drift = 0;
            return Some((Action::TacticalRedirect, DecisionRule::TacticalRedirect));
        }

        if eff.low_effort_streak >= cfg.low_effort_threshold {
            let level = state.pushback_level.escalate();
            draft.pushback_level = Some(level);
            return Some((Action::pushback(level), DecisionRule::LowEffortPushback));
        }

        None
    }

    /// One step of the closing script. Leaves `Complete` as the phase once
    /// the second step has run.
    fn closing_step(&self, eff: &EffectiveState, draft: &mut Draft<'_>) -> Action {
        let mut seq = eff.closing_sequence;
        seq.turns_in_closing = seq.turns_in_closing.saturating_add(1);

        let action = match seq.step {
            ClosingStep::NotStarted => {
                let track = self.closing_track(eff);
                seq.track = Some(track);
                seq.step = ClosingStep::ReflectDone;
                match track {
                    ClosingTrack::SelfDirected => Action::ReflectSelfDirected,
                    ClosingTrack::Assisted => Action::ReflectAssisted,
                }
            }
            ClosingStep::ReflectDone => {
                let track = seq.track.unwrap_or_else(|| self.closing_track(eff));
                seq.track = Some(track);
                seq.step = ClosingStep::ActionCommitDone;
                draft.phase = Phase::Complete;

                let signals = &eff.signals;
                match track {
                    ClosingTrack::Assisted if signals.commits_to_action => {
                        Action::ActionCommitAssisted
                    }
                    ClosingTrack::SelfDirected
                        if signals.commits_to_action && !signals.mentions_blockers() =>
                    {
                        Action::ActionCommitSelfDirected
                    }
                    _ => Action::ClosingBlockerCheck,
                }
            }
            ClosingStep::ActionCommitDone => {
                warn!(
                    session_id = %eff.session_id,
                    "closing script already finished; completing session"
                );
                draft.phase = Phase::Complete;
                Action::PostCompletion
            }
        };

        draft.closing = Some(seq);
        action
    }

    fn closing_track(&self, eff: &EffectiveState) -> ClosingTrack {
        if eff.scores.capacity <= self.config.low_capacity_threshold
            || eff.signals.financial_constraint
        {
            ClosingTrack::SelfDirected
        } else {
            ClosingTrack::Assisted
        }
    }
}

/// Decision under construction.
struct Draft<'a> {
    eff: &'a EffectiveState,
    stored_hypothesis: Option<ConstraintCategory>,
    phase: Phase,
    counters: CounterUpdate,
    hypothesis: Option<Option<ConstraintCategory>>,
    pushback_level: Option<PushbackLevel>,
    closing: Option<ClosingSequence>,
    cross_map_attempt: Option<CrossMapPair>,
}

impl<'a> Draft<'a> {
    fn new(state: &ConversationState, eff: &'a EffectiveState) -> Self {
        Self {
            eff,
            stored_hypothesis: state.hypothesis,
            phase: eff.phase,
            counters: CounterUpdate {
                resistance_tracking: eff.resistance_tracking,
                tactical_drift: eff.tactical_drift,
                low_effort_streak: eff.low_effort_streak,
                turns_in_phase: 0,
            },
            hypothesis: None,
            pushback_level: None,
            closing: None,
            cross_map_attempt: None,
        }
    }

    fn finish(self, action: Action, rule: DecisionRule) -> Decision {
        let eff = self.eff;
        let transition = (self.phase != eff.phase).then_some(PhaseTransition {
            from: eff.phase,
            to: self.phase,
        });

        let mut counters = self.counters;
        counters.turns_in_phase = if transition.is_some() {
            1
        } else {
            eff.turns_in_phase.saturating_add(1)
        };

        let closing = self.closing.or_else(|| {
            (self.phase == Phase::Closing).then(|| {
                let mut seq = eff.closing_sequence;
                seq.turns_in_closing = seq.turns_in_closing.saturating_add(1);
                seq
            })
        });

        let hypothesis = self
            .hypothesis
            .or_else(|| (eff.hypothesis != self.stored_hypothesis).then_some(eff.hypothesis));

        let delta = StateDelta {
            scores: eff.signals.score_delta(),
            phase: transition.map(|t| t.to),
            counters: Some(counters),
            constraint_category: eff.newly_confirmed.then_some(eff.constraint_category).flatten(),
            hypothesis,
            root_signal: eff.signals.root_signal,
            surface_complaint: eff.signals.surface_category,
            pushback_level: self.pushback_level,
            closing,
            cross_map_attempt: self.cross_map_attempt,
            record_action: Some(action),
        };

        Decision {
            action,
            phase: self.phase,
            transition,
            rule,
            delta,
            overlay: OverlayKey {
                phase: self.phase,
                action,
            },
        }
    }
}
