//! Durable per-session conversation state.
//!
//! `ConversationState` is the ledger the coordinator reads at the start of a
//! turn and commits at the end. It is split into two slices with separate
//! owners: everything except `component_flags` belongs to the decision
//! engine and changes only through [`ConversationState::apply`];
//! `component_flags` belongs to the component rule engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use uuid::Uuid;

use super::action::{Action, PushbackLevel};
use super::component::ComponentFlags;
use super::decision::Decision;
use super::phase::{ConstraintCategory, Phase};
use crate::domain::errors::{DomainError, DomainResult};

/// How many surface complaints are remembered for cross-mapping.
pub const SURFACE_HISTORY_LIMIT: usize = 3;

const DEFAULT_VARIETY_CAPACITY: usize = 3;

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Bounded diagnostic measures, each within `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub clarity: f64,
    pub confidence: f64,
    pub capacity: f64,
}

impl Scores {
    pub fn new(clarity: f64, confidence: f64, capacity: f64) -> Self {
        Self {
            clarity: clamp_unit(clarity),
            confidence: clamp_unit(confidence),
            capacity: clamp_unit(capacity),
        }
    }

    /// Add a delta, saturating at the bounds.
    pub fn apply(self, delta: &ScoreDelta) -> Self {
        Self::new(
            self.clarity + delta.clarity,
            self.confidence + delta.confidence,
            self.capacity + delta.capacity,
        )
    }

    pub fn in_bounds(&self) -> bool {
        [self.clarity, self.confidence, self.capacity]
            .iter()
            .all(|v| v.is_finite() && (0.0..=1.0).contains(v))
    }
}

impl Default for Scores {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.5)
    }
}

/// Additive change to `Scores`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreDelta {
    pub clarity: f64,
    pub confidence: f64,
    pub capacity: f64,
}

/// Step of the two-turn closing script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosingStep {
    #[default]
    NotStarted,
    ReflectDone,
    ActionCommitDone,
}

/// Which closing track the user was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosingTrack {
    SelfDirected,
    Assisted,
}

/// Closing sub-machine state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClosingSequence {
    pub step: ClosingStep,
    pub track: Option<ClosingTrack>,
    /// Turns spent in the closing phase, including interrupted ones.
    pub turns_in_closing: u32,
}

/// A surface complaint redirected toward a suspected root constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CrossMapPair {
    pub surface: ConstraintCategory,
    pub root: ConstraintCategory,
}

/// Intake facts captured when the session starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Module0Context {
    pub business_name: String,
    pub business_stage: String,
    pub stated_challenge: String,
    pub self_reported_constraint: Option<ConstraintCategory>,
}

/// Recent action history used to avoid repeating the same move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarietyTracker {
    capacity: usize,
    recent: VecDeque<Action>,
}

impl VarietyTracker {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            recent: VecDeque::with_capacity(capacity),
        }
    }

    /// Record a fired action, dropping the oldest beyond capacity.
    pub fn record(&mut self, action: Action) {
        self.recent.push_back(action);
        while self.recent.len() > self.capacity {
            self.recent.pop_front();
        }
    }

    pub fn last(&self) -> Option<Action> {
        self.recent.back().copied()
    }

    /// Up to `window` most recent actions, newest first.
    pub fn recent(&self, window: usize) -> impl Iterator<Item = Action> + '_ {
        self.recent.iter().rev().take(window).copied()
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }
}

impl Default for VarietyTracker {
    fn default() -> Self {
        Self::new(DEFAULT_VARIETY_CAPACITY)
    }
}

/// One session's accumulated diagnostic state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub session_id: Uuid,

    /// Optimistic concurrency token, bumped by the repository on commit.
    #[serde(default)]
    pub version: u64,

    pub phase: Phase,

    /// Processed user turns, incremented exactly once per turn.
    pub turns_total: u32,

    /// Turns completed in the current phase.
    #[serde(default)]
    pub turns_in_phase: u32,

    #[serde(default)]
    pub scores: Scores,

    /// Diagnosis; set once, never overwritten.
    #[serde(default)]
    pub constraint_category: Option<ConstraintCategory>,

    /// Candidate diagnosis currently on the table.
    #[serde(default)]
    pub hypothesis: Option<ConstraintCategory>,

    /// Earliest deep signal the user stated; set once.
    #[serde(default)]
    pub root_signal: Option<ConstraintCategory>,

    /// Most recent surface complaint categories, oldest first.
    #[serde(default)]
    pub surface_history: Vec<ConstraintCategory>,

    /// Consecutive rejections of the current hypothesis.
    #[serde(default)]
    pub resistance_tracking: u32,

    /// Consecutive tactical/logistical questions.
    #[serde(default)]
    pub tactical_drift: u32,

    /// Consecutive low-effort replies.
    #[serde(default)]
    pub low_effort_streak: u32,

    #[serde(default)]
    pub pushback_level: PushbackLevel,

    #[serde(default)]
    pub variety_tracker: VarietyTracker,

    #[serde(default)]
    pub closing_sequence: ClosingSequence,

    #[serde(default)]
    pub cross_map_attempts: BTreeSet<CrossMapPair>,

    #[serde(default)]
    pub module0_context: Module0Context,

    #[serde(default)]
    pub component_flags: ComponentFlags,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    /// Fresh session state in the intake phase.
    pub fn new(module0_context: Module0Context, variety_window: usize) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            version: 0,
            phase: Phase::Intake,
            turns_total: 0,
            turns_in_phase: 0,
            scores: Scores::default(),
            constraint_category: None,
            hypothesis: None,
            root_signal: None,
            surface_history: Vec::new(),
            resistance_tracking: 0,
            tactical_drift: 0,
            low_effort_streak: 0,
            pushback_level: PushbackLevel::None,
            variety_tracker: VarietyTracker::new(variety_window),
            closing_sequence: ClosingSequence::default(),
            cross_map_attempts: BTreeSet::new(),
            module0_context,
            component_flags: ComponentFlags::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Commit a decision's delta to the decision-owned slice and count the turn.
    ///
    /// Phase never regresses and a diagnosis is never overwritten, whatever
    /// the delta says.
    pub fn apply(&mut self, decision: &Decision) {
        let delta = &decision.delta;

        self.scores = self.scores.apply(&delta.scores);

        if let Some(next) = delta.phase {
            if next >= self.phase {
                self.phase = next;
            } else {
                tracing::warn!(
                    session_id = %self.session_id,
                    current = %self.phase,
                    requested = %next,
                    "ignoring backwards phase transition"
                );
            }
        }

        if let Some(counters) = delta.counters {
            self.resistance_tracking = counters.resistance_tracking;
            self.tactical_drift = counters.tactical_drift;
            self.low_effort_streak = counters.low_effort_streak;
            self.turns_in_phase = counters.turns_in_phase;
        }

        if let Some(level) = delta.pushback_level {
            self.pushback_level = self.pushback_level.max(level);
        }

        if self.constraint_category.is_none() {
            self.constraint_category = delta.constraint_category;
        }

        if let Some(hypothesis) = delta.hypothesis {
            self.hypothesis = hypothesis;
        }

        if self.root_signal.is_none() {
            self.root_signal = delta.root_signal;
        }

        if let Some(surface) = delta.surface_complaint {
            self.surface_history.push(surface);
            let overflow = self.surface_history.len().saturating_sub(SURFACE_HISTORY_LIMIT);
            self.surface_history.drain(..overflow);
        }

        if let Some(pair) = delta.cross_map_attempt {
            self.cross_map_attempts.insert(pair);
        }

        if let Some(closing) = delta.closing {
            self.closing_sequence = closing;
        }

        if let Some(action) = delta.record_action {
            self.variety_tracker.record(action);
        }

        self.turns_total += 1;
        self.updated_at = Utc::now();
    }

    /// Detect records that cannot have been produced by the engine.
    pub fn check_invariants(&self) -> DomainResult<()> {
        let invalid = |reason: String| DomainError::InvalidState {
            session_id: self.session_id,
            reason,
        };

        if !self.scores.in_bounds() {
            return Err(invalid(format!("scores out of bounds: {:?}", self.scores)));
        }
        if self.turns_in_phase > self.turns_total {
            return Err(invalid(format!(
                "turns_in_phase {} exceeds turns_total {}",
                self.turns_in_phase, self.turns_total
            )));
        }
        if self.closing_sequence.step != ClosingStep::NotStarted && self.phase < Phase::Closing {
            return Err(invalid(format!(
                "closing step {:?} recorded in phase {}",
                self.closing_sequence.step, self.phase
            )));
        }
        if self.phase >= Phase::CrossMapping && self.constraint_category.is_none() {
            return Err(invalid(format!(
                "phase {} reached without a constraint category",
                self.phase
            )));
        }
        Ok(())
    }
}
