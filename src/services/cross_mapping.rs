//! Cross-mapping detector.
//!
//! Flags turns where the user's recent surface complaints point at one
//! category while an earlier, deeper signal points at a category upstream
//! of it (complaining about execution while having described unclear
//! strategy, for instance).

use std::collections::HashMap;

use crate::domain::models::{ConstraintCategory, CrossMapPair, EffectiveState, Phase};

/// Most frequent category in `history`; ties go to the most recent.
pub fn dominant_surface(history: &[ConstraintCategory]) -> Option<ConstraintCategory> {
    let mut counts: HashMap<ConstraintCategory, usize> = HashMap::new();
    for category in history {
        *counts.entry(*category).or_default() += 1;
    }
    history
        .iter()
        .copied()
        .max_by_key(|category| counts.get(category).copied().unwrap_or_default())
}

/// The root category the surface complaints likely mask, if any.
pub fn detect_upstream_constraint(eff: &EffectiveState) -> Option<ConstraintCategory> {
    cross_map_pair(eff).map(|pair| pair.root)
}

/// The `(surface, root)` pair behind a detected mismatch.
pub fn cross_map_pair(eff: &EffectiveState) -> Option<CrossMapPair> {
    let surface = dominant_surface(&eff.surface_history)?;
    let root = eff.root_signal?;
    (root != surface && root.is_upstream_of(surface)).then_some(CrossMapPair { surface, root })
}

/// Whether the engine should redirect this turn.
///
/// Only before a diagnosis is confirmed, only in the exploratory phases,
/// and at most once per distinct pair.
pub fn should_attempt_cross_mapping(eff: &EffectiveState) -> bool {
    if eff.constraint_category.is_some()
        || !(Phase::Diagnostic..=Phase::Hypothesis).contains(&eff.phase)
    {
        return false;
    }
    cross_map_pair(eff).is_some_and(|pair| !eff.cross_map_attempts.contains(&pair))
}
