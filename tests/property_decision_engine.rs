//! Property tests over whole sessions of arbitrary analyses.

use constraint_advisor::domain::models::{
    Action, ComponentContext, ComponentType, ConstraintCategory, ConversationState,
    DecisionRule, EffectiveState, EngineConfig, Module0Context, Phase, TriggerPoint,
    UnifiedAnalysis,
};
use constraint_advisor::services::{ComponentRegistry, ComponentRuleEngine, DecisionEngine};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

fn category() -> impl Strategy<Value = Option<ConstraintCategory>> {
    prop_oneof![
        Just(None),
        Just(Some(ConstraintCategory::Strategy)),
        Just(Some(ConstraintCategory::Execution)),
        Just(Some(ConstraintCategory::Energy)),
    ]
}

fn analysis() -> impl Strategy<Value = UnifiedAnalysis> {
    (
        (
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
        ),
        (-0.4f64..0.6, -0.3f64..0.3, -0.3f64..0.3),
        (category(), category(), category(), any::<bool>()),
    )
        .prop_map(
            |(
                (low_effort, rejects, affirms, tactical, financial, commits),
                (clarity, confidence, capacity),
                (surface, root, suggested, blocked),
            )| UnifiedAnalysis {
                low_effort,
                rejects_hypothesis: rejects,
                affirms_hypothesis: affirms,
                tactical_question: tactical,
                financial_constraint: financial,
                commits_to_action: commits,
                clarity_delta: clarity,
                confidence_delta: confidence,
                capacity_delta: capacity,
                surface_category: surface,
                root_signal: root,
                suggested_category: suggested,
                blockers: if blocked {
                    vec!["time".to_string()]
                } else {
                    Vec::new()
                },
                ..Default::default()
            },
        )
}

fn session_script() -> impl Strategy<Value = Vec<UnifiedAnalysis>> {
    prop::collection::vec(analysis(), 1..40)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Phase never moves backwards and stored state stays consistent.
    #[test]
    fn prop_phase_is_monotonic(script in session_script()) {
        let engine = DecisionEngine::default();
        let mut state = ConversationState::new(Module0Context::default(), 3);

        for analysis in &script {
            let before = state.phase;
            let decision = engine.decide(&state, analysis);
            prop_assert!(decision.phase >= before);
            if let Some(t) = decision.transition {
                prop_assert_eq!(t.from, before);
                prop_assert_eq!(t.to.index(), before.index() + 1, "one step at a time");
            }

            state.apply(&decision);
            prop_assert!(state.phase >= before);
            prop_assert!(state.check_invariants().is_ok(), "{:?}", state.check_invariants());
        }
    }

    /// A confirmed category is never replaced.
    #[test]
    fn prop_constraint_category_is_immutable(script in session_script()) {
        let engine = DecisionEngine::default();
        let mut state = ConversationState::new(Module0Context::default(), 3);
        let mut confirmed: Option<ConstraintCategory> = None;

        for analysis in &script {
            let decision = engine.decide(&state, analysis);
            state.apply(&decision);
            match confirmed {
                Some(category) => prop_assert_eq!(state.constraint_category, Some(category)),
                None => confirmed = state.constraint_category,
            }
        }
    }

    /// Resistance at the threshold always produces a pivot and a reset.
    #[test]
    fn prop_resistance_threshold_pivots(script in session_script()) {
        let engine = DecisionEngine::default();
        let threshold = EngineConfig::default().rejection_threshold;
        let mut state = ConversationState::new(Module0Context::default(), 3);

        for analysis in &script {
            let resisting = state.resistance_tracking >= threshold && !state.phase.is_terminal();
            let decision = engine.decide(&state, analysis);
            state.apply(&decision);
            if resisting {
                prop_assert_eq!(decision.action, Action::HypothesisPivot);
                prop_assert_eq!(state.resistance_tracking, 0);
            }
        }
    }

    /// Override counters are reset or held on firing, so none runs past its threshold.
    #[test]
    fn prop_counters_stay_within_thresholds(script in session_script()) {
        let engine = DecisionEngine::default();
        let config = EngineConfig::default();
        let mut state = ConversationState::new(Module0Context::default(), 3);

        for analysis in &script {
            let decision = engine.decide(&state, analysis);
            state.apply(&decision);
            prop_assert!(state.resistance_tracking <= config.rejection_threshold);
            prop_assert!(state.tactical_drift <= config.tactical_drift_threshold);
            prop_assert!(state.low_effort_streak <= config.low_effort_threshold);
        }
    }

    /// Back-to-back default actions in the same phase differ.
    #[test]
    fn prop_default_actions_vary(script in session_script()) {
        let engine = DecisionEngine::default();
        let mut state = ConversationState::new(Module0Context::default(), 3);
        let mut previous: Option<(Phase, Action)> = None;

        for analysis in &script {
            let decision = engine.decide(&state, analysis);
            state.apply(&decision);

            if decision.rule == DecisionRule::DefaultPhase {
                if let Some((phase, action)) = previous {
                    if phase == decision.phase {
                        prop_assert_ne!(action, decision.action);
                    }
                }
                previous = Some((decision.phase, decision.action));
            } else {
                previous = None;
            }
        }
    }

    /// Cross-map redirects never repeat a surface/root pair.
    #[test]
    fn prop_cross_map_pairs_are_unique(script in session_script()) {
        let engine = DecisionEngine::default();
        let mut state = ConversationState::new(Module0Context::default(), 3);
        let mut redirected = Vec::new();

        for analysis in &script {
            let decision = engine.decide(&state, analysis);
            if decision.action == Action::CrossMapRedirect {
                let pair = decision.delta.cross_map_attempt;
                prop_assert!(pair.is_some());
                prop_assert!(!redirected.contains(&pair));
                redirected.push(pair);
            }
            state.apply(&decision);
        }
    }

    /// Single-use components render at most once per session.
    #[test]
    fn prop_single_use_components_render_once(script in session_script(), start_turn in 0u32..12) {
        let engine = DecisionEngine::default();
        let registry = Arc::new(ComponentRegistry::builtin());
        let components = ComponentRuleEngine::new(Arc::clone(&registry));
        let mut state = ConversationState::new(Module0Context::default(), 3);
        state.turns_total = start_turn;
        state.turns_in_phase = start_turn;
        let mut shown: HashMap<ComponentType, usize> = HashMap::new();

        for analysis in &script {
            let decision = engine.decide(&state, analysis);
            let effective = EffectiveState::derive(&state, analysis);
            let mut next = state.clone();
            next.apply(&decision);

            let outcome = components.evaluate(
                TriggerPoint::for_decision(&decision),
                &ComponentContext { state: &next, effective: &effective, decision: &decision },
            );
            for component in &outcome.rendered {
                *shown.entry(component.component_type).or_default() += 1;
            }
            next.component_flags.merge(&outcome.flags);
            state = next;
        }

        for (component, count) in shown {
            let single_use = registry.policy_for(component).is_some_and(|p| p.is_single_use());
            if single_use {
                prop_assert!(count <= 1, "{} shown {} times", component, count);
            }
        }
    }
}
