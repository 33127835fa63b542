//! Prompt overlay lookup.
//!
//! Overlays are opaque instruction text keyed by `(phase, action)`. Lookup
//! falls back to the action-level overlay, then to no overlay at all; the
//! selected text is appended to the base persona for generation.

use serde::Deserialize;
use std::collections::HashMap;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Action, OverlayKey, Phase};

const BASE_PERSONA: &str = "You are a calm, direct business advisor. Your job is to help the \
owner find the single constraint holding the business back. Ask one thing at a time, use the \
owner's own words, and never give tactical advice before the constraint is clear.";

const FALLBACK_REPLY: &str =
    "Thanks, I hear you. Could you tell me a bit more about what feels most stuck right now?";

#[derive(Debug, Deserialize)]
struct OverlayEntry {
    phase: Phase,
    action: Action,
    text: String,
}

/// On-disk override file. Every section is optional.
#[derive(Debug, Default, Deserialize)]
struct OverlayDocument {
    #[serde(default)]
    base_persona: Option<String>,
    #[serde(default)]
    fallback_reply: Option<String>,
    #[serde(default)]
    actions: HashMap<Action, String>,
    #[serde(default)]
    overlays: Vec<OverlayEntry>,
}

/// Immutable overlay table shared by all sessions.
#[derive(Debug, Clone)]
pub struct OverlayRegistry {
    base_persona: String,
    fallback_reply: String,
    by_action: HashMap<Action, String>,
    by_key: HashMap<OverlayKey, String>,
}

impl OverlayRegistry {
    pub fn builtin() -> Self {
        let by_action = builtin_action_overlays()
            .into_iter()
            .map(|(action, text)| (action, text.to_string()))
            .collect();
        let by_key = builtin_phase_overlays()
            .into_iter()
            .map(|(phase, action, text)| (OverlayKey { phase, action }, text.to_string()))
            .collect();

        Self {
            base_persona: BASE_PERSONA.to_string(),
            fallback_reply: FALLBACK_REPLY.to_string(),
            by_action,
            by_key,
        }
    }

    /// Built-ins with the entries from `yaml` layered on top.
    pub fn from_yaml_str(yaml: &str) -> DomainResult<Self> {
        let doc: OverlayDocument = serde_yaml::from_str(yaml)
            .map_err(|e| DomainError::ValidationFailed(format!("invalid overlay file: {e}")))?;

        let mut registry = Self::builtin();
        if let Some(base) = doc.base_persona {
            registry.base_persona = base;
        }
        if let Some(reply) = doc.fallback_reply {
            registry.fallback_reply = reply;
        }
        registry.by_action.extend(doc.actions);
        registry.by_key.extend(
            doc.overlays
                .into_iter()
                .map(|e| (OverlayKey { phase: e.phase, action: e.action }, e.text)),
        );
        Ok(registry)
    }

    /// Overlay text for `key`, or `""` when none is registered.
    pub fn overlay_for(&self, key: OverlayKey) -> &str {
        self.by_key
            .get(&key)
            .or_else(|| self.by_action.get(&key.action))
            .map_or("", String::as_str)
    }

    /// Base persona followed by the overlay, separated by a blank line.
    pub fn compose(&self, key: OverlayKey) -> String {
        let overlay = self.overlay_for(key);
        if overlay.is_empty() {
            self.base_persona.clone()
        } else {
            format!("{}\n\n{}", self.base_persona, overlay)
        }
    }

    pub fn base_persona(&self) -> &str {
        &self.base_persona
    }

    /// Reply used when generation fails.
    pub fn fallback_reply(&self) -> &str {
        &self.fallback_reply
    }
}

impl Default for OverlayRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_action_overlays() -> Vec<(Action, &'static str)> {
    vec![
        (Action::IntakeAcknowledge, "Acknowledge what the owner shared about the business and invite them to describe the challenge in their own words."),
        (Action::DiagnosticQuestion, "Ask one open diagnostic question about where the business is getting stuck."),
        (Action::ReflectiveSummary, "Reflect back what you have heard so far in two sentences, then check whether it lands."),
        (Action::DepthInquiry, "Go one level deeper on the most recent answer: ask what sits underneath it."),
        (Action::ExampleRequest, "Ask for one concrete recent example of the problem."),
        (Action::ClarifyingQuestion, "Ask a short clarifying question about the part that is still vague."),
        (Action::PresentHypothesis, "Name the constraint you believe is primary and explain briefly why, then ask if it fits."),
        (Action::HypothesisPivot, "The owner has not accepted the current read. Drop it without defending it and explore a different explanation."),
        (Action::CrossMapRedirect, "Connect the symptoms the owner keeps describing to the deeper issue they mentioned earlier, and ask whether that link rings true."),
        (Action::CrossMapExplore, "Explore how the confirmed constraint shows up across other parts of the business."),
        (Action::BlockerProbe, "Ask what would most likely get in the way of addressing the constraint."),
        (Action::TacticalRedirect, "Acknowledge the practical question, then bring the conversation back to the underlying constraint before solving tactics."),
        (Action::PushbackGentle, "Gently note that short answers make it hard to help, and ask for a little more detail."),
        (Action::PushbackDirect, "Be direct: explain that you need fuller answers to be useful, and ask a specific question."),
        (Action::PushbackFinal, "Say plainly that the conversation cannot go further without real engagement, and offer to pick it up later."),
        (Action::ReflectSelfDirected, "Summarize the diagnosis and validate that progress is possible with the resources the owner has today."),
        (Action::ReflectAssisted, "Summarize the diagnosis and validate the owner's readiness to work on it with support."),
        (Action::ClosingBlockerCheck, "Ask what is still standing between the owner and a first step."),
        (Action::ActionCommitAssisted, "Confirm the commitment and describe the next step of working on it together."),
        (Action::ActionCommitSelfDirected, "Confirm the commitment and agree on one small first step the owner will take alone."),
        (Action::PostCompletion, "The diagnosis is complete. Answer briefly and point back to the agreed next step."),
    ]
}

fn builtin_phase_overlays() -> Vec<(Phase, Action, &'static str)> {
    vec![
        (Phase::Hypothesis, Action::ReflectiveSummary, "Reflect back the evidence behind the current hypothesis without restating it as settled."),
        (Phase::CrossMapping, Action::ReflectiveSummary, "Reflect how the confirmed constraint connects the issues discussed so far."),
        (Phase::BlockerCheck, Action::ClarifyingQuestion, "Clarify the blocker the owner raised: is it about time, money or confidence?"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_action_has_an_overlay() {
        let registry = OverlayRegistry::builtin();
        let actions: Vec<Action> = builtin_action_overlays().into_iter().map(|(a, _)| a).collect();
        assert_eq!(actions.len(), 21);
        for action in actions {
            let key = OverlayKey {
                phase: Phase::Diagnostic,
                action,
            };
            assert!(!registry.overlay_for(key).is_empty(), "{action}");
        }
    }

    #[test]
    fn test_phase_specific_overlay_wins() {
        let registry = OverlayRegistry::builtin();
        let generic = registry.overlay_for(OverlayKey {
            phase: Phase::Diagnostic,
            action: Action::ReflectiveSummary,
        });
        let specific = registry.overlay_for(OverlayKey {
            phase: Phase::Hypothesis,
            action: Action::ReflectiveSummary,
        });
        assert_ne!(generic, specific);
    }

    #[test]
    fn test_compose_joins_with_blank_line() {
        let registry = OverlayRegistry::builtin();
        let key = OverlayKey {
            phase: Phase::Diagnostic,
            action: Action::DiagnosticQuestion,
        };
        let composed = registry.compose(key);
        assert!(composed.starts_with(registry.base_persona()));
        assert!(composed.ends_with(registry.overlay_for(key)));
        assert!(composed.contains("\n\n"));
    }

    #[test]
    fn test_yaml_overrides_and_empty_overlay() {
        let registry = OverlayRegistry::from_yaml_str(
            r#"
base_persona: "Base."
actions:
  post_completion: ""
overlays:
  - phase: diagnostic
    action: diagnostic_question
    text: "Custom."
"#,
        )
        .unwrap();

        let custom = OverlayKey {
            phase: Phase::Diagnostic,
            action: Action::DiagnosticQuestion,
        };
        assert_eq!(registry.compose(custom), "Base.\n\nCustom.");

        let blank = OverlayKey {
            phase: Phase::Complete,
            action: Action::PostCompletion,
        };
        assert_eq!(registry.compose(blank), "Base.");
        assert_eq!(registry.fallback_reply(), FALLBACK_REPLY);
    }

    #[test]
    fn test_invalid_yaml_is_rejected() {
        assert!(OverlayRegistry::from_yaml_str("actions: [nope").is_err());
    }
}
