//! Structured per-turn signals produced by the external analysis step.
//!
//! The analysis arrives from a collaborator the engine does not control, so
//! parsing is deliberately forgiving: every field has a neutral default and a
//! malformed field degrades to that default on its own without discarding
//! the rest of the record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::conversation::ScoreDelta;
use super::phase::ConstraintCategory;

/// Highest analysis schema version this build understands.
pub const ANALYSIS_SCHEMA_VERSION: u32 = 1;

/// Signals derived from the user's latest message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnifiedAnalysis {
    pub schema_version: u32,
    pub low_effort: bool,
    pub rejects_hypothesis: bool,
    pub affirms_hypothesis: bool,
    pub tactical_question: bool,
    pub clarity_delta: f64,
    pub confidence_delta: f64,
    pub capacity_delta: f64,
    pub blockers: Vec<String>,
    /// Category implied by the complaint in this message.
    pub surface_category: Option<ConstraintCategory>,
    /// Deeper constraint the user expressed, if any.
    pub root_signal: Option<ConstraintCategory>,
    /// The analyzer's best current guess at the diagnosis.
    pub suggested_category: Option<ConstraintCategory>,
    pub financial_constraint: bool,
    pub ready_to_act: bool,
    pub commits_to_action: bool,
}

impl Default for UnifiedAnalysis {
    fn default() -> Self {
        Self {
            schema_version: ANALYSIS_SCHEMA_VERSION,
            low_effort: false,
            rejects_hypothesis: false,
            affirms_hypothesis: false,
            tactical_question: false,
            clarity_delta: 0.0,
            confidence_delta: 0.0,
            capacity_delta: 0.0,
            blockers: Vec::new(),
            surface_category: None,
            root_signal: None,
            suggested_category: None,
            financial_constraint: false,
            ready_to_act: false,
            commits_to_action: false,
        }
    }
}

impl UnifiedAnalysis {
    /// "No signal": used whenever analysis is missing or unusable.
    pub fn neutral() -> Self {
        Self::default()
    }

    /// Parse a JSON document, falling back to neutral if it is not JSON.
    pub fn from_json_str(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Self::from_value(&value),
            Err(e) => {
                warn!(error = %e, "analysis payload is not valid JSON; using neutral signals");
                Self::neutral()
            }
        }
    }

    /// Read whatever fields are usable from an arbitrary JSON value.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            warn!("analysis payload is not an object; using neutral signals");
            return Self::neutral();
        };

        let schema_version = read_u32(obj, "schema_version").unwrap_or(ANALYSIS_SCHEMA_VERSION);
        if schema_version > ANALYSIS_SCHEMA_VERSION {
            warn!(
                schema_version,
                supported = ANALYSIS_SCHEMA_VERSION,
                "analysis schema is newer than supported; reading known fields only"
            );
        }

        let analysis = Self {
            schema_version,
            low_effort: read_bool(obj, "low_effort"),
            rejects_hypothesis: read_bool(obj, "rejects_hypothesis"),
            affirms_hypothesis: read_bool(obj, "affirms_hypothesis"),
            tactical_question: read_bool(obj, "tactical_question"),
            clarity_delta: read_f64(obj, "clarity_delta"),
            confidence_delta: read_f64(obj, "confidence_delta"),
            capacity_delta: read_f64(obj, "capacity_delta"),
            blockers: read_blockers(obj),
            surface_category: read_category(obj, "surface_category"),
            root_signal: read_category(obj, "root_signal"),
            suggested_category: read_category(obj, "suggested_category"),
            financial_constraint: read_bool(obj, "financial_constraint"),
            ready_to_act: read_bool(obj, "ready_to_act"),
            commits_to_action: read_bool(obj, "commits_to_action"),
        };

        analysis.sanitized()
    }

    /// Normalize values that parsed but cannot be used as-is.
    ///
    /// Deltas are forced finite and into `[-1, 1]`, blank blockers are
    /// dropped, and a message that both affirms and rejects carries neither
    /// signal.
    pub fn sanitized(&self) -> Self {
        let mut clean = self.clone();
        clean.clarity_delta = clamp_delta(self.clarity_delta);
        clean.confidence_delta = clamp_delta(self.confidence_delta);
        clean.capacity_delta = clamp_delta(self.capacity_delta);
        clean.blockers = self
            .blockers
            .iter()
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .collect();
        if clean.affirms_hypothesis && clean.rejects_hypothesis {
            debug!("analysis both affirms and rejects the hypothesis; ignoring both");
            clean.affirms_hypothesis = false;
            clean.rejects_hypothesis = false;
        }
        clean
    }

    pub const fn score_delta(&self) -> ScoreDelta {
        ScoreDelta {
            clarity: self.clarity_delta,
            confidence: self.confidence_delta,
            capacity: self.capacity_delta,
        }
    }

    pub fn mentions_blockers(&self) -> bool {
        !self.blockers.is_empty()
    }
}

fn clamp_delta(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

fn read_bool(obj: &Map<String, Value>, key: &str) -> bool {
    match obj.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(other) => {
            debug!(field = key, value = %other, "non-boolean analysis field treated as false");
            false
        }
    }
}

fn read_f64(obj: &Map<String, Value>, key: &str) -> f64 {
    match obj.get(key) {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        Some(other) => {
            debug!(field = key, value = %other, "non-numeric analysis field treated as 0");
            0.0
        }
    }
}

fn read_u32(obj: &Map<String, Value>, key: &str) -> Option<u32> {
    obj.get(key)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
}

fn read_category(obj: &Map<String, Value>, key: &str) -> Option<ConstraintCategory> {
    let raw = obj.get(key)?.as_str()?;
    match raw.parse() {
        Ok(category) => Some(category),
        Err(e) => {
            debug!(field = key, error = %e, "unrecognized category ignored");
            None
        }
    }
}

fn read_blockers(obj: &Map<String, Value>) -> Vec<String> {
    match obj.get("blockers") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(single)) => vec![single.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_fields_default_to_neutral() {
        let analysis = UnifiedAnalysis::from_value(&json!({}));
        assert_eq!(analysis, UnifiedAnalysis::neutral());
    }

    #[test]
    fn test_mistyped_fields_degrade_individually() {
        let analysis = UnifiedAnalysis::from_value(&json!({
            "low_effort": "yes",
            "tactical_question": true,
            "clarity_delta": "0.2",
            "confidence_delta": {"nested": 1},
            "surface_category": "finance",
            "root_signal": "strategy",
            "blockers": ["time", 42, "  "],
        }));

        assert!(!analysis.low_effort);
        assert!(analysis.tactical_question);
        assert!((analysis.clarity_delta - 0.2).abs() < f64::EPSILON);
        assert!(analysis.confidence_delta.abs() < f64::EPSILON);
        assert_eq!(analysis.surface_category, None);
        assert_eq!(analysis.root_signal, Some(ConstraintCategory::Strategy));
        assert_eq!(analysis.blockers, vec!["time".to_string()]);
    }

    #[test]
    fn test_non_object_and_invalid_json_are_neutral() {
        assert_eq!(
            UnifiedAnalysis::from_value(&json!([1, 2, 3])),
            UnifiedAnalysis::neutral()
        );
        assert_eq!(
            UnifiedAnalysis::from_json_str("{not json"),
            UnifiedAnalysis::neutral()
        );
    }

    #[test]
    fn test_deltas_are_clamped() {
        let analysis = UnifiedAnalysis::from_value(&json!({
            "clarity_delta": 4.0,
            "capacity_delta": -9.5,
        }));
        assert!((analysis.clarity_delta - 1.0).abs() < f64::EPSILON);
        assert!((analysis.capacity_delta + 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_contradictory_hypothesis_signals_cancel() {
        let analysis = UnifiedAnalysis {
            affirms_hypothesis: true,
            rejects_hypothesis: true,
            ..Default::default()
        }
        .sanitized();
        assert!(!analysis.affirms_hypothesis);
        assert!(!analysis.rejects_hypothesis);
    }

    #[test]
    fn test_newer_schema_still_reads_known_fields() {
        let analysis = UnifiedAnalysis::from_value(&json!({
            "schema_version": 3,
            "rejects_hypothesis": true,
            "sentiment": "frustrated",
        }));
        assert_eq!(analysis.schema_version, 3);
        assert!(analysis.rejects_hypothesis);
    }

    #[test]
    fn test_single_string_blocker_accepted() {
        let analysis = UnifiedAnalysis::from_value(&json!({"blockers": "cash flow"}));
        assert_eq!(analysis.blockers, vec!["cash flow".to_string()]);
        assert!(analysis.mentions_blockers());
    }
}
