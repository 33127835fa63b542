//! Dialogue phases and constraint categories.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A coarse stage of the diagnostic dialogue.
///
/// Variants are declared in dialogue order; the derived `Ord` is the phase
/// order, and a session's phase never moves backwards in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Intake,
    Diagnostic,
    DepthInquiry,
    Hypothesis,
    CrossMapping,
    BlockerCheck,
    Closing,
    Complete,
}

impl Phase {
    /// All phases in order.
    pub const ALL: [Self; 8] = [
        Self::Intake,
        Self::Diagnostic,
        Self::DepthInquiry,
        Self::Hypothesis,
        Self::CrossMapping,
        Self::BlockerCheck,
        Self::Closing,
        Self::Complete,
    ];

    /// Zero-based position in the phase order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The phase that follows this one, if any.
    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::Diagnostic => "diagnostic",
            Self::DepthInquiry => "depth_inquiry",
            Self::Hypothesis => "hypothesis",
            Self::CrossMapping => "cross_mapping",
            Self::BlockerCheck => "blocker_check",
            Self::Closing => "closing",
            Self::Complete => "complete",
        }
    }

    /// Terminal absorbing phase.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown phase '{s}'"))
    }
}

/// The dominant business constraint the dialogue tries to identify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintCategory {
    Strategy,
    Execution,
    Energy,
}

impl ConstraintCategory {
    pub const ALL: [Self; 3] = [Self::Strategy, Self::Execution, Self::Energy];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strategy => "strategy",
            Self::Execution => "execution",
            Self::Energy => "energy",
        }
    }

    /// Whether a constraint in `self` typically shows up as symptoms in `other`.
    ///
    /// Unclear strategy and depleted energy both surface as execution
    /// complaints; no other pair is treated as causal.
    pub const fn is_upstream_of(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::Strategy, Self::Execution) | (Self::Energy, Self::Execution)
        )
    }
}

impl fmt::Display for ConstraintCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConstraintCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strategy" => Ok(Self::Strategy),
            "execution" => Ok(Self::Execution),
            "energy" => Ok(Self::Energy),
            other => Err(format!("unknown constraint category '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order_matches_declaration() {
        for pair in Phase::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].next(), Some(pair[1]));
        }
        assert_eq!(Phase::Complete.next(), None);
    }

    #[test]
    fn test_phase_string_round_trip() {
        for phase in Phase::ALL {
            assert_eq!(phase.as_str().parse::<Phase>().unwrap(), phase);
        }
        assert!("negotiation".parse::<Phase>().is_err());
    }

    #[test]
    fn test_phase_serializes_snake_case() {
        let json = serde_json::to_string(&Phase::DepthInquiry).unwrap();
        assert_eq!(json, "\"depth_inquiry\"");
    }

    #[test]
    fn test_upstream_relation() {
        use ConstraintCategory::*;
        assert!(Strategy.is_upstream_of(Execution));
        assert!(Energy.is_upstream_of(Execution));
        assert!(!Execution.is_upstream_of(Strategy));
        assert!(!Strategy.is_upstream_of(Energy));
        assert!(!Energy.is_upstream_of(Energy));
    }

    #[test]
    fn test_category_parse_is_case_insensitive() {
        assert_eq!(
            " Energy ".parse::<ConstraintCategory>().unwrap(),
            ConstraintCategory::Energy
        );
    }
}
