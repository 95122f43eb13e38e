//! Violations and per-evaluator results.

use serde::{Deserialize, Serialize};

/// Violation severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Score penalty applied per violation of this severity.
    pub fn penalty(self) -> f32 {
        match self {
            Self::Info => 0.0,
            Self::Warning => 0.1,
            Self::Error => 0.5,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// A single rule violation found in a timeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Violation {
    /// Kebab-case rule name, e.g. `approval-gate`.
    pub rule: String,
    pub severity: Severity,
    /// Human-readable explanation.
    pub message: String,
    /// Seq of the offending timeline event, when there is one.
    pub event_seq: Option<u64>,
}

impl Violation {
    pub fn new(rule: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            severity,
            message: message.into(),
            event_seq: None,
        }
    }

    pub fn error(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(rule, Severity::Error, message)
    }

    pub fn warning(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(rule, Severity::Warning, message)
    }

    /// Attach the offending event seq.
    pub fn at(mut self, seq: u64) -> Self {
        self.event_seq = Some(seq);
        self
    }
}

/// Verdict of one evaluator over one timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Name of the evaluator that produced this result.
    pub evaluator: String,
    /// True when no `Error` violation was found.
    pub passed: bool,
    /// Score in 0.0–1.0.
    pub score: f32,
    pub violations: Vec<Violation>,
}

impl EvaluationResult {
    /// Build a result from raw violations.
    ///
    /// Identical violations collapse to their first occurrence. The score
    /// starts at 1.0 and loses [`Severity::penalty`] per remaining violation.
    pub fn from_violations(evaluator: impl Into<String>, violations: Vec<Violation>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let violations: Vec<Violation> = violations
            .into_iter()
            .filter(|v| seen.insert(v.clone()))
            .collect();

        let penalty: f32 = violations.iter().map(|v| v.severity.penalty()).sum();
        let passed = !violations.iter().any(|v| v.severity == Severity::Error);

        Self {
            evaluator: evaluator.into(),
            passed,
            score: (1.0 - penalty).max(0.0),
            violations,
        }
    }

    /// Override the computed score, clamped to 0.0–1.0.
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score.clamp(0.0, 1.0);
        self
    }

    pub fn error_count(&self) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Error)
            .count()
    }

    pub fn has_rule(&self, rule: &str) -> bool {
        self.violations.iter().any(|v| v.rule == rule)
    }
}
