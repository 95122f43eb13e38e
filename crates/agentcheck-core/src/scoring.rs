//! Per-case scoring: evaluator results + expectations -> [`CaseVerdict`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{EvaluationResult, Severity, TestCase, Violation};
use crate::expectations::{check_expectations, expected_rules, ExpectationMismatch};

/// Weights and threshold for combining evaluator scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    /// Per-evaluator weight; evaluators not listed use `default_weight`.
    pub weights: BTreeMap<String, f32>,
    pub default_weight: f32,
    /// Minimum weighted score for a case to pass.
    pub pass_threshold: f32,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            weights: BTreeMap::new(),
            default_weight: 1.0,
            pass_threshold: 0.7,
        }
    }
}

impl ScoringPolicy {
    pub fn weight(&self, evaluator: &str) -> f32 {
        self.weights
            .get(evaluator)
            .copied()
            .unwrap_or(self.default_weight)
    }

    pub fn with_weight(mut self, evaluator: impl Into<String>, weight: f32) -> Self {
        self.weights.insert(evaluator.into(), weight);
        self
    }
}

/// Final verdict for one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseVerdict {
    pub case_id: String,
    pub passed: bool,
    /// Weighted score in 0.0–1.0 with expected violations forgiven.
    pub score: f32,
    pub evaluator_results: Vec<EvaluationResult>,
    /// Violations whose rule the case did not declare as expected.
    pub unexpected_violations: Vec<Violation>,
    pub expectation_mismatches: Vec<ExpectationMismatch>,
    /// An unexpected error-severity violation needs human review.
    pub escalate: bool,
}

impl CaseVerdict {
    pub fn violation_count(&self) -> usize {
        self.evaluator_results
            .iter()
            .map(|r| r.violations.len())
            .sum()
    }
}

/// Combine evaluator results for `case` into a verdict.
///
/// An evaluator whose violations were all declared `shouldOccur` counts as a
/// full score. The case passes when every expectation holds, no unexpected
/// error was found, and the weighted score reaches the threshold.
pub fn score_case(
    case: &TestCase,
    results: Vec<EvaluationResult>,
    policy: &ScoringPolicy,
) -> CaseVerdict {
    let expectations = check_expectations(&case.expected_violations, &results);
    let expected = expected_rules(&case.expected_violations);

    let unexpected_violations: Vec<Violation> = results
        .iter()
        .flat_map(|r| r.violations.iter())
        .filter(|v| !expected.contains(v.rule.as_str()))
        .cloned()
        .collect();

    let mut weighted = 0.0f32;
    let mut total_weight = 0.0f32;
    for result in &results {
        let weight = policy.weight(&result.evaluator);
        if weight <= 0.0 {
            continue;
        }
        let forgiven = !result.violations.is_empty()
            && result
                .violations
                .iter()
                .all(|v| expected.contains(v.rule.as_str()));
        let score = if forgiven { 1.0 } else { result.score };
        weighted += weight * score;
        total_weight += weight;
    }
    let score = if total_weight > 0.0 {
        weighted / total_weight
    } else {
        1.0
    };

    let escalate = unexpected_violations
        .iter()
        .any(|v| v.severity == Severity::Error);
    let passed = expectations.holds() && !escalate && score >= policy.pass_threshold;

    CaseVerdict {
        case_id: case.id.clone(),
        passed,
        score,
        evaluator_results: results,
        unexpected_violations,
        expectation_mismatches: expectations.mismatches,
        escalate,
    }
}
