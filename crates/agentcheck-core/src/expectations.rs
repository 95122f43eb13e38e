//! Matching declared expected violations against what evaluators found.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::{EvaluationResult, ExpectedViolation, Severity, Violation};

/// One declared expectation that did not hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectationMismatch {
    pub rule: String,
    pub should_occur: bool,
    /// Violations of this rule actually found.
    pub actual_count: usize,
    pub detail: String,
}

/// Outcome of checking a case's `expectedViolations`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectationReport {
    pub mismatches: Vec<ExpectationMismatch>,
    /// Rules declared `shouldOccur` that were observed.
    pub confirmed: Vec<String>,
}

impl ExpectationReport {
    pub fn holds(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Rules a case declares as expected to occur.
pub fn expected_rules(expected: &[ExpectedViolation]) -> BTreeSet<&str> {
    expected
        .iter()
        .filter(|e| e.should_occur)
        .map(|e| e.rule.as_str())
        .collect()
}

/// Compare declared expectations with evaluator output.
pub fn check_expectations(
    expected: &[ExpectedViolation],
    results: &[EvaluationResult],
) -> ExpectationReport {
    let all: Vec<&Violation> = results.iter().flat_map(|r| r.violations.iter()).collect();
    let mut report = ExpectationReport::default();

    for exp in expected {
        let found: Vec<&&Violation> = all.iter().filter(|v| v.rule == exp.rule).collect();
        let count = found.len();

        if exp.should_occur {
            if count == 0 {
                report.mismatches.push(ExpectationMismatch {
                    rule: exp.rule.clone(),
                    should_occur: true,
                    actual_count: 0,
                    detail: "expected violation did not occur".to_string(),
                });
                continue;
            }
            if let Some(severity) = exp.severity {
                if !found.iter().any(|v| v.severity == severity) {
                    report.mismatches.push(ExpectationMismatch {
                        rule: exp.rule.clone(),
                        should_occur: true,
                        actual_count: count,
                        detail: format!(
                            "violation occurred but not at severity {severity} (found {})",
                            describe_severities(&found)
                        ),
                    });
                    continue;
                }
            }
            report.confirmed.push(exp.rule.clone());
        } else if count > 0 {
            report.mismatches.push(ExpectationMismatch {
                rule: exp.rule.clone(),
                should_occur: false,
                actual_count: count,
                detail: format!("violation occurred {count} time(s) but should not"),
            });
        }
    }

    report
}

fn describe_severities(found: &[&&Violation]) -> String {
    let set: BTreeSet<Severity> = found.iter().map(|v| v.severity).collect();
    set.iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
