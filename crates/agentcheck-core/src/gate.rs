//! Suite gate rules engine.
//!
//! Evaluates a [`SuiteReport`] against a [`GateRuleSet`] to produce a
//! [`GateVerdict`], the pass/fail decision for a whole suite run. Supports
//! pass-rate and mean-score thresholds, regression limits against a baseline,
//! tag/category required-pass rules, an escalation budget, and fail-fast.

use serde::{Deserialize, Serialize};

use crate::scoring::CaseVerdict;

// ---------------------------------------------------------------------------
// Suite report (input to the gate)
// ---------------------------------------------------------------------------

/// Compact per-case summary consumed by the gate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseSummary {
    pub case_id: String,
    pub category: String,
    pub score: f32,
    pub passed: bool,
    pub escalated: bool,
    pub tags: Vec<String>,
}

/// Aggregated report from a suite run.
///
/// # Invariants
///
/// `pass_rate` and `mean_score` are derived from `case_results` by
/// [`SuiteReport::from_cases`]. Hand-built reports must keep them consistent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuiteReport {
    pub case_results: Vec<CaseSummary>,
    pub pass_rate: f32,
    pub mean_score: f32,
    /// Optional baseline pass rate for regression detection.
    pub baseline_pass_rate: Option<f32>,
}

impl SuiteReport {
    /// Derive aggregate rates from case summaries.
    ///
    /// An empty suite has pass rate and mean score 0.0.
    pub fn from_cases(case_results: Vec<CaseSummary>, baseline_pass_rate: Option<f32>) -> Self {
        let total = case_results.len();
        let (pass_rate, mean_score) = if total == 0 {
            (0.0, 0.0)
        } else {
            let passed = case_results.iter().filter(|c| c.passed).count();
            let score_sum: f32 = case_results.iter().map(|c| c.score).sum();
            (passed as f32 / total as f32, score_sum / total as f32)
        };
        Self {
            case_results,
            pass_rate,
            mean_score,
            baseline_pass_rate,
        }
    }

    pub fn escalations(&self) -> usize {
        self.case_results.iter().filter(|c| c.escalated).count()
    }
}

impl CaseSummary {
    pub fn from_verdict(verdict: &CaseVerdict, category: &str, tags: &[String]) -> Self {
        Self {
            case_id: verdict.case_id.clone(),
            category: category.to_string(),
            score: verdict.score,
            passed: verdict.passed,
            escalated: verdict.escalate,
            tags: tags.to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// Gate rules
// ---------------------------------------------------------------------------

/// Suite-level pass/fail thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SuiteThresholds {
    /// Minimum pass rate (0.0–1.0).
    pub min_pass_rate: f32,
    /// Maximum allowed drop (0.0–1.0) vs. baseline pass rate.
    pub max_regression: f32,
    /// Minimum mean case score (0.0–1.0).
    pub min_mean_score: f32,
    /// Stop at the first violated rule.
    pub fail_fast: bool,
}

impl Default for SuiteThresholds {
    fn default() -> Self {
        Self {
            min_pass_rate: 0.95,
            max_regression: 0.05,
            min_mean_score: 0.8,
            fail_fast: false,
        }
    }
}

/// A single rule that can fail a suite.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GateRule {
    /// Pass rate must meet or exceed `min_pass_rate`.
    MinPassRate,
    /// Regression (baseline − current) must not exceed `max_regression`.
    MaxRegression,
    /// Mean score must meet or exceed `min_mean_score`.
    MinMeanScore,
    /// All cases with the given tag must pass.
    RequireTag { tag: String },
    /// All cases in the given category must pass.
    RequireCategory { category: String },
    /// At most `max` cases may require escalation.
    MaxEscalations { max: usize },
}

/// A set of gate rules plus the thresholds they reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateRuleSet {
    pub thresholds: SuiteThresholds,
    pub rules: Vec<GateRule>,
}

impl GateRuleSet {
    /// Default thresholds with `MinPassRate`, `MaxRegression`, and
    /// `MinMeanScore`.
    pub fn standard() -> Self {
        Self {
            thresholds: SuiteThresholds::default(),
            rules: vec![
                GateRule::MinPassRate,
                GateRule::MaxRegression,
                GateRule::MinMeanScore,
            ],
        }
    }

    pub fn with_rule(mut self, rule: GateRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_thresholds(mut self, thresholds: SuiteThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// A single gate rule violation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateViolation {
    pub rule: GateRule,
    pub reason: String,
}

/// The outcome of evaluating a gate rule set against a suite report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateVerdict {
    pub violations: Vec<GateViolation>,
}

impl GateVerdict {
    /// Whether the gate passed (no violations).
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Evaluate a [`SuiteReport`] against a [`GateRuleSet`].
///
/// When `thresholds.fail_fast` is set, evaluation stops at the first violation.
pub fn evaluate_gate(rule_set: &GateRuleSet, report: &SuiteReport) -> GateVerdict {
    let mut violations = Vec::new();

    for rule in &rule_set.rules {
        if let Some(v) = check_rule(rule, &rule_set.thresholds, report) {
            violations.push(v);
            if rule_set.thresholds.fail_fast {
                break;
            }
        }
    }

    GateVerdict { violations }
}

fn check_rule(
    rule: &GateRule,
    thresholds: &SuiteThresholds,
    report: &SuiteReport,
) -> Option<GateViolation> {
    let violation = |reason: String| {
        Some(GateViolation {
            rule: rule.clone(),
            reason,
        })
    };

    match rule {
        GateRule::MinPassRate => {
            if report.pass_rate < thresholds.min_pass_rate {
                violation(format!(
                    "pass rate {:.2}% < required {:.2}%",
                    report.pass_rate * 100.0,
                    thresholds.min_pass_rate * 100.0,
                ))
            } else {
                None
            }
        }
        GateRule::MaxRegression => {
            // No baseline → no regression to check
            let baseline = report.baseline_pass_rate?;
            let regression = baseline - report.pass_rate;
            if regression > thresholds.max_regression {
                violation(format!(
                    "regression {:.2}% > allowed {:.2}% (baseline {:.2}% → current {:.2}%)",
                    regression * 100.0,
                    thresholds.max_regression * 100.0,
                    baseline * 100.0,
                    report.pass_rate * 100.0,
                ))
            } else {
                None
            }
        }
        GateRule::MinMeanScore => {
            if report.mean_score < thresholds.min_mean_score {
                violation(format!(
                    "mean score {:.3} < required {:.3}",
                    report.mean_score, thresholds.min_mean_score,
                ))
            } else {
                None
            }
        }
        GateRule::RequireTag { tag } => {
            require_all_pass(report, |c| c.tags.contains(tag), &format!("tagged '{tag}'"))
                .and_then(violation)
        }
        GateRule::RequireCategory { category } => require_all_pass(
            report,
            |c| &c.category == category,
            &format!("in category '{category}'"),
        )
        .and_then(violation),
        GateRule::MaxEscalations { max } => {
            let escalations = report.escalations();
            if escalations > *max {
                violation(format!(
                    "{escalations} cases need escalation, at most {max} allowed"
                ))
            } else {
                None
            }
        }
    }
}

fn require_all_pass(
    report: &SuiteReport,
    select: impl Fn(&CaseSummary) -> bool,
    label: &str,
) -> Option<String> {
    let selected: Vec<&CaseSummary> = report.case_results.iter().filter(|c| select(c)).collect();
    let failed: Vec<&str> = selected
        .iter()
        .filter(|c| !c.passed)
        .map(|c| c.case_id.as_str())
        .collect();

    if failed.is_empty() {
        None
    } else {
        Some(format!(
            "{} of {} cases {} failed: [{}]",
            failed.len(),
            selected.len(),
            label,
            failed.join(", "),
        ))
    }
}
