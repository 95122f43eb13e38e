//! Evaluate one recorded timeline: evaluators, then expectations and scoring.

use crate::domain::{Severity, TestCase, Timeline, ToolPolicy};
use crate::evaluator::{EvalContext, EvaluatorRegistry};
use crate::metrics::METRICS;
use crate::scoring::{score_case, CaseVerdict, ScoringPolicy};

/// Run every applicable evaluator over `timeline` and score the case.
///
/// Pure apart from logging and counters: the same inputs always give the
/// same verdict.
pub fn evaluate_timeline(
    case: &TestCase,
    timeline: &Timeline,
    registry: &EvaluatorRegistry,
    policy: &ToolPolicy,
    scoring: &ScoringPolicy,
) -> CaseVerdict {
    let ctx = EvalContext::new(case, timeline, policy);
    let results = registry.evaluate_all(&ctx);
    let verdict = score_case(case, results, scoring);

    let violations = verdict.violation_count();
    METRICS.add_violations(violations as u64);
    crate::obs::emit_case_evaluated(&case.id, verdict.score, verdict.passed, violations);

    if verdict.escalate {
        METRICS.inc_escalations();
        let rules: Vec<&str> = verdict
            .unexpected_violations
            .iter()
            .filter(|v| v.severity == Severity::Error)
            .map(|v| v.rule.as_str())
            .collect();
        crate::obs::emit_case_escalated(&case.id, &rules);
    }

    verdict
}
