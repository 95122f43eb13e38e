//! Required/forbidden tools and call budgets.

use super::{EvalContext, Evaluator};
use crate::domain::{EvaluationResult, TimelineEvent, Violation};

#[derive(Debug, Clone, Copy, Default)]
pub struct ToolUsageEvaluator;

impl Evaluator for ToolUsageEvaluator {
    fn name(&self) -> &str {
        "tool-usage"
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> EvaluationResult {
        let behavior = &ctx.case.behavior;
        let calls: Vec<_> = ctx.timeline.tool_calls().collect();
        let called = |tool: &str| calls.iter().any(|e| is_call_to(e, tool));

        let mut violations = Vec::new();
        let mut checks = 0usize;
        let mut failed = 0usize;

        for tool in &behavior.must_use_tools {
            checks += 1;
            if !called(tool) {
                failed += 1;
                violations.push(Violation::error(
                    "required-tool",
                    format!("required tool '{tool}' was never called"),
                ));
            }
        }

        for tool in &behavior.must_not_use_tools {
            checks += 1;
            let offending: Vec<_> = calls.iter().filter(|e| is_call_to(e, tool)).collect();
            if !offending.is_empty() {
                failed += 1;
            }
            for event in offending {
                violations.push(
                    Violation::error(
                        "forbidden-tool",
                        format!("forbidden tool '{tool}' was called"),
                    )
                    .at(event.seq),
                );
            }
        }

        let count = calls.len() as u32;
        if let Some(min) = behavior.min_tool_calls {
            checks += 1;
            if count < min {
                failed += 1;
                violations.push(Violation::warning(
                    "tool-call-budget",
                    format!("{count} tool calls, expected at least {min}"),
                ));
            }
        }
        if let Some(max) = behavior.max_tool_calls {
            checks += 1;
            if count > max {
                failed += 1;
                violations.push(Violation::warning(
                    "tool-call-budget",
                    format!("{count} tool calls, expected at most {max}"),
                ));
            }
        }

        let score = if checks == 0 {
            1.0
        } else {
            (checks - failed) as f32 / checks as f32
        };

        EvaluationResult::from_violations(self.name(), violations).with_score(score)
    }
}

fn is_call_to(event: &TimelineEvent, tool: &str) -> bool {
    event.tool().is_some_and(|t| t.eq_ignore_ascii_case(tool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BehaviorExpectation, EventKind, TestCase, ToolPolicy};
    use crate::evaluator::test_support::*;

    fn run(
        behavior: BehaviorExpectation,
        events: Vec<(EventKind, serde_json::Value)>,
    ) -> EvaluationResult {
        let case = TestCase::new("c", "x").with_behavior(behavior);
        let tl = timeline(events);
        let policy = ToolPolicy::default();
        ToolUsageEvaluator.evaluate(&EvalContext::new(&case, &tl, &policy))
    }

    #[test]
    fn test_no_expectations_is_clean() {
        let result = run(BehaviorExpectation::default(), vec![call("bash")]);
        assert!(result.passed);
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn test_required_tool_matched_case_insensitively() {
        let result = run(
            BehaviorExpectation {
                must_use_tools: vec!["Read".into()],
                ..Default::default()
            },
            vec![call("read")],
        );
        assert!(result.passed);
    }

    #[test]
    fn test_missing_required_tool_fails() {
        let result = run(
            BehaviorExpectation {
                must_use_tools: vec!["read".into(), "write".into()],
                ..Default::default()
            },
            vec![call("read")],
        );
        assert!(!result.passed);
        assert!(result.has_rule("required-tool"));
        assert_eq!(result.score, 0.5);
    }

    #[test]
    fn test_forbidden_tool_flags_each_call() {
        let result = run(
            BehaviorExpectation {
                must_not_use_tools: vec!["bash".into()],
                ..Default::default()
            },
            vec![call("bash"), call("read"), call("bash")],
        );
        assert_eq!(result.error_count(), 2);
        let seqs: Vec<_> = result.violations.iter().filter_map(|v| v.event_seq).collect();
        assert_eq!(seqs, vec![1, 3]);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_budget_violations_are_warnings() {
        let result = run(
            BehaviorExpectation {
                max_tool_calls: Some(1),
                ..Default::default()
            },
            vec![call("read"), call("read")],
        );
        assert!(result.passed);
        assert!(result.has_rule("tool-call-budget"));
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_too_few_calls_is_budget_warning() {
        let result = run(
            BehaviorExpectation {
                min_tool_calls: Some(3),
                max_tool_calls: Some(5),
                ..Default::default()
            },
            vec![call("read"), bare(EventKind::AssistantMessage)],
        );
        assert!(result.passed);
        let budget = result
            .violations
            .iter()
            .find(|v| v.rule == "tool-call-budget")
            .expect("budget violation");
        assert_eq!(budget.severity, crate::domain::Severity::Warning);
        assert!(budget.message.contains("at least 3"));
        assert_eq!(result.score, 0.5);
    }
}
