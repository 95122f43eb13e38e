//! Ordered tool subsequence matching.

use super::{EvalContext, Evaluator};
use crate::domain::{EvaluationResult, TestCase, Violation};

/// Checks that `expectedSequence` appears, in order, within the tool calls.
/// Other calls may be interleaved.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolSequenceEvaluator;

impl Evaluator for ToolSequenceEvaluator {
    fn name(&self) -> &str {
        "tool-sequence"
    }

    fn applies_to(&self, case: &TestCase) -> bool {
        !case.behavior.expected_sequence.is_empty()
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> EvaluationResult {
        let expected = &ctx.case.behavior.expected_sequence;
        let mut steps = expected.iter().peekable();
        let mut matched = 0usize;

        for tool in ctx.timeline.tool_calls().filter_map(|e| e.tool()) {
            match steps.peek() {
                Some(step) if step.eq_ignore_ascii_case(tool) => {
                    steps.next();
                    matched += 1;
                }
                Some(_) => {}
                None => break,
            }
        }

        let mut violations = Vec::new();
        if let Some(step) = steps.next() {
            violations.push(Violation::error(
                "tool-sequence",
                format!(
                    "expected sequence stopped at step {} ('{step}') of {}",
                    matched + 1,
                    expected.len()
                ),
            ));
        }

        let score = matched as f32 / expected.len() as f32;
        EvaluationResult::from_violations(self.name(), violations).with_score(score)
    }
}
