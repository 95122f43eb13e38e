//! Failed tool results.

use super::{EvalContext, Evaluator};
use crate::domain::{EvaluationResult, EventKind, Violation};

#[derive(Debug, Clone, Copy, Default)]
pub struct ToolFailureEvaluator;

impl Evaluator for ToolFailureEvaluator {
    fn name(&self) -> &str {
        "tool-failure"
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> EvaluationResult {
        let mut violations = Vec::new();
        let mut results = 0usize;

        for event in ctx.timeline.events() {
            if let EventKind::ToolResult { tool, success } = &event.kind {
                results += 1;
                if !success {
                    violations.push(
                        Violation::warning("tool-failure", format!("'{tool}' returned a failure"))
                            .at(event.seq),
                    );
                }
            }
        }

        let score = if results == 0 {
            1.0
        } else {
            (results - violations.len()) as f32 / results as f32
        };
        EvaluationResult::from_violations(self.name(), violations).with_score(score)
    }
}
