//! Context loading: project context must be read before acting.

use super::{EvalContext, Evaluator};
use crate::domain::{EvaluationResult, TestCase, Violation};

#[derive(Debug, Clone, Copy, Default)]
pub struct ContextLoadingEvaluator;

impl Evaluator for ContextLoadingEvaluator {
    fn name(&self) -> &str {
        "context-loading"
    }

    fn applies_to(&self, case: &TestCase) -> bool {
        case.behavior.requires_context || !case.behavior.required_context.is_empty()
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> EvaluationResult {
        let events = ctx.timeline.events();
        let first_load = events.iter().find(|e| ctx.policy.is_context_load(e));
        let first_effect = events.iter().find(|e| ctx.policy.is_effectful_call(e));

        let mut violations = Vec::new();
        let mut score = 1.0f32;

        match (first_load, first_effect) {
            (None, effect) => {
                let mut v = Violation::error("context-loading", "no context was loaded");
                if let Some(effect) = effect {
                    v = v.at(effect.seq);
                }
                violations.push(v);
                score = 0.0;
            }
            (Some(load), Some(effect)) if load.seq > effect.seq => {
                violations.push(
                    Violation::error(
                        "context-loading",
                        format!(
                            "context loaded late at seq {}, after first effectful action",
                            load.seq
                        ),
                    )
                    .at(effect.seq),
                );
                score = 0.5;
            }
            _ => {}
        }

        let sources: Vec<&str> = events
            .iter()
            .filter_map(|e| ctx.policy.context_source(e))
            .collect();
        for pattern in &ctx.case.behavior.required_context {
            if !sources.iter().any(|s| s.contains(pattern.as_str())) {
                violations.push(Violation::warning(
                    "required-context",
                    format!("required context '{pattern}' was never loaded"),
                ));
                score -= 0.1;
            }
        }

        EvaluationResult::from_violations(self.name(), violations).with_score(score)
    }
}
