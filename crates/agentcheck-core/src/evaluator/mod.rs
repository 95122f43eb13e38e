//! Pluggable timeline evaluators.
//!
//! Every evaluator implements [`Evaluator`] and is registered by name in an
//! [`EvaluatorRegistry`]. The registry runs applicable evaluators in
//! registration order; adding a new rule means adding a new implementation,
//! never editing a shared dispatcher.

mod approval_gate;
mod context_loading;
mod session_health;
mod stop_on_failure;
mod tool_failure;
mod tool_sequence;
mod tool_usage;

pub use approval_gate::ApprovalGateEvaluator;
pub use context_loading::ContextLoadingEvaluator;
pub use session_health::{SessionHealthEvaluator, TIMEOUT_REASON};
pub use stop_on_failure::StopOnFailureEvaluator;
pub use tool_failure::ToolFailureEvaluator;
pub use tool_sequence::ToolSequenceEvaluator;
pub use tool_usage::ToolUsageEvaluator;

use crate::domain::{EvalError, EvaluationResult, Result, TestCase, Timeline, ToolPolicy};

/// Everything an evaluator may inspect.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub case: &'a TestCase,
    pub timeline: &'a Timeline,
    pub policy: &'a ToolPolicy,
}

impl<'a> EvalContext<'a> {
    pub fn new(case: &'a TestCase, timeline: &'a Timeline, policy: &'a ToolPolicy) -> Self {
        Self {
            case,
            timeline,
            policy,
        }
    }
}

/// A rule-checking unit that inspects a recorded session.
pub trait Evaluator: Send + Sync {
    /// Unique, stable name used in results and scoring weights.
    fn name(&self) -> &str;

    /// Whether this evaluator has anything to check for `case`.
    fn applies_to(&self, _case: &TestCase) -> bool {
        true
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> EvaluationResult;
}

/// Ordered set of evaluators with unique names.
#[derive(Default)]
pub struct EvaluatorRegistry {
    evaluators: Vec<Box<dyn Evaluator>>,
}

impl std::fmt::Debug for EvaluatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluatorRegistry")
            .field("evaluators", &self.names())
            .finish()
    }
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in evaluator.
    pub fn standard() -> Self {
        Self {
            evaluators: vec![
                Box::new(SessionHealthEvaluator),
                Box::new(ApprovalGateEvaluator),
                Box::new(ContextLoadingEvaluator),
                Box::new(ToolUsageEvaluator),
                Box::new(ToolSequenceEvaluator),
                Box::new(ToolFailureEvaluator),
                Box::new(StopOnFailureEvaluator),
            ],
        }
    }

    /// Add an evaluator. Fails if one with the same name is registered.
    pub fn register(&mut self, evaluator: Box<dyn Evaluator>) -> Result<()> {
        if self.evaluators.iter().any(|e| e.name() == evaluator.name()) {
            return Err(EvalError::DuplicateEvaluator(evaluator.name().to_string()));
        }
        self.evaluators.push(evaluator);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, evaluator: Box<dyn Evaluator>) -> Result<Self> {
        self.register(evaluator)?;
        Ok(self)
    }

    pub fn names(&self) -> Vec<&str> {
        self.evaluators.iter().map(|e| e.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }

    /// Run every applicable evaluator against the context.
    pub fn evaluate_all(&self, ctx: &EvalContext<'_>) -> Vec<EvaluationResult> {
        self.evaluators
            .iter()
            .filter(|e| e.applies_to(ctx.case))
            .map(|e| {
                let result = e.evaluate(ctx);
                tracing::debug!(
                    evaluator = %result.evaluator,
                    passed = result.passed,
                    score = result.score,
                    violations = result.violations.len(),
                    "evaluator finished"
                );
                result
            })
            .collect()
    }
}
