//! Domain models for agentcheck.
//!
//! Canonical definitions for the core entities:
//! - `TestCase`: prompt plus behavioral expectations
//! - `Timeline`: ordered event log of one session
//! - `EvaluationResult`: one evaluator's verdict and violations
//! - `ToolPolicy`: which tools are effectful or load context

pub mod error;
pub mod policy;
pub mod test_case;
pub mod timeline;
pub mod verdict;

pub use error::{EvalError, Result, ValidationError};
pub use policy::ToolPolicy;
pub use test_case::{
    ApprovalStrategy, BehaviorExpectation, ExpectedViolation, TestCase, DEFAULT_TIMEOUT_SECS,
};
pub use timeline::{EventId, EventKind, Timeline, TimelineEvent, TimelineRecorder};
pub use verdict::{EvaluationResult, Severity, Violation};
