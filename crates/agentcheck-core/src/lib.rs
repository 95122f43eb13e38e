//! agentcheck core library
//!
//! Records agent sessions into timelines, runs rule-based evaluators over
//! them, and scores cases and suites against declared expectations.

pub mod config;
pub mod domain;
pub mod evaluator;
pub mod expectations;
pub mod gate;
pub mod loader;
pub mod metrics;
pub mod obs;
pub mod pipeline;
pub mod reporting;
pub mod runner;
pub mod scoring;
pub mod session;
pub mod telemetry;

pub use config::EvalConfig;

pub use domain::{
    ApprovalStrategy, BehaviorExpectation, EvalError, EvaluationResult, EventId, EventKind,
    ExpectedViolation, Result, Severity, TestCase, Timeline, TimelineEvent, TimelineRecorder,
    ToolPolicy, ValidationError, Violation,
};

pub use evaluator::{EvalContext, Evaluator, EvaluatorRegistry};
pub use expectations::{check_expectations, ExpectationMismatch, ExpectationReport};
pub use gate::{
    evaluate_gate, CaseSummary, GateRule, GateRuleSet, GateVerdict, GateViolation, SuiteReport,
    SuiteThresholds,
};
pub use loader::{discover_cases, load_case_file, load_timeline};
pub use pipeline::evaluate_timeline;
pub use reporting::{
    read_suite_artifact, render_summary_md, write_suite_artifact, write_timeline,
    SuiteResultsArtifact,
};
pub use runner::{CaseFilter, CaseOutcome, CaseStatus, SuiteRun, SuiteRunner};
pub use scoring::{score_case, CaseVerdict, ScoringPolicy};
pub use telemetry::init_tracing;

pub use session::{
    AgentDriver, AgentEvent, AgentStream, ProcessAgent, ScriptedAgent, Session, SessionError,
    SessionRunner, SessionStatus,
};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
