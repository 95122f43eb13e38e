//! Domain-level error taxonomy for agentcheck.

/// Errors produced by test-case and timeline validation.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("field must not be empty: {field}")]
    EmptyField { field: &'static str },

    #[error("timeout must be greater than zero")]
    InvalidTimeout,

    #[error("tool {tool} is both required and forbidden")]
    ConflictingTool { tool: String },

    #[error("min tool calls {min} exceeds max tool calls {max}")]
    InvalidToolBudget { min: u32, max: u32 },

    #[error("rule {rule} listed more than once in expected violations")]
    DuplicateExpectedRule { rule: String },

    #[error("event seq {actual} out of order, expected {expected}")]
    NonContiguousSeq { expected: u64, actual: u64 },

    #[error("event seq {seq} timestamp precedes the previous event")]
    NonMonotonicTimestamp { seq: u64 },

    #[error("timeline already terminated at seq {seq}")]
    AlreadyTerminated { seq: u64 },

    #[error("terminal event at seq {seq} is not the last event")]
    TerminalNotLast { seq: u64 },
}

/// agentcheck domain errors.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("invalid test case {id}: {source}")]
    InvalidTestCase {
        id: String,
        #[source]
        source: ValidationError,
    },

    #[error("invalid timeline: {0}")]
    InvalidTimeline(ValidationError),

    #[error("duplicate test case id: {0}")]
    DuplicateCaseId(String),

    #[error("evaluator already registered: {0}")]
    DuplicateEvaluator(String),

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("session error: {0}")]
    Session(#[from] crate::session::SessionError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("toml parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for agentcheck domain operations.
pub type Result<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_test_case_display_includes_id() {
        let err = EvalError::InvalidTestCase {
            id: "approval-01".to_string(),
            source: ValidationError::EmptyField { field: "prompt" },
        };
        let msg = err.to_string();
        assert!(msg.contains("approval-01"));
        assert!(msg.contains("prompt"));
    }

    #[test]
    fn test_digest_mismatch_error() {
        let err = EvalError::DigestMismatch {
            expected: "abc123".to_string(),
            actual: "def456".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc123"));
        assert!(msg.contains("def456"));
    }

    #[test]
    fn test_validation_error_converts() {
        let err: EvalError = ValidationError::InvalidTimeout.into();
        assert!(err.to_string().contains("timeout"));
    }
}
