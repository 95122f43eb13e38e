//! Error types for the session layer.

/// Errors produced while driving an agent session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to start agent {agent}: {reason}")]
    Spawn { agent: String, reason: String },

    #[error("agent command must not be empty")]
    EmptyCommand,

    #[error("timeline rejected event: {0}")]
    Timeline(#[from] crate::domain::ValidationError),

    #[error("agent protocol error: {0}")]
    Protocol(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for session operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;
