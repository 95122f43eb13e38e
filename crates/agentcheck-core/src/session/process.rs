//! Subprocess agent speaking JSON lines over stdio.
//!
//! Protocol:
//! - harness → agent (stdin): one `{"type":"prompt", ...}` line, then one
//!   `{"type":"approval_decision", ...}` line per approval request.
//! - agent → harness (stdout): one [`AgentEvent`] JSON object per line.
//!
//! Lines that do not parse are logged and skipped. When stdout closes the
//! stream ends. The child is killed as soon as stdout closes or the session
//! drops its stream, whichever comes first.

use std::process::Stdio;

use async_trait::async_trait;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{
    AgentDriver, AgentEvent, AgentStream, SessionError, SessionResult, STREAM_BUFFER,
};
use crate::domain::TestCase;

/// Agent launched as a child process.
#[derive(Debug, Clone)]
pub struct ProcessAgent {
    name: String,
    command: Vec<String>,
}

impl ProcessAgent {
    /// `command[0]` is the executable, the rest are arguments.
    pub fn new(name: impl Into<String>, command: Vec<String>) -> SessionResult<Self> {
        if command.is_empty() || command[0].trim().is_empty() {
            return Err(SessionError::EmptyCommand);
        }
        Ok(Self {
            name: name.into(),
            command,
        })
    }

    /// Split a shell-like command line on whitespace.
    pub fn from_command_line(name: impl Into<String>, line: &str) -> SessionResult<Self> {
        Self::new(name, line.split_whitespace().map(str::to_string).collect())
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }
}

#[async_trait]
impl AgentDriver for ProcessAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, case: &TestCase) -> SessionResult<AgentStream> {
        let mut child = Command::new(&self.command[0])
            .args(&self.command[1..])
            .env("AGENTCHECK_CASE_ID", &case.id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SessionError::Spawn {
                agent: self.name.clone(),
                reason: e.to_string(),
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SessionError::Protocol("child stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::Protocol("child stdout unavailable".to_string()))?;

        let prompt = json!({
            "type": "prompt",
            "case_id": case.id,
            "prompt": case.prompt,
        });
        stdin.write_all(format!("{prompt}\n").as_bytes()).await?;
        stdin.flush().await?;

        let (stream, mut handle) = AgentStream::channel(STREAM_BUFFER);
        let agent = self.name.clone();

        // stdout → events. Owns the child and kills it when reading stops.
        let events = handle.events;
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                let next = tokio::select! {
                    _ = events.closed() => {
                        debug!(agent = %agent, "session closed the stream");
                        break;
                    }
                    next = lines.next_line() => next,
                };
                let line = match next {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(agent = %agent, error = %e, "failed to read agent stdout");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<AgentEvent>(&line) {
                    Ok(event) => {
                        if events.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(agent = %agent, error = %e, "skipping malformed agent line"),
                }
            }
            if let Err(e) = child.start_kill() {
                debug!(agent = %agent, error = %e, "agent already exited");
            }
            match child.wait().await {
                Ok(status) => debug!(agent = %agent, %status, "agent process reaped"),
                Err(e) => warn!(agent = %agent, error = %e, "failed to reap agent process"),
            }
        });

        // decisions → stdin.
        tokio::spawn(async move {
            while let Some(decision) = handle.decisions.recv().await {
                let line = json!({
                    "type": "approval_decision",
                    "approved": decision.approved,
                    "reason": decision.reason,
                });
                if stdin.write_all(format!("{line}\n").as_bytes()).await.is_err()
                    || stdin.flush().await.is_err()
                {
                    break;
                }
            }
        });

        Ok(stream)
    }
}
