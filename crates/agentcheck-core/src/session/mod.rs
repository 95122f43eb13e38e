//! Session recording: drive an agent, stream its events into a timeline.
//!
//! An [`AgentDriver`] starts the agent for a test case and hands back an
//! [`AgentStream`]: a channel of [`AgentEvent`]s plus a channel for
//! [`ApprovalDecision`]s going back. The [`EventStreamHandler`] records every
//! event, answers approval requests with the case's strategy, and stops at
//! `done`, `error`, or when the stream closes. [`SessionRunner`] wraps that in
//! the case timeout and produces one [`Session`] with exactly one timeline.

mod approval;
mod error;
mod process;
mod scripted;

pub use approval::{ApprovalDecision, ApprovalResponder};
pub use error::{SessionError, SessionResult};
pub use process::ProcessAgent;
pub use scripted::{ScriptStep, ScriptedAgent};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{warn, Instrument};
use uuid::Uuid;

use crate::domain::{EventKind, TestCase, Timeline, TimelineRecorder};
use crate::evaluator::TIMEOUT_REASON;
use crate::metrics::METRICS;

/// Channel capacity used by the built-in drivers.
pub const STREAM_BUFFER: usize = 64;

/// An event emitted by a running agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    AssistantMessage {
        text: String,
    },
    ToolCall {
        tool: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    ToolResult {
        tool: String,
        success: bool,
        #[serde(default)]
        output: serde_json::Value,
    },
    ApprovalRequest {
        #[serde(default)]
        tool: Option<String>,
        #[serde(default)]
        summary: String,
    },
    ContextLoaded {
        source: String,
    },
    Done,
    Error {
        message: String,
    },
}

/// Harness side of a running agent.
#[derive(Debug)]
pub struct AgentStream {
    pub events: mpsc::Receiver<AgentEvent>,
    pub decisions: mpsc::Sender<ApprovalDecision>,
}

/// Agent side of a running agent.
#[derive(Debug)]
pub struct AgentHandle {
    pub events: mpsc::Sender<AgentEvent>,
    pub decisions: mpsc::Receiver<ApprovalDecision>,
}

impl AgentStream {
    /// Create a connected stream/handle pair.
    pub fn channel(buffer: usize) -> (AgentStream, AgentHandle) {
        let (event_tx, event_rx) = mpsc::channel(buffer);
        let (decision_tx, decision_rx) = mpsc::channel(buffer);
        (
            AgentStream {
                events: event_rx,
                decisions: decision_tx,
            },
            AgentHandle {
                events: event_tx,
                decisions: decision_rx,
            },
        )
    }
}

/// Starts an agent for a test case.
#[async_trait]
pub trait AgentDriver: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&self, case: &TestCase) -> SessionResult<AgentStream>;
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Completed,
    Failed,
    TimedOut,
}

/// One agent invocation for one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub case_id: String,
    pub agent: String,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub timeline: Timeline,
}

/// What the handler wants done after one agent event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamStep {
    Continue,
    Reply(ApprovalDecision),
    Finished(SessionStatus),
}

/// Records agent events into a timeline and answers approval requests.
#[derive(Debug)]
pub struct EventStreamHandler {
    recorder: TimelineRecorder,
    responder: ApprovalResponder,
}

impl EventStreamHandler {
    /// Open a timeline with `session_started` and the prompt as the first
    /// `user_message`.
    pub fn start(session_id: Uuid, case: &TestCase, agent: &str) -> SessionResult<Self> {
        let mut handler = Self {
            recorder: TimelineRecorder::new(session_id),
            responder: ApprovalResponder::new(case.approval_strategy.clone()),
        };
        handler.record(
            EventKind::SessionStarted,
            json!({ "case_id": case.id, "agent": agent }),
        )?;
        handler.record(EventKind::UserMessage, json!({ "text": case.prompt }))?;
        Ok(handler)
    }

    fn record(&mut self, kind: EventKind, payload: serde_json::Value) -> SessionResult<()> {
        let name = kind.as_str();
        let id = self.recorder.append(kind, payload)?;
        METRICS.inc_events_recorded();
        crate::obs::emit_event_recorded(&self.recorder.session_id().to_string(), name, id.seq());
        Ok(())
    }

    /// Record one agent event.
    pub fn handle(&mut self, event: AgentEvent) -> SessionResult<StreamStep> {
        let step = match event {
            AgentEvent::AssistantMessage { text } => {
                self.record(EventKind::AssistantMessage, json!({ "text": text }))?;
                StreamStep::Continue
            }
            AgentEvent::ToolCall { tool, input } => {
                self.record(EventKind::ToolCall { tool }, input)?;
                StreamStep::Continue
            }
            AgentEvent::ToolResult {
                tool,
                success,
                output,
            } => {
                self.record(EventKind::ToolResult { tool, success }, output)?;
                StreamStep::Continue
            }
            AgentEvent::ApprovalRequest { tool, summary } => {
                let decision = self.responder.decide(tool.as_deref());
                self.record(
                    EventKind::ApprovalRequested { tool },
                    json!({ "summary": summary }),
                )?;
                let kind = if decision.approved {
                    EventKind::ApprovalGranted
                } else {
                    EventKind::ApprovalDenied
                };
                self.record(kind, json!({ "reason": decision.reason }))?;
                StreamStep::Reply(decision)
            }
            AgentEvent::ContextLoaded { source } => {
                self.record(EventKind::ContextLoaded { source }, json!({}))?;
                StreamStep::Continue
            }
            AgentEvent::Done => {
                self.record(EventKind::SessionCompleted, json!({}))?;
                StreamStep::Finished(SessionStatus::Completed)
            }
            AgentEvent::Error { message } => {
                self.record(EventKind::SessionFailed { reason: message }, json!({}))?;
                StreamStep::Finished(SessionStatus::Failed)
            }
        };
        Ok(step)
    }

    /// Consume the stream until the agent finishes or the stream closes.
    pub async fn drive(&mut self, stream: &mut AgentStream) -> SessionResult<SessionStatus> {
        while let Some(event) = stream.events.recv().await {
            match self.handle(event)? {
                StreamStep::Continue => {}
                StreamStep::Reply(decision) => {
                    if stream.decisions.send(decision).await.is_err() {
                        warn!("agent dropped its decision channel");
                    }
                }
                StreamStep::Finished(status) => return Ok(status),
            }
        }
        self.fail("stream closed")?;
        Ok(SessionStatus::Failed)
    }

    /// Terminate the timeline with `session_failed` unless already ended.
    pub fn fail(&mut self, reason: &str) -> SessionResult<()> {
        if !self.recorder.is_terminated() {
            self.record(
                EventKind::SessionFailed {
                    reason: reason.to_string(),
                },
                json!({}),
            )?;
        }
        Ok(())
    }

    pub fn finish(self) -> Timeline {
        self.recorder.finish()
    }
}

/// Runs one session per test case with the case timeout applied.
#[derive(Clone)]
pub struct SessionRunner {
    driver: Arc<dyn AgentDriver>,
}

impl SessionRunner {
    pub fn new(driver: Arc<dyn AgentDriver>) -> Self {
        Self { driver }
    }

    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }

    /// Run `case` to completion, failure, or timeout.
    pub async fn run(&self, case: &TestCase) -> SessionResult<Session> {
        let session_id = Uuid::new_v4();
        let span = crate::obs::session_span(&session_id.to_string(), &case.id);
        self.run_session(session_id, case).instrument(span).await
    }

    async fn run_session(&self, session_id: Uuid, case: &TestCase) -> SessionResult<Session> {
        let agent = case
            .agent
            .clone()
            .unwrap_or_else(|| self.driver.name().to_string());
        let started_at = Utc::now();

        crate::obs::emit_session_started(&session_id.to_string(), &case.id, &agent);
        METRICS.inc_sessions();

        let mut handler = EventStreamHandler::start(session_id, case, &agent)?;
        let mut stream = self.driver.start(case).await?;

        let outcome =
            tokio::time::timeout(case.timeout_duration(), handler.drive(&mut stream)).await;
        let status = match outcome {
            Ok(status) => status?,
            Err(_) => {
                handler.fail(TIMEOUT_REASON)?;
                SessionStatus::TimedOut
            }
        };
        // Closing our ends lets the driver's tasks wind down.
        drop(stream);

        let timeline = handler.finish();
        let finished_at = Utc::now();
        crate::obs::emit_session_finished(
            &session_id.to_string(),
            (finished_at - started_at).num_milliseconds().max(0) as u64,
            timeline.len() as u64,
            status,
        );

        Ok(Session {
            session_id,
            case_id: case.id.clone(),
            agent,
            status,
            started_at,
            finished_at,
            timeline,
        })
    }
}
