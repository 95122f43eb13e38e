//! In-process agent that plays back a fixed script.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AgentDriver, AgentEvent, AgentHandle, AgentStream, SessionResult, STREAM_BUFFER};
use crate::domain::TestCase;

/// One step of a scripted agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScriptStep {
    /// Emit an event.
    Emit { event: AgentEvent },
    /// Ask for approval and wait. On denial, emit `on_denied` and stop.
    AwaitApproval {
        #[serde(default)]
        tool: Option<String>,
        #[serde(default)]
        summary: String,
        #[serde(default)]
        on_denied: Vec<AgentEvent>,
    },
    /// Sleep before the next step.
    Delay { millis: u64 },
}

/// Replays a script of agent events. Useful for offline tests of the
/// evaluation pipeline and for reproducing recorded sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptedAgent {
    pub name: String,
    pub steps: Vec<ScriptStep>,
}

impl ScriptedAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn emit(mut self, event: AgentEvent) -> Self {
        self.steps.push(ScriptStep::Emit { event });
        self
    }

    pub fn say(self, text: impl Into<String>) -> Self {
        self.emit(AgentEvent::AssistantMessage { text: text.into() })
    }

    pub fn tool(self, tool: impl Into<String>, input: serde_json::Value) -> Self {
        self.emit(AgentEvent::ToolCall {
            tool: tool.into(),
            input,
        })
    }

    pub fn tool_result(self, tool: impl Into<String>, success: bool) -> Self {
        self.emit(AgentEvent::ToolResult {
            tool: tool.into(),
            success,
            output: serde_json::Value::Null,
        })
    }

    pub fn ask(
        mut self,
        tool: Option<&str>,
        summary: impl Into<String>,
        on_denied: Vec<AgentEvent>,
    ) -> Self {
        self.steps.push(ScriptStep::AwaitApproval {
            tool: tool.map(str::to_string),
            summary: summary.into(),
            on_denied,
        });
        self
    }

    pub fn delay(mut self, millis: u64) -> Self {
        self.steps.push(ScriptStep::Delay { millis });
        self
    }

    pub fn done(self) -> Self {
        self.emit(AgentEvent::Done)
    }
}

async fn play(steps: Vec<ScriptStep>, mut handle: AgentHandle) {
    for step in steps {
        match step {
            ScriptStep::Emit { event } => {
                if handle.events.send(event).await.is_err() {
                    return;
                }
            }
            ScriptStep::AwaitApproval {
                tool,
                summary,
                on_denied,
            } => {
                let request = AgentEvent::ApprovalRequest { tool, summary };
                if handle.events.send(request).await.is_err() {
                    return;
                }
                match handle.decisions.recv().await {
                    Some(decision) if decision.approved => {}
                    Some(_) => {
                        for event in on_denied {
                            if handle.events.send(event).await.is_err() {
                                return;
                            }
                        }
                        return;
                    }
                    None => return,
                }
            }
            ScriptStep::Delay { millis } => {
                tokio::time::sleep(Duration::from_millis(millis)).await;
            }
        }
    }
    debug!("script exhausted");
}

#[async_trait]
impl AgentDriver for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, _case: &TestCase) -> SessionResult<AgentStream> {
        let (stream, handle) = AgentStream::channel(STREAM_BUFFER);
        tokio::spawn(play(self.steps.clone(), handle));
        Ok(stream)
    }
}
