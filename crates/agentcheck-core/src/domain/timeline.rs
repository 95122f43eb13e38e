//! Session timelines: ordered, append-only event logs.
//!
//! A [`TimelineRecorder`] accepts events while a session runs. Calling
//! [`TimelineRecorder::finish`] yields an immutable [`Timeline`] that
//! evaluators read. Events live in a flat arena; an [`EventId`] is a stable
//! index into it and `seq == index + 1`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ValidationError;

/// Classification of a timeline event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    SessionStarted,
    UserMessage,
    AssistantMessage,
    ToolCall {
        tool: String,
    },
    ToolResult {
        tool: String,
        success: bool,
    },
    ApprovalRequested {
        #[serde(default)]
        tool: Option<String>,
    },
    ApprovalGranted,
    ApprovalDenied,
    ContextLoaded {
        source: String,
    },
    SessionCompleted,
    SessionFailed {
        reason: String,
    },
}

impl EventKind {
    /// Whether this event ends a session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::SessionCompleted | Self::SessionFailed { .. })
    }

    /// Snake-case name of the variant, matching the serde tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionStarted => "session_started",
            Self::UserMessage => "user_message",
            Self::AssistantMessage => "assistant_message",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::ApprovalRequested { .. } => "approval_requested",
            Self::ApprovalGranted => "approval_granted",
            Self::ApprovalDenied => "approval_denied",
            Self::ContextLoaded { .. } => "context_loaded",
            Self::SessionCompleted => "session_completed",
            Self::SessionFailed { .. } => "session_failed",
        }
    }
}

/// A single event in a session timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// 1-based position in the timeline.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    /// Event-specific payload (tool input, message text, ...).
    pub payload: serde_json::Value,
}

impl TimelineEvent {
    /// Tool name for `tool_call` and `tool_result` events.
    pub fn tool(&self) -> Option<&str> {
        match &self.kind {
            EventKind::ToolCall { tool } | EventKind::ToolResult { tool, .. } => Some(tool),
            _ => None,
        }
    }
}

/// Stable index of an event inside a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub usize);

impl EventId {
    pub fn seq(self) -> u64 {
        self.0 as u64 + 1
    }
}

/// Mutable, append-only builder for a session timeline.
#[derive(Debug)]
pub struct TimelineRecorder {
    session_id: Uuid,
    events: Vec<TimelineEvent>,
}

impl TimelineRecorder {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            events: Vec::new(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether a terminal event has been recorded.
    pub fn is_terminated(&self) -> bool {
        self.events.last().is_some_and(|e| e.kind.is_terminal())
    }

    /// Append an event stamped with the current time.
    ///
    /// The timestamp never goes backward relative to the previous event.
    pub fn append(
        &mut self,
        kind: EventKind,
        payload: serde_json::Value,
    ) -> Result<EventId, ValidationError> {
        let now = Utc::now();
        let ts = match self.events.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };
        self.append_at(kind, payload, ts)
    }

    /// Append an event with an explicit timestamp.
    pub fn append_at(
        &mut self,
        kind: EventKind,
        payload: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Result<EventId, ValidationError> {
        let seq = self.events.len() as u64 + 1;
        if let Some(last) = self.events.last() {
            if last.kind.is_terminal() {
                return Err(ValidationError::AlreadyTerminated { seq: last.seq });
            }
            if timestamp < last.timestamp {
                return Err(ValidationError::NonMonotonicTimestamp { seq });
            }
        }

        let id = EventId(self.events.len());
        self.events.push(TimelineEvent {
            seq,
            timestamp,
            kind,
            payload,
        });
        Ok(id)
    }

    /// Seal the recorder into an immutable timeline.
    pub fn finish(self) -> Timeline {
        Timeline {
            session_id: self.session_id,
            events: self.events,
        }
    }
}

/// Immutable, ordered record of everything an agent did in one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    session_id: Uuid,
    events: Vec<TimelineEvent>,
}

impl Timeline {
    /// Build a timeline from previously recorded events, checking ordering.
    pub fn from_events(
        session_id: Uuid,
        events: Vec<TimelineEvent>,
    ) -> Result<Self, ValidationError> {
        let timeline = Self { session_id, events };
        timeline.validate()?;
        Ok(timeline)
    }

    /// Check seq contiguity, timestamp monotonicity, and terminal placement.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let last_idx = self.events.len().saturating_sub(1);
        for (idx, event) in self.events.iter().enumerate() {
            let expected = idx as u64 + 1;
            if event.seq != expected {
                return Err(ValidationError::NonContiguousSeq {
                    expected,
                    actual: event.seq,
                });
            }
            if idx > 0 && event.timestamp < self.events[idx - 1].timestamp {
                return Err(ValidationError::NonMonotonicTimestamp { seq: event.seq });
            }
            if event.kind.is_terminal() && idx != last_idx {
                return Err(ValidationError::TerminalNotLast { seq: event.seq });
            }
        }
        Ok(())
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn get(&self, id: EventId) -> Option<&TimelineEvent> {
        self.events.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterate events together with their stable ids.
    pub fn iter_ids(&self) -> impl Iterator<Item = (EventId, &TimelineEvent)> {
        self.events.iter().enumerate().map(|(i, e)| (EventId(i), e))
    }

    /// All `tool_call` events, in order.
    pub fn tool_calls(&self) -> impl Iterator<Item = &TimelineEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, EventKind::ToolCall { .. }))
    }

    /// The terminal event, if the session ended.
    pub fn terminal(&self) -> Option<&TimelineEvent> {
        self.events.last().filter(|e| e.kind.is_terminal())
    }

    /// Wall-clock span between the first and last event.
    pub fn duration(&self) -> Duration {
        match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => Duration::zero(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).expect("valid timestamp")
    }

    #[test]
    fn test_append_assigns_contiguous_seq() {
        let mut rec = TimelineRecorder::new(Uuid::new_v4());
        let a = rec.append(EventKind::SessionStarted, json!({})).unwrap();
        let b = rec.append(EventKind::UserMessage, json!({"text": "hi"})).unwrap();
        assert_eq!(a, EventId(0));
        assert_eq!(b.seq(), 2);

        let timeline = rec.finish();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.get(b).unwrap().seq, 2);
        assert!(timeline.validate().is_ok());
    }

    #[test]
    fn test_append_at_rejects_backward_timestamp() {
        let mut rec = TimelineRecorder::new(Uuid::new_v4());
        rec.append_at(EventKind::SessionStarted, json!({}), ts(10))
            .unwrap();
        let err = rec
            .append_at(EventKind::UserMessage, json!({}), ts(5))
            .unwrap_err();
        assert_eq!(err, ValidationError::NonMonotonicTimestamp { seq: 2 });
        assert_eq!(rec.len(), 1);
    }

    #[test]
    fn test_append_after_terminal_rejected() {
        let mut rec = TimelineRecorder::new(Uuid::new_v4());
        rec.append(EventKind::SessionStarted, json!({})).unwrap();
        rec.append(EventKind::SessionCompleted, json!({})).unwrap();
        assert!(rec.is_terminated());
        let err = rec
            .append(EventKind::AssistantMessage, json!({}))
            .unwrap_err();
        assert_eq!(err, ValidationError::AlreadyTerminated { seq: 2 });
    }

    #[test]
    fn test_from_events_rejects_gap_in_seq() {
        let events = vec![
            TimelineEvent {
                seq: 1,
                timestamp: ts(0),
                kind: EventKind::SessionStarted,
                payload: json!({}),
            },
            TimelineEvent {
                seq: 3,
                timestamp: ts(1),
                kind: EventKind::UserMessage,
                payload: json!({}),
            },
        ];
        let err = Timeline::from_events(Uuid::new_v4(), events).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NonContiguousSeq {
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn test_from_events_rejects_backward_timestamp() {
        let event = |seq: u64, secs: i64, kind: EventKind| TimelineEvent {
            seq,
            timestamp: ts(secs),
            kind,
            payload: json!({}),
        };
        let events = vec![
            event(1, 0, EventKind::SessionStarted),
            event(2, 30, EventKind::UserMessage),
            event(3, 20, EventKind::AssistantMessage),
            event(4, 40, EventKind::SessionCompleted),
        ];
        assert_eq!(
            Timeline::from_events(Uuid::new_v4(), events).unwrap_err(),
            ValidationError::NonMonotonicTimestamp { seq: 3 }
        );

        // Equal timestamps are allowed.
        let events = vec![
            event(1, 5, EventKind::SessionStarted),
            event(2, 5, EventKind::SessionCompleted),
        ];
        assert!(Timeline::from_events(Uuid::new_v4(), events).is_ok());
    }

    #[test]
    fn test_from_events_rejects_terminal_in_middle() {
        let events = vec![
            TimelineEvent {
                seq: 1,
                timestamp: ts(0),
                kind: EventKind::SessionCompleted,
                payload: json!({}),
            },
            TimelineEvent {
                seq: 2,
                timestamp: ts(1),
                kind: EventKind::AssistantMessage,
                payload: json!({}),
            },
        ];
        assert!(matches!(
            Timeline::from_events(Uuid::new_v4(), events),
            Err(ValidationError::TerminalNotLast { seq: 1 })
        ));
    }

    #[test]
    fn test_tool_calls_and_terminal() {
        let mut rec = TimelineRecorder::new(Uuid::new_v4());
        rec.append_at(EventKind::SessionStarted, json!({}), ts(0))
            .unwrap();
        rec.append_at(
            EventKind::ToolCall {
                tool: "read".into(),
            },
            json!({"path": "a.rs"}),
            ts(1),
        )
        .unwrap();
        rec.append_at(
            EventKind::ToolResult {
                tool: "read".into(),
                success: true,
            },
            json!({}),
            ts(2),
        )
        .unwrap();
        rec.append_at(EventKind::SessionCompleted, json!({}), ts(4))
            .unwrap();
        let timeline = rec.finish();

        let calls: Vec<_> = timeline.tool_calls().collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool(), Some("read"));
        assert_eq!(
            timeline.terminal().map(|e| e.kind.clone()),
            Some(EventKind::SessionCompleted)
        );
        assert_eq!(timeline.duration(), Duration::seconds(4));
    }

    #[test]
    fn test_event_kind_tag_matches_as_str() {
        let kinds = vec![
            EventKind::SessionStarted,
            EventKind::ToolCall { tool: "x".into() },
            EventKind::ApprovalRequested { tool: None },
            EventKind::ContextLoaded {
                source: "AGENTS.md".into(),
            },
            EventKind::SessionFailed {
                reason: "timeout".into(),
            },
        ];
        for kind in kinds {
            let value = serde_json::to_value(&kind).expect("serialize");
            assert_eq!(value["type"], kind.as_str());
        }
    }

    #[test]
    fn test_timeline_serde_roundtrip() {
        let mut rec = TimelineRecorder::new(Uuid::new_v4());
        rec.append(EventKind::SessionStarted, json!({})).unwrap();
        rec.append(EventKind::ApprovalGranted, json!({})).unwrap();
        let timeline = rec.finish();

        let json = serde_json::to_string(&timeline).expect("serialize");
        let back: Timeline = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(timeline, back);
    }
}
