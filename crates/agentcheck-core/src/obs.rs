//! Structured observability hooks for session and evaluation lifecycle events.
//!
//! Events are emitted at `info!` level unless noted (filter with `RUST_LOG`).
//! For JSON output, pass `--json` to the CLI.

use tracing::{debug, info, warn, Span};

use crate::session::SessionStatus;

/// Span tagging all work for one session.
pub fn session_span(session_id: &str, case_id: &str) -> Span {
    tracing::info_span!("agentcheck.session", session_id = %session_id, case_id = %case_id)
}

pub fn emit_session_started(session_id: &str, case_id: &str, agent: &str) {
    info!(event = "session.started", session_id = %session_id, case_id = %case_id, agent = %agent);
}

/// Debug level: one line per timeline event.
pub fn emit_event_recorded(session_id: &str, kind: &str, seq: u64) {
    debug!(
        event = "session.event_recorded",
        session_id = %session_id,
        kind = %kind,
        seq = seq,
    );
}

pub fn emit_session_finished(
    session_id: &str,
    duration_ms: u64,
    total_events: u64,
    status: SessionStatus,
) {
    info!(
        event = "session.finished",
        session_id = %session_id,
        duration_ms = duration_ms,
        total_events = total_events,
        status = ?status,
    );
}

pub fn emit_case_evaluated(case_id: &str, score: f32, passed: bool, violations: usize) {
    info!(
        event = "case.evaluated",
        case_id = %case_id,
        score = score,
        passed = passed,
        violations = violations,
    );
}

/// Warning level: an unexpected error-severity violation needs a human.
pub fn emit_case_escalated(case_id: &str, rules: &[&str]) {
    warn!(event = "case.escalated", case_id = %case_id, rules = ?rules);
}

pub fn emit_gate_evaluated(pass_rate: f32, mean_score: f32, passed: bool) {
    info!(
        event = "gate.evaluated",
        pass_rate = pass_rate,
        mean_score = mean_score,
        passed = passed,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_span_can_be_entered() {
        let span = session_span("s-1", "c-1");
        let _guard = span.enter();
        emit_event_recorded("s-1", "tool_call", 3);
    }
}
