//! Session completion, timeout, and emptiness.

use super::{EvalContext, Evaluator};
use crate::domain::{EvaluationResult, EventKind, Violation};

/// Reason recorded in `session_failed` when the harness times out a session.
pub const TIMEOUT_REASON: &str = "timeout";

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionHealthEvaluator;

impl Evaluator for SessionHealthEvaluator {
    fn name(&self) -> &str {
        "session-health"
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> EvaluationResult {
        let timeline = ctx.timeline;
        let mut violations = Vec::new();
        let mut timed_out = false;

        match timeline.terminal().map(|e| (e.seq, &e.kind)) {
            Some((_, EventKind::SessionCompleted)) => {}
            Some((seq, EventKind::SessionFailed { reason })) if reason == TIMEOUT_REASON => {
                timed_out = true;
                violations.push(
                    Violation::error(
                        "session-timeout",
                        format!("session timed out after {}s", ctx.case.timeout),
                    )
                    .at(seq),
                );
            }
            Some((seq, EventKind::SessionFailed { reason })) => {
                violations.push(
                    Violation::error("session-incomplete", format!("session failed: {reason}"))
                        .at(seq),
                );
            }
            _ => {
                violations.push(Violation::error(
                    "session-incomplete",
                    "session has no terminal event",
                ));
            }
        }

        // A recorded timeout already covers the duration overrun.
        let limit_ms = (ctx.case.timeout as i64).saturating_mul(1000);
        let elapsed_ms = timeline.duration().num_milliseconds();
        if !timed_out && elapsed_ms > limit_ms {
            violations.push(Violation::error(
                "session-timeout",
                format!(
                    "session ran {elapsed_ms}ms, over the {}s timeout",
                    ctx.case.timeout
                ),
            ));
        }

        let acted = timeline.events().iter().any(|e| {
            matches!(
                e.kind,
                EventKind::AssistantMessage | EventKind::ToolCall { .. }
            )
        });
        if !acted {
            violations.push(Violation::error(
                "empty-session",
                "agent produced no messages or tool calls",
            ));
        }

        let score = if violations.is_empty() { 1.0 } else { 0.0 };
        EvaluationResult::from_violations(self.name(), violations).with_score(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TestCase, TimelineRecorder, ToolPolicy};
    use crate::evaluator::test_support::*;
    use chrono::{DateTime, Utc};
    use serde_json::json;
    use uuid::Uuid;

    fn run(case: &TestCase, tl: &crate::domain::Timeline) -> EvaluationResult {
        let policy = ToolPolicy::default();
        SessionHealthEvaluator.evaluate(&EvalContext::new(case, tl, &policy))
    }

    #[test]
    fn test_completed_session_is_healthy() {
        let tl = timeline(vec![
            bare(EventKind::SessionStarted),
            bare(EventKind::AssistantMessage),
            bare(EventKind::SessionCompleted),
        ]);
        let res = run(&TestCase::new("c", "x"), &tl);
        assert!(res.passed);
        assert_eq!(res.score, 1.0);
    }

    #[test]
    fn test_timeout_reason_maps_to_timeout_rule() {
        let tl = timeline(vec![
            bare(EventKind::SessionStarted),
            call("read"),
            bare(EventKind::SessionFailed {
                reason: TIMEOUT_REASON.into(),
            }),
        ]);
        let res = run(&TestCase::new("c", "x"), &tl);
        assert!(res.has_rule("session-timeout"));
        assert!(!res.has_rule("session-incomplete"));
    }

    #[test]
    fn test_missing_terminal_and_empty() {
        let tl = timeline(vec![bare(EventKind::SessionStarted)]);
        let res = run(&TestCase::new("c", "x"), &tl);
        assert!(res.has_rule("session-incomplete"));
        assert!(res.has_rule("empty-session"));
        assert_eq!(res.score, 0.0);
    }

    #[test]
    fn test_recorded_duration_over_timeout() {
        let start: DateTime<Utc> = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let mut rec = TimelineRecorder::new(Uuid::new_v4());
        rec.append_at(EventKind::SessionStarted, json!({}), start)
            .unwrap();
        rec.append_at(
            EventKind::AssistantMessage,
            json!({}),
            start + chrono::Duration::seconds(5),
        )
        .unwrap();
        rec.append_at(
            EventKind::SessionCompleted,
            json!({}),
            start + chrono::Duration::seconds(10),
        )
        .unwrap();
        let tl = rec.finish();

        let res = run(&TestCase::new("c", "x").with_timeout(3), &tl);
        assert!(res.has_rule("session-timeout"));
    }

    #[test]
    fn test_recorded_timeout_reports_once() {
        let start: DateTime<Utc> = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let mut rec = TimelineRecorder::new(Uuid::new_v4());
        rec.append_at(EventKind::SessionStarted, json!({}), start)
            .unwrap();
        rec.append_at(
            EventKind::AssistantMessage,
            json!({}),
            start + chrono::Duration::seconds(1),
        )
        .unwrap();
        rec.append_at(
            EventKind::SessionFailed {
                reason: TIMEOUT_REASON.into(),
            },
            json!({}),
            start + chrono::Duration::seconds(8),
        )
        .unwrap();
        let tl = rec.finish();

        let res = run(&TestCase::new("c", "x").with_timeout(3), &tl);
        let timeouts = res
            .violations
            .iter()
            .filter(|v| v.rule == "session-timeout")
            .count();
        assert_eq!(timeouts, 1);
        assert!(!res.passed);
    }
}
