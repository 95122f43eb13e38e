//! Suite execution: filter cases, run sessions concurrently, evaluate each.
//!
//! A bounded number of sessions run at once. Outcomes are returned in input
//! order regardless of completion order. A session error marks that case
//! `errored` and never aborts the suite. With fail-fast, cases that have not
//! started when a case fails are recorded as `skipped`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::EvalConfig;
use crate::domain::{EvalError, Result, TestCase};
use crate::evaluator::EvaluatorRegistry;
use crate::gate::{evaluate_gate, CaseSummary, GateRuleSet, GateVerdict, SuiteReport};
use crate::loader::ensure_unique_ids;
use crate::pipeline::evaluate_timeline;
use crate::scoring::CaseVerdict;
use crate::session::{AgentDriver, Session, SessionRunner};

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// Selects cases by id glob and required tags.
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    pattern: Option<Regex>,
    tags: Vec<String>,
}

/// Translate a `*`/`?` glob into an anchored regex.
fn glob_to_regex(glob: &str) -> Result<Regex> {
    let mut re = String::from("^");
    for c in glob.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| EvalError::Config(format!("invalid case pattern '{glob}': {e}")))
}

impl CaseFilter {
    pub fn new(pattern: Option<&str>, tags: Vec<String>) -> Result<Self> {
        Ok(Self {
            pattern: pattern.map(glob_to_regex).transpose()?,
            tags,
        })
    }

    /// Matches `id` or `category/id` against the pattern; all tags required.
    pub fn matches(&self, case: &TestCase) -> bool {
        let pattern_ok = match &self.pattern {
            Some(re) => re.is_match(&case.id) || re.is_match(&case.qualified_id()),
            None => true,
        };
        pattern_ok && case.matches_tags(&self.tags)
    }

    pub fn apply(&self, cases: Vec<TestCase>) -> Vec<TestCase> {
        cases.into_iter().filter(|c| self.matches(c)).collect()
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    Failed,
    /// The session could not be run.
    Errored,
    /// Not started because fail-fast tripped.
    Skipped,
}

/// Result of one case in a suite run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub case_id: String,
    pub name: String,
    pub category: String,
    pub tags: Vec<String>,
    pub status: CaseStatus,
    pub verdict: Option<CaseVerdict>,
    /// Omitted from serialized results; timelines are written separately.
    #[serde(skip)]
    pub session: Option<Session>,
    pub error: Option<String>,
}

impl CaseOutcome {
    fn base(case: &TestCase, status: CaseStatus) -> Self {
        Self {
            case_id: case.id.clone(),
            name: case.name.clone(),
            category: case.category.clone(),
            tags: case.tags.clone(),
            status,
            verdict: None,
            session: None,
            error: None,
        }
    }

    pub fn evaluated(case: &TestCase, session: Session, verdict: CaseVerdict) -> Self {
        let status = if verdict.passed {
            CaseStatus::Passed
        } else {
            CaseStatus::Failed
        };
        Self {
            verdict: Some(verdict),
            session: Some(session),
            ..Self::base(case, status)
        }
    }

    pub fn errored(case: &TestCase, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::base(case, CaseStatus::Errored)
        }
    }

    pub fn skipped(case: &TestCase) -> Self {
        Self::base(case, CaseStatus::Skipped)
    }

    pub fn score(&self) -> f32 {
        self.verdict.as_ref().map_or(0.0, |v| v.score)
    }

    /// Gate input for this case. Errored cases count as failed with score
    /// 0; skipped cases are excluded.
    pub fn summary(&self) -> Option<CaseSummary> {
        match (&self.status, &self.verdict) {
            (CaseStatus::Skipped, _) => None,
            (_, Some(verdict)) => Some(CaseSummary::from_verdict(
                verdict,
                &self.category,
                &self.tags,
            )),
            (_, None) => Some(CaseSummary {
                case_id: self.case_id.clone(),
                category: self.category.clone(),
                score: 0.0,
                passed: false,
                escalated: false,
                tags: self.tags.clone(),
            }),
        }
    }
}

/// Everything produced by one suite run.
#[derive(Debug, Clone)]
pub struct SuiteRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<CaseOutcome>,
    pub report: SuiteReport,
}

impl SuiteRun {
    pub fn count(&self, status: CaseStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// Apply suite gate rules to the report.
    pub fn gate(&self, rule_set: &GateRuleSet) -> GateVerdict {
        let verdict = evaluate_gate(rule_set, &self.report);
        crate::obs::emit_gate_evaluated(
            self.report.pass_rate,
            self.report.mean_score,
            verdict.passed(),
        );
        verdict
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Runs a filtered suite against one agent driver.
pub struct SuiteRunner {
    sessions: SessionRunner,
    registry: Arc<EvaluatorRegistry>,
    config: Arc<EvalConfig>,
    fail_fast: bool,
    baseline_pass_rate: Option<f32>,
}

impl SuiteRunner {
    pub fn new(driver: Arc<dyn AgentDriver>, config: EvalConfig) -> Self {
        Self {
            sessions: SessionRunner::new(driver),
            registry: Arc::new(EvaluatorRegistry::standard()),
            config: Arc::new(config),
            fail_fast: false,
            baseline_pass_rate: None,
        }
    }

    pub fn with_registry(mut self, registry: EvaluatorRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Stop starting new cases once one fails or errors.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_baseline_pass_rate(mut self, baseline: Option<f32>) -> Self {
        self.baseline_pass_rate = baseline;
        self
    }

    /// Run every case accepted by `filter`.
    #[instrument(skip_all, fields(agent = %self.sessions.driver_name(), cases = cases.len()))]
    pub async fn run(&self, cases: Vec<TestCase>, filter: &CaseFilter) -> Result<SuiteRun> {
        let cases = filter.apply(cases);
        ensure_unique_ids(&cases)?;
        for case in &cases {
            case.validate()?;
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(event = "suite.started", run_id = %run_id, cases = cases.len());

        let sem = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let (fail_tx, _fail_rx) = watch::channel(false);
        let fail_flag = Arc::new(fail_tx);

        let mut join_set = JoinSet::new();
        for (idx, case) in cases.iter().cloned().enumerate() {
            let sem = Arc::clone(&sem);
            let sessions = self.sessions.clone();
            let registry = Arc::clone(&self.registry);
            let config = Arc::clone(&self.config);
            let fail_flag = Arc::clone(&fail_flag);
            let fail_rx = fail_flag.subscribe();
            let fail_fast = self.fail_fast;

            join_set.spawn(async move {
                let _permit = sem.acquire_owned().await.ok();

                // A sibling tripped fail-fast while this case was queued.
                if *fail_rx.borrow() {
                    return (idx, CaseOutcome::skipped(&case));
                }

                let outcome = match sessions.run(&case).await {
                    Ok(session) => {
                        let verdict = evaluate_timeline(
                            &case,
                            &session.timeline,
                            &registry,
                            &config.tool_policy,
                            &config.scoring,
                        );
                        CaseOutcome::evaluated(&case, session, verdict)
                    }
                    Err(e) => {
                        warn!(case_id = %case.id, error = %e, "session failed to run");
                        CaseOutcome::errored(&case, e.to_string())
                    }
                };

                if fail_fast && outcome.status != CaseStatus::Passed {
                    let _ = fail_flag.send(true);
                }
                (idx, outcome)
            });
        }

        let mut slots: Vec<Option<CaseOutcome>> = vec![None; cases.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, outcome)) => slots[idx] = Some(outcome),
                Err(e) => warn!(error = %e, "case task join error"),
            }
        }

        let outcomes: Vec<CaseOutcome> = cases
            .iter()
            .zip(slots)
            .map(|(case, slot)| {
                slot.unwrap_or_else(|| CaseOutcome::errored(case, "case task did not complete"))
            })
            .collect();

        let summaries = outcomes.iter().filter_map(CaseOutcome::summary).collect();
        let report = SuiteReport::from_cases(summaries, self.baseline_pass_rate);
        let finished_at = Utc::now();

        info!(
            event = "suite.finished",
            run_id = %run_id,
            pass_rate = report.pass_rate,
            mean_score = report.mean_score,
            duration_ms = (finished_at - started_at).num_milliseconds(),
        );

        Ok(SuiteRun {
            run_id,
            started_at,
            finished_at,
            outcomes,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(id: &str, category: &str, tags: &[&str]) -> TestCase {
        let mut c = TestCase::new(id, "x").with_category(category);
        for t in tags {
            c = c.with_tag(*t);
        }
        c
    }

    #[test]
    fn test_glob_matches_id_and_qualified_id() {
        let filter = CaseFilter::new(Some("tier1/*"), Vec::new()).unwrap();
        assert!(filter.matches(&case("approve-write", "tier1", &[])));
        assert!(!filter.matches(&case("approve-write", "tier2", &[])));

        let filter = CaseFilter::new(Some("approve-?rite"), Vec::new()).unwrap();
        assert!(filter.matches(&case("approve-write", "tier2", &[])));
        assert!(!filter.matches(&case("approve-write-twice", "", &[])));
    }

    #[test]
    fn test_glob_escapes_regex_metacharacters() {
        let filter = CaseFilter::new(Some("a.b"), Vec::new()).unwrap();
        assert!(filter.matches(&case("a.b", "", &[])));
        assert!(!filter.matches(&case("axb", "", &[])));
    }

    #[test]
    fn test_tags_must_all_be_present() {
        let filter = CaseFilter::new(None, vec!["smoke".into(), "fs".into()]).unwrap();
        assert!(filter.matches(&case("a", "", &["fs", "smoke", "slow"])));
        assert!(!filter.matches(&case("b", "", &["smoke"])));
    }

    #[test]
    fn test_errored_outcome_counts_as_failed_summary() {
        let c = case("a", "tier1", &["smoke"]);
        let summary = CaseOutcome::errored(&c, "spawn failed").summary().unwrap();
        assert!(!summary.passed);
        assert_eq!(summary.score, 0.0);
        assert!(CaseOutcome::skipped(&c).summary().is_none());
    }
}
