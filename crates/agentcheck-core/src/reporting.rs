//! Persisted suite results: JSON artifact with digest, timelines, markdown.
//!
//! Layout under the artifacts directory:
//!
//! ```text
//! <dir>/<run_id>/results.json
//! <dir>/<run_id>/results.digest
//! <dir>/<run_id>/summary.md
//! <dir>/<run_id>/timelines/<case_id>.json
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::{EvalError, Result, Violation};
use crate::expectations::ExpectationMismatch;
use crate::gate::GateVerdict;
use crate::runner::{CaseOutcome, CaseStatus, SuiteRun};
use crate::session::Session;

pub const SCHEMA_VERSION: &str = "1.0";

const RESULTS_FILE: &str = "results.json";
const DIGEST_FILE: &str = "results.digest";

/// Suite totals section of `results.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuiteSummaryArtifact {
    pub total_cases: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: usize,
    pub escalations: usize,
    pub pass_rate: f32,
    pub mean_score: f32,
    pub overall_pass: bool,
}

/// One case in `results.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseResultArtifact {
    pub case_id: String,
    pub name: String,
    pub category: String,
    pub status: CaseStatus,
    pub score: f32,
    pub escalate: bool,
    pub evaluator_scores: BTreeMap<String, f32>,
    pub violations: Vec<Violation>,
    pub expectation_mismatches: Vec<ExpectationMismatch>,
    pub error: Option<String>,
}

impl CaseResultArtifact {
    pub fn from_outcome(outcome: &CaseOutcome) -> Self {
        let verdict = outcome.verdict.as_ref();
        Self {
            case_id: outcome.case_id.clone(),
            name: outcome.name.clone(),
            category: outcome.category.clone(),
            status: outcome.status,
            score: outcome.score(),
            escalate: verdict.is_some_and(|v| v.escalate),
            evaluator_scores: verdict
                .map(|v| {
                    v.evaluator_results
                        .iter()
                        .map(|r| (r.evaluator.clone(), r.score))
                        .collect()
                })
                .unwrap_or_default(),
            violations: verdict
                .map(|v| {
                    v.evaluator_results
                        .iter()
                        .flat_map(|r| r.violations.iter().cloned())
                        .collect()
                })
                .unwrap_or_default(),
            expectation_mismatches: verdict
                .map(|v| v.expectation_mismatches.clone())
                .unwrap_or_default(),
            error: outcome.error.clone(),
        }
    }
}

/// Canonical suite results artifact written for CI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuiteResultsArtifact {
    pub schema_version: String,
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub agent: String,
    pub summary: SuiteSummaryArtifact,
    pub cases: Vec<CaseResultArtifact>,
    pub gate: GateVerdict,
}

impl SuiteResultsArtifact {
    pub fn from_run(run: &SuiteRun, agent: &str, gate: &GateVerdict) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            run_id: run.run_id,
            generated_at: run.finished_at,
            agent: agent.to_string(),
            summary: SuiteSummaryArtifact {
                total_cases: run.outcomes.len(),
                passed: run.count(CaseStatus::Passed),
                failed: run.count(CaseStatus::Failed),
                errored: run.count(CaseStatus::Errored),
                skipped: run.count(CaseStatus::Skipped),
                escalations: run.report.escalations(),
                pass_rate: run.report.pass_rate,
                mean_score: run.report.mean_score,
                overall_pass: gate.passed(),
            },
            cases: run.outcomes.iter().map(CaseResultArtifact::from_outcome).collect(),
            gate: gate.clone(),
        }
    }
}

/// Hex SHA-256 of `bytes`.
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Directory holding one run's artifacts.
pub fn run_dir(dir: &Path, run_id: Uuid) -> PathBuf {
    dir.join(run_id.to_string())
}

/// Persist `<dir>/<run_id>/results.json` and `<dir>/<run_id>/results.digest`.
pub fn write_suite_artifact(dir: &Path, artifact: &SuiteResultsArtifact) -> Result<PathBuf> {
    let run_dir = run_dir(dir, artifact.run_id);
    std::fs::create_dir_all(&run_dir)?;

    let path = run_dir.join(RESULTS_FILE);
    let json = serde_json::to_vec_pretty(artifact)?;
    std::fs::write(&path, &json)?;
    std::fs::write(run_dir.join(DIGEST_FILE), content_digest(&json).as_bytes())?;
    Ok(path)
}

/// Read `<dir>/<run_id>/results.json`, verifying it against its digest.
pub fn read_suite_artifact(dir: &Path, run_id: Uuid) -> Result<SuiteResultsArtifact> {
    let run_dir = run_dir(dir, run_id);
    let json = std::fs::read(run_dir.join(RESULTS_FILE))?;
    let expected = std::fs::read_to_string(run_dir.join(DIGEST_FILE))?;
    let actual = content_digest(&json);
    if expected.trim() != actual {
        return Err(EvalError::DigestMismatch {
            expected: expected.trim().to_string(),
            actual,
        });
    }
    Ok(serde_json::from_slice(&json)?)
}

/// File-name-safe form of a case id: the sanitized id plus a short digest
/// of the raw id, so ids that sanitize alike still get distinct files.
fn file_stem(case_id: &str) -> String {
    let safe: String = case_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let digest = content_digest(case_id.as_bytes());
    format!("{safe}-{}", &digest[..12])
}

/// Write `<run_dir>/timelines/<stem>.json`, where the stem is derived from
/// the case id.
pub fn write_timeline(run_dir: &Path, session: &Session) -> anyhow::Result<PathBuf> {
    let dir = run_dir.join("timelines");
    std::fs::create_dir_all(&dir).with_context(|| format!("create {:?}", dir))?;
    let path = dir.join(format!("{}.json", file_stem(&session.case_id)));
    let content =
        serde_json::to_string_pretty(&session.timeline).context("serialize timeline")?;
    std::fs::write(&path, content).with_context(|| format!("write {:?}", path))?;
    Ok(path)
}

/// Render the markdown summary for CI logs and PR comments.
pub fn render_summary_md(artifact: &SuiteResultsArtifact) -> String {
    let s = &artifact.summary;
    let mut out = String::new();
    out.push_str("# agentcheck results\n\n");
    let gate = if s.overall_pass { "PASS" } else { "FAIL" };
    out.push_str(&format!("- agent: `{}`\n- gate: **{gate}**\n", artifact.agent));
    out.push_str(&format!(
        "- cases: {} (passed {}, failed {}, errored {}, skipped {})\n",
        s.total_cases, s.passed, s.failed, s.errored, s.skipped,
    ));
    out.push_str(&format!(
        "- pass rate: {:.1}%\n- mean score: {:.3}\n- escalations: {}\n\n",
        s.pass_rate * 100.0,
        s.mean_score,
        s.escalations,
    ));

    if !artifact.gate.violations.is_empty() {
        out.push_str("## Gate Violations\n");
        for v in &artifact.gate.violations {
            out.push_str(&format!("- {}\n", v.reason));
        }
        out.push('\n');
    }

    out.push_str("## Cases\n\n| case | status | score | violations |\n|---|---|---|---|\n");
    for case in &artifact.cases {
        let status = match case.status {
            CaseStatus::Passed => "passed",
            CaseStatus::Failed => "failed",
            CaseStatus::Errored => "errored",
            CaseStatus::Skipped => "skipped",
        };
        out.push_str(&format!(
            "| `{}` | {}{} | {:.2} | {} |\n",
            case.case_id,
            status,
            if case.escalate { " (escalate)" } else { "" },
            case.score,
            case.violations.len(),
        ));
    }

    let failing: Vec<&CaseResultArtifact> = artifact
        .cases
        .iter()
        .filter(|c| !c.violations.is_empty() || c.error.is_some())
        .collect();
    if !failing.is_empty() {
        out.push_str("\n## Details\n");
        for case in failing {
            out.push_str(&format!("\n### {}\n", case.case_id));
            if let Some(err) = &case.error {
                out.push_str(&format!("- error: {err}\n"));
            }
            for v in &case.violations {
                let at = v.event_seq.map(|s| format!(" @{s}")).unwrap_or_default();
                out.push_str(&format!("- [{}] `{}`{}: {}\n", v.severity, v.rule, at, v.message));
            }
            for m in &case.expectation_mismatches {
                out.push_str(&format!("- expectation `{}`: {}\n", m.rule, m.detail));
            }
        }
    }
    out
}

/// Write `summary.md`.
pub fn write_summary_md(path: &Path, artifact: &SuiteResultsArtifact) -> anyhow::Result<()> {
    let md = render_summary_md(artifact);
    std::fs::write(path, md).with_context(|| format!("write {:?}", path))?;
    Ok(())
}
