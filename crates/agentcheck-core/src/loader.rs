//! Loading test cases and recorded timelines from disk.
//!
//! Case files are `.json` (one object or an array) or `.toml` (one case, or a
//! `[[cases]]` array). Every loaded case is validated.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::domain::{EvalError, Result, TestCase, Timeline};

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonCases {
    Many(Vec<TestCase>),
    One(Box<TestCase>),
}

#[derive(Deserialize)]
struct TomlCases {
    cases: Vec<TestCase>,
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn is_case_file(path: &Path) -> bool {
    matches!(extension(path).as_deref(), Some("json") | Some("toml"))
}

/// Parse and validate every case in one file.
pub fn load_case_file(path: &Path) -> Result<Vec<TestCase>> {
    let raw = std::fs::read_to_string(path)?;
    let cases = match extension(path).as_deref() {
        Some("json") => match serde_json::from_str::<JsonCases>(&raw)? {
            JsonCases::Many(cases) => cases,
            JsonCases::One(case) => vec![*case],
        },
        Some("toml") => {
            let table: toml::Table = toml::from_str(&raw)?;
            if table.contains_key("cases") {
                toml::from_str::<TomlCases>(&raw)?.cases
            } else {
                vec![toml::from_str::<TestCase>(&raw)?]
            }
        }
        _ => return Err(EvalError::UnsupportedFormat(path.display().to_string())),
    };
    for case in &cases {
        case.validate()?;
    }
    debug!(path = %path.display(), cases = cases.len(), "loaded case file");
    Ok(cases)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = std::fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    for path in entries {
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if hidden {
            continue;
        }
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if is_case_file(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// Load all case files under `dir`, recursively, in sorted path order.
///
/// Hidden entries are skipped. Case ids must be unique across the tree.
pub fn discover_cases(dir: &Path) -> Result<Vec<TestCase>> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;

    let mut cases = Vec::new();
    for file in &files {
        cases.extend(load_case_file(file)?);
    }
    ensure_unique_ids(&cases)?;
    debug!(dir = %dir.display(), files = files.len(), cases = cases.len(), "discovered cases");
    Ok(cases)
}

/// Reject the first repeated case id.
pub fn ensure_unique_ids(cases: &[TestCase]) -> Result<()> {
    let mut seen = HashSet::new();
    for case in cases {
        if !seen.insert(case.id.as_str()) {
            return Err(EvalError::DuplicateCaseId(case.id.clone()));
        }
    }
    Ok(())
}

/// Read a recorded timeline and check its ordering invariants.
pub fn load_timeline(path: &Path) -> Result<Timeline> {
    let raw = std::fs::read_to_string(path)?;
    let timeline: Timeline = serde_json::from_str(&raw)?;
    timeline.validate().map_err(EvalError::InvalidTimeline)?;
    Ok(timeline)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_json_object_and_array() {
        let dir = tempfile::tempdir().unwrap();
        let one = write(
            dir.path(),
            "one.json",
            r#"{"id":"a","prompt":"do it","behavior":{"mustUseTools":["write"]}}"#,
        );
        let many = write(
            dir.path(),
            "many.json",
            r#"[{"id":"b","prompt":"x"},{"id":"c","prompt":"y","timeout":10}]"#,
        );

        let cases = load_case_file(&one).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].behavior.must_use_tools, vec!["write"]);

        let cases = load_case_file(&many).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[1].timeout, 10);
    }

    #[test]
    fn test_toml_single_and_array() {
        let dir = tempfile::tempdir().unwrap();
        let single = write(
            dir.path(),
            "single.toml",
            r#"
            id = "approve-write"
            prompt = "create hello.txt"
            category = "tier1"

            [behavior]
            requiresApproval = true
            "#,
        );
        let array = write(
            dir.path(),
            "array.toml",
            r#"
            [[cases]]
            id = "a"
            prompt = "x"

            [[cases]]
            id = "b"
            prompt = "y"
            tags = ["smoke"]
            "#,
        );

        let cases = load_case_file(&single).unwrap();
        assert!(cases[0].behavior.requires_approval);
        assert_eq!(cases[0].qualified_id(), "tier1/approve-write");

        let cases = load_case_file(&array).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[1].tags, vec!["smoke"]);
    }

    #[test]
    fn test_invalid_case_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "bad.json", r#"{"id":"a","prompt":"  "}"#);
        assert!(matches!(
            load_case_file(&path),
            Err(EvalError::InvalidTestCase { .. })
        ));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "case.yaml", "id: a");
        assert!(matches!(
            load_case_file(&path),
            Err(EvalError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_discover_walks_sorted_and_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b/second.json", r#"{"id":"second","prompt":"x"}"#);
        write(dir.path(), "a/first.toml", "id = \"first\"\nprompt = \"x\"\n");
        write(dir.path(), ".cache/skip.json", r#"{"id":"skip","prompt":"x"}"#);
        write(dir.path(), "README.md", "not a case");

        let cases = discover_cases(dir.path()).unwrap();
        let ids: Vec<_> = cases.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.json", r#"{"id":"dup","prompt":"x"}"#);
        write(dir.path(), "b.json", r#"{"id":"dup","prompt":"y"}"#);
        let err = discover_cases(dir.path()).unwrap_err();
        assert!(matches!(err, EvalError::DuplicateCaseId(id) if id == "dup"));
    }

    #[test]
    fn test_timeline_round_trip_through_file() {
        use crate::domain::{EventKind, TimelineRecorder};
        use serde_json::json;

        let mut rec = TimelineRecorder::new(uuid::Uuid::new_v4());
        rec.append(EventKind::SessionStarted, json!({})).unwrap();
        rec.append(EventKind::SessionCompleted, json!({})).unwrap();
        let timeline = rec.finish();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timeline.json");
        std::fs::write(&path, serde_json::to_string(&timeline).unwrap()).unwrap();
        assert_eq!(load_timeline(&path).unwrap(), timeline);
    }

    #[test]
    fn test_out_of_order_timeline_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let body = serde_json::json!({
            "session_id": "00000000-0000-0000-0000-000000000000",
            "events": [{
                "seq": 2,
                "timestamp": "2026-01-01T00:00:00Z",
                "kind": {"type": "session_started"},
                "payload": {}
            }]
        });
        let path = write(dir.path(), "tl.json", &body.to_string());
        assert!(matches!(
            load_timeline(&path),
            Err(EvalError::InvalidTimeline(_))
        ));
    }
}
