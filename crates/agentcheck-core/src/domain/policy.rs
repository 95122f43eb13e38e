//! Tool classification used by evaluators.

use serde::{Deserialize, Serialize};

use super::timeline::{EventKind, TimelineEvent};

/// Payload keys that may carry a file path for read-style tools.
const PATH_KEYS: [&str; 3] = ["path", "file_path", "filePath"];

/// Classifies tool names as effectful (needs approval) or read-only, and
/// decides which reads count as loading context.
///
/// Tool names are compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPolicy {
    pub effectful_tools: Vec<String>,
    pub read_tools: Vec<String>,
    /// Substrings of a read path that mark it as a context source.
    pub context_paths: Vec<String>,
}

impl Default for ToolPolicy {
    fn default() -> Self {
        let to_vec = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            effectful_tools: to_vec(&[
                "write",
                "edit",
                "patch",
                "multiedit",
                "bash",
                "delete",
                "move",
                "task",
            ]),
            read_tools: to_vec(&["read", "glob", "grep", "list"]),
            context_paths: to_vec(&["context/", ".agents/", "AGENTS.md"]),
        }
    }
}

fn contains_ci(list: &[String], tool: &str) -> bool {
    list.iter().any(|t| t.eq_ignore_ascii_case(tool))
}

impl ToolPolicy {
    pub fn is_effectful(&self, tool: &str) -> bool {
        contains_ci(&self.effectful_tools, tool)
    }

    pub fn is_read(&self, tool: &str) -> bool {
        contains_ci(&self.read_tools, tool)
    }

    /// Whether the event is an effectful `tool_call`.
    pub fn is_effectful_call(&self, event: &TimelineEvent) -> bool {
        match &event.kind {
            EventKind::ToolCall { tool } => self.is_effectful(tool),
            _ => false,
        }
    }

    /// Context source loaded by this event, if any.
    ///
    /// Either an explicit `context_loaded` event, or a read-tool call whose
    /// path contains one of the configured context paths.
    pub fn context_source<'a>(&self, event: &'a TimelineEvent) -> Option<&'a str> {
        match &event.kind {
            EventKind::ContextLoaded { source } => Some(source),
            EventKind::ToolCall { tool } if self.is_read(tool) => {
                let path = PATH_KEYS
                    .iter()
                    .find_map(|k| event.payload.get(*k).and_then(|v| v.as_str()))?;
                self.context_paths
                    .iter()
                    .any(|p| path.contains(p.as_str()))
                    .then_some(path)
            }
            _ => None,
        }
    }

    pub fn is_context_load(&self, event: &TimelineEvent) -> bool {
        self.context_source(event).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn event(kind: EventKind, payload: serde_json::Value) -> TimelineEvent {
        TimelineEvent {
            seq: 1,
            timestamp: Utc::now(),
            kind,
            payload,
        }
    }

    #[test]
    fn test_effectful_is_case_insensitive() {
        let policy = ToolPolicy::default();
        assert!(policy.is_effectful("Write"));
        assert!(policy.is_effectful("BASH"));
        assert!(!policy.is_effectful("read"));
    }

    #[test]
    fn test_explicit_context_event() {
        let policy = ToolPolicy::default();
        let e = event(
            EventKind::ContextLoaded {
                source: "standards.md".into(),
            },
            json!({}),
        );
        assert_eq!(policy.context_source(&e), Some("standards.md"));
    }

    #[test]
    fn test_read_of_context_path_counts() {
        let policy = ToolPolicy::default();
        let e = event(
            EventKind::ToolCall {
                tool: "Read".into(),
            },
            json!({"filePath": "/repo/.agents/context/code-style.md"}),
        );
        assert!(policy.is_context_load(&e));
    }

    #[test]
    fn test_read_of_ordinary_file_does_not_count() {
        let policy = ToolPolicy::default();
        let e = event(
            EventKind::ToolCall {
                tool: "read".into(),
            },
            json!({"path": "src/main.rs"}),
        );
        assert!(!policy.is_context_load(&e));
    }

    #[test]
    fn test_write_to_context_path_is_not_a_load() {
        let policy = ToolPolicy::default();
        let e = event(
            EventKind::ToolCall {
                tool: "write".into(),
            },
            json!({"path": "context/notes.md"}),
        );
        assert!(!policy.is_context_load(&e));
        assert!(policy.is_effectful_call(&e));
    }
}
