//! Test case definitions and behavioral expectations.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{EvalError, Result, ValidationError};
use super::verdict::Severity;

/// Default session timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Declarative assertions about what the agent must (not) do, independent of
/// exact message counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BehaviorExpectation {
    /// Tools that must be called at least once.
    pub must_use_tools: Vec<String>,
    /// Tools that must never be called.
    pub must_not_use_tools: Vec<String>,
    /// At least one approval request must appear in the timeline.
    pub requires_approval: bool,
    /// Context must be loaded before the first effectful action.
    pub requires_context: bool,
    /// Substring patterns of context sources that must be loaded.
    pub required_context: Vec<String>,
    /// Tools that must appear in this relative order.
    pub expected_sequence: Vec<String>,
    pub min_tool_calls: Option<u32>,
    pub max_tool_calls: Option<u32>,
}

/// A rule violation the case author expects to see (or not see).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedViolation {
    pub rule: String,
    pub should_occur: bool,
    #[serde(default)]
    pub severity: Option<Severity>,
}

/// How the harness answers approval requests during a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApprovalStrategy {
    #[default]
    AutoApprove,
    AutoDeny,
    /// Approve only requests naming one of these tools.
    ApproveTools { tools: Vec<String> },
    /// Answer requests in order; deny once the list is exhausted.
    Scripted { decisions: Vec<bool> },
}

/// A single compliance test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Free-form grouping, e.g. `tier1/approval`.
    #[serde(default)]
    pub category: String,
    pub prompt: String,
    /// Target agent identifier.
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub behavior: BehaviorExpectation,
    #[serde(default)]
    pub expected_violations: Vec<ExpectedViolation>,
    #[serde(default)]
    pub approval_strategy: ApprovalStrategy,
    /// Session timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TestCase {
    /// Create a test case with default expectations.
    pub fn new(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            category: String::new(),
            prompt: prompt.into(),
            agent: None,
            behavior: BehaviorExpectation::default(),
            expected_violations: Vec::new(),
            approval_strategy: ApprovalStrategy::default(),
            timeout: DEFAULT_TIMEOUT_SECS,
            tags: Vec::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_behavior(mut self, behavior: BehaviorExpectation) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn expect_violation(mut self, rule: impl Into<String>, should_occur: bool) -> Self {
        self.expected_violations.push(ExpectedViolation {
            rule: rule.into(),
            should_occur,
            severity: None,
        });
        self
    }

    pub fn with_approval_strategy(mut self, strategy: ApprovalStrategy) -> Self {
        self.approval_strategy = strategy;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = secs;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// True when every tag in `tags` is present on this case.
    pub fn matches_tags(&self, tags: &[String]) -> bool {
        tags.iter().all(|t| self.tags.contains(t))
    }

    /// `category/id`, or just the id when uncategorized.
    pub fn qualified_id(&self) -> String {
        if self.category.is_empty() {
            self.id.clone()
        } else {
            format!("{}/{}", self.category, self.id)
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.check().map_err(|source| EvalError::InvalidTestCase {
            id: self.id.clone(),
            source,
        })
    }

    fn check(&self) -> std::result::Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "id" });
        }
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "prompt" });
        }
        if self.timeout == 0 {
            return Err(ValidationError::InvalidTimeout);
        }

        let forbidden: HashSet<String> = self
            .behavior
            .must_not_use_tools
            .iter()
            .map(|t| t.to_lowercase())
            .collect();
        if let Some(tool) = self
            .behavior
            .must_use_tools
            .iter()
            .find(|t| forbidden.contains(&t.to_lowercase()))
        {
            return Err(ValidationError::ConflictingTool { tool: tool.clone() });
        }

        if let (Some(min), Some(max)) = (self.behavior.min_tool_calls, self.behavior.max_tool_calls)
        {
            if min > max {
                return Err(ValidationError::InvalidToolBudget { min, max });
            }
        }

        let mut rules = HashSet::new();
        for expected in &self.expected_violations {
            if !rules.insert(expected.rule.as_str()) {
                return Err(ValidationError::DuplicateExpectedRule {
                    rule: expected.rule.clone(),
                });
            }
        }

        Ok(())
    }
}
