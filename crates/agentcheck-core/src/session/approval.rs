//! Applying an [`ApprovalStrategy`] to incoming approval requests.

use serde::{Deserialize, Serialize};

use crate::domain::ApprovalStrategy;

/// The harness's answer to an approval request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub approved: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ApprovalDecision {
    pub fn approve() -> Self {
        Self {
            approved: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: Some(reason.into()),
        }
    }
}

/// Stateful responder; scripted strategies consume decisions in order.
#[derive(Debug, Clone)]
pub struct ApprovalResponder {
    strategy: ApprovalStrategy,
    answered: usize,
}

impl ApprovalResponder {
    pub fn new(strategy: ApprovalStrategy) -> Self {
        Self {
            strategy,
            answered: 0,
        }
    }

    /// Number of requests answered so far.
    pub fn answered(&self) -> usize {
        self.answered
    }

    pub fn decide(&mut self, tool: Option<&str>) -> ApprovalDecision {
        let index = self.answered;
        self.answered += 1;

        match &self.strategy {
            ApprovalStrategy::AutoApprove => ApprovalDecision::approve(),
            ApprovalStrategy::AutoDeny => ApprovalDecision::deny("strategy denies all requests"),
            ApprovalStrategy::ApproveTools { tools } => match tool {
                Some(t) if tools.iter().any(|a| a.eq_ignore_ascii_case(t)) => {
                    ApprovalDecision::approve()
                }
                Some(t) => ApprovalDecision::deny(format!("tool '{t}' is not pre-approved")),
                None => ApprovalDecision::deny("request does not name a tool"),
            },
            ApprovalStrategy::Scripted { decisions } => match decisions.get(index) {
                Some(true) => ApprovalDecision::approve(),
                Some(false) => ApprovalDecision::deny(format!("scripted denial #{}", index + 1)),
                None => ApprovalDecision::deny("scripted decisions exhausted"),
            },
        }
    }
}
