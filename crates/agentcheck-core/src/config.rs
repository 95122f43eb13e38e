//! Evaluation configuration: defaults, optional TOML file, env overrides.
//!
//! ```toml
//! max_concurrent = 8
//!
//! [thresholds]
//! min_pass_rate = 0.9
//!
//! [[gate_rules]]
//! type = "require_tag"
//! tag = "smoke"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{EvalError, Result, ToolPolicy};
use crate::gate::{GateRule, GateRuleSet, SuiteThresholds};
use crate::scoring::ScoringPolicy;

pub const ENV_MAX_CONCURRENT: &str = "AGENTCHECK_MAX_CONCURRENT";
pub const ENV_ARTIFACTS_DIR: &str = "AGENTCHECK_ARTIFACTS_DIR";
pub const ENV_PASS_THRESHOLD: &str = "AGENTCHECK_PASS_THRESHOLD";

/// Config file picked up from the working directory when none is named.
pub const DEFAULT_CONFIG_FILE: &str = "agentcheck.toml";

/// Settings shared by every command that evaluates cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    pub tool_policy: ToolPolicy,
    pub scoring: ScoringPolicy,
    pub thresholds: SuiteThresholds,
    /// Gate rules applied on top of the standard threshold rules.
    pub gate_rules: Vec<GateRule>,
    /// Upper bound on sessions running at once.
    pub max_concurrent: usize,
    pub artifacts_dir: PathBuf,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            tool_policy: ToolPolicy::default(),
            scoring: ScoringPolicy::default(),
            thresholds: SuiteThresholds::default(),
            gate_rules: Vec::new(),
            max_concurrent: 4,
            artifacts_dir: PathBuf::from(".agentcheck/runs"),
        }
    }
}

impl EvalConfig {
    /// Defaults, then `path` if given, then environment overrides.
    ///
    /// A named file that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.is_file() => Self::from_file(p)?,
            Some(p) => {
                return Err(EvalError::Config(format!(
                    "config file not found: {}",
                    p.display()
                )))
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// [`load`](Self::load) the explicit path if one is named. Otherwise use
    /// `fallback` when it exists, and plain defaults when it does not.
    pub fn load_or_fallback(explicit: Option<&Path>, fallback: &Path) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(Some(path)),
            None if fallback.is_file() => Self::load(Some(fallback)),
            None => {
                debug!(path = %fallback.display(), "no config file, using defaults");
                Self::load(None)
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `AGENTCHECK_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MAX_CONCURRENT) {
            self.max_concurrent = raw.trim().parse().map_err(|_| {
                EvalError::Config(format!(
                    "{ENV_MAX_CONCURRENT} must be an integer, got '{raw}'"
                ))
            })?;
        }
        if let Some(raw) = lookup(ENV_ARTIFACTS_DIR) {
            self.artifacts_dir = PathBuf::from(raw);
        }
        if let Some(raw) = lookup(ENV_PASS_THRESHOLD) {
            self.scoring.pass_threshold = raw.trim().parse().map_err(|_| {
                EvalError::Config(format!("{ENV_PASS_THRESHOLD} must be a number, got '{raw}'"))
            })?;
        }
        Ok(())
    }

    /// Standard threshold rules plus any configured `gate_rules`.
    pub fn gate_rule_set(&self) -> GateRuleSet {
        let standard = GateRuleSet::standard().with_thresholds(self.thresholds.clone());
        self.gate_rules.iter().fold(standard, |set, rule| {
            if set.rules.contains(rule) {
                set
            } else {
                set.with_rule(rule.clone())
            }
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(EvalError::Config("max_concurrent must be at least 1".into()));
        }
        let unit = |name: &str, value: f32| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(EvalError::Config(format!(
                    "{name} must be within 0.0..=1.0, got {value}"
                )))
            }
        };
        unit("scoring.pass_threshold", self.scoring.pass_threshold)?;
        unit("thresholds.min_pass_rate", self.thresholds.min_pass_rate)?;
        unit("thresholds.max_regression", self.thresholds.max_regression)?;
        unit("thresholds.min_mean_score", self.thresholds.min_mean_score)?;
        if self.scoring.default_weight < 0.0 {
            return Err(EvalError::Config(
                "scoring.default_weight must not be negative".into(),
            ));
        }
        for rule in &self.gate_rules {
            match rule {
                GateRule::RequireTag { tag } if tag.trim().is_empty() => {
                    return Err(EvalError::Config("gate rule require_tag needs a tag".into()));
                }
                GateRule::RequireCategory { category } if category.trim().is_empty() => {
                    return Err(EvalError::Config(
                        "gate rule require_category needs a category".into(),
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EvalConfig::default();
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.artifacts_dir, PathBuf::from(".agentcheck/runs"));
        assert_eq!(config.scoring.pass_threshold, 0.7);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EvalConfig::from_toml(
            r#"
            max_concurrent = 8

            [scoring]
            pass_threshold = 0.9

            [scoring.weights]
            approval-gate = 3.0

            [tool_policy]
            effectful_tools = ["write", "shell"]
            "#,
        )
        .unwrap();
        assert_eq!(config.max_concurrent, 8);
        assert_eq!(config.scoring.pass_threshold, 0.9);
        assert_eq!(config.scoring.weight("approval-gate"), 3.0);
        assert_eq!(config.scoring.weight("tool-usage"), 1.0);
        assert!(config.tool_policy.is_effectful("shell"));
        assert!(config.tool_policy.is_read("grep"));
        assert_eq!(config.thresholds, SuiteThresholds::default());
    }

    #[test]
    fn test_env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            (ENV_MAX_CONCURRENT, "2"),
            (ENV_ARTIFACTS_DIR, "/tmp/runs"),
            (ENV_PASS_THRESHOLD, "0.5"),
        ]
        .into_iter()
        .collect();
        let mut config = EvalConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.artifacts_dir, PathBuf::from("/tmp/runs"));
        assert_eq!(config.scoring.pass_threshold, 0.5);
    }

    #[test]
    fn test_bad_env_value_is_config_error() {
        let mut config = EvalConfig::default();
        let err = config
            .apply_overrides(|k| (k == ENV_MAX_CONCURRENT).then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, EvalError::Config(_)));
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let mut config = EvalConfig::default();
        config.thresholds.min_pass_rate = 1.5;
        assert!(matches!(config.validate(), Err(EvalError::Config(_))));

        let mut config = EvalConfig::default();
        config.max_concurrent = 0;
        assert!(matches!(config.validate(), Err(EvalError::Config(_))));
    }

    #[test]
    fn test_gate_rules_from_toml_extend_standard_set() {
        let config = EvalConfig::from_toml(
            r#"
            [thresholds]
            min_pass_rate = 0.8

            [[gate_rules]]
            type = "require_tag"
            tag = "smoke"

            [[gate_rules]]
            type = "require_category"
            category = "tier1"

            [[gate_rules]]
            type = "max_escalations"
            max = 0

            [[gate_rules]]
            type = "min_pass_rate"
            "#,
        )
        .unwrap();
        config.validate().unwrap();

        let set = config.gate_rule_set();
        assert_eq!(set.thresholds.min_pass_rate, 0.8);
        assert_eq!(
            set.rules,
            vec![
                GateRule::MinPassRate,
                GateRule::MaxRegression,
                GateRule::MinMeanScore,
                GateRule::RequireTag {
                    tag: "smoke".into()
                },
                GateRule::RequireCategory {
                    category: "tier1".into()
                },
                GateRule::MaxEscalations { max: 0 },
            ]
        );
    }

    #[test]
    fn test_blank_require_tag_rejected() {
        let mut config = EvalConfig::default();
        config.gate_rules.push(GateRule::RequireTag { tag: " ".into() });
        assert!(matches!(config.validate(), Err(EvalError::Config(_))));
    }

    #[test]
    fn test_named_config_that_is_missing_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let err = EvalConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(&err, EvalError::Config(msg) if msg.contains("absent.toml")));

        let err = EvalConfig::load_or_fallback(Some(&path), Path::new("unused.toml"));
        assert!(matches!(err, Err(EvalError::Config(_))));
    }

    #[test]
    fn test_missing_fallback_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join(DEFAULT_CONFIG_FILE);
        let config = EvalConfig::load_or_fallback(None, &fallback).unwrap();
        assert!(config.gate_rules.is_empty());
        assert_eq!(config.thresholds, SuiteThresholds::default());

        std::fs::write(&fallback, "[thresholds]\nmin_mean_score = 0.25\n").unwrap();
        let config = EvalConfig::load_or_fallback(None, &fallback).unwrap();
        assert_eq!(config.thresholds.min_mean_score, 0.25);
    }

    #[test]
    fn test_from_file_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = EvalConfig::from_file(&path);
        assert!(matches!(config, Err(EvalError::Io(_))));
    }
}
