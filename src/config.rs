//! Grader configuration
//!
//! Loaded from JSON; every field has a default so partial files are
//! accepted. Unknown fields are rejected to catch typos.

use crate::error::{Error, Result};
use crate::runtime::Limits;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct GraderConfig {
    /// Test runner settings
    pub runner: RunnerConfig,
    /// Hint generation settings
    pub hints: HintConfig,
}

/// Settings for [`TestRunner`](crate::test_runner::TestRunner)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// Per-case timeout, also the budget of the registration pass
    pub timeout_ms: u64,
    /// Nested calls allowed before a `RangeError`
    pub max_call_depth: usize,
    /// Console entries kept per run; later entries are dropped
    pub max_log_entries: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            max_call_depth: 200,
            max_log_entries: 1000,
        }
    }
}

impl RunnerConfig {
    /// Interpreter limits for this configuration
    pub fn limits(&self) -> Limits {
        Limits {
            max_call_depth: self.max_call_depth,
            timeout_ms: self.timeout_ms,
        }
    }
}

/// Settings for [`hints`](crate::hints)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HintConfig {
    /// Highest disclosure level served (1-3)
    pub max_level: u8,
    /// Prefix of documentation links
    pub docs_base_url: String,
}

impl Default for HintConfig {
    fn default() -> Self {
        Self {
            max_level: 3,
            docs_base_url: "https://developer.mozilla.org/en-US/docs".to_string(),
        }
    }
}

impl GraderConfig {
    /// Parse configuration from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::ConfigError(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Reject values the runner cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.runner.timeout_ms == 0 {
            return Err(Error::ConfigError(
                "runner.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.runner.max_call_depth == 0 {
            return Err(Error::ConfigError(
                "runner.max_call_depth must be greater than zero".to_string(),
            ));
        }
        if !(1..=3).contains(&self.hints.max_level) {
            return Err(Error::ConfigError(format!(
                "hints.max_level must be between 1 and 3, got {}",
                self.hints.max_level
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = GraderConfig::default();
        assert_eq!(config.runner.timeout_ms, 5000);
        assert_eq!(config.runner.max_call_depth, 200);
        assert_eq!(config.hints.max_level, 3);
    }

    #[test]
    fn test_partial_json() {
        let config = GraderConfig::from_json_str(r#"{ "runner": { "timeout_ms": 250 } }"#).unwrap();
        assert_eq!(config.runner.timeout_ms, 250);
        assert_eq!(config.runner.max_log_entries, 1000);
        assert_eq!(config.hints, HintConfig::default());
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            GraderConfig::from_json_str("{ not json"),
            Err(Error::ConfigError(_))
        ));
        assert!(matches!(
            GraderConfig::from_json_str(r#"{ "runner": { "timeout": 1 } }"#),
            Err(Error::ConfigError(_))
        ));
        assert!(matches!(
            GraderConfig::from_json_str(r#"{ "hints": { "max_level": 7 } }"#),
            Err(Error::ConfigError(_))
        ));
    }
}
