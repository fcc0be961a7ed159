//! Runtime configuration.
//!
//! Loaded from a TOML file (`Config::from_toml_str` / `Config::load`) with
//! environment-variable overrides applied on top.

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::router::RouterTier;

/// Top-level configuration: every key an operator can tune per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub router_enabled: bool,
    pub orchestrator_fixed_model: String,
    pub orchestrator_simple_model: String,
    pub orchestrator_medium_model: String,
    pub orchestrator_complex_model: String,

    pub pre_filter_max_chunks: usize,
    pub pre_filter_max_tokens: usize,

    pub validation_levels: Vec<String>,
    pub disabled_validation_levels: Vec<String>,

    pub ai_validator_token_threshold: usize,
    pub ai_validator_model_small: String,
    pub ai_validator_model_large: String,

    pub max_validator_retries: u32,
    pub max_orchestrator_revisions: u32,
    pub max_test_runs_per_session: u32,
    pub test_timeout_sec: u64,
    pub test_output_limit: usize,

    pub backup_enabled: bool,
    pub backup_retention_days: u32,
    pub backup_dir: String,

    pub history_threshold_tokens: usize,
    /// Dedicated cheap model C8 uses to produce compaction abstracts.
    pub compressor_model: String,

    /// Process-wide bound on in-flight LLM requests.
    pub dispatch_concurrency: usize,
    /// Bound on fan-out degree for index/IO batch work.
    pub io_fanout_degree: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            router_enabled: true,
            orchestrator_fixed_model: RouterTier::Simple.default_model().to_string(),
            orchestrator_simple_model: RouterTier::Simple.default_model().to_string(),
            orchestrator_medium_model: RouterTier::Medium.default_model().to_string(),
            orchestrator_complex_model: RouterTier::Complex.default_model().to_string(),

            pre_filter_max_chunks: 5,
            pre_filter_max_tokens: 75_000,

            validation_levels: vec![
                "syntax".into(),
                "imports".into(),
                "types".into(),
                "integration".into(),
                "runtime".into(),
                "tests".into(),
            ],
            disabled_validation_levels: Vec::new(),

            ai_validator_token_threshold: 8_000,
            ai_validator_model_small: "qwen-2.5-coder".into(),
            ai_validator_model_large: "deepseek-chat".into(),

            max_validator_retries: 3,
            max_orchestrator_revisions: 3,
            max_test_runs_per_session: 5,
            test_timeout_sec: 60,
            test_output_limit: 2_000,

            backup_enabled: true,
            backup_retention_days: 7,
            backup_dir: ".backups".into(),

            history_threshold_tokens: 100_000,
            compressor_model: "qwen-2.5-coder".into(),

            dispatch_concurrency: 5,
            io_fanout_degree: 25,
        }
    }
}

impl Config {
    /// Parse config from a TOML string, falling back to defaults for any
    /// unset field.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Load from a file path, or return defaults if the file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&raw)?)
    }

    /// Apply environment-variable overrides for the handful of knobs that
    /// operators most often need to tweak without editing a file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("AGENT_MAX_VALIDATOR_RETRIES") {
            if let Ok(n) = v.parse() {
                self.max_validator_retries = n;
            }
        }
        if let Ok(v) = env::var("AGENT_MAX_ORCHESTRATOR_REVISIONS") {
            if let Ok(n) = v.parse() {
                self.max_orchestrator_revisions = n;
            }
        }
        if let Ok(v) = env::var("AGENT_ROUTER_ENABLED") {
            self.router_enabled = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Ok(v) = env::var("AGENT_DISPATCH_CONCURRENCY") {
            if let Ok(n) = v.parse() {
                self.dispatch_concurrency = n;
            }
        }
    }

    pub fn is_level_enabled(&self, level: &str) -> bool {
        self.validation_levels.iter().any(|l| l == level)
            && !self.disabled_validation_levels.iter().any(|l| l == level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_all_levels() {
        let cfg = Config::default();
        for level in ["syntax", "imports", "types", "integration", "runtime", "tests"] {
            assert!(cfg.is_level_enabled(level));
        }
    }

    #[test]
    fn disabled_levels_are_excluded() {
        let mut cfg = Config::default();
        cfg.disabled_validation_levels.push("tests".into());
        assert!(!cfg.is_level_enabled("tests"));
        assert!(cfg.is_level_enabled("syntax"));
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg = Config::from_toml_str("max_validator_retries = 9\n").unwrap();
        assert_eq!(cfg.max_validator_retries, 9);
        assert_eq!(cfg.max_orchestrator_revisions, 3); // default
    }

    #[test]
    fn env_override_applies() {
        std::env::set_var("AGENT_MAX_VALIDATOR_RETRIES", "11");
        let mut cfg = Config::default();
        cfg.apply_env_overrides();
        assert_eq!(cfg.max_validator_retries, 11);
        std::env::remove_var("AGENT_MAX_VALIDATOR_RETRIES");
    }
}
