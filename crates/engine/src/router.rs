//! Router — classifies task complexity and selects an orchestrator model.
//!
//! A cheap classifier call picks a complexity tier, and each tier maps to a
//! concrete default model (overridable via [`crate::config::Config`]). On
//! any router failure the caller must fall back to [`RouterTier::Simple`].

use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Task complexity tier, as judged by the Router agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterTier {
    /// Standard coding tasks.
    Simple,
    /// Multi-component changes, business logic.
    Medium,
    /// Security, concurrency, architecture-sensitive changes.
    Complex,
}

impl RouterTier {
    /// Default model id for this tier, used when config doesn't override it.
    pub fn default_model(&self) -> &'static str {
        match self {
            RouterTier::Simple => "openai/gpt-5.1-codex-mini",
            RouterTier::Medium => "anthropic/claude-sonnet-4.5",
            RouterTier::Complex => "anthropic/claude-opus-4.5",
        }
    }

    /// Resolve the configured model id for this tier.
    pub fn configured_model<'a>(&self, config: &'a Config) -> &'a str {
        match self {
            RouterTier::Simple => &config.orchestrator_simple_model,
            RouterTier::Medium => &config.orchestrator_medium_model,
            RouterTier::Complex => &config.orchestrator_complex_model,
        }
    }

    /// Parse a router classification response. Unknown strings fall back to
    /// `Simple` rather than erroring — the caller should already have
    /// classified "failure" (empty / malformed response) upstream, but this
    /// keeps the mapping total.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "medium" => RouterTier::Medium,
            "complex" => RouterTier::Complex,
            _ => RouterTier::Simple,
        }
    }
}

impl std::fmt::Display for RouterTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouterTier::Simple => write!(f, "simple"),
            RouterTier::Medium => write!(f, "medium"),
            RouterTier::Complex => write!(f, "complex"),
        }
    }
}

/// Outcome of the router classification step (step 2).
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub tier: RouterTier,
    pub model: String,
    /// True if the router LLM call failed and we fell back to `Simple`.
    pub fell_back: bool,
}

/// Decide which model should drive the orchestrator for this request.
///
/// `classification` is the raw text returned by the router LLM call, or
/// `None` if the call failed outright (network error, timeout, etc.) — both
/// cases fall back to `Simple`.
pub fn route(config: &Config, classification: Option<&str>) -> RoutingDecision {
    if !config.router_enabled {
        return RoutingDecision {
            tier: RouterTier::Simple,
            model: config.orchestrator_fixed_model.clone(),
            fell_back: false,
        };
    }

    match classification {
        Some(raw) => {
            let tier = RouterTier::parse(raw);
            RoutingDecision {
                model: tier.configured_model(config).to_string(),
                tier,
                fell_back: false,
            }
        }
        None => RoutingDecision {
            tier: RouterTier::Simple,
            model: RouterTier::Simple.configured_model(config).to_string(),
            fell_back: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_disabled_uses_fixed_model() {
        let mut cfg = Config::default();
        cfg.router_enabled = false;
        cfg.orchestrator_fixed_model = "fixed-model".into();
        let decision = route(&cfg, Some("complex"));
        assert_eq!(decision.model, "fixed-model");
        assert_eq!(decision.tier, RouterTier::Simple);
    }

    #[test]
    fn router_failure_falls_back_to_simple() {
        let cfg = Config::default();
        let decision = route(&cfg, None);
        assert_eq!(decision.tier, RouterTier::Simple);
        assert!(decision.fell_back);
    }

    #[test]
    fn router_parses_tiers_case_insensitively() {
        assert_eq!(RouterTier::parse("COMPLEX"), RouterTier::Complex);
        assert_eq!(RouterTier::parse("Medium"), RouterTier::Medium);
        assert_eq!(RouterTier::parse("garbage"), RouterTier::Simple);
    }
}
