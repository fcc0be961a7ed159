//! Central model registry — keyed by model id, resolves provider/endpoint
//! configuration for the dispatch client.
//!
//! Each entry names a provider, a base URL, and optional `extra_params`
//! (reasoning effort / extended-thinking budget) that suppress the plain
//! `temperature` field when present.

use std::collections::HashMap;

use serde_json::json;

use crate::dispatch::types::ModelEntry;

/// Process-wide, read-mostly registry of known models.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    entries: HashMap<String, ModelEntry>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Seed the registry with the default set of models the original
    /// implementation routed through RouterAI/OpenRouter.
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();

        reg.insert(
            "anthropic/claude-opus-4.5",
            ModelEntry {
                provider_name: "openrouter".into(),
                base_url: "https://openrouter.ai/api/v1".into(),
                api_key_env: "OPENROUTER_API_KEY".into(),
                extra_params: HashMap::new(),
            },
        );

        let mut sonnet_extra = HashMap::new();
        sonnet_extra.insert(
            "thinking".into(),
            json!({"type": "enabled", "budget_tokens": 40_000}),
        );
        reg.insert(
            "anthropic/claude-sonnet-4.5",
            ModelEntry {
                provider_name: "openrouter".into(),
                base_url: "https://openrouter.ai/api/v1".into(),
                api_key_env: "OPENROUTER_API_KEY".into(),
                extra_params: sonnet_extra,
            },
        );

        let mut codex_extra = HashMap::new();
        codex_extra.insert("reasoning_effort".into(), json!("xhigh"));
        reg.insert(
            "openai/gpt-5.2-codex",
            ModelEntry {
                provider_name: "openrouter".into(),
                base_url: "https://openrouter.ai/api/v1".into(),
                api_key_env: "OPENROUTER_API_KEY".into(),
                extra_params: codex_extra,
            },
        );

        let mut codex_mini_extra = HashMap::new();
        codex_mini_extra.insert("reasoning_effort".into(), json!("low"));
        codex_mini_extra.insert("max_tokens".into(), json!(3_000));
        reg.insert(
            "openai/gpt-5.1-codex-mini",
            ModelEntry {
                provider_name: "openrouter".into(),
                base_url: "https://openrouter.ai/api/v1".into(),
                api_key_env: "OPENROUTER_API_KEY".into(),
                extra_params: codex_mini_extra,
            },
        );

        reg.insert(
            "google/gemini-2.0-flash-001",
            ModelEntry {
                provider_name: "openrouter".into(),
                base_url: "https://openrouter.ai/api/v1".into(),
                api_key_env: "OPENROUTER_API_KEY".into(),
                extra_params: HashMap::new(),
            },
        );

        reg.insert(
            "deepseek-chat",
            ModelEntry {
                provider_name: "deepseek".into(),
                base_url: "https://api.deepseek.com".into(),
                api_key_env: "DEEPSEEK_API_KEY".into(),
                extra_params: HashMap::new(),
            },
        );

        reg
    }

    pub fn insert(&mut self, model_id: impl Into<String>, entry: ModelEntry) {
        self.entries.insert(model_id.into(), entry);
    }

    pub fn get(&self, model_id: &str) -> Option<&ModelEntry> {
        self.entries.get(model_id)
    }

    pub fn resolve_api_key(&self, model_id: &str) -> Option<String> {
        let entry = self.entries.get(model_id)?;
        std::env::var(&entry.api_key_env).ok()
    }

    pub fn known_models(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_knows_core_models() {
        let reg = ModelRegistry::with_defaults();
        assert!(reg.get("anthropic/claude-opus-4.5").is_some());
        assert!(reg.get("deepseek-chat").is_some());
        assert!(reg.get("not-a-real-model").is_none());
    }

    #[test]
    fn sonnet_entry_suppresses_temperature() {
        let reg = ModelRegistry::with_defaults();
        let entry = reg.get("anthropic/claude-sonnet-4.5").unwrap();
        assert!(entry.suppresses_temperature());
    }

    #[test]
    fn plain_entry_does_not_suppress_temperature() {
        let reg = ModelRegistry::with_defaults();
        let entry = reg.get("anthropic/claude-opus-4.5").unwrap();
        assert!(!entry.suppresses_temperature());
    }
}
