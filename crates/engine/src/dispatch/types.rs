//! Wire-level types for the LLM Dispatch Layer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single chat message in an OpenAI-compatible conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
    /// Opaque reasoning artifact attached to an assistant message by some
    /// providers (reasoning details, thought signatures, tool-call extra
    /// content). Must be round-tripped byte-identical on the next turn of
    /// the same conversation . Never inspected by the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_payload: Option<ReasoningPayload>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
            reasoning_payload: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
            reasoning_payload: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
            reasoning_payload: None,
        }
    }

    /// An assistant message carrying the opaque reasoning artifact from the
    /// response that produced it byte-identical on the next
    /// turn .
    pub fn assistant_with_reasoning(content: impl Into<String>, reasoning_payload: Option<ReasoningPayload>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
            reasoning_payload,
        }
    }
}

/// Opaque provider-specific reasoning payload. The core never parses this;
/// it is carried verbatim between requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReasoningPayload(pub Value);

/// A tool definition offered to the model for `CallWithTools`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A tool invocation requested by the model in its response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Options accepted by `Call` / `CallWithTools`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub tools: Option<Vec<ToolSpec>>,
    pub tool_choice: Option<String>,
}

/// Reason the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other,
}

impl FinishReason {
    pub fn from_str(raw: &str) -> Self {
        match raw {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "tool_calls" => Self::ToolCalls,
            "content_filter" => Self::ContentFilter,
            _ => Self::Other,
        }
    }

    /// `finish_reason = "length"` is logged as a truncation warning
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::Length)
    }
}

/// Response surface returned by a successful dispatch call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub content: String,
    pub model: String,
    pub provider: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub reasoning_payload: Option<ReasoningPayload>,
    pub finish_reason: FinishReason,
}

/// Per-model provider configuration resolved from the model registry —
/// "Provider, endpoint URL, API key, and provider-specific extra
/// parameters ... resolved from a central model registry keyed by model id."
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub provider_name: String,
    pub base_url: String,
    pub api_key_env: String,
    /// Extra provider-specific params merged into the request body
    /// (reasoning effort, extended-thinking budget, ...). Per 
    /// when present these suppress the `temperature` field.
    #[serde(default)]
    pub extra_params: HashMap<String, Value>,
}

impl ModelEntry {
    /// Whether this entry's extra params should suppress `temperature`.
    pub fn suppresses_temperature(&self) -> bool {
        !self.extra_params.is_empty()
    }
}
