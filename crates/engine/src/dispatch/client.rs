//! The single chokepoint for all model calls
//!
//! `DispatchClient::call` / `call_with_tools` resolve provider config from
//! the [`ModelRegistry`], bound concurrency with a process-wide semaphore,
//! classify failures, and retry under independent rate-limit / general
//! budgets. Cancellation is via the caller's `CancellationToken`
//! ("All requests are cancellable via context").

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::dispatch::breaker::{RetryConfig, RetryTracker};
use crate::dispatch::classify::{classify, ErrorClass};
use crate::dispatch::registry::ModelRegistry;
use crate::dispatch::types::{CallOptions, DispatchResponse, FinishReason, Message, ToolCall};

/// Errors raised by the dispatch layer.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("model '{0}' is not registered")]
    UnknownModel(String),

    #[error("no API key available for model '{0}' (expected env var '{1}')")]
    MissingApiKey(String, String),

    #[error("call to '{model}' was cancelled")]
    Cancelled { model: String },

    #[error("context overflow calling '{model}': {message}")]
    ContextOverflow { model: String, message: String },

    #[error("message structure error calling '{model}': {message}")]
    MessageStructure { model: String, message: String },

    #[error("rate-limit budget exhausted calling '{model}' after {attempts} attempts")]
    RateLimitExhausted { model: String, attempts: u32 },

    #[error("retry budget exhausted calling '{model}' after {attempts} attempts: {last_error}")]
    RetryExhausted {
        model: String,
        attempts: u32,
        last_error: String,
    },

    #[error("fatal error calling '{model}': {message}")]
    Fatal { model: String, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

/// Raw response from the HTTP transport, before classification.
pub struct TransportResponse {
    pub status: u16,
    pub body: Value,
}

/// Abstraction over the actual HTTP call, so tests can mock the network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        base_url: &str,
        api_key: &str,
        request_body: Value,
    ) -> Result<TransportResponse, String>;
}

/// `reqwest`-backed transport used in production.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        base_url: &str,
        api_key: &str,
        request_body: Value,
    ) -> Result<TransportResponse, String> {
        let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .header("HTTP-Referer", "agent-runtime")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = resp.status().as_u16();
        let body: Value = resp
            .json()
            .await
            .unwrap_or_else(|_| json!({"error": "non-json response body"}));

        Ok(TransportResponse { status, body })
    }
}

/// Process-wide dispatch client. Cheap to clone (everything behind `Arc`).
#[derive(Clone)]
pub struct DispatchClient {
    registry: Arc<ModelRegistry>,
    semaphore: Arc<Semaphore>,
    transport: Arc<dyn Transport>,
    per_call_timeout: Duration,
}

impl DispatchClient {
    pub fn new(registry: ModelRegistry, concurrency: usize) -> Self {
        Self {
            registry: Arc::new(registry),
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            transport: Arc::new(ReqwestTransport::default()),
            per_call_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.per_call_timeout = timeout;
        self
    }

    /// Single-shot chat call.
    pub async fn call(
        &self,
        model: &str,
        messages: &[Message],
        options: &CallOptions,
        cancel: &CancellationToken,
    ) -> Result<DispatchResponse, DispatchError> {
        self.dispatch(model, messages, options, cancel).await
    }

    /// Tool-enabled chat call. Differs from
    /// `call` only in that `options.tools` is expected to be populated; the
    /// dispatch/retry machinery is identical.
    pub async fn call_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        options: &CallOptions,
        cancel: &CancellationToken,
    ) -> Result<DispatchResponse, DispatchError> {
        self.dispatch(model, messages, options, cancel).await
    }

    async fn dispatch(
        &self,
        model: &str,
        messages: &[Message],
        options: &CallOptions,
        cancel: &CancellationToken,
    ) -> Result<DispatchResponse, DispatchError> {
        let entry = self
            .registry
            .get(model)
            .ok_or_else(|| DispatchError::UnknownModel(model.to_string()))?
            .clone();

        let api_key = self
            .registry
            .resolve_api_key(model)
            .ok_or_else(|| DispatchError::MissingApiKey(model.to_string(), entry.api_key_env.clone()))?;

        let body = build_request_body(model, messages, options, &entry.extra_params, entry.suppresses_temperature());

        let mut tracker = RetryTracker::new(RetryConfig::for_model(model));

        loop {
            if cancel.is_cancelled() {
                return Err(DispatchError::Cancelled {
                    model: model.to_string(),
                });
            }

            let _permit = self
                .semaphore
                .acquire()
                .await
                .map_err(|e| DispatchError::Transport(e.to_string()))?;

            let call_future = self.transport.send(&entry.base_url, &api_key, body.clone());

            let outcome = tokio::select! {
                result = tokio::time::timeout(self.per_call_timeout, call_future) => result,
                _ = cancel.cancelled() => {
                    return Err(DispatchError::Cancelled { model: model.to_string() });
                }
            };

            let transport_result = match outcome {
                Ok(inner) => inner,
                Err(_elapsed) => Err("request timed out".to_string()),
            };

            match transport_result {
                Ok(resp) if resp.status < 300 => {
                    return parse_success(model, &entry.provider_name, resp.body);
                }
                Ok(resp) => {
                    let body_text = resp.body.to_string();
                    match classify(Some(resp.status), &body_text) {
                        ErrorClass::RateLimit => {
                            tracker.record_rate_limit_attempt();
                            if tracker.rate_limit_budget_exhausted() {
                                return Err(DispatchError::RateLimitExhausted {
                                    model: model.to_string(),
                                    attempts: tracker.rate_limit_attempts(),
                                });
                            }
                            tokio::time::sleep(tracker.rate_limit_backoff()).await;
                        }
                        ErrorClass::Retryable => {
                            tracker.record_general_attempt();
                            if tracker.general_budget_exhausted() {
                                return Err(DispatchError::RetryExhausted {
                                    model: model.to_string(),
                                    attempts: tracker.general_attempts(),
                                    last_error: body_text,
                                });
                            }
                            tokio::time::sleep(tracker.general_backoff()).await;
                        }
                        ErrorClass::ContextOverflow => {
                            return Err(DispatchError::ContextOverflow {
                                model: model.to_string(),
                                message: body_text,
                            });
                        }
                        ErrorClass::MessageStructure => {
                            return Err(DispatchError::MessageStructure {
                                model: model.to_string(),
                                message: body_text,
                            });
                        }
                        ErrorClass::Fatal => {
                            return Err(DispatchError::Fatal {
                                model: model.to_string(),
                                message: body_text,
                            });
                        }
                    }
                }
                Err(transport_err) => match classify(None, &transport_err) {
                    ErrorClass::RateLimit => {
                        tracker.record_rate_limit_attempt();
                        if tracker.rate_limit_budget_exhausted() {
                            return Err(DispatchError::RateLimitExhausted {
                                model: model.to_string(),
                                attempts: tracker.rate_limit_attempts(),
                            });
                        }
                        tokio::time::sleep(tracker.rate_limit_backoff()).await;
                    }
                    _ => {
                        tracker.record_general_attempt();
                        if tracker.general_budget_exhausted() {
                            return Err(DispatchError::RetryExhausted {
                                model: model.to_string(),
                                attempts: tracker.general_attempts(),
                                last_error: transport_err,
                            });
                        }
                        tokio::time::sleep(tracker.general_backoff()).await;
                    }
                },
            }
        }
    }
}

fn build_request_body(
    model: &str,
    messages: &[Message],
    options: &CallOptions,
    extra_params: &std::collections::HashMap<String, Value>,
    suppress_temperature: bool,
) -> Value {
    let mut body = json!({
        "model": model,
        "messages": messages,
    });

    let obj = body.as_object_mut().expect("body is always an object");

    if let Some(max_tokens) = options.max_tokens {
        obj.insert("max_tokens".into(), json!(max_tokens));
    }
    if !suppress_temperature {
        if let Some(t) = options.temperature {
            obj.insert("temperature".into(), json!(t));
        }
    }
    if let Some(top_p) = options.top_p {
        obj.insert("top_p".into(), json!(top_p));
    }
    if let Some(tools) = &options.tools {
        obj.insert("tools".into(), json!(tools));
    }
    if let Some(choice) = &options.tool_choice {
        obj.insert("tool_choice".into(), json!(choice));
    }

    for (k, v) in extra_params {
        obj.insert(k.clone(), v.clone());
    }

    body
}

fn parse_success(
    model: &str,
    provider: &str,
    body: Value,
) -> Result<DispatchResponse, DispatchError> {
    let choice = body
        .get("choices")
        .and_then(|c| c.get(0))
        .cloned()
        .unwrap_or(json!({}));

    let message = choice.get("message").cloned().unwrap_or(json!({}));
    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string();

    let finish_reason = choice
        .get("finish_reason")
        .and_then(|f| f.as_str())
        .map(FinishReason::from_str)
        .unwrap_or(FinishReason::Other);

    let tool_calls: Vec<ToolCall> = message
        .get("tool_calls")
        .and_then(|tc| tc.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|tc| {
                    let id = tc.get("id")?.as_str()?.to_string();
                    let name = tc.get("function")?.get("name")?.as_str()?.to_string();
                    let args_str = tc
                        .get("function")?
                        .get("arguments")?
                        .as_str()
                        .unwrap_or("{}");
                    let arguments: Value =
                        serde_json::from_str(args_str).unwrap_or(json!({}));
                    Some(ToolCall {
                        id,
                        name,
                        arguments,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let reasoning_payload = message
        .get("reasoning_details")
        .or_else(|| message.get("reasoning"))
        .cloned()
        .map(crate::dispatch::types::ReasoningPayload);

    let usage = body.get("usage").cloned().unwrap_or(json!({}));
    let input_tokens = usage
        .get("prompt_tokens")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;
    let output_tokens = usage
        .get("completion_tokens")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;

    if finish_reason.is_truncation() {
        tracing::warn!(model, "response truncated (finish_reason=length)");
    }

    Ok(DispatchResponse {
        content,
        model: model.to_string(),
        provider: provider.to_string(),
        input_tokens,
        output_tokens,
        tool_calls,
        reasoning_payload,
        finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::types::CallOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedTransport {
        responses: std::sync::Mutex<Vec<Result<TransportResponse, String>>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(
            &self,
            _base_url: &str,
            _api_key: &str,
            _body: Value,
        ) -> Result<TransportResponse, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err("no more scripted responses".into());
            }
            responses.remove(0)
        }
    }

    fn success_body(content: &str) -> Value {
        json!({
            "choices": [{
                "message": {"content": content},
                "finish_reason": "stop",
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5},
        })
    }

    fn make_client(transport: ScriptedTransport) -> DispatchClient {
        std::env::set_var("TEST_API_KEY", "sk-test");
        let mut registry = ModelRegistry::new();
        registry.insert(
            "test-model",
            crate::dispatch::types::ModelEntry {
                provider_name: "test".into(),
                base_url: "https://example.invalid".into(),
                api_key_env: "TEST_API_KEY".into(),
                extra_params: Default::default(),
            },
        );
        DispatchClient::new(registry, 2).with_transport(Arc::new(transport))
    }

    #[tokio::test]
    async fn successful_call_returns_parsed_response() {
        let transport = ScriptedTransport {
            responses: std::sync::Mutex::new(vec![Ok(TransportResponse {
                status: 200,
                body: success_body("hello"),
            })]),
            calls: AtomicUsize::new(0),
        };
        let client = make_client(transport);
        let cancel = CancellationToken::new();
        let resp = client
            .call(
                "test-model",
                &[Message::user("hi")],
                &CallOptions::default(),
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(resp.content, "hello");
        assert_eq!(resp.input_tokens, 10);
    }

    #[tokio::test]
    async fn unknown_model_errors_immediately() {
        let transport = ScriptedTransport {
            responses: std::sync::Mutex::new(vec![]),
            calls: AtomicUsize::new(0),
        };
        let client = make_client(transport);
        let cancel = CancellationToken::new();
        let err = client
            .call(
                "does-not-exist",
                &[Message::user("hi")],
                &CallOptions::default(),
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnknownModel(_)));
    }

    #[tokio::test]
    async fn retries_retryable_then_succeeds() {
        let transport = ScriptedTransport {
            responses: std::sync::Mutex::new(vec![
                Ok(TransportResponse {
                    status: 503,
                    body: json!({"error": "service unavailable"}),
                }),
                Ok(TransportResponse {
                    status: 200,
                    body: success_body("recovered"),
                }),
            ]),
            calls: AtomicUsize::new(0),
        };
        let client = make_client(transport)
            .with_call_timeout(Duration::from_millis(500));
        let cancel = CancellationToken::new();
        let resp = client
            .call(
                "test-model",
                &[Message::user("hi")],
                &CallOptions::default(),
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(resp.content, "recovered");
    }

    #[tokio::test]
    async fn context_overflow_is_not_retried() {
        let transport = ScriptedTransport {
            responses: std::sync::Mutex::new(vec![Ok(TransportResponse {
                status: 400,
                body: json!({"error": "maximum context length exceeded, too many tokens"}),
            })]),
            calls: AtomicUsize::new(0),
        };
        let client = make_client(transport);
        let cancel = CancellationToken::new();
        let err = client
            .call(
                "test-model",
                &[Message::user("hi")],
                &CallOptions::default(),
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::ContextOverflow { .. }));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let transport = ScriptedTransport {
            responses: std::sync::Mutex::new(vec![]),
            calls: AtomicUsize::new(0),
        };
        let client = make_client(transport);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = client
            .call(
                "test-model",
                &[Message::user("hi")],
                &CallOptions::default(),
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Cancelled { .. }));
    }

    #[test]
    fn sonnet_extra_params_suppress_temperature_in_body() {
        let mut extra = std::collections::HashMap::new();
        extra.insert("thinking".to_string(), json!({"type": "enabled"}));
        let options = CallOptions {
            temperature: Some(0.7),
            ..Default::default()
        };
        let body = build_request_body(
            "anthropic/claude-sonnet-4.5",
            &[Message::user("hi")],
            &options,
            &extra,
            true,
        );
        assert!(body.get("temperature").is_none());
        assert!(body.get("thinking").is_some());
    }
}
