//! Shared compaction core. Both trigger paths
//! ([`super::proactive`], [`super::reactive`]) call through here so the
//! preservation rules stay in one place: the original request, the last
//! [`KEEP_LAST_K`] messages, and every code-bearing message are kept
//! verbatim; everything else is replaced by one abstract produced by a
//! dedicated cheap model, or by a blunt drop if that call itself fails.

use tokio_util::sync::CancellationToken;

use crate::dispatch::{CallOptions, DispatchClient, Message};

/// Messages at the tail of the conversation kept verbatim regardless of
/// compaction.
pub const KEEP_LAST_K: usize = 4;

/// Fraction of the model's context window a compaction targets.
pub const DEFAULT_TARGET_FRACTION: f32 = 0.5;

pub fn target_tokens(model_window: usize) -> usize {
    (model_window as f32 * DEFAULT_TARGET_FRACTION) as usize
}

/// Rough token estimate (chars/4), matching the heuristic used elsewhere in
/// the pipeline where a real tokenizer is an external collaborator.
pub fn estimate_tokens(messages: &[Message]) -> usize {
    messages.iter().map(|m| m.content.len() / 4).sum()
}

fn is_code_bearing(msg: &Message) -> bool {
    msg.content.contains("```") || msg.content.contains("FILE:")
}

/// Compact `messages` down, preserving the original request (message 0),
/// every code-bearing message, and the last `KEEP_LAST_K` messages; the
/// remaining "ordinary" middle is replaced by one system-message abstract
/// from `model`. Falls back to outright dropping the ordinary middle
/// (no abstract) if the summarization call fails.8 "fallback:
/// truncate oldest non-code messages on compressor failure".
pub async fn compress(
    client: &DispatchClient,
    model: &str,
    messages: &[Message],
    cancel: &CancellationToken,
) -> Vec<Message> {
    if messages.len() <= KEEP_LAST_K + 1 {
        return messages.to_vec();
    }

    let original_request = messages[0].clone();
    let tail_start = messages.len() - KEEP_LAST_K.min(messages.len() - 1);
    let middle = &messages[1..tail_start];
    let tail = &messages[tail_start..];

    let (code_bearing, ordinary): (Vec<&Message>, Vec<&Message>) =
        middle.iter().partition(|m| is_code_bearing(m));

    let mut out = Vec::with_capacity(messages.len());
    out.push(original_request);

    if !ordinary.is_empty() {
        let joined = ordinary
            .iter()
            .map(|m| format!("[{}] {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");
        let summarize_messages = vec![
            Message::system("Summarize the following conversation excerpt in a few sentences, preserving any decisions made and constraints discovered."),
            Message::user(joined),
        ];
        match client.call(model, &summarize_messages, &CallOptions::default(), cancel).await {
            Ok(resp) => out.push(Message::system(format!(
                "[compressed context abstract]\n{}",
                resp.content
            ))),
            Err(err) => {
                tracing::warn!(error = %err, "context compression summarizer call failed, truncating instead");
                out.push(Message::system(
                    "[context truncated: earlier non-code messages dropped after a compression failure]",
                ));
            }
        }
    }

    out.extend(code_bearing.into_iter().cloned());
    out.extend(tail.iter().cloned());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Arc;

    use crate::dispatch::{ModelRegistry, Transport, TransportResponse};

    struct StubTransport {
        content: String,
        fail: bool,
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn send(&self, _base_url: &str, _api_key: &str, _body: Value) -> Result<TransportResponse, String> {
            if self.fail {
                return Err("boom".into());
            }
            Ok(TransportResponse {
                status: 200,
                body: json!({
                    "choices": [{"message": {"content": self.content}, "finish_reason": "stop"}],
                    "usage": {"prompt_tokens": 1, "completion_tokens": 1},
                }),
            })
        }
    }

    fn client(transport: StubTransport) -> DispatchClient {
        std::env::set_var("CC_TEST_KEY", "sk-test");
        let mut registry = ModelRegistry::new();
        registry.insert(
            "cheap-model",
            crate::dispatch::types::ModelEntry {
                provider_name: "test".into(),
                base_url: "https://example.invalid".into(),
                api_key_env: "CC_TEST_KEY".into(),
                extra_params: Default::default(),
            },
        );
        DispatchClient::new(registry, 2).with_transport(Arc::new(transport))
    }

    fn long_conversation() -> Vec<Message> {
        vec![
            Message::user("original request: add logging"),
            Message::assistant("exploring the codebase"),
            Message::user("here is a file:\n```python\ndef f(): pass\n```"),
            Message::assistant("still exploring"),
            Message::user("more exploration notes"),
            Message::assistant("tail-3"),
            Message::user("tail-2"),
            Message::assistant("tail-1"),
            Message::user("tail-0"),
        ]
    }

    #[tokio::test]
    async fn short_conversations_pass_through_unchanged() {
        let c = client(StubTransport { content: "summary".into(), fail: false });
        let cancel = CancellationToken::new();
        let messages = vec![Message::user("a"), Message::assistant("b")];
        let out = compress(&c, "cheap-model", &messages, &cancel).await;
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn keeps_original_request_code_blocks_and_tail() {
        let c = client(StubTransport { content: "summary of exploration".into(), fail: false });
        let cancel = CancellationToken::new();
        let messages = long_conversation();
        let out = compress(&c, "cheap-model", &messages, &cancel).await;

        assert_eq!(out[0].content, messages[0].content);
        assert!(out.iter().any(|m| m.content.contains("```python")));
        assert!(out.iter().any(|m| m.content.contains("summary of exploration")));
        assert_eq!(out[out.len() - 1].content, "tail-0");
        assert!(out.len() < messages.len());
    }

    #[tokio::test]
    async fn summarizer_failure_falls_back_to_a_truncation_marker() {
        let c = client(StubTransport { content: String::new(), fail: true });
        let cancel = CancellationToken::new();
        let messages = long_conversation();
        let out = compress(&c, "cheap-model", &messages, &cancel).await;
        assert!(out.iter().any(|m| m.content.contains("context truncated")));
    }
}
