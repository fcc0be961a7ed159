//! Proactive compression.8: checked before every dispatch call,
//! fires once the running conversation exceeds the target size for the
//! model about to be called, independent of whether a call has actually
//! overflowed yet.

use tokio_util::sync::CancellationToken;

use crate::dispatch::{DispatchClient, Message};

use super::core::{compress, estimate_tokens, target_tokens};

/// Whether the running conversation should be compacted before the next
/// call against a model with the given context window.
pub fn should_compress(messages: &[Message], model_window: usize) -> bool {
    estimate_tokens(messages) > target_tokens(model_window)
}

/// Compress `messages` if they exceed the proactive threshold for
/// `model_window`; otherwise return them unchanged.
pub async fn maybe_compress(
    client: &DispatchClient,
    summarizer_model: &str,
    messages: &[Message],
    model_window: usize,
    cancel: &CancellationToken,
) -> Vec<Message> {
    if should_compress(messages, model_window) {
        tracing::info!(model_window, "proactively compressing session context");
        compress(client, summarizer_model, messages, cancel).await
    } else {
        messages.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_conversation_under_threshold_is_not_compressed() {
        let messages = vec![Message::user("hi")];
        assert!(!should_compress(&messages, 100_000));
    }

    #[test]
    fn conversation_over_half_the_window_triggers_compression() {
        let big_content = "x".repeat(400_000);
        let messages = vec![Message::user(big_content)];
        assert!(should_compress(&messages, 100_000));
    }
}
