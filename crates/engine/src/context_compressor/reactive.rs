//! Reactive compression.8: unlike [`super::proactive`], this
//! path never checks a threshold itself. It only runs once the caller has
//! already observed a `context_overflow` classification from a dispatch
//! call, at which point compaction is unconditional — the
//! conversation must shrink before the next retry regardless of estimate.

use tokio_util::sync::CancellationToken;

use crate::dispatch::{DispatchClient, DispatchError, Message};

use super::core::compress;

/// True only for the error class this path reacts to.
pub fn is_context_overflow(err: &DispatchError) -> bool {
    matches!(err, DispatchError::ContextOverflow { .. })
}

/// Unconditionally compact `messages` in response to an observed
/// context-overflow error.
pub async fn compress_after_overflow(
    client: &DispatchClient,
    summarizer_model: &str,
    messages: &[Message],
    cancel: &CancellationToken,
) -> Vec<Message> {
    tracing::warn!("reactively compressing session context after a context_overflow error");
    compress(client, summarizer_model, messages, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_context_overflow_triggers_the_reactive_path() {
        assert!(is_context_overflow(&DispatchError::ContextOverflow {
            model: "m".into(),
            message: "too long".into(),
        }));
        assert!(!is_context_overflow(&DispatchError::Fatal {
            model: "m".into(),
            message: "nope".into(),
        }));
    }
}
