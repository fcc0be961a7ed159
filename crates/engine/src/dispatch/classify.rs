//! Error classification for LLM dispatch failures
//!
//! Case-insensitive pattern match against the HTTP status and the
//! response/error body text, mirroring the retry taxonomy every other
//! subsystem in this codebase builds around (`router::circuit_breaker`,
//! `feedback::correction_loop`).

/// The five failure classes a dispatch call can fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 429 or "rate limit" text — retried with its own independent budget.
    RateLimit,
    /// 5xx, network reset, DNS failure, upstream overload — exponential backoff.
    Retryable,
    /// Context/token-limit text — not retried locally, surfaced for C8.
    ContextOverflow,
    /// Missing reasoning artifact / malformed parts — not retried, message repaired.
    MessageStructure,
    /// Anything else — not retried.
    Fatal,
}

impl ErrorClass {
    pub fn is_retryable_at_all(&self) -> bool {
        matches!(self, ErrorClass::RateLimit | ErrorClass::Retryable)
    }
}

const RATE_LIMIT_PATTERNS: &[&str] = &["rate limit", "too many requests"];
const RETRYABLE_PATTERNS: &[&str] = &[
    "internal server error",
    "bad gateway",
    "service unavailable",
    "gateway timeout",
    "connection reset",
    "connection refused",
    "dns",
    "name resolution",
    "upstream overload",
    "overloaded",
    "timed out",
    "timeout",
];
const CONTEXT_OVERFLOW_PATTERNS: &[&str] = &[
    "context length",
    "token limit",
    "too many tokens",
    "maximum context",
];
const MESSAGE_STRUCTURE_PATTERNS: &[&str] = &[
    "missing reasoning",
    "malformed content part",
    "invalid message structure",
    "thought signature",
];

/// Classify a dispatch failure from its HTTP status code (if any) and body text.
pub fn classify(status: Option<u16>, body: &str) -> ErrorClass {
    let lower = body.to_ascii_lowercase();

    if status == Some(429) || contains_any(&lower, RATE_LIMIT_PATTERNS) {
        return ErrorClass::RateLimit;
    }

    if contains_any(&lower, CONTEXT_OVERFLOW_PATTERNS) {
        return ErrorClass::ContextOverflow;
    }

    if contains_any(&lower, MESSAGE_STRUCTURE_PATTERNS) {
        return ErrorClass::MessageStructure;
    }

    let is_5xx = status.map(|s| (500..600).contains(&s)).unwrap_or(false);
    if is_5xx || contains_any(&lower, RETRYABLE_PATTERNS) {
        return ErrorClass::Retryable;
    }

    ErrorClass::Fatal
}

fn contains_any(haystack: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| haystack.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_429_as_rate_limit() {
        assert_eq!(classify(Some(429), "too many requests"), ErrorClass::RateLimit);
    }

    #[test]
    fn classifies_rate_limit_text_without_status() {
        assert_eq!(classify(None, "Rate Limit Exceeded"), ErrorClass::RateLimit);
    }

    #[test]
    fn classifies_5xx_as_retryable() {
        assert_eq!(classify(Some(503), "service down"), ErrorClass::Retryable);
    }

    #[test]
    fn classifies_network_text_as_retryable() {
        assert_eq!(
            classify(None, "Connection reset by peer"),
            ErrorClass::Retryable
        );
    }

    #[test]
    fn classifies_context_overflow() {
        assert_eq!(
            classify(Some(400), "This model's maximum context length is 128000 tokens"),
            ErrorClass::ContextOverflow
        );
    }

    #[test]
    fn classifies_message_structure() {
        assert_eq!(
            classify(Some(400), "Missing reasoning item for tool call"),
            ErrorClass::MessageStructure
        );
    }

    #[test]
    fn classifies_unknown_as_fatal() {
        assert_eq!(classify(Some(401), "invalid api key"), ErrorClass::Fatal);
        assert!(!ErrorClass::Fatal.is_retryable_at_all());
    }

    #[test]
    fn rate_limit_and_retryable_are_retryable_at_all() {
        assert!(ErrorClass::RateLimit.is_retryable_at_all());
        assert!(ErrorClass::Retryable.is_retryable_at_all());
        assert!(!ErrorClass::ContextOverflow.is_retryable_at_all());
    }
}
