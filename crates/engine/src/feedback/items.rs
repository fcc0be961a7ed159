//! Feedback items
//!
//! The source-specific payload types (`ValidatorFeedback`, `UserFeedback`,
//! `TestErrorFeedback`, `StagingErrorFeedback`) are represented as one
//! tagged union discriminated by `source`, rather than a class hierarchy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::staging_error::StagingErrorType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackSource {
    Validator,
    User,
    TestError,
    SyntaxError,
    TestRun,
    StagingError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// Action the user takes at `UserConfirm` when a validator's critique is
/// still outstanding (escalated rather than silently dropped).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    /// Cancel the entire request; nothing is committed.
    CancelRequest,
    /// Reject the validator's critique outright and proceed to commit.
    OverrideValidator,
    /// Replace the validator's critique with the user's own and revise.
    ReplaceCritique,
    /// Accept the validator's critique as-is and revise.
    AcceptCritique,
}

/// Tagged union replacing the original class hierarchy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum FeedbackPayload {
    Validator {
        approved: bool,
        confidence: f32,
        verdict: String,
        critical_issues: Vec<String>,
        model_used: String,
        orchestrator_accepted: Option<bool>,
        orchestrator_reasoning: Option<String>,
    },
    User {
        message: String,
        replaces_validator: bool,
    },
    TestError {
        test_type: String,
        error_message: String,
        traceback: Option<String>,
        file_path: Option<String>,
    },
    StagingError {
        file_path: String,
        mode: String,
        error: String,
        error_type: StagingErrorType,
        target_class: Option<String>,
        target_method: Option<String>,
        target_function: Option<String>,
    },
    SyntaxError {
        file_path: String,
        message: String,
    },
    TestRun {
        test_path: String,
        passed: bool,
        summary: String,
    },
}

impl FeedbackPayload {
    pub fn source(&self) -> FeedbackSource {
        match self {
            FeedbackPayload::Validator { .. } => FeedbackSource::Validator,
            FeedbackPayload::User { .. } => FeedbackSource::User,
            FeedbackPayload::TestError { .. } => FeedbackSource::TestError,
            FeedbackPayload::StagingError { .. } => FeedbackSource::StagingError,
            FeedbackPayload::SyntaxError { .. } => FeedbackSource::SyntaxError,
            FeedbackPayload::TestRun { .. } => FeedbackSource::TestRun,
        }
    }

    /// Default priority by source.6: syntax=critical, user=high,
    /// validator=medium, test_run=high, staging errors ride along as
    /// medium (they're free, not urgent).
    pub fn default_priority(&self) -> FeedbackPriority {
        match self {
            FeedbackPayload::SyntaxError { .. } => FeedbackPriority::Critical,
            FeedbackPayload::User { .. } => FeedbackPriority::High,
            FeedbackPayload::TestRun { .. } => FeedbackPriority::High,
            FeedbackPayload::TestError { .. } => FeedbackPriority::High,
            FeedbackPayload::Validator { .. } => FeedbackPriority::Medium,
            FeedbackPayload::StagingError { .. } => FeedbackPriority::Medium,
        }
    }

    /// Renders the orchestrator-facing prompt section for this payload —
    /// grounded on each variant's `to_prompt_format` in the original.
    pub fn to_prompt_format(&self) -> String {
        match self {
            FeedbackPayload::Validator {
                approved,
                confidence,
                verdict,
                critical_issues,
                ..
            } => {
                let mut out = String::new();
                out.push_str("AI VALIDATOR FEEDBACK (source: validator)\n");
                out.push_str(&format!(
                    "status: {}\nconfidence: {:.0}%\nverdict: {verdict}\n",
                    if *approved { "approved" } else { "rejected" },
                    confidence * 100.0
                ));
                if !critical_issues.is_empty() {
                    out.push_str("critical issues:\n");
                    for (i, issue) in critical_issues.iter().enumerate() {
                        out.push_str(&format!("  {}. {issue}\n", i + 1));
                    }
                }
                out.push_str("options: accept critique and revise, or override with reasoning.\n");
                out
            }
            FeedbackPayload::User {
                message,
                replaces_validator,
            } => {
                let mut out = String::new();
                out.push_str("USER FEEDBACK (source: user — mandatory)\n");
                out.push_str(&format!("message: {message}\n"));
                if *replaces_validator {
                    out.push_str("this feedback replaces the validator's critique.\n");
                }
                out.push_str(
                    "required action: you must address this feedback. if you disagree, attempt the request anyway and record your concerns.\n",
                );
                out
            }
            FeedbackPayload::TestError {
                test_type,
                error_message,
                traceback,
                file_path,
            } => {
                let mut out = String::new();
                out.push_str(&format!("TEST ERROR (type: {test_type})\n"));
                if let Some(f) = file_path {
                    out.push_str(&format!("file: {f}\n"));
                }
                out.push_str(&format!("error: {error_message}\n"));
                if let Some(tb) = traceback {
                    out.push_str(&format!("traceback:\n{tb}\n"));
                }
                out.push_str("required action: identify root cause, check for similar issues elsewhere, revise.\n");
                out
            }
            FeedbackPayload::StagingError { .. } => super::staging_error::to_prompt_format(self),
            FeedbackPayload::SyntaxError { file_path, message } => {
                format!("SYNTAX ERROR\nfile: {file_path}\n{message}\nrequired action: fix the syntax before anything else runs.\n")
            }
            FeedbackPayload::TestRun {
                test_path,
                passed,
                summary,
            } => format!(
                "TEST RUN (path: {test_path})\npassed: {passed}\n{summary}\n"
            ),
        }
    }
}

/// One feedback event with source/priority tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub source: FeedbackSource,
    pub priority: FeedbackPriority,
    pub payload: FeedbackPayload,
    pub timestamp: DateTime<Utc>,
    /// True for user feedback: the orchestrator must explain its decision
    /// regardless of whether it complies.
    pub requires_response: bool,
}

impl FeedbackItem {
    pub fn new(payload: FeedbackPayload, timestamp: DateTime<Utc>) -> Self {
        let source = payload.source();
        let priority = payload.default_priority();
        let requires_response = matches!(source, FeedbackSource::User);
        Self {
            source,
            priority,
            payload,
            timestamp,
            requires_response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn syntax_error_defaults_to_critical_priority() {
        let item = FeedbackItem::new(
            FeedbackPayload::SyntaxError {
                file_path: "a.py".into(),
                message: "bad indent".into(),
            },
            ts(),
        );
        assert_eq!(item.priority, FeedbackPriority::Critical);
        assert!(!item.requires_response);
    }

    #[test]
    fn user_feedback_requires_response_and_is_high_priority() {
        let item = FeedbackItem::new(
            FeedbackPayload::User {
                message: "do it differently".into(),
                replaces_validator: false,
            },
            ts(),
        );
        assert_eq!(item.priority, FeedbackPriority::High);
        assert!(item.requires_response);
    }

    #[test]
    fn validator_feedback_prompt_mentions_both_options() {
        let payload = FeedbackPayload::Validator {
            approved: false,
            confidence: 0.8,
            verdict: "missing error handling".into(),
            critical_issues: vec!["no None check".into()],
            model_used: "m".into(),
            orchestrator_accepted: None,
            orchestrator_reasoning: None,
        };
        let rendered = payload.to_prompt_format();
        assert!(rendered.contains("accept critique"));
        assert!(rendered.contains("override"));
    }

    #[test]
    fn priority_ordering_places_critical_above_low() {
        assert!(FeedbackPriority::Critical > FeedbackPriority::Low);
    }
}
