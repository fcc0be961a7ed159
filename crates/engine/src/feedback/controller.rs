//! Feedback Loop Controller (C6)
//!
//! Tracks attempts, revisions, and feedback items; decides the next
//! transition under retry budgets. Staging errors never consume the
//! orchestrator-revision budget ; budgets never decrease ;
//! `Exhausted` is reached exactly when some budget equals its cap.

use chrono::{DateTime, Utc};

use super::items::{FeedbackItem, FeedbackPayload, UserAction};
use super::loop_state::{LoopState, LoopStatus};
use super::staging_error::StagingErrorType;
use crate::validator::{ValidationLevel, ValidationResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Revise,
    Accepted,
    EscalateToUser,
    Exhausted(String),
    Cancelled,
}

/// Budget caps, configured via `max_validator_retries`,
/// `max_orchestrator_revisions`, `max_test_runs_per_session`.
pub struct FeedbackLoopController {
    pub max_validator_retries: u32,
    pub max_orchestrator_revisions: u32,
    pub max_test_runs_per_session: u32,
}

impl FeedbackLoopController {
    pub fn new(max_validator_retries: u32, max_orchestrator_revisions: u32, max_test_runs_per_session: u32) -> Self {
        Self {
            max_validator_retries,
            max_orchestrator_revisions,
            max_test_runs_per_session,
        }
    }

    /// Begin a new orchestrator revision — consumes `max_orchestrator_revisions`.
    pub fn begin_revision(
        &self,
        state: &mut LoopState,
        instruction_summary: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Decision {
        if state.budgets.orchestrator_revisions >= self.max_orchestrator_revisions {
            state.exhaust("max_orchestrator_revisions reached");
            return Decision::Exhausted("max_orchestrator_revisions reached".to_string());
        }
        state.budgets.orchestrator_revisions += 1;
        state.push_revision(instruction_summary, now);
        state.status = LoopStatus::Generating;
        Decision::Revise
    }

    /// Submit a `Change Validator` result (syntax-failure path consumes
    /// `max_validator_retries`; other-level failures also consume it since
    /// ties both to the same retry budget, unlike staging
    /// errors which are free).
    ///
    /// Non-syntax failures may be overridden by the orchestrator with a
    /// recorded justification , in which case the loop
    /// proceeds to `AIValidating` instead of revising. Syntax is blocking
    /// and can never be overridden: `orchestrator_override_reasoning` is
    /// ignored when `levels_failed` contains `syntax`.
    pub fn submit_validation(
        &self,
        state: &mut LoopState,
        result: ValidationResult,
        orchestrator_override_reasoning: Option<String>,
        now: DateTime<Utc>,
    ) -> Decision {
        let success = result.success();
        let syntax_failed = result.levels_failed.contains(&ValidationLevel::Syntax);
        let issues: Vec<String> = result.issues.iter().map(|i| i.message.clone()).collect();
        state.push_validation(result, now);

        if success {
            state.status = LoopStatus::AiValidating;
            return Decision::Accepted;
        }

        if !syntax_failed && orchestrator_override_reasoning.is_some() {
            let payload = FeedbackPayload::Validator {
                approved: false,
                confidence: 1.0,
                verdict: "change validator reported errors".to_string(),
                critical_issues: issues,
                model_used: "programmatic".to_string(),
                orchestrator_accepted: Some(false),
                orchestrator_reasoning: orchestrator_override_reasoning,
            };
            state.push_feedback(FeedbackItem::new(payload, now));
            state.status = LoopStatus::AiValidating;
            return Decision::Accepted;
        }

        let payload = if syntax_failed {
            FeedbackPayload::SyntaxError {
                file_path: issues.first().cloned().unwrap_or_default(),
                message: issues.join("; "),
            }
        } else {
            FeedbackPayload::Validator {
                approved: false,
                confidence: 1.0,
                verdict: "change validator reported errors".to_string(),
                critical_issues: issues,
                model_used: "programmatic".to_string(),
                orchestrator_accepted: None,
                orchestrator_reasoning: None,
            }
        };
        state.push_feedback(FeedbackItem::new(payload, now));

        state.budgets.validator_retries += 1;
        if state.budgets.validator_retries >= self.max_validator_retries {
            state.exhaust("max_validator_retries reached");
            return Decision::Exhausted("max_validator_retries reached".to_string());
        }
        state.status = LoopStatus::Feedback;
        Decision::Revise
    }

    /// AI validator verdict — orchestrator may accept the rejection
    /// (Revise) or override it with recorded reasoning (proceeds as if
    /// accepted). Consumes `max_validator_retries` only on the Revise path.
    pub fn submit_ai_validator(
        &self,
        state: &mut LoopState,
        approved: bool,
        confidence: f32,
        verdict: impl Into<String>,
        critical_issues: Vec<String>,
        model_used: impl Into<String>,
        orchestrator_override_reasoning: Option<String>,
        now: DateTime<Utc>,
    ) -> Decision {
        // true when the orchestrator went along with the verdict as given;
        // false when it overrode the verdict with its own reasoning.
        let orchestrator_accepted = Some(orchestrator_override_reasoning.is_none());
        let payload = FeedbackPayload::Validator {
            approved,
            confidence,
            verdict: verdict.into(),
            critical_issues,
            model_used: model_used.into(),
            orchestrator_accepted,
            orchestrator_reasoning: orchestrator_override_reasoning.clone(),
        };
        state.push_feedback(FeedbackItem::new(payload, now));

        if approved || orchestrator_override_reasoning.is_some() {
            state.status = LoopStatus::Accepted;
            return Decision::Accepted;
        }

        state.budgets.validator_retries += 1;
        if state.budgets.validator_retries >= self.max_validator_retries {
            state.exhaust("max_validator_retries reached");
            return Decision::Exhausted("max_validator_retries reached".to_string());
        }
        state.status = LoopStatus::Feedback;
        Decision::Revise
    }

    /// Staging errors are free . Always routes back to
    /// `Feedback`/revision without touching any budget.
    pub fn record_staging_error(
        &self,
        state: &mut LoopState,
        file_path: impl Into<String>,
        mode: impl Into<String>,
        error: impl Into<String>,
        error_type: StagingErrorType,
        target_class: Option<String>,
        target_method: Option<String>,
        target_function: Option<String>,
        now: DateTime<Utc>,
    ) -> Decision {
        let payload = FeedbackPayload::StagingError {
            file_path: file_path.into(),
            mode: mode.into(),
            error: error.into(),
            error_type,
            target_class,
            target_method,
            target_function,
        };
        state.push_feedback(FeedbackItem::new(payload, now));
        state.status = LoopStatus::Feedback;
        Decision::Revise
    }

    /// User feedback during `UserConfirm` — always high priority, must be
    /// acted on, never consumes a budget itself.
    pub fn record_user_feedback(
        &self,
        state: &mut LoopState,
        message: impl Into<String>,
        replaces_validator: bool,
        now: DateTime<Utc>,
    ) -> Decision {
        let payload = FeedbackPayload::User {
            message: message.into(),
            replaces_validator,
        };
        state.push_feedback(FeedbackItem::new(payload, now));
        state.status = LoopStatus::Feedback;
        Decision::Revise
    }

    /// `run_project_tests` tool usage — consumes `max_test_runs_per_session`
    /// at the call site (the tool itself enforces this budget);
    /// the controller only records the resulting feedback and routes.
    pub fn record_test_run(
        &self,
        state: &mut LoopState,
        test_path: impl Into<String>,
        passed: bool,
        summary: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Decision {
        state.budgets.test_runs += 1;
        let payload = FeedbackPayload::TestRun {
            test_path: test_path.into(),
            passed,
            summary: summary.into(),
        };
        state.push_feedback(FeedbackItem::new(payload, now));

        if passed {
            state.status = LoopStatus::Accepted;
            Decision::Accepted
        } else if state.budgets.test_runs >= self.max_test_runs_per_session {
            state.exhaust("max_test_runs_per_session reached");
            Decision::Exhausted("max_test_runs_per_session reached".to_string())
        } else {
            state.status = LoopStatus::Feedback;
            Decision::Revise
        }
    }

    /// A runtime smoke check (Runtime Tester, C5) or other post-staging
    /// failure not caught by the Change Validator — drives a revision the
    /// same way a validator failure does.
    pub fn record_test_error(
        &self,
        state: &mut LoopState,
        test_type: impl Into<String>,
        error_message: impl Into<String>,
        traceback: Option<String>,
        file_path: Option<String>,
        now: DateTime<Utc>,
    ) -> Decision {
        let payload = FeedbackPayload::TestError {
            test_type: test_type.into(),
            error_message: error_message.into(),
            traceback,
            file_path,
        };
        state.push_feedback(FeedbackItem::new(payload, now));

        state.budgets.validator_retries += 1;
        if state.budgets.validator_retries >= self.max_validator_retries {
            state.exhaust("max_validator_retries reached");
            return Decision::Exhausted("max_validator_retries reached".to_string());
        }
        state.status = LoopStatus::Feedback;
        Decision::Revise
    }

    /// The user's choice once a validator critique has been escalated to
    /// them at `UserConfirm` . Never touches a budget:
    /// the user's decision isn't a retry, it's the final word.
    pub fn apply_user_action(
        &self,
        state: &mut LoopState,
        action: UserAction,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Decision {
        let message = message.into();
        match action {
            UserAction::CancelRequest => {
                state.push_feedback(FeedbackItem::new(
                    FeedbackPayload::User {
                        message,
                        replaces_validator: false,
                    },
                    now,
                ));
                state.status = LoopStatus::Cancelled;
                Decision::Cancelled
            }
            UserAction::OverrideValidator => {
                state.push_feedback(FeedbackItem::new(
                    FeedbackPayload::User {
                        message,
                        replaces_validator: false,
                    },
                    now,
                ));
                state.status = LoopStatus::Accepted;
                Decision::Accepted
            }
            UserAction::ReplaceCritique => {
                state.push_feedback(FeedbackItem::new(
                    FeedbackPayload::User {
                        message,
                        replaces_validator: true,
                    },
                    now,
                ));
                state.status = LoopStatus::Feedback;
                Decision::Revise
            }
            UserAction::AcceptCritique => {
                state.push_feedback(FeedbackItem::new(
                    FeedbackPayload::User {
                        message,
                        replaces_validator: false,
                    },
                    now,
                ));
                state.status = LoopStatus::Feedback;
                Decision::Revise
            }
        }
    }
}
