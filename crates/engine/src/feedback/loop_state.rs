//! `LoopState` and its constituents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::items::FeedbackItem;
use crate::validator::ValidationResult;

/// The Feedback Loop Controller's state diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopStatus {
    AwaitingOrchestrator,
    Generating,
    Staging,
    Validating,
    AiValidating,
    Accepted,
    Feedback,
    Revise,
    EscalateToUser,
    Exhausted,
    Cancelled,
}

/// One orchestrator production, recorded for the session trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorRevision {
    pub revision_no: u32,
    pub instruction_summary: String,
    pub timestamp: DateTime<Utc>,
}

/// One run of the validator pipeline against a staged attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationAttempt {
    pub attempt_no: u32,
    pub result: ValidationResult,
    pub timestamp: DateTime<Utc>,
}

/// Per-session budget counters: these only ever increase within a session.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BudgetCounters {
    pub validator_retries: u32,
    pub orchestrator_revisions: u32,
    pub test_runs: u32,
}

/// `LoopState`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopState {
    pub status: LoopStatus,
    pub attempt_no: u32,
    pub revisions: Vec<OrchestratorRevision>,
    pub validations: Vec<ValidationAttempt>,
    pub feedback_trail: Vec<FeedbackItem>,
    pub budgets: BudgetCounters,
    pub exhausted_reason: Option<String>,
}

impl LoopState {
    pub fn new() -> Self {
        Self {
            status: LoopStatus::AwaitingOrchestrator,
            attempt_no: 0,
            revisions: Vec::new(),
            validations: Vec::new(),
            feedback_trail: Vec::new(),
            budgets: BudgetCounters::default(),
            exhausted_reason: None,
        }
    }

    pub fn push_revision(&mut self, instruction_summary: impl Into<String>, timestamp: DateTime<Utc>) {
        self.attempt_no += 1;
        self.revisions.push(OrchestratorRevision {
            revision_no: self.revisions.len() as u32 + 1,
            instruction_summary: instruction_summary.into(),
            timestamp,
        });
    }

    pub fn push_validation(&mut self, result: ValidationResult, timestamp: DateTime<Utc>) {
        self.validations.push(ValidationAttempt {
            attempt_no: self.attempt_no,
            result,
            timestamp,
        });
    }

    pub fn push_feedback(&mut self, item: FeedbackItem) {
        self.feedback_trail.push(item);
    }

    pub fn exhaust(&mut self, reason: impl Into<String>) {
        self.status = LoopStatus::Exhausted;
        self.exhausted_reason = Some(reason.into());
    }
}

impl Default for LoopState {
    fn default() -> Self {
        Self::new()
    }
}
