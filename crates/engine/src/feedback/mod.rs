//! Feedback Loop Controller (C6)
//!
//! Classifies feedback sources (validator vs. user vs. test vs. staging
//! error) and chooses the next action under retry budgets.

pub mod controller;
pub mod items;
pub mod loop_state;
pub mod staging_error;

pub use controller::{Decision, FeedbackLoopController};
pub use items::{FeedbackItem, FeedbackPayload, FeedbackPriority, FeedbackSource, UserAction};
pub use loop_state::{BudgetCounters, LoopState, LoopStatus, OrchestratorRevision, ValidationAttempt};
pub use staging_error::StagingErrorType;
