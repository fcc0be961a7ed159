//! Agent Pipeline (C7). Ties the Router, Pre-filter,
//! Orchestrator, Code Generator, structural editor, Change Validator, AI
//! Validator, and Feedback Loop Controller into the nine-step flow that
//! drives one [`session::RequestSession`] from a user request to a
//! [`types::SessionOutcome`].

pub mod ai_validator;
pub mod codegen;
pub mod driver;
pub mod prefilter;
pub mod session;
pub mod stager;
pub mod types;

use thiserror::Error;

pub use driver::{
    run_session, AutoConfirm, CompactIndexProvider, NullCompactIndex, Orchestrator,
    PipelineCollaborators, UserConfirmation,
};
pub use session::RequestSession;
pub use types::{CodeBlock, CodeBlockMode, PipelineInstruction, SessionOutcome};

/// Errors the driver can't route back into the feedback loop as a
/// revision and must surface to its caller instead "fatal
/// configuration errors are surfaced immediately with no commit attempted".
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("router/orchestrator dispatch failed: {0}")]
    Dispatch(#[from] crate::dispatch::DispatchError),

    #[error("vfs error: {0}")]
    Vfs(#[from] crate::vfs::VfsError),

    #[error("change validator error: {0}")]
    Validator(#[from] crate::validator::ValidatorError),

    #[error("tool error: {0}")]
    Tool(#[from] crate::tools::ToolError),

    #[error("orchestrator produced no instruction after exhausting its tool-call budget")]
    NoInstructionProduced,

    #[error("session was cancelled")]
    Cancelled,
}
