//! Top-level error types shared across subsystems.
//!
//! Each subsystem (dispatch, vfs, validator, tools, pipeline) defines its own
//! `thiserror` enum close to where it is produced; `EngineError` is the
//! umbrella type the pipeline driver surfaces to its caller.

use thiserror::Error;

use crate::dispatch::DispatchError;
use crate::pipeline::PipelineError;
use crate::tools::ToolError;
use crate::validator::ValidatorError;
use crate::vfs::VfsError;

/// Result alias used at crate boundaries.
pub type EngineResult<T> = Result<T, EngineError>;

/// Umbrella error surfaced by the pipeline driver.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("vfs error: {0}")]
    Vfs(#[from] VfsError),

    #[error("validator error: {0}")]
    Validator(#[from] ValidatorError),

    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("fatal configuration error: {message}")]
    FatalConfig { message: String },
}

impl EngineError {
    /// Fatal configuration errors (missing API key, invalid project root)
    /// are surfaced immediately with no commit attempted
    pub fn fatal_config(message: impl Into<String>) -> Self {
        Self::FatalConfig {
            message: message.into(),
        }
    }
}
