//! Change Validator (C4)
//!
//! Runs ordered levels (syntax → imports → types → integration → runtime →
//! tests) against the VFS. `syntax` is the only blocking level: a syntax
//! failure causes every later level to be explicitly marked "skipped due
//! to syntax" rather than silently dropped .

pub mod imports;
pub mod integration;
pub mod issue;
pub mod pipeline;
pub mod runtime_level;
pub mod syntax;
pub mod tests_level;
pub mod types_level;

use thiserror::Error;

pub use issue::{IssueSeverity, LevelOutcome, ValidationIssue, ValidationLevel, ValidationResult};
pub use pipeline::ValidatorPipeline;

#[derive(Error, Debug)]
pub enum ValidatorError {
    #[error("vfs error during validation: {0}")]
    Vfs(#[from] crate::vfs::VfsError),

    #[error("io error materializing affected set: {0}")]
    Io(#[from] std::io::Error),
}
