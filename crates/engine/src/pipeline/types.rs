//! Core data types for the Agent Pipeline (C7)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchError;
use crate::router::RouterTier;
use crate::vfs::CommitResult;

/// A single staged code-modification unit produced by the Code Generator —
/// `CodeBlock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeBlockMode {
    ReplaceFile,
    ReplaceClass,
    ReplaceMethod,
    ReplaceFunction,
    AddMethod,
    AddFunction,
    AddClass,
    InsertImport,
    AppendFile,
}

impl CodeBlockMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReplaceFile => "REPLACE_FILE",
            Self::ReplaceClass => "REPLACE_CLASS",
            Self::ReplaceMethod => "REPLACE_METHOD",
            Self::ReplaceFunction => "REPLACE_FUNCTION",
            Self::AddMethod => "ADD_METHOD",
            Self::AddFunction => "ADD_FUNCTION",
            Self::AddClass => "ADD_CLASS",
            Self::InsertImport => "INSERT_IMPORT",
            Self::AppendFile => "APPEND_FILE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "REPLACE_FILE" => Some(Self::ReplaceFile),
            "REPLACE_CLASS" => Some(Self::ReplaceClass),
            "REPLACE_METHOD" => Some(Self::ReplaceMethod),
            "REPLACE_FUNCTION" => Some(Self::ReplaceFunction),
            "ADD_METHOD" => Some(Self::AddMethod),
            "ADD_FUNCTION" => Some(Self::AddFunction),
            "ADD_CLASS" => Some(Self::AddClass),
            "INSERT_IMPORT" => Some(Self::InsertImport),
            "APPEND_FILE" => Some(Self::AppendFile),
            _ => None,
        }
    }

    /// Whether this mode needs `target_class` "mode's required
    /// targets must be present".
    pub fn requires_class(&self) -> bool {
        matches!(self, Self::ReplaceClass | Self::ReplaceMethod | Self::AddMethod)
    }

    pub fn requires_method(&self) -> bool {
        matches!(self, Self::ReplaceMethod)
    }

    pub fn requires_function(&self) -> bool {
        matches!(self, Self::ReplaceFunction)
    }
}

/// Output unit of the Code Generator `CodeBlock`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeBlock {
    pub id: String,
    pub file_path: String,
    pub mode: CodeBlockMode,
    pub target_class: Option<String>,
    pub target_method: Option<String>,
    pub target_function: Option<String>,
    pub insert_pattern: Option<String>,
    pub source: String,
    /// Indentation detected at the generator, in spaces; used when the
    /// source needs re-indenting to fit its insertion point.
    pub indent_hint: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInvariantError(pub String);

impl std::fmt::Display for BlockInvariantError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl CodeBlock {
    /// Check the mode's required-targets invariant. Does not
    /// check that the source parses standalone; that is the structural
    /// editor's job since it needs the target file's content.
    pub fn check_invariants(&self) -> Result<(), BlockInvariantError> {
        if self.mode.requires_class() && self.target_class.is_none() {
            return Err(BlockInvariantError(format!(
                "{} requires target_class",
                self.mode.as_str()
            )));
        }
        if self.mode.requires_method() && self.target_method.is_none() {
            return Err(BlockInvariantError(format!(
                "{} requires target_method",
                self.mode.as_str()
            )));
        }
        if self.mode.requires_function() && self.target_function.is_none() {
            return Err(BlockInvariantError(format!(
                "{} requires target_function",
                self.mode.as_str()
            )));
        }
        if self.source.trim().is_empty() && !matches!(self.mode, CodeBlockMode::InsertImport) {
            return Err(BlockInvariantError("source text must not be empty".to_string()));
        }
        Ok(())
    }
}

/// One tool call made by the orchestrator while deriving an instruction —
/// "the tool-call trace used to derive it".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolTraceEntry {
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub result_summary: String,
}

/// Output of the orchestrator `PipelineInstruction`. Immutable
/// once produced; a revision replaces it wholesale rather than mutating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineInstruction {
    pub instruction: String,
    pub target_files: Vec<String>,
    pub complexity: RouterTier,
    pub tool_trace: Vec<ToolTraceEntry>,
}

/// Terminal outcome of one full session run. Wraps the `CommitResult` on
/// success, folded with whatever ended the loop before a commit was
/// attempted.
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    Committed(CommitResult),
    EscalatedToUser { reason: String },
    Exhausted { reason: String },
    Cancelled,
}

/// Classify a dispatch failure as retryable-at-the-generator-level network
/// trouble. The dispatch layer already classifies failures into a typed
/// enum, so this only needs to pick the network-shaped variants.
pub fn is_network_error(err: &DispatchError) -> bool {
    match err {
        DispatchError::Transport(_) => true,
        DispatchError::Cancelled { .. } => false,
        DispatchError::RetryExhausted { .. } => true,
        DispatchError::RateLimitExhausted { .. } => false,
        DispatchError::UnknownModel(_)
        | DispatchError::MissingApiKey(_, _)
        | DispatchError::ContextOverflow { .. }
        | DispatchError::MessageStructure { .. }
        | DispatchError::Fatal { .. } => false,
    }
}

/// Default Code Generator retry budget, grounded on
/// `code_generator.py`'s `CODE_GENERATOR_MAX_RETRIES` / `_RETRY_DELAY`.
pub const CODE_GENERATOR_MAX_RETRIES: u32 = 3;
pub const CODE_GENERATOR_RETRY_DELAY_SEC: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(mode: CodeBlockMode) -> CodeBlock {
        CodeBlock {
            id: "b1".into(),
            file_path: "a.py".into(),
            mode,
            target_class: None,
            target_method: None,
            target_function: None,
            insert_pattern: None,
            source: "def foo():\n    return 1\n".into(),
            indent_hint: None,
        }
    }

    #[test]
    fn replace_method_without_target_class_fails_invariant() {
        let mut b = block(CodeBlockMode::ReplaceMethod);
        b.target_method = Some("foo".into());
        assert!(b.check_invariants().is_err());
    }

    #[test]
    fn replace_method_with_both_targets_passes() {
        let mut b = block(CodeBlockMode::ReplaceMethod);
        b.target_class = Some("Widget".into());
        b.target_method = Some("foo".into());
        assert!(b.check_invariants().is_ok());
    }

    #[test]
    fn add_function_has_no_target_requirement() {
        let b = block(CodeBlockMode::AddFunction);
        assert!(b.check_invariants().is_ok());
    }

    #[test]
    fn mode_round_trips_through_parse_and_as_str() {
        for mode in [
            CodeBlockMode::ReplaceFile,
            CodeBlockMode::ReplaceClass,
            CodeBlockMode::ReplaceMethod,
            CodeBlockMode::ReplaceFunction,
            CodeBlockMode::AddMethod,
            CodeBlockMode::AddFunction,
            CodeBlockMode::AddClass,
            CodeBlockMode::InsertImport,
            CodeBlockMode::AppendFile,
        ] {
            assert_eq!(CodeBlockMode::parse(mode.as_str()), Some(mode));
        }
    }

    #[test]
    fn transport_error_is_network_retryable() {
        let err = DispatchError::Transport("connection reset".into());
        assert!(is_network_error(&err));
    }

    #[test]
    fn missing_api_key_is_not_network_retryable() {
        let err = DispatchError::MissingApiKey("m".into(), "KEY".into());
        assert!(!is_network_error(&err));
    }
}
