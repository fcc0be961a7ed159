//! `ValidationIssue` / `ValidationResult`

use serde::{Deserialize, Serialize};

/// Validation level — run in this order; `syntax` is blocking,
/// the rest are not unless explicitly marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    Syntax,
    Imports,
    Types,
    Integration,
    Runtime,
    Tests,
}

impl ValidationLevel {
    pub const ORDER: [ValidationLevel; 6] = [
        ValidationLevel::Syntax,
        ValidationLevel::Imports,
        ValidationLevel::Types,
        ValidationLevel::Integration,
        ValidationLevel::Runtime,
        ValidationLevel::Tests,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationLevel::Syntax => "syntax",
            ValidationLevel::Imports => "imports",
            ValidationLevel::Types => "types",
            ValidationLevel::Integration => "integration",
            ValidationLevel::Runtime => "runtime",
            ValidationLevel::Tests => "tests",
        }
    }

    /// Only `syntax` is blocking.4 "syntax is blocking; others
    /// are not."
    pub fn is_blocking(&self) -> bool {
        matches!(self, ValidationLevel::Syntax)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
    Info,
}

/// A single diagnostic produced by one validation level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub level: ValidationLevel,
    pub severity: IssueSeverity,
    pub file: String,
    pub line: Option<u32>,
    pub message: String,
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    pub fn error(level: ValidationLevel, file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            severity: IssueSeverity::Error,
            file: file.into(),
            line: None,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn warning(level: ValidationLevel, file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            severity: IssueSeverity::Warning,
            file: file.into(),
            line: None,
            message: message.into(),
            suggestion: None,
        }
    }
}

/// Whether a level ran, was explicitly skipped (and why), or didn't run at
/// all because it's disabled in config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelOutcome {
    Passed,
    Failed,
    /// Spec P8: skipping must be explicit, never silent.
    SkippedDueToSyntax,
    Disabled,
}

/// Aggregate result of the validation pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub levels_passed: Vec<ValidationLevel>,
    pub levels_failed: Vec<ValidationLevel>,
    pub levels_skipped: Vec<(ValidationLevel, String)>,
    pub issues: Vec<ValidationIssue>,
    pub duration_ms: u64,
}

impl ValidationResult {
    /// `success = no error-severity issues in the configured levels`
    pub fn success(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == IssueSeverity::Error)
    }

    /// Sort issues by `(severity, level order, file, line)`
    pub fn sort_issues(&mut self) {
        self.issues.sort_by(|a, b| {
            a.severity
                .cmp(&b.severity)
                .then_with(|| a.level.cmp(&b.level))
                .then_with(|| a.file.cmp(&b.file))
                .then_with(|| a.line.cmp(&b.line))
        });
    }
}
