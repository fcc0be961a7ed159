//! Level 1: syntax
//!
//! Parses each changed file and reports parser errors with line/column.
//! Uses `tree-sitter` as the fault-tolerant parser so structural
//! diagnostics are still produced when the strict grammar can't fully
//! recover. This is the one blocking level.

use tree_sitter::{Language, Node, Parser};

use super::issue::{IssueSeverity, ValidationIssue, ValidationLevel};

/// The subset of languages this validator knows how to parse structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    Rust,
    Python,
    TypeScript,
    Go,
    Unknown,
}

impl SourceLanguage {
    pub fn from_path(path: &str) -> Self {
        match path.rsplit('.').next() {
            Some("rs") => Self::Rust,
            Some("py") => Self::Python,
            Some("ts") | Some("tsx") => Self::TypeScript,
            Some("go") => Self::Go,
            _ => Self::Unknown,
        }
    }

    fn grammar(&self) -> Option<Language> {
        match self {
            Self::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Self::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Self::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Self::Go => Some(tree_sitter_go::LANGUAGE.into()),
            Self::Unknown => None,
        }
    }
}

/// Advisory auto-fixer: operates on the *original* input, never chained,
/// and its output is adopted only if it re-parses clean.
pub trait SyntaxFixer: Send + Sync {
    /// Attempt to fix `content`. Returns `None` if the fixer has no
    /// opinion (e.g. content is fine, or fixer doesn't apply here).
    fn try_fix(&self, language: SourceLanguage, content: &str) -> Option<String>;
}

/// Validate one file's syntax. If `fixer` is supplied and the file fails
/// to parse cleanly, the fixer is offered the *original* content; its
/// output is only used (and a fixed-content issue downgraded to a
/// suggestion) if it re-parses without errors.
pub fn validate_syntax(
    file: &str,
    content: &str,
    fixer: Option<&dyn SyntaxFixer>,
) -> (Vec<ValidationIssue>, Option<String>) {
    let language = SourceLanguage::from_path(file);
    let Some(grammar) = language.grammar() else {
        // Unknown language: nothing to structurally validate.
        return (Vec::new(), None);
    };

    let issues = parse_issues(file, content, grammar.clone());
    if issues.is_empty() {
        return (Vec::new(), None);
    }

    if let Some(fixer) = fixer {
        if let Some(fixed) = fixer.try_fix(language, content) {
            let fixed_issues = parse_issues(file, &fixed, grammar);
            if fixed_issues.is_empty() {
                return (Vec::new(), Some(fixed));
            }
        }
    }

    (issues, None)
}

fn parse_issues(file: &str, content: &str, grammar: Language) -> Vec<ValidationIssue> {
    let mut parser = Parser::new();
    if parser.set_language(&grammar).is_err() {
        return Vec::new();
    }

    let Some(tree) = parser.parse(content, None) else {
        return vec![ValidationIssue::error(
            ValidationLevel::Syntax,
            file,
            "parser produced no tree (input too large or invalid encoding)",
        )];
    };

    let root = tree.root_node();
    if !root.has_error() {
        return Vec::new();
    }

    let mut issues = Vec::new();
    collect_error_nodes(root, file, &mut issues);
    if issues.is_empty() {
        // has_error() was true but no ERROR/MISSING node found directly;
        // report at the root so the failure isn't silently dropped.
        issues.push(ValidationIssue::error(
            ValidationLevel::Syntax,
            file,
            "syntax tree contains structural errors",
        ));
    }
    issues
}

fn collect_error_nodes(node: Node, file: &str, out: &mut Vec<ValidationIssue>) {
    if node.is_error() || node.is_missing() {
        let pos = node.start_position();
        let message = if node.is_missing() {
            format!("missing expected token near '{}'", node.kind())
        } else {
            "unexpected token / syntax error".to_string()
        };
        out.push(
            ValidationIssue::error(ValidationLevel::Syntax, file, message)
                .with_line(pos.row as u32 + 1),
        );
        // Don't descend further into an already-reported error subtree.
        return;
    }
    for child in node.children(&mut node.walk()) {
        collect_error_nodes(child, file, out);
    }
}

/// A fixer that never has an opinion — used when no formatter integration
/// is configured.
pub struct NoFixer;
impl SyntaxFixer for NoFixer {
    fn try_fix(&self, _language: SourceLanguage, _content: &str) -> Option<String> {
        None
    }
}
