//! Structural editor.
//!
//! Turns one [`CodeBlock`] plus the target file's current content into a
//! full replacement file body, or a [`StagingFailure`] the controller
//! converts into free feedback — staging errors never consume a retry
//! budget on their own. Location of named blocks is regex-based, the same
//! stand-in for a full AST editor that `tools::fs_tools::ReadCodeChunkTool`
//! uses for reading chunks; a real per-language structural parser is out
//! of scope, so correctness of the result is still checked by re-running
//! the syntax validator (level 1) before the block is accepted.

use regex::Regex;

use super::types::{CodeBlock, CodeBlockMode};
use crate::feedback::StagingErrorType;
use crate::validator::syntax::validate_syntax;

#[derive(Debug, Clone)]
pub struct StagingFailure {
    pub error_type: StagingErrorType,
    pub message: String,
}

impl StagingFailure {
    fn new(error_type: StagingErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
        }
    }
}

struct Span {
    start: usize,
    end: usize,
    indent: usize,
}

/// Locate a `class`/`def` header named `name` and its body, using the same
/// indent-delimited scan as `ReadCodeChunkTool`'s chunk extractor.
fn find_named_span(source: &str, keyword: &str, name: &str) -> Option<Span> {
    let pattern = if keyword == "class" {
        format!(r"(?m)^([ \t]*)class\s+{}\s*[:\(]", regex::escape(name))
    } else {
        format!(r"(?m)^([ \t]*)(?:async\s+)?def\s+{}\s*\(", regex::escape(name))
    };
    let re = Regex::new(&pattern).ok()?;
    let m = re.find(source)?;
    let header_start = m.start();
    let indent = source[header_start..m.end()]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .count();

    let line_start = source[..header_start].rfind('\n').map(|i| i + 1).unwrap_or(0);

    let mut end = source.len();
    let mut cursor = line_start;
    let mut first_line = true;
    for line in source[line_start..].split_inclusive('\n') {
        let trimmed = line.trim_end_matches('\n');
        if first_line {
            first_line = false;
            cursor += line.len();
            continue;
        }
        if trimmed.trim().is_empty() {
            cursor += line.len();
            continue;
        }
        let this_indent = trimmed.chars().take_while(|c| *c == ' ' || *c == '\t').count();
        if this_indent <= indent {
            end = cursor;
            break;
        }
        cursor += line.len();
    }
    if cursor >= source.len() {
        end = source.len();
    }

    // trim trailing blank lines from the span
    let mut span_text_end = end;
    while span_text_end > line_start {
        let before = &source[line_start..span_text_end];
        let last_line = before.rsplit('\n').next().unwrap_or("");
        if last_line.trim().is_empty() && before.contains('\n') {
            span_text_end -= last_line.len() + 1;
        } else {
            break;
        }
    }

    Some(Span {
        start: line_start,
        end: span_text_end,
        indent,
    })
}

/// Reindent `text` so its first non-empty line sits at `target_indent`
/// spaces, preserving relative indentation of subsequent lines.
fn reindent(text: &str, target_indent: usize) -> String {
    let base_indent = text
        .lines()
        .find(|l| !l.trim().is_empty())
        .map(|l| l.chars().take_while(|c| *c == ' ').count())
        .unwrap_or(0);
    let pad = " ".repeat(target_indent);
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                let stripped = line.strip_prefix(&" ".repeat(base_indent)).unwrap_or(line);
                format!("{pad}{stripped}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn starts_with_def_or_class(source: &str, expect_class: bool) -> bool {
    let Some(first) = source.lines().find(|l| !l.trim().is_empty()) else {
        return false;
    };
    let trimmed = first.trim_start();
    if expect_class {
        trimmed.starts_with("class ")
    } else {
        trimmed.starts_with("def ") || trimmed.starts_with("async def ")
    }
}

/// Apply one code block against the target file's current content (`None`
/// if the file doesn't exist yet). Returns the full new file body.
pub fn apply_block(existing: Option<&str>, block: &CodeBlock) -> Result<String, StagingFailure> {
    match block.mode {
        CodeBlockMode::ReplaceFile => Ok(block.source.clone()),

        CodeBlockMode::AppendFile => match existing {
            Some(c) => Ok(format!("{}\n{}\n", c.trim_end_matches('\n'), block.source.trim_end())),
            None => Ok(format!("{}\n", block.source.trim_end())),
        },

        CodeBlockMode::InsertImport => {
            let body = existing.unwrap_or("");
            let import_re = Regex::new(r"(?m)^(?:import\s+\S+|from\s+\S+\s+import\s+.+)$").unwrap();
            let last_match_end = import_re.find_iter(body).last().map(|m| m.end());
            match last_match_end {
                Some(pos) => {
                    let insert_at = body[pos..].find('\n').map(|i| pos + i + 1).unwrap_or(body.len());
                    Ok(format!(
                        "{}{}\n{}",
                        &body[..insert_at],
                        block.source.trim_end(),
                        &body[insert_at..]
                    ))
                }
                None => Ok(format!("{}\n{}", block.source.trim_end(), body)),
            }
        }

        CodeBlockMode::AddClass => {
            if !starts_with_def_or_class(&block.source, true) {
                return Err(StagingFailure::new(
                    StagingErrorType::InvalidCodeFormat,
                    "ADD_CLASS source must start with a class definition",
                ));
            }
            let body = existing.unwrap_or("");
            Ok(format!("{}\n\n{}\n", body.trim_end_matches('\n'), block.source.trim_end()))
        }

        CodeBlockMode::AddFunction => {
            if !starts_with_def_or_class(&block.source, false) {
                return Err(StagingFailure::new(
                    StagingErrorType::InvalidCodeFormat,
                    "ADD_FUNCTION source must start with a function definition",
                ));
            }
            let body = existing.unwrap_or("");
            Ok(format!("{}\n\n{}\n", body.trim_end_matches('\n'), block.source.trim_end()))
        }

        CodeBlockMode::ReplaceClass => {
            let Some(target) = &block.target_class else {
                return Err(StagingFailure::new(
                    StagingErrorType::MissingTargetClass,
                    "REPLACE_CLASS requires target_class",
                ));
            };
            let body = existing.ok_or_else(|| {
                StagingFailure::new(StagingErrorType::ClassNotFound, format!("file has no content to search for class '{target}'"))
            })?;
            let span = find_named_span(body, "class", target).ok_or_else(|| {
                StagingFailure::new(StagingErrorType::ClassNotFound, format!("class '{target}' not found in file"))
            })?;
            let replacement = reindent(&block.source, span.indent);
            Ok(format!("{}{}{}", &body[..span.start], replacement, &body[span.end..]))
        }

        CodeBlockMode::ReplaceFunction => {
            let Some(target) = &block.target_function else {
                return Err(StagingFailure::new(
                    StagingErrorType::MissingTargetFunction,
                    "REPLACE_FUNCTION requires target_function",
                ));
            };
            let body = existing.ok_or_else(|| {
                StagingFailure::new(StagingErrorType::FunctionNotFound, format!("file has no content to search for function '{target}'"))
            })?;
            let span = find_named_span(body, "def", target).ok_or_else(|| {
                StagingFailure::new(StagingErrorType::FunctionNotFound, format!("function '{target}' not found at module level"))
            })?;
            let replacement = reindent(&block.source, span.indent);
            Ok(format!("{}{}{}", &body[..span.start], replacement, &body[span.end..]))
        }

        CodeBlockMode::ReplaceMethod | CodeBlockMode::AddMethod => {
            let Some(class_name) = &block.target_class else {
                return Err(StagingFailure::new(
                    StagingErrorType::MissingTargetClass,
                    format!("{} requires target_class", block.mode.as_str()),
                ));
            };
            let body = existing.ok_or_else(|| {
                StagingFailure::new(StagingErrorType::ClassNotFound, format!("file has no content to search for class '{class_name}'"))
            })?;
            let class_span = find_named_span(body, "class", class_name).ok_or_else(|| {
                StagingFailure::new(StagingErrorType::ClassNotFound, format!("class '{class_name}' not found in file"))
            })?;
            let class_body = &body[class_span.start..class_span.end];
            let member_indent = class_span.indent + 4;

            match block.mode {
                CodeBlockMode::ReplaceMethod => {
                    let Some(method_name) = &block.target_method else {
                        return Err(StagingFailure::new(
                            StagingErrorType::MissingTargetMethod,
                            "REPLACE_METHOD requires target_method",
                        ));
                    };
                    let method_span = find_named_span(class_body, "def", method_name).ok_or_else(|| {
                        StagingFailure::new(
                            StagingErrorType::MethodNotFound,
                            format!("method '{method_name}' not found in class '{class_name}'"),
                        )
                    })?;
                    let replacement = reindent(&block.source, member_indent);
                    let new_class_body = format!(
                        "{}{}{}",
                        &class_body[..method_span.start],
                        replacement,
                        &class_body[method_span.end..]
                    );
                    Ok(format!("{}{}{}", &body[..class_span.start], new_class_body, &body[class_span.end..]))
                }
                CodeBlockMode::AddMethod => {
                    if !starts_with_def_or_class(&block.source, false) {
                        return Err(StagingFailure::new(
                            StagingErrorType::InvalidCodeFormat,
                            "ADD_METHOD source must start with a function definition",
                        ));
                    }
                    let addition = reindent(&block.source, member_indent);
                    let new_class_body = format!("{}\n{}\n", class_body.trim_end_matches('\n'), addition);
                    Ok(format!("{}{}{}", &body[..class_span.start], new_class_body, &body[class_span.end..]))
                }
                _ => unreachable!(),
            }
        }
    }
}

/// Apply the block, then re-run the syntax level against the result
/// before handing it back for VFS staging — syntax is the one blocking
/// validation level, surfaced here as `SYNTAX_VALIDATION_FAILED`.
pub fn stage_and_check(existing: Option<&str>, block: &CodeBlock) -> Result<String, StagingFailure> {
    let new_content = apply_block(existing, block)?;
    let (issues, _) = validate_syntax(&block.file_path, &new_content, None);
    if !issues.is_empty() {
        return Err(StagingFailure::new(
            StagingErrorType::SyntaxValidationFailed,
            issues.iter().map(|i| i.message.clone()).collect::<Vec<_>>().join("; "),
        ));
    }
    Ok(new_content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(mode: CodeBlockMode, source: &str) -> CodeBlock {
        CodeBlock {
            id: "b1".into(),
            file_path: "a.py".into(),
            mode,
            target_class: None,
            target_method: None,
            target_function: None,
            insert_pattern: None,
            source: source.into(),
            indent_hint: None,
        }
    }

    #[test]
    fn replace_file_ignores_existing_content() {
        let b = block(CodeBlockMode::ReplaceFile, "x = 1\n");
        assert_eq!(apply_block(Some("y = 2\n"), &b).unwrap(), "x = 1\n");
    }

    #[test]
    fn append_file_adds_after_existing() {
        let b = block(CodeBlockMode::AppendFile, "z = 3");
        let out = apply_block(Some("x = 1"), &b).unwrap();
        assert_eq!(out, "x = 1\nz = 3\n");
    }

    #[test]
    fn insert_import_lands_after_last_import_block() {
        let b = block(CodeBlockMode::InsertImport, "import os");
        let existing = "import sys\nfrom typing import Any\n\nx = 1\n";
        let out = apply_block(Some(existing), &b).unwrap();
        assert!(out.starts_with("import sys\nfrom typing import Any\nimport os\n"));
    }

    #[test]
    fn replace_method_swaps_only_the_named_method() {
        let existing = "class Widget:\n    def foo(self):\n        return 1\n\n    def bar(self):\n        return 2\n";
        let mut b = block(CodeBlockMode::ReplaceMethod, "def foo(self):\n    return 99\n");
        b.target_class = Some("Widget".into());
        b.target_method = Some("foo".into());
        let out = apply_block(Some(existing), &b).unwrap();
        assert!(out.contains("return 99"));
        assert!(out.contains("def bar(self):\n        return 2"));
    }

    #[test]
    fn replace_method_missing_class_is_class_not_found() {
        let existing = "class Other:\n    def foo(self):\n        return 1\n";
        let mut b = block(CodeBlockMode::ReplaceMethod, "def foo(self):\n    return 99\n");
        b.target_class = Some("Widget".into());
        b.target_method = Some("foo".into());
        let err = apply_block(Some(existing), &b).unwrap_err();
        assert_eq!(err.error_type, StagingErrorType::ClassNotFound);
    }

    #[test]
    fn replace_method_missing_method_is_method_not_found() {
        let existing = "class Widget:\n    def bar(self):\n        return 2\n";
        let mut b = block(CodeBlockMode::ReplaceMethod, "def foo(self):\n    return 99\n");
        b.target_class = Some("Widget".into());
        b.target_method = Some("foo".into());
        let err = apply_block(Some(existing), &b).unwrap_err();
        assert_eq!(err.error_type, StagingErrorType::MethodNotFound);
    }

    #[test]
    fn add_method_appends_inside_class_body() {
        let existing = "class Widget:\n    def foo(self):\n        return 1\n";
        let mut b = block(CodeBlockMode::AddMethod, "def baz(self):\n    return 3\n");
        b.target_class = Some("Widget".into());
        let out = apply_block(Some(existing), &b).unwrap();
        assert!(out.contains("def foo(self):"));
        assert!(out.contains("def baz(self):"));
        assert!(out.contains("        return 3"));
    }

    #[test]
    fn add_function_rejects_non_function_source() {
        let b = block(CodeBlockMode::AddFunction, "x = 1\n");
        let err = apply_block(None, &b).unwrap_err();
        assert_eq!(err.error_type, StagingErrorType::InvalidCodeFormat);
    }

    #[test]
    fn stage_and_check_rejects_result_that_fails_syntax() {
        let existing = "class Widget:\n    def foo(self):\n        return 1\n";
        let mut b = block(CodeBlockMode::ReplaceMethod, "def foo(self:\n    return 99\n");
        b.target_class = Some("Widget".into());
        b.target_method = Some("foo".into());
        let err = stage_and_check(Some(existing), &b).unwrap_err();
        assert_eq!(err.error_type, StagingErrorType::SyntaxValidationFailed);
    }

    #[test]
    fn stage_and_check_missing_target_class_is_reported() {
        let b = block(CodeBlockMode::ReplaceMethod, "def foo(self):\n    return 1\n");
        let err = stage_and_check(Some("class Widget:\n    pass\n"), &b).unwrap_err();
        assert_eq!(err.error_type, StagingErrorType::MissingTargetClass);
    }
}
