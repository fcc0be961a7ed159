//! Staging error classification and guidance
//!
//! Each error type maps to a human/AI-facing `{description, cause, solution,
//! mode_hint}` quadruple so the orchestrator gets actionable text rather
//! than a bare enum tag. Staging errors never consume the
//! orchestrator-revision budget — enforced by the controller, not here.

use serde::{Deserialize, Serialize};

use super::items::FeedbackPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagingErrorType {
    ClassNotFound,
    MethodNotFound,
    FunctionNotFound,
    InsertPatternNotFound,
    MissingTargetClass,
    MissingTargetMethod,
    MissingTargetFunction,
    InvalidMode,
    ParserUnavailable,
    SyntaxValidationFailed,
    InvalidCodeFormat,
    Unknown,
}

/// Classify a raw staging-error message into a `StagingErrorType` —
/// mirrors `file_modifier.py::classify_staging_error`'s ordered pattern
/// checks.
pub fn classify(error_message: &str, mode: Option<&str>) -> StagingErrorType {
    let lower = error_message.to_lowercase();

    if lower.contains("class") && lower.contains("not found") {
        return StagingErrorType::ClassNotFound;
    }
    if lower.contains("method") && lower.contains("not found") {
        return StagingErrorType::MethodNotFound;
    }
    if lower.contains("function") && lower.contains("not found") {
        return StagingErrorType::FunctionNotFound;
    }
    if lower.contains("pattern") && lower.contains("not found") {
        return StagingErrorType::InsertPatternNotFound;
    }
    if lower.contains("target_class") && lower.contains("required") {
        return StagingErrorType::MissingTargetClass;
    }
    if lower.contains("target_method") && lower.contains("required") {
        return StagingErrorType::MissingTargetMethod;
    }
    if lower.contains("target_function") && lower.contains("required") {
        return StagingErrorType::MissingTargetFunction;
    }
    if lower.contains("unknown mode") || lower.contains("valid modes") {
        return StagingErrorType::InvalidMode;
    }
    if lower.contains("parser") && lower.contains("not available") {
        return StagingErrorType::ParserUnavailable;
    }
    if let Some(mode) = mode {
        if mode.starts_with("REPLACE_IN_")
            && (lower.contains("class") || lower.contains("method") || lower.contains("function") || lower.contains("pattern") || lower.contains("attribute"))
            && lower.contains("not found")
        {
            if lower.contains("class") {
                return StagingErrorType::ClassNotFound;
            }
            if lower.contains("method") {
                return StagingErrorType::MethodNotFound;
            }
            if lower.contains("function") {
                return StagingErrorType::FunctionNotFound;
            }
            return StagingErrorType::InsertPatternNotFound;
        }
    }
    if lower.contains("must be a function definition") {
        return StagingErrorType::InvalidCodeFormat;
    }
    StagingErrorType::Unknown
}

pub struct Guidance {
    pub description: &'static str,
    pub cause: &'static str,
    pub solution: &'static [&'static str],
    pub mode_hint: Option<&'static str>,
}

pub fn guidance_for(error_type: StagingErrorType) -> Guidance {
    match error_type {
        StagingErrorType::ClassNotFound => Guidance {
            description: "the class named in TARGET_CLASS does not exist in the file",
            cause: "typo in class name, wrong file, or the class was renamed/removed",
            solution: &[
                "use read_file to verify the exact class name",
                "check for typos (case-sensitive)",
                "if the class doesn't exist, use ADD_CLASS instead of REPLACE_CLASS",
                "if the class is in a different file, update the FILE path",
            ],
            mode_hint: Some("consider ADD_CLASS if creating a new class"),
        },
        StagingErrorType::MethodNotFound => Guidance {
            description: "the method named in TARGET_METHOD does not exist in the target class",
            cause: "typo in method name, method is in a different class, or it doesn't exist yet",
            solution: &[
                "verify the method name spelling (case-sensitive)",
                "check whether the method is in the correct class",
                "if it doesn't exist, use ADD_METHOD instead of REPLACE_METHOD",
                "if the symbol is a standalone function, use REPLACE_FUNCTION with TARGET_FUNCTION",
            ],
            mode_hint: Some("use ADD_METHOD to add a new method, or REPLACE_FUNCTION if it's not in a class"),
        },
        StagingErrorType::FunctionNotFound => Guidance {
            description: "the function named in TARGET_FUNCTION does not exist at module level",
            cause: "typo in function name, the function is actually a method, or it doesn't exist",
            solution: &[
                "verify the function name spelling",
                "check whether it's actually a method inside a class",
                "if it's a method, use REPLACE_METHOD with TARGET_CLASS and TARGET_METHOD",
                "if it doesn't exist, use ADD_FUNCTION",
            ],
            mode_hint: Some("use REPLACE_METHOD if the target is inside a class"),
        },
        StagingErrorType::InsertPatternNotFound => Guidance {
            description: "the pattern given in INSERT_AFTER or INSERT_BEFORE was not found in the target",
            cause: "the pattern text doesn't match exactly, or the target structure changed",
            solution: &[
                "read the current file content",
                "find the exact text to insert after/before",
                "use a unique substring that exists in the file",
                "consider APPEND_FILE or a different insertion strategy",
            ],
            mode_hint: Some("use APPEND_FILE to add at the end, or specify exact line content"),
        },
        StagingErrorType::MissingTargetClass => Guidance {
            description: "the mode requires TARGET_CLASS but it was not provided",
            cause: "REPLACE_METHOD or similar was specified without TARGET_CLASS",
            solution: &[
                "add TARGET_CLASS with the class name",
                "if modifying a standalone function, use REPLACE_FUNCTION instead",
                "verify the class exists in the file",
            ],
            mode_hint: Some("add TARGET_CLASS or switch to REPLACE_FUNCTION"),
        },
        StagingErrorType::MissingTargetMethod => Guidance {
            description: "the mode requires TARGET_METHOD but it was not provided",
            cause: "REPLACE_METHOD was specified without TARGET_METHOD",
            solution: &[
                "add TARGET_METHOD with the method name",
                "verify the method exists in the target class",
            ],
            mode_hint: Some("add TARGET_METHOD"),
        },
        StagingErrorType::MissingTargetFunction => Guidance {
            description: "the mode requires TARGET_FUNCTION but it was not provided",
            cause: "REPLACE_FUNCTION was specified without TARGET_FUNCTION",
            solution: &[
                "add TARGET_FUNCTION with the function name",
                "verify the function exists at module level",
            ],
            mode_hint: Some("add TARGET_FUNCTION"),
        },
        StagingErrorType::InvalidMode => Guidance {
            description: "the specified MODE is not recognized",
            cause: "typo in mode name or an unsupported mode",
            solution: &[
                "use one of: REPLACE_FILE, REPLACE_CLASS, REPLACE_METHOD, REPLACE_FUNCTION, ADD_METHOD, ADD_FUNCTION, ADD_CLASS, INSERT_IMPORT, APPEND_FILE",
                "check spelling and case",
            ],
            mode_hint: Some("valid modes: REPLACE_FILE, REPLACE_METHOD, ADD_METHOD, etc."),
        },
        StagingErrorType::ParserUnavailable => Guidance {
            description: "the structural parser is not available to analyze the file",
            cause: "the tree-sitter parser failed to initialize",
            solution: &["use REPLACE_FILE to replace the entire file content"],
            mode_hint: Some("use REPLACE_FILE as a fallback"),
        },
        StagingErrorType::SyntaxValidationFailed => Guidance {
            description: "the applied change breaks the file's syntax, making classes/methods unparseable",
            cause: "wrong indentation, an incomplete code block, a prior block in the same file already broke syntax, or an insertion at the wrong position",
            solution: &[
                "check indentation is consistent with the surrounding block",
                "verify all brackets and strings are balanced and closed",
                "if multiple blocks target the same file, an earlier block may be the real cause",
                "use read_file to see the exact current structure before modifying",
                "if a complex insertion keeps failing, switch to REPLACE_METHOD or REPLACE_CLASS",
            ],
            mode_hint: Some("check indentation, ensure the code is complete, consider REPLACE_METHOD instead of an insert"),
        },
        StagingErrorType::InvalidCodeFormat => Guidance {
            description: "the code block must start with a function definition",
            cause: "the code doesn't start with 'def'/'async def', or has a syntax error",
            solution: &[
                "ensure the code starts with 'def name():' or 'async def name():'",
                "check for syntax errors",
                "provide a complete function definition",
            ],
            mode_hint: Some("this mode requires a complete function definition"),
        },
        StagingErrorType::Unknown => Guidance {
            description: "an unexpected staging error occurred",
            cause: "unknown",
            solution: &[
                "read the error message carefully",
                "verify the file path exists",
                "check that the code syntax is valid",
                "try a simpler modification mode",
            ],
            mode_hint: Some("try REPLACE_FILE as a fallback"),
        },
    }
}

/// Render a `FeedbackPayload::StagingError` into its orchestrator-facing
/// prompt section — grounded on
/// `StagingErrorFeedback.to_prompt_format` in the original.
pub fn to_prompt_format(payload: &FeedbackPayload) -> String {
    let FeedbackPayload::StagingError {
        file_path,
        mode,
        error_type,
        target_class,
        target_method,
        target_function,
        ..
    } = payload
    else {
        return String::new();
    };

    let guidance = guidance_for(*error_type);
    let mut out = String::new();
    out.push_str(&format!("STAGING ERROR: {:?}\n", error_type));
    out.push_str(&format!("file: {file_path}\nmode: {mode}\n"));
    if let Some(c) = target_class {
        out.push_str(&format!("target class: {c}\n"));
    }
    if let Some(m) = target_method {
        out.push_str(&format!("target method: {m}\n"));
    }
    if let Some(f) = target_function {
        out.push_str(&format!("target function: {f}\n"));
    }
    out.push_str(&format!("what went wrong: {}\n", guidance.description));
    out.push_str(&format!("why: {}\n", guidance.cause));
    out.push_str("how to fix:\n");
    for step in guidance.solution {
        out.push_str(&format!("  - {step}\n"));
    }
    if let Some(hint) = guidance.mode_hint {
        out.push_str(&format!("hint: {hint}\n"));
    }
    out.push_str("this error does not count against the revision budget.\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_class_not_found() {
        assert_eq!(
            classify("Class FooBar not found in file", None),
            StagingErrorType::ClassNotFound
        );
    }

    #[test]
    fn classifies_missing_target_method() {
        assert_eq!(
            classify("target_method is required for this mode", None),
            StagingErrorType::MissingTargetMethod
        );
    }

    #[test]
    fn unrecognized_message_falls_back_to_unknown() {
        assert_eq!(classify("something bizarre happened", None), StagingErrorType::Unknown);
    }

    #[test]
    fn replace_in_mode_with_attribute_not_found_maps_to_insert_pattern() {
        assert_eq!(
            classify("attribute not found in target", Some("REPLACE_IN_CLASS")),
            StagingErrorType::InsertPatternNotFound
        );
    }

    #[test]
    fn prompt_format_notes_free_revision_budget() {
        let payload = FeedbackPayload::StagingError {
            file_path: "a.py".into(),
            mode: "REPLACE_METHOD".into(),
            error: "Method 'foo' not found".into(),
            error_type: StagingErrorType::MethodNotFound,
            target_class: Some("Widget".into()),
            target_method: Some("foo".into()),
            target_function: None,
        };
        let rendered = to_prompt_format(&payload);
        assert!(rendered.contains("does not count against the revision budget"));
        assert!(rendered.contains("ADD_METHOD"));
    }
}
