//! Level 5: runtime
//!
//! Spawns a child interpreter that merely imports each changed module from
//! the materialized VFS; import-time errors are captured with truncated
//! tracebacks. This is distinct from the Runtime Tester (C5): that module
//! runs the *application*, this one only checks that changed modules can
//! be imported at all, as part of the validation pipeline.

use std::path::Path;
use std::process::Stdio;

use super::issue::{ValidationIssue, ValidationLevel};

/// Truncate captured stderr/stdout to this many characters
/// default output budget, reused here for import-check tracebacks.
pub const TRACEBACK_CHAR_LIMIT: usize = 2000;

/// Spawns a process to import `module_path` (an importable dotted name or
/// a relative file path, depending on interpreter) from `materialized_root`
/// and reports failure as a `runtime`-level `ValidationIssue`.
pub async fn validate_runtime_import(
    materialized_root: &Path,
    interpreter: &str,
    file: &str,
    import_expr: &str,
    timeout: std::time::Duration,
) -> Vec<ValidationIssue> {
    let spawn = tokio::process::Command::new(interpreter)
        .arg("-c")
        .arg(import_expr)
        .current_dir(materialized_root)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();

    let mut child = match spawn {
        Ok(c) => c,
        Err(e) => {
            return vec![ValidationIssue::error(
                ValidationLevel::Runtime,
                file,
                format!("failed to spawn interpreter '{interpreter}': {e}"),
            )]
        }
    };

    let waited = tokio::time::timeout(timeout, child.wait_with_output()).await;
    let output = match waited {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return vec![ValidationIssue::error(
                ValidationLevel::Runtime,
                file,
                format!("interpreter process error: {e}"),
            )]
        }
        Err(_) => {
            return vec![ValidationIssue::error(
                ValidationLevel::Runtime,
                file,
                format!("import check timed out after {:?}", timeout),
            )]
        }
    };

    if output.status.success() {
        return Vec::new();
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let truncated = truncate(&stderr, TRACEBACK_CHAR_LIMIT);
    vec![ValidationIssue::error(
        ValidationLevel::Runtime,
        file,
        format!("import of '{import_expr}' failed:\n{truncated}"),
    )]
}

fn truncate(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        s.to_string()
    } else {
        let head: String = s.chars().take(limit).collect();
        format!("{head}\n...[truncated]")
    }
}

/// Derive the interpreter import expression for a Python module path
/// relative to the materialized root, e.g. `pkg/mod.py` → `import pkg.mod`.
pub fn python_import_expr(relative_path: &str) -> String {
    let dotted = relative_path
        .trim_end_matches(".py")
        .replace(['/', '\\'], ".");
    format!("import {dotted}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_import_expr_converts_path_to_dotted_module() {
        assert_eq!(python_import_expr("app/services/thing.py"), "import app.services.thing");
    }

    #[test]
    fn truncate_leaves_short_strings_untouched() {
        assert_eq!(truncate("short", 2000), "short");
    }

    #[test]
    fn truncate_caps_long_strings() {
        let long = "x".repeat(3000);
        let out = truncate(&long, 2000);
        assert!(out.len() < 3000);
        assert!(out.ends_with("[truncated]"));
    }

    #[tokio::test]
    async fn unknown_interpreter_reports_spawn_failure_as_issue() {
        let dir = tempfile::tempdir().unwrap();
        let issues = validate_runtime_import(
            dir.path(),
            "definitely-not-a-real-interpreter-xyz",
            "a.py",
            "import a",
            std::time::Duration::from_secs(5),
        )
        .await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].level, ValidationLevel::Runtime);
    }
}
