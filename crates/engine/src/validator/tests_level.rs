//! Level 6: tests
//!
//! Discovers tests associated with changed files by naming convention and
//! location, then runs them with per-file timeouts derived from project
//! size (reuses the Timeout Calculator). Execution itself goes
//! through the same [`crate::tools::test_tools::TestRunner`] the
//! `run_project_tests` tool uses.

use std::path::Path;
use std::time::Duration;

use crate::tools::test_tools::TestRunner;

use super::issue::{ValidationIssue, ValidationLevel};

/// Map a changed source file to its conventional test file path, if any
/// convention matches. Supports the common Python (`tests/test_<name>.py`
/// or `test_<name>.py` alongside the module) and Rust (co-located
/// `#[cfg(test)]`, so nothing extra to discover there — handled instead by
/// the `tests` runtime-level which runs the whole crate) layouts.
pub fn discover_test_for(changed_file: &str) -> Option<String> {
    let path = Path::new(changed_file);
    let ext = path.extension()?.to_str()?;
    if ext != "py" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.starts_with("test_") {
        return None; // it already is a test file
    }
    let parent = path.parent().map(|p| p.to_string_lossy().to_string()).unwrap_or_default();
    let candidate_sibling = if parent.is_empty() {
        format!("test_{stem}.py")
    } else {
        format!("{parent}/test_{stem}.py")
    };
    Some(candidate_sibling)
}

/// Run discovered tests for each changed file against `runner`, producing
/// `tests`-level issues for failures. Missing conventional test files are
/// silently skipped (no test exists to run), not reported as errors.
pub async fn validate_tests(
    runner: &dyn TestRunner,
    project_root: &Path,
    vfs: &crate::vfs::VirtualFileSystem,
    changed_files: &[String],
    per_test_timeout: Duration,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for changed in changed_files {
        let Some(test_path) = discover_test_for(changed) else {
            continue;
        };
        if !vfs.file_exists(&test_path) {
            continue;
        }
        match runner.run(project_root, &test_path, None, per_test_timeout).await {
            Ok(outcome) if outcome.passed => {}
            Ok(outcome) => {
                issues.push(
                    ValidationIssue::error(
                        ValidationLevel::Tests,
                        test_path.clone(),
                        format!(
                            "test run failed (exit {}): {}",
                            outcome.exit_code,
                            truncate(&outcome.stderr_tail, 500)
                        ),
                    )
                    .with_suggestion(format!("re-run run_project_tests on {test_path}")),
                );
            }
            Err(e) => {
                issues.push(ValidationIssue::error(
                    ValidationLevel::Tests,
                    test_path.clone(),
                    format!("failed to execute tests: {e}"),
                ));
            }
        }
    }
    issues
}

fn truncate(s: &str, limit: usize) -> String {
    if s.len() <= limit {
        s.to_string()
    } else {
        format!("{}...", &s[..limit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_tools::TestOutcome;
    use crate::vfs::{BackupManager, VfsChange, VirtualFileSystem};
    use async_trait::async_trait;

    struct ScriptedRunner {
        passed: bool,
    }

    #[async_trait]
    impl TestRunner for ScriptedRunner {
        async fn run(
            &self,
            _project_root: &Path,
            _test_path: &str,
            _chunk_name: Option<&str>,
            _timeout: Duration,
        ) -> Result<TestOutcome, String> {
            Ok(TestOutcome {
                passed: self.passed,
                exit_code: if self.passed { 0 } else { 1 },
                stdout_tail: String::new(),
                stderr_tail: "AssertionError".into(),
            })
        }
    }

    #[test]
    fn discovers_sibling_test_file_for_module() {
        assert_eq!(
            discover_test_for("app/services/thing.py").as_deref(),
            Some("app/services/test_thing.py")
        );
    }

    #[test]
    fn test_files_themselves_have_no_discovered_counterpart() {
        assert_eq!(discover_test_for("tests/test_thing.py"), None);
    }

    #[test]
    fn non_python_files_have_no_discovered_test() {
        assert_eq!(discover_test_for("src/main.rs"), None);
    }

    #[tokio::test]
    async fn missing_conventional_test_file_is_skipped_not_errored() {
        let dir = tempfile::tempdir().unwrap();
        let vfs = VirtualFileSystem::new(dir.path(), BackupManager::new(dir.path(), ".b", "s", 7));
        let runner = ScriptedRunner { passed: true };
        let issues = validate_tests(
            &runner,
            dir.path(),
            &vfs,
            &["app/thing.py".to_string()],
            Duration::from_secs(10),
        )
        .await;
        assert!(issues.is_empty());
    }

    #[tokio::test]
    async fn failing_test_produces_tests_level_issue() {
        let dir = tempfile::tempdir().unwrap();
        let mut vfs = VirtualFileSystem::new(dir.path(), BackupManager::new(dir.path(), ".b", "s", 7));
        vfs.stage("test_thing.py", VfsChange::create("def test_x(): assert False", None));
        let runner = ScriptedRunner { passed: false };
        let issues = validate_tests(
            &runner,
            dir.path(),
            &vfs,
            &["thing.py".to_string()],
            Duration::from_secs(10),
        )
        .await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].level, ValidationLevel::Tests);
    }
}
