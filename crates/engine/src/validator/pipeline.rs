//! Validator pipeline orchestrator
//!
//! Runs the six levels in order against the affected set, honoring config
//! enablement and the "syntax is blocking" rule : a syntax failure
//! marks every later enabled level as explicitly skipped rather than
//! silently omitted.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::tools::test_tools::TestRunner;
use crate::vfs::{AffectedFiles, VirtualFileSystem};

use super::integration::{extract_python_defs, extract_symbol_uses};
use super::issue::{LevelOutcome, ValidationLevel, ValidationResult};
use super::syntax::{validate_syntax, SyntaxFixer};
use super::types_level::{materialize, TypeChecker};
use super::{runtime_level, tests_level, ValidatorError};

/// External collaborators the pipeline needs for the levels it doesn't
/// implement itself (Non-goals: type checker, interpreter, test
/// runner are all external). Any field left `None` disables that level
/// even if `Config::validation_levels` names it, and records it as
/// `Disabled` rather than `Failed`.
pub struct ValidatorPipeline {
    pub syntax_fixer: Option<Arc<dyn SyntaxFixer>>,
    pub type_checker: Option<Arc<dyn TypeChecker>>,
    pub test_runner: Option<Arc<dyn TestRunner>>,
    pub interpreter: Option<String>,
    pub installed_packages: HashSet<String>,
    pub project_modules: HashSet<String>,
}

impl ValidatorPipeline {
    pub fn new() -> Self {
        Self {
            syntax_fixer: None,
            type_checker: None,
            test_runner: None,
            interpreter: None,
            installed_packages: HashSet::new(),
            project_modules: HashSet::new(),
        }
    }

    pub async fn run(
        &self,
        config: &Config,
        vfs: &VirtualFileSystem,
        affected: &AffectedFiles,
        scratch_dir: &Path,
    ) -> Result<ValidationResult, ValidatorError> {
        let start = Instant::now();
        let mut result = ValidationResult::default();
        let mut syntax_failed = false;

        for level in ValidationLevel::ORDER {
            if !config.is_level_enabled(level.as_str()) {
                continue;
            }

            if syntax_failed && level != ValidationLevel::Syntax {
                result
                    .levels_skipped
                    .push((level, "skipped due to syntax".to_string()));
                continue;
            }

            let outcome = match level {
                ValidationLevel::Syntax => self.run_syntax(vfs, affected, &mut result),
                ValidationLevel::Imports => self.run_imports(vfs, affected, &mut result),
                ValidationLevel::Types => {
                    self.run_types(vfs, affected, scratch_dir, &mut result).await?
                }
                ValidationLevel::Integration => self.run_integration(vfs, affected, &mut result),
                ValidationLevel::Runtime => {
                    self.run_runtime(affected, scratch_dir, &mut result).await
                }
                ValidationLevel::Tests => {
                    self.run_tests(vfs, affected, scratch_dir, config, &mut result).await
                }
            };

            match outcome {
                LevelOutcome::Passed => result.levels_passed.push(level),
                LevelOutcome::Failed => {
                    result.levels_failed.push(level);
                    if level == ValidationLevel::Syntax {
                        syntax_failed = true;
                    }
                }
                LevelOutcome::SkippedDueToSyntax => {
                    result
                        .levels_skipped
                        .push((level, "skipped due to syntax".to_string()));
                }
                LevelOutcome::Disabled => {
                    result
                        .levels_skipped
                        .push((level, "no collaborator configured".to_string()));
                }
            }
        }

        result.sort_issues();
        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    fn run_syntax(
        &self,
        vfs: &VirtualFileSystem,
        affected: &AffectedFiles,
        result: &mut ValidationResult,
    ) -> LevelOutcome {
        let mut any_error = false;
        for file in &affected.changed {
            let Ok(Some(content)) = vfs.read(file) else {
                continue;
            };
            let (issues, _fixed) = validate_syntax(file, &content, self.syntax_fixer.as_deref());
            if !issues.is_empty() {
                any_error = true;
            }
            result.issues.extend(issues);
        }
        if any_error {
            LevelOutcome::Failed
        } else {
            LevelOutcome::Passed
        }
    }

    fn run_imports(
        &self,
        vfs: &VirtualFileSystem,
        affected: &AffectedFiles,
        result: &mut ValidationResult,
    ) -> LevelOutcome {
        let mut any_error = false;
        for file in &affected.changed {
            let Ok(Some(content)) = vfs.read(file) else {
                continue;
            };
            let issues = super::imports::validate_imports(
                file,
                &content,
                &self.installed_packages,
                &self.project_modules,
            );
            if !issues.is_empty() {
                any_error = true;
            }
            result.issues.extend(issues);
        }
        if any_error {
            LevelOutcome::Failed
        } else {
            LevelOutcome::Passed
        }
    }

    async fn run_types(
        &self,
        vfs: &VirtualFileSystem,
        affected: &AffectedFiles,
        scratch_dir: &Path,
        result: &mut ValidationResult,
    ) -> Result<LevelOutcome, ValidatorError> {
        let Some(checker) = &self.type_checker else {
            return Ok(LevelOutcome::Disabled);
        };

        let mut all: HashSet<String> = affected.changed.clone();
        all.extend(affected.dependents.iter().cloned());
        let dest = scratch_dir.join("types");
        tokio::fs::create_dir_all(&dest).await?;
        materialize(vfs, &dest, &all).await?;

        let files: Vec<String> = all.into_iter().collect();
        let issues = super::types_level::validate_types(checker.as_ref(), &dest, &files).await;
        let any_error = issues
            .iter()
            .any(|i| i.severity == super::IssueSeverity::Error);
        result.issues.extend(issues);
        Ok(if any_error {
            LevelOutcome::Failed
        } else {
            LevelOutcome::Passed
        })
    }

    fn run_integration(
        &self,
        vfs: &VirtualFileSystem,
        affected: &AffectedFiles,
        result: &mut ValidationResult,
    ) -> LevelOutcome {
        let mut any_error = false;
        for changed in &affected.changed {
            let Ok(Some(changed_content)) = vfs.read(changed) else {
                continue;
            };
            let defs = extract_python_defs(&changed_content);
            if defs.is_empty() {
                continue;
            }
            let module_name = Path::new(changed)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();

            for dependent in &affected.dependents {
                let Ok(Some(dep_content)) = vfs.read(dependent) else {
                    continue;
                };
                let uses = extract_symbol_uses(&dep_content, module_name);
                if uses.is_empty() {
                    continue;
                }
                let issues = super::integration::validate_integration(dependent, &uses, &defs);
                if !issues.is_empty() {
                    any_error = true;
                }
                result.issues.extend(issues);
            }
        }
        if any_error {
            LevelOutcome::Failed
        } else {
            LevelOutcome::Passed
        }
    }

    async fn run_runtime(
        &self,
        affected: &AffectedFiles,
        scratch_dir: &Path,
        result: &mut ValidationResult,
    ) -> LevelOutcome {
        let Some(interpreter) = &self.interpreter else {
            return LevelOutcome::Disabled;
        };
        let mut any_error = false;
        for file in &affected.changed {
            if !file.ends_with(".py") {
                continue;
            }
            let expr = runtime_level::python_import_expr(file);
            let issues = runtime_level::validate_runtime_import(
                scratch_dir,
                interpreter,
                file,
                &expr,
                Duration::from_secs(30),
            )
            .await;
            if !issues.is_empty() {
                any_error = true;
            }
            result.issues.extend(issues);
        }
        if any_error {
            LevelOutcome::Failed
        } else {
            LevelOutcome::Passed
        }
    }

    async fn run_tests(
        &self,
        vfs: &VirtualFileSystem,
        affected: &AffectedFiles,
        scratch_dir: &Path,
        config: &Config,
        result: &mut ValidationResult,
    ) -> LevelOutcome {
        let Some(runner) = &self.test_runner else {
            return LevelOutcome::Disabled;
        };
        let changed: Vec<String> = affected.changed.iter().cloned().collect();
        let issues = tests_level::validate_tests(
            runner.as_ref(),
            scratch_dir,
            vfs,
            &changed,
            Duration::from_secs(config.test_timeout_sec),
        )
        .await;
        let any_error = !issues.is_empty();
        result.issues.extend(issues);
        if any_error {
            LevelOutcome::Failed
        } else {
            LevelOutcome::Passed
        }
    }
}

impl Default for ValidatorPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::{BackupManager, NullProjectIndex, VfsChange};

    fn make_vfs(dir: &Path) -> VirtualFileSystem {
        VirtualFileSystem::new(dir, BackupManager::new(dir, ".b", "s", 7))
    }

    #[tokio::test]
    async fn syntax_failure_skips_later_enabled_levels() {
        let dir = tempfile::tempdir().unwrap();
        let mut vfs = make_vfs(dir.path());
        vfs.stage("a.py", VfsChange::create("def broken(:\n", None));
        let affected = vfs.affected_files(&NullProjectIndex, 1);

        let pipeline = ValidatorPipeline::new();
        let config = Config::default();
        let scratch = tempfile::tempdir().unwrap();
        let result = pipeline
            .run(&config, &vfs, &affected, scratch.path())
            .await
            .unwrap();

        assert!(result.levels_failed.contains(&ValidationLevel::Syntax));
        assert!(result
            .levels_skipped
            .iter()
            .any(|(lvl, _)| *lvl == ValidationLevel::Imports));
        assert!(!result.success());
    }

    #[tokio::test]
    async fn clean_file_with_no_collaborators_passes_syntax_and_imports_disables_rest() {
        let dir = tempfile::tempdir().unwrap();
        let mut vfs = make_vfs(dir.path());
        vfs.stage("a.py", VfsChange::create("def ok():\n    return 1\n", None));
        let affected = vfs.affected_files(&NullProjectIndex, 1);

        let pipeline = ValidatorPipeline::new();
        let config = Config::default();
        let scratch = tempfile::tempdir().unwrap();
        let result = pipeline
            .run(&config, &vfs, &affected, scratch.path())
            .await
            .unwrap();

        assert!(result.levels_passed.contains(&ValidationLevel::Syntax));
        assert!(result.levels_passed.contains(&ValidationLevel::Imports));
        assert!(result
            .levels_skipped
            .iter()
            .any(|(lvl, _)| *lvl == ValidationLevel::Types));
        assert!(result.success());
    }
}
