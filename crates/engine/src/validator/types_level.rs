//! Level 3: types
//!
//! Runs an external type checker over the affected set with the VFS
//! materialized into a temp directory; non-critical warnings are
//! downgraded. The checker itself is an external collaborator (
//! Non-goals exclude implementing one), so this module only owns the
//! materialize/invoke/parse contract.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;

use super::issue::{IssueSeverity, ValidationIssue, ValidationLevel};
use crate::vfs::VirtualFileSystem;

/// One raw diagnostic line from a type checker, before severity downgrade.
#[derive(Debug, Clone)]
pub struct RawTypeDiagnostic {
    pub file: String,
    pub line: Option<u32>,
    pub message: String,
    /// True for diagnostics the checker itself marks as critical (e.g.
    /// `error` vs `note`/`hint`); non-critical ones are downgraded to
    /// `Warning` regardless of what the checker calls them.
    pub critical: bool,
}

/// External type-checker collaborator. A real deployment wires this to
/// mypy/pyright/tsc/etc; tests use a scripted fake.
#[async_trait]
pub trait TypeChecker: Send + Sync {
    async fn check(&self, materialized_root: &Path, files: &[String]) -> Vec<RawTypeDiagnostic>;
}

/// Materialize the affected set (changed + dependents) from the VFS into
/// `dest` so an external type checker can run against a coherent tree
/// without needing VFS awareness itself.
pub async fn materialize(
    vfs: &VirtualFileSystem,
    dest: &Path,
    files: &HashSet<String>,
) -> std::io::Result<()> {
    for path in files {
        let content = match vfs.read(path) {
            Ok(Some(c)) => c,
            _ => continue, // deleted or unreadable; nothing to materialize
        };
        let target = dest.join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(target, content).await?;
    }
    Ok(())
}

/// Run the type checker over `files` and produce downgraded
/// `ValidationIssue`s — non-critical diagnostics become `Warning`, never
/// `Error`.
pub async fn validate_types(
    checker: &dyn TypeChecker,
    materialized_root: &Path,
    files: &[String],
) -> Vec<ValidationIssue> {
    checker
        .check(materialized_root, files)
        .await
        .into_iter()
        .map(|d| {
            let severity = if d.critical {
                IssueSeverity::Error
            } else {
                IssueSeverity::Warning
            };
            let mut issue = ValidationIssue {
                level: ValidationLevel::Types,
                severity,
                file: d.file,
                line: d.line,
                message: d.message,
                suggestion: None,
            };
            if let Some(line) = issue.line.take() {
                issue = issue.with_line(line);
            }
            issue
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::BackupManager;

    struct FakeChecker {
        diagnostics: Vec<RawTypeDiagnostic>,
    }

    #[async_trait]
    impl TypeChecker for FakeChecker {
        async fn check(&self, _root: &Path, _files: &[String]) -> Vec<RawTypeDiagnostic> {
            self.diagnostics.clone()
        }
    }

    #[tokio::test]
    async fn materialize_writes_staged_and_disk_content() {
        let dir = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let mut vfs = VirtualFileSystem::new(
            dir.path(),
            BackupManager::new(dir.path(), ".b", "s", 7),
        );
        vfs.stage("a.py", crate::vfs::VfsChange::create("x = 1\n", None));

        let mut files = HashSet::new();
        files.insert("a.py".to_string());
        materialize(&vfs, dest.path(), &files).await.unwrap();

        let written = tokio::fs::read_to_string(dest.path().join("a.py")).await.unwrap();
        assert_eq!(written, "x = 1\n");
    }

    #[tokio::test]
    async fn critical_diagnostics_become_errors_noncritical_become_warnings() {
        let checker = FakeChecker {
            diagnostics: vec![
                RawTypeDiagnostic {
                    file: "a.py".into(),
                    line: Some(3),
                    message: "incompatible type".into(),
                    critical: true,
                },
                RawTypeDiagnostic {
                    file: "a.py".into(),
                    line: Some(10),
                    message: "unused import hint".into(),
                    critical: false,
                },
            ],
        };
        let issues = validate_types(&checker, Path::new("/tmp/x"), &["a.py".into()]).await;
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].severity, IssueSeverity::Error);
        assert_eq!(issues[1].severity, IssueSeverity::Warning);
    }

    #[tokio::test]
    async fn no_diagnostics_means_no_issues() {
        let checker = FakeChecker { diagnostics: vec![] };
        let issues = validate_types(&checker, Path::new("/tmp/x"), &["a.py".into()]).await;
        assert!(issues.is_empty());
    }
}
