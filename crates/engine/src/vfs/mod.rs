//! Virtual File System (C3)
//!
//! Stages edits without touching disk, exposes a consistent read view to
//! tools and validators, computes the transitive affected-file set, and
//! commits atomically with backups. Owned exclusively by one
//! [`crate::pipeline::RequestSession`]; never shared across sessions.

pub mod affected;
pub mod backup;
pub mod change;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use affected::{compute_affected, AffectedFiles, NullProjectIndex, ProjectIndex};
pub use backup::{BackupError, BackupManager, BackupRecord};
pub use change::{ChangeKind, VfsChange};

#[derive(Error, Debug)]
pub enum VfsError {
    #[error("io error reading '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("backup error: {0}")]
    Backup(#[from] BackupError),
}

/// A previously-active change, displaced by a later `Stage` on the same
/// path. Kept for the session trail (debug/history), not required for
/// correctness
#[derive(Debug, Clone)]
pub struct TrailEntry {
    pub path: String,
    pub previous: VfsChange,
}

/// What happened to each staged path during `Commit` `CommitResult`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitResult {
    pub applied: Vec<String>,
    pub backed_up: Vec<(String, String)>,
    pub skipped: Vec<(String, String)>,
}

/// The staged overlay filesystem for one session, rooted at `project_root`.
pub struct VirtualFileSystem {
    project_root: PathBuf,
    changes: BTreeMap<String, VfsChange>,
    trail: Vec<TrailEntry>,
    backups: BackupManager,
}

impl VirtualFileSystem {
    pub fn new(project_root: impl Into<PathBuf>, backups: BackupManager) -> Self {
        Self {
            project_root: project_root.into(),
            changes: BTreeMap::new(),
            trail: Vec::new(),
            backups,
        }
    }

    fn disk_path(&self, path: &str) -> PathBuf {
        self.project_root.join(path)
    }

    /// `Stage(path, new_content | delete)` — idempotent replacement;
    /// returns the previous staged value if any.
    pub fn stage(&mut self, path: impl Into<String>, change: VfsChange) -> Option<VfsChange> {
        let path = path.into();
        let previous = self.changes.insert(path.clone(), change);
        if let Some(prev) = previous.clone() {
            self.trail.push(TrailEntry {
                path,
                previous: prev,
            });
        }
        previous
    }

    /// `Read(path) → content | not-found` — staged content takes priority;
    /// a staged delete reports not-found even if disk still has the file
    /// (invariant I1); otherwise falls through to disk.
    pub fn read(&self, path: &str) -> Result<Option<String>, VfsError> {
        if let Some(change) = self.changes.get(path) {
            return Ok(if change.is_delete() {
                None
            } else {
                change.new_content.clone()
            });
        }

        let disk_path = self.disk_path(path);
        if !disk_path.exists() {
            return Ok(None);
        }
        std::fs::read_to_string(&disk_path)
            .map(Some)
            .map_err(|e| VfsError::Io {
                path: path.to_string(),
                source: e,
            })
    }

    /// `FileExists(path)` — staged-create/modify counts as exists,
    /// staged-delete counts as not-exists, otherwise checks disk.
    pub fn file_exists(&self, path: &str) -> bool {
        match self.changes.get(path) {
            Some(change) => !change.is_delete(),
            None => self.disk_path(path).exists(),
        }
    }

    /// `StagedFiles() → set<path>` — all currently staged paths.
    pub fn staged_files(&self) -> std::collections::BTreeSet<String> {
        self.changes.keys().cloned().collect()
    }

    pub fn pending_change(&self, path: &str) -> Option<&VfsChange> {
        self.changes.get(path)
    }

    /// `AffectedFiles() → {changed, dependents}`
    pub fn affected_files(&self, index: &dyn ProjectIndex, hops: usize) -> AffectedFiles {
        compute_affected(&self.staged_files(), index, hops)
    }

    /// `Discard()` — drops all staged state without touching disk.
    pub fn discard(&mut self) {
        self.changes.clear();
        self.trail.clear();
    }

    pub fn trail(&self) -> &[TrailEntry] {
        &self.trail
    }

    /// `Commit() → CommitResult`.
    ///
    /// For every staged change: back up the existing disk file (if any),
    /// then write the new content or delete. On any per-file write error,
    /// abort the remainder, roll back already-written files from their
    /// backups, and return the partial result.
    pub async fn commit(&mut self) -> Result<CommitResult, VfsError> {
        let mut result = CommitResult::default();
        let mut written: Vec<(String, Option<BackupRecord>)> = Vec::new();

        let staged: Vec<(String, VfsChange)> =
            self.changes.iter().map(|(p, c)| (p.clone(), c.clone())).collect();

        for (path, change) in &staged {
            let disk_path = self.disk_path(path);

            let backup = match self.backups.backup(&disk_path).await {
                Ok(b) => b,
                Err(e) => {
                    result.skipped.push((path.clone(), format!("backup failed: {e}")));
                    self.rollback_written(&mut written, &mut result).await;
                    return Ok(result);
                }
            };

            let write_outcome = match change.kind {
                ChangeKind::Delete => tokio::fs::remove_file(&disk_path).await,
                ChangeKind::Create | ChangeKind::Modify => {
                    if let Some(parent) = disk_path.parent() {
                        if let Err(e) = tokio::fs::create_dir_all(parent).await {
                            result
                                .skipped
                                .push((path.clone(), format!("io error: {e}")));
                            self.rollback_written(&mut written, &mut result).await;
                            return Ok(result);
                        }
                    }
                    tokio::fs::write(&disk_path, change.new_content.clone().unwrap_or_default())
                        .await
                }
            };

            match write_outcome {
                Ok(()) => {
                    if let Some(ref b) = backup {
                        result.backed_up.push((path.clone(), b.backup_id.clone()));
                    }
                    result.applied.push(path.clone());
                    written.push((path.clone(), backup));
                }
                Err(e) => {
                    result.skipped.push((path.clone(), format!("io error: {e}")));
                    self.rollback_written(&mut written, &mut result).await;
                    return Ok(result);
                }
            }
        }

        self.changes.clear();
        Ok(result)
    }

    async fn rollback_written(
        &self,
        written: &mut Vec<(String, Option<BackupRecord>)>,
        result: &mut CommitResult,
    ) {
        for (path, backup) in written.drain(..) {
            if let Some(record) = backup {
                if self.backups.restore(&record).await.is_ok() {
                    result.applied.retain(|p| p != &path);
                    result.backed_up.retain(|(p, _)| p != &path);
                    result.skipped.push((path, "rolled back".to_string()));
                } else {
                    tracing::error!(path, "failed to roll back after partial commit failure");
                }
            } else {
                // File had no prior content (it was a fresh create); rollback
                // means removing what we just wrote.
                let disk_path = self.disk_path(&path);
                let _ = tokio::fs::remove_file(&disk_path).await;
                result.applied.retain(|p| p != &path);
                result.skipped.push((path, "rolled back".to_string()));
            }
        }
    }
}

/// `Stage(p, Read(p))` is observationally a no-op modulo trail entries — L1.
pub fn path_for_display(path: &Path) -> String {
    path.display().to_string()
}
