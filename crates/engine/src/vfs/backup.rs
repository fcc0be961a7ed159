//! Backup Manager — serializes per-path backups during `Commit` so a
//! partial failure can be rolled back. Backups land at
//! `<project>/.backups/<session-id>/<path>`.

use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("io error backing up '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no backup found for id '{0}'")]
    NotFound(String),
}

/// One taken backup: a path's prior content, frozen under a backup id.
#[derive(Debug, Clone)]
pub struct BackupRecord {
    pub backup_id: String,
    pub original_path: PathBuf,
    pub backup_path: PathBuf,
    pub taken_at: chrono::DateTime<Utc>,
}

/// Serializes backup/restore operations for one session, rooted at
/// `<project_root>/<backup_dir>/<session_id>/`.
pub struct BackupManager {
    session_dir: PathBuf,
    retention_days: u32,
    lock: Mutex<()>,
}

impl BackupManager {
    pub fn new(project_root: impl AsRef<Path>, backup_dir: &str, session_id: &str, retention_days: u32) -> Self {
        Self {
            session_dir: project_root.as_ref().join(backup_dir).join(session_id),
            retention_days,
            lock: Mutex::new(()),
        }
    }

    /// Take a backup of `path`'s current disk content, if it exists. Returns
    /// `None` if the file doesn't exist on disk yet (nothing to back up for
    /// a fresh `create`).
    pub async fn backup(&self, path: &Path) -> Result<Option<BackupRecord>, BackupError> {
        let _guard = self.lock.lock().await;

        if !path.exists() {
            return Ok(None);
        }

        let backup_id = uuid::Uuid::new_v4().to_string();
        let backup_path = self.session_dir.join(&backup_id);

        if let Some(parent) = backup_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(path, e))?;
        }

        tokio::fs::copy(path, &backup_path)
            .await
            .map_err(|e| io_err(path, e))?;

        Ok(Some(BackupRecord {
            backup_id,
            original_path: path.to_path_buf(),
            backup_path,
            taken_at: Utc::now(),
        }))
    }

    /// Restore a previously-taken backup back onto disk, overwriting
    /// whatever partial write is currently there.
    pub async fn restore(&self, record: &BackupRecord) -> Result<(), BackupError> {
        let _guard = self.lock.lock().await;
        tokio::fs::copy(&record.backup_path, &record.original_path)
            .await
            .map_err(|e| io_err(&record.original_path, e))?;
        Ok(())
    }

    /// Delete backup directories older than `retention_days`. Errors per
    /// entry are logged and skipped; this is best-effort housekeeping, not
    /// part of commit correctness.
    pub async fn cleanup_expired(&self, backups_root: impl AsRef<Path>) -> Result<usize, BackupError> {
        let root = backups_root.as_ref();
        if !root.exists() {
            return Ok(0);
        }
        let cutoff = Utc::now() - chrono::Duration::days(self.retention_days as i64);
        let mut removed = 0;

        let mut entries = tokio::fs::read_dir(root)
            .await
            .map_err(|e| io_err(root, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_err(root, e))?
        {
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(path = ?entry.path(), error = %e, "skipping backup entry, metadata read failed");
                    continue;
                }
            };
            let modified: chrono::DateTime<Utc> = match metadata.modified() {
                Ok(t) => t.into(),
                Err(_) => continue,
            };
            if modified < cutoff {
                if tokio::fs::remove_dir_all(entry.path()).await.is_ok() {
                    removed += 1;
                } else {
                    tracing::warn!(path = ?entry.path(), "failed to remove expired backup dir");
                }
            }
        }

        Ok(removed)
    }
}

fn io_err(path: &Path, source: std::io::Error) -> BackupError {
    BackupError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn backup_of_missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = BackupManager::new(dir.path(), ".backups", "sess-1", 7);
        let missing = dir.path().join("nope.txt");
        assert!(mgr.backup(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn backup_and_restore_round_trips_content() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("a.txt");
        std::fs::File::create(&file_path)
            .unwrap()
            .write_all(b"original")
            .unwrap();

        let mgr = BackupManager::new(dir.path(), ".backups", "sess-1", 7);
        let record = mgr.backup(&file_path).await.unwrap().unwrap();

        std::fs::write(&file_path, b"corrupted").unwrap();
        mgr.restore(&record).await.unwrap();

        let restored = std::fs::read_to_string(&file_path).unwrap();
        assert_eq!(restored, "original");
    }
}
