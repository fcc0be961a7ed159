//! `RequestSession` exclusively owns its VFS, `LoopState`, and all
//! in-flight blocks for the lifetime of one request.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::feedback::LoopState;
use crate::vfs::{BackupManager, VirtualFileSystem};

/// One user request end to end. Created per request, dropped after commit
/// or explicit cancel — never shared or reused across requests.
pub struct RequestSession {
    pub session_id: String,
    pub user_request: String,
    pub project_root: PathBuf,
    pub orchestrator_model: Option<String>,
    pub vfs: VirtualFileSystem,
    pub loop_state: LoopState,
    pub cancel: CancellationToken,
    pub created_at: DateTime<Utc>,
}

impl RequestSession {
    pub fn new(
        session_id: impl Into<String>,
        user_request: impl Into<String>,
        project_root: impl Into<PathBuf>,
        backup_dir: &str,
        backup_retention_days: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        let session_id = session_id.into();
        let project_root = project_root.into();
        let backups = BackupManager::new(&project_root, backup_dir, &session_id, backup_retention_days);
        Self {
            vfs: VirtualFileSystem::new(&project_root, backups),
            session_id,
            user_request: user_request.into(),
            project_root,
            orchestrator_model: None,
            loop_state: LoopState::new(),
            cancel: CancellationToken::new(),
            created_at,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn new_session_owns_a_fresh_vfs_and_loop_state() {
        let dir = tempfile::tempdir().unwrap();
        let session = RequestSession::new("sess-1", "add a feature", dir.path(), ".backups", 7, ts());
        assert!(session.vfs.staged_files().is_empty());
        assert_eq!(session.loop_state.attempt_no, 0);
        assert!(!session.is_cancelled());
    }

    #[test]
    fn cancel_marks_the_session_cancellation_token() {
        let dir = tempfile::tempdir().unwrap();
        let session = RequestSession::new("sess-1", "req", dir.path(), ".backups", 7, ts());
        session.cancel();
        assert!(session.is_cancelled());
    }
}
