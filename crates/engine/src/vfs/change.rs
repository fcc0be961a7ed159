//! Per-file pending mutation `VFSChange`.

use serde::{Deserialize, Serialize};

/// What kind of mutation is staged for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Create,
    Modify,
    Delete,
}

/// A single staged change. At most one is active per path in the VFS; a
/// second `Stage` on the same path replaces it (the old entry moves to the
/// session trail rather than being dropped.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VfsChange {
    pub kind: ChangeKind,
    pub new_content: Option<String>,
    pub origin_block_id: Option<String>,
}

impl VfsChange {
    pub fn create(content: impl Into<String>, origin_block_id: Option<String>) -> Self {
        Self {
            kind: ChangeKind::Create,
            new_content: Some(content.into()),
            origin_block_id,
        }
    }

    pub fn modify(content: impl Into<String>, origin_block_id: Option<String>) -> Self {
        Self {
            kind: ChangeKind::Modify,
            new_content: Some(content.into()),
            origin_block_id,
        }
    }

    pub fn delete(origin_block_id: Option<String>) -> Self {
        Self {
            kind: ChangeKind::Delete,
            new_content: None,
            origin_block_id,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self.kind, ChangeKind::Delete)
    }
}
