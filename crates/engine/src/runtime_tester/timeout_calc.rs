//! Timeout Calculator: timeouts derived from project size category,
//! never exceeding 60 s.

use std::time::Duration;

pub const MAX_RUNTIME_TIMEOUT_SEC: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectSize {
    Small,
    Medium,
    Large,
}

impl ProjectSize {
    /// Bucket by affected-file count — a project touching few files gets
    /// a short smoke-test window; a large affected set gets more time to
    /// import everything, still capped at `MAX_RUNTIME_TIMEOUT_SEC`.
    pub fn from_file_count(count: usize) -> Self {
        if count <= 5 {
            ProjectSize::Small
        } else if count <= 50 {
            ProjectSize::Medium
        } else {
            ProjectSize::Large
        }
    }

    pub fn base_timeout_sec(&self) -> u64 {
        match self {
            ProjectSize::Small => 10,
            ProjectSize::Medium => 25,
            ProjectSize::Large => MAX_RUNTIME_TIMEOUT_SEC,
        }
    }
}

pub fn compute_timeout(file_count: usize) -> Duration {
    let size = ProjectSize::from_file_count(file_count);
    Duration::from_secs(size.base_timeout_sec().min(MAX_RUNTIME_TIMEOUT_SEC))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_project_gets_short_timeout() {
        assert_eq!(ProjectSize::from_file_count(3), ProjectSize::Small);
        assert_eq!(compute_timeout(3), Duration::from_secs(10));
    }

    #[test]
    fn large_project_is_capped_at_60s() {
        assert_eq!(ProjectSize::from_file_count(500), ProjectSize::Large);
        assert_eq!(compute_timeout(500), Duration::from_secs(60));
    }

    #[test]
    fn medium_project_falls_between() {
        assert_eq!(ProjectSize::from_file_count(20), ProjectSize::Medium);
        assert_eq!(compute_timeout(20), Duration::from_secs(25));
    }
}
