//! Runtime Tester (C5)
//!
//! Produces a bounded, honest smoke signal: classify the application type
//! by static markers, then run a capped per-type procedure. Distinct from
//! the Change Validator's `runtime` level (which only import-checks
//! changed modules) — this runs (or explicitly skips) the application
//! itself.

pub mod classify;
pub mod runner;
pub mod timeout_calc;

use std::path::Path;
use std::time::Duration;

pub use classify::AppType;
pub use runner::{SmokeOutcome, SmokeResult};
pub use timeout_calc::{compute_timeout, ProjectSize};

/// Entrypoint detection: convention-based, looking for the most common
/// markers (`main.py`, `app.py`, `manage.py`) rather than a full project
/// scan — a full resolver is an external collaborator's job (
/// Non-goals).
pub fn guess_entrypoint(candidates: &[String]) -> Option<String> {
    const PREFERRED: &[&str] = &["main.py", "app.py", "manage.py", "run.py", "server.py"];
    for name in PREFERRED {
        if let Some(found) = candidates.iter().find(|c| c.ends_with(name)) {
            return Some(found.clone());
        }
    }
    candidates.first().cloned()
}

/// Drive the classify → run-capped-procedure flow for one session.
pub struct RuntimeTester {
    pub interpreter: String,
    pub readiness_addr: String,
}

impl RuntimeTester {
    pub async fn run(
        &self,
        project_root: &Path,
        file_contents: &[(String, String)],
        affected_file_count: usize,
    ) -> SmokeResult {
        let (app_type, note) = classify::classify(file_contents);
        let timeout = compute_timeout(affected_file_count);

        let mut result = match app_type {
            AppType::Web => runner::run_web(),
            AppType::Service => {
                let entrypoint = guess_entrypoint(
                    &file_contents.iter().map(|(p, _)| p.clone()).collect::<Vec<_>>(),
                )
                .unwrap_or_else(|| "main.py".to_string());
                runner::run_service(&self.interpreter, project_root, &entrypoint, &self.readiness_addr, timeout).await
            }
            AppType::GuiOrGame => {
                let expr = file_contents
                    .first()
                    .map(|(p, _)| crate::validator::runtime_level::python_import_expr(p))
                    .unwrap_or_default();
                runner::run_gui_or_game(&self.interpreter, project_root, &expr, timeout).await
            }
            AppType::ScriptOrCli | AppType::Unknown => {
                let entrypoint = guess_entrypoint(
                    &file_contents.iter().map(|(p, _)| p.clone()).collect::<Vec<_>>(),
                )
                .unwrap_or_else(|| "main.py".to_string());
                runner::run_script_or_cli(&self.interpreter, project_root, &entrypoint, timeout).await
            }
        };

        if app_type == AppType::Unknown {
            result.note = Some(note.unwrap_or_else(|| "unknown application type".to_string()));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guess_entrypoint_prefers_main_py() {
        let candidates = vec!["app/utils.py".to_string(), "app/main.py".to_string()];
        assert_eq!(guess_entrypoint(&candidates), Some("app/main.py".to_string()));
    }

    #[test]
    fn guess_entrypoint_falls_back_to_first_candidate() {
        let candidates = vec!["app/utils.py".to_string()];
        assert_eq!(guess_entrypoint(&candidates), Some("app/utils.py".to_string()));
    }

    #[tokio::test]
    async fn web_app_is_classified_and_skipped_without_spawning() {
        let tester = RuntimeTester {
            interpreter: "python3".into(),
            readiness_addr: "127.0.0.1:0".into(),
        };
        let dir = tempfile::tempdir().unwrap();
        let files = vec![("app.py".to_string(), "from flask import Flask\n".to_string())];
        let result = tester.run(dir.path(), &files, 1).await;
        assert_eq!(result.outcome, SmokeOutcome::SkippedWebApp);
    }
}
