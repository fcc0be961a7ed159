//! Per-type bounded runtime procedures

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use super::classify::AppType;

pub const OUTPUT_CHAR_LIMIT: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmokeOutcome {
    Ran { exit_code: i32 },
    SkippedWebApp,
    ServiceReady,
    ServiceNeverBecameReady,
    SpawnFailed(String),
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct SmokeResult {
    pub app_type: AppType,
    pub outcome: SmokeOutcome,
    pub stdout_tail: String,
    pub stderr_tail: String,
    pub note: Option<String>,
}

fn truncate(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        s.to_string()
    } else {
        let head: String = s.chars().take(limit).collect();
        format!("{head}\n...[truncated]")
    }
}

/// script/CLI — execute with `--help` (or a designated entrypoint),
/// capture exit code and output tails.
pub async fn run_script_or_cli(
    interpreter: &str,
    project_root: &Path,
    entrypoint: &str,
    timeout: Duration,
) -> SmokeResult {
    let spawn = tokio::process::Command::new(interpreter)
        .arg(entrypoint)
        .arg("--help")
        .current_dir(project_root)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawn {
        Ok(c) => c,
        Err(e) => {
            return SmokeResult {
                app_type: AppType::ScriptOrCli,
                outcome: SmokeOutcome::SpawnFailed(e.to_string()),
                stdout_tail: String::new(),
                stderr_tail: String::new(),
                note: None,
            }
        }
    };

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => SmokeResult {
            app_type: AppType::ScriptOrCli,
            outcome: SmokeOutcome::Ran {
                exit_code: output.status.code().unwrap_or(-1),
            },
            stdout_tail: truncate(&String::from_utf8_lossy(&output.stdout), OUTPUT_CHAR_LIMIT),
            stderr_tail: truncate(&String::from_utf8_lossy(&output.stderr), OUTPUT_CHAR_LIMIT),
            note: None,
        },
        Ok(Err(e)) => SmokeResult {
            app_type: AppType::ScriptOrCli,
            outcome: SmokeOutcome::SpawnFailed(e.to_string()),
            stdout_tail: String::new(),
            stderr_tail: String::new(),
            note: None,
        },
        Err(_) => SmokeResult {
            app_type: AppType::ScriptOrCli,
            outcome: SmokeOutcome::TimedOut,
            stdout_tail: String::new(),
            stderr_tail: String::new(),
            note: None,
        },
    }
}

/// web — never executed; an explicit INFO note is emitted instead of a
/// silent skip.
pub fn run_web() -> SmokeResult {
    SmokeResult {
        app_type: AppType::Web,
        outcome: SmokeOutcome::SkippedWebApp,
        stdout_tail: String::new(),
        stderr_tail: String::new(),
        note: Some("web app detected; skipped runtime test, import-level checks only".to_string()),
    }
}

/// service — spawn, poll a readiness probe (TCP connect) up to `deadline`,
/// then terminate regardless of outcome.
pub async fn run_service(
    interpreter: &str,
    project_root: &Path,
    entrypoint: &str,
    readiness_addr: &str,
    deadline: Duration,
) -> SmokeResult {
    let spawn = tokio::process::Command::new(interpreter)
        .arg(entrypoint)
        .current_dir(project_root)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawn {
        Ok(c) => c,
        Err(e) => {
            return SmokeResult {
                app_type: AppType::Service,
                outcome: SmokeOutcome::SpawnFailed(e.to_string()),
                stdout_tail: String::new(),
                stderr_tail: String::new(),
                note: None,
            }
        }
    };

    let ready = wait_for_readiness(readiness_addr, deadline).await;
    let _ = child.start_kill();
    let _ = child.wait().await;

    SmokeResult {
        app_type: AppType::Service,
        outcome: if ready {
            SmokeOutcome::ServiceReady
        } else {
            SmokeOutcome::ServiceNeverBecameReady
        },
        stdout_tail: String::new(),
        stderr_tail: String::new(),
        note: None,
    }
}

async fn wait_for_readiness(addr: &str, deadline: Duration) -> bool {
    let deadline_at = tokio::time::Instant::now() + deadline;
    loop {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline_at {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// GUI/game — headless import check only, never a full UI launch.
pub async fn run_gui_or_game(
    interpreter: &str,
    project_root: &Path,
    import_expr: &str,
    timeout: Duration,
) -> SmokeResult {
    let result = crate::validator::runtime_level::validate_runtime_import(
        project_root,
        interpreter,
        "gui_headless_check",
        import_expr,
        timeout,
    )
    .await;

    SmokeResult {
        app_type: AppType::GuiOrGame,
        outcome: if result.is_empty() {
            SmokeOutcome::Ran { exit_code: 0 }
        } else {
            SmokeOutcome::Ran { exit_code: 1 }
        },
        stdout_tail: String::new(),
        stderr_tail: result.into_iter().map(|i| i.message).collect::<Vec<_>>().join("\n"),
        note: Some("headless import check only; no UI launched".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_is_never_executed_and_carries_info_note() {
        let result = run_web();
        assert_eq!(result.outcome, SmokeOutcome::SkippedWebApp);
        assert!(result.note.unwrap().contains("skipped runtime test"));
    }

    #[tokio::test]
    async fn script_spawn_failure_is_reported_not_panicked() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_script_or_cli(
            "definitely-not-a-real-interpreter-xyz",
            dir.path(),
            "main.py",
            Duration::from_secs(5),
        )
        .await;
        assert!(matches!(result.outcome, SmokeOutcome::SpawnFailed(_)));
    }

    #[tokio::test]
    async fn service_never_ready_reports_explicit_outcome() {
        let result = wait_for_readiness("127.0.0.1:1", Duration::from_millis(200)).await;
        assert!(!result);
    }

    #[test]
    fn truncate_caps_long_output() {
        let long = "y".repeat(5000);
        let out = truncate(&long, OUTPUT_CHAR_LIMIT);
        assert!(out.len() < 5000);
    }
}
