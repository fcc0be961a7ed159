//! `agentctl` — CLI entry point for the agentic code-modification runtime.
//!
//! Loads configuration, wires the model registry and dispatch client, and
//! drives one request session end to end against a project directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engine::config::Config;
use engine::dispatch::{DispatchClient, ModelRegistry};
use engine::feedback::FeedbackLoopController;
use engine::pipeline::prefilter::NullChunkSource;
use engine::pipeline::{AutoConfirm, NullCompactIndex, PipelineCollaborators, RequestSession};
use engine::tools::ToolRegistry;
use engine::validator::ValidatorPipeline;
use engine::vfs::NullProjectIndex;

#[derive(Parser)]
#[command(name = "agentctl", version, about = "Agentic code-modification runtime")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to a TOML config file; defaults are used if omitted or missing.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one request session against a project and print the outcome.
    Run {
        /// Root directory of the project to modify.
        project_root: PathBuf,
        /// Natural-language description of the change to make.
        request: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_env_overrides();

    match cli.command {
        Command::Run { project_root, request } => run(&config, &project_root, &request).await,
    }
}

async fn run(config: &Config, project_root: &PathBuf, request: &str) -> Result<()> {
    let registry = ModelRegistry::with_defaults();
    let dispatch = DispatchClient::new(registry, config.dispatch_concurrency);
    let tools = ToolRegistry::with_defaults();
    let validator = ValidatorPipeline::new();
    let feedback = FeedbackLoopController::new(
        config.max_validator_retries,
        config.max_orchestrator_revisions,
        config.max_test_runs_per_session,
    );
    let project_index = NullProjectIndex;
    let index_provider = NullCompactIndex;
    let chunk_source = NullChunkSource;
    let user_confirmation = AutoConfirm;
    let scratch_dir = std::env::temp_dir().join("agentctl-scratch");
    tokio::fs::create_dir_all(&scratch_dir).await.ok();

    let session_id = uuid::Uuid::new_v4().to_string();
    let mut session = RequestSession::new(
        session_id,
        request,
        project_root.clone(),
        &config.backup_dir,
        config.backup_retention_days,
        chrono::Utc::now(),
    );

    let collaborators = PipelineCollaborators {
        config,
        dispatch: &dispatch,
        tools: &tools,
        chunk_source: &chunk_source,
        index_provider: &index_provider,
        validator: &validator,
        project_index: &project_index,
        feedback: &feedback,
        runtime_tester: None,
        user_confirmation: &user_confirmation,
        scratch_dir: &scratch_dir,
    };

    let outcome = engine::pipeline::run_session(&mut session, &collaborators).await?;

    tracing::info!(
        session_id = %session.session_id,
        status = outcome_status(&outcome),
        attempts = session.loop_state.attempt_no,
        revisions = session.loop_state.budgets.orchestrator_revisions,
        validator_retries = session.loop_state.budgets.validator_retries,
        test_runs = session.loop_state.budgets.test_runs,
        "session finished"
    );

    println!(
        "{}",
        serde_json::to_string_pretty(&outcome_summary(&outcome, &session.loop_state))?
    );
    Ok(())
}

fn outcome_status(outcome: &engine::pipeline::SessionOutcome) -> &'static str {
    use engine::pipeline::SessionOutcome::*;
    match outcome {
        Committed(_) => "committed",
        EscalatedToUser { .. } => "escalated",
        Exhausted { .. } => "exhausted",
        Cancelled => "cancelled",
    }
}

/// Output is the final `CommitResult` plus the full `LoopState` trail
/// (budgets, revisions, validations, feedback items) serialized as JSON,
/// so a caller can audit exactly how the session got to its outcome.
fn outcome_summary(
    outcome: &engine::pipeline::SessionOutcome,
    loop_state: &engine::feedback::LoopState,
) -> serde_json::Value {
    use engine::pipeline::SessionOutcome::*;
    let result = match outcome {
        Committed(commit) => serde_json::json!({
            "status": "committed",
            "applied": commit.applied,
            "backed_up": commit.backed_up,
            "skipped": commit.skipped,
        }),
        EscalatedToUser { reason } => serde_json::json!({"status": "escalated", "reason": reason}),
        Exhausted { reason } => serde_json::json!({"status": "exhausted", "reason": reason}),
        Cancelled => serde_json::json!({"status": "cancelled"}),
    };
    serde_json::json!({
        "result": result,
        "loop_state": loop_state,
    })
}
