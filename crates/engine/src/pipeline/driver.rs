//! Pipeline driver: the nine-step flow from a user request to
//! a [`SessionOutcome`]: load project index → route → pre-filter →
//! orchestrate → generate code → stage → validate → decide → commit.

use std::path::Path;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::dispatch::{CallOptions, DispatchClient, DispatchError, Message};
use crate::feedback::{Decision, FeedbackLoopController};
use crate::router::{self, RouterTier};
use crate::runtime_tester::RuntimeTester;
use crate::tools::{ToolContext, ToolRegistry};
use crate::validator::ValidatorPipeline;
use crate::vfs::{ProjectIndex, VfsChange};

use super::ai_validator::{self, choose_model};
use super::codegen::{generate_with_retry, parse_code_blocks};
use super::prefilter::{Chunk, ChunkSource};
use super::session::RequestSession;
use super::stager::stage_and_check;
use super::types::{PipelineInstruction, SessionOutcome, ToolTraceEntry};
use super::PipelineError;

/// Project-index loading boundary: a missing index degrades to a fixed
/// placeholder string rather than failing the request.
pub trait CompactIndexProvider: Send + Sync {
    fn load(&self, project_root: &Path) -> Option<String>;
}

#[derive(Default)]
pub struct NullCompactIndex;
impl CompactIndexProvider for NullCompactIndex {
    fn load(&self, _project_root: &Path) -> Option<String> {
        None
    }
}

const MISSING_INDEX_PLACEHOLDER: &str = "[Project index not available. Please run indexing first.]";

fn load_compact_index(provider: &dyn CompactIndexProvider, project_root: &Path) -> String {
    match provider.load(project_root) {
        Some(text) => text,
        None => {
            tracing::warn!("compact project index unavailable, using placeholder");
            MISSING_INDEX_PLACEHOLDER.to_string()
        }
    }
}

/// Boundary the driver asks before committing a staged change. Returns the
/// concrete action the user took  rather than a bare
/// bool, so a still-outstanding validator critique can be overridden,
/// replaced, accepted, or the whole request cancelled.
pub trait UserConfirmation: Send + Sync {
    fn decide(&self, instruction: &str) -> crate::feedback::UserAction;
}

/// Always overrides and proceeds — used in unattended/batch runs.
pub struct AutoConfirm;
impl UserConfirmation for AutoConfirm {
    fn decide(&self, _instruction: &str) -> crate::feedback::UserAction {
        crate::feedback::UserAction::OverrideValidator
    }
}

const ORCHESTRATOR_MAX_TOOL_ITERATIONS: u32 = 8;

/// Orchestrator. Drives a tool-calling loop against the
/// routed model until it emits a final instruction with no further tool
/// calls, or the iteration budget runs out and it is forced to finalize.
/// Does not generate code itself, only instructions, mirroring
/// `orchestrator.py`.
pub struct Orchestrator<'a> {
    pub client: &'a DispatchClient,
    pub tools: &'a ToolRegistry,
    pub max_tool_iterations: u32,
    pub compressor_model: String,
}

impl<'a> Orchestrator<'a> {
    pub fn new(client: &'a DispatchClient, tools: &'a ToolRegistry, compressor_model: impl Into<String>) -> Self {
        Self {
            client,
            tools,
            max_tool_iterations: ORCHESTRATOR_MAX_TOOL_ITERATIONS,
            compressor_model: compressor_model.into(),
        }
    }

    pub async fn run(
        &self,
        model: &str,
        tier: RouterTier,
        system_prompt: &str,
        user_request: &str,
        vfs: &crate::vfs::VirtualFileSystem,
        project_root: &Path,
        cancel: &CancellationToken,
    ) -> Result<PipelineInstruction, PipelineError> {
        let mut messages = vec![Message::system(system_prompt), Message::user(user_request)];
        let mut tool_trace = Vec::new();
        let specs = self.tools.as_dispatch_specs();

        for _ in 0..self.max_tool_iterations {
            let options = CallOptions {
                tools: Some(specs.clone()),
                tool_choice: Some("auto".to_string()),
                ..Default::default()
            };
            let resp = self
                .call_with_tools_resilient(model, &mut messages, &options, cancel)
                .await?;

            if resp.tool_calls.is_empty() {
                return Ok(PipelineInstruction {
                    instruction: resp.content,
                    target_files: extract_target_files(&messages),
                    complexity: tier,
                    tool_trace,
                });
            }

            messages.push(Message::assistant_with_reasoning(
                resp.content.clone(),
                resp.reasoning_payload.clone(),
            ));
            let ctx = ToolContext { vfs, project_root };
            for call in &resp.tool_calls {
                let result = match self.tools.dispatch(&call.name, call.arguments.clone(), &ctx).await {
                    Ok(out) => out,
                    Err(err) => err.to_xml(),
                };
                tool_trace.push(ToolTraceEntry {
                    tool_name: call.name.clone(),
                    arguments: call.arguments.clone(),
                    result_summary: result.chars().take(500).collect(),
                });
                messages.push(Message::user(format!(
                    "<tool_result name=\"{}\">{}</tool_result>",
                    call.name,
                    truncate_tool_output(&result)
                )));
            }
        }

        // Tool budget exhausted — force a final, tool-free call so the
        // orchestrator must commit to an instruction (step 4).
        let resp = self
            .client
            .call(model, &messages, &CallOptions::default(), cancel)
            .await?;
        if resp.content.trim().is_empty() {
            return Err(PipelineError::NoInstructionProduced);
        }
        Ok(PipelineInstruction {
            instruction: resp.content,
            target_files: extract_target_files(&messages),
            complexity: tier,
            tool_trace,
        })
    }

    /// `call_with_tools`, reactively compressing and retrying once on
    /// `DispatchError::ContextOverflow` : the dispatch
    /// layer surfaces the overflow rather than retrying it itself, so the
    /// caller invokes C8 and retries the same call with the compacted
    /// conversation.
    async fn call_with_tools_resilient(
        &self,
        model: &str,
        messages: &mut Vec<Message>,
        options: &CallOptions,
        cancel: &CancellationToken,
    ) -> Result<crate::dispatch::DispatchResponse, PipelineError> {
        match self.client.call_with_tools(model, messages, options, cancel).await {
            Ok(resp) => Ok(resp),
            Err(err) if crate::context_compressor::reactive::is_context_overflow(&err) => {
                *messages = crate::context_compressor::reactive::compress_after_overflow(
                    self.client,
                    &self.compressor_model,
                    messages,
                    cancel,
                )
                .await;
                self.client
                    .call_with_tools(model, messages, options, cancel)
                    .await
                    .map_err(PipelineError::Dispatch)
            }
            Err(err) => Err(PipelineError::Dispatch(err)),
        }
    }
}

/// Fixed character budget for a single tool result appended to the
/// orchestrator conversation — the same budget `runtime_tester::runner`
/// uses for captured process output. Caps mid-iteration overflow from one
/// oversized tool call without invoking the compressor (itself an LLM
/// call) synchronously inside the tool loop.
const TOOL_OUTPUT_BUDGET: usize = 2_000;

fn truncate_tool_output(output: &str) -> std::borrow::Cow<'_, str> {
    if output.len() <= TOOL_OUTPUT_BUDGET {
        std::borrow::Cow::Borrowed(output)
    } else {
        std::borrow::Cow::Owned(format!("{}... [truncated]", &output[..TOOL_OUTPUT_BUDGET]))
    }
}

/// Best-effort extraction of file paths the conversation touched, scanning
/// tool-call arguments and message content for path-shaped tokens. Not a
/// substitute for the orchestrator stating `target_files` explicitly in a
/// richer wire format Non-goals leaves a structured instruction
/// schema out of scope.
fn extract_target_files(messages: &[Message]) -> Vec<String> {
    let mut found = std::collections::BTreeSet::new();
    for msg in messages {
        for word in msg.content.split_whitespace() {
            let trimmed = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '.' && c != '/' && c != '_');
            if trimmed.contains('/')
                && (trimmed.ends_with(".py") || trimmed.ends_with(".ts") || trimmed.ends_with(".go") || trimmed.ends_with(".sql"))
            {
                found.insert(trimmed.to_string());
            }
        }
    }
    found.into_iter().collect()
}

/// Run the Router's cheap classification call, falling back to
/// `RouterTier::Simple` on any dispatch failure.
async fn classify_complexity(
    client: &DispatchClient,
    model: &str,
    user_request: &str,
    cancel: &CancellationToken,
) -> Option<String> {
    let messages = vec![
        Message::system("Classify the following coding task as simple, medium, or complex. Respond with one word."),
        Message::user(user_request),
    ];
    match client.call(model, &messages, &CallOptions::default(), cancel).await {
        Ok(resp) if !resp.content.trim().is_empty() => Some(resp.content),
        _ => None,
    }
}

/// Everything the driver needs beyond the session itself — grouped so
/// `run_session`'s signature doesn't grow unboundedly as the pipeline gains
/// collaborators.
pub struct PipelineCollaborators<'a> {
    pub config: &'a Config,
    pub dispatch: &'a DispatchClient,
    pub tools: &'a ToolRegistry,
    pub chunk_source: &'a dyn ChunkSource,
    pub index_provider: &'a dyn CompactIndexProvider,
    pub validator: &'a ValidatorPipeline,
    pub project_index: &'a dyn ProjectIndex,
    pub feedback: &'a FeedbackLoopController,
    pub runtime_tester: Option<&'a RuntimeTester>,
    pub user_confirmation: &'a dyn UserConfirmation,
    pub scratch_dir: &'a Path,
}

/// Drive one request session end to end. Returns whatever
/// terminal outcome the feedback loop reached; never panics on
/// orchestrator/validator/user feedback, only on a genuinely fatal
/// configuration problem (propagated as [`PipelineError`]).
pub async fn run_session(
    session: &mut RequestSession,
    collab: &PipelineCollaborators<'_>,
) -> Result<SessionOutcome, PipelineError> {
    let project_index_text = load_compact_index(collab.index_provider, &session.project_root);

    let classifier_model = &collab.config.ai_validator_model_small;
    let classification = classify_complexity(
        collab.dispatch,
        classifier_model,
        &session.user_request,
        &session.cancel,
    )
    .await;
    let routing = router::route(collab.config, classification.as_deref());
    session.orchestrator_model = Some(routing.model.clone());

    let chunks: Vec<Chunk> = collab.chunk_source.available_chunks(&session.project_root);
    let selection_prompt = format!(
        "Project index:\n{project_index_text}\n\nUser request:\n{}\n\nAvailable chunks:\n{}",
        session.user_request,
        chunks.iter().map(|c| format!("{} ({})", c.id, c.file_path)).collect::<Vec<_>>().join("\n")
    );
    let selected_chunks = if chunks.is_empty() {
        Vec::new()
    } else {
        let resp = collab
            .dispatch
            .call(
                classifier_model,
                &[Message::system("Select the chunks most relevant to the request. Respond as JSON: {\"selected_ids\": [...]}."), Message::user(selection_prompt)],
                &CallOptions::default(),
                &session.cancel,
            )
            .await?;
        super::prefilter::select_from_response(
            &chunks,
            &resp.content,
            collab.config.pre_filter_max_chunks,
            collab.config.pre_filter_max_tokens,
        )
    };

    let orchestrator = Orchestrator::new(collab.dispatch, collab.tools, collab.config.compressor_model.clone());
    let system_prompt = format!(
        "You are the orchestrator for an automated code-modification session. \
         Use the available tools to understand the codebase, then emit a \
         precise natural-language instruction for the code generator. You do \
         not write code yourself.\n\nProject index:\n{project_index_text}\n\n\
         Selected context:\n{}",
        selected_chunks.iter().map(|c| format!("--- {} ---\n{}", c.file_path, c.content)).collect::<Vec<_>>().join("\n\n")
    );

    let mut instruction = orchestrator
        .run(
            &routing.model,
            routing.tier,
            &system_prompt,
            &session.user_request,
            &session.vfs,
            &session.project_root,
            &session.cancel,
        )
        .await?;

    loop {
        if session.is_cancelled() {
            return Ok(SessionOutcome::Cancelled);
        }

        let codegen_messages = vec![
            Message::system(
                "You are the code generator. Emit one or more FILE:/MODE: headed, \
                 fenced code blocks implementing the instruction exactly.",
            ),
            Message::user(instruction.instruction.clone()),
        ];
        let raw_blocks = generate_with_retry(
            collab.dispatch,
            &routing.model,
            &codegen_messages,
            &CallOptions::default(),
            &session.cancel,
        )
        .await
        .map_err(PipelineError::Dispatch)?;

        let (blocks, unparsed) = parse_code_blocks(&raw_blocks);
        for bad in &unparsed {
            collab.feedback.record_staging_error(
                &mut session.loop_state,
                bad.file_path.clone(),
                bad.raw_mode.clone(),
                format!("unrecognized MODE '{}'", bad.raw_mode),
                crate::feedback::StagingErrorType::InvalidMode,
                None,
                None,
                None,
                Utc::now(),
            );
        }

        let mut any_staging_failure = false;
        for block in &blocks {
            let existing = session.vfs.read(&block.file_path).map_err(PipelineError::Vfs)?;
            match stage_and_check(existing.as_deref(), block) {
                Ok(new_content) => {
                    let change = if existing.is_some() {
                        VfsChange::modify(new_content, Some(block.id.clone()))
                    } else {
                        VfsChange::create(new_content, Some(block.id.clone()))
                    };
                    session.vfs.stage(block.file_path.clone(), change);
                }
                Err(failure) => {
                    any_staging_failure = true;
                    collab.feedback.record_staging_error(
                        &mut session.loop_state,
                        block.file_path.clone(),
                        block.mode.as_str().to_string(),
                        failure.message,
                        failure.error_type,
                        block.target_class.clone(),
                        block.target_method.clone(),
                        block.target_function.clone(),
                        Utc::now(),
                    );
                }
            }
        }

        if any_staging_failure {
            // Staging errors are free (P5): re-issue the orchestrator
            // directly, without touching `max_orchestrator_revisions`.
            instruction = revise_for_free(collab, session, &instruction).await?;
            continue;
        }

        let affected = session.vfs.affected_files(collab.project_index, 1);
        let validation = collab
            .validator
            .run(collab.config, &session.vfs, &affected, collab.scratch_dir)
            .await
            .map_err(PipelineError::Validator)?;

        let decision = collab.feedback.submit_validation(&mut session.loop_state, validation, None, Utc::now());
        match decision {
            Decision::Revise => {
                instruction = revise_or_bail(collab, session, &instruction).await?;
                continue;
            }
            Decision::Exhausted(reason) => return Ok(SessionOutcome::Exhausted { reason }),
            Decision::EscalateToUser => return Ok(SessionOutcome::EscalatedToUser { reason: "validator escalation".into() }),
            Decision::Cancelled => return Ok(SessionOutcome::Cancelled),
            Decision::Accepted => {}
        }

        let context_tokens: usize = affected.changed.iter().filter_map(|f| session.vfs.read(f).ok().flatten()).map(|c| c.len() / 4).sum();
        let verdict_model = choose_model(collab.config, context_tokens);
        let verdict_prompt = format!(
            "Does the following change correctly address the request?\n\nRequest:\n{}\n\nInstruction given to the code generator:\n{}\n\nRespond as JSON: {{\"approved\": bool, \"confidence\": number, \"verdict\": string, \"critical_issues\": [string]}}.",
            session.user_request, instruction.instruction,
        );
        let verdict_resp = collab
            .dispatch
            .call(verdict_model, &[Message::user(verdict_prompt)], &CallOptions::default(), &session.cancel)
            .await?;
        let verdict = ai_validator::parse_verdict(&verdict_resp.content);

        let decision = collab.feedback.submit_ai_validator(
            &mut session.loop_state,
            verdict.approved,
            verdict.confidence,
            verdict.verdict.clone(),
            verdict.critical_issues.clone(),
            verdict_model.to_string(),
            None,
            Utc::now(),
        );
        match decision {
            Decision::Revise => {
                instruction = revise_or_bail(collab, session, &instruction).await?;
                continue;
            }
            Decision::Exhausted(reason) => return Ok(SessionOutcome::Exhausted { reason }),
            Decision::EscalateToUser => return Ok(SessionOutcome::EscalatedToUser { reason: "ai validator escalation".into() }),
            Decision::Cancelled => return Ok(SessionOutcome::Cancelled),
            Decision::Accepted => {}
        }

        if let Some(tester) = collab.runtime_tester {
            let file_contents: Vec<(String, String)> = affected
                .changed
                .iter()
                .filter_map(|f| session.vfs.read(f).ok().flatten().map(|c| (f.clone(), c)))
                .collect();
            let smoke = tester.run(&session.project_root, &file_contents, affected.changed.len()).await;
            if !matches!(
                smoke.outcome,
                crate::runtime_tester::SmokeOutcome::Ran { exit_code: 0 }
                    | crate::runtime_tester::SmokeOutcome::ServiceReady
                    | crate::runtime_tester::SmokeOutcome::SkippedWebApp
            ) {
                let decision = collab.feedback.record_test_error(
                    &mut session.loop_state,
                    "runtime_smoke",
                    format!("{:?}", smoke.outcome),
                    Some(smoke.stderr_tail.clone()),
                    file_contents.first().map(|(p, _)| p.clone()),
                    Utc::now(),
                );
                match decision {
                    Decision::Revise => {
                        instruction = revise_or_bail(collab, session, &instruction).await?;
                        continue;
                    }
                    Decision::Exhausted(reason) => return Ok(SessionOutcome::Exhausted { reason }),
                    Decision::EscalateToUser => {
                        return Ok(SessionOutcome::EscalatedToUser { reason: "runtime smoke escalation".into() })
                    }
                    Decision::Cancelled => return Ok(SessionOutcome::Cancelled),
                    Decision::Accepted => {}
                }
            }
        }

        let action = collab.user_confirmation.decide(&instruction.instruction);
        let decision = collab.feedback.apply_user_action(
            &mut session.loop_state,
            action,
            instruction.instruction.clone(),
            Utc::now(),
        );
        match decision {
            Decision::Accepted => {
                let commit = session.vfs.commit().await.map_err(PipelineError::Vfs)?;
                return Ok(SessionOutcome::Committed(commit));
            }
            Decision::Revise => {
                // User feedback at UserConfirm is free, like staging errors:
                // it must be acted on, but it isn't a validator retry.
                instruction = revise_for_free(collab, session, &instruction).await?;
                continue;
            }
            Decision::Cancelled => return Ok(SessionOutcome::Cancelled),
            Decision::Exhausted(reason) => return Ok(SessionOutcome::Exhausted { reason }),
            Decision::EscalateToUser => {
                return Ok(SessionOutcome::EscalatedToUser { reason: "user declined to confirm the staged change".into() })
            }
        }
    }
}

/// After a `Revise` decision driven by the Change Validator, the AI
/// Validator, or a test/runtime failure: consume the orchestrator-revision
/// budget, then ask the orchestrator to produce a new instruction
/// incorporating the accumulated feedback. A budget exhaustion here ends
/// the session.
///
/// Must stay reserved for validator/AI-validator/test-error triggered
/// revisions — staging errors are free (P5) and go through
/// [`revise_for_free`] instead, which skips the budget entirely.
async fn revise_or_bail(
    collab: &PipelineCollaborators<'_>,
    session: &mut RequestSession,
    previous: &PipelineInstruction,
) -> Result<PipelineInstruction, PipelineError> {
    let decision = collab.feedback.begin_revision(
        &mut session.loop_state,
        previous.instruction.chars().take(200).collect::<String>(),
        Utc::now(),
    );
    if let Decision::Exhausted(reason) = decision {
        return Err(PipelineError::Dispatch(DispatchError::Fatal {
            model: previous.complexity.to_string(),
            message: reason,
        }));
    }

    reissue_instruction(collab, session, previous).await
}

/// Re-issue the orchestrator for a `StagingErrorFeedback`-driven revision,
/// without consuming `max_orchestrator_revisions` (P5, spec scenario 2:
/// "revision counter remains unchanged" after a staging error).
async fn revise_for_free(
    collab: &PipelineCollaborators<'_>,
    session: &mut RequestSession,
    previous: &PipelineInstruction,
) -> Result<PipelineInstruction, PipelineError> {
    reissue_instruction(collab, session, previous).await
}

/// Ask the orchestrator to produce a new instruction incorporating the
/// accumulated feedback trail. Shared by the budgeted (`revise_or_bail`)
/// and free (`revise_for_free`) paths; does not itself touch any budget.
async fn reissue_instruction(
    collab: &PipelineCollaborators<'_>,
    session: &mut RequestSession,
    previous: &PipelineInstruction,
) -> Result<PipelineInstruction, PipelineError> {
    let feedback_summary = session
        .loop_state
        .feedback_trail
        .iter()
        .rev()
        .take(5)
        .map(|item| format!("{:?}", item.payload))
        .collect::<Vec<_>>()
        .join("\n");

    let orchestrator = Orchestrator::new(collab.dispatch, collab.tools, collab.config.compressor_model.clone());
    let model = session.orchestrator_model.clone().unwrap_or_else(|| RouterTier::Simple.default_model().to_string());
    let system_prompt = format!(
        "Revise the previous instruction in light of this feedback, staying \
         faithful to the original request.\n\nPrevious instruction:\n{}\n\n\
         Feedback:\n{feedback_summary}",
        previous.instruction
    );
    orchestrator
        .run(
            &model,
            previous.complexity,
            &system_prompt,
            &session.user_request,
            &session.vfs,
            &session.project_root,
            &session.cancel,
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_tool_output_is_not_truncated() {
        assert_eq!(truncate_tool_output("ok"), "ok");
    }

    #[test]
    fn long_tool_output_is_truncated_to_the_budget() {
        let big = "x".repeat(TOOL_OUTPUT_BUDGET + 500);
        let truncated = truncate_tool_output(&big);
        assert!(truncated.ends_with("... [truncated]"));
        assert!(truncated.len() < big.len());
    }

    #[test]
    fn missing_index_falls_back_to_placeholder() {
        let text = load_compact_index(&NullCompactIndex, Path::new("/tmp"));
        assert_eq!(text, MISSING_INDEX_PLACEHOLDER);
    }

    #[test]
    fn extract_target_files_picks_path_shaped_tokens() {
        let messages = vec![Message::user("please edit app/services/user.py and app/models/order.py")];
        let found = extract_target_files(&messages);
        assert_eq!(found, vec!["app/models/order.py".to_string(), "app/services/user.py".to_string()]);
    }

    #[test]
    fn extract_target_files_ignores_plain_words() {
        let messages = vec![Message::user("please fix the bug quickly")];
        assert!(extract_target_files(&messages).is_empty());
    }
}
