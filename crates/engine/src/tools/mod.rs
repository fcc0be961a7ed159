//! Tool Executor (C2). Dispatches named tool calls routed
//! through the VFS. Exposes a fixed, string-keyed registry; no dynamic
//! attribute lookup ("closed tool registry keyed by string name").

pub mod dep_tools;
pub mod fs_tools;
pub mod search_tools;
pub mod test_tools;
pub mod web_tools;
pub mod xml;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::vfs::VirtualFileSystem;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    #[error("invalid arguments for '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },
    #[error("tool '{tool}' budget exhausted ({used}/{limit} invocations this session)")]
    BudgetExhausted {
        tool: String,
        used: u32,
        limit: u32,
    },
    #[error("tool '{tool}' timed out after {timeout_sec}s")]
    Timeout { tool: String, timeout_sec: u64 },
    #[error("tool '{tool}' failed: {message}")]
    ExecutionFailed { tool: String, message: String },
}

impl ToolError {
    /// Render as the `<error>` structure every tool output uses on failure
    ///
    pub fn to_xml(&self) -> String {
        let suggestion = match self {
            ToolError::UnknownTool(_) => Some("check the tool name against the registry"),
            ToolError::InvalidArguments { .. } => Some("verify the argument schema"),
            ToolError::BudgetExhausted { .. } => {
                Some("this session has exhausted its invocation budget for this tool")
            }
            ToolError::Timeout { .. } => Some("retry with a narrower scope or higher timeout"),
            ToolError::ExecutionFailed { .. } => None,
        };
        xml::wrap_error(&self.to_string(), suggestion)
    }
}

/// Shared, read-only context every tool handler needs: the session's VFS
/// (staged-first reads), the project root, and per-session invocation
/// counters for budgeted tools.
pub struct ToolContext<'a> {
    pub vfs: &'a VirtualFileSystem,
    pub project_root: &'a std::path::Path,
}

/// A single registered tool: name, JSON-Schema argument shape, handler.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn parameter_schema(&self) -> Value;
    async fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> Result<String, ToolError>;
}

/// Fixed registry of tools exposed to agents
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registry with every concrete tool wired up; external collaborators
    /// (semantic index, test runner, dependency manager, web knowledge)
    /// default to their `Null*` no-op implementation until a real backend
    /// is plugged in.
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        reg.register(Arc::new(fs_tools::ReadFileTool));
        reg.register(Arc::new(fs_tools::ReadCodeChunkTool));

        let index: Arc<dyn search_tools::SearchIndex> = Arc::new(search_tools::NullSearchIndex);
        reg.register(Arc::new(search_tools::SearchCodeTool { index: index.clone() }));
        reg.register(Arc::new(search_tools::ShowFileRelationsTool { index }));
        reg.register(Arc::new(search_tools::GrepSearchTool));

        reg.register(Arc::new(test_tools::RunProjectTestsTool::new(
            Arc::new(test_tools::NullTestRunner),
            2000,
        )));

        let manager: Arc<dyn dep_tools::DependencyManager> = Arc::new(dep_tools::NullDependencyManager);
        reg.register(Arc::new(dep_tools::ListInstalledPackagesTool { manager: manager.clone() }));
        reg.register(Arc::new(dep_tools::InstallDependencyTool { manager: manager.clone() }));
        reg.register(Arc::new(dep_tools::SearchPypiTool { manager }));

        let knowledge: Arc<dyn web_tools::WebKnowledge> = Arc::new(web_tools::NullWebKnowledge);
        reg.register(Arc::new(web_tools::WebSearchTool { knowledge: knowledge.clone() }));
        reg.register(Arc::new(web_tools::GetAdviceTool { knowledge }));

        reg
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.keys().copied().collect()
    }

    /// Execute a tool call by name. Unknown tool names return
    /// `ToolError::UnknownTool` rather than panicking — agents can produce
    /// malformed tool names and the pipeline must surface that as feedback,
    /// not a crash.
    pub async fn dispatch(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext<'_>,
    ) -> Result<String, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(args, ctx).await
    }

    /// OpenAI-compatible tool specs for `CallWithTools`
    pub fn as_dispatch_specs(&self) -> Vec<crate::dispatch::ToolSpec> {
        self.tools
            .values()
            .map(|t| crate::dispatch::ToolSpec {
                name: t.name().to_string(),
                description: format!("tool:{}", t.name()),
                parameters: t.parameter_schema(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &'static str {
            "echo"
        }
        fn parameter_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, args: Value, _ctx: &ToolContext<'_>) -> Result<String, ToolError> {
            Ok(args.to_string())
        }
    }

    #[tokio::test]
    async fn dispatch_routes_to_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let dir = tempfile::tempdir().unwrap();
        let backups = crate::vfs::BackupManager::new(dir.path(), ".backups", "s", 7);
        let vfs = VirtualFileSystem::new(dir.path(), backups);
        let ctx = ToolContext {
            vfs: &vfs,
            project_root: dir.path(),
        };
        let out = registry
            .dispatch("echo", serde_json::json!({"a": 1}), &ctx)
            .await
            .unwrap();
        assert_eq!(out, "{\"a\":1}");
    }

    #[test]
    fn with_defaults_registers_every_concrete_tool() {
        let reg = ToolRegistry::with_defaults();
        for name in [
            "read_file",
            "read_code_chunk",
            "search_code",
            "show_file_relations",
            "grep_search",
            "run_project_tests",
            "list_installed_packages",
            "install_dependency",
            "search_pypi",
            "web_search",
            "get_advice",
        ] {
            assert!(reg.get(name).is_some(), "missing tool: {name}");
        }
    }

    #[tokio::test]
    async fn dispatch_unknown_tool_errors() {
        let registry = ToolRegistry::new();
        let dir = tempfile::tempdir().unwrap();
        let backups = crate::vfs::BackupManager::new(dir.path(), ".backups", "s", 7);
        let vfs = VirtualFileSystem::new(dir.path(), backups);
        let ctx = ToolContext {
            vfs: &vfs,
            project_root: dir.path(),
        };
        let err = registry
            .dispatch("does-not-exist", serde_json::json!({}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
    }

    #[test]
    fn budget_exhausted_renders_helpful_xml() {
        let err = ToolError::BudgetExhausted {
            tool: "run_project_tests".into(),
            used: 5,
            limit: 5,
        };
        let xml = err.to_xml();
        assert!(xml.contains("<message>"));
        assert!(xml.contains("invocation budget"));
    }
}
