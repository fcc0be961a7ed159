//! `web_search`, `get_advice`. External knowledge retrieval; the
//! domain search tools' internal implementations stay out of scope —
//! this only defines the boundary trait.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{xml, Tool, ToolContext, ToolError};

#[derive(Debug, Clone)]
pub struct WebResult {
    pub id: String,
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// External web search / advice-retrieval collaborator. A real deployment
/// wires this to whatever search backend or knowledge base it maintains;
/// the core only needs the call shape and the 15s/page cap.
#[async_trait]
pub trait WebKnowledge: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Vec<WebResult>;
    async fn get_advice(&self, ids: &[String]) -> Vec<WebResult>;
}

/// No-op knowledge backend used when no search/advice collaborator is
/// wired up; always returns an empty result set.
#[derive(Default)]
pub struct NullWebKnowledge;

#[async_trait]
impl WebKnowledge for NullWebKnowledge {
    async fn search(&self, _query: &str, _max_results: usize) -> Vec<WebResult> {
        Vec::new()
    }
    async fn get_advice(&self, _ids: &[String]) -> Vec<WebResult> {
        Vec::new()
    }
}

pub struct WebSearchTool {
    pub knowledge: Arc<dyn WebKnowledge>,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "max_results": {"type": "integer"}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext<'_>) -> Result<String, ToolError> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: self.name().into(),
                message: "missing 'query'".into(),
            })?;
        let max_results = args
            .get("max_results")
            .and_then(|v| v.as_u64())
            .unwrap_or(5) as usize;

        let results = tokio::time::timeout(
            std::time::Duration::from_secs(15 * max_results.max(1) as u64),
            self.knowledge.search(query, max_results),
        )
        .await
        .map_err(|_| ToolError::Timeout {
            tool: self.name().into(),
            timeout_sec: 15,
        })?;

        Ok(render_results(&results))
    }
}

pub struct GetAdviceTool {
    pub knowledge: Arc<dyn WebKnowledge>,
}

#[async_trait]
impl Tool for GetAdviceTool {
    fn name(&self) -> &'static str {
        "get_advice"
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {"ids": {"type": "array", "items": {"type": "string"}}},
            "required": ["ids"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext<'_>) -> Result<String, ToolError> {
        let ids: Vec<String> = args
            .get("ids")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: self.name().into(),
                message: "missing 'ids'".into(),
            })?;

        let results = self.knowledge.get_advice(&ids).await;
        Ok(render_results(&results))
    }
}

fn render_results(results: &[WebResult]) -> String {
    if results.is_empty() {
        return xml::wrap_error("no results", None);
    }
    let body: String = results
        .iter()
        .map(|r| {
            format!(
                "<result id=\"{}\" title=\"{}\" url=\"{}\"><![CDATA[\n{}\n]]></result>",
                xml::escape_attr(&r.id),
                xml::escape_attr(&r.title),
                xml::escape_attr(&r.url),
                xml::escape_cdata(&r.snippet)
            )
        })
        .collect();
    format!("<results>{body}</results>")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeKnowledge;

    #[async_trait]
    impl WebKnowledge for FakeKnowledge {
        async fn search(&self, _query: &str, _max_results: usize) -> Vec<WebResult> {
            vec![WebResult {
                id: "1".into(),
                title: "t".into(),
                url: "https://example.invalid".into(),
                snippet: "s".into(),
            }]
        }
        async fn get_advice(&self, ids: &[String]) -> Vec<WebResult> {
            ids.iter()
                .map(|id| WebResult {
                    id: id.clone(),
                    title: "advice".into(),
                    url: String::new(),
                    snippet: String::new(),
                })
                .collect()
        }
    }

    fn ctx<'a>(vfs: &'a crate::vfs::VirtualFileSystem, root: &'a std::path::Path) -> ToolContext<'a> {
        ToolContext {
            vfs,
            project_root: root,
        }
    }

    #[tokio::test]
    async fn web_search_renders_results() {
        let dir = tempfile::tempdir().unwrap();
        let vfs = crate::vfs::VirtualFileSystem::new(
            dir.path(),
            crate::vfs::BackupManager::new(dir.path(), ".b", "s", 7),
        );
        let tool = WebSearchTool {
            knowledge: Arc::new(FakeKnowledge),
        };
        let out = tool
            .execute(serde_json::json!({"query": "rust async"}), &ctx(&vfs, dir.path()))
            .await
            .unwrap();
        assert!(out.contains("<result"));
    }

    #[tokio::test]
    async fn get_advice_returns_one_result_per_id() {
        let dir = tempfile::tempdir().unwrap();
        let vfs = crate::vfs::VirtualFileSystem::new(
            dir.path(),
            crate::vfs::BackupManager::new(dir.path(), ".b", "s", 7),
        );
        let tool = GetAdviceTool {
            knowledge: Arc::new(FakeKnowledge),
        };
        let out = tool
            .execute(serde_json::json!({"ids": ["a", "b"]}), &ctx(&vfs, dir.path()))
            .await
            .unwrap();
        assert_eq!(out.matches("<result").count(), 2);
    }
}
