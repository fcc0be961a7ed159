//! `list_installed_packages`, `install_dependency`, `search_pypi`.
//! Dependency management scoped to the project's interpreter.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{xml, Tool, ToolContext, ToolError};

#[derive(Debug, Clone)]
pub struct InstalledPackage {
    pub import_name: String,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct PypiCandidate {
    pub package_name: String,
    pub summary: String,
}

/// Boundary to the project's interpreter/package manager — a real
/// implementation shells out to `pip`/`uv`/`go get`/etc. scoped to the
/// project root.
#[async_trait]
pub trait DependencyManager: Send + Sync {
    async fn list_installed(&self) -> Vec<InstalledPackage>;
    async fn install(&self, import_name: &str, version: Option<&str>) -> Result<String, String>;
    async fn search_pypi(&self, query: &str) -> Vec<PypiCandidate>;
}

/// No-op manager used when no interpreter/package-manager boundary is
/// wired up; reports nothing installed and refuses installs.
#[derive(Default)]
pub struct NullDependencyManager;

#[async_trait]
impl DependencyManager for NullDependencyManager {
    async fn list_installed(&self) -> Vec<InstalledPackage> {
        Vec::new()
    }
    async fn install(&self, _import_name: &str, _version: Option<&str>) -> Result<String, String> {
        Err("no dependency manager configured".to_string())
    }
    async fn search_pypi(&self, _query: &str) -> Vec<PypiCandidate> {
        Vec::new()
    }
}

pub struct ListInstalledPackagesTool {
    pub manager: Arc<dyn DependencyManager>,
}

#[async_trait]
impl Tool for ListInstalledPackagesTool {
    fn name(&self) -> &'static str {
        "list_installed_packages"
    }
    fn parameter_schema(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, _args: Value, _ctx: &ToolContext<'_>) -> Result<String, ToolError> {
        let packages = self.manager.list_installed().await;
        let body: String = packages
            .iter()
            .map(|p| {
                format!(
                    "<package name=\"{}\" version=\"{}\"/>",
                    xml::escape_attr(&p.import_name),
                    xml::escape_attr(&p.version)
                )
            })
            .collect();
        Ok(format!("<packages count=\"{}\">{}</packages>", packages.len(), body))
    }
}

pub struct InstallDependencyTool {
    pub manager: Arc<dyn DependencyManager>,
}

#[async_trait]
impl Tool for InstallDependencyTool {
    fn name(&self) -> &'static str {
        "install_dependency"
    }
    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "import_name": {"type": "string"},
                "version": {"type": "string"}
            },
            "required": ["import_name"]
        })
    }
    async fn execute(&self, args: Value, _ctx: &ToolContext<'_>) -> Result<String, ToolError> {
        let import_name = args
            .get("import_name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: self.name().into(),
                message: "missing 'import_name'".into(),
            })?;
        let version = args.get("version").and_then(|v| v.as_str());

        match self.manager.install(import_name, version).await {
            Ok(detail) => Ok(format!(
                "<installed import_name=\"{}\"><![CDATA[\n{}\n]]></installed>",
                xml::escape_attr(import_name),
                xml::escape_cdata(&detail)
            )),
            Err(e) => Ok(xml::wrap_error(
                &format!("failed to install '{import_name}': {e}"),
                Some("verify the package name via search_pypi"),
            )),
        }
    }
}

pub struct SearchPypiTool {
    pub manager: Arc<dyn DependencyManager>,
}

#[async_trait]
impl Tool for SearchPypiTool {
    fn name(&self) -> &'static str {
        "search_pypi"
    }
    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
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
        let candidates = self.manager.search_pypi(query).await;
        if candidates.is_empty() {
            return Ok(xml::wrap_error(&format!("no packages found for '{query}'"), None));
        }
        let body: String = candidates
            .iter()
            .map(|c| {
                format!(
                    "<candidate name=\"{}\">{}</candidate>",
                    xml::escape_attr(&c.package_name),
                    xml::escape_attr(&c.summary)
                )
            })
            .collect();
        Ok(format!("<candidates>{body}</candidates>"))
    }
}
