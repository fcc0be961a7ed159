//! `search_code`, `grep_search`, `show_file_relations`
//!
//! `search_code` and `show_file_relations` delegate to the project's
//! semantic index, an external collaborator (Non-goals) reached
//! through the [`SearchIndex`] trait boundary. `grep_search` is
//! implemented directly: it unions VFS-staged files and disk, with VFS
//! taking precedence for overlapping paths.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde_json::Value;

use super::{xml, Tool, ToolContext, ToolError};

/// Kind of symbol `search_code` should restrict its query to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    All,
    Class,
    Function,
    Method,
}

impl SearchType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "class" => Self::Class,
            "function" => Self::Function,
            "method" => Self::Method,
            _ => Self::All,
        }
    }
}

/// A single search hit returned by the project's semantic index.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub file_path: String,
    pub symbol_name: String,
    pub kind: String,
    pub snippet: String,
}

/// Imports/imported-by/tests/siblings summary for one file.
#[derive(Debug, Clone, Default)]
pub struct FileRelations {
    pub imports: Vec<String>,
    pub imported_by: Vec<String>,
    pub tests: Vec<String>,
    pub siblings: Vec<String>,
}

/// External semantic index boundary; building the index itself is out of scope here.
pub trait SearchIndex: Send + Sync {
    fn search_code(&self, query: &str, search_type: SearchType) -> Vec<SearchHit>;
    fn file_relations(&self, file_path: &str) -> Option<FileRelations>;
}

/// No-op index used when no semantic indexer is wired up.
#[derive(Default)]
pub struct NullSearchIndex;

impl SearchIndex for NullSearchIndex {
    fn search_code(&self, _query: &str, _search_type: SearchType) -> Vec<SearchHit> {
        Vec::new()
    }
    fn file_relations(&self, _file_path: &str) -> Option<FileRelations> {
        None
    }
}

pub struct SearchCodeTool {
    pub index: Arc<dyn SearchIndex>,
}

#[async_trait]
impl Tool for SearchCodeTool {
    fn name(&self) -> &'static str {
        "search_code"
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "search_type": {"type": "string", "enum": ["all", "class", "function", "method"]}
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
        let search_type = args
            .get("search_type")
            .and_then(|v| v.as_str())
            .map(SearchType::parse)
            .unwrap_or(SearchType::All);

        let hits = self.index.search_code(query, search_type);
        if hits.is_empty() {
            return Ok(xml::wrap_error(
                &format!("no matches for '{query}'"),
                Some("broaden the query or try search_type=all"),
            ));
        }
        let body: String = hits
            .iter()
            .map(|h| {
                format!(
                    "<hit file=\"{}\" symbol=\"{}\" kind=\"{}\"><![CDATA[\n{}\n]]></hit>",
                    xml::escape_attr(&h.file_path),
                    xml::escape_attr(&h.symbol_name),
                    xml::escape_attr(&h.kind),
                    xml::escape_cdata(&h.snippet)
                )
            })
            .collect();
        Ok(format!("<results>{body}</results>"))
    }
}

pub struct ShowFileRelationsTool {
    pub index: Arc<dyn SearchIndex>,
}

#[async_trait]
impl Tool for ShowFileRelationsTool {
    fn name(&self) -> &'static str {
        "show_file_relations"
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {"file_path": {"type": "string"}},
            "required": ["file_path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> Result<String, ToolError> {
        let file_path = args
            .get("file_path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: self.name().into(),
                message: "missing 'file_path'".into(),
            })?;

        if !ctx.vfs.file_exists(file_path) {
            return Ok(xml::wrap_error(&format!("file not found: {file_path}"), None));
        }

        let relations = self.index.file_relations(file_path).unwrap_or_default();
        Ok(format!(
            "<relations path=\"{}\"><imports>{}</imports><imported_by>{}</imported_by><tests>{}</tests><siblings>{}</siblings></relations>",
            xml::escape_attr(file_path),
            relations.imports.join(","),
            relations.imported_by.join(","),
            relations.tests.join(","),
            relations.siblings.join(","),
        ))
    }
}

/// Full-text search over VFS-staged files unioned with disk, VFS taking
/// precedence for overlapping paths
pub struct GrepSearchTool;

#[async_trait]
impl Tool for GrepSearchTool {
    fn name(&self) -> &'static str {
        "grep_search"
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string"},
                "use_regex": {"type": "boolean"},
                "case_sensitive": {"type": "boolean"},
                "path": {"type": "string"},
                "file_pattern": {"type": "string"},
                "max_results": {"type": "integer"}
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> Result<String, ToolError> {
        let pattern = args
            .get("pattern")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: self.name().into(),
                message: "missing 'pattern'".into(),
            })?;
        let use_regex = args.get("use_regex").and_then(|v| v.as_bool()).unwrap_or(false);
        let case_sensitive = args.get("case_sensitive").and_then(|v| v.as_bool()).unwrap_or(false);
        let max_results = args
            .get("max_results")
            .and_then(|v| v.as_u64())
            .unwrap_or(100) as usize;
        let scope = args.get("path").and_then(|v| v.as_str());
        let file_pattern = args.get("file_pattern").and_then(|v| v.as_str());

        let needle = if use_regex {
            regex::escape(pattern)
        } else {
            regex::escape(pattern)
        };
        let matcher = if use_regex { pattern } else { &needle };
        let re = RegexBuilder::new(matcher)
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|e| ToolError::InvalidArguments {
                tool: self.name().into(),
                message: format!("invalid pattern: {e}"),
            })?;

        let mut candidates: std::collections::BTreeSet<String> = ctx.vfs.staged_files();
        collect_disk_files(ctx.project_root, ctx.project_root, &mut candidates);

        let mut matches = Vec::new();
        for path in candidates {
            if let Some(scope) = scope {
                if !path.starts_with(scope) {
                    continue;
                }
            }
            if let Some(fp) = file_pattern {
                if !glob_matches(fp, &path) {
                    continue;
                }
            }
            let Ok(Some(content)) = ctx.vfs.read(&path) else {
                continue;
            };
            for (lineno, line) in content.lines().enumerate() {
                if re.is_match(line) {
                    matches.push((path.clone(), lineno + 1, line.to_string()));
                    if matches.len() >= max_results {
                        break;
                    }
                }
            }
            if matches.len() >= max_results {
                break;
            }
        }

        if matches.is_empty() {
            return Ok(xml::wrap_error(&format!("no matches for '{pattern}'"), None));
        }

        let body: String = matches
            .iter()
            .map(|(path, line, text)| {
                format!(
                    "<match file=\"{}\" line=\"{}\">{}</match>",
                    xml::escape_attr(path),
                    line,
                    xml::escape_attr(text)
                )
            })
            .collect();
        Ok(format!("<results count=\"{}\">{}</results>", matches.len(), body))
    }
}

fn collect_disk_files(root: &Path, dir: &Path, out: &mut std::collections::BTreeSet<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if path.file_name().and_then(|n| n.to_str()) == Some(".git") {
                continue;
            }
            collect_disk_files(root, &path, out);
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.insert(rel.display().to_string().replace('\\', "/"));
        }
    }
}

fn glob_matches(pattern: &str, path: &str) -> bool {
    if let Some(suffix) = pattern.strip_prefix('*') {
        return path.ends_with(suffix);
    }
    path.contains(pattern)
}
