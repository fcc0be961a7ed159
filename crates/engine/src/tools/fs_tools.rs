//! `read_file` / `read_code_chunk`
//!
//! Both are VFS-first: the staged version is returned when present, with a
//! `source="VFS"` marker, falling back to disk otherwise.

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use super::{xml, Tool, ToolContext, ToolError};

fn detect_file_type(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("py") => "python",
        Some("rs") => "rust",
        Some("go") => "go",
        Some("ts") | Some("tsx") => "typescript",
        Some("js") | Some("jsx") => "javascript",
        Some("sql") => "sql",
        Some("json") => "json",
        _ => "text",
    }
}

fn estimate_tokens(content: &str) -> usize {
    // Rough heuristic: ~4 characters per token for code.
    content.len().div_ceil(4)
}

/// Read a whole file, VFS-first.
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string"},
                "include_line_numbers": {"type": "boolean"}
            },
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
        let include_line_numbers = args
            .get("include_line_numbers")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let staged = ctx.vfs.pending_change(file_path).is_some();
        let content = ctx.vfs.read(file_path).map_err(|e| ToolError::ExecutionFailed {
            tool: self.name().into(),
            message: e.to_string(),
        })?;

        let Some(mut content) = content else {
            return Ok(xml::wrap_error(
                &format!("file not found: {file_path}"),
                Some("verify the path, or use ADD_method/create mode if it's new"),
            ));
        };

        if include_line_numbers {
            content = xml::add_line_numbers(&content);
        }

        let tokens = estimate_tokens(&content);
        let mut out = xml::wrap_file(file_path, detect_file_type(file_path), &content, tokens);
        if staged {
            out = out.replacen("<file ", "<file source=\"VFS\" ", 1);
        }
        Ok(out)
    }
}

/// Extract a single named `class`/`function`/`method` chunk from a file.
///
/// A lightweight regex-based extractor stands in for the external AST
/// indexer (chunking per language is out of scope Non-goals);
/// this only needs to locate one named block well enough for the
/// orchestrator to read it in context.
pub struct ReadCodeChunkTool;

#[async_trait]
impl Tool for ReadCodeChunkTool {
    fn name(&self) -> &'static str {
        "read_code_chunk"
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string"},
                "chunk_name": {"type": "string"}
            },
            "required": ["file_path", "chunk_name"]
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
        let chunk_name = args
            .get("chunk_name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: self.name().into(),
                message: "missing 'chunk_name'".into(),
            })?;

        let content = ctx.vfs.read(file_path).map_err(|e| ToolError::ExecutionFailed {
            tool: self.name().into(),
            message: e.to_string(),
        })?;

        let Some(content) = content else {
            return Ok(xml::wrap_error(&format!("file not found: {file_path}"), None));
        };

        match extract_named_block(&content, chunk_name) {
            Some((chunk_text, indent)) => Ok(xml::wrap_chunk(file_path, chunk_name, &chunk_text, indent)),
            None => Ok(xml::wrap_error(
                &format!("chunk '{chunk_name}' not found in {file_path}"),
                Some("verify exact spelling; use search_code to locate it first"),
            )),
        }
    }
}

/// Find a `def`/`class` block named `name` and return its source plus the
/// detected indentation of its header line.
fn extract_named_block(source: &str, name: &str) -> Option<(String, usize)> {
    let pattern = format!(
        r"(?m)^([ \t]*)(?:async\s+)?(?:def|class)\s+{}\s*[\(:]",
        regex::escape(name)
    );
    let re = Regex::new(&pattern).ok()?;
    let m = re.find(source)?;
    let header_start = m.start();
    let indent = source[header_start..m.end()]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .count();

    let line_start = source[..header_start]
        .rfind('\n')
        .map(|i| i + 1)
        .unwrap_or(0);

    let lines: Vec<&str> = source[line_start..].split('\n').collect();
    let mut block_lines = vec![lines[0]];
    for line in &lines[1..] {
        if line.trim().is_empty() {
            block_lines.push(line);
            continue;
        }
        let this_indent = line.chars().take_while(|c| *c == ' ' || *c == '\t').count();
        if this_indent <= indent {
            break;
        }
        block_lines.push(line);
    }
    // trim trailing blank lines
    while block_lines.last().map(|l| l.trim().is_empty()).unwrap_or(false) {
        block_lines.pop();
    }

    Some((block_lines.join("\n"), indent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::{BackupManager, VfsChange, VirtualFileSystem};

    fn make_ctx(dir: &std::path::Path) -> VirtualFileSystem {
        VirtualFileSystem::new(dir, BackupManager::new(dir, ".backups", "s", 7))
    }

    #[tokio::test]
    async fn read_file_prefers_staged_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "on disk").unwrap();
        let mut vfs = make_ctx(dir.path());
        vfs.stage("a.py", VfsChange::modify("staged", None));
        let ctx = ToolContext {
            vfs: &vfs,
            project_root: dir.path(),
        };
        let out = ReadFileTool.execute(serde_json::json!({"file_path": "a.py"}), &ctx).await.unwrap();
        assert!(out.contains("source=\"VFS\""));
        assert!(out.contains("staged"));
    }

    #[tokio::test]
    async fn read_file_missing_returns_error_xml() {
        let dir = tempfile::tempdir().unwrap();
        let vfs = make_ctx(dir.path());
        let ctx = ToolContext {
            vfs: &vfs,
            project_root: dir.path(),
        };
        let out = ReadFileTool
            .execute(serde_json::json!({"file_path": "nope.py"}), &ctx)
            .await
            .unwrap();
        assert!(out.contains("<error>"));
    }

    #[test]
    fn extract_named_block_finds_method_body() {
        let src = "class Foo:\n    def bar(self):\n        return 1\n\n    def baz(self):\n        return 2\n";
        let (chunk, indent) = extract_named_block(src, "bar").unwrap();
        assert_eq!(indent, 4);
        assert!(chunk.contains("def bar(self):"));
        assert!(chunk.contains("return 1"));
        assert!(!chunk.contains("def baz"));
    }

    #[tokio::test]
    async fn read_code_chunk_not_found_yields_hint() {
        let dir = tempfile::tempdir().unwrap();
        let mut vfs = make_ctx(dir.path());
        vfs.stage("a.py", VfsChange::create("def foo():\n    pass\n", None));
        let ctx = ToolContext {
            vfs: &vfs,
            project_root: dir.path(),
        };
        let out = ReadCodeChunkTool
            .execute(
                serde_json::json!({"file_path": "a.py", "chunk_name": "missing_fn"}),
                &ctx,
            )
            .await
            .unwrap();
        assert!(out.contains("not found"));
    }
}
