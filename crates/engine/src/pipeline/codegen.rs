//! Code Generator parsing and retry.
//!
//! Turns the generator's fenced-block wire format into [`CodeBlock`]s and
//! retries network-class dispatch failures with a fixed delay and a small
//! attempt budget.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::types::{CodeBlock, CodeBlockMode, CODE_GENERATOR_MAX_RETRIES, CODE_GENERATOR_RETRY_DELAY_SEC};
use crate::dispatch::{CallOptions, DispatchClient, DispatchError, Message};

/// A block whose `MODE` header didn't parse to a known mode — reported as
/// a free `INVALID_MODE` staging error (classify map), never
/// reaching the structural editor.
#[derive(Debug, Clone)]
pub struct UnparsedBlock {
    pub file_path: String,
    pub raw_mode: String,
}

/// Parse one generator response into code blocks, skipping (and
/// separately reporting) any block whose mode doesn't parse.
pub fn parse_code_blocks(raw: &str) -> (Vec<CodeBlock>, Vec<UnparsedBlock>) {
    let lines: Vec<&str> = raw.lines().collect();
    let mut blocks = Vec::new();
    let mut unparsed = Vec::new();
    let mut i = 0;
    let mut counter = 0u32;

    while i < lines.len() {
        let line = lines[i].trim_start();
        if let Some(rest) = line.strip_prefix("FILE:") {
            let file_path = rest.trim().to_string();
            i += 1;

            let mut mode_raw = String::new();
            let mut target_class = None;
            let mut target_method = None;
            let mut target_function = None;
            let mut insert_pattern = None;

            while i < lines.len() {
                let header_line = lines[i].trim();
                if header_line.starts_with("```") {
                    break;
                }
                if let Some(v) = header_line.strip_prefix("MODE:") {
                    mode_raw = v.trim().to_string();
                } else if let Some(v) = header_line.strip_prefix("TARGET_CLASS:") {
                    target_class = Some(v.trim().to_string());
                } else if let Some(v) = header_line.strip_prefix("TARGET_METHOD:") {
                    target_method = Some(v.trim().to_string());
                } else if let Some(v) = header_line.strip_prefix("TARGET_FUNCTION:") {
                    target_function = Some(v.trim().to_string());
                } else if let Some(v) = header_line.strip_prefix("INSERT_AFTER:") {
                    insert_pattern = Some(v.trim().to_string());
                } else if let Some(v) = header_line.strip_prefix("INSERT_BEFORE:") {
                    insert_pattern = Some(v.trim().to_string());
                }
                i += 1;
            }

            if i >= lines.len() {
                break; // malformed trailing header with no fenced body
            }
            i += 1; // skip opening fence

            let mut code_lines = Vec::new();
            while i < lines.len() && lines[i].trim() != "```" {
                code_lines.push(lines[i]);
                i += 1;
            }
            i += 1; // skip closing fence

            let Some(mode) = CodeBlockMode::parse(&mode_raw) else {
                unparsed.push(UnparsedBlock {
                    file_path,
                    raw_mode: mode_raw,
                });
                continue;
            };

            counter += 1;
            blocks.push(CodeBlock {
                id: format!("block-{counter}"),
                file_path,
                mode,
                target_class,
                target_method,
                target_function,
                insert_pattern,
                source: code_lines.join("\n"),
                indent_hint: None,
            });
        } else {
            i += 1;
        }
    }

    (blocks, unparsed)
}

/// Run one code-generator call, retrying network-class failures with a
/// fixed delay up to `CODE_GENERATOR_MAX_RETRIES`.
pub async fn generate_with_retry(
    client: &DispatchClient,
    model: &str,
    messages: &[Message],
    options: &CallOptions,
    cancel: &CancellationToken,
) -> Result<String, DispatchError> {
    let mut attempt = 0;
    loop {
        match client.call(model, messages, options, cancel).await {
            Ok(resp) => return Ok(resp.content),
            Err(err) if super::types::is_network_error(&err) && attempt < CODE_GENERATOR_MAX_RETRIES => {
                attempt += 1;
                tracing::warn!(attempt, "code generator call failed with a network error, retrying");
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(CODE_GENERATOR_RETRY_DELAY_SEC)) => {}
                    _ = cancel.cancelled() => return Err(DispatchError::Cancelled { model: model.to_string() }),
                }
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_add_method_block() {
        let raw = "FILE: app/services/user.py\nMODE: ADD_METHOD\nTARGET_CLASS: UserService\n```python\ndef logout(self):\n    self._session.invalidate()\n```\n";
        let (blocks, unparsed) = parse_code_blocks(raw);
        assert!(unparsed.is_empty());
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].file_path, "app/services/user.py");
        assert_eq!(blocks[0].mode, CodeBlockMode::AddMethod);
        assert_eq!(blocks[0].target_class.as_deref(), Some("UserService"));
        assert!(blocks[0].source.contains("invalidate"));
    }

    #[test]
    fn parses_multiple_blocks_in_one_response() {
        let raw = "FILE: a.py\nMODE: APPEND_FILE\n```python\nx = 1\n```\nFILE: b.py\nMODE: REPLACE_FILE\n```python\ny = 2\n```\n";
        let (blocks, _) = parse_code_blocks(raw);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].file_path, "a.py");
        assert_eq!(blocks[1].file_path, "b.py");
    }

    #[test]
    fn unknown_mode_is_reported_separately_not_as_a_block() {
        let raw = "FILE: a.py\nMODE: DESTROY_EVERYTHING\n```python\nx = 1\n```\n";
        let (blocks, unparsed) = parse_code_blocks(raw);
        assert!(blocks.is_empty());
        assert_eq!(unparsed.len(), 1);
        assert_eq!(unparsed[0].raw_mode, "DESTROY_EVERYTHING");
    }

    #[test]
    fn insert_after_header_becomes_insert_pattern() {
        let raw = "FILE: a.py\nMODE: INSERT_IMPORT\nINSERT_AFTER: import sys\n```python\nimport os\n```\n";
        let (blocks, _) = parse_code_blocks(raw);
        assert_eq!(blocks[0].insert_pattern.as_deref(), Some("import sys"));
    }
}
