//! Pre-filter.
//!
//! Selects at most `pre_filter_max_chunks` atomic code chunks under a
//! `pre_filter_max_tokens` budget for the orchestrator to read. Chunk
//! *discovery* (loading the semantic index) is an external collaborator out
//! of scope here; selection is this module's job.

use serde::Deserialize;

/// One atomic, non-splittable code chunk offered to the selector.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub file_path: String,
    pub name: String,
    pub content: String,
    pub tokens: usize,
}

/// External semantic-index boundary Non-goals.
pub trait ChunkSource: Send + Sync {
    fn available_chunks(&self, project_root: &std::path::Path) -> Vec<Chunk>;
}

#[derive(Default)]
pub struct NullChunkSource;
impl ChunkSource for NullChunkSource {
    fn available_chunks(&self, _project_root: &std::path::Path) -> Vec<Chunk> {
        Vec::new()
    }
}

#[derive(Debug, Deserialize)]
struct SelectionResponse {
    #[serde(default)]
    selected_ids: Vec<String>,
}

/// Parse the selector LLM's response into an ordered list of chunk ids.
/// Accepts a JSON object `{"selected_ids": [...]}` anywhere in the text, the
/// shape `format_prefilter_prompt`'s response contract asks for.
fn parse_selection(raw: &str) -> Vec<String> {
    if let Some(start) = raw.find('{') {
        if let Some(end) = raw.rfind('}') {
            if end > start {
                if let Ok(parsed) = serde_json::from_str::<SelectionResponse>(&raw[start..=end]) {
                    return parsed.selected_ids;
                }
            }
        }
    }
    Vec::new()
}

/// Apply a selector's chosen ids to the available chunk set, honoring the
/// token and count budgets and the "at least one chunk must reach the
/// orchestrator" guarantee.
pub fn apply_selection(chunks: &[Chunk], selected_ids: &[String], max_chunks: usize, max_tokens: usize) -> Vec<Chunk> {
    let mut picked = Vec::new();
    let mut used_tokens = 0usize;

    for id in selected_ids {
        if picked.len() >= max_chunks {
            break;
        }
        let Some(chunk) = chunks.iter().find(|c| &c.id == id) else {
            continue;
        };
        if used_tokens + chunk.tokens > max_tokens && !picked.is_empty() {
            continue;
        }
        used_tokens += chunk.tokens;
        picked.push(chunk.clone());
    }

    if picked.is_empty() {
        if let Some(first) = chunks.iter().min_by_key(|c| c.tokens) {
            picked.push(first.clone());
        }
    }
    picked
}

/// Selection step: given the raw selector response and the available
/// chunks, produce the final chunk list for the orchestrator.
pub fn select_from_response(chunks: &[Chunk], raw_response: &str, max_chunks: usize, max_tokens: usize) -> Vec<Chunk> {
    let ids = parse_selection(raw_response);
    apply_selection(chunks, &ids, max_chunks, max_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, tokens: usize) -> Chunk {
        Chunk {
            id: id.into(),
            file_path: format!("{id}.py"),
            name: id.into(),
            content: "def f(): pass".into(),
            tokens,
        }
    }

    #[test]
    fn parses_selection_ids_from_surrounding_prose() {
        let raw = "Here is my pick:\n{\"selected_ids\": [\"a\", \"b\"]}\nthanks";
        assert_eq!(parse_selection(raw), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn malformed_response_yields_empty_selection() {
        assert!(parse_selection("not json at all").is_empty());
    }

    #[test]
    fn at_least_one_chunk_reaches_orchestrator_on_empty_selection() {
        let chunks = vec![chunk("a", 100), chunk("b", 50)];
        let picked = apply_selection(&chunks, &[], 5, 75_000);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, "b"); // smallest, cheapest fallback
    }

    #[test]
    fn respects_max_chunks_and_token_budget() {
        let chunks = vec![chunk("a", 40_000), chunk("b", 40_000), chunk("c", 10)];
        let picked = apply_selection(&chunks, &["a".into(), "b".into(), "c".into()], 5, 75_000);
        // a + b already exceeds 75k combined with c, so c is dropped once budget is tight
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].id, "a");
        assert_eq!(picked[1].id, "b");
    }

    #[test]
    fn unknown_ids_in_selection_are_skipped() {
        let chunks = vec![chunk("a", 10)];
        let picked = apply_selection(&chunks, &["ghost".into(), "a".into()], 5, 75_000);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, "a");
    }
}
