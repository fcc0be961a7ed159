//! AI Validator: a lightweight model answers one question ("does this code
//! address the request?") as a binary approve/reject with a short verdict,
//! never style/naming nitpicks.

use serde::Deserialize;

use crate::config::Config;

#[derive(Debug, Clone, Deserialize)]
pub struct AiVerdict {
    pub approved: bool,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub verdict: String,
    #[serde(default)]
    pub critical_issues: Vec<String>,
}

fn default_confidence() -> f32 {
    0.5
}

/// Pick the small or large AI validator model by the size of the context
/// being judged `ai_validator_token_threshold`.
pub fn choose_model<'a>(config: &'a Config, context_tokens: usize) -> &'a str {
    if context_tokens <= config.ai_validator_token_threshold {
        &config.ai_validator_model_small
    } else {
        &config.ai_validator_model_large
    }
}

/// Parse the validator's JSON verdict out of its response text. Falls back
/// to a low-confidence rejection if the model didn't return parseable
/// JSON — never silently approves on a parse failure.
pub fn parse_verdict(raw: &str) -> AiVerdict {
    if let Some(start) = raw.find('{') {
        if let Some(end) = raw.rfind('}') {
            if end > start {
                if let Ok(v) = serde_json::from_str::<AiVerdict>(&raw[start..=end]) {
                    return v;
                }
            }
        }
    }
    AiVerdict {
        approved: false,
        confidence: 0.0,
        verdict: "validator response was not parseable JSON".to_string(),
        critical_issues: vec!["could not parse AI validator response".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chooses_small_model_under_threshold() {
        let mut cfg = Config::default();
        cfg.ai_validator_token_threshold = 8_000;
        cfg.ai_validator_model_small = "small".into();
        cfg.ai_validator_model_large = "large".into();
        assert_eq!(choose_model(&cfg, 1_000), "small");
        assert_eq!(choose_model(&cfg, 9_000), "large");
    }

    #[test]
    fn parses_approved_verdict() {
        let raw = "verdict:\n{\"approved\": true, \"confidence\": 0.9, \"verdict\": \"looks good\", \"critical_issues\": []}";
        let v = parse_verdict(raw);
        assert!(v.approved);
        assert_eq!(v.confidence, 0.9);
    }

    #[test]
    fn unparseable_response_is_a_low_confidence_rejection() {
        let v = parse_verdict("the model rambled instead of returning json");
        assert!(!v.approved);
        assert_eq!(v.confidence, 0.0);
    }
}
