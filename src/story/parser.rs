use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use crate::error::{Result, StoryError};
use crate::story::schema::StoryLlmResponse;

static RE_THINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>(.*?)</think>").expect("valid regex"));

static RE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?si)```(?:json)?\s*(.*?)\s*```").expect("valid regex"));

/// Strip reasoning blocks and markdown fences, leaving the JSON candidate.
fn extract_json(raw: &str) -> String {
    for cap in RE_THINK.captures_iter(raw) {
        let thought = cap.get(1).map_or("", |m| m.as_str()).trim();
        if !thought.is_empty() {
            debug!("Model thinking:\n{thought}");
        }
    }
    let cleaned = RE_THINK.replace_all(raw, "");

    match RE_FENCE.captures(&cleaned).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().to_string(),
        None => cleaned.trim().to_string(),
    }
}

/// Validate raw model text against the story schema.
///
/// Types and required fields are checked. Story semantics (reachable winning
/// ending, options on endings) are not.
pub fn parse_story_response(raw: &str) -> Result<StoryLlmResponse> {
    let json_str = extract_json(raw);
    debug!("Extracted JSON ({} chars)", json_str.len());

    serde_json::from_str(&json_str).map_err(|e| {
        StoryError::Validation(format!("{e}. Got: {}", truncate(&json_str, 200)))
    })
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
