//! Compiled regex patterns for prompt classification and text cleanup.
//!
//! These patterns are compiled once on first use and reused by the classifier,
//! the reconciler and the suggestion parser.

use once_cell::sync::Lazy;
use regex::Regex;

// ═══════════════════════════════════════════════════════════════════════════════
// Normalization
// ═══════════════════════════════════════════════════════════════════════════════

pub static RE_WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
pub static RE_SLUG_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

// ═══════════════════════════════════════════════════════════════════════════════
// Prompt Classification
// ═══════════════════════════════════════════════════════════════════════════════

pub static RE_BARE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^[a-z]+://\S+$").unwrap());
pub static RE_ACTION_VERB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(build|create|write|generate|fix|implement|refactor|add|debug|review|design|optimize|explain|analyze|plan|draft|help|make)\b",
    )
    .unwrap()
});
pub static RE_ASSISTANT_CONTEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(prompt|assistant|llm|model|chatgpt|claude|gemini|cursor|codex|copilot|feature|bug|test|api|workflow)\b",
    )
    .unwrap()
});
pub static RE_INSTRUCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(please|can you|how do i|what is|show me|give me|need to|i want)\b").unwrap()
});

// ═══════════════════════════════════════════════════════════════════════════════
// Model Output Cleanup
// ═══════════════════════════════════════════════════════════════════════════════

pub static RE_FENCE_OPEN_JSON: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^```json\s*").unwrap());
pub static RE_FENCE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```\s*").unwrap());
pub static RE_FENCE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*```$").unwrap());
pub static RE_LIST_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-\d.)\s]+").unwrap());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_url_requires_whole_string() {
        assert!(RE_BARE_URL.is_match("https://example.com/resource"));
        assert!(!RE_BARE_URL.is_match("see https://example.com/resource please"));
    }

    #[test]
    fn action_verb_only_matches_leading_word() {
        assert!(RE_ACTION_VERB.is_match("Refactor the session store"));
        assert!(!RE_ACTION_VERB.is_match("Builder pattern notes"));
        assert!(!RE_ACTION_VERB.is_match("we should build it"));
    }

    #[test]
    fn list_marker_strips_numbering_and_bullets() {
        assert_eq!(RE_LIST_MARKER.replace("1) do the thing", ""), "do the thing");
        assert_eq!(RE_LIST_MARKER.replace("- do the thing", ""), "do the thing");
        assert_eq!(RE_LIST_MARKER.replace("2. do the thing", ""), "do the thing");
    }
}
