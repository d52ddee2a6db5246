//! Prompt-evolution suggestions: remote model first, local heuristic fallback.
//!
//! The remote model is a collaborator behind [`SuggestionModel`]. Any failure
//! (no key, HTTP status, transport, unparseable reply) resolves to the
//! heuristic generator and is reported through [`SuggestionOutcome::message`],
//! never as an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::patterns::{RE_FENCE_CLOSE, RE_FENCE_OPEN, RE_FENCE_OPEN_JSON, RE_LIST_MARKER};
use crate::reconcile::normalize_suggestion;
use crate::types::{CanonicalState, EntryType, Session, Suggestion, DEFAULT_TOOL};

const RECENT_NOTES: usize = 5;
const RECENT_PROMPTS: usize = 10;
const RECENT_SESSIONS: usize = 8;

const FREE_FORM_REASON: &str = "Parsed from free-form model output.";
const FALLBACK_FOCUS: &str = "current coding task";

/// Where a set of suggestions came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Groq,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionOutcome {
    pub source: Provenance,
    pub items: Vec<Suggestion>,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("no API key configured")]
    NotConfigured,

    #[error("model returned HTTP {0}")]
    Status(u16),

    #[error("model request failed: {0}")]
    Transport(String),

    #[error("model reply was malformed: {0}")]
    Malformed(String),
}

/// Chat-completion style model that answers a [`ModelRequest`] with raw text.
pub trait SuggestionModel {
    fn complete(&self, request: &ModelRequest) -> Result<String, ModelError>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Request
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelNote {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPrompt {
    pub text: String,
    pub outcome: String,
    pub tool: String,
    pub session_label: String,
    pub created_at: DateTime<Utc>,
}

/// Trimmed view of the state sent to the remote model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRequest {
    pub request: String,
    pub notes: Vec<ModelNote>,
    pub prompts: Vec<ModelPrompt>,
    pub sessions: Vec<Session>,
    #[serde(skip)]
    pub limit: usize,
}

impl ModelRequest {
    pub fn from_state(state: &CanonicalState, limit: usize) -> Self {
        let notes = state
            .notes
            .iter()
            .take(RECENT_NOTES)
            .map(|note| ModelNote {
                title: trim_for_model(&note.title, 80),
                content: trim_for_model(&note.content, 220),
                tags: note.tags.clone(),
                updated_at: note.updated_at,
            })
            .collect();

        let skip = state.prompts.len().saturating_sub(RECENT_PROMPTS);
        let prompts = state.prompts[skip..]
            .iter()
            .map(|prompt| ModelPrompt {
                text: trim_for_model(&prompt.text, 180),
                outcome: trim_for_model(&prompt.outcome, 100),
                tool: prompt.tool.clone(),
                session_label: prompt.session_label.clone(),
                created_at: prompt.created_at,
            })
            .collect();

        Self {
            request: "Generate the next best prompts based on notes, session history, and prompt evolution."
                .to_string(),
            notes,
            prompts,
            sessions: state.sessions.iter().take(RECENT_SESSIONS).cloned().collect(),
            limit,
        }
    }

    /// Instructions for the system message.
    pub fn system_prompt(&self) -> String {
        [
            "You are a prompt-evolution assistant for engineering workflows.",
            "Return ONLY a JSON array of objects with keys:",
            "prompt (string), reason (string), tool (string), sessionLabel (string).",
            "Keep prompts actionable, concrete, and short.",
            &format!("Return at most {} items.", self.limit),
        ]
        .join(" ")
    }
}

/// Trims and caps `text` at `max_chars`, marking truncation with `...`.
pub fn trim_for_model(text: &str, max_chars: usize) -> String {
    let value = text.trim();
    if value.chars().count() > max_chars {
        let head: String = value.chars().take(max_chars).collect();
        format!("{head}...")
    } else {
        value.to_string()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Reply Parsing
// ═══════════════════════════════════════════════════════════════════════════════

/// Parses a model reply: a (possibly fenced) JSON array of suggestion objects,
/// else one suggestion per non-empty line with list markers stripped.
pub fn parse_model_suggestions(content: &str, limit: usize) -> Vec<Suggestion> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    let unfenced = RE_FENCE_OPEN_JSON.replace(content, "");
    let unfenced = RE_FENCE_OPEN.replace(&unfenced, "");
    let unfenced = RE_FENCE_CLOSE.replace(&unfenced, "");
    let body = unfenced.trim();

    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(body) {
        return items
            .iter()
            .map(normalize_suggestion)
            .filter(|suggestion| !suggestion.prompt.is_empty())
            .take(limit)
            .collect();
    }

    body.lines()
        .map(|line| RE_LIST_MARKER.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .take(limit)
        .map(|prompt| Suggestion {
            prompt,
            reason: FREE_FORM_REASON.to_string(),
            tool: DEFAULT_TOOL.to_string(),
            session_label: String::new(),
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Heuristic Fallback
// ═══════════════════════════════════════════════════════════════════════════════

/// What the heuristic templates focus on: the latest prompt, else the first
/// note's content, else a generic placeholder.
fn heuristic_focus(state: &CanonicalState) -> String {
    let latest_prompt = state
        .prompts
        .last()
        .map(|prompt| prompt.text.as_str())
        .or_else(|| {
            state
                .timeline
                .iter()
                .rev()
                .find(|entry| entry.entry_type == EntryType::Prompt)
                .map(|entry| entry.text.as_str())
        })
        .filter(|text| !text.trim().is_empty());

    let first_note = state
        .notes
        .first()
        .map(|note| note.content.as_str())
        .filter(|content| !content.trim().is_empty());

    trim_for_model(
        latest_prompt.or(first_note).unwrap_or(FALLBACK_FOCUS),
        120,
    )
}

pub fn heuristic_suggestions(state: &CanonicalState, limit: usize) -> Vec<Suggestion> {
    let focus = heuristic_focus(state);
    let hottest = state.sessions.first();
    let hottest_tool = |fallback: &str| {
        hottest
            .map(|session| session.tool.clone())
            .filter(|tool| !tool.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    };

    let suggestion = |prompt: String, reason: &str, tool: String, session_label: &str| Suggestion {
        prompt,
        reason: reason.to_string(),
        tool,
        session_label: session_label.to_string(),
    };

    let slice_label = hottest
        .map(|session| session.label.clone())
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| "delivery-slice".to_string());

    let templates = vec![
        suggestion(
            format!("Turn this objective into a thin vertical slice with acceptance criteria: {focus}"),
            "Creates a concrete first delivery target.",
            hottest_tool(DEFAULT_TOOL),
            slice_label.as_str(),
        ),
        suggestion(
            format!(
                "List likely failure modes for \"{focus}\" and generate one focused test per failure mode."
            ),
            "Builds test coverage early and prevents regressions.",
            "python".to_string(),
            "risk-tests",
        ),
        suggestion(
            "Refactor plan: identify coupling hotspots in this implementation and propose a 3-step low-risk cleanup."
                .to_string(),
            "Reduces tech debt while feature context is fresh.",
            DEFAULT_TOOL.to_string(),
            "refactor-pass",
        ),
        suggestion(
            "Create a debugging checklist for this workflow with expected logs, checkpoints, and rollback steps."
                .to_string(),
            "Makes troubleshooting faster during iteration.",
            hottest_tool("bash-cli"),
            "debug-checklist",
        ),
        suggestion(
            format!(
                "Generate prompts to compare 2 implementation options for \"{focus}\" with tradeoffs in speed, reliability, and complexity."
            ),
            "Improves decision quality before writing more code.",
            DEFAULT_TOOL.to_string(),
            "design-review",
        ),
        suggestion(
            "Based on the latest notes, draft the next 3 prompts I should run today in strict execution order."
                .to_string(),
            "Keeps momentum and reduces context switching.",
            hottest_tool(DEFAULT_TOOL),
            "daily-sequence",
        ),
    ];

    templates.into_iter().take(limit).collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Orchestration
// ═══════════════════════════════════════════════════════════════════════════════

pub fn evolve_prompts(
    state: &CanonicalState,
    model: &dyn SuggestionModel,
    limit: usize,
) -> SuggestionOutcome {
    let fallback = |message: String| SuggestionOutcome {
        source: Provenance::Heuristic,
        items: heuristic_suggestions(state, limit),
        message,
    };

    let request = ModelRequest::from_state(state, limit);
    let content = match model.complete(&request) {
        Ok(content) => content,
        Err(ModelError::NotConfigured) => {
            return fallback("No GROQ_API_KEY set, using heuristic suggestions.".to_string());
        }
        Err(ModelError::Status(status)) => {
            tracing::warn!(status, "Suggestion model returned non-success status");
            return fallback(format!(
                "Groq returned HTTP {status}, using heuristic fallback."
            ));
        }
        Err(err) => {
            tracing::warn!(error = %err, "Prompt evolution request failed");
            return fallback("Prompt evolution request failed, using heuristic fallback.".to_string());
        }
    };

    let items = parse_model_suggestions(&content, limit);
    if items.is_empty() {
        tracing::debug!("Model reply held no usable suggestions");
        return fallback(
            "Model response was empty or invalid JSON, using heuristic fallback.".to_string(),
        );
    }

    SuggestionOutcome {
        source: Provenance::Groq,
        items,
        message: "Generated by Groq prompt-evolution model.".to_string(),
    }
}
