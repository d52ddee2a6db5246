//! Canonical state types persisted to `thought-partner-state.json`.
//!
//! Field names are camelCase on disk so the rendering shell can read the file
//! and the IPC payloads without a translation layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tool assumed for prompts and sessions that don't name one.
pub const DEFAULT_TOOL: &str = "codex-cli";

/// The live timeline keeps at most this many entries (oldest evicted first).
pub const TIMELINE_LIMIT: usize = 500;

pub const MAX_NOTE_TAGS: usize = 12;
pub const MAX_TAG_CHARS: usize = 48;

pub const SCRATCHPAD_TITLE: &str = "Scratchpad";
pub const MIGRATED_NOTE_TITLE: &str = "Migrated note";

pub fn new_id() -> String {
    ulid::Ulid::new().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn scratchpad(now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            title: SCRATCHPAD_TITLE.to_string(),
            content: String::new(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A prompt logged against a tool session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRecord {
    pub id: String,
    pub text: String,
    /// Free-form result the user recorded ("worked", "needs retry", ...).
    pub outcome: String,
    pub tool: String,
    pub session_id: String,
    pub session_label: String,
    pub note_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate over the prompts issued in one tool session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub tool: String,
    pub label: String,
    pub prompt_count: u64,
    pub last_prompt_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub prompt: String,
    pub reason: String,
    pub tool: String,
    pub session_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub label: String,
    pub done: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DockSide {
    Left,
    #[default]
    Right,
}

impl DockSide {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" => Some(DockSide::Left),
            "right" => Some(DockSide::Right),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DockSide::Left => "left",
            DockSide::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub pinned: bool,
    pub dock: DockSide,
    pub auto_capture_prompts: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            pinned: false,
            dock: DockSide::Right,
            auto_capture_prompts: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Prompt,
    Note,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Implemented,
    Partial,
    Failed,
    Pending,
}

impl Outcome {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "implemented" => Some(Outcome::Implemented),
            "partial" => Some(Outcome::Partial),
            "failed" => Some(Outcome::Failed),
            "pending" => Some(Outcome::Pending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntrySource {
    #[serde(rename = "manual")]
    Manual,
    #[serde(rename = "auto-capture")]
    AutoCapture,
}

/// One row of the session timeline.
///
/// Immutable once created except for `outcome`. `outcome` is `None` exactly
/// when `entry_type` is [`EntryType::Note`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub text: String,
    pub outcome: Option<Outcome>,
    pub source: EntrySource,
    pub created_at: DateTime<Utc>,
}

impl TimelineEntry {
    pub fn captured_prompt(text: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            entry_type: EntryType::Prompt,
            text: text.trim().to_string(),
            outcome: Some(Outcome::Pending),
            source: EntrySource::AutoCapture,
            created_at: now,
        }
    }
}

/// The single reconciled, invariant-satisfying representation of user data.
///
/// Only [`crate::reconcile`] produces values of this type from raw input;
/// callers mutate it through [`crate::merge_and_reconcile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalState {
    pub notes: Vec<Note>,
    pub active_note_id: String,
    pub prompts: Vec<PromptRecord>,
    pub sessions: Vec<Session>,
    pub goals: Vec<String>,
    pub milestones: Vec<Milestone>,
    pub suggestions: Vec<Suggestion>,
    pub preferences: Preferences,
    pub timeline: Vec<TimelineEntry>,
    pub session_goal: Option<String>,
    pub session_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Top-level fields this schema doesn't know, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Top-level keys owned by [`CanonicalState`]; everything else lands in `extra`.
pub const KNOWN_FIELDS: [&str; 13] = [
    "notes",
    "activeNoteId",
    "prompts",
    "sessions",
    "goals",
    "milestones",
    "suggestions",
    "preferences",
    "timeline",
    "sessionGoal",
    "sessionStartedAt",
    "createdAt",
    "updatedAt",
];

impl CanonicalState {
    /// Fresh state with a single empty Scratchpad note.
    pub fn fresh(now: DateTime<Utc>) -> Self {
        let note = Note::scratchpad(now);
        Self {
            active_note_id: note.id.clone(),
            notes: vec![note],
            prompts: Vec::new(),
            sessions: Vec::new(),
            goals: Vec::new(),
            milestones: Vec::new(),
            suggestions: Vec::new(),
            preferences: Preferences::default(),
            timeline: Vec::new(),
            session_goal: None,
            session_started_at: None,
            created_at: now,
            updated_at: now,
            extra: Map::new(),
        }
    }

    pub fn active_note(&self) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == self.active_note_id)
    }

    /// Appends to the timeline, evicting the oldest entries past [`TIMELINE_LIMIT`].
    pub fn push_timeline_entry(&mut self, entry: TimelineEntry) {
        self.timeline.push(entry);
        cap_timeline(&mut self.timeline);
    }
}

pub(crate) fn cap_timeline(timeline: &mut Vec<TimelineEntry>) {
    if timeline.len() > TIMELINE_LIMIT {
        let overflow = timeline.len() - TIMELINE_LIMIT;
        timeline.drain(..overflow);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn fresh_state_has_active_scratchpad() {
        let state = CanonicalState::fresh(Utc::now());
        assert_eq!(state.notes.len(), 1);
        assert_eq!(state.notes[0].title, SCRATCHPAD_TITLE);
        assert_eq!(state.active_note().map(|n| n.id.as_str()), Some(state.notes[0].id.as_str()));
    }

    #[test]
    fn pushing_past_limit_evicts_oldest() {
        let start = Utc::now();
        let mut state = CanonicalState::fresh(start);
        for i in 0..TIMELINE_LIMIT {
            state.push_timeline_entry(TimelineEntry::captured_prompt(
                &format!("prompt {i}"),
                start + Duration::seconds(i as i64),
            ));
        }
        let oldest_id = state.timeline[0].id.clone();

        state.push_timeline_entry(TimelineEntry::captured_prompt(
            "prompt 500",
            start + Duration::seconds(TIMELINE_LIMIT as i64),
        ));

        assert_eq!(state.timeline.len(), TIMELINE_LIMIT);
        assert!(state.timeline.iter().all(|entry| entry.id != oldest_id));
        assert_eq!(state.timeline[0].text, "prompt 1");
        assert_eq!(state.timeline[TIMELINE_LIMIT - 1].text, "prompt 500");
        assert!(state
            .timeline
            .windows(2)
            .all(|pair| pair[0].created_at <= pair[1].created_at));
    }

    #[test]
    fn timeline_entry_serializes_with_wire_names() {
        let entry = TimelineEntry::captured_prompt("  draft the migration plan  ", Utc::now());
        let value = serde_json::to_value(&entry).expect("serialize");
        assert_eq!(value["type"], "prompt");
        assert_eq!(value["outcome"], "pending");
        assert_eq!(value["source"], "auto-capture");
        assert_eq!(value["text"], "draft the migration plan");
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn dock_side_parse_is_lenient_on_case() {
        assert_eq!(DockSide::parse(" Left "), Some(DockSide::Left));
        assert_eq!(DockSide::parse("right"), Some(DockSide::Right));
        assert_eq!(DockSide::parse("top"), None);
    }
}
