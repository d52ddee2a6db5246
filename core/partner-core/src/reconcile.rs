//! State reconciliation: arbitrary persisted JSON in, [`CanonicalState`] out.
//!
//! # Contract
//!
//! - **Total**: any JSON value (including `null`, arrays, scalars and legacy
//!   shapes) produces a valid state. Nothing here returns an error.
//! - **Idempotent**: reconciling the serialized output of `reconcile` yields
//!   the same state. Generated ids and timestamps are only generated once,
//!   because the first pass writes them into the output.
//! - **Invariants**: at least one note; `activeNoteId` names an existing note;
//!   prompts have non-empty text; the timeline is sorted ascending and capped.
//!
//! # Input shapes
//!
//! Legacy variants are classified once, up front, by [`NotesShape`] and
//! [`SessionsShape`]. Field handling below never re-inspects the raw type.
//!
//! # Merge
//!
//! [`merge_and_reconcile`] shallow-merges a partial update over the previous
//! state (deep for `preferences`), reconciles the result, then pins
//! `createdAt` to the original value and advances `updatedAt`.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::patterns::RE_SLUG_SEPARATOR;
use crate::types::{
    cap_timeline, new_id, CanonicalState, DockSide, EntrySource, EntryType, Milestone, Note,
    Outcome, Preferences, PromptRecord, Session, Suggestion, TimelineEntry, DEFAULT_TOOL,
    KNOWN_FIELDS, MAX_NOTE_TAGS, MAX_TAG_CHARS, MIGRATED_NOTE_TITLE,
};

const UNTITLED_SESSION: &str = "Untitled session";

// ═══════════════════════════════════════════════════════════════════════════════
// Input Shapes
// ═══════════════════════════════════════════════════════════════════════════════

/// How the `notes` field arrived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NotesShape<'a> {
    Structured(&'a [Value]),
    /// Pre-notes builds stored a single free-form string.
    LegacyString(&'a str),
    Absent,
}

impl<'a> NotesShape<'a> {
    pub fn of(raw: &'a Map<String, Value>) -> Self {
        match raw.get("notes") {
            Some(Value::Array(items)) => NotesShape::Structured(items),
            Some(Value::String(text)) => NotesShape::LegacyString(text),
            _ => NotesShape::Absent,
        }
    }
}

/// Whether sessions were persisted or must be derived from prompts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionsShape<'a> {
    Persisted(&'a [Value]),
    Missing,
}

impl<'a> SessionsShape<'a> {
    pub fn of(raw: &'a Map<String, Value>) -> Self {
        match raw.get("sessions") {
            Some(Value::Array(items)) if !items.is_empty() => SessionsShape::Persisted(items),
            _ => SessionsShape::Missing,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Reconcile
// ═══════════════════════════════════════════════════════════════════════════════

/// Produces the canonical state for `raw`, filling defaults with `now`.
pub fn reconcile(raw: &Value, now: DateTime<Utc>) -> CanonicalState {
    let empty = Map::new();
    let parsed = raw.as_object().unwrap_or(&empty);

    let notes_shape = NotesShape::of(parsed);
    let notes = normalize_notes(notes_shape, now);

    let requested_active = safe_text(parsed.get("activeNoteId"));
    let active_note_id = notes
        .iter()
        .find(|note| note.id == requested_active)
        .unwrap_or(&notes[0])
        .id
        .clone();

    let prompts: Vec<PromptRecord> = array(parsed.get("prompts"))
        .iter()
        .map(|prompt| normalize_prompt(prompt, now))
        .filter(|prompt| !prompt.text.is_empty())
        .collect();

    let sessions = match SessionsShape::of(parsed) {
        SessionsShape::Persisted(items) => items
            .iter()
            .map(|session| normalize_session(session, now))
            .collect(),
        SessionsShape::Missing => build_sessions_from_prompts(&prompts),
    };

    let goals: Vec<String> = array(parsed.get("goals"))
        .iter()
        .map(|goal| safe_text(Some(goal)))
        .filter(|goal| !goal.is_empty())
        .collect();

    let milestones = normalize_milestones(array(parsed.get("milestones")), &goals);

    let suggestions = array(parsed.get("suggestions"))
        .iter()
        .map(normalize_suggestion)
        .filter(|suggestion| !suggestion.prompt.is_empty())
        .collect();

    let timeline = normalize_timeline(parsed, notes_shape, now);

    let session_goal = Some(safe_text(parsed.get("sessionGoal"))).filter(|goal| !goal.is_empty());

    let extra = parsed
        .iter()
        .filter(|(key, _)| !KNOWN_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    CanonicalState {
        notes,
        active_note_id,
        prompts,
        sessions,
        goals,
        milestones,
        suggestions,
        preferences: normalize_preferences(parsed.get("preferences")),
        timeline,
        session_goal,
        session_started_at: parse_timestamp(parsed.get("sessionStartedAt")),
        created_at: timestamp_or(parsed.get("createdAt"), now),
        updated_at: timestamp_or(parsed.get("updatedAt"), now),
        extra,
    }
}

/// Applies a partial update on top of `previous` and reconciles the result.
///
/// Keys absent from `partial` (or explicitly `null`) keep their previous
/// value. `preferences` merges field by field. A non-object `partial` is
/// treated as an empty update.
pub fn merge_and_reconcile(
    previous: &CanonicalState,
    partial: &Value,
    now: DateTime<Utc>,
) -> CanonicalState {
    let mut merged = match serde_json::to_value(previous) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            tracing::error!("Canonical state did not serialize to an object; rebuilding");
            Map::new()
        }
    };

    if let Some(updates) = partial.as_object() {
        for (key, value) in updates {
            if value.is_null() {
                continue;
            }
            if key == "preferences" {
                merge_preferences(&mut merged, value);
            } else {
                merged.insert(key.clone(), value.clone());
            }
        }
    }

    let mut next = reconcile(&Value::Object(merged), now);
    next.created_at = previous.created_at;
    next.updated_at = advance_updated_at(previous.updated_at, now);
    next
}

fn merge_preferences(merged: &mut Map<String, Value>, update: &Value) {
    let Some(update) = update.as_object() else {
        return;
    };
    let entry = merged
        .entry("preferences".to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Value::Object(prefs) = entry {
        for (key, value) in update {
            if !value.is_null() {
                prefs.insert(key.clone(), value.clone());
            }
        }
    }
}

/// `updatedAt` strictly advances on every write even if the wall clock doesn't.
fn advance_updated_at(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Notes
// ═══════════════════════════════════════════════════════════════════════════════

fn normalize_notes(shape: NotesShape<'_>, now: DateTime<Utc>) -> Vec<Note> {
    let mut notes: Vec<Note> = match shape {
        NotesShape::Structured(items) => items
            .iter()
            .enumerate()
            .map(|(index, note)| normalize_note(note, index, now))
            .collect(),
        NotesShape::LegacyString(text) => {
            let content = text.trim();
            if content.is_empty() {
                Vec::new()
            } else {
                vec![Note {
                    id: new_id(),
                    title: MIGRATED_NOTE_TITLE.to_string(),
                    content: content.to_string(),
                    tags: Vec::new(),
                    created_at: now,
                    updated_at: now,
                }]
            }
        }
        NotesShape::Absent => Vec::new(),
    };

    let mut seen = HashSet::new();
    for note in &mut notes {
        if !seen.insert(note.id.clone()) {
            note.id = new_id();
            seen.insert(note.id.clone());
        }
    }

    if notes.is_empty() {
        notes.push(Note::scratchpad(now));
    }
    notes
}

fn normalize_note(note: &Value, index: usize, now: DateTime<Utc>) -> Note {
    let title = safe_text(note.get("title"));
    Note {
        id: id_or_new(note.get("id")),
        title: if title.is_empty() {
            format!("Note {}", index + 1)
        } else {
            title
        },
        content: raw_text(note.get("content")),
        tags: normalize_tags(note.get("tags")),
        created_at: timestamp_or(note.get("createdAt"), now),
        updated_at: timestamp_or(note.get("updatedAt"), now),
    }
}

/// Trimmed, truncated, de-duplicated by first position, capped.
fn normalize_tags(tags: Option<&Value>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in array(tags) {
        let text = safe_text(Some(tag));
        if text.is_empty() {
            continue;
        }
        let truncated: String = text.chars().take(MAX_TAG_CHARS).collect();
        let truncated = truncated.trim_end().to_string();
        if !out.contains(&truncated) {
            out.push(truncated);
        }
        if out.len() == MAX_NOTE_TAGS {
            break;
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// Prompts & Sessions
// ═══════════════════════════════════════════════════════════════════════════════

fn normalize_prompt(prompt: &Value, now: DateTime<Utc>) -> PromptRecord {
    let tool = text_or(prompt.get("tool"), DEFAULT_TOOL);
    let session_label = {
        let label = safe_text(prompt.get("sessionLabel"));
        if label.is_empty() {
            format!("{} default", tool)
        } else {
            label
        }
    };
    let session_id = {
        let id = safe_text(prompt.get("sessionId"));
        if id.is_empty() {
            derive_session_id(&tool, &session_label)
        } else {
            id
        }
    };
    let note_id = Some(safe_text(prompt.get("noteId"))).filter(|id| !id.is_empty());

    PromptRecord {
        id: id_or_new(prompt.get("id")),
        text: safe_text(prompt.get("text")),
        outcome: safe_text(prompt.get("outcome")),
        tool,
        session_id,
        session_label,
        note_id,
        created_at: timestamp_or(prompt.get("createdAt"), now),
    }
}

/// Deterministic session id for prompts that don't carry one.
pub fn derive_session_id(tool: &str, label: &str) -> String {
    let lowered = label.to_lowercase();
    let slug = RE_SLUG_SEPARATOR.replace_all(&lowered, "-");
    format!("session-{}-{}", tool, slug)
}

fn normalize_session(session: &Value, now: DateTime<Utc>) -> Session {
    let prompt_count = session
        .get("promptCount")
        .and_then(Value::as_f64)
        .filter(|count| count.is_finite() && *count > 0.0)
        .map(|count| count as u64)
        .unwrap_or(0);

    Session {
        id: id_or_new(session.get("id")),
        tool: text_or(session.get("tool"), DEFAULT_TOOL),
        label: text_or(session.get("label"), UNTITLED_SESSION),
        prompt_count,
        last_prompt_at: timestamp_or(session.get("lastPromptAt"), now),
    }
}

/// Groups prompts by session, counting and tracking the latest timestamp.
/// Most recently active session first.
pub fn build_sessions_from_prompts(prompts: &[PromptRecord]) -> Vec<Session> {
    let mut order: Vec<String> = Vec::new();
    let mut by_id: HashMap<String, Session> = HashMap::new();

    for prompt in prompts.iter().filter(|prompt| !prompt.text.is_empty()) {
        let id = if prompt.session_id.is_empty() {
            format!("{}-{}", prompt.tool, prompt.session_label)
        } else {
            prompt.session_id.clone()
        };

        match by_id.get_mut(&id) {
            Some(existing) => {
                existing.prompt_count += 1;
                if prompt.created_at > existing.last_prompt_at {
                    existing.last_prompt_at = prompt.created_at;
                }
            }
            None => {
                order.push(id.clone());
                by_id.insert(
                    id.clone(),
                    Session {
                        id,
                        tool: non_empty_or(&prompt.tool, DEFAULT_TOOL),
                        label: non_empty_or(&prompt.session_label, UNTITLED_SESSION),
                        prompt_count: 1,
                        last_prompt_at: prompt.created_at,
                    },
                );
            }
        }
    }

    let mut sessions: Vec<Session> = order
        .into_iter()
        .filter_map(|id| by_id.remove(&id))
        .collect();
    sessions.sort_by(|a, b| b.last_prompt_at.cmp(&a.last_prompt_at));
    sessions
}

// ═══════════════════════════════════════════════════════════════════════════════
// Goals, Milestones, Suggestions, Preferences
// ═══════════════════════════════════════════════════════════════════════════════

fn normalize_milestones(raw: &[Value], goals: &[String]) -> Vec<Milestone> {
    if !raw.is_empty() {
        return raw
            .iter()
            .filter_map(|item| {
                let label = safe_text(item.get("label"));
                if label.is_empty() {
                    return None;
                }
                Some(Milestone {
                    id: id_or_new(item.get("id")),
                    label,
                    done: truthy(item.get("done")),
                })
            })
            .collect();
    }

    goals
        .iter()
        .map(|goal| Milestone {
            id: new_id(),
            label: goal.clone(),
            done: false,
        })
        .collect()
}

pub(crate) fn normalize_suggestion(suggestion: &Value) -> Suggestion {
    Suggestion {
        prompt: safe_text(suggestion.get("prompt")),
        reason: safe_text(suggestion.get("reason")),
        tool: text_or(suggestion.get("tool"), DEFAULT_TOOL),
        session_label: safe_text(suggestion.get("sessionLabel")),
    }
}

/// Defaults first, then every explicitly present field overrides.
fn normalize_preferences(raw: Option<&Value>) -> Preferences {
    let defaults = Preferences::default();
    let Some(prefs) = raw.and_then(Value::as_object) else {
        return defaults;
    };

    Preferences {
        pinned: coerce_bool(prefs.get("pinned"), defaults.pinned),
        dock: prefs
            .get("dock")
            .and_then(Value::as_str)
            .and_then(DockSide::parse)
            .unwrap_or(defaults.dock),
        auto_capture_prompts: coerce_bool(
            prefs.get("autoCapturePrompts"),
            defaults.auto_capture_prompts,
        ),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Timeline
// ═══════════════════════════════════════════════════════════════════════════════

fn normalize_timeline(
    parsed: &Map<String, Value>,
    notes_shape: NotesShape<'_>,
    now: DateTime<Utc>,
) -> Vec<TimelineEntry> {
    let persisted = array(parsed.get("timeline"));
    let mut entries: Vec<TimelineEntry> = if persisted.is_empty() {
        derive_timeline_from_legacy(parsed, notes_shape, now)
    } else {
        persisted
            .iter()
            .filter_map(|entry| normalize_entry(entry, now))
            .collect()
    };

    entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    cap_timeline(&mut entries);
    entries
}

fn normalize_entry(entry: &Value, now: DateTime<Utc>) -> Option<TimelineEntry> {
    let text = safe_text(entry.get("text"));
    if text.is_empty() {
        return None;
    }

    let entry_type = match entry.get("type").and_then(Value::as_str) {
        Some("note") => EntryType::Note,
        _ => EntryType::Prompt,
    };
    let outcome = match entry_type {
        EntryType::Note => None,
        EntryType::Prompt => Some(
            entry
                .get("outcome")
                .and_then(Value::as_str)
                .and_then(Outcome::parse)
                .unwrap_or(Outcome::Pending),
        ),
    };
    let source = match entry.get("source").and_then(Value::as_str) {
        Some("auto-capture") => EntrySource::AutoCapture,
        _ => EntrySource::Manual,
    };

    Some(TimelineEntry {
        id: id_or_new(entry.get("id")),
        entry_type,
        text,
        outcome,
        source,
        created_at: timestamp_or(entry.get("createdAt"), now),
    })
}

/// Builds timeline rows from pre-timeline data: prompts, then note contents.
fn derive_timeline_from_legacy(
    parsed: &Map<String, Value>,
    notes_shape: NotesShape<'_>,
    now: DateTime<Utc>,
) -> Vec<TimelineEntry> {
    let mut entries: Vec<TimelineEntry> = array(parsed.get("prompts"))
        .iter()
        .filter_map(|prompt| {
            let mut row = Map::new();
            row.insert("id".into(), prompt.get("id").cloned().unwrap_or(Value::Null));
            row.insert("type".into(), Value::from("prompt"));
            row.insert("text".into(), prompt.get("text").cloned().unwrap_or(Value::Null));
            row.insert(
                "outcome".into(),
                prompt.get("outcome").cloned().unwrap_or(Value::Null),
            );
            row.insert(
                "createdAt".into(),
                prompt.get("createdAt").cloned().unwrap_or(Value::Null),
            );
            normalize_entry(&Value::Object(row), now)
        })
        .collect();

    match notes_shape {
        NotesShape::Structured(items) => {
            entries.extend(items.iter().filter_map(|note| {
                let stamp = note
                    .get("updatedAt")
                    .filter(|value| !safe_text(Some(value)).is_empty())
                    .or_else(|| note.get("createdAt"));
                let mut row = Map::new();
                row.insert("id".into(), note.get("id").cloned().unwrap_or(Value::Null));
                row.insert("type".into(), Value::from("note"));
                row.insert("text".into(), note.get("content").cloned().unwrap_or(Value::Null));
                row.insert("createdAt".into(), stamp.cloned().unwrap_or(Value::Null));
                normalize_entry(&Value::Object(row), now)
            }));
        }
        NotesShape::LegacyString(text) if !text.trim().is_empty() => {
            entries.push(TimelineEntry {
                id: new_id(),
                entry_type: EntryType::Note,
                text: text.trim().to_string(),
                outcome: None,
                source: EntrySource::Manual,
                created_at: now,
            });
        }
        NotesShape::LegacyString(_) | NotesShape::Absent => {}
    }

    entries
}

// ═══════════════════════════════════════════════════════════════════════════════
// Coercion Helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Trimmed string form of a scalar; empty for null, false, arrays and objects.
pub fn safe_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(true)) => "true".to_string(),
        _ => String::new(),
    }
}

/// Untrimmed string form, for free-form bodies like note content.
fn raw_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(true)) => "true".to_string(),
        _ => String::new(),
    }
}

fn text_or(value: Option<&Value>, fallback: &str) -> String {
    non_empty_or(&safe_text(value), fallback)
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

fn id_or_new(value: Option<&Value>) -> String {
    let id = safe_text(value);
    if id.is_empty() {
        new_id()
    } else {
        id
    }
}

fn array(value: Option<&Value>) -> &[Value] {
    match value {
        Some(Value::Array(items)) => items,
        _ => &[],
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().map(|n| n != 0.0).unwrap_or(false),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn coerce_bool(value: Option<&Value>, default: bool) -> bool {
    match value {
        None | Some(Value::Null) => default,
        other => truthy(other),
    }
}

/// Accepts RFC 3339 strings and epoch milliseconds.
///
/// Only years 1..=9999 are kept; anything outside serializes to a form
/// RFC 3339 parsing cannot read back.
pub fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let parsed = match value? {
        Value::String(text) => DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(number) => number
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    };
    parsed.filter(|dt| (1..=9999).contains(&dt.year()))
}

fn timestamp_or(value: Option<&Value>, now: DateTime<Utc>) -> DateTime<Utc> {
    parse_timestamp(value).unwrap_or(now)
}
