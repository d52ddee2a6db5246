//! Persistence of the canonical state and the single authoritative copy.
//!
//! # Write Path
//!
//! Every mutation goes through [`StateStore::update`]: merge the partial
//! update, reconcile, write the complete state, then commit it in memory. If
//! the write fails the in-memory state is left unchanged and the error is
//! returned, since that is the one failure with data-loss consequences.
//!
//! # Atomic Writes
//!
//! [`JsonFileStore`] writes a temp file in the target directory and renames it
//! over the state file, so readers see either the old or the new state.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::classifier::normalize_for_hash;
use crate::error::{PartnerError, Result};
use crate::reconcile::{merge_and_reconcile, reconcile};
use crate::types::{CanonicalState, TimelineEntry};

/// Where the canonical state lives between runs.
pub trait Persistence: Send {
    /// Returns `Ok(None)` when nothing has been persisted yet.
    fn load(&self) -> Result<Option<Value>>;
    /// Overwrites the persisted state with `state` in full.
    fn store(&self, state: &CanonicalState) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// JSON File
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Persistence for JsonFileStore {
    fn load(&self) -> Result<Option<Value>> {
        let content = match fs_err::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PartnerError::Io {
                    context: "reading state file".to_string(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| PartnerError::Json {
                context: format!("parsing {}", self.path.display()),
                source,
            })
    }

    fn store(&self, state: &CanonicalState) -> Result<()> {
        let persist_error = |details: String| PartnerError::Persist {
            path: self.path.clone(),
            details,
        };

        let content = serde_json::to_string_pretty(state).map_err(|source| PartnerError::Json {
            context: "serializing canonical state".to_string(),
            source,
        })?;

        let parent_dir = self
            .path
            .parent()
            .ok_or_else(|| persist_error("state file path has no parent directory".to_string()))?;
        fs_err::create_dir_all(parent_dir).map_err(|source| PartnerError::Io {
            context: "creating state directory".to_string(),
            source,
        })?;

        let mut temp_file = NamedTempFile::new_in(parent_dir)
            .map_err(|e| persist_error(format!("temp file error: {}", e)))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| persist_error(format!("failed to write temp state file: {}", e)))?;
        temp_file
            .flush()
            .map_err(|e| persist_error(format!("failed to flush temp state file: {}", e)))?;
        temp_file
            .persist(&self.path)
            .map_err(|e| persist_error(format!("failed to replace state file: {}", e.error)))?;

        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-Memory
// ═══════════════════════════════════════════════════════════════════════════════

/// Persistence that keeps the last stored value in memory. Writes can be made
/// to fail, which exercises the error path of mutating operations.
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: Mutex<Option<Value>>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: Value) -> Self {
        Self {
            saved: Mutex::new(Some(value)),
            fail_writes: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            saved: Mutex::new(None),
            fail_writes: true,
        }
    }

    pub fn saved(&self) -> Option<Value> {
        self.saved.lock().ok().and_then(|saved| saved.clone())
    }
}

impl Persistence for MemoryStore {
    fn load(&self) -> Result<Option<Value>> {
        Ok(self.saved())
    }

    fn store(&self, state: &CanonicalState) -> Result<()> {
        if self.fail_writes {
            return Err(PartnerError::Persist {
                path: PathBuf::from(":memory:"),
                details: "writes disabled".to_string(),
            });
        }
        let value = serde_json::to_value(state).map_err(|source| PartnerError::Json {
            context: "serializing canonical state".to_string(),
            source,
        })?;
        if let Ok(mut saved) = self.saved.lock() {
            *saved = Some(value);
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// State Store
// ═══════════════════════════════════════════════════════════════════════════════

/// The single in-memory authoritative state plus its persistence.
pub struct StateStore<P: Persistence> {
    persistence: P,
    state: CanonicalState,
}

impl<P: Persistence> StateStore<P> {
    /// Loads and reconciles persisted state, falling back to defaults.
    ///
    /// A missing file is initialised with the defaults; a corrupt file is
    /// left alone until the next successful write replaces it.
    pub fn open(persistence: P, now: DateTime<Utc>) -> Self {
        let state = match persistence.load() {
            Ok(Some(raw)) => reconcile(&raw, now),
            Ok(None) => {
                let state = CanonicalState::fresh(now);
                if let Err(err) = persistence.store(&state) {
                    tracing::warn!(error = %err, "Failed to write initial state");
                }
                state
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read state; using defaults");
                CanonicalState::fresh(now)
            }
        };

        Self { persistence, state }
    }

    pub fn state(&self) -> &CanonicalState {
        &self.state
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    /// Merges `partial` into the current state, persists, and returns the result.
    pub fn update(&mut self, partial: &Value, now: DateTime<Utc>) -> Result<CanonicalState> {
        let next = merge_and_reconcile(&self.state, partial, now);
        self.persistence.store(&next)?;
        self.state = next;
        Ok(self.state.clone())
    }

    pub fn auto_capture_enabled(&self) -> bool {
        self.state.preferences.auto_capture_prompts
    }

    /// Appends an auto-captured prompt to the timeline.
    ///
    /// Returns `Ok(None)` when the text is empty after normalization or when
    /// the most recent timeline entry already has the same normalized text.
    pub fn append_auto_prompt(
        &mut self,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<TimelineEntry>> {
        let normalized = normalize_for_hash(text);
        if normalized.is_empty() {
            return Ok(None);
        }

        if let Some(latest) = self.state.timeline.last() {
            if normalize_for_hash(&latest.text) == normalized {
                return Ok(None);
            }
        }

        // Never older than the newest entry, so the timeline sort can't evict it.
        let stamped_at = self
            .state
            .timeline
            .last()
            .map_or(now, |latest| latest.created_at.max(now));
        let entry = TimelineEntry::captured_prompt(text, stamped_at);

        let mut draft = self.state.clone();
        draft.push_timeline_entry(entry.clone());
        let timeline =
            serde_json::to_value(&draft.timeline).map_err(|source| PartnerError::Json {
                context: "serializing timeline".to_string(),
                source,
            })?;

        let updated = self.update(&serde_json::json!({ "timeline": timeline }), now)?;
        if !updated.timeline.iter().any(|kept| kept.id == entry.id) {
            tracing::warn!(entry_id = %entry.id, "Captured prompt did not survive timeline cap");
            return Ok(None);
        }
        Ok(Some(entry))
    }
}
