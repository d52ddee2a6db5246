//! Clipboard prompt-capture pipeline.
//!
//! One [`CapturePipeline::poll`] per tick, in this order:
//!
//! 1. Inert unless auto-capture is enabled (checked before touching the clipboard)
//! 2. Read the clipboard; an unreadable clipboard skips the tick
//! 3. Empty text resets the last-seen hash
//! 4. Unchanged hash since the previous tick stops early
//! 5. Classify; rejected text stops
//! 6. Dedupe against recently accepted hashes
//! 7. Append to the timeline, persist, then record the hash
//!
//! Nothing here surfaces an error to the user. Every failure becomes a
//! [`PollOutcome`] describing why the tick was skipped.

use chrono::{DateTime, Utc};

use crate::classifier::{classify, content_hash, Rejection, Verdict};
use crate::config::CaptureConfig;
use crate::dedupe::RecentHashes;
use crate::error::Result;
use crate::store::{Persistence, StateStore};
use crate::types::TimelineEntry;

#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),

    #[error("clipboard does not hold text")]
    NotText,
}

/// Read access to the system clipboard.
pub trait ClipboardSource {
    fn read_text(&mut self) -> std::result::Result<String, ClipboardError>;
}

/// Where accepted prompts go.
pub trait CaptureSink {
    fn auto_capture_enabled(&self) -> bool;
    fn append_auto_prompt(&mut self, text: &str, now: DateTime<Utc>)
        -> Result<Option<TimelineEntry>>;
}

impl<P: Persistence> CaptureSink for StateStore<P> {
    fn auto_capture_enabled(&self) -> bool {
        StateStore::auto_capture_enabled(self)
    }

    fn append_auto_prompt(
        &mut self,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<TimelineEntry>> {
        StateStore::append_auto_prompt(self, text, now)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Disabled,
    Unreadable,
    Cleared,
    Unchanged,
    Rejected(Rejection),
    /// Accepted within the dedupe window.
    Duplicate,
    /// The newest timeline entry already holds this text.
    AlreadyLatest,
    PersistFailed,
    Captured(TimelineEntry),
}

#[derive(Debug)]
pub struct CapturePipeline {
    config: CaptureConfig,
    last_hash: Option<String>,
    recent: RecentHashes,
}

impl CapturePipeline {
    pub fn new(config: CaptureConfig) -> Self {
        let recent = RecentHashes::new(config.dedupe_window());
        Self {
            config,
            last_hash: None,
            recent,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Marks whatever is on the clipboard at startup as already seen.
    pub fn seed(&mut self, clipboard: &mut dyn ClipboardSource) {
        match clipboard.read_text() {
            Ok(text) if !text.trim().is_empty() => {
                self.last_hash = Some(content_hash(&text));
            }
            Ok(_) => {}
            Err(err) => tracing::debug!(error = %err, "Clipboard unreadable while seeding"),
        }
    }

    pub fn poll(
        &mut self,
        clipboard: &mut dyn ClipboardSource,
        sink: &mut dyn CaptureSink,
        now: DateTime<Utc>,
    ) -> PollOutcome {
        if !sink.auto_capture_enabled() {
            return PollOutcome::Disabled;
        }

        let text = match clipboard.read_text() {
            Ok(text) => text,
            Err(err) => {
                tracing::debug!(error = %err, "Clipboard unreadable; skipping tick");
                return PollOutcome::Unreadable;
            }
        };

        let text = text.trim();
        if text.is_empty() {
            self.last_hash = None;
            return PollOutcome::Cleared;
        }

        let hash = content_hash(text);
        if self.last_hash.as_deref() == Some(hash.as_str()) {
            return PollOutcome::Unchanged;
        }
        self.last_hash = Some(hash.clone());

        if let Verdict::Rejected(reason) = classify(text, &self.config) {
            return PollOutcome::Rejected(reason);
        }

        if self.recent.seen_within_window(&hash, now) {
            tracing::debug!("Prompt seen within dedupe window; discarding");
            return PollOutcome::Duplicate;
        }

        match sink.append_auto_prompt(text, now) {
            Ok(Some(entry)) => {
                self.recent.record(hash, now);
                tracing::info!(entry_id = %entry.id, "Captured prompt from clipboard");
                PollOutcome::Captured(entry)
            }
            Ok(None) => PollOutcome::AlreadyLatest,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to persist captured prompt");
                PollOutcome::PersistFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{EntrySource, EntryType, Outcome};
    use chrono::Duration;
    use serde_json::json;

    const PROMPT: &str = "Refactor the clipboard watcher so it stops leaking handles";
    const OTHER: &str = "Can you explain why the dock flickers on the second monitor?";

    #[derive(Default)]
    struct FakeClipboard {
        text: Option<String>,
        reads: usize,
    }

    impl FakeClipboard {
        fn holding(text: &str) -> Self {
            Self {
                text: Some(text.to_string()),
                reads: 0,
            }
        }

        fn copy(&mut self, text: &str) {
            self.text = Some(text.to_string());
        }
    }

    impl ClipboardSource for FakeClipboard {
        fn read_text(&mut self) -> std::result::Result<String, ClipboardError> {
            self.reads += 1;
            self.text.clone().ok_or(ClipboardError::NotText)
        }
    }

    fn store(now: DateTime<Utc>) -> StateStore<MemoryStore> {
        StateStore::open(MemoryStore::new(), now)
    }

    fn count_of(store: &StateStore<MemoryStore>, text: &str) -> usize {
        store
            .state()
            .timeline
            .iter()
            .filter(|entry| entry.text == text)
            .count()
    }

    #[test]
    fn accepted_prompt_is_appended_as_pending_auto_capture() {
        let now = Utc::now();
        let mut store = store(now);
        let mut pipeline = CapturePipeline::new(CaptureConfig::default());
        let mut clipboard = FakeClipboard::holding(PROMPT);

        let outcome = pipeline.poll(&mut clipboard, &mut store, now);
        let PollOutcome::Captured(entry) = outcome else {
            panic!("expected capture, got {outcome:?}");
        };
        assert_eq!(entry.entry_type, EntryType::Prompt);
        assert_eq!(entry.outcome, Some(Outcome::Pending));
        assert_eq!(entry.source, EntrySource::AutoCapture);
        assert_eq!(store.state().timeline.len(), 1);
        assert!(store.persistence().saved().is_some());
    }

    #[test]
    fn unchanged_clipboard_is_not_reprocessed() {
        let now = Utc::now();
        let mut store = store(now);
        let mut pipeline = CapturePipeline::new(CaptureConfig::default());
        let mut clipboard = FakeClipboard::holding(PROMPT);

        pipeline.poll(&mut clipboard, &mut store, now);
        assert_eq!(
            pipeline.poll(&mut clipboard, &mut store, now + Duration::seconds(1)),
            PollOutcome::Unchanged
        );
    }

    #[test]
    fn disabled_preference_never_touches_clipboard() {
        let now = Utc::now();
        let mut store = StateStore::open(
            MemoryStore::with_value(json!({ "preferences": { "autoCapturePrompts": false } })),
            now,
        );
        let mut pipeline = CapturePipeline::new(CaptureConfig::default());
        let mut clipboard = FakeClipboard::holding(PROMPT);

        assert_eq!(
            pipeline.poll(&mut clipboard, &mut store, now),
            PollOutcome::Disabled
        );
        assert_eq!(clipboard.reads, 0);
        assert!(store.state().timeline.is_empty());
    }

    #[test]
    fn unreadable_clipboard_keeps_last_hash() {
        let now = Utc::now();
        let mut store = store(now);
        let mut pipeline = CapturePipeline::new(CaptureConfig::default());
        let mut clipboard = FakeClipboard::holding(PROMPT);

        pipeline.poll(&mut clipboard, &mut store, now);
        clipboard.text = None;
        assert_eq!(
            pipeline.poll(&mut clipboard, &mut store, now),
            PollOutcome::Unreadable
        );
        clipboard.copy(PROMPT);
        assert_eq!(
            pipeline.poll(&mut clipboard, &mut store, now),
            PollOutcome::Unchanged
        );
    }

    #[test]
    fn non_prompt_text_is_rejected() {
        let now = Utc::now();
        let mut store = store(now);
        let mut pipeline = CapturePipeline::new(CaptureConfig::default());
        let mut clipboard = FakeClipboard::holding("https://example.com/resource");

        assert!(matches!(
            pipeline.poll(&mut clipboard, &mut store, now),
            PollOutcome::Rejected(_)
        ));
        assert!(store.state().timeline.is_empty());
    }

    #[test]
    fn recopy_within_window_is_discarded() {
        let start = Utc::now();
        let mut store = store(start);
        let mut pipeline = CapturePipeline::new(CaptureConfig::default());
        let mut clipboard = FakeClipboard::holding(PROMPT);

        pipeline.poll(&mut clipboard, &mut store, start);
        clipboard.copy(OTHER);
        pipeline.poll(&mut clipboard, &mut store, start + Duration::minutes(1));
        clipboard.copy("");
        assert_eq!(
            pipeline.poll(&mut clipboard, &mut store, start + Duration::minutes(2)),
            PollOutcome::Cleared
        );
        clipboard.copy(PROMPT);
        assert_eq!(
            pipeline.poll(&mut clipboard, &mut store, start + Duration::minutes(3)),
            PollOutcome::Duplicate
        );

        assert_eq!(count_of(&store, PROMPT), 1);
    }

    #[test]
    fn recopy_after_window_is_captured_again() {
        let start = Utc::now();
        let mut store = store(start);
        let mut pipeline = CapturePipeline::new(CaptureConfig::default());
        let mut clipboard = FakeClipboard::holding(PROMPT);

        pipeline.poll(&mut clipboard, &mut store, start);
        clipboard.copy(OTHER);
        pipeline.poll(&mut clipboard, &mut store, start + Duration::minutes(1));
        clipboard.copy(PROMPT);
        let outcome = pipeline.poll(&mut clipboard, &mut store, start + Duration::minutes(10));

        assert!(matches!(outcome, PollOutcome::Captured(_)));
        assert_eq!(count_of(&store, PROMPT), 2);
    }

    #[test]
    fn latest_entry_guard_covers_restarts() {
        let start = Utc::now();
        let mut store = store(start);
        let mut first = CapturePipeline::new(CaptureConfig::default());
        let mut clipboard = FakeClipboard::holding(PROMPT);
        first.poll(&mut clipboard, &mut store, start);

        let mut restarted = CapturePipeline::new(CaptureConfig::default());
        assert_eq!(
            restarted.poll(&mut clipboard, &mut store, start + Duration::seconds(5)),
            PollOutcome::AlreadyLatest
        );
        assert_eq!(count_of(&store, PROMPT), 1);
    }

    #[test]
    fn seeded_clipboard_is_not_captured() {
        let now = Utc::now();
        let mut store = store(now);
        let mut pipeline = CapturePipeline::new(CaptureConfig::default());
        let mut clipboard = FakeClipboard::holding(PROMPT);

        pipeline.seed(&mut clipboard);
        assert_eq!(
            pipeline.poll(&mut clipboard, &mut store, now),
            PollOutcome::Unchanged
        );
        assert!(store.state().timeline.is_empty());
    }

    #[test]
    fn persist_failure_skips_tick_without_recording() {
        let now = Utc::now();
        let mut store = StateStore::open(MemoryStore::failing(), now);
        let mut pipeline = CapturePipeline::new(CaptureConfig::default());
        let mut clipboard = FakeClipboard::holding(PROMPT);

        assert_eq!(
            pipeline.poll(&mut clipboard, &mut store, now),
            PollOutcome::PersistFailed
        );
        assert!(store.state().timeline.is_empty());
        assert!(pipeline.recent.is_empty());
    }
}
