//! In-memory state owned by the host.
//!
//! One `Host` is shared between the scheduler thread and connection threads.
//! Each resource sits behind its own mutex. Locks are always taken in the
//! order store, panel, events; a preference write holds the store until the
//! panel reflects it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::Utc;
use partner_core::{
    evolve_prompts, reconcile, CanonicalState, CapturePipeline, ClipboardSource, DockController,
    DockSide, JsonFileStore, PollOutcome, RuntimeConfig, StateStore, SuggestionModel,
    SuggestionOutcome, WindowControl,
};
use partner_protocol::{ErrorInfo, PanelSnapshot, ScreenReport, UiEvent};
use serde_json::{json, Value};

use crate::window::{ReportedScreen, ShellWindow};

const MAX_SUGGESTION_LIMIT: usize = 20;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Panel {
    dock: DockController,
    window: ShellWindow,
    screen: ReportedScreen,
    attached: bool,
}

pub struct Host {
    config: RuntimeConfig,
    store: Mutex<StateStore<JsonFileStore>>,
    panel: Mutex<Panel>,
    events: Mutex<Vec<UiEvent>>,
    model: Box<dyn SuggestionModel + Send + Sync>,
    shutting_down: AtomicBool,
}

impl Host {
    pub fn new(
        config: RuntimeConfig,
        store: StateStore<JsonFileStore>,
        model: Box<dyn SuggestionModel + Send + Sync>,
    ) -> Self {
        let dock = DockController::new(config.panel.clone(), &store.state().preferences);
        Self {
            config,
            store: Mutex::new(store),
            panel: Mutex::new(Panel {
                dock,
                window: ShellWindow::default(),
                screen: ReportedScreen::default(),
                attached: false,
            }),
            events: Mutex::new(Vec::new()),
            model,
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Runs `f` against the panel and forwards expansion changes to the UI queue.
    fn with_panel<R>(
        &self,
        f: impl FnOnce(&mut DockController, &mut ShellWindow, &ReportedScreen) -> R,
    ) -> R {
        let (result, changes) = {
            let mut guard = lock(&self.panel);
            let Panel {
                dock,
                window,
                screen,
                ..
            } = &mut *guard;
            let result = f(&mut *dock, &mut *window, &*screen);
            (result, window.take_expanded_changes())
        };
        if !changes.is_empty() {
            let mut events = lock(&self.events);
            events.extend(
                changes
                    .into_iter()
                    .map(|expanded| UiEvent::PanelExpanded { expanded }),
            );
        }
        result
    }

    /// Persists `partial` and applies the result to the panel under one
    /// store lock, so the panel always matches the last persisted preferences.
    fn persist_then_apply(
        &self,
        partial: &Value,
        apply: impl FnOnce(&CanonicalState, &mut DockController, &mut ShellWindow, &ReportedScreen),
    ) -> Result<CanonicalState, ErrorInfo> {
        let mut store = lock(&self.store);
        let updated = store.update(partial, Utc::now()).map_err(|err| {
            tracing::error!(error = %err, "Failed to persist state update");
            ErrorInfo::new("persist_failed", err.to_string())
        })?;
        self.with_panel(|dock, window, screen| apply(&updated, dock, window, screen));
        drop(store);
        Ok(updated)
    }

    // ─────────────────────────────────────────────────────────────────────
    // State
    // ─────────────────────────────────────────────────────────────────────

    pub fn state(&self) -> CanonicalState {
        lock(&self.store).state().clone()
    }

    pub fn state_path(&self) -> String {
        lock(&self.store).persistence().path().display().to_string()
    }

    /// Merges a partial update. Pin and dock changes are applied to the panel.
    pub fn update_state(&self, partial: &Value) -> Result<CanonicalState, ErrorInfo> {
        let now = Instant::now();
        self.persist_then_apply(partial, |updated, dock, window, screen| {
            let preferences = updated.preferences;
            let visibility = dock.visibility();
            if visibility.dock != preferences.dock {
                dock.set_dock(preferences.dock, window, screen, now);
            }
            if visibility.pinned != preferences.pinned {
                dock.set_pinned(preferences.pinned, window, screen, now);
            }
        })
    }

    pub fn evolve_prompts(&self, state: Option<&Value>, limit: Option<usize>) -> SuggestionOutcome {
        let snapshot = match state {
            Some(raw) => reconcile(raw, Utc::now()),
            None => self.state(),
        };
        let limit = limit
            .unwrap_or(self.config.suggestions.limit)
            .clamp(1, MAX_SUGGESTION_LIMIT);
        let outcome = evolve_prompts(&snapshot, self.model.as_ref(), limit);
        tracing::info!(
            source = ?outcome.source,
            items = outcome.items.len(),
            "Prompt evolution finished"
        );
        outcome
    }

    // ─────────────────────────────────────────────────────────────────────
    // Panel
    // ─────────────────────────────────────────────────────────────────────

    pub fn panel_hover(&self, hovering: bool) {
        let now = Instant::now();
        self.with_panel(|dock, window, screen| {
            dock.set_renderer_hover(hovering, window, screen, now)
        });
    }

    pub fn set_pinned(&self, pinned: bool) -> Result<CanonicalState, ErrorInfo> {
        let now = Instant::now();
        self.persist_then_apply(
            &json!({ "preferences": { "pinned": pinned } }),
            |_, dock, window, screen| dock.set_pinned(pinned, window, screen, now),
        )
    }

    pub fn set_dock(&self, side: DockSide) -> Result<CanonicalState, ErrorInfo> {
        let now = Instant::now();
        self.persist_then_apply(
            &json!({ "preferences": { "dock": side.as_str() } }),
            |_, dock, window, screen| dock.set_dock(side, window, screen, now),
        )
    }

    /// Global hotkey: pins (persisted) and expands with focus.
    pub fn hotkey(&self) -> Result<CanonicalState, ErrorInfo> {
        self.persist_then_apply(
            &json!({ "preferences": { "pinned": true } }),
            |_, dock, window, screen| dock.invoke_hotkey(window, screen),
        )
    }

    /// Applies a display/pointer report. The first report with displays
    /// attaches the panel; later display changes force a re-placement.
    pub fn report_screen(&self, report: ScreenReport) {
        let mut guard = lock(&self.panel);
        let panel = &mut *guard;
        panel.screen.set_cursor(report.cursor);
        if report.full_screen_refused {
            panel.window.refuse_full_screen();
        }
        let displays_changed = panel.screen.set_displays(report.displays);
        let ready = panel.screen.has_displays();
        let first_attach = ready && !panel.attached;
        if first_attach {
            panel.attached = true;
        }
        drop(guard);

        self.with_panel(|dock, window, screen| {
            if first_attach {
                tracing::info!("Panel attached to display layout");
                dock.attach(window, screen);
            } else if displays_changed && ready {
                tracing::debug!("Display metrics changed");
                dock.display_metrics_changed(window, screen);
            }
        });
    }

    pub fn panel_snapshot(&self) -> PanelSnapshot {
        let guard = lock(&self.panel);
        let visibility = guard.dock.visibility();
        PanelSnapshot {
            bounds: guard.window.bounds(),
            expanded: visibility.expanded,
            pinned: visibility.pinned,
            dock: visibility.dock,
            destroyed: guard.window.is_destroyed(),
            focused: guard.window.is_focused(),
            level: guard.window.level(),
            workspace: guard.window.workspace(),
        }
    }

    pub fn window_closed(&self) {
        let mut guard = lock(&self.panel);
        guard.window.mark_destroyed();
        guard.dock.shutdown();
        tracing::info!("Panel window closed");
    }

    pub fn window_blurred(&self) {
        let now = Instant::now();
        self.with_panel(|dock, window, _screen| {
            window.mark_blurred();
            dock.window_blurred(now);
        });
    }

    pub fn take_events(&self) -> Vec<UiEvent> {
        std::mem::take(&mut *lock(&self.events))
    }

    pub fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        lock(&self.panel).dock.shutdown();
        tracing::info!("Shutdown requested");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Scheduler ticks
    // ─────────────────────────────────────────────────────────────────────

    pub fn hover_tick(&self, now: Instant) {
        self.with_panel(|dock, window, screen| {
            dock.sync_from_pointer(window, screen, now);
            dock.fire_due_collapse(window, screen, now);
        });
    }

    pub fn collapse_tick(&self, now: Instant) {
        self.with_panel(|dock, window, screen| {
            dock.fire_due_collapse(window, screen, now);
        });
    }

    pub fn heartbeat_tick(&self) {
        self.with_panel(|dock, window, _screen| {
            dock.enforce_top_most(window);
        });
    }

    pub fn collapse_deadline(&self) -> Option<Instant> {
        lock(&self.panel).dock.collapse_deadline()
    }

    pub fn capture_tick(&self, pipeline: &mut CapturePipeline, clipboard: &mut dyn ClipboardSource) {
        let outcome = {
            let mut store = lock(&self.store);
            pipeline.poll(clipboard, &mut *store, Utc::now())
        };
        if let PollOutcome::Captured(entry) = outcome {
            lock(&self.events).push(UiEvent::AutoPromptCaptured { entry });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partner_core::{
        CaptureConfig, ClipboardError, ModelError, ModelRequest, Point, Provenance, Rect,
    };

    struct OfflineModel;

    impl SuggestionModel for OfflineModel {
        fn complete(&self, _request: &ModelRequest) -> Result<String, ModelError> {
            Err(ModelError::NotConfigured)
        }
    }

    struct FixedClipboard(String);

    impl ClipboardSource for FixedClipboard {
        fn read_text(&mut self) -> Result<String, ClipboardError> {
            Ok(self.0.clone())
        }
    }

    fn host(dir: &tempfile::TempDir) -> Host {
        let store = StateStore::open(
            JsonFileStore::new(dir.path().join("state.json")),
            Utc::now(),
        );
        Host::new(RuntimeConfig::default(), store, Box::new(OfflineModel))
    }

    fn layout() -> ScreenReport {
        ScreenReport {
            cursor: Some(Point::new(400, 400)),
            displays: vec![Rect::new(0, 0, 1440, 900)],
            full_screen_refused: false,
        }
    }

    #[test]
    fn first_screen_report_attaches_collapsed_panel() {
        let dir = tempfile::tempdir().expect("temp dir");
        let host = host(&dir);
        host.report_screen(layout());

        let panel = host.panel_snapshot();
        assert!(!panel.expanded);
        assert_eq!(panel.bounds, Rect::new(1420, 400, 20, 100));
        assert!(panel.level.is_some());
        assert_eq!(
            host.take_events(),
            vec![UiEvent::PanelExpanded { expanded: false }]
        );
        assert!(host.take_events().is_empty());
    }

    #[test]
    fn set_dock_persists_and_moves_panel() {
        let dir = tempfile::tempdir().expect("temp dir");
        let host = host(&dir);
        host.report_screen(layout());

        let state = host.set_dock(DockSide::Left).expect("set dock");
        assert_eq!(state.preferences.dock, DockSide::Left);
        assert_eq!(host.panel_snapshot().bounds.x, 0);
    }

    #[test]
    fn hotkey_pins_and_focuses() {
        let dir = tempfile::tempdir().expect("temp dir");
        let host = host(&dir);
        host.report_screen(layout());

        let state = host.hotkey().expect("hotkey");
        assert!(state.preferences.pinned);
        let panel = host.panel_snapshot();
        assert!(panel.expanded);
        assert!(panel.focused);
    }

    #[test]
    fn update_state_applies_pin_preference() {
        let dir = tempfile::tempdir().expect("temp dir");
        let host = host(&dir);
        host.report_screen(layout());

        host.update_state(&json!({ "preferences": { "pinned": true } }))
            .expect("update");
        assert!(host.panel_snapshot().expanded);
    }

    #[test]
    fn concurrent_pin_toggles_leave_panel_matching_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let host = std::sync::Arc::new(host(&dir));
        host.report_screen(layout());

        let workers: Vec<_> = [true, false]
            .into_iter()
            .map(|pinned| {
                let host = std::sync::Arc::clone(&host);
                std::thread::spawn(move || {
                    for _ in 0..40 {
                        host.set_pinned(pinned).expect("set pinned");
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker");
        }

        assert_eq!(
            host.panel_snapshot().pinned,
            host.state().preferences.pinned
        );
    }

    #[test]
    fn closed_window_ignores_later_operations() {
        let dir = tempfile::tempdir().expect("temp dir");
        let host = host(&dir);
        host.report_screen(layout());
        let before = host.panel_snapshot().bounds;

        host.window_closed();
        host.set_dock(DockSide::Left).expect("set dock");
        host.hover_tick(Instant::now());

        let panel = host.panel_snapshot();
        assert!(panel.destroyed);
        assert_eq!(panel.bounds, before);
    }

    #[test]
    fn capture_tick_queues_ui_event() {
        let dir = tempfile::tempdir().expect("temp dir");
        let host = host(&dir);
        let mut pipeline = CapturePipeline::new(CaptureConfig::default());
        let mut clipboard =
            FixedClipboard("Refactor the clipboard watcher so it stops leaking handles".to_string());

        host.capture_tick(&mut pipeline, &mut clipboard);
        let events = host.take_events();
        assert!(matches!(
            events.as_slice(),
            [UiEvent::AutoPromptCaptured { .. }]
        ));
        assert_eq!(host.state().timeline.len(), 1);
    }

    #[test]
    fn evolve_without_model_uses_heuristic() {
        let dir = tempfile::tempdir().expect("temp dir");
        let host = host(&dir);
        let outcome = host.evolve_prompts(None, Some(3));
        assert_eq!(outcome.source, Provenance::Heuristic);
        assert_eq!(outcome.items.len(), 3);
    }
}
