//! Periodic work: hover sync, always-on-top heartbeat, clipboard poll and the
//! collapse debounce, all on one thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use partner_core::CapturePipeline;

use crate::clipboard::SystemClipboard;
use crate::host::Host;

const MAX_SLEEP: Duration = Duration::from_millis(250);

pub struct SchedulerOptions {
    pub capture_clipboard: bool,
}

pub fn spawn(host: Arc<Host>, options: SchedulerOptions) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("partner-scheduler".to_string())
        .spawn(move || run(&host, options))
}

fn run(host: &Host, options: SchedulerOptions) {
    let panel = host.config().panel.clone();
    let capture = host.config().capture.clone();

    // The platform clipboard handle is not shareable across threads, so it
    // lives here.
    let mut clipboard = options.capture_clipboard.then(SystemClipboard::new);
    let mut pipeline = CapturePipeline::new(capture.clone());
    if let Some(clipboard) = clipboard.as_mut() {
        pipeline.seed(clipboard);
    } else {
        tracing::info!("Clipboard capture disabled for this run");
    }

    let start = Instant::now();
    let mut next_hover = start;
    let mut next_heartbeat = start;
    let mut next_capture = start + capture.poll_interval();

    tracing::info!(
        hover_ms = panel.hover_poll_ms,
        heartbeat_ms = panel.heartbeat_ms,
        capture_ms = capture.poll_ms,
        "Scheduler started"
    );

    while !host.is_shutting_down() {
        let now = Instant::now();

        if now >= next_hover {
            host.hover_tick(now);
            next_hover = now + panel.hover_poll_interval();
        } else {
            host.collapse_tick(now);
        }

        if now >= next_heartbeat {
            host.heartbeat_tick();
            next_heartbeat = now + panel.heartbeat_interval();
        }

        if now >= next_capture {
            if let Some(clipboard) = clipboard.as_mut() {
                host.capture_tick(&mut pipeline, clipboard);
            }
            next_capture = now + capture.poll_interval();
        }

        let mut wake = next_hover.min(next_heartbeat).min(next_capture);
        if let Some(deadline) = host.collapse_deadline() {
            wake = wake.min(deadline);
        }
        let sleep_for = wake
            .saturating_duration_since(Instant::now())
            .min(MAX_SLEEP);
        if !sleep_for.is_zero() {
            thread::sleep(sleep_for);
        }
    }

    tracing::info!("Scheduler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use partner_core::{
        JsonFileStore, ModelError, ModelRequest, Point, Rect, RuntimeConfig, StateStore,
        SuggestionModel,
    };
    use partner_protocol::ScreenReport;

    struct OfflineModel;

    impl SuggestionModel for OfflineModel {
        fn complete(&self, _request: &ModelRequest) -> Result<String, ModelError> {
            Err(ModelError::NotConfigured)
        }
    }

    #[test]
    fn scheduler_collapses_panel_and_stops_on_shutdown() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = StateStore::open(JsonFileStore::new(dir.path().join("state.json")), Utc::now());
        let host = Arc::new(Host::new(
            RuntimeConfig::default(),
            store,
            Box::new(OfflineModel),
        ));

        host.report_screen(ScreenReport {
            cursor: Some(Point::new(795, 300)),
            displays: vec![Rect::new(0, 0, 800, 600)],
            full_screen_refused: false,
        });

        let handle = spawn(
            Arc::clone(&host),
            SchedulerOptions {
                capture_clipboard: false,
            },
        )
        .expect("spawn scheduler");

        let deadline = Instant::now() + Duration::from_secs(5);
        while !host.panel_snapshot().expanded && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(host.panel_snapshot().expanded, "edge hover should expand");

        host.report_screen(ScreenReport {
            cursor: Some(Point::new(100, 300)),
            displays: vec![Rect::new(0, 0, 800, 600)],
            full_screen_refused: false,
        });
        let deadline = Instant::now() + Duration::from_secs(5);
        while host.panel_snapshot().expanded && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(!host.panel_snapshot().expanded, "debounce should collapse");

        host.shutdown();
        handle.join().expect("scheduler thread");
    }
}
