//! Docking / visibility state machine for the edge-docked panel.
//!
//! # States
//!
//! ```text
//!              pinned | pointer in panel | pointer in edge band | renderer hover | hotkey
//!   Collapsed ───────────────────────────────────────────────────────────────────────▶ Expanded
//!             ◀─────────────────────────────────────────────────────────────────────
//!              no expand condition, then collapse delay elapses without one recurring
//! ```
//!
//! Both states self-loop on the placement sync (geometry follows display
//! changes) and on the always-on-top heartbeat.
//!
//! # Geometry
//!
//! - Collapsed: a thin strip, vertically centred in the work area of the
//!   display nearest the reference point (cursor, else window centre).
//! - Expanded: full work-area height minus padding, fixed width.
//! - Either way flush to the docked edge and clamped inside the work area.
//!
//! Bounds are only pushed to the window when they differ from the current
//! bounds, the expanded flag changes, or the caller forces it.
//!
//! # Liveness
//!
//! Once the window is destroyed (or the controller shut down) every operation
//! is a no-op. Nothing here returns an error.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::PanelConfig;
use crate::screen::{Point, Rect, ScreenProvider};
use crate::types::{DockSide, Preferences};

// ═══════════════════════════════════════════════════════════════════════════════
// Window Collaborator
// ═══════════════════════════════════════════════════════════════════════════════

/// Window level used for always-on-top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopMostLevel {
    Floating,
    ScreenSaver,
}

impl TopMostLevel {
    pub fn for_platform() -> Self {
        if cfg!(target_os = "macos") {
            TopMostLevel::ScreenSaver
        } else {
            TopMostLevel::Floating
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceVisibility {
    pub visible_on_full_screen: bool,
}

impl WorkspaceVisibility {
    pub const FULL: Self = Self {
        visible_on_full_screen: true,
    };
    /// Skips the fullscreen-overlay flag; used when the platform refuses it.
    pub const DEGRADED: Self = Self {
        visible_on_full_screen: false,
    };
}

#[derive(Debug, thiserror::Error)]
#[error("window refused {operation}: {reason}")]
pub struct WindowRefused {
    pub operation: &'static str,
    pub reason: String,
}

/// Move/resize/focus primitives of the borderless panel window.
pub trait WindowControl {
    fn is_destroyed(&self) -> bool;
    fn bounds(&self) -> Rect;
    fn set_bounds(&mut self, bounds: Rect);
    fn set_always_on_top(&mut self, level: TopMostLevel) -> Result<(), WindowRefused>;
    fn set_visible_on_all_workspaces(
        &mut self,
        visibility: WorkspaceVisibility,
    ) -> Result<(), WindowRefused>;
    fn move_top(&mut self);
    fn show_inactive(&mut self);
    fn focus(&mut self);
    /// Tells the renderer the panel changed expansion.
    fn notify_expanded(&mut self, expanded: bool);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Collapse Debounce
// ═══════════════════════════════════════════════════════════════════════════════

/// Cancellable one-shot deadline for the collapse debounce.
#[derive(Debug, Default, Clone)]
pub struct CollapseTimer {
    deadline: Option<Instant>,
}

impl CollapseTimer {
    /// Arms the timer unless it is already pending. A pending timer is never
    /// pushed back.
    pub fn schedule(&mut self, now: Instant, delay: Duration) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(now + delay);
        true
    }

    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Controller
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PanelVisibility {
    pub expanded: bool,
    pub pinned: bool,
    pub dock: DockSide,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExpandOptions {
    pub force: bool,
    pub focus: bool,
}

impl ExpandOptions {
    pub const FORCED: Self = Self {
        force: true,
        focus: false,
    };
    pub const FORCED_WITH_FOCUS: Self = Self {
        force: true,
        focus: true,
    };
}

/// Owns the expansion flag, the collapse debounce and the renderer-hover flag.
///
/// Only transition-triggering operations are exposed; there is no setter for
/// `expanded`.
#[derive(Debug)]
pub struct DockController {
    config: PanelConfig,
    visibility: PanelVisibility,
    renderer_hovering: bool,
    collapse: CollapseTimer,
    shut_down: bool,
}

impl DockController {
    pub fn new(config: PanelConfig, preferences: &Preferences) -> Self {
        Self {
            config,
            visibility: PanelVisibility {
                expanded: false,
                pinned: preferences.pinned,
                dock: preferences.dock,
            },
            renderer_hovering: false,
            collapse: CollapseTimer::default(),
            shut_down: false,
        }
    }

    pub fn visibility(&self) -> PanelVisibility {
        self.visibility
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    pub fn collapse_deadline(&self) -> Option<Instant> {
        self.collapse.deadline()
    }

    fn is_live(&self, window: &dyn WindowControl) -> bool {
        !self.shut_down && !window.is_destroyed()
    }

    /// Initial placement once the window is ready to show.
    pub fn attach(&mut self, window: &mut dyn WindowControl, screen: &dyn ScreenProvider) {
        if !self.is_live(window) {
            return;
        }
        self.enforce_top_most(window);
        window.show_inactive();
        let pinned = self.visibility.pinned;
        self.set_expanded(
            window,
            screen,
            pinned,
            ExpandOptions {
                force: true,
                focus: pinned,
            },
        );
    }

    // ─────────────────────────────────────────────────────────────────────
    // Geometry
    // ─────────────────────────────────────────────────────────────────────

    /// Panel bounds for the given expansion, or `None` when display metrics
    /// are unavailable.
    pub fn dock_bounds(
        &self,
        expanded: bool,
        anchor: Point,
        screen: &dyn ScreenProvider,
    ) -> Option<Rect> {
        let area = screen.nearest_work_area(anchor)?;
        Some(compute_dock_bounds(
            &self.config,
            self.visibility.dock,
            expanded,
            area,
        ))
    }

    fn reference_point(&self, window: &dyn WindowControl, screen: &dyn ScreenProvider) -> Point {
        screen
            .cursor_position()
            .unwrap_or_else(|| window.bounds().center())
    }

    /// `None` when the pointer or display can't be read this tick.
    fn should_expand(
        &self,
        window: &dyn WindowControl,
        screen: &dyn ScreenProvider,
    ) -> Option<bool> {
        if self.visibility.pinned || self.renderer_hovering {
            return Some(true);
        }

        let point = screen.cursor_position()?;
        let area = screen.nearest_work_area(point)?;

        let within_vertical_track = point.y >= area.y.saturating_add(self.config.top_padding)
            && point.y <= area.bottom().saturating_sub(self.config.bottom_padding);
        if within_vertical_track && self.near_dock_edge(point, area) {
            return Some(true);
        }

        if window.is_destroyed() {
            return Some(false);
        }
        Some(window.bounds().contains(point))
    }

    fn near_dock_edge(&self, point: Point, area: Rect) -> bool {
        match self.visibility.dock {
            DockSide::Left => point.x <= area.x.saturating_add(self.config.edge_threshold_px),
            DockSide::Right => {
                point.x >= area.right().saturating_sub(self.config.edge_threshold_px)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────

    /// Moves the panel into the requested expansion. Returns true when the
    /// window was updated.
    pub fn set_expanded(
        &mut self,
        window: &mut dyn WindowControl,
        screen: &dyn ScreenProvider,
        expanded: bool,
        options: ExpandOptions,
    ) -> bool {
        if !self.is_live(window) {
            return false;
        }

        let anchor = self.reference_point(window, screen);
        let Some(bounds) = self.dock_bounds(expanded, anchor, screen) else {
            tracing::debug!("Display metrics unavailable; skipping panel update");
            return false;
        };

        let should_update =
            options.force || self.visibility.expanded != expanded || bounds != window.bounds();
        if !should_update {
            return false;
        }

        self.visibility.expanded = expanded;
        window.set_bounds(bounds);
        self.enforce_top_most(window);
        window.show_inactive();
        if options.focus {
            window.focus();
        }
        window.notify_expanded(expanded);
        tracing::debug!(expanded, ?bounds, "Panel geometry applied");
        true
    }

    /// Re-applies geometry for the current expansion without transitioning.
    pub fn sync_placement(
        &mut self,
        window: &mut dyn WindowControl,
        screen: &dyn ScreenProvider,
        force: bool,
    ) {
        if !self.is_live(window) {
            return;
        }
        let anchor = self.reference_point(window, screen);
        let Some(target) = self.dock_bounds(self.visibility.expanded, anchor, screen) else {
            return;
        };
        if force || target != window.bounds() {
            window.set_bounds(target);
        }
    }

    /// Hover/placement tick: expands on any expand condition, otherwise arms
    /// the collapse debounce.
    pub fn sync_from_pointer(
        &mut self,
        window: &mut dyn WindowControl,
        screen: &dyn ScreenProvider,
        now: Instant,
    ) {
        if !self.is_live(window) {
            return;
        }

        self.sync_placement(window, screen, false);
        self.enforce_top_most(window);

        match self.should_expand(window, screen) {
            Some(true) => {
                self.collapse.cancel();
                self.set_expanded(window, screen, true, ExpandOptions::default());
            }
            Some(false) => {
                if self.visibility.expanded {
                    self.collapse.schedule(now, self.config.collapse_delay());
                }
            }
            None => {
                tracing::debug!("Pointer position unavailable; skipping hover tick");
            }
        }
    }

    /// Fires the collapse debounce if it is due. Returns true on collapse.
    pub fn fire_due_collapse(
        &mut self,
        window: &mut dyn WindowControl,
        screen: &dyn ScreenProvider,
        now: Instant,
    ) -> bool {
        if !self.collapse.take_due(now) {
            return false;
        }
        if self.visibility.pinned || !self.is_live(window) {
            return false;
        }
        self.set_expanded(window, screen, false, ExpandOptions::default())
    }

    pub fn set_renderer_hover(
        &mut self,
        hovering: bool,
        window: &mut dyn WindowControl,
        screen: &dyn ScreenProvider,
        now: Instant,
    ) {
        self.renderer_hovering = hovering;
        self.sync_from_pointer(window, screen, now);
    }

    /// Pinning forces the expanded state with focus; unpinning re-evaluates
    /// the expand conditions.
    pub fn set_pinned(
        &mut self,
        pinned: bool,
        window: &mut dyn WindowControl,
        screen: &dyn ScreenProvider,
        now: Instant,
    ) {
        self.visibility.pinned = pinned;
        if !self.is_live(window) {
            return;
        }
        if pinned {
            self.collapse.cancel();
            self.set_expanded(window, screen, true, ExpandOptions::FORCED_WITH_FOCUS);
        } else {
            self.sync_from_pointer(window, screen, now);
        }
    }

    /// Switching sides recomputes geometry for the current expansion at once.
    pub fn set_dock(
        &mut self,
        dock: DockSide,
        window: &mut dyn WindowControl,
        screen: &dyn ScreenProvider,
        now: Instant,
    ) {
        self.visibility.dock = dock;
        if !self.is_live(window) {
            return;
        }
        let expanded = self.visibility.expanded || self.visibility.pinned;
        self.set_expanded(window, screen, expanded, ExpandOptions::FORCED);
        self.sync_from_pointer(window, screen, now);
    }

    /// Global hotkey: pin and expand with focus.
    pub fn invoke_hotkey(&mut self, window: &mut dyn WindowControl, screen: &dyn ScreenProvider) {
        self.visibility.pinned = true;
        self.collapse.cancel();
        self.set_expanded(window, screen, true, ExpandOptions::FORCED_WITH_FOCUS);
    }

    pub fn display_metrics_changed(
        &mut self,
        window: &mut dyn WindowControl,
        screen: &dyn ScreenProvider,
    ) {
        let expanded = self.visibility.expanded;
        self.set_expanded(window, screen, expanded, ExpandOptions::FORCED);
    }

    pub fn window_blurred(&mut self, now: Instant) {
        if !self.visibility.pinned && self.visibility.expanded && !self.shut_down {
            self.collapse.schedule(now, self.config.collapse_delay());
        }
    }

    /// Always-on-top heartbeat. Platform refusals degrade the workspace
    /// visibility instead of aborting the heartbeat.
    pub fn enforce_top_most(&self, window: &mut dyn WindowControl) -> Option<WorkspaceVisibility> {
        if !self.is_live(window) {
            return None;
        }

        let mut visibility = WorkspaceVisibility::FULL;
        if let Err(err) = window.set_always_on_top(TopMostLevel::for_platform()) {
            tracing::debug!(error = %err, "Always-on-top refused; degrading visibility");
            visibility = WorkspaceVisibility::DEGRADED;
        }
        window.move_top();

        match window.set_visible_on_all_workspaces(visibility) {
            Ok(()) => Some(visibility),
            Err(err) if visibility == WorkspaceVisibility::FULL => {
                tracing::debug!(error = %err, "Fullscreen overlay refused; retrying degraded");
                match window.set_visible_on_all_workspaces(WorkspaceVisibility::DEGRADED) {
                    Ok(()) => Some(WorkspaceVisibility::DEGRADED),
                    Err(err) => {
                        tracing::warn!(error = %err, "Workspace visibility refused");
                        None
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "Workspace visibility refused");
                None
            }
        }
    }

    /// Cancels the debounce; every later call becomes a no-op.
    pub fn shutdown(&mut self) {
        self.collapse.cancel();
        self.shut_down = true;
    }
}

/// Geometry rule shared by placement and transitions.
pub fn compute_dock_bounds(
    config: &PanelConfig,
    dock: DockSide,
    expanded: bool,
    area: Rect,
) -> Rect {
    let area_width = area.width.max(0);
    let area_height = area.height.max(0);

    let width = if expanded {
        config.expanded_width
    } else {
        config.collapsed_width
    }
    .clamp(0, area_width);

    let height = if expanded {
        area_height
            .saturating_sub(config.top_padding)
            .saturating_sub(config.bottom_padding)
    } else {
        config.collapsed_height
    }
    .clamp(0, area_height);

    let y = if expanded {
        area.y.saturating_add(config.top_padding)
    } else {
        area.y
            .saturating_add((f64::from(area_height - height) / 2.0).round() as i32)
    };
    let y = y.clamp(area.y, area.y.saturating_add(area_height - height));

    let x = match dock {
        DockSide::Left => area.x,
        DockSide::Right => area.x.saturating_add(area_width - width),
    };

    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    const AREA: Rect = Rect {
        x: 0,
        y: 25,
        width: 1920,
        height: 1055,
    };

    struct FakeScreen {
        cursor: Option<Point>,
        areas: Vec<Rect>,
    }

    impl ScreenProvider for FakeScreen {
        fn cursor_position(&self) -> Option<Point> {
            self.cursor
        }

        fn nearest_work_area(&self, point: Point) -> Option<Rect> {
            crate::screen::nearest_display(&self.areas, point)
        }
    }

    #[derive(Default)]
    struct FakeWindow {
        bounds: Rect,
        destroyed: bool,
        refuse_on_top: bool,
        refuse_full_screen: bool,
        set_bounds_calls: usize,
        expanded_events: Vec<bool>,
        focus_calls: usize,
        visibility_calls: Vec<WorkspaceVisibility>,
    }

    impl WindowControl for FakeWindow {
        fn is_destroyed(&self) -> bool {
            self.destroyed
        }
        fn bounds(&self) -> Rect {
            self.bounds
        }
        fn set_bounds(&mut self, bounds: Rect) {
            self.set_bounds_calls += 1;
            self.bounds = bounds;
        }
        fn set_always_on_top(&mut self, _level: TopMostLevel) -> Result<(), WindowRefused> {
            if self.refuse_on_top {
                return Err(WindowRefused {
                    operation: "always_on_top",
                    reason: "denied".to_string(),
                });
            }
            Ok(())
        }
        fn set_visible_on_all_workspaces(
            &mut self,
            visibility: WorkspaceVisibility,
        ) -> Result<(), WindowRefused> {
            self.visibility_calls.push(visibility);
            if self.refuse_full_screen && visibility.visible_on_full_screen {
                return Err(WindowRefused {
                    operation: "visible_on_all_workspaces",
                    reason: "denied".to_string(),
                });
            }
            Ok(())
        }
        fn move_top(&mut self) {}
        fn show_inactive(&mut self) {}
        fn focus(&mut self) {
            self.focus_calls += 1;
        }
        fn notify_expanded(&mut self, expanded: bool) {
            self.expanded_events.push(expanded);
        }
    }

    fn screen_with_cursor(cursor: Point) -> FakeScreen {
        FakeScreen {
            cursor: Some(cursor),
            areas: vec![AREA],
        }
    }

    fn controller(pinned: bool, dock: DockSide) -> DockController {
        DockController::new(
            PanelConfig::default(),
            &Preferences {
                pinned,
                dock,
                auto_capture_prompts: true,
            },
        )
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn collapsed_geometry_is_centered_strip_on_right_edge() {
        let bounds = compute_dock_bounds(&PanelConfig::default(), DockSide::Right, false, AREA);
        assert_eq!(bounds.width, 20);
        assert_eq!(bounds.height, 100);
        assert_eq!(bounds.x, 1900);
        assert_eq!(bounds.y, 25 + ((1055 - 100) as f64 / 2.0).round() as i32);
        assert!(AREA.contains_rect(&bounds));
    }

    #[test]
    fn expanded_geometry_spans_padded_height() {
        let bounds = compute_dock_bounds(&PanelConfig::default(), DockSide::Left, true, AREA);
        assert_eq!(bounds, Rect::new(0, 37, 360, 1055 - 24));
        assert!(AREA.contains_rect(&bounds));
    }

    #[test]
    fn geometry_is_clamped_to_tiny_work_area() {
        let tiny = Rect::new(100, 100, 200, 20);
        for expanded in [true, false] {
            for dock in [DockSide::Left, DockSide::Right] {
                let bounds = compute_dock_bounds(&PanelConfig::default(), dock, expanded, tiny);
                assert!(tiny.contains_rect(&bounds), "{bounds:?} escapes {tiny:?}");
            }
        }
    }

    #[test]
    fn extreme_work_area_does_not_overflow() {
        let far = Rect::new(i32::MAX - 50, i32::MAX - 50, i32::MAX, i32::MAX);
        for expanded in [true, false] {
            let bounds = compute_dock_bounds(&PanelConfig::default(), DockSide::Right, expanded, far);
            assert!(bounds.x >= far.x);
            assert!(bounds.y >= far.y);
        }

        let mut dock = controller(false, DockSide::Right);
        let mut window = FakeWindow::default();
        let screen = FakeScreen {
            cursor: Some(Point::new(i32::MAX, i32::MAX - 30)),
            areas: vec![far],
        };
        dock.attach(&mut window, &screen);
        dock.sync_from_pointer(&mut window, &screen, Instant::now());
        assert!(dock.visibility().expanded);
    }

    #[test]
    fn pointer_in_edge_band_expands() {
        let mut dock = controller(false, DockSide::Right);
        let mut window = FakeWindow::default();
        let screen = screen_with_cursor(Point::new(1915, 500));
        let now = Instant::now();

        dock.attach(&mut window, &screen);
        assert!(!dock.visibility().expanded);

        dock.sync_from_pointer(&mut window, &screen, now);
        assert!(dock.visibility().expanded);
        assert_eq!(window.bounds.width, 360);
        assert_eq!(window.bounds.x, 1920 - 360);
    }

    #[test]
    fn edge_band_outside_vertical_track_does_not_expand() {
        let mut dock = controller(false, DockSide::Right);
        let mut window = FakeWindow::default();
        let screen = screen_with_cursor(Point::new(1915, 30));

        dock.attach(&mut window, &screen);
        dock.sync_from_pointer(&mut window, &screen, Instant::now());
        assert!(!dock.visibility().expanded);
    }

    #[test]
    fn collapses_exactly_once_after_debounce() {
        let mut dock = controller(false, DockSide::Right);
        let mut window = FakeWindow::default();
        let mut screen = screen_with_cursor(Point::new(1915, 500));
        let start = Instant::now();

        dock.attach(&mut window, &screen);
        dock.sync_from_pointer(&mut window, &screen, start);
        assert!(dock.visibility().expanded);

        screen.cursor = Some(Point::new(600, 500));
        let mut collapses = 0;
        for tick in 1..=10u64 {
            let now = start + ms(tick * 120);
            dock.sync_from_pointer(&mut window, &screen, now);
            if dock.fire_due_collapse(&mut window, &screen, now) {
                collapses += 1;
            }
            if tick == 1 {
                assert!(dock.visibility().expanded, "must wait for the debounce");
            }
        }

        assert_eq!(collapses, 1);
        assert!(!dock.visibility().expanded);
        assert_eq!(window.expanded_events.iter().filter(|e| !**e).count(), 2);
        assert_eq!(
            window.bounds,
            compute_dock_bounds(&PanelConfig::default(), DockSide::Right, false, AREA)
        );
    }

    #[test]
    fn returning_pointer_cancels_pending_collapse() {
        let mut dock = controller(false, DockSide::Right);
        let mut window = FakeWindow::default();
        let mut screen = screen_with_cursor(Point::new(1915, 500));
        let start = Instant::now();

        dock.attach(&mut window, &screen);
        dock.sync_from_pointer(&mut window, &screen, start);

        screen.cursor = Some(Point::new(600, 500));
        dock.sync_from_pointer(&mut window, &screen, start + ms(50));
        assert!(dock.collapse_deadline().is_some());

        screen.cursor = Some(Point::new(1700, 500));
        dock.sync_from_pointer(&mut window, &screen, start + ms(100));
        assert!(dock.collapse_deadline().is_none());

        assert!(!dock.fire_due_collapse(&mut window, &screen, start + ms(400)));
        assert!(dock.visibility().expanded);
    }

    #[test]
    fn pending_collapse_is_not_restarted() {
        let mut timer = CollapseTimer::default();
        let start = Instant::now();
        assert!(timer.schedule(start, ms(180)));
        assert!(!timer.schedule(start + ms(100), ms(180)));
        assert_eq!(timer.deadline(), Some(start + ms(180)));
        assert!(timer.cancel());
        assert!(!timer.is_pending());
    }

    #[test]
    fn pinned_forces_expansion_with_focus() {
        let mut dock = controller(false, DockSide::Right);
        let mut window = FakeWindow::default();
        let screen = screen_with_cursor(Point::new(600, 500));
        let now = Instant::now();

        dock.attach(&mut window, &screen);
        dock.set_pinned(true, &mut window, &screen, now);
        assert!(dock.visibility().expanded);
        assert_eq!(window.focus_calls, 1);

        dock.sync_from_pointer(&mut window, &screen, now + ms(500));
        assert!(!dock.fire_due_collapse(&mut window, &screen, now + ms(1000)));
        assert!(dock.visibility().expanded);
    }

    #[test]
    fn unpinning_reevaluates_through_debounce() {
        let mut dock = controller(true, DockSide::Right);
        let mut window = FakeWindow::default();
        let screen = screen_with_cursor(Point::new(600, 500));
        let now = Instant::now();

        dock.attach(&mut window, &screen);
        assert!(dock.visibility().expanded);

        dock.set_pinned(false, &mut window, &screen, now);
        assert!(dock.visibility().expanded);
        assert!(dock.fire_due_collapse(&mut window, &screen, now + ms(180)));
        assert!(!dock.visibility().expanded);
    }

    #[test]
    fn dock_switch_while_expanded_moves_flush_left() {
        let mut dock = controller(false, DockSide::Right);
        let mut window = FakeWindow::default();
        let screen = screen_with_cursor(Point::new(1915, 500));
        let now = Instant::now();

        dock.attach(&mut window, &screen);
        dock.sync_from_pointer(&mut window, &screen, now);
        let width_before = window.bounds.width;

        dock.set_dock(DockSide::Left, &mut window, &screen, now);
        assert_eq!(window.bounds.x, AREA.x);
        assert_eq!(window.bounds.width, width_before);
        assert!(dock.visibility().expanded);
    }

    #[test]
    fn renderer_hover_expands() {
        let mut dock = controller(false, DockSide::Left);
        let mut window = FakeWindow::default();
        let screen = screen_with_cursor(Point::new(900, 500));

        dock.attach(&mut window, &screen);
        dock.set_renderer_hover(true, &mut window, &screen, Instant::now());
        assert!(dock.visibility().expanded);
    }

    #[test]
    fn hotkey_pins_and_focuses() {
        let mut dock = controller(false, DockSide::Right);
        let mut window = FakeWindow::default();
        let screen = screen_with_cursor(Point::new(900, 500));

        dock.attach(&mut window, &screen);
        dock.invoke_hotkey(&mut window, &screen);
        assert!(dock.visibility().pinned);
        assert!(dock.visibility().expanded);
        assert_eq!(window.focus_calls, 1);
    }

    #[test]
    fn display_change_reflows_to_new_work_area() {
        let mut dock = controller(true, DockSide::Right);
        let mut window = FakeWindow::default();
        let mut screen = screen_with_cursor(Point::new(900, 500));

        dock.attach(&mut window, &screen);
        screen.areas = vec![Rect::new(0, 0, 1280, 800)];
        dock.display_metrics_changed(&mut window, &screen);
        assert_eq!(window.bounds, Rect::new(1280 - 360, 12, 360, 800 - 24));
    }

    #[test]
    fn unchanged_geometry_is_not_reapplied() {
        let mut dock = controller(false, DockSide::Right);
        let mut window = FakeWindow::default();
        let screen = screen_with_cursor(Point::new(900, 500));
        let now = Instant::now();

        dock.attach(&mut window, &screen);
        let calls = window.set_bounds_calls;
        dock.sync_from_pointer(&mut window, &screen, now);
        dock.sync_from_pointer(&mut window, &screen, now + ms(120));
        assert_eq!(window.set_bounds_calls, calls);
    }

    #[test]
    fn missing_cursor_skips_tick_without_collapsing() {
        let mut dock = controller(false, DockSide::Right);
        let mut window = FakeWindow::default();
        let mut screen = screen_with_cursor(Point::new(1915, 500));
        let now = Instant::now();

        dock.attach(&mut window, &screen);
        dock.sync_from_pointer(&mut window, &screen, now);
        screen.cursor = None;
        dock.sync_from_pointer(&mut window, &screen, now + ms(120));
        assert!(dock.collapse_deadline().is_none());
        assert!(dock.visibility().expanded);
    }

    #[test]
    fn destroyed_window_makes_everything_a_noop() {
        let mut dock = controller(false, DockSide::Right);
        let mut window = FakeWindow {
            destroyed: true,
            ..FakeWindow::default()
        };
        let screen = screen_with_cursor(Point::new(1915, 500));
        let now = Instant::now();

        dock.attach(&mut window, &screen);
        dock.sync_from_pointer(&mut window, &screen, now);
        dock.set_pinned(true, &mut window, &screen, now);
        dock.set_dock(DockSide::Left, &mut window, &screen, now);
        dock.invoke_hotkey(&mut window, &screen);
        assert!(dock.enforce_top_most(&mut window).is_none());

        assert_eq!(window.set_bounds_calls, 0);
        assert!(window.expanded_events.is_empty());
        assert!(window.visibility_calls.is_empty());
    }

    #[test]
    fn shutdown_cancels_debounce_and_stops_operations() {
        let mut dock = controller(false, DockSide::Right);
        let mut window = FakeWindow::default();
        let mut screen = screen_with_cursor(Point::new(1915, 500));
        let now = Instant::now();

        dock.attach(&mut window, &screen);
        dock.sync_from_pointer(&mut window, &screen, now);
        screen.cursor = Some(Point::new(600, 500));
        dock.sync_from_pointer(&mut window, &screen, now + ms(10));
        assert!(dock.collapse_deadline().is_some());

        dock.shutdown();
        let calls = window.set_bounds_calls;
        assert!(dock.collapse_deadline().is_none());
        assert!(!dock.fire_due_collapse(&mut window, &screen, now + ms(1000)));
        dock.sync_from_pointer(&mut window, &screen, now + ms(1000));
        assert_eq!(window.set_bounds_calls, calls);
    }

    #[test]
    fn heartbeat_degrades_when_full_screen_refused() {
        let dock = controller(false, DockSide::Right);
        let mut window = FakeWindow {
            refuse_full_screen: true,
            ..FakeWindow::default()
        };

        assert_eq!(
            dock.enforce_top_most(&mut window),
            Some(WorkspaceVisibility::DEGRADED)
        );
        assert_eq!(
            window.visibility_calls,
            vec![WorkspaceVisibility::FULL, WorkspaceVisibility::DEGRADED]
        );
    }

    #[test]
    fn heartbeat_degrades_when_on_top_refused() {
        let dock = controller(false, DockSide::Right);
        let mut window = FakeWindow {
            refuse_on_top: true,
            ..FakeWindow::default()
        };

        assert_eq!(
            dock.enforce_top_most(&mut window),
            Some(WorkspaceVisibility::DEGRADED)
        );
        assert_eq!(window.visibility_calls, vec![WorkspaceVisibility::DEGRADED]);
    }
}
