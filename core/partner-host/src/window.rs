//! Host-side mirrors of the panel window and the display layout.
//!
//! The rendering shell owns the real window. It reports displays and the
//! pointer through `report_screen`, reads the geometry back through
//! `get_panel`, and applies it. These mirrors are what the dock controller
//! drives.

use partner_core::{
    nearest_display, Point, Rect, ScreenProvider, TopMostLevel, WindowControl, WindowRefused,
    WorkspaceVisibility,
};

#[derive(Debug, Default)]
pub struct ShellWindow {
    bounds: Rect,
    destroyed: bool,
    focused: bool,
    level: Option<TopMostLevel>,
    workspace: Option<WorkspaceVisibility>,
    full_screen_refused: bool,
    expanded_changes: Vec<bool>,
}

impl ShellWindow {
    pub fn mark_destroyed(&mut self) {
        self.destroyed = true;
    }

    pub fn mark_blurred(&mut self) {
        self.focused = false;
    }

    /// The shell reports that the platform refused the fullscreen overlay.
    pub fn refuse_full_screen(&mut self) {
        self.full_screen_refused = true;
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn level(&self) -> Option<TopMostLevel> {
        self.level
    }

    pub fn workspace(&self) -> Option<WorkspaceVisibility> {
        self.workspace
    }

    /// Expansion changes since the last call, oldest first.
    pub fn take_expanded_changes(&mut self) -> Vec<bool> {
        std::mem::take(&mut self.expanded_changes)
    }
}

impl WindowControl for ShellWindow {
    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
    }

    fn set_always_on_top(&mut self, level: TopMostLevel) -> Result<(), WindowRefused> {
        self.level = Some(level);
        Ok(())
    }

    fn set_visible_on_all_workspaces(
        &mut self,
        visibility: WorkspaceVisibility,
    ) -> Result<(), WindowRefused> {
        if visibility.visible_on_full_screen && self.full_screen_refused {
            return Err(WindowRefused {
                operation: "set_visible_on_all_workspaces",
                reason: "fullscreen overlay not supported".to_string(),
            });
        }
        self.workspace = Some(visibility);
        Ok(())
    }

    fn move_top(&mut self) {}

    fn show_inactive(&mut self) {}

    fn focus(&mut self) {
        self.focused = true;
    }

    fn notify_expanded(&mut self, expanded: bool) {
        self.expanded_changes.push(expanded);
    }
}

/// Last display layout and pointer position reported by the shell.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReportedScreen {
    cursor: Option<Point>,
    displays: Vec<Rect>,
}

impl ReportedScreen {
    pub fn set_cursor(&mut self, cursor: Option<Point>) {
        self.cursor = cursor;
    }

    /// Replaces the display layout. Returns true when it changed.
    pub fn set_displays(&mut self, displays: Vec<Rect>) -> bool {
        if self.displays == displays {
            return false;
        }
        self.displays = displays;
        true
    }

    pub fn has_displays(&self) -> bool {
        !self.displays.is_empty()
    }
}

impl ScreenProvider for ReportedScreen {
    fn cursor_position(&self) -> Option<Point> {
        self.cursor
    }

    fn nearest_work_area(&self, point: Point) -> Option<Rect> {
        nearest_display(&self.displays, point)
    }
}
