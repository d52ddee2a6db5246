//! Screen geometry primitives and the screen-provider collaborator.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Edges are inclusive.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.x.saturating_add(self.width / 2),
            self.y.saturating_add(self.height / 2),
        )
    }

    fn distance_sq(&self, point: Point) -> i64 {
        let gap = |value: i32, low: i32, high: i32| -> i64 {
            if value < low {
                i64::from(low) - i64::from(value)
            } else if value > high {
                i64::from(value) - i64::from(high)
            } else {
                0
            }
        };
        let dx = gap(point.x, self.x, self.right());
        let dy = gap(point.y, self.y, self.bottom());
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }
}

/// Display bounds and pointer position, supplied by the platform.
pub trait ScreenProvider {
    /// `None` when the platform can't report the pointer right now.
    fn cursor_position(&self) -> Option<Point>;
    /// Usable work area of the display nearest to `point`; `None` when
    /// display metrics are momentarily unavailable.
    fn nearest_work_area(&self, point: Point) -> Option<Rect>;
}

/// Picks the work area containing `point`, else the closest one.
pub fn nearest_display(work_areas: &[Rect], point: Point) -> Option<Rect> {
    work_areas
        .iter()
        .find(|area| area.contains(point))
        .or_else(|| work_areas.iter().min_by_key(|area| area.distance_sq(point)))
        .copied()
}
