//! Integer pixel geometry shared by the layout engine and the display adapter.

use serde::{Deserialize, Serialize};

use crate::layout_engine::Orientation;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Rect { x, y, width, height }
    }

    pub fn max_x(&self) -> i32 { self.x + self.width }

    /// Origin along the given axis.
    pub fn start(&self, axis: Orientation) -> i32 {
        match axis {
            Orientation::Horizontal => self.x,
            Orientation::Vertical => self.y,
        }
    }

    /// Size along the given axis.
    pub fn extent(&self, axis: Orientation) -> i32 {
        match axis {
            Orientation::Horizontal => self.width,
            Orientation::Vertical => self.height,
        }
    }

    pub fn end(&self, axis: Orientation) -> i32 { self.start(axis) + self.extent(axis) }

    /// Whether the projections of both rectangles onto `axis` share at least
    /// one pixel.
    pub fn overlaps_on(&self, other: &Rect, axis: Orientation) -> bool {
        self.start(axis) < other.end(axis) && other.start(axis) < self.end(axis)
    }

    /// Shrinks the size by `amount` on every side, keeping the origin.
    pub fn shrink_size(&self, amount: i32) -> Rect {
        Rect {
            x: self.x,
            y: self.y,
            width: (self.width - 2 * amount).max(0),
            height: (self.height - 2 * amount).max(0),
        }
    }
}
