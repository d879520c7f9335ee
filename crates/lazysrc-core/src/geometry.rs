//! Rectangles and intersection math for the headless viewport observer.

use crate::config::{MarginValue, RootMargin};

/// Axis-aligned rectangle in CSS pixels, origin at the top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0.0
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Edge-inclusive intersection.
    ///
    /// Rectangles that only touch still produce a zero-area result, matching
    /// how the browser treats adjacent edges.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if left > right || top > bottom {
            return None;
        }
        Some(Rect::new(left, top, right - left, bottom - top))
    }

    /// Grows the rectangle by `margin`. Percentages resolve against this
    /// rectangle's own width (left/right) and height (top/bottom).
    pub fn inflate(&self, margin: &RootMargin) -> Self {
        let top = margin.top.resolve(self.height);
        let right = margin.right.resolve(self.width);
        let bottom = margin.bottom.resolve(self.height);
        let left = margin.left.resolve(self.width);
        Self {
            x: self.x - left,
            y: self.y - top,
            width: (self.width + left + right).max(0.0),
            height: (self.height + top + bottom).max(0.0),
        }
    }
}

impl MarginValue {
    fn resolve(self, basis: f32) -> f32 {
        match self {
            MarginValue::Px(px) => px,
            MarginValue::Percent(pct) => basis * pct / 100.0,
        }
    }
}

/// Result of testing a target against a root.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Visibility {
    pub is_intersecting: bool,
    /// Visible fraction of the target's area, in `[0, 1]`.
    pub ratio: f64,
}

impl Visibility {
    pub const HIDDEN: Visibility = Visibility {
        is_intersecting: false,
        ratio: 0.0,
    };
}

/// Computes visibility of `target` inside `root`.
///
/// A target with area needs a positive overlap. A zero-area target (an image
/// that has not loaded yet) counts as intersecting when it sits inside the
/// root, edges included, and reports a ratio of 1.
pub fn visibility(target: &Rect, root: &Rect) -> Visibility {
    let Some(overlap) = target.intersection(root) else {
        return Visibility::HIDDEN;
    };

    if target.is_empty() {
        return Visibility {
            is_intersecting: true,
            ratio: 1.0,
        };
    }

    let area = overlap.area();
    if area <= 0.0 {
        return Visibility::HIDDEN;
    }

    Visibility {
        is_intersecting: true,
        ratio: (f64::from(area) / f64::from(target.area())).clamp(0.0, 1.0),
    }
}
