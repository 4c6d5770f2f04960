//! Rectangles
//!
//! `Rect` is the integer rectangle used for every piece of cache
//! bookkeeping. `RectF` only appears at the visibility boundary and is
//! rounded outward before it touches the cache.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Up to four pieces left over after subtracting one rect from another
pub type RectPieces = SmallVec<[Rect; 4]>;

/// Axis-aligned integer rectangle (origin + size)
///
/// A rect with zero or negative width or height is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// The canonical empty rect
    pub const EMPTY: Rect = Rect { x: 0, y: 0, width: 0, height: 0 };

    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Build from four edges
    pub const fn from_edges(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        }
    }

    /// Rect anchored at the origin with the given size
    pub const fn from_size(width: i32, height: i32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub const fn left(&self) -> i32 {
        self.x
    }

    pub const fn top(&self) -> i32 {
        self.y
    }

    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// True for zero or negative extent
    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Area in pixels (zero when empty)
    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    /// Intersection; empty rects collapse to `Rect::EMPTY`
    pub fn intersect(&self, other: &Rect) -> Rect {
        let left = self.left().max(other.left());
        let top = self.top().max(other.top());
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right > left && bottom > top {
            Rect::from_edges(left, top, right, bottom)
        } else {
            Rect::EMPTY
        }
    }

    /// Check if the two rects share any pixel
    pub fn intersects(&self, other: &Rect) -> bool {
        !self.intersect(other).is_empty()
    }

    /// Check if `other` lies entirely inside `self`
    ///
    /// An empty rect is contained by everything.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        if other.is_empty() {
            return true;
        }
        if self.is_empty() {
            return false;
        }
        other.left() >= self.left()
            && other.top() >= self.top()
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.left() && x < self.right() && y >= self.top() && y < self.bottom()
    }

    /// Bounding box of both rects, ignoring empty operands
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect::from_edges(
            self.left().min(other.left()),
            self.top().min(other.top()),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    /// Pixels of `self` not covered by `other`, as disjoint rects
    ///
    /// Split order: full-width band above, full-width band below,
    /// then the left and right pieces of the middle band.
    pub fn subtract(&self, other: &Rect) -> RectPieces {
        let mut pieces = RectPieces::new();
        if self.is_empty() {
            return pieces;
        }

        let overlap = self.intersect(other);
        if overlap.is_empty() {
            pieces.push(*self);
            return pieces;
        }

        if overlap.top() > self.top() {
            pieces.push(Rect::from_edges(self.left(), self.top(), self.right(), overlap.top()));
        }
        if overlap.bottom() < self.bottom() {
            pieces.push(Rect::from_edges(
                self.left(),
                overlap.bottom(),
                self.right(),
                self.bottom(),
            ));
        }
        if overlap.left() > self.left() {
            pieces.push(Rect::from_edges(
                self.left(),
                overlap.top(),
                overlap.left(),
                overlap.bottom(),
            ));
        }
        if overlap.right() < self.right() {
            pieces.push(Rect::from_edges(
                overlap.right(),
                overlap.top(),
                self.right(),
                overlap.bottom(),
            ));
        }
        pieces
    }

    /// Grow each edge outward by the given amounts
    pub const fn inflate_edges(&self, left: i32, top: i32, right: i32, bottom: i32) -> Rect {
        Rect::from_edges(
            self.left() - left,
            self.top() - top,
            self.right() + right,
            self.bottom() + bottom,
        )
    }

    /// Grow every edge outward by `amount`
    pub const fn inflate(&self, amount: i32) -> Rect {
        self.inflate_edges(amount, amount, amount, amount)
    }

    /// Snap edges outward to multiples of `pitch`
    ///
    /// Empty rects stay empty.
    pub fn align_out(&self, pitch: i32) -> Rect {
        debug_assert!(pitch > 0, "grid pitch must be positive");
        if self.is_empty() {
            return Rect::EMPTY;
        }
        let left = self.left().div_euclid(pitch) * pitch;
        let top = self.top().div_euclid(pitch) * pitch;
        let right = (self.right() + pitch - 1).div_euclid(pitch) * pitch;
        let bottom = (self.bottom() + pitch - 1).div_euclid(pitch) * pitch;
        Rect::from_edges(left, top, right, bottom)
    }

    pub const fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}) {}x{}", self.x, self.y, self.width, self.height)
    }
}

/// Floating point rectangle for visibility input
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RectF {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RectF {
    pub const EMPTY: RectF = RectF { x: 0.0, y: 0.0, width: 0.0, height: 0.0 };

    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_edges(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Bounding box of both rects, ignoring empty operands
    pub fn union(&self, other: &RectF) -> RectF {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        RectF::from_edges(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    pub fn intersect(&self, other: &RectF) -> RectF {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right > left && bottom > top {
            RectF::from_edges(left, top, right, bottom)
        } else {
            RectF::EMPTY
        }
    }

    /// Smallest integer rect covering this one
    pub fn round_out(&self) -> Rect {
        if self.is_empty() {
            return Rect::EMPTY;
        }
        Rect::from_edges(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.right().ceil() as i32,
            self.bottom().ceil() as i32,
        )
    }
}

impl From<Rect> for RectF {
    fn from(rect: Rect) -> Self {
        RectF::new(rect.x as f32, rect.y as f32, rect.width as f32, rect.height as f32)
    }
}
