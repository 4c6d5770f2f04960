//! Bounds Calculator
//!
//! Per-frame visible, desired and high-priority bounds, plus scroll
//! direction prediction from how the visible rect moved.

use bitflags::bitflags;
use vsurf_region::{Rect, RectF};

use crate::VisibilityContributor;

bitflags! {
    /// Predicted scroll direction
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MotionFlags: u8 {
        const LEFT = 0b0001;
        const RIGHT = 0b0010;
        const UP = 0b0100;
        const DOWN = 0b1000;
    }
}

/// Bounds computed for one frame
///
/// When non-empty: `desired ⊇ high_priority ⊇ visible`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameBounds {
    pub visible: Rect,
    pub desired: Rect,
    pub high_priority: Rect,
    pub motion: MotionFlags,
}

/// Computes `FrameBounds` on a fixed tile grid
#[derive(Debug, Clone, Copy)]
pub struct BoundsCalculator {
    pitch: i32,
}

impl BoundsCalculator {
    pub fn new(tile_size: i32) -> Self {
        Self { pitch: tile_size }
    }

    pub fn pitch(&self) -> i32 {
        self.pitch
    }

    /// Union of the contributors in surface space, rounded out and
    /// clipped to the surface
    pub fn visible_bounds(&self, contributors: &[VisibilityContributor], surface: Rect) -> Rect {
        let union = contributors.iter().fold(RectF::EMPTY, |acc, c| {
            acc.union(&c.local_to_surface.transform_rect(&c.visible_local))
        });
        union.round_out().intersect(&surface)
    }

    /// Motion implied by going from `old` to `new`
    ///
    /// Unchanged bounds keep the previous prediction. Only a pure
    /// translation sets flags; any size change clears them.
    pub fn predict_motion(old: Rect, new: Rect, previous: MotionFlags) -> MotionFlags {
        if old == new {
            return previous;
        }
        if old.width != new.width || old.height != new.height {
            return MotionFlags::empty();
        }

        let mut motion = MotionFlags::empty();
        let dx = new.x - old.x;
        let dy = new.y - old.y;
        if dx > 0 {
            motion |= MotionFlags::RIGHT;
        } else if dx < 0 {
            motion |= MotionFlags::LEFT;
        }
        if dy > 0 {
            motion |= MotionFlags::DOWN;
        } else if dy < 0 {
            motion |= MotionFlags::UP;
        }
        motion
    }

    /// Grid-aligned visible bounds grown by one pitch on every side
    pub fn desired_bounds(&self, visible: Rect) -> Rect {
        if visible.is_empty() {
            return Rect::EMPTY;
        }
        visible.align_out(self.pitch).inflate(self.pitch)
    }

    /// Grid-aligned visible bounds grown one pitch toward the motion
    pub fn high_priority_bounds(&self, visible: Rect, motion: MotionFlags) -> Rect {
        if visible.is_empty() {
            return Rect::EMPTY;
        }
        let step = |flag: MotionFlags| if motion.contains(flag) { self.pitch } else { 0 };
        visible.align_out(self.pitch).inflate_edges(
            step(MotionFlags::LEFT),
            step(MotionFlags::UP),
            step(MotionFlags::RIGHT),
            step(MotionFlags::DOWN),
        )
    }

    pub fn calculate(
        &self,
        contributors: &[VisibilityContributor],
        surface: Rect,
        previous: &FrameBounds,
    ) -> FrameBounds {
        let visible = self.visible_bounds(contributors, surface);
        let motion = Self::predict_motion(previous.visible, visible, previous.motion);
        FrameBounds {
            visible,
            desired: self.desired_bounds(visible),
            high_priority: self.high_priority_bounds(visible, motion),
            motion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsurf_region::Transform2D;

    fn contributor(x: f32, y: f32, w: f32, h: f32) -> VisibilityContributor {
        VisibilityContributor::surface_rect(RectF::new(x, y, w, h))
    }

    #[test]
    fn test_visible_bounds_union_and_clip() {
        let calc = BoundsCalculator::new(256);
        let contributors = [
            contributor(-10.0, 0.0, 50.0, 50.0),
            VisibilityContributor {
                local_to_surface: Transform2D::translate(100.0, 100.0),
                visible_local: RectF::new(0.0, 0.0, 20.5, 20.0),
            },
        ];
        let visible = calc.visible_bounds(&contributors, Rect::new(0, 0, 1024, 1024));
        assert_eq!(visible, Rect::from_edges(0, 0, 121, 120));
    }

    #[test]
    fn test_desired_is_aligned_plus_one_pitch() {
        let calc = BoundsCalculator::new(256);
        assert_eq!(
            calc.desired_bounds(Rect::new(300, 300, 10, 10)),
            Rect::from_edges(0, 0, 768, 768)
        );
        assert!(calc.desired_bounds(Rect::EMPTY).is_empty());
    }

    #[test]
    fn test_high_priority_follows_motion() {
        let calc = BoundsCalculator::new(256);
        let visible = Rect::new(256, 256, 256, 256);

        assert_eq!(calc.high_priority_bounds(visible, MotionFlags::empty()), visible);
        assert_eq!(
            calc.high_priority_bounds(visible, MotionFlags::DOWN | MotionFlags::LEFT),
            Rect::from_edges(0, 256, 512, 768)
        );
    }

    #[test]
    fn test_predict_motion() {
        let old = Rect::new(0, 0, 100, 100);
        assert_eq!(
            BoundsCalculator::predict_motion(old, old.translate(0, 30), MotionFlags::empty()),
            MotionFlags::DOWN
        );
        assert_eq!(
            BoundsCalculator::predict_motion(old, old.translate(-5, -5), MotionFlags::empty()),
            MotionFlags::LEFT | MotionFlags::UP
        );
        assert_eq!(
            BoundsCalculator::predict_motion(old, Rect::new(0, 30, 100, 90), MotionFlags::DOWN),
            MotionFlags::empty()
        );
        assert_eq!(
            BoundsCalculator::predict_motion(old, old, MotionFlags::RIGHT),
            MotionFlags::RIGHT
        );
    }

    #[test]
    fn test_calculate_keeps_containment() {
        let calc = BoundsCalculator::new(256);
        let previous = FrameBounds {
            visible: Rect::new(0, 0, 300, 300),
            ..FrameBounds::default()
        };
        let bounds = calc.calculate(
            &[contributor(0.0, 40.0, 300.0, 300.0)],
            Rect::new(0, 0, 4096, 4096),
            &previous,
        );
        assert_eq!(bounds.motion, MotionFlags::DOWN);
        assert!(bounds.desired.contains_rect(&bounds.high_priority));
        assert!(bounds.high_priority.contains_rect(&bounds.visible));
    }
}
