//! Update Set Computer
//!
//! Lazily computed list of rects the application must redraw. The list
//! is only rebuilt when marked stale, and remembers whether its current
//! contents have already been announced to the application.

use vsurf_region::{Rect, Region};

/// Uncovered parts of `target`, cut into pieces no larger than
/// `max_dimension` on either axis
pub fn compute_update_rects(valid: &Region, target: Rect, max_dimension: i32) -> Vec<Rect> {
    if target.is_empty() {
        return Vec::new();
    }
    valid
        .inverse_within(target)
        .into_iter()
        .flat_map(|rect| split_rect(rect, max_dimension))
        .collect()
}

/// Step both axes by `max_dimension`, clipping each step to `rect`
pub fn split_rect(rect: Rect, max_dimension: i32) -> impl Iterator<Item = Rect> {
    let step = max_dimension.max(1);
    let rows = if rect.is_empty() { 0 } else { (rect.height + step - 1) / step };
    let cols = if rect.is_empty() { 0 } else { (rect.width + step - 1) / step };
    (0..rows).flat_map(move |row| {
        (0..cols).map(move |col| {
            Rect::new(rect.x + col * step, rect.y + row * step, step, step).intersect(&rect)
        })
    })
}

/// Cached needed-update set
#[derive(Debug, Clone)]
pub struct UpdateSetComputer {
    rects: Vec<Rect>,
    stale: bool,
    announced: bool,
    max_dimension: i32,
}

impl UpdateSetComputer {
    pub fn new(max_dimension: i32) -> Self {
        Self {
            rects: Vec::new(),
            stale: true,
            announced: false,
            max_dimension,
        }
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Cached rects; never recomputes
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Recompute if stale; returns true when the set changed
    pub fn ensure_computed(&mut self, valid: &Region, target: Rect) -> bool {
        if !self.stale {
            return false;
        }
        self.stale = false;

        let rects = compute_update_rects(valid, target, self.max_dimension);
        if rects == self.rects {
            return false;
        }
        self.rects = rects;
        self.announced = false;
        true
    }

    /// True once per distinct non-empty set
    pub fn take_announcement(&mut self) -> bool {
        if self.announced || self.rects.is_empty() {
            return false;
        }
        self.announced = true;
        true
    }

    /// Make the current set announce again, e.g. to a new listener
    pub fn reset_announcement(&mut self) {
        self.announced = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_rect() {
        let pieces: Vec<_> = split_rect(Rect::new(0, 0, 5000, 100), 2048).collect();
        assert_eq!(
            pieces,
            vec![
                Rect::new(0, 0, 2048, 100),
                Rect::new(2048, 0, 2048, 100),
                Rect::new(4096, 0, 904, 100),
            ]
        );
        assert_eq!(split_rect(Rect::EMPTY, 2048).count(), 0);
    }

    #[test]
    fn test_compute_skips_valid_area() {
        let valid = Region::from_rect(Rect::new(0, 0, 256, 512));
        let rects = compute_update_rects(&valid, Rect::new(0, 0, 512, 512), 2048);
        assert_eq!(rects, vec![Rect::new(256, 0, 256, 512)]);
        assert!(compute_update_rects(&valid, Rect::EMPTY, 2048).is_empty());
    }

    #[test]
    fn test_announce_once_per_set() {
        let mut updates = UpdateSetComputer::new(2048);
        let valid = Region::new();
        let target = Rect::new(0, 0, 100, 100);

        assert!(updates.ensure_computed(&valid, target));
        assert!(updates.take_announcement());
        assert!(!updates.take_announcement());

        updates.mark_stale();
        assert!(!updates.ensure_computed(&valid, target));
        assert!(!updates.take_announcement());

        updates.reset_announcement();
        assert!(updates.take_announcement());
    }

    #[test]
    fn test_not_recomputed_unless_stale() {
        let mut updates = UpdateSetComputer::new(2048);
        updates.ensure_computed(&Region::new(), Rect::new(0, 0, 10, 10));

        let valid = Region::from_rect(Rect::new(0, 0, 10, 10));
        updates.ensure_computed(&valid, Rect::new(0, 0, 10, 10));
        assert_eq!(updates.rects(), &[Rect::new(0, 0, 10, 10)]);

        updates.mark_stale();
        updates.ensure_computed(&valid, Rect::new(0, 0, 10, 10));
        assert!(updates.rects().is_empty());
    }
}
