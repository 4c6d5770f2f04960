//! Region
//!
//! A set of pixels stored as pairwise-disjoint, non-empty rectangles.
//! Every operation behaves exactly like the same operation on a boolean
//! mask over the integer plane; the rectangle decomposition itself is
//! not canonical and callers must not depend on it.

use crate::Rect;

/// Disjoint rectangle set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    pub fn new() -> Self {
        Self::default()
    }

    /// Region covering exactly one rect
    pub fn from_rect(rect: Rect) -> Self {
        let mut region = Self::new();
        region.add(rect);
        region
    }

    /// The disjoint rects currently making up the region
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Number of covered pixels
    pub fn area(&self) -> i64 {
        self.rects.iter().map(Rect::area).sum()
    }

    /// Smallest rect enclosing the region
    pub fn bounds(&self) -> Rect {
        self.rects.iter().fold(Rect::EMPTY, |acc, r| acc.union(r))
    }

    pub fn clear(&mut self) {
        self.rects.clear();
    }

    /// Cover every pixel of `rect`
    pub fn add(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }

        let mut fresh: Vec<Rect> = vec![rect];
        for existing in &self.rects {
            if fresh.is_empty() {
                return;
            }
            fresh = fresh.iter().flat_map(|piece| piece.subtract(existing)).collect();
        }

        if fresh.is_empty() {
            return;
        }
        self.rects.extend(fresh);
        coalesce(&mut self.rects);
    }

    /// Uncover every pixel of `rect`
    pub fn remove(&mut self, rect: Rect) {
        if rect.is_empty() || self.rects.is_empty() {
            return;
        }
        if !self.rects.iter().any(|r| r.intersects(&rect)) {
            return;
        }
        self.rects = self
            .rects
            .iter()
            .flat_map(|r| r.subtract(&rect))
            .collect();
        coalesce(&mut self.rects);
    }

    /// Keep only the pixels inside `rect`
    pub fn intersect(&mut self, rect: Rect) {
        self.rects = self
            .rects
            .iter()
            .map(|r| r.intersect(&rect))
            .filter(|r| !r.is_empty())
            .collect();
    }

    /// Uncover every pixel of another region
    pub fn subtract_region(&mut self, other: &Region) {
        for rect in &other.rects {
            self.remove(*rect);
        }
    }

    /// Rects inside `bounds` that the region does not cover
    ///
    /// The result is disjoint and ordered top-to-bottom, then
    /// left-to-right.
    pub fn inverse_within(&self, bounds: Rect) -> Vec<Rect> {
        if bounds.is_empty() {
            return Vec::new();
        }

        let mut uncovered: Vec<Rect> = vec![bounds];
        for covered in &self.rects {
            if !covered.intersects(&bounds) {
                continue;
            }
            uncovered = uncovered
                .iter()
                .flat_map(|piece| piece.subtract(covered))
                .collect();
            if uncovered.is_empty() {
                return uncovered;
            }
        }

        coalesce(&mut uncovered);
        uncovered.sort_by_key(|r| (r.y, r.x));
        uncovered
    }

    /// Check that every pixel of `self` is also in `other`
    pub fn is_subset_of(&self, other: &Region) -> bool {
        self.rects.iter().all(|r| other.covers_rect(*r))
    }

    /// Check that every pixel of `rect` is in the region
    pub fn covers_rect(&self, rect: Rect) -> bool {
        if rect.is_empty() {
            return true;
        }
        let mut remaining: Vec<Rect> = vec![rect];
        for covered in &self.rects {
            remaining = remaining
                .iter()
                .flat_map(|piece| piece.subtract(covered))
                .collect();
            if remaining.is_empty() {
                return true;
            }
        }
        false
    }

    /// Check whether any pixel of `rect` is in the region
    pub fn intersects_rect(&self, rect: Rect) -> bool {
        self.rects.iter().any(|r| r.intersects(&rect))
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        self.rects.iter().any(|r| r.contains_point(x, y))
    }
}

impl From<Rect> for Region {
    fn from(rect: Rect) -> Self {
        Self::from_rect(rect)
    }
}

impl FromIterator<Rect> for Region {
    fn from_iter<I: IntoIterator<Item = Rect>>(iter: I) -> Self {
        let mut region = Region::new();
        for rect in iter {
            region.add(rect);
        }
        region
    }
}

/// Merge neighbours that share a full edge until nothing merges
///
/// Input rects must already be disjoint; the covered set is unchanged.
fn coalesce(rects: &mut Vec<Rect>) {
    rects.retain(|r| !r.is_empty());
    loop {
        let mut merged = false;
        let mut i = 0;
        while i < rects.len() {
            let mut j = i + 1;
            while j < rects.len() {
                if let Some(joined) = join(&rects[i], &rects[j]) {
                    rects[i] = joined;
                    rects.swap_remove(j);
                    merged = true;
                } else {
                    j += 1;
                }
            }
            i += 1;
        }
        if !merged {
            break;
        }
    }
}

fn join(a: &Rect, b: &Rect) -> Option<Rect> {
    let same_rows = a.top() == b.top() && a.bottom() == b.bottom();
    if same_rows && (a.right() == b.left() || b.right() == a.left()) {
        return Some(a.union(b));
    }
    let same_cols = a.left() == b.left() && a.right() == b.right();
    if same_cols && (a.bottom() == b.top() || b.bottom() == a.top()) {
        return Some(a.union(b));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disjoint(region: &Region) -> bool {
        let rects = region.rects();
        rects.iter().enumerate().all(|(i, a)| {
            !a.is_empty() && rects.iter().skip(i + 1).all(|b| !a.intersects(b))
        })
    }

    #[test]
    fn test_add_overlapping() {
        let mut region = Region::new();
        region.add(Rect::new(0, 0, 100, 100));
        region.add(Rect::new(50, 50, 100, 100));

        assert!(disjoint(&region));
        assert_eq!(region.area(), 100 * 100 * 2 - 50 * 50);
        assert_eq!(region.bounds(), Rect::new(0, 0, 150, 150));
    }

    #[test]
    fn test_add_adjacent_coalesces() {
        let mut region = Region::new();
        region.add(Rect::new(0, 0, 256, 256));
        region.add(Rect::new(256, 0, 256, 256));
        assert_eq!(region.rects(), &[Rect::new(0, 0, 512, 256)]);
    }

    #[test]
    fn test_add_empty_is_noop() {
        let mut region = Region::new();
        region.add(Rect::new(5, 5, 0, 10));
        assert!(region.is_empty());
    }

    #[test]
    fn test_remove_punches_hole() {
        let mut region = Region::from_rect(Rect::new(0, 0, 30, 30));
        region.remove(Rect::new(10, 10, 10, 10));

        assert!(disjoint(&region));
        assert_eq!(region.area(), 800);
        assert!(!region.contains_point(15, 15));
        assert!(region.contains_point(5, 15));
    }

    #[test]
    fn test_intersect() {
        let mut region = Region::new();
        region.add(Rect::new(0, 0, 100, 100));
        region.add(Rect::new(200, 0, 100, 100));
        region.intersect(Rect::new(50, 0, 200, 50));

        assert_eq!(region.area(), 50 * 50 * 2);
        assert!(!region.intersects_rect(Rect::new(100, 0, 100, 100)));
    }

    #[test]
    fn test_inverse_within() {
        let mut region = Region::new();
        region.add(Rect::new(0, 0, 256, 256));

        let holes = region.inverse_within(Rect::new(0, 0, 512, 512));
        let area: i64 = holes.iter().map(Rect::area).sum();
        assert_eq!(area, 512 * 512 - 256 * 256);
        for hole in &holes {
            assert!(!region.intersects_rect(*hole));
        }

        let nothing = region.inverse_within(Rect::new(10, 10, 20, 20));
        assert!(nothing.is_empty());
    }

    #[test]
    fn test_inverse_within_ordered() {
        let mut region = Region::new();
        region.add(Rect::new(10, 10, 10, 10));
        let holes = region.inverse_within(Rect::new(0, 0, 30, 30));
        let keys: Vec<_> = holes.iter().map(|r| (r.y, r.x)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_is_subset_of() {
        let small = Region::from_rect(Rect::new(10, 10, 10, 10));
        let mut big = Region::new();
        big.add(Rect::new(0, 0, 15, 30));
        big.add(Rect::new(15, 0, 15, 30));

        assert!(small.is_subset_of(&big));
        assert!(!big.is_subset_of(&small));
        assert!(Region::new().is_subset_of(&small));
    }
}
