//! vsurf Region - Rectangle Algebra
//!
//! Integer rectangles, float rectangles for window/visibility input,
//! 2D affine transforms, and a region type that behaves like a boolean
//! mask over the integer plane while being stored as disjoint rectangles.

mod rect;
mod region;
mod transform;

pub use rect::{Rect, RectF, RectPieces};
pub use region::Region;
pub use transform::Transform2D;
