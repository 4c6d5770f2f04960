//! Tile

use serde::{Deserialize, Serialize};
use vsurf_region::Rect;

use crate::AllocationHandle;

/// Grid origin of a tile, in surface pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileOrigin {
    pub x: i32,
    pub y: i32,
}

impl TileOrigin {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Full grid cell starting at this origin
    pub const fn cell(&self, pitch: i32) -> Rect {
        Rect::new(self.x, self.y, pitch, pitch)
    }

    pub const fn is_aligned(&self, pitch: i32) -> bool {
        self.x % pitch == 0 && self.y % pitch == 0
    }

    /// Origins of every grid cell touched by `rect`, row-major
    pub fn covering(rect: Rect, pitch: i32) -> impl Iterator<Item = TileOrigin> {
        let aligned = rect.align_out(pitch);
        let cols = (aligned.width / pitch).max(0);
        let rows = (aligned.height / pitch).max(0);
        (0..rows).flat_map(move |row| {
            (0..cols).map(move |col| {
                TileOrigin::new(aligned.x + col * pitch, aligned.y + row * pitch)
            })
        })
    }
}

/// A grid-aligned allocation unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    /// Grid origin (multiple of the pitch)
    pub origin: TileOrigin,
    /// Grid cell clipped to the surface
    pub bounds: Rect,
    /// Last time the tile was inside the desired area
    pub timestamp_ms: u64,
    /// Provider-owned allocation
    pub handle: AllocationHandle,
    /// Bytes held by the allocation
    pub allocation_bytes: u64,
}

impl Tile {
    /// Milliseconds since the tile was last touched
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.timestamp_ms)
    }

    pub fn touch(&mut self, now_ms: u64) {
        self.timestamp_ms = self.timestamp_ms.max(now_ms);
    }
}
