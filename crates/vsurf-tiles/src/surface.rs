//! Tiled Surface
//!
//! Map from grid origin to live tile. Tiles are created lazily when
//! content is about to be drawn into their cell and are discarded by
//! eviction, by shrinking the surface, or when the device is lost.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use vsurf_region::{Rect, Region};

use crate::{
    AllocationHandle, BackingProvider, DEFAULT_MAX_TILES, DEFAULT_TILE_SIZE, Tile, TileArena,
    TileError, TileId, TileOrigin,
};

/// Grid parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileGridConfig {
    /// Tile pitch in pixels
    pub tile_size: i32,
    /// Hard cap on live tiles
    pub max_tiles: usize,
    /// Bytes per pixel of a backing allocation
    pub bytes_per_pixel: u32,
}

impl Default for TileGridConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            max_tiles: DEFAULT_MAX_TILES,
            bytes_per_pixel: 4,
        }
    }
}

/// What a resize did to the tiles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResizeReport {
    /// Tiles removed because they left the surface or outgrew their allocation
    pub discarded: usize,
    /// Edge tiles kept with smaller bounds
    pub clipped: usize,
}

/// Grid of lazily allocated tiles
#[derive(Debug)]
pub struct TiledSurface {
    config: TileGridConfig,
    width: i32,
    height: i32,
    origins: HashMap<TileOrigin, TileId>,
    tiles: TileArena,
    pending_release: Vec<AllocationHandle>,
}

impl TiledSurface {
    pub fn new(width: i32, height: i32, config: TileGridConfig) -> Self {
        debug_assert!(config.tile_size > 0, "tile pitch must be positive");
        Self {
            config,
            width: width.max(0),
            height: height.max(0),
            origins: HashMap::new(),
            tiles: TileArena::new(),
            pending_release: Vec::new(),
        }
    }

    pub fn config(&self) -> &TileGridConfig {
        &self.config
    }

    pub fn tile_size(&self) -> i32 {
        self.config.tile_size
    }

    pub fn max_tiles(&self) -> usize {
        self.config.max_tiles
    }

    /// Surface bounds anchored at the origin
    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn at_capacity(&self) -> bool {
        self.tiles.len() >= self.config.max_tiles
    }

    pub fn tile_id_at(&self, origin: TileOrigin) -> Option<TileId> {
        self.origins.get(&origin).copied()
    }

    pub fn get_tile(&self, origin: TileOrigin) -> Option<&Tile> {
        self.tile_id_at(origin).and_then(|id| self.tiles.get(id))
    }

    pub fn get(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id)
    }

    pub fn get_mut(&mut self, id: TileId) -> Option<&mut Tile> {
        self.tiles.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TileId, &Tile)> {
        self.tiles.iter()
    }

    /// Bounds of every live tile, in slot order
    pub fn enumerate_tile_rects(&self) -> Vec<Rect> {
        self.tiles.iter().map(|(_, tile)| tile.bounds).collect()
    }

    /// Union of every live tile's bounds as a region
    pub fn coverage(&self) -> Region {
        self.tiles.iter().map(|(_, tile)| tile.bounds).collect()
    }

    pub fn allocated_bytes(&self) -> u64 {
        self.tiles.iter().map(|(_, tile)| tile.allocation_bytes).sum()
    }

    /// Create a tile at `origin`
    ///
    /// Fails without touching the provider when the origin is misaligned,
    /// outside the surface, already taken, or the cap is reached.
    pub fn add_tile(
        &mut self,
        origin: TileOrigin,
        timestamp_ms: u64,
        init_transparent: bool,
        provider: &mut dyn BackingProvider,
    ) -> Result<TileId, TileError> {
        let pitch = self.config.tile_size;
        if !origin.is_aligned(pitch) {
            return Err(TileError::MisalignedOrigin { origin, pitch });
        }
        let bounds = origin.cell(pitch).intersect(&self.bounds());
        if bounds.is_empty() {
            return Err(TileError::OriginOutOfBounds(origin));
        }
        if self.origins.contains_key(&origin) {
            return Err(TileError::DuplicateOrigin(origin));
        }
        if self.at_capacity() {
            return Err(TileError::CapacityReached {
                cap: self.config.max_tiles,
            });
        }

        let handle = provider.allocate(bounds.width, bounds.height, init_transparent)?;
        let allocation_bytes = bounds.area() as u64 * self.config.bytes_per_pixel as u64;
        let id = self.tiles.insert(Tile {
            origin,
            bounds,
            timestamp_ms,
            handle,
            allocation_bytes,
        });
        self.origins.insert(origin, id);
        tracing::trace!(?origin, ?bounds, init_transparent, "tile added");
        Ok(id)
    }

    /// Remove a tile; its allocation is queued for release
    pub fn free_tile(&mut self, id: TileId) -> Result<Tile, TileError> {
        let tile = self.tiles.remove(id).ok_or(TileError::UnknownTile(id))?;
        self.origins.remove(&tile.origin);
        self.pending_release.push(tile.handle);
        Ok(tile)
    }

    /// Refresh timestamps of every tile touching `rect`; returns how many
    pub fn touch_within(&mut self, rect: Rect, now_ms: u64) -> usize {
        if rect.is_empty() {
            return 0;
        }
        let mut touched = 0;
        for (_, tile) in self.tiles.iter_mut() {
            if tile.bounds.intersects(&rect) {
                tile.touch(now_ms);
                touched += 1;
            }
        }
        touched
    }

    /// Change the surface size
    ///
    /// Tiles that fall outside the new bounds are discarded. Edge tiles
    /// that shrink keep their allocation with clipped bounds, and their
    /// former bounds leave `valid`. Edge tiles that would grow past their
    /// allocation are discarded along with their valid area.
    pub fn resize(
        &mut self,
        width: i32,
        height: i32,
        valid: &mut Region,
        provider: &mut dyn BackingProvider,
    ) -> Result<ResizeReport, TileError> {
        self.width = width.max(0);
        self.height = height.max(0);
        let bounds = self.bounds();
        let pitch = self.config.tile_size;

        let mut report = ResizeReport::default();
        let mut doomed = Vec::new();
        for (id, tile) in self.tiles.iter_mut() {
            let new_bounds = tile.origin.cell(pitch).intersect(&bounds);
            if new_bounds == tile.bounds {
                continue;
            }
            if new_bounds.is_empty() || !tile.bounds.contains_rect(&new_bounds) {
                doomed.push(id);
                continue;
            }
            // Clipped tiles are redrawn in full
            valid.remove(tile.bounds);
            tile.bounds = new_bounds;
            report.clipped += 1;
        }

        for id in doomed {
            let tile = self.free_tile(id)?;
            valid.remove(tile.bounds);
            report.discarded += 1;
        }

        provider.resize_surface(self.width, self.height)?;
        tracing::debug!(
            width = self.width,
            height = self.height,
            discarded = report.discarded,
            clipped = report.clipped,
            "tiled surface resized"
        );
        Ok(report)
    }

    /// Forget every tile without releasing its allocation
    ///
    /// Used after a device loss, when the allocations no longer exist.
    pub fn drop_all_tiles(&mut self) -> usize {
        self.origins.clear();
        self.pending_release.clear();
        self.tiles.drain().len()
    }

    /// Remove every tile, queueing all allocations for release
    pub fn release_all_tiles(&mut self) -> usize {
        self.origins.clear();
        let drained = self.tiles.drain();
        self.pending_release.extend(drained.iter().map(|t| t.handle));
        drained.len()
    }

    pub fn has_pending_release(&self) -> bool {
        !self.pending_release.is_empty()
    }

    /// Hand queued allocations back to the provider
    pub fn release_pending(&mut self, provider: &mut dyn BackingProvider) -> usize {
        let count = self.pending_release.len();
        for handle in self.pending_release.drain(..) {
            provider.free(handle);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BackingCall, MemoryBacking};

    fn surface(width: i32, height: i32) -> TiledSurface {
        TiledSurface::new(width, height, TileGridConfig::default())
    }

    #[test]
    fn test_edge_tile_clipped_to_surface() {
        let mut tiles = surface(300, 300);
        let mut backing = MemoryBacking::default();

        let id = tiles
            .add_tile(TileOrigin::new(256, 256), 0, true, &mut backing)
            .unwrap();
        assert_eq!(tiles.get(id).unwrap().bounds, Rect::new(256, 256, 44, 44));
        assert_eq!(tiles.get(id).unwrap().allocation_bytes, 44 * 44 * 4);
    }

    #[test]
    fn test_add_tile_rejections() {
        let mut tiles = surface(512, 512);
        let mut backing = MemoryBacking::default();

        assert!(matches!(
            tiles.add_tile(TileOrigin::new(10, 0), 0, false, &mut backing),
            Err(TileError::MisalignedOrigin { .. })
        ));
        assert!(matches!(
            tiles.add_tile(TileOrigin::new(512, 0), 0, false, &mut backing),
            Err(TileError::OriginOutOfBounds(_))
        ));

        tiles.add_tile(TileOrigin::new(0, 0), 0, false, &mut backing).unwrap();
        assert!(matches!(
            tiles.add_tile(TileOrigin::new(0, 0), 0, false, &mut backing),
            Err(TileError::DuplicateOrigin(_))
        ));
        assert_eq!(backing.probe().allocation_count(), 1);
    }

    #[test]
    fn test_cap_enforced() {
        let config = TileGridConfig { max_tiles: 2, ..TileGridConfig::default() };
        let mut tiles = TiledSurface::new(1024, 1024, config);
        let mut backing = MemoryBacking::default();

        tiles.add_tile(TileOrigin::new(0, 0), 0, false, &mut backing).unwrap();
        tiles.add_tile(TileOrigin::new(256, 0), 0, false, &mut backing).unwrap();
        assert_eq!(
            tiles.add_tile(TileOrigin::new(512, 0), 0, false, &mut backing),
            Err(TileError::CapacityReached { cap: 2 })
        );
        assert_eq!(tiles.len(), 2);
    }

    #[test]
    fn test_free_tile_defers_release() {
        let mut tiles = surface(512, 512);
        let mut backing = MemoryBacking::default();
        let probe = backing.probe();

        let id = tiles.add_tile(TileOrigin::new(0, 0), 0, false, &mut backing).unwrap();
        tiles.free_tile(id).unwrap();
        assert!(tiles.get_tile(TileOrigin::new(0, 0)).is_none());
        assert_eq!(probe.live_count(), 1);

        assert_eq!(tiles.release_pending(&mut backing), 1);
        assert_eq!(probe.live_count(), 0);
        assert_eq!(tiles.free_tile(id), Err(TileError::UnknownTile(id)));
    }

    #[test]
    fn test_resize_discards_and_clips() {
        let mut tiles = surface(1024, 1024);
        let mut backing = MemoryBacking::default();
        let mut valid = Region::new();
        for origin in TileOrigin::covering(Rect::new(0, 0, 1024, 256), 256) {
            tiles.add_tile(origin, 0, false, &mut backing).unwrap();
        }
        valid.add(Rect::new(0, 0, 1024, 256));

        let report = tiles.resize(400, 200, &mut valid, &mut backing).unwrap();
        assert_eq!(report.discarded, 2);
        assert_eq!(report.clipped, 2);
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles.get_tile(TileOrigin::new(256, 0)).unwrap().bounds, Rect::new(256, 0, 144, 200));
        assert!(valid.is_subset_of(&tiles.coverage()));
        assert!(valid.is_empty());
        assert!(
            backing
                .probe()
                .calls()
                .contains(&BackingCall::ResizeSurface { width: 400, height: 200 })
        );
    }

    #[test]
    fn test_resize_discards_growing_edge_tile() {
        let mut tiles = surface(300, 256);
        let mut backing = MemoryBacking::default();
        let mut valid = Region::new();
        tiles.add_tile(TileOrigin::new(256, 0), 0, false, &mut backing).unwrap();
        valid.add(Rect::new(256, 0, 44, 256));

        let report = tiles.resize(600, 256, &mut valid, &mut backing).unwrap();
        assert_eq!(report.discarded, 1);
        assert!(tiles.is_empty());
        assert!(valid.is_empty());
    }

    #[test]
    fn test_resize_to_zero_empties_everything() {
        let mut tiles = surface(512, 512);
        let mut backing = MemoryBacking::default();
        let mut valid = Region::from_rect(Rect::new(0, 0, 512, 512));
        for origin in TileOrigin::covering(tiles.bounds(), 256) {
            tiles.add_tile(origin, 0, false, &mut backing).unwrap();
        }

        tiles.resize(0, 0, &mut valid, &mut backing).unwrap();
        assert!(tiles.is_empty());
        assert!(valid.is_empty());
        assert_eq!(tiles.release_pending(&mut backing), 4);
    }

    #[test]
    fn test_touch_within() {
        let mut tiles = surface(1024, 256);
        let mut backing = MemoryBacking::default();
        let a = tiles.add_tile(TileOrigin::new(0, 0), 0, false, &mut backing).unwrap();
        let b = tiles.add_tile(TileOrigin::new(768, 0), 0, false, &mut backing).unwrap();

        assert_eq!(tiles.touch_within(Rect::new(0, 0, 512, 256), 900), 1);
        assert_eq!(tiles.get(a).unwrap().timestamp_ms, 900);
        assert_eq!(tiles.get(b).unwrap().timestamp_ms, 0);
    }
}
