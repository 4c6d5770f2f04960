//! Eviction Scheduler
//!
//! Once per frame every tile outside the desired area is either parked
//! in an age bucket of the shared standby lists or, past the age ceiling,
//! freed outright. Frees are collected during the sweep and applied once
//! iteration is done.

use serde::{Deserialize, Serialize};
use vsurf_region::{Rect, Region};

use crate::{StandbyLists, StandbyRecord, SurfaceId, TileError, TileId, TiledSurface};

/// Age thresholds for eviction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionConfig {
    /// Tiles older than this are freed immediately
    pub ceiling_ms: u64,
    /// Width of one standby age bucket
    pub bucket_width_ms: u64,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            ceiling_ms: 2000,
            bucket_width_ms: 256,
        }
    }
}

impl EvictionConfig {
    /// Buckets needed to cover ages up to the ceiling
    pub fn bucket_count(&self) -> usize {
        let width = self.bucket_width_ms.max(1);
        self.ceiling_ms.div_ceil(width).max(1) as usize
    }
}

/// Fate of one off-screen tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionDecision {
    /// Park in this standby bucket
    Standby(usize),
    /// Release now
    Free,
}

/// Result of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Tiles filed into standby buckets
    pub standby: usize,
    /// Tiles freed during the sweep
    pub freed: Vec<TileId>,
}

impl SweepReport {
    pub fn freed_count(&self) -> usize {
        self.freed.len()
    }
}

/// Age-bucketed standby/free decisions
#[derive(Debug, Clone, Default)]
pub struct EvictionScheduler {
    config: EvictionConfig,
}

impl EvictionScheduler {
    pub fn new(config: EvictionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvictionConfig {
        &self.config
    }

    /// Standby lists sized for this scheduler
    pub fn standby_lists(&self) -> StandbyLists {
        StandbyLists::new(self.config.bucket_count())
    }

    pub fn classify(&self, age_ms: u64) -> EvictionDecision {
        if age_ms > self.config.ceiling_ms {
            return EvictionDecision::Free;
        }
        let bucket = age_ms / self.config.bucket_width_ms.max(1);
        let last = self.config.bucket_count() - 1;
        EvictionDecision::Standby((bucket as usize).min(last))
    }

    /// Sweep every tile outside `desired`
    ///
    /// Freed tiles have their bounds removed from `valid`; their
    /// allocations wait in the surface's release queue for the next trim.
    pub fn sweep(
        &self,
        surface_id: SurfaceId,
        tiles: &mut TiledSurface,
        valid: &mut Region,
        desired: Rect,
        now_ms: u64,
        standby: &mut StandbyLists,
    ) -> Result<SweepReport, TileError> {
        let mut report = SweepReport::default();

        for (id, tile) in tiles.iter() {
            if tile.bounds.intersects(&desired) {
                continue;
            }
            match self.classify(tile.age_ms(now_ms)) {
                EvictionDecision::Free => report.freed.push(id),
                EvictionDecision::Standby(bucket) => {
                    standby.push(
                        bucket,
                        StandbyRecord {
                            surface: surface_id,
                            tile: id,
                            bytes: tile.allocation_bytes,
                            timestamp_ms: tile.timestamp_ms,
                        },
                    );
                    report.standby += 1;
                }
            }
        }

        for &id in &report.freed {
            let tile = tiles.free_tile(id)?;
            valid.remove(tile.bounds);
        }

        if report.standby > 0 || !report.freed.is_empty() {
            tracing::debug!(
                surface = surface_id.0,
                standby = report.standby,
                freed = report.freed.len(),
                "eviction sweep"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryBacking, TileGridConfig, TileOrigin};

    #[test]
    fn test_bucket_count() {
        assert_eq!(EvictionConfig::default().bucket_count(), 8);
        let odd = EvictionConfig { ceiling_ms: 1000, bucket_width_ms: 300 };
        assert_eq!(odd.bucket_count(), 4);
    }

    #[test]
    fn test_classify() {
        let scheduler = EvictionScheduler::default();
        assert_eq!(scheduler.classify(100), EvictionDecision::Standby(0));
        assert_eq!(scheduler.classify(300), EvictionDecision::Standby(1));
        assert_eq!(scheduler.classify(2000), EvictionDecision::Standby(7));
        assert_eq!(scheduler.classify(2001), EvictionDecision::Free);
        assert_eq!(scheduler.classify(3000), EvictionDecision::Free);
    }

    #[test]
    fn test_sweep_skips_desired_tiles() {
        let scheduler = EvictionScheduler::default();
        let mut tiles = TiledSurface::new(1024, 256, TileGridConfig::default());
        let mut backing = MemoryBacking::default();
        let mut valid = Region::new();
        let mut standby = scheduler.standby_lists();

        tiles.add_tile(TileOrigin::new(0, 0), 0, false, &mut backing).unwrap();
        let far = tiles.add_tile(TileOrigin::new(768, 0), 0, false, &mut backing).unwrap();
        valid.add(Rect::new(0, 0, 256, 256));
        valid.add(Rect::new(768, 0, 256, 256));

        let report = scheduler
            .sweep(SurfaceId(1), &mut tiles, &mut valid, Rect::new(0, 0, 512, 256), 5000, &mut standby)
            .unwrap();

        assert_eq!(report.freed, vec![far]);
        assert_eq!(report.standby, 0);
        assert_eq!(tiles.len(), 1);
        assert_eq!(valid.area(), 256 * 256);
        assert!(tiles.has_pending_release());
    }
}
