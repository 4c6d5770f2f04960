//! Standby Lists
//!
//! Age buckets of off-screen tiles that may be released when memory gets
//! tight. A single `StandbyLists` is shared by every surface of a host
//! so the budget decision can be made across surfaces.

use serde::{Deserialize, Serialize};

use crate::TileId;

/// Identifies one surface within a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceId(pub u64);

/// A tile parked in a standby bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandbyRecord {
    pub surface: SurfaceId,
    pub tile: TileId,
    /// Allocation bytes held by the tile
    pub bytes: u64,
    /// Timestamp of the tile when it was filed
    pub timestamp_ms: u64,
}

/// Fixed number of age buckets; bucket 0 is the youngest
#[derive(Debug, Clone)]
pub struct StandbyLists {
    buckets: Vec<Vec<StandbyRecord>>,
    total_bytes: u64,
}

impl StandbyLists {
    /// Create lists with `bucket_count` buckets (at least one)
    pub fn new(bucket_count: usize) -> Self {
        Self {
            buckets: vec![Vec::new(); bucket_count.max(1)],
            total_bytes: 0,
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn bucket(&self, index: usize) -> &[StandbyRecord] {
        self.buckets.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// File a record; out-of-range buckets land in the oldest one
    pub fn push(&mut self, bucket: usize, record: StandbyRecord) {
        let index = bucket.min(self.buckets.len() - 1);
        self.total_bytes += record.bytes;
        self.buckets[index].push(record);
    }

    /// Running total of allocation bytes across all buckets
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    /// Empty every bucket; hosts do this once per frame before sweeping
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.total_bytes = 0;
    }

    /// Drop every record belonging to one surface
    pub fn remove_surface(&mut self, surface: SurfaceId) {
        let mut removed = 0;
        for bucket in &mut self.buckets {
            bucket.retain(|r| {
                let keep = r.surface != surface;
                if !keep {
                    removed += r.bytes;
                }
                keep
            });
        }
        self.total_bytes -= removed;
    }

    /// Take records until the total fits in `budget_bytes`
    ///
    /// Oldest bucket first; within a bucket, in filing order.
    pub fn drain_over_budget(&mut self, budget_bytes: u64) -> Vec<StandbyRecord> {
        let mut drained = Vec::new();
        for bucket in self.buckets.iter_mut().rev() {
            if self.total_bytes <= budget_bytes {
                break;
            }
            let mut taken = 0;
            for record in bucket.iter() {
                if self.total_bytes <= budget_bytes {
                    break;
                }
                self.total_bytes -= record.bytes;
                drained.push(*record);
                taken += 1;
            }
            bucket.drain(..taken);
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: u32, bytes: u64) -> StandbyRecord {
        StandbyRecord {
            surface: SurfaceId(1),
            tile: TileId { index, generation: 0 },
            bytes,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn test_push_clamps_bucket() {
        let mut lists = StandbyLists::new(4);
        lists.push(99, record(0, 10));
        assert_eq!(lists.bucket(3).len(), 1);
        assert_eq!(lists.total_bytes(), 10);
    }

    #[test]
    fn test_drain_oldest_first() {
        let mut lists = StandbyLists::new(3);
        lists.push(0, record(0, 100));
        lists.push(2, record(1, 100));
        lists.push(1, record(2, 100));

        let drained = lists.drain_over_budget(150);
        let ids: Vec<u32> = drained.iter().map(|r| r.tile.index).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(lists.total_bytes(), 100);
        assert_eq!(lists.len(), 1);

        assert!(lists.drain_over_budget(1000).is_empty());
    }

    #[test]
    fn test_remove_surface() {
        let mut lists = StandbyLists::new(2);
        lists.push(0, record(0, 10));
        lists.push(1, StandbyRecord { surface: SurfaceId(2), ..record(1, 5) });

        lists.remove_surface(SurfaceId(1));
        assert_eq!(lists.len(), 1);
        assert_eq!(lists.total_bytes(), 5);
    }
}
