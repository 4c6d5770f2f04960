//! Surface Configuration

use serde::{Deserialize, Serialize};
use vsurf_tiles::{EvictionConfig, TileGridConfig};

use crate::ConfigError;

/// Tunables for one virtual surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Tile pitch in pixels
    pub tile_size: i32,

    /// Hard cap on live tiles per surface
    pub max_tile_count: usize,

    /// Off-screen tiles older than this are freed
    pub eviction_ceiling_ms: u64,

    /// Width of one standby age bucket
    pub standby_bucket_width_ms: u64,

    /// Largest update rect edge handed to the application
    pub max_allocation_dimension: i32,

    /// Bytes per pixel of a tile allocation
    pub bytes_per_pixel: u32,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            tile_size: 256,
            max_tile_count: 150,
            eviction_ceiling_ms: 2000,
            standby_bucket_width_ms: 256,
            max_allocation_dimension: 2048,
            bytes_per_pixel: 4,
        }
    }
}

impl SurfaceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_size <= 0 {
            return Err(ConfigError::Zero("tile_size"));
        }
        if self.max_tile_count == 0 {
            return Err(ConfigError::Zero("max_tile_count"));
        }
        if self.eviction_ceiling_ms == 0 {
            return Err(ConfigError::Zero("eviction_ceiling_ms"));
        }
        if self.standby_bucket_width_ms == 0 {
            return Err(ConfigError::Zero("standby_bucket_width_ms"));
        }
        if self.max_allocation_dimension <= 0 {
            return Err(ConfigError::Zero("max_allocation_dimension"));
        }
        if self.bytes_per_pixel == 0 {
            return Err(ConfigError::Zero("bytes_per_pixel"));
        }
        if self.standby_bucket_width_ms > self.eviction_ceiling_ms {
            return Err(ConfigError::BucketWiderThanCeiling {
                width: self.standby_bucket_width_ms,
                ceiling: self.eviction_ceiling_ms,
            });
        }
        if self.tile_size > self.max_allocation_dimension {
            return Err(ConfigError::TileLargerThanAllocation {
                tile_size: self.tile_size,
                max: self.max_allocation_dimension,
            });
        }
        Ok(())
    }

    pub fn grid_config(&self) -> TileGridConfig {
        TileGridConfig {
            tile_size: self.tile_size,
            max_tiles: self.max_tile_count,
            bytes_per_pixel: self.bytes_per_pixel,
        }
    }

    pub fn eviction_config(&self) -> EvictionConfig {
        EvictionConfig {
            ceiling_ms: self.eviction_ceiling_ms,
            bucket_width_ms: self.standby_bucket_width_ms,
        }
    }

    /// Number of standby buckets: ceil(ceiling / width)
    pub fn standby_bucket_count(&self) -> usize {
        self.eviction_config().bucket_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SurfaceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.standby_bucket_count(), 8);
        assert_eq!(config.grid_config().max_tiles, 150);
    }

    #[test]
    fn test_validate_rejects() {
        let zero_tiles = SurfaceConfig { tile_size: 0, ..SurfaceConfig::default() };
        assert_eq!(zero_tiles.validate(), Err(ConfigError::Zero("tile_size")));

        let wide = SurfaceConfig {
            standby_bucket_width_ms: 5000,
            ..SurfaceConfig::default()
        };
        assert!(matches!(wide.validate(), Err(ConfigError::BucketWiderThanCeiling { .. })));

        let huge_tiles = SurfaceConfig { tile_size: 4096, ..SurfaceConfig::default() };
        assert!(matches!(
            huge_tiles.validate(),
            Err(ConfigError::TileLargerThanAllocation { .. })
        ));
    }
}
