//! Surface errors

use thiserror::Error;
use vsurf_region::Rect;
use vsurf_tiles::{BackingError, TileError};

/// Invalid numeric configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("standby bucket width {width} ms exceeds eviction ceiling {ceiling} ms")]
    BucketWiderThanCeiling { width: u64, ceiling: u64 },

    #[error("tile size {tile_size} exceeds max allocation dimension {max}")]
    TileLargerThanAllocation { tile_size: i32, max: i32 },
}

/// Errors reported by `VirtualSurface` operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("rect {rect} lies outside surface bounds {bounds}")]
    InvalidArgument { rect: Rect, bounds: Rect },

    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    #[error("surface already initialized")]
    AlreadyInitialized,

    #[error("surface not initialized")]
    NotInitialized,

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("tile error: {0}")]
    Tile(#[from] TileError),

    #[error("backing error: {0}")]
    Backing(#[from] BackingError),
}
