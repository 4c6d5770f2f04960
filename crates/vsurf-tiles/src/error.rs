//! Tile and backing errors

use thiserror::Error;

use crate::{TileId, TileOrigin};

/// Failures reported by a backing allocation provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackingError {
    #[error("backing device lost")]
    DeviceLost,

    #[error("allocation failed: {0}")]
    AllocationFailed(String),
}

/// Tile grid errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileError {
    #[error("tile cap of {cap} reached")]
    CapacityReached { cap: usize },

    #[error("tile already exists at {0:?}")]
    DuplicateOrigin(TileOrigin),

    #[error("origin {origin:?} is not a multiple of the tile pitch {pitch}")]
    MisalignedOrigin { origin: TileOrigin, pitch: i32 },

    #[error("origin {0:?} lies outside the surface")]
    OriginOutOfBounds(TileOrigin),

    #[error("unknown tile {0:?}")]
    UnknownTile(TileId),

    #[error("backing: {0}")]
    Backing(#[from] BackingError),
}

impl TileError {
    /// True when the failure means the device went away
    pub fn is_device_lost(&self) -> bool {
        matches!(self, TileError::Backing(BackingError::DeviceLost))
    }
}
