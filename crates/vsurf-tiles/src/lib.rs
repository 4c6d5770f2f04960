//! vsurf Tiles - Tile Grid and Eviction
//!
//! Grid-aligned tiles backed by allocations from an external provider,
//! a generational arena that hands out stable tile ids, and the
//! age-bucketed scheduler that decides which off-screen tiles go to
//! standby and which are freed.

mod arena;
mod backing;
mod error;
mod eviction;
mod standby;
mod surface;
mod tile;

pub use arena::{TileArena, TileId};
pub use backing::{AllocationHandle, BackingCall, BackingProbe, BackingProvider, MemoryBacking};
pub use error::{BackingError, TileError};
pub use eviction::{EvictionConfig, EvictionDecision, EvictionScheduler, SweepReport};
pub use standby::{StandbyLists, StandbyRecord, SurfaceId};
pub use surface::{ResizeReport, TileGridConfig, TiledSurface};
pub use tile::{Tile, TileOrigin};

/// Default tile pitch in pixels
pub const DEFAULT_TILE_SIZE: i32 = 256;

/// Default cap on live tiles per surface
pub const DEFAULT_MAX_TILES: usize = 150;
