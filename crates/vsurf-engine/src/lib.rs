//! vsurf Engine - Virtual Surface Tile Cache
//!
//! Lets an application treat an arbitrarily large surface as fully
//! resident while only a bounded set of tiles is materialized. Each frame
//! the surface works out which area must be valid now, which should be
//! pre-warmed, which idle tiles can go, and exactly which rects the
//! application has to redraw.

mod bounds;
mod clock;
mod config;
mod draw;
mod error;
mod host;
mod registry;
mod surface;
mod updates;

pub use bounds::{BoundsCalculator, FrameBounds, MotionFlags};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SurfaceConfig;
pub use draw::DrawHandle;
pub use error::{ConfigError, SurfaceError};
pub use host::{
    FrameRequests, FrameScheduler, SharedVisibility, SurfaceCallbacks, VisibilityContributor,
    VisibilitySource,
};
pub use registry::{Registration, SurfaceRegistry};
pub use surface::{SurfaceHost, SurfaceStats, TileUpdateReport, VirtualSurface};
pub use updates::{UpdateSetComputer, compute_update_rects, split_rect};

pub use vsurf_region::{Rect, RectF, Region, Transform2D};
pub use vsurf_tiles::{
    BackingError, BackingProvider, MemoryBacking, StandbyLists, StandbyRecord, SurfaceId,
    SweepReport,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
