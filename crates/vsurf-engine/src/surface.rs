//! Virtual Surface
//!
//! The orchestrator. Owns the valid region and the tile grid for one
//! logical surface and moves through `Uninitialized -> Ready <-> Drawing`.
//!
//! Per frame the host calls, in order:
//! 1. `pre_render` - bounds, timestamps, update set, application callback
//! 2. drawing through the `DrawHandle` (or `begin_draw`/`end_draw`)
//! 3. `sweep_tiles` - standby filing and frees for off-screen tiles

use std::sync::Arc;
use std::time::Duration;

use vsurf_region::{Rect, RectF, Region};
use vsurf_tiles::{
    BackingProvider, EvictionScheduler, StandbyLists, StandbyRecord, SurfaceId, SweepReport,
    TileError, TileOrigin, TiledSurface,
};

use crate::{
    BoundsCalculator, Clock, DrawHandle, FrameBounds, FrameScheduler, MotionFlags,
    Registration, SurfaceCallbacks, SurfaceConfig, SurfaceError, SurfaceRegistry, SystemClock,
    UpdateSetComputer, VisibilitySource,
};

/// External collaborators of a surface
pub struct SurfaceHost {
    pub provider: Box<dyn BackingProvider>,
    pub scheduler: Box<dyn FrameScheduler>,
    pub visibility: Box<dyn VisibilitySource>,
    pub clock: Arc<dyn Clock>,
}

impl SurfaceHost {
    pub fn new(
        provider: impl BackingProvider + 'static,
        scheduler: impl FrameScheduler + 'static,
        visibility: impl VisibilitySource + 'static,
    ) -> Self {
        Self {
            provider: Box::new(provider),
            scheduler: Box::new(scheduler),
            visibility: Box::new(visibility),
            clock: Arc::new(SystemClock::new()),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }
}

/// Outcome of folding redrawn rects into the cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileUpdateReport {
    pub tiles_created: usize,
    pub tiles_refreshed: usize,
    /// Tiles that could not be created; their area stays invalid
    pub deferred: usize,
}

impl TileUpdateReport {
    pub fn is_degraded(&self) -> bool {
        self.deferred > 0
    }
}

/// Snapshot of a surface's cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceStats {
    pub tile_count: usize,
    pub valid_area: i64,
    pub pending_update_rects: usize,
    pub allocated_bytes: u64,
    pub high_priority_mode: bool,
    pub degraded: bool,
}

struct Cache {
    registration: Registration,
    valid: Region,
    tiles: TiledSurface,
    bounds: FrameBounds,
    updates: UpdateSetComputer,
    high_priority_only: bool,
    resize_follow_up: bool,
    degraded: bool,
}

impl Cache {
    /// Rect the update set must cover in the current mode
    fn target(&self) -> Rect {
        let wanted = if self.high_priority_only {
            self.bounds.high_priority
        } else {
            self.bounds.desired
        };
        wanted.intersect(&self.tiles.bounds())
    }

    fn ensure_computed(&mut self) {
        let target = self.target();
        self.updates.ensure_computed(&self.valid, target);
    }
}

/// Tile cache for one virtual surface
pub struct VirtualSurface {
    config: SurfaceConfig,
    host: SurfaceHost,
    callbacks: Option<Box<dyn SurfaceCallbacks>>,
    draw: DrawHandle,
    calculator: BoundsCalculator,
    eviction: EvictionScheduler,
    is_opaque: bool,
    cache: Option<Cache>,
}

impl VirtualSurface {
    pub fn new(config: SurfaceConfig, host: SurfaceHost) -> Result<Self, SurfaceError> {
        config.validate()?;
        Ok(Self {
            calculator: BoundsCalculator::new(config.tile_size),
            eviction: EvictionScheduler::new(config.eviction_config()),
            config,
            host,
            callbacks: None,
            draw: DrawHandle::new(),
            is_opaque: false,
            cache: None,
        })
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Allocate the cache and register with `registry`
    pub fn initialize(
        &mut self,
        registry: &SurfaceRegistry,
        width: i32,
        height: i32,
        is_opaque: bool,
    ) -> Result<SurfaceId, SurfaceError> {
        if self.cache.is_some() {
            return Err(SurfaceError::AlreadyInitialized);
        }
        if width < 0 || height < 0 {
            return Err(SurfaceError::InvalidArgument {
                rect: Rect::from_size(width, height),
                bounds: Rect::EMPTY,
            });
        }

        let registration = registry.register();
        let id = registration.id();
        self.is_opaque = is_opaque;
        self.cache = Some(Cache {
            registration,
            valid: Region::new(),
            tiles: TiledSurface::new(width, height, self.config.grid_config()),
            bounds: FrameBounds::default(),
            updates: UpdateSetComputer::new(self.config.max_allocation_dimension),
            high_priority_only: true,
            resize_follow_up: false,
            degraded: false,
        });

        {
            let mut draw = self.draw.lock();
            draw.ready = true;
            draw.bounds = Rect::from_size(width, height);
        }

        tracing::info!(surface = id.0, width, height, is_opaque, "virtual surface initialized");
        Ok(id)
    }

    pub fn is_initialized(&self) -> bool {
        self.cache.is_some()
    }

    pub fn surface_id(&self) -> Option<SurfaceId> {
        self.cache.as_ref().map(|c| c.registration.id())
    }

    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    pub fn is_opaque(&self) -> bool {
        self.is_opaque
    }

    /// Surface bounds anchored at the origin
    pub fn bounds(&self) -> Rect {
        self.cache
            .as_ref()
            .map(|c| c.tiles.bounds())
            .unwrap_or(Rect::EMPTY)
    }

    // ========================================================================
    // Owner operations
    // ========================================================================

    /// Mark `rect` as needing a redraw
    ///
    /// Draws completed before this call are folded in first, so they
    /// cannot revalidate the rect afterwards.
    pub fn invalidate(&mut self, rect: Rect) -> Result<(), SurfaceError> {
        let bounds = self
            .cache
            .as_ref()
            .ok_or(SurfaceError::NotInitialized)?
            .tiles
            .bounds();
        if self.draw.is_drawing() {
            return Err(SurfaceError::IllegalState("invalidate while drawing"));
        }
        if rect.is_empty() {
            return Ok(());
        }
        if !bounds.contains_rect(&rect) {
            return Err(SurfaceError::InvalidArgument { rect, bounds });
        }
        self.apply_completed_draws()?;

        let cache = self.cache.as_mut().ok_or(SurfaceError::NotInitialized)?;
        cache.valid.remove(rect);
        cache.updates.mark_stale();
        self.host.scheduler.request_additional_frame(Duration::ZERO);
        tracing::trace!(%rect, "invalidated");
        Ok(())
    }

    /// Per-frame work before composition
    ///
    /// Returns true when the host should schedule another frame.
    pub fn pre_render(&mut self, window: RectF) -> Result<bool, SurfaceError> {
        if self.cache.is_none() {
            return Err(SurfaceError::NotInitialized);
        }
        if self.host.provider.take_device_lost() {
            self.recover_device_lost();
        }
        self.apply_completed_draws()?;

        let now = self.host.clock.now_ms();
        let cache = self.cache.as_mut().ok_or(SurfaceError::NotInitialized)?;
        let previous = cache.bounds;

        if !self.host.visibility.is_live() {
            let detached = FrameBounds::default();
            if detached.desired != previous.desired
                || detached.high_priority != previous.high_priority
            {
                cache.updates.mark_stale();
                tracing::debug!("surface detached; releasing desired area");
            }
            cache.bounds = detached;
            cache.high_priority_only = false;
            return Ok(false);
        }

        let contributors = self.host.visibility.contributors(window);
        let next = self
            .calculator
            .calculate(&contributors, cache.tiles.bounds(), &previous);
        if next.desired != previous.desired || next.high_priority != previous.high_priority {
            cache.updates.mark_stale();
        }
        if next != previous {
            tracing::trace!(
                visible = %next.visible,
                desired = %next.desired,
                high_priority = %next.high_priority,
                motion = ?next.motion,
                "bounds changed"
            );
        }
        cache.bounds = next;
        cache.tiles.touch_within(next.desired, now);

        // Urgent-only mode for the frame the urgent area moved in
        let want_high_priority = next.high_priority != previous.high_priority;
        if want_high_priority != cache.high_priority_only {
            cache.high_priority_only = want_high_priority;
            cache.updates.mark_stale();
            tracing::debug!(high_priority = want_high_priority, "update mode changed");
        }

        let mut want_additional_frame = false;
        if cache.high_priority_only {
            cache.ensure_computed();
            if cache.updates.rects().is_empty() {
                cache.high_priority_only = false;
                cache.updates.mark_stale();
                tracing::debug!("urgent area satisfied; back to full updates");
            } else {
                want_additional_frame = true;
            }
        }

        cache.ensure_computed();
        if let Some(callbacks) = self.callbacks.as_mut() {
            if cache.updates.take_announcement() {
                tracing::trace!(rects = cache.updates.rects().len(), "updates needed");
                callbacks.updates_needed();
            }
        }

        if std::mem::take(&mut cache.resize_follow_up) {
            want_additional_frame = true;
        }

        self.check_invariants();
        Ok(want_additional_frame)
    }

    /// Ensure tiles exist for `rects` and fold them into the valid region
    ///
    /// Called with every rect that was just redrawn. Tiles that cannot be
    /// created (cap reached, allocation refused) leave their area invalid.
    pub fn pre_update_tiles(&mut self, rects: &[Rect]) -> Result<TileUpdateReport, SurfaceError> {
        let now = self.host.clock.now_ms();
        let cache = self.cache.as_mut().ok_or(SurfaceError::NotInitialized)?;
        let pitch = cache.tiles.tile_size();
        let surface_bounds = cache.tiles.bounds();

        let mut report = TileUpdateReport::default();
        let mut device_lost = false;

        'rects: for requested in rects {
            let rect = requested.intersect(&surface_bounds);
            if rect.is_empty() {
                continue;
            }

            for origin in TileOrigin::covering(rect, pitch) {
                let tile_bounds = match cache.tiles.tile_id_at(origin) {
                    Some(id) => match cache.tiles.get_mut(id) {
                        Some(tile) => {
                            tile.touch(now);
                            report.tiles_refreshed += 1;
                            tile.bounds
                        }
                        None => continue,
                    },
                    None => {
                        let cell = origin.cell(pitch).intersect(&surface_bounds);
                        // Partly covered tiles start transparent
                        let init_transparent = !rect.contains_rect(&cell);
                        match cache.tiles.add_tile(
                            origin,
                            now,
                            init_transparent,
                            self.host.provider.as_mut(),
                        ) {
                            Ok(_) => {
                                report.tiles_created += 1;
                                cell
                            }
                            Err(TileError::CapacityReached { .. }) => {
                                report.deferred += 1;
                                continue;
                            }
                            Err(err) if err.is_device_lost() => {
                                device_lost = true;
                                break 'rects;
                            }
                            Err(err) => {
                                tracing::warn!(?origin, %err, "tile allocation failed");
                                report.deferred += 1;
                                continue;
                            }
                        }
                    }
                };
                cache.valid.add(tile_bounds.intersect(&rect));
            }
        }

        cache.updates.mark_stale();
        let degraded = report.is_degraded();
        if degraded && !cache.degraded {
            tracing::warn!(
                deferred = report.deferred,
                cap = cache.tiles.max_tiles(),
                "tile budget exhausted; part of the surface stays unrendered"
            );
        }
        cache.degraded = degraded;

        if device_lost {
            self.recover_device_lost();
        } else {
            self.trim_tiles_if_possible();
        }
        self.check_invariants();
        Ok(report)
    }

    /// Fold rects completed through the `DrawHandle` into the cache
    pub fn apply_completed_draws(&mut self) -> Result<TileUpdateReport, SurfaceError> {
        let completed = std::mem::take(&mut self.draw.lock().completed);
        if completed.is_empty() {
            return Ok(TileUpdateReport::default());
        }
        self.pre_update_tiles(&completed)
    }

    /// Change the surface size
    pub fn resize(&mut self, width: i32, height: i32) -> Result<(), SurfaceError> {
        if self.cache.is_none() {
            return Err(SurfaceError::NotInitialized);
        }
        if self.draw.is_drawing() {
            return Err(SurfaceError::IllegalState("resize while drawing"));
        }
        if width < 0 || height < 0 {
            return Err(SurfaceError::InvalidArgument {
                rect: Rect::from_size(width, height),
                bounds: self.bounds(),
            });
        }
        // Draws finished at the old size land before tiles are clipped
        self.apply_completed_draws()?;

        let draw = self.draw.clone();
        let mut guard = draw.lock();
        if guard.drawing {
            return Err(SurfaceError::IllegalState("resize while drawing"));
        }
        let cache = self.cache.as_mut().ok_or(SurfaceError::NotInitialized)?;
        cache.valid.intersect(Rect::from_size(width, height));
        let resized = cache
            .tiles
            .resize(width, height, &mut cache.valid, self.host.provider.as_mut());

        // The grid takes its new size even when the provider refuses
        guard.bounds = cache.tiles.bounds();
        cache.updates.mark_stale();
        // One frame to clean up, one more to announce the new area
        cache.resize_follow_up = true;
        drop(guard);

        self.host.scheduler.mark_render_dirty();
        self.host.scheduler.request_additional_frame(Duration::ZERO);

        let result = match resized {
            Ok(report) => {
                tracing::info!(
                    width,
                    height,
                    discarded = report.discarded,
                    clipped = report.clipped,
                    "surface resized"
                );
                Ok(())
            }
            Err(err) if err.is_device_lost() => {
                self.recover_device_lost();
                Ok(())
            }
            Err(err) => {
                tracing::warn!(width, height, %err, "backing resize failed");
                Err(err.into())
            }
        };
        self.trim_tiles_if_possible();
        self.check_invariants();
        result
    }

    /// Set or clear the application listener
    pub fn register_callbacks(&mut self, callbacks: Option<Box<dyn SurfaceCallbacks>>) {
        let registering = callbacks.is_some();
        self.callbacks = callbacks;
        if !registering {
            return;
        }
        if let Some(cache) = self.cache.as_mut() {
            cache.updates.mark_stale();
            cache.updates.reset_announcement();
            self.host.scheduler.request_additional_frame(Duration::ZERO);
        }
    }

    // ========================================================================
    // Eviction
    // ========================================================================

    /// File off-screen tiles into `standby` or free them
    pub fn sweep_tiles(&mut self, standby: &mut StandbyLists) -> Result<SweepReport, SurfaceError> {
        let now = self.host.clock.now_ms();
        let cache = self.cache.as_mut().ok_or(SurfaceError::NotInitialized)?;
        let report = self.eviction.sweep(
            cache.registration.id(),
            &mut cache.tiles,
            &mut cache.valid,
            cache.bounds.desired,
            now,
            standby,
        )?;

        if report.freed_count() > 0 {
            cache.updates.mark_stale();
            self.trim_tiles_if_possible();
        }
        self.check_invariants();
        Ok(report)
    }

    /// Free a tile the host picked from the standby lists
    ///
    /// Returns false for records that no longer apply: another surface,
    /// a tile already gone, or one touched again since it was filed.
    pub fn free_standby_tile(&mut self, record: &StandbyRecord) -> Result<bool, SurfaceError> {
        let cache = self.cache.as_mut().ok_or(SurfaceError::NotInitialized)?;
        if record.surface != cache.registration.id() {
            return Ok(false);
        }
        let still_idle = cache.tiles.get(record.tile).is_some_and(|tile| {
            tile.timestamp_ms == record.timestamp_ms
                && !tile.bounds.intersects(&cache.bounds.desired)
        });
        if !still_idle {
            return Ok(false);
        }

        let tile = cache.tiles.free_tile(record.tile)?;
        cache.valid.remove(tile.bounds);
        cache.updates.mark_stale();
        self.trim_tiles_if_possible();
        self.check_invariants();
        Ok(true)
    }

    /// Release freed allocations and trim the provider
    ///
    /// Runs under the draw lock and only while not drawing; skipped after
    /// a device loss. Returns true when a trim happened.
    pub fn trim_tiles_if_possible(&mut self) -> bool {
        if self.cache.is_none() {
            return false;
        }
        if self.host.provider.take_device_lost() {
            self.recover_device_lost();
            return false;
        }

        let draw = self.draw.clone();
        let guard = draw.lock();
        if guard.drawing {
            tracing::trace!("trim deferred while drawing");
            return false;
        }
        let Some(cache) = self.cache.as_mut() else {
            return false;
        };
        if !cache.tiles.has_pending_release() {
            return false;
        }

        let released = cache.tiles.release_pending(self.host.provider.as_mut());
        let live = cache.tiles.enumerate_tile_rects();
        self.host.provider.trim_to(&live);
        drop(guard);

        self.host.scheduler.mark_render_dirty();
        tracing::debug!(released, live = live.len(), "backing trimmed");
        true
    }

    fn recover_device_lost(&mut self) {
        let Some(cache) = self.cache.as_mut() else {
            return;
        };
        // The loss may have surfaced through a failed allocation
        self.host.provider.take_device_lost();
        // Queued draws went to the lost device
        let discarded_draws = std::mem::take(&mut self.draw.lock().completed).len();

        let dropped = cache.tiles.drop_all_tiles();
        cache.valid.clear();
        cache.updates.mark_stale();
        cache.updates.reset_announcement();
        cache.degraded = false;
        self.host.scheduler.request_additional_frame(Duration::ZERO);
        tracing::warn!(
            dropped,
            discarded_draws,
            "backing device lost; whole surface invalidated"
        );
    }

    // ========================================================================
    // Drawing bracket
    // ========================================================================

    /// Handle for the drawing agent
    pub fn draw_handle(&self) -> DrawHandle {
        self.draw.clone()
    }

    pub fn is_drawing(&self) -> bool {
        self.draw.is_drawing()
    }

    pub fn begin_draw(&mut self, rect: Rect) -> Result<(), SurfaceError> {
        self.draw.begin_draw(rect)
    }

    /// End the draw and fold it into the cache right away
    pub fn end_draw(&mut self) -> Result<TileUpdateReport, SurfaceError> {
        self.draw.end_draw()?;
        self.apply_completed_draws()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Number of cached update rects; never recomputes
    pub fn get_update_rect_count(&self) -> usize {
        self.update_rects().len()
    }

    /// Copy cached update rects into `buffer`, zeroing unused slots
    ///
    /// Returns how many rects were written.
    pub fn get_update_rects(&self, buffer: &mut [Rect]) -> usize {
        let rects = self.update_rects();
        let count = rects.len().min(buffer.len());
        buffer[..count].copy_from_slice(&rects[..count]);
        buffer[count..].fill(Rect::EMPTY);
        count
    }

    pub fn update_rects(&self) -> &[Rect] {
        self.cache
            .as_ref()
            .map(|c| c.updates.rects())
            .unwrap_or(&[])
    }

    pub fn get_visible_bounds(&self) -> Rect {
        self.frame_bounds().visible
    }

    pub fn frame_bounds(&self) -> FrameBounds {
        self.cache.as_ref().map(|c| c.bounds).unwrap_or_default()
    }

    pub fn motion(&self) -> MotionFlags {
        self.frame_bounds().motion
    }

    pub fn is_high_priority_mode(&self) -> bool {
        self.cache.as_ref().is_some_and(|c| c.high_priority_only)
    }

    /// True while the last `pre_update_tiles` left area uncovered
    pub fn is_degraded(&self) -> bool {
        self.cache.as_ref().is_some_and(|c| c.degraded)
    }

    pub fn valid_region(&self) -> Option<&Region> {
        self.cache.as_ref().map(|c| &c.valid)
    }

    pub fn tiles(&self) -> Option<&TiledSurface> {
        self.cache.as_ref().map(|c| &c.tiles)
    }

    pub fn tile_count(&self) -> usize {
        self.cache.as_ref().map_or(0, |c| c.tiles.len())
    }

    /// Check that every valid pixel lies on a live tile
    pub fn valid_region_is_covered(&self) -> bool {
        self.cache
            .as_ref()
            .is_none_or(|c| c.valid.is_subset_of(&c.tiles.coverage()))
    }

    pub fn stats(&self) -> SurfaceStats {
        let Some(cache) = self.cache.as_ref() else {
            return SurfaceStats::default();
        };
        SurfaceStats {
            tile_count: cache.tiles.len(),
            valid_area: cache.valid.area(),
            pending_update_rects: cache.updates.rects().len(),
            allocated_bytes: cache.tiles.allocated_bytes(),
            high_priority_mode: cache.high_priority_only,
            degraded: cache.degraded,
        }
    }

    fn check_invariants(&self) {
        if !cfg!(any(debug_assertions, feature = "strict-invariants")) {
            return;
        }
        if self.valid_region_is_covered() {
            return;
        }
        if cfg!(feature = "strict-invariants") {
            panic!("valid region escapes tile coverage");
        }
        tracing::error!("valid region escapes tile coverage");
    }
}

impl Drop for VirtualSurface {
    fn drop(&mut self) {
        let Some(mut cache) = self.cache.take() else {
            return;
        };
        let released = cache.tiles.release_all_tiles();
        cache.tiles.release_pending(self.host.provider.as_mut());
        tracing::info!(
            surface = cache.registration.id().0,
            released,
            "virtual surface torn down"
        );
    }
}
