//! Shared harness for surface tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use vsurf_engine::{
    FrameRequests, ManualClock, Rect, RectF, Region, SharedVisibility, SurfaceConfig,
    SurfaceHost, SurfaceId, SurfaceRegistry, TileUpdateReport, VirtualSurface,
};
use vsurf_tiles::{BackingProbe, MemoryBacking};

pub const WINDOW: RectF = RectF::new(-100_000.0, -100_000.0, 200_000.0, 200_000.0);

pub struct Harness {
    pub surface: VirtualSurface,
    pub registry: SurfaceRegistry,
    pub id: SurfaceId,
    pub clock: ManualClock,
    pub visibility: SharedVisibility,
    pub frames: FrameRequests,
    pub probe: BackingProbe,
    pub fired: Arc<AtomicUsize>,
}

impl Harness {
    pub fn new(width: i32, height: i32) -> Self {
        Self::with_config(SurfaceConfig::default(), width, height)
    }

    pub fn with_config(config: SurfaceConfig, width: i32, height: i32) -> Self {
        let backing = MemoryBacking::new(config.bytes_per_pixel);
        let probe = backing.probe();
        let clock = ManualClock::new(10_000);
        let visibility = SharedVisibility::new();
        let frames = FrameRequests::new();
        let registry = SurfaceRegistry::new();

        let host = SurfaceHost::new(backing, frames.clone(), visibility.clone())
            .with_clock(clock.clone());
        let mut surface = VirtualSurface::new(config, host).unwrap();
        let id = surface.initialize(&registry, width, height, false).unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        surface.register_callbacks(Some(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })));

        Self {
            surface,
            registry,
            id,
            clock,
            visibility,
            frames,
            probe,
            fired,
        }
    }

    pub fn fired(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }

    pub fn show(&self, rect: Rect) {
        self.visibility.set_visible(RectF::from(rect));
    }

    pub fn frame(&mut self) -> bool {
        self.surface.pre_render(WINDOW).unwrap()
    }

    /// Run a frame, plus the full-update frame after an urgent-only one
    pub fn settle(&mut self) -> bool {
        let more = self.frame();
        if self.surface.is_high_priority_mode() {
            return self.frame();
        }
        more
    }

    /// Draw every requested rect through the handle without folding
    pub fn draw_queued(&self) -> usize {
        let handle = self.surface.draw_handle();
        let bounds = self.surface.bounds();
        let mut drawn = 0;
        for rect in self.surface.update_rects() {
            let rect = rect.intersect(&bounds);
            if rect.is_empty() {
                continue;
            }
            handle.begin_draw(rect).unwrap();
            handle.end_draw().unwrap();
            drawn += 1;
        }
        drawn
    }

    /// Redraw every requested rect through the drawing bracket
    ///
    /// Rects cached before a resize are clipped to the current bounds.
    pub fn redraw_all(&mut self) -> TileUpdateReport {
        let handle = self.surface.draw_handle();
        let bounds = self.surface.bounds();
        for rect in self.surface.update_rects().to_vec() {
            let rect = rect.intersect(&bounds);
            if rect.is_empty() {
                continue;
            }
            handle.begin_draw(rect).unwrap();
            handle.end_draw().unwrap();
        }
        self.surface.apply_completed_draws().unwrap()
    }

    pub fn valid(&self) -> Region {
        self.surface.valid_region().cloned().unwrap_or_default()
    }

    /// Rect the update set currently targets
    pub fn target(&self) -> Rect {
        let bounds = self.surface.frame_bounds();
        let wanted = if self.surface.is_high_priority_mode() {
            bounds.high_priority
        } else {
            bounds.desired
        };
        wanted.intersect(&self.surface.bounds())
    }
}
