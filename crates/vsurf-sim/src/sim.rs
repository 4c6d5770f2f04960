//! Scroll Simulation
//!
//! Drives one or more virtual surfaces through a scripted scroll on a
//! manual clock. Each frame the viewport moves by a fixed step, every
//! requested rect is "redrawn" through the drawing bracket, and
//! off-screen tiles are swept into a shared standby budget.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use vsurf_engine::{
    FrameRequests, ManualClock, SharedVisibility, StandbyLists, SurfaceConfig, SurfaceError,
    SurfaceHost, SurfaceRegistry, VirtualSurface,
};
use vsurf_region::{Rect, RectF};
use vsurf_tiles::{BackingProbe, MemoryBacking};

/// Scroll script parameters
#[derive(Debug, Clone)]
pub struct SimOptions {
    /// Surface size in pixels
    pub width: i32,
    pub height: i32,
    /// Viewport size in pixels
    pub view_width: i32,
    pub view_height: i32,
    pub frames: u32,
    /// Pixels scrolled per frame
    pub step: i32,
    /// Scroll along x instead of y
    pub horizontal: bool,
    pub surfaces: usize,
    /// Milliseconds between frames
    pub frame_ms: u64,
    /// Bytes the standby lists may keep across all surfaces
    pub standby_budget: u64,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            width: 2048,
            height: 16384,
            view_width: 800,
            view_height: 600,
            frames: 600,
            step: 24,
            horizontal: false,
            surfaces: 1,
            frame_ms: 16,
            standby_budget: 16 * 1024 * 1024,
        }
    }
}

/// Totals for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SimReport {
    pub frames: u32,
    pub callbacks: usize,
    pub additional_frames: u32,
    pub rects_drawn: usize,
    pub tiles_created: usize,
    pub tiles_freed: usize,
    /// Part of `tiles_freed` that came from the standby budget
    pub standby_freed: usize,
    pub peak_tile_count: usize,
    pub peak_allocated_bytes: u64,
    pub degraded_frames: u32,
    /// Allocations still live after every surface was dropped
    pub leaked_allocations: usize,
}

struct SimSurface {
    surface: VirtualSurface,
    visibility: SharedVisibility,
    probe: BackingProbe,
    fired: Arc<AtomicUsize>,
    /// Scroll offset along the scroll axis and its direction
    offset: i32,
    forward: bool,
}

pub struct Simulation {
    options: SimOptions,
    clock: ManualClock,
    registry: SurfaceRegistry,
    surfaces: Vec<SimSurface>,
    standby: StandbyLists,
}

impl Simulation {
    pub fn new(config: SurfaceConfig, options: SimOptions) -> Result<Self, SurfaceError> {
        let clock = ManualClock::new(0);
        let registry = SurfaceRegistry::new();
        let standby = StandbyLists::new(config.standby_bucket_count());

        let mut surfaces = Vec::with_capacity(options.surfaces);
        for index in 0..options.surfaces {
            let backing = MemoryBacking::new(config.bytes_per_pixel);
            let probe = backing.probe();
            let visibility = SharedVisibility::new();
            let host = SurfaceHost::new(backing, FrameRequests::new(), visibility.clone())
                .with_clock(clock.clone());

            let mut surface = VirtualSurface::new(config.clone(), host)?;
            surface.initialize(&registry, options.width, options.height, true)?;

            let fired = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&fired);
            surface.register_callbacks(Some(Box::new(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            })));

            surfaces.push(SimSurface {
                surface,
                visibility,
                probe,
                fired,
                offset: index as i32 * options.view_height,
                forward: true,
            });
        }

        Ok(Self {
            options,
            clock,
            registry,
            surfaces,
            standby,
        })
    }

    fn scroll_extent(&self) -> i32 {
        let o = &self.options;
        if o.horizontal {
            (o.width - o.view_width).max(0)
        } else {
            (o.height - o.view_height).max(0)
        }
    }

    fn viewport(&self, offset: i32) -> Rect {
        let o = &self.options;
        if o.horizontal {
            Rect::new(offset, 0, o.view_width, o.view_height)
        } else {
            Rect::new(0, offset, o.view_width, o.view_height)
        }
    }

    /// Run the whole script and tear the surfaces down
    pub fn run(mut self) -> Result<SimReport, SurfaceError> {
        let mut report = SimReport::default();
        for _ in 0..self.options.frames {
            self.step(&mut report)?;
        }

        report.callbacks = self
            .surfaces
            .iter()
            .map(|s| s.fired.load(Ordering::Relaxed))
            .sum();

        let probes: Vec<BackingProbe> = self.surfaces.iter().map(|s| s.probe.clone()).collect();
        self.surfaces.clear();
        report.leaked_allocations = probes.iter().map(BackingProbe::live_count).sum();
        if !self.registry.is_empty() {
            tracing::warn!(active = self.registry.len(), "surfaces still registered");
        }
        Ok(report)
    }

    /// One frame: scroll, pre-render, redraw, sweep, enforce the budget
    pub fn step(&mut self, report: &mut SimReport) -> Result<(), SurfaceError> {
        self.clock.advance(self.options.frame_ms);
        report.frames += 1;

        let extent = self.scroll_extent();
        let step = self.options.step;
        let window = RectF::from(Rect::from_size(self.options.width, self.options.height));
        let mut degraded = false;

        for index in 0..self.surfaces.len() {
            let viewport = self.viewport(self.surfaces[index].offset);
            let sim = &mut self.surfaces[index];
            sim.visibility.set_visible(RectF::from(viewport));

            if sim.surface.pre_render(window)? {
                report.additional_frames += 1;
            }

            let handle = sim.surface.draw_handle();
            for rect in sim.surface.update_rects().to_vec() {
                handle.begin_draw(rect)?;
                handle.end_draw()?;
                report.rects_drawn += 1;
            }
            let updated = sim.surface.apply_completed_draws()?;
            report.tiles_created += updated.tiles_created;
            degraded |= updated.is_degraded();

            // Bounce between the ends of the surface
            let next = if sim.forward { sim.offset + step } else { sim.offset - step };
            if next > extent || next < 0 {
                sim.forward = !sim.forward;
            }
            sim.offset = next.clamp(0, extent);
        }
        if degraded {
            report.degraded_frames += 1;
        }

        self.standby.clear();
        for sim in &mut self.surfaces {
            report.tiles_freed += sim.surface.sweep_tiles(&mut self.standby)?.freed_count();
        }
        for record in self.standby.drain_over_budget(self.options.standby_budget) {
            let Some(sim) = self
                .surfaces
                .iter_mut()
                .find(|s| s.surface.surface_id() == Some(record.surface))
            else {
                continue;
            };
            if sim.surface.free_standby_tile(&record)? {
                report.tiles_freed += 1;
                report.standby_freed += 1;
            }
        }

        let tiles: usize = self.surfaces.iter().map(|s| s.surface.tile_count()).sum();
        let bytes: u64 = self
            .surfaces
            .iter()
            .map(|s| s.surface.stats().allocated_bytes)
            .sum();
        report.peak_tile_count = report.peak_tile_count.max(tiles);
        report.peak_allocated_bytes = report.peak_allocated_bytes.max(bytes);
        tracing::trace!(frame = report.frames, tiles, bytes, "frame done");
        Ok(())
    }
}
