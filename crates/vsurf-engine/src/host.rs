//! Host Interfaces
//!
//! What the surface needs from the world around it: where it is visible,
//! how to ask for another frame, and who to tell when content must be
//! redrawn. Shared in-memory implementations are provided for hosts that
//! drive the surface directly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use vsurf_region::{RectF, Transform2D};

/// One element showing part of the surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityContributor {
    /// Maps element-local coordinates to surface pixels
    pub local_to_surface: Transform2D,
    /// Part of the element that is visible, in element-local coordinates
    pub visible_local: RectF,
}

impl VisibilityContributor {
    /// Contributor whose local space is the surface space
    pub fn surface_rect(visible: RectF) -> Self {
        Self {
            local_to_surface: Transform2D::identity(),
            visible_local: visible,
        }
    }
}

/// Source of per-frame visibility
pub trait VisibilitySource: Send {
    /// False when no live element shows the surface
    fn is_live(&self) -> bool {
        true
    }

    /// Visible contributors for the given window
    fn contributors(&self, window: RectF) -> Vec<VisibilityContributor>;
}

/// Frame scheduling hooks on the host
pub trait FrameScheduler: Send {
    /// Guarantee another pre-render pass after `delay`
    fn request_additional_frame(&self, delay: Duration);

    /// Composed output changed and must be presented again
    fn mark_render_dirty(&self) {}
}

/// Application listener for redraw requests
pub trait SurfaceCallbacks: Send {
    fn updates_needed(&mut self);
}

impl<F: FnMut() + Send> SurfaceCallbacks for F {
    fn updates_needed(&mut self) {
        self()
    }
}

// ============================================================================
// Shared implementations
// ============================================================================

#[derive(Debug)]
struct VisibilityState {
    live: bool,
    contributors: Vec<VisibilityContributor>,
}

/// Visibility set from outside; clones share state
#[derive(Debug, Clone)]
pub struct SharedVisibility {
    state: Arc<Mutex<VisibilityState>>,
}

impl SharedVisibility {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(VisibilityState {
                live: true,
                contributors: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VisibilityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace all contributors with a single surface-space rect
    pub fn set_visible(&self, visible: RectF) {
        self.set_contributors(vec![VisibilityContributor::surface_rect(visible)]);
    }

    pub fn set_contributors(&self, contributors: Vec<VisibilityContributor>) {
        self.lock().contributors = contributors;
    }

    pub fn set_live(&self, live: bool) {
        self.lock().live = live;
    }
}

impl Default for SharedVisibility {
    fn default() -> Self {
        Self::new()
    }
}

impl VisibilitySource for SharedVisibility {
    fn is_live(&self) -> bool {
        self.lock().live
    }

    /// Each contributor is clipped to the window mapped into its local space
    fn contributors(&self, window: RectF) -> Vec<VisibilityContributor> {
        self.lock()
            .contributors
            .iter()
            .filter_map(|c| {
                let visible = match c.local_to_surface.inverse() {
                    Some(inv) if !window.is_empty() => {
                        c.visible_local.intersect(&inv.transform_rect(&window))
                    }
                    _ => c.visible_local,
                };
                (!visible.is_empty()).then_some(VisibilityContributor {
                    local_to_surface: c.local_to_surface,
                    visible_local: visible,
                })
            })
            .collect()
    }
}

/// Scheduler that counts what it was asked to do; clones share counters
#[derive(Debug, Clone, Default)]
pub struct FrameRequests {
    frames: Arc<AtomicUsize>,
    dirty: Arc<AtomicUsize>,
}

impl FrameRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_requested(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn dirty_marks(&self) -> usize {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Return the frame request count and reset it
    pub fn take_frames(&self) -> usize {
        self.frames.swap(0, Ordering::SeqCst)
    }
}

impl FrameScheduler for FrameRequests {
    fn request_additional_frame(&self, _delay: Duration) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }

    fn mark_render_dirty(&self) {
        self.dirty.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_visibility_clips_to_window() {
        let visibility = SharedVisibility::new();
        visibility.set_contributors(vec![VisibilityContributor {
            local_to_surface: Transform2D::translate(100.0, 0.0),
            visible_local: RectF::new(0.0, 0.0, 500.0, 500.0),
        }]);

        let found = visibility.contributors(RectF::new(0.0, 0.0, 200.0, 200.0));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].visible_local, RectF::new(0.0, 0.0, 100.0, 200.0));

        assert!(visibility.contributors(RectF::new(-500.0, 0.0, 100.0, 100.0)).is_empty());
    }

    #[test]
    fn test_closure_callbacks() {
        let mut count = 0;
        {
            let mut callback = || count += 1;
            callback.updates_needed();
            callback.updates_needed();
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn test_frame_requests_shared() {
        let requests = FrameRequests::new();
        let scheduler: Box<dyn FrameScheduler> = Box::new(requests.clone());
        scheduler.request_additional_frame(Duration::ZERO);
        scheduler.mark_render_dirty();
        assert_eq!(requests.frames_requested(), 1);
        assert_eq!(requests.dirty_marks(), 1);
        assert_eq!(requests.take_frames(), 1);
        assert_eq!(requests.frames_requested(), 0);
    }
}
