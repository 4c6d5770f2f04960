//! Drawing Bracket
//!
//! The drawing agent brackets each hardware update with `begin_draw` /
//! `end_draw` through a `DrawHandle`. The draw state is the only state
//! shared between the agent and the surface owner; it sits behind one
//! lock, which the owner also holds while trimming backing allocations.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use vsurf_region::Rect;

use crate::SurfaceError;

#[derive(Debug, Default)]
pub(crate) struct DrawState {
    pub(crate) ready: bool,
    pub(crate) drawing: bool,
    pub(crate) bounds: Rect,
    pub(crate) current: Rect,
    pub(crate) completed: Vec<Rect>,
}

/// Cloneable handle to a surface's drawing bracket
#[derive(Debug, Clone, Default)]
pub struct DrawHandle {
    state: Arc<Mutex<DrawState>>,
}

impl DrawHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, DrawState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start drawing into `rect`
    pub fn begin_draw(&self, rect: Rect) -> Result<(), SurfaceError> {
        let mut state = self.lock();
        if !state.ready {
            return Err(SurfaceError::NotInitialized);
        }
        if state.drawing {
            return Err(SurfaceError::IllegalState("begin_draw while already drawing"));
        }
        if rect.is_empty() || !state.bounds.contains_rect(&rect) {
            return Err(SurfaceError::InvalidArgument {
                rect,
                bounds: state.bounds,
            });
        }
        state.drawing = true;
        state.current = rect;
        Ok(())
    }

    /// Finish the current draw; returns the rect that was drawn
    pub fn end_draw(&self) -> Result<Rect, SurfaceError> {
        let mut state = self.lock();
        if !state.drawing {
            return Err(SurfaceError::IllegalState("end_draw without begin_draw"));
        }
        state.drawing = false;
        let rect = std::mem::take(&mut state.current);
        state.completed.push(rect);
        Ok(rect)
    }

    pub fn is_drawing(&self) -> bool {
        self.lock().drawing
    }

    /// Rects drawn but not yet folded into the cache
    pub fn pending_draws(&self) -> usize {
        self.lock().completed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(bounds: Rect) -> DrawHandle {
        let handle = DrawHandle::new();
        {
            let mut state = handle.lock();
            state.ready = true;
            state.bounds = bounds;
        }
        handle
    }

    #[test]
    fn test_bracket() {
        let handle = ready(Rect::new(0, 0, 512, 512));
        handle.begin_draw(Rect::new(0, 0, 100, 100)).unwrap();
        assert!(handle.is_drawing());
        assert_eq!(
            handle.begin_draw(Rect::new(0, 0, 10, 10)),
            Err(SurfaceError::IllegalState("begin_draw while already drawing"))
        );
        assert_eq!(handle.end_draw(), Ok(Rect::new(0, 0, 100, 100)));
        assert!(!handle.is_drawing());
        assert_eq!(handle.pending_draws(), 1);
        assert!(handle.end_draw().is_err());
    }

    #[test]
    fn test_rejects_outside_rect() {
        let handle = ready(Rect::new(0, 0, 512, 512));
        assert!(matches!(
            handle.begin_draw(Rect::new(500, 0, 100, 100)),
            Err(SurfaceError::InvalidArgument { .. })
        ));
        assert!(!handle.is_drawing());
    }

    #[test]
    fn test_not_ready() {
        let handle = DrawHandle::new();
        assert_eq!(
            handle.begin_draw(Rect::new(0, 0, 1, 1)),
            Err(SurfaceError::NotInitialized)
        );
    }

    #[test]
    fn test_handle_is_send() {
        fn assert_send<T: Send + Sync>() {}
        assert_send::<DrawHandle>();
    }
}
