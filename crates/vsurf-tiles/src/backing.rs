//! Backing Allocations
//!
//! The provider owns the real memory behind each tile (GPU textures in a
//! compositor, plain buffers in the simulator). The cache only keeps the
//! opaque handle it was given.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use vsurf_region::Rect;

use crate::BackingError;

/// Opaque handle to a provider-owned allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocationHandle(pub u64);

/// Provider of tile-sized backing allocations
pub trait BackingProvider: Send {
    /// Allocate storage for a `width` x `height` tile
    ///
    /// When `init_transparent` is set the allocation must read as fully
    /// transparent before any pixel is drawn into it.
    fn allocate(
        &mut self,
        width: i32,
        height: i32,
        init_transparent: bool,
    ) -> Result<AllocationHandle, BackingError>;

    /// Release an allocation
    fn free(&mut self, handle: AllocationHandle);

    /// The logical surface changed size
    fn resize_surface(&mut self, width: i32, height: i32) -> Result<(), BackingError>;

    /// Drop any cached storage that does not back one of `live` rects
    fn trim_to(&mut self, live: &[Rect]);

    /// Report a device loss once; later calls return false until the
    /// next loss
    fn take_device_lost(&mut self) -> bool {
        false
    }
}

// ============================================================================
// In-memory provider
// ============================================================================

/// One call made against a `MemoryBacking`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackingCall {
    Allocate {
        handle: AllocationHandle,
        width: i32,
        height: i32,
        init_transparent: bool,
    },
    Free(AllocationHandle),
    ResizeSurface { width: i32, height: i32 },
    TrimTo(Vec<Rect>),
}

#[derive(Debug, Default)]
struct ProbeState {
    calls: Vec<BackingCall>,
    live: HashMap<AllocationHandle, u64>,
    fail_allocations: bool,
    fail_resizes: bool,
}

/// Shared view into a `MemoryBacking`, usable after the provider has been
/// moved into a surface
#[derive(Debug, Clone, Default)]
pub struct BackingProbe {
    state: Arc<Mutex<ProbeState>>,
    device_lost: Arc<AtomicBool>,
}

impl BackingProbe {
    fn with_state<R>(&self, f: impl FnOnce(&mut ProbeState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Every call recorded so far
    pub fn calls(&self) -> Vec<BackingCall> {
        self.with_state(|s| s.calls.clone())
    }

    pub fn clear_calls(&self) {
        self.with_state(|s| s.calls.clear());
    }

    pub fn allocation_count(&self) -> usize {
        self.with_state(|s| {
            s.calls
                .iter()
                .filter(|c| matches!(c, BackingCall::Allocate { .. }))
                .count()
        })
    }

    pub fn free_count(&self) -> usize {
        self.with_state(|s| s.calls.iter().filter(|c| matches!(c, BackingCall::Free(_))).count())
    }

    /// Allocations handed out and not yet freed
    pub fn live_count(&self) -> usize {
        self.with_state(|s| s.live.len())
    }

    pub fn live_bytes(&self) -> u64 {
        self.with_state(|s| s.live.values().sum())
    }

    /// Simulate a device loss; reported on the next `take_device_lost`
    pub fn lose_device(&self) {
        self.device_lost.store(true, Ordering::SeqCst);
    }

    /// Make every following allocation fail
    pub fn fail_allocations(&self, fail: bool) {
        self.with_state(|s| s.fail_allocations = fail);
    }

    /// Make every following `resize_surface` fail
    pub fn fail_resizes(&self, fail: bool) {
        self.with_state(|s| s.fail_resizes = fail);
    }
}

/// Heap-backed provider that records every call
///
/// Freed pixel buffers are kept in a small pool keyed by byte length and
/// handed out again to later allocations of the same size.
#[derive(Debug)]
pub struct MemoryBacking {
    bytes_per_pixel: u32,
    next_handle: u64,
    buffers: HashMap<AllocationHandle, Vec<u8>>,
    pool: HashMap<usize, Vec<Vec<u8>>>,
    max_pooled_per_size: usize,
    probe: BackingProbe,
}

impl MemoryBacking {
    pub fn new(bytes_per_pixel: u32) -> Self {
        Self {
            bytes_per_pixel,
            next_handle: 1,
            buffers: HashMap::new(),
            pool: HashMap::new(),
            max_pooled_per_size: 8,
            probe: BackingProbe::default(),
        }
    }

    pub fn probe(&self) -> BackingProbe {
        self.probe.clone()
    }

    /// Pixel storage behind a handle
    pub fn buffer(&self, handle: AllocationHandle) -> Option<&[u8]> {
        self.buffers.get(&handle).map(Vec::as_slice)
    }

    pub fn buffer_mut(&mut self, handle: AllocationHandle) -> Option<&mut [u8]> {
        self.buffers.get_mut(&handle).map(Vec::as_mut_slice)
    }

    /// Buffers parked in the pool
    pub fn pooled_buffers(&self) -> usize {
        self.pool.values().map(Vec::len).sum()
    }

    fn checkout(&mut self, len: usize, clear: bool) -> Vec<u8> {
        if let Some(mut buffer) = self.pool.get_mut(&len).and_then(Vec::pop) {
            if clear {
                buffer.fill(0);
            }
            return buffer;
        }
        vec![0u8; len]
    }

    fn checkin(&mut self, buffer: Vec<u8>) {
        let pool = self.pool.entry(buffer.len()).or_default();
        if pool.len() < self.max_pooled_per_size {
            pool.push(buffer);
        }
    }
}

impl Default for MemoryBacking {
    fn default() -> Self {
        Self::new(4)
    }
}

impl BackingProvider for MemoryBacking {
    fn allocate(
        &mut self,
        width: i32,
        height: i32,
        init_transparent: bool,
    ) -> Result<AllocationHandle, BackingError> {
        if self.probe.device_lost.load(Ordering::SeqCst) {
            return Err(BackingError::DeviceLost);
        }
        if self.probe.with_state(|s| s.fail_allocations) {
            return Err(BackingError::AllocationFailed(format!(
                "refused {width}x{height}"
            )));
        }
        if width <= 0 || height <= 0 {
            return Err(BackingError::AllocationFailed(format!(
                "empty size {width}x{height}"
            )));
        }

        let len = width as usize * height as usize * self.bytes_per_pixel as usize;
        let buffer = self.checkout(len, init_transparent);
        let handle = AllocationHandle(self.next_handle);
        self.next_handle += 1;
        self.buffers.insert(handle, buffer);

        self.probe.with_state(|s| {
            s.live.insert(handle, len as u64);
            s.calls.push(BackingCall::Allocate {
                handle,
                width,
                height,
                init_transparent,
            });
        });
        Ok(handle)
    }

    fn free(&mut self, handle: AllocationHandle) {
        if let Some(buffer) = self.buffers.remove(&handle) {
            self.checkin(buffer);
        }
        self.probe.with_state(|s| {
            s.live.remove(&handle);
            s.calls.push(BackingCall::Free(handle));
        });
    }

    fn resize_surface(&mut self, width: i32, height: i32) -> Result<(), BackingError> {
        if self.probe.with_state(|s| s.fail_resizes) {
            return Err(BackingError::AllocationFailed(format!(
                "refused resize to {width}x{height}"
            )));
        }
        self.probe
            .with_state(|s| s.calls.push(BackingCall::ResizeSurface { width, height }));
        Ok(())
    }

    fn trim_to(&mut self, live: &[Rect]) {
        // Pooled buffers no live tile could reuse are dropped
        let sizes: Vec<usize> = live
            .iter()
            .map(|r| r.width as usize * r.height as usize * self.bytes_per_pixel as usize)
            .collect();
        self.pool.retain(|len, _| sizes.contains(len));
        self.probe
            .with_state(|s| s.calls.push(BackingCall::TrimTo(live.to_vec())));
    }

    fn take_device_lost(&mut self) -> bool {
        if !self.probe.device_lost.swap(false, Ordering::SeqCst) {
            return false;
        }
        // Everything allocated before the loss is gone
        self.buffers.clear();
        self.pool.clear();
        self.probe.with_state(|s| s.live.clear());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_free() {
        let mut backing = MemoryBacking::new(4);
        let probe = backing.probe();

        let handle = backing.allocate(256, 128, true).unwrap();
        assert_eq!(backing.buffer(handle).map(<[u8]>::len), Some(256 * 128 * 4));
        assert_eq!(probe.live_count(), 1);
        assert_eq!(probe.live_bytes(), 256 * 128 * 4);

        backing.free(handle);
        assert_eq!(probe.live_count(), 0);
        assert_eq!(backing.pooled_buffers(), 1);
        assert_eq!(probe.free_count(), 1);
    }

    #[test]
    fn test_pooled_buffer_cleared_when_transparent() {
        let mut backing = MemoryBacking::new(4);
        let first = backing.allocate(16, 16, true).unwrap();
        backing.buffer_mut(first).unwrap().fill(0xff);
        backing.free(first);

        let second = backing.allocate(16, 16, true).unwrap();
        assert!(backing.buffer(second).unwrap().iter().all(|&b| b == 0));
        assert_eq!(backing.pooled_buffers(), 0);
    }

    #[test]
    fn test_device_lost_reported_once() {
        let mut backing = MemoryBacking::new(4);
        let probe = backing.probe();
        backing.allocate(16, 16, false).unwrap();

        probe.lose_device();
        assert_eq!(backing.allocate(16, 16, false), Err(BackingError::DeviceLost));
        assert!(backing.take_device_lost());
        assert!(!backing.take_device_lost());
        assert_eq!(probe.live_count(), 0);
        assert!(backing.allocate(16, 16, false).is_ok());
    }

    #[test]
    fn test_refused_resize_is_not_recorded() {
        let mut backing = MemoryBacking::new(4);
        let probe = backing.probe();

        probe.fail_resizes(true);
        assert!(matches!(
            backing.resize_surface(64, 64),
            Err(BackingError::AllocationFailed(_))
        ));
        assert!(probe.calls().is_empty());

        probe.fail_resizes(false);
        assert!(backing.resize_surface(64, 64).is_ok());
        assert_eq!(
            probe.calls(),
            vec![BackingCall::ResizeSurface { width: 64, height: 64 }]
        );
    }

    #[test]
    fn test_trim_drops_unusable_pool_entries() {
        let mut backing = MemoryBacking::new(4);
        let a = backing.allocate(16, 16, false).unwrap();
        let b = backing.allocate(8, 8, false).unwrap();
        backing.free(a);
        backing.free(b);
        assert_eq!(backing.pooled_buffers(), 2);

        backing.trim_to(&[Rect::new(0, 0, 16, 16)]);
        assert_eq!(backing.pooled_buffers(), 1);
    }
}
