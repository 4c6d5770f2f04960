//! Surface Registry
//!
//! Host-owned list of active surfaces. Surfaces register during
//! `initialize` and the returned guard unregisters on drop.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use vsurf_tiles::SurfaceId;

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: u64,
    active: BTreeSet<SurfaceId>,
}

/// Registry of active surfaces; clones share the same list
#[derive(Debug, Clone, Default)]
pub struct SurfaceRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue a fresh id and mark it active
    pub fn register(&self) -> Registration {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = SurfaceId(inner.next_id);
        inner.active.insert(id);
        tracing::debug!(surface = id.0, "surface registered");
        Registration {
            id,
            registry: self.clone(),
        }
    }

    pub fn contains(&self, id: SurfaceId) -> bool {
        self.lock().active.contains(&id)
    }

    /// Active ids in registration order
    pub fn active(&self) -> Vec<SurfaceId> {
        self.lock().active.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().active.is_empty()
    }

    fn unregister(&self, id: SurfaceId) {
        if self.lock().active.remove(&id) {
            tracing::debug!(surface = id.0, "surface unregistered");
        }
    }
}

/// Keeps a surface listed in its registry until dropped
#[derive(Debug)]
pub struct Registration {
    id: SurfaceId,
    registry: SurfaceRegistry,
}

impl Registration {
    pub fn id(&self) -> SurfaceId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_drop() {
        let registry = SurfaceRegistry::new();
        let a = registry.register();
        let b = registry.register();
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.active(), vec![a.id(), b.id()]);

        let a_id = a.id();
        drop(a);
        assert!(!registry.contains(a_id));
        assert_eq!(registry.len(), 1);

        drop(b);
        assert!(registry.is_empty());
    }
}
