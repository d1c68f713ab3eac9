/// Bookkeeping for GPU-backed buffers and materials.
///
/// Handles release their slot when dropped, so a surface's resources live
/// exactly as long as the surface that owns them.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Counters {
    buffers: AtomicUsize,
    materials: AtomicUsize,
    buffer_bytes: AtomicUsize,
}

/// Shared counter of live resources, cloned into every handle
#[derive(Debug, Clone, Default)]
pub struct ResourceTracker {
    counters: Arc<Counters>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_buffer(&self, bytes: usize) -> BufferHandle {
        self.counters.buffers.fetch_add(1, Ordering::SeqCst);
        self.counters.buffer_bytes.fetch_add(bytes, Ordering::SeqCst);
        BufferHandle {
            counters: Arc::clone(&self.counters),
            bytes,
        }
    }

    pub fn alloc_material(&self) -> MaterialHandle {
        self.counters.materials.fetch_add(1, Ordering::SeqCst);
        MaterialHandle {
            counters: Arc::clone(&self.counters),
        }
    }

    pub fn live_buffers(&self) -> usize {
        self.counters.buffers.load(Ordering::SeqCst)
    }

    pub fn live_materials(&self) -> usize {
        self.counters.materials.load(Ordering::SeqCst)
    }

    pub fn live_bytes(&self) -> usize {
        self.counters.buffer_bytes.load(Ordering::SeqCst)
    }
}

/// A vertex/index buffer slot
#[derive(Debug)]
pub struct BufferHandle {
    counters: Arc<Counters>,
    bytes: usize,
}

impl BufferHandle {
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Drop for BufferHandle {
    fn drop(&mut self) {
        self.counters.buffers.fetch_sub(1, Ordering::SeqCst);
        self.counters.buffer_bytes.fetch_sub(self.bytes, Ordering::SeqCst);
    }
}

/// A compiled shading configuration slot
#[derive(Debug)]
pub struct MaterialHandle {
    counters: Arc<Counters>,
}

impl Drop for MaterialHandle {
    fn drop(&mut self) {
        self.counters.materials.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_release_on_drop() {
        let tracker = ResourceTracker::new();
        let a = tracker.alloc_buffer(120);
        let b = tracker.alloc_buffer(36);
        let m = tracker.alloc_material();
        assert_eq!(tracker.live_buffers(), 2);
        assert_eq!(tracker.live_bytes(), 156);
        assert_eq!(tracker.live_materials(), 1);

        drop(a);
        assert_eq!(tracker.live_buffers(), 1);
        assert_eq!(tracker.live_bytes(), 36);

        drop((b, m));
        assert_eq!(tracker.live_buffers(), 0);
        assert_eq!(tracker.live_materials(), 0);
    }
}
