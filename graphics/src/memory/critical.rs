//! GPU-resident heap for long-lived resources.
//!
//! Resources are placed at offsets inside one fixed-size arena. Free space is
//! tracked with a best-fit range allocator; every reservation is rounded up
//! to the placement alignment, so offsets stay aligned without padding.

use std::ops::Range;
use std::sync::Arc;

use parking_lot::Mutex;
use range_alloc::RangeAllocator;

use crate::backend::GraphicsApi;
use crate::error::{GraphicsError, GraphicsResult};
use crate::types::{ClearValue, HeapKind, ResourceDesc};

use super::object::{Allocation, FrameFence, HeapCategory, MemoryObjectDescriptor, PendingReleases};
use super::ring::align_up;
use super::HeapStats;

struct Arena {
    allocator: RangeAllocator<u64>,
    used: u64,
    allocations: usize,
}

/// Heap of placed, GPU-resident resources.
pub struct CriticalHeap {
    api: Arc<dyn GraphicsApi>,
    arena: Mutex<Arena>,
    capacity: u64,
    alignment: u64,
    frame: Arc<FrameFence>,
    releases: Arc<PendingReleases>,
}

impl CriticalHeap {
    /// Create a heap over `capacity` bytes placing resources at multiples of
    /// `alignment`.
    pub(crate) fn new(
        api: Arc<dyn GraphicsApi>,
        capacity: u64,
        alignment: u64,
        frame: Arc<FrameFence>,
    ) -> Self {
        assert!(alignment.is_power_of_two(), "alignment must be a power of 2");
        let capacity = align_up(capacity, alignment);
        log::info!(
            "Created critical heap: {} MiB, placement alignment {} KiB",
            capacity / (1024 * 1024),
            alignment / 1024
        );
        Self {
            api,
            arena: Mutex::new(Arena {
                allocator: RangeAllocator::new(0..capacity),
                used: 0,
                allocations: 0,
            }),
            capacity,
            alignment,
            releases: Arc::new(PendingReleases::new(frame.clone())),
            frame,
        }
    }

    /// Place a resource in the heap.
    pub fn allocate(
        &self,
        desc: &ResourceDesc,
        clear_value: Option<&ClearValue>,
    ) -> GraphicsResult<MemoryObjectDescriptor> {
        strata_core::profile_function!();

        let info = self.api.resource_allocation_info(desc);
        if info.alignment > self.alignment {
            return Err(GraphicsError::AllocationFailure(format!(
                "resource needs {} byte alignment, heap places at {}",
                info.alignment, self.alignment
            )));
        }
        let size = align_up(info.size.max(1), self.alignment);
        let range = self.reserve(size)?;

        let handle = match self.api.create_placed_resource(
            desc,
            HeapKind::Default,
            range.start,
            clear_value,
        ) {
            Ok(handle) => handle,
            Err(err) => {
                self.free(range);
                return Err(err);
            }
        };

        log::debug!(
            "Critical heap: placed resource {} at {:#x} ({} bytes)",
            handle.raw(),
            range.start,
            size
        );
        let allocation = Allocation::owned(
            self.api.clone(),
            handle,
            HeapCategory::Critical,
            *desc,
            Some(range),
            &self.releases,
        );
        Ok(MemoryObjectDescriptor::whole(Arc::new(allocation)))
    }

    fn reserve(&self, size: u64) -> GraphicsResult<Range<u64>> {
        if let Some(range) = self.try_reserve(size) {
            return Ok(range);
        }

        // Space released by frames the GPU already finished
        if self.reclaim() > 0 {
            if let Some(range) = self.try_reserve(size) {
                return Ok(range);
            }
        }

        // Space released by frames still in flight; resources released during
        // the frame being recorded may still be referenced by its commands.
        let waitable = self
            .releases
            .newest_fence_before(self.frame.get())
            .filter(|&fence| fence > self.api.completed_fence_value());
        if let Some(fence) = waitable {
            log::warn!(
                "Critical heap exhausted, waiting for fence {} to reuse released memory",
                fence
            );
            self.api.wait_for_fence(fence)?;
            self.reclaim();
            if let Some(range) = self.try_reserve(size) {
                return Ok(range);
            }
        }

        let arena = self.arena.lock();
        Err(GraphicsError::AllocationFailure(format!(
            "critical heap can not fit {} bytes ({} of {} bytes in use)",
            size, arena.used, self.capacity
        )))
    }

    fn try_reserve(&self, size: u64) -> Option<Range<u64>> {
        let mut arena = self.arena.lock();
        let range = arena.allocator.allocate_range(size).ok()?;
        arena.used += size;
        arena.allocations += 1;
        strata_core::profile_heap_usage!("critical", arena.used, self.capacity);
        Some(range)
    }

    fn free(&self, range: Range<u64>) {
        let mut arena = self.arena.lock();
        arena.used -= range.end - range.start;
        arena.allocations -= 1;
        arena.allocator.free_range(range);
        strata_core::profile_heap_usage!("critical", arena.used, self.capacity);
    }

    /// Destroy released resources whose fence has completed and give their
    /// space back to the arena. Returns the number of resources destroyed.
    pub fn reclaim(&self) -> usize {
        let completed = self.api.completed_fence_value();
        let released = self.releases.drain_completed(completed);
        let count = released.len();
        for release in released {
            self.api.release_resource(release.handle);
            if let Some(range) = release.range {
                self.free(range);
            }
        }
        if count > 0 {
            log::debug!("Critical heap: reclaimed {} resources", count);
        }
        count
    }

    /// Current usage.
    pub fn stats(&self) -> HeapStats {
        let arena = self.arena.lock();
        HeapStats {
            capacity: self.capacity,
            used: arena.used,
            allocations: arena.allocations,
            pending_releases: self.releases.len(),
        }
    }

    /// Placement alignment of the heap.
    pub fn alignment(&self) -> u64 {
        self.alignment
    }
}

impl Drop for CriticalHeap {
    fn drop(&mut self) {
        if let Some(fence) = self.releases.newest_fence() {
            if let Err(err) = self.api.wait_for_fence(fence) {
                log::error!("Failed to wait for fence {} on heap teardown: {}", fence, err);
            }
        }
        for release in self.releases.drain_all() {
            self.api.release_resource(release.handle);
        }
        log::info!("Destroyed critical heap");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::types::{Format, ResourceFlags};

    const KIB: u64 = 1024;

    fn heap(capacity: u64) -> (Arc<DummyBackend>, Arc<FrameFence>, CriticalHeap) {
        let backend = Arc::new(DummyBackend::new());
        let frame = Arc::new(FrameFence::default());
        let heap = CriticalHeap::new(backend.clone(), capacity, 64 * KIB, frame.clone());
        (backend, frame, heap)
    }

    #[test]
    fn test_offsets_follow_allocation_order() {
        let (_backend, _frame, heap) = heap(1024 * KIB);
        let first = heap.allocate(&ResourceDesc::buffer(100), None).unwrap();
        let second = heap.allocate(&ResourceDesc::buffer(70 * KIB), None).unwrap();
        let third = heap.allocate(&ResourceDesc::buffer(1), None).unwrap();

        assert_eq!(first.allocation().heap_range(), Some(0..64 * KIB));
        assert_eq!(second.allocation().heap_range(), Some(64 * KIB..192 * KIB));
        assert_eq!(third.allocation().heap_range(), Some(192 * KIB..256 * KIB));
        assert_eq!(heap.stats().used, 256 * KIB);
        assert_eq!(heap.stats().allocations, 3);
    }

    #[test]
    fn test_clear_value_is_forwarded() {
        let (backend, _frame, heap) = heap(1024 * KIB);
        let desc = ResourceDesc::texture_2d_array(
            16,
            16,
            Format::D32Float,
            1,
            ResourceFlags::ALLOW_DEPTH_STENCIL,
        );
        let clear = ClearValue::depth_stencil(Format::D32Float, 1.0, 0);
        let memory = heap.allocate(&desc, Some(&clear)).unwrap();
        assert_eq!(backend.clear_value(memory.handle()), Some(clear));
    }

    #[test]
    fn test_exhaustion_is_an_error() {
        let (backend, _frame, heap) = heap(128 * KIB);
        let _a = heap.allocate(&ResourceDesc::buffer(64 * KIB), None).unwrap();
        let _b = heap.allocate(&ResourceDesc::buffer(64 * KIB), None).unwrap();
        let created = backend.created_resource_count();

        let err = heap.allocate(&ResourceDesc::buffer(1), None).unwrap_err();
        assert!(matches!(err, GraphicsError::AllocationFailure(_)));
        assert_eq!(backend.created_resource_count(), created);
        assert_eq!(heap.stats().used, 128 * KIB);
    }

    #[test]
    fn test_released_space_waits_for_fence() {
        let (backend, frame, heap) = heap(128 * KIB);
        frame.set(1);
        let a = heap.allocate(&ResourceDesc::buffer(128 * KIB), None).unwrap();
        let handle = a.handle();
        drop(a);

        // Still referenced by frame 1 until the GPU passes it
        assert_eq!(heap.reclaim(), 0);
        assert!(backend.is_alive(handle));
        assert_eq!(heap.stats().pending_releases, 1);

        backend.signal_fence(1);
        assert_eq!(heap.reclaim(), 1);
        assert!(!backend.is_alive(handle));
        assert_eq!(heap.stats().used, 0);
    }

    #[test]
    fn test_exhausted_heap_waits_for_previous_frame() {
        let (backend, frame, heap) = heap(128 * KIB);
        frame.set(1);
        drop(heap.allocate(&ResourceDesc::buffer(128 * KIB), None).unwrap());
        frame.set(2);

        let memory = heap.allocate(&ResourceDesc::buffer(128 * KIB), None).unwrap();
        assert_eq!(backend.completed_fence_value(), 1);
        assert_eq!(memory.allocation().heap_range(), Some(0..128 * KIB));
    }

    #[test]
    fn test_current_frame_releases_are_not_waited_on() {
        let (_backend, frame, heap) = heap(128 * KIB);
        frame.set(1);
        drop(heap.allocate(&ResourceDesc::buffer(128 * KIB), None).unwrap());

        let err = heap.allocate(&ResourceDesc::buffer(64 * KIB), None).unwrap_err();
        assert!(matches!(err, GraphicsError::AllocationFailure(_)));
    }

    #[test]
    fn test_heap_drop_releases_pending() {
        let (backend, frame, heap) = heap(128 * KIB);
        frame.set(4);
        drop(heap.allocate(&ResourceDesc::buffer(KIB), None).unwrap());
        drop(heap);
        assert_eq!(backend.live_resource_count(), 0);
    }
}
