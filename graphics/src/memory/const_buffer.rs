//! Constant buffer memory.
//!
//! Volatile constants are written once and read by the frame being recorded.
//! They are sub-allocated round-robin from fixed-size pages of upload memory;
//! a filled page is retired with the newest fence that used it and comes
//! back once the GPU passed that fence. Persistent constants get a dedicated
//! upload buffer so their address stays stable for their whole lifetime.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{GraphicsApi, ResourceHandle};
use crate::error::{GraphicsError, GraphicsResult};
use crate::types::{HeapKind, ResourceDesc};

use super::object::{Allocation, FrameFence, HeapCategory, MemoryObjectDescriptor, PendingReleases};
use super::ring::align_up;
use super::HeapStats;

/// Placement alignment of constant buffers.
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// Largest constant buffer a view can address (4096 float4 constants).
pub const MAX_CONSTANT_BUFFER_SIZE: u64 = 65536;

#[derive(Debug)]
struct Page {
    handle: ResourceHandle,
    gpu_address: u64,
    last_fence: u64,
}

#[derive(Debug, Default)]
struct VolatilePages {
    current: Option<Page>,
    offset: u64,
    in_flight: VecDeque<Page>,
    free: Vec<Page>,
    count: usize,
}

impl VolatilePages {
    fn retire_completed(&mut self, completed: u64) {
        while self
            .in_flight
            .front()
            .is_some_and(|page| page.last_fence <= completed)
        {
            if let Some(page) = self.in_flight.pop_front() {
                self.free.push(page);
            }
        }
    }
}

/// Heap of volatile and persistent constant buffers.
pub struct ConstBufferHeap {
    api: Arc<dyn GraphicsApi>,
    frame: Arc<FrameFence>,
    page_size: u64,
    volatile: Mutex<VolatilePages>,
    releases: Arc<PendingReleases>,
    persistent_buffers: AtomicUsize,
}

impl ConstBufferHeap {
    pub(crate) fn new(api: Arc<dyn GraphicsApi>, page_size: u64, frame: Arc<FrameFence>) -> Self {
        let page_size = align_up(page_size.max(MAX_CONSTANT_BUFFER_SIZE), CONSTANT_BUFFER_ALIGNMENT);
        log::info!("Created constant buffer heap: {} KiB pages", page_size / 1024);
        Self {
            api,
            releases: Arc::new(PendingReleases::new(frame.clone())),
            frame,
            page_size,
            volatile: Mutex::new(VolatilePages::default()),
            persistent_buffers: AtomicUsize::new(0),
        }
    }

    fn check_size(data: &[u8]) -> GraphicsResult<u64> {
        let size = data.len() as u64;
        if size == 0 {
            return Err(GraphicsError::InvalidArgument(
                "constant buffer data is empty".to_string(),
            ));
        }
        if size > MAX_CONSTANT_BUFFER_SIZE {
            return Err(GraphicsError::InvalidArgument(format!(
                "constant buffer of {size} bytes exceeds the {MAX_CONSTANT_BUFFER_SIZE} byte limit"
            )));
        }
        Ok(align_up(size, CONSTANT_BUFFER_ALIGNMENT))
    }

    /// Sub-allocate a per-frame constant buffer and fill it with `data`.
    ///
    /// The memory is recycled once the current frame fence completes; the
    /// returned descriptor must not be used by later frames.
    pub fn allocate_volatile(&self, data: &[u8]) -> GraphicsResult<MemoryObjectDescriptor> {
        let size = Self::check_size(data)?;
        let fence = self.frame.get();
        let mut pages = self.volatile.lock();

        let fits = pages
            .current
            .as_ref()
            .is_some_and(|_| pages.offset + size <= self.page_size);
        if !fits {
            if let Some(mut full) = pages.current.take() {
                full.last_fence = full.last_fence.max(fence);
                pages.in_flight.push_back(full);
            }
            pages.retire_completed(self.api.completed_fence_value());
            let page = match pages.free.pop() {
                Some(page) => page,
                None => self.create_page(&mut pages)?,
            };
            pages.current = Some(page);
            pages.offset = 0;
        }

        let offset = pages.offset;
        pages.offset += size;
        strata_core::profile_heap_usage!(
            "constant",
            pages.in_flight.len() as u64 * self.page_size + pages.offset,
            pages.count as u64 * self.page_size
        );
        let Some(page) = pages.current.as_mut() else {
            unreachable!("volatile page installed above");
        };
        page.last_fence = page.last_fence.max(fence);
        self.api.write_buffer(page.handle, offset, data)?;

        log::trace!(
            "Volatile constants: {} bytes at page {} + {:#x}",
            size,
            page.handle.raw(),
            offset
        );
        let allocation = Allocation::borrowed(
            self.api.clone(),
            page.handle,
            HeapCategory::VolatileConst,
            ResourceDesc::buffer(self.page_size),
            page.gpu_address,
        );
        Ok(MemoryObjectDescriptor::new(Arc::new(allocation), offset, size))
    }

    fn create_page(&self, pages: &mut VolatilePages) -> GraphicsResult<Page> {
        let handle = self
            .api
            .create_committed_resource(&ResourceDesc::buffer(self.page_size), HeapKind::Upload)?;
        pages.count += 1;
        log::debug!(
            "Constant buffer heap: created volatile page {} ({} pages)",
            handle.raw(),
            pages.count
        );
        Ok(Page {
            handle,
            gpu_address: self.api.gpu_virtual_address(handle),
            last_fence: 0,
        })
    }

    /// Create a constant buffer with a stable address and fill it with `data`.
    pub fn allocate_persistent(&self, data: &[u8]) -> GraphicsResult<MemoryObjectDescriptor> {
        let size = Self::check_size(data)?;
        let desc = ResourceDesc::buffer(size);
        let handle = self.api.create_committed_resource(&desc, HeapKind::Upload)?;
        let allocation = Arc::new(Allocation::owned(
            self.api.clone(),
            handle,
            HeapCategory::PersistentConst,
            desc,
            None,
            &self.releases,
        ));
        // The allocation releases the buffer if the write fails
        self.api.write_buffer(handle, 0, data)?;
        self.persistent_buffers.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "Constant buffer heap: created persistent buffer {} ({} bytes)",
            handle.raw(),
            size
        );
        Ok(MemoryObjectDescriptor::whole(allocation))
    }

    /// Recycle volatile pages and destroy released persistent buffers whose
    /// fence has completed. Returns the number of buffers destroyed.
    pub fn reclaim(&self) -> usize {
        let completed = self.api.completed_fence_value();
        self.volatile.lock().retire_completed(completed);
        let released = self.releases.drain_completed(completed);
        let count = released.len();
        for release in released {
            self.api.release_resource(release.handle);
        }
        self.persistent_buffers.fetch_sub(count, Ordering::Relaxed);
        count
    }

    /// Current usage: pages in use count as used memory.
    pub fn stats(&self) -> HeapStats {
        let pages = self.volatile.lock();
        let busy = pages.in_flight.len() as u64 * self.page_size + pages.offset;
        HeapStats {
            capacity: pages.count as u64 * self.page_size,
            used: busy,
            allocations: self.persistent_buffers.load(Ordering::Relaxed),
            pending_releases: self.releases.len(),
        }
    }

    /// Size of one volatile page.
    pub fn page_size(&self) -> u64 {
        self.page_size
    }
}

impl Drop for ConstBufferHeap {
    fn drop(&mut self) {
        let pages = self.volatile.get_mut();
        let newest = pages
            .in_flight
            .iter()
            .chain(pages.current.iter())
            .map(|page| page.last_fence)
            .chain(self.releases.newest_fence())
            .max();
        if let Some(fence) = newest {
            if let Err(err) = self.api.wait_for_fence(fence) {
                log::error!("Failed to wait for fence {} on heap teardown: {}", fence, err);
            }
        }
        let all_pages = pages
            .current
            .take()
            .into_iter()
            .chain(pages.in_flight.drain(..))
            .chain(pages.free.drain(..));
        for page in all_pages {
            self.api.release_resource(page.handle);
        }
        for release in self.releases.drain_all() {
            self.api.release_resource(release.handle);
        }
        log::info!("Destroyed constant buffer heap");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    fn heap() -> (Arc<DummyBackend>, Arc<FrameFence>, ConstBufferHeap) {
        let backend = Arc::new(DummyBackend::new());
        let frame = Arc::new(FrameFence::default());
        let heap = ConstBufferHeap::new(backend.clone(), 64 * 1024, frame.clone());
        (backend, frame, heap)
    }

    #[test]
    fn test_volatile_buffers_share_a_page() {
        let (backend, _frame, heap) = heap();
        let a = heap.allocate_volatile(&[1; 16]).unwrap();
        let b = heap.allocate_volatile(&[2; 300]).unwrap();

        assert_eq!(a.handle(), b.handle());
        assert_eq!(a.offset(), 0);
        assert_eq!(a.size(), 256);
        assert_eq!(b.offset(), 256);
        assert_eq!(b.size(), 512);
        assert_eq!(b.gpu_virtual_address(), a.gpu_virtual_address() + 256);
        assert_eq!(a.category(), HeapCategory::VolatileConst);
        assert_eq!(backend.read_buffer(b.handle(), 256, 4).unwrap(), vec![2; 4]);
    }

    #[test]
    fn test_volatile_pages_recycled_after_fence() {
        let (backend, frame, heap) = heap();
        frame.set(1);
        let first = heap.allocate_volatile(&[0; 65536]).unwrap();
        let second = heap.allocate_volatile(&[0; 16]).unwrap();
        assert_ne!(first.handle(), second.handle());

        // Frame 1 still running: a third page is needed
        let third = heap.allocate_volatile(&[0; 65536]).unwrap();
        assert_ne!(third.handle(), first.handle());
        assert_eq!(heap.stats().capacity, 3 * 65536);

        backend.signal_fence(1);
        frame.set(2);
        let recycled = heap.allocate_volatile(&[0; 65536]).unwrap();
        let pages = [first.handle(), second.handle(), third.handle()];
        assert!(pages.contains(&recycled.handle()));
        assert_eq!(heap.stats().capacity, 3 * 65536);
    }

    #[test]
    fn test_constant_buffer_size_limits() {
        let (_backend, _frame, heap) = heap();
        assert!(matches!(
            heap.allocate_volatile(&[]),
            Err(GraphicsError::InvalidArgument(_))
        ));
        assert!(matches!(
            heap.allocate_persistent(&vec![0; 65537]),
            Err(GraphicsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_persistent_buffer_lifetime() {
        let (backend, frame, heap) = heap();
        frame.set(1);
        let buffer = heap.allocate_persistent(&[7; 20]).unwrap();
        let handle = buffer.handle();
        assert_eq!(buffer.size(), 256);
        assert_eq!(backend.read_buffer(handle, 0, 20).unwrap(), vec![7; 20]);
        assert_eq!(heap.stats().allocations, 1);

        drop(buffer);
        assert_eq!(heap.reclaim(), 0);
        backend.signal_fence(1);
        assert_eq!(heap.reclaim(), 1);
        assert!(!backend.is_alive(handle));
        assert_eq!(heap.stats().allocations, 0);
    }

    #[test]
    fn test_heap_drop_releases_pages() {
        let (backend, _frame, heap) = heap();
        let volatile = heap.allocate_volatile(&[0; 16]).unwrap();
        drop(heap);
        drop(volatile);
        assert_eq!(backend.live_resource_count(), 0);
    }
}
