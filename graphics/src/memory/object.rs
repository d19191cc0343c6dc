//! Allocations issued by the heaps and the descriptors that share them.
//!
//! An [`Allocation`] is the single physical backing of a resource. Every
//! wrapper copy holds a [`MemoryObjectDescriptor`] pointing at the same
//! `Arc<Allocation>`; when the last one goes away the allocation hands its
//! resource back to the heap that issued it. The heap does not free the
//! memory right away: the release is tagged with the fence of the frame in
//! flight and only becomes reusable once the GPU has passed that fence.

use std::collections::VecDeque;
use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::backend::{GraphicsApi, ResourceHandle};
use crate::types::ResourceDesc;

/// Heap an allocation was issued by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeapCategory {
    /// Long-lived GPU-resident placed resources.
    Critical,
    /// CPU-writable committed resources and staging memory.
    Upload,
    /// Per-frame constants sub-allocated from shared pages.
    VolatileConst,
    /// Constants with a stable address for their whole lifetime.
    PersistentConst,
}

/// Heap a caller can request general resources from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceHeapType {
    /// GPU-resident heap for textures and static buffers.
    Critical,
    /// CPU-writable upload memory, for buffers the CPU rewrites often.
    Upload,
}

/// Fence value of the frame currently being recorded.
///
/// Shared by all heaps of one memory manager.
#[derive(Debug, Default)]
pub(crate) struct FrameFence(AtomicU64);

impl FrameFence {
    pub(crate) fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn set(&self, value: u64) {
        self.0.store(value, Ordering::Release);
    }
}

/// A resource waiting for the GPU before it may be destroyed.
#[derive(Debug)]
pub(crate) struct PendingRelease {
    pub(crate) fence: u64,
    pub(crate) handle: ResourceHandle,
    /// Arena range to give back, for placed resources.
    pub(crate) range: Option<Range<u64>>,
}

/// Fence-ordered queue of resources released by their last owner.
pub(crate) struct PendingReleases {
    frame: Arc<FrameFence>,
    queue: Mutex<VecDeque<PendingRelease>>,
}

impl PendingReleases {
    pub(crate) fn new(frame: Arc<FrameFence>) -> Self {
        Self {
            frame,
            queue: Mutex::new(VecDeque::new()),
        }
    }

    fn push(&self, handle: ResourceHandle, range: Option<Range<u64>>) {
        let fence = self.frame.get();
        log::debug!(
            "Deferring release of resource {} until fence {}",
            handle.raw(),
            fence
        );
        self.queue.lock().push_back(PendingRelease {
            fence,
            handle,
            range,
        });
    }

    /// Remove every release whose fence the GPU has completed.
    pub(crate) fn drain_completed(&self, completed: u64) -> Vec<PendingRelease> {
        let mut queue = self.queue.lock();
        let count = queue
            .iter()
            .take_while(|release| release.fence <= completed)
            .count();
        queue.drain(..count).collect()
    }

    /// Remove every release regardless of its fence.
    pub(crate) fn drain_all(&self) -> Vec<PendingRelease> {
        self.queue.lock().drain(..).collect()
    }

    /// Fence of the most recent release, if any is pending.
    pub(crate) fn newest_fence(&self) -> Option<u64> {
        self.queue.lock().back().map(|release| release.fence)
    }

    /// Fence of the most recent release tagged before `fence`.
    pub(crate) fn newest_fence_before(&self, fence: u64) -> Option<u64> {
        self.queue
            .lock()
            .iter()
            .rev()
            .map(|release| release.fence)
            .find(|&value| value < fence)
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.lock().len()
    }
}

#[derive(Debug, Clone, Copy)]
struct Residency {
    resident: bool,
    lock_count: u32,
}

/// Physical backing of one resource.
pub struct Allocation {
    api: Arc<dyn GraphicsApi>,
    handle: ResourceHandle,
    category: HeapCategory,
    desc: ResourceDesc,
    /// Range inside the heap arena, for placed resources.
    range: Option<Range<u64>>,
    gpu_address: u64,
    residency: Mutex<Residency>,
    /// `None` when the resource belongs to the heap itself.
    owner: Option<Weak<PendingReleases>>,
}

impl Allocation {
    /// Allocation whose resource is released through `owner` when dropped.
    pub(crate) fn owned(
        api: Arc<dyn GraphicsApi>,
        handle: ResourceHandle,
        category: HeapCategory,
        desc: ResourceDesc,
        range: Option<Range<u64>>,
        owner: &Arc<PendingReleases>,
    ) -> Self {
        let gpu_address = match desc {
            ResourceDesc::Buffer { .. } => api.gpu_virtual_address(handle),
            ResourceDesc::Texture(_) => 0,
        };
        Self {
            api,
            handle,
            category,
            desc,
            range,
            gpu_address,
            residency: Mutex::new(Residency {
                resident: true,
                lock_count: 0,
            }),
            owner: Some(Arc::downgrade(owner)),
        }
    }

    /// Allocation borrowing part of a resource owned by a heap.
    pub(crate) fn borrowed(
        api: Arc<dyn GraphicsApi>,
        handle: ResourceHandle,
        category: HeapCategory,
        desc: ResourceDesc,
        gpu_address: u64,
    ) -> Self {
        Self {
            api,
            handle,
            category,
            desc,
            range: None,
            gpu_address,
            residency: Mutex::new(Residency {
                resident: true,
                lock_count: 0,
            }),
            owner: None,
        }
    }

    /// API handle of the backing resource.
    pub fn handle(&self) -> ResourceHandle {
        self.handle
    }

    /// Heap the allocation came from.
    pub fn category(&self) -> HeapCategory {
        self.category
    }

    /// Description the resource was created with.
    pub fn desc(&self) -> &ResourceDesc {
        &self.desc
    }

    /// Range occupied inside the heap arena, for placed resources.
    pub fn heap_range(&self) -> Option<Range<u64>> {
        self.range.clone()
    }

    /// Base GPU virtual address (zero for textures).
    pub fn gpu_address(&self) -> u64 {
        self.gpu_address
    }

    pub(crate) fn api(&self) -> &Arc<dyn GraphicsApi> {
        &self.api
    }

    pub fn is_resident(&self) -> bool {
        self.residency.lock().resident
    }

    pub fn lock_count(&self) -> u32 {
        self.residency.lock().lock_count
    }

    /// Pin the allocation; returns true if it had to be made resident again.
    pub(crate) fn lock_resident(&self) -> bool {
        let mut residency = self.residency.lock();
        residency.lock_count += 1;
        !std::mem::replace(&mut residency.resident, true)
    }

    /// Unpin the allocation; returns false if it was not locked.
    pub(crate) fn unlock_resident(&self) -> bool {
        let mut residency = self.residency.lock();
        if residency.lock_count == 0 {
            return false;
        }
        residency.lock_count -= 1;
        true
    }

    /// Mark the allocation evicted unless it is locked; returns true if it
    /// was resident and unlocked.
    pub(crate) fn try_evict(&self) -> bool {
        let mut residency = self.residency.lock();
        if residency.lock_count > 0 || !residency.resident {
            return false;
        }
        residency.resident = false;
        true
    }
}

impl fmt::Debug for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocation")
            .field("handle", &self.handle)
            .field("category", &self.category)
            .field("range", &self.range)
            .field("residency", &*self.residency.lock())
            .finish_non_exhaustive()
    }
}

impl Drop for Allocation {
    fn drop(&mut self) {
        let Some(owner) = &self.owner else {
            return;
        };
        match owner.upgrade() {
            Some(releases) => releases.push(self.handle, self.range.take()),
            None => {
                log::debug!(
                    "Heap gone, releasing resource {} immediately",
                    self.handle.raw()
                );
                self.api.release_resource(self.handle);
            }
        }
    }
}

/// Shared reference to (part of) an allocation, tagged with its heap.
///
/// Cloning shares the allocation; the heap slot is reclaimed only when the
/// last descriptor referring to it is dropped.
#[derive(Debug, Clone)]
pub struct MemoryObjectDescriptor {
    allocation: Arc<Allocation>,
    offset: u64,
    size: u64,
}

impl MemoryObjectDescriptor {
    pub(crate) fn new(allocation: Arc<Allocation>, offset: u64, size: u64) -> Self {
        Self {
            allocation,
            offset,
            size,
        }
    }

    /// Describe a whole allocation.
    pub(crate) fn whole(allocation: Arc<Allocation>) -> Self {
        let size = allocation.desc().byte_size();
        Self::new(allocation, 0, size)
    }

    pub fn allocation(&self) -> &Arc<Allocation> {
        &self.allocation
    }

    /// API handle of the backing resource.
    pub fn handle(&self) -> ResourceHandle {
        self.allocation.handle()
    }

    /// Heap the memory came from.
    pub fn category(&self) -> HeapCategory {
        self.allocation.category()
    }

    /// Byte offset inside the backing resource.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Description of the backing resource.
    pub fn desc(&self) -> &ResourceDesc {
        self.allocation.desc()
    }

    /// GPU virtual address of the first byte (zero for textures).
    pub fn gpu_virtual_address(&self) -> u64 {
        match self.allocation.desc() {
            ResourceDesc::Buffer { .. } => self.allocation.gpu_address() + self.offset,
            ResourceDesc::Texture(_) => 0,
        }
    }

    pub fn is_resident(&self) -> bool {
        self.allocation.is_resident()
    }

    pub fn lock_count(&self) -> u32 {
        self.allocation.lock_count()
    }

    /// Number of descriptors sharing the allocation.
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.allocation)
    }
}

impl PartialEq for MemoryObjectDescriptor {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.allocation, &other.allocation)
            && self.offset == other.offset
            && self.size == other.size
    }
}

impl Eq for MemoryObjectDescriptor {}

/// Anything backed by heap memory.
pub trait MemoryObject {
    fn memory(&self) -> &MemoryObjectDescriptor;
}

impl MemoryObject for MemoryObjectDescriptor {
    fn memory(&self) -> &MemoryObjectDescriptor {
        self
    }
}

static_assertions::assert_impl_all!(MemoryObjectDescriptor: Send, Sync);
