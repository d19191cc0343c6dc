//! GPU memory management.
//!
//! The [`MemoryManager`] owns one heap per [`HeapCategory`] and routes every
//! creation request to the heap matching the resource kind and the requested
//! [`ResourceHeapType`]:
//!
//! - [`CriticalHeap`]: placed, GPU-resident textures and static buffers
//! - [`UploadHeap`]: staging ring for CPU to GPU copies and CPU-writable buffers
//! - [`ConstBufferHeap`]: volatile per-frame and persistent constant buffers
//!
//! Released memory is recycled by fence: call
//! [`MemoryManager::set_frame_fence`] when recording of a new frame starts and
//! [`MemoryManager::reclaim`] once the GPU has made progress.

mod const_buffer;
mod critical;
mod manager;
mod object;
mod ring;
mod upload;

pub use const_buffer::{ConstBufferHeap, CONSTANT_BUFFER_ALIGNMENT, MAX_CONSTANT_BUFFER_SIZE};
pub use critical::CriticalHeap;
pub use manager::{MemoryManager, MemoryManagerConfig, MemoryStats};
pub use object::{Allocation, HeapCategory, MemoryObject, MemoryObjectDescriptor, ResourceHeapType};
pub use ring::{RingAllocation, RingAllocator};
pub use upload::{
    UploadHeap, UploadTarget, UploadTask, TEXTURE_PLACEMENT_ALIGNMENT, TEXTURE_ROW_PITCH_ALIGNMENT,
};

/// Usage snapshot of one heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapStats {
    /// Bytes the heap can hand out.
    pub capacity: u64,
    /// Bytes currently reserved, including memory waiting for a fence.
    pub used: u64,
    /// Resources the heap created that have not been destroyed yet.
    pub allocations: usize,
    /// Released resources waiting for the GPU.
    pub pending_releases: usize,
}
