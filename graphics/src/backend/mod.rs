//! Graphics API seam.
//!
//! The memory and view layer never talks to a native API directly. Every
//! resource creation, descriptor write, copy and fence query goes through the
//! [`GraphicsApi`] trait, shared as `Arc<dyn GraphicsApi>`.
//!
//! # Available Backends
//!
//! - `dummy` (default): CPU-side implementation used for testing and
//!   development without GPU hardware

pub mod dummy;

use std::num::NonZeroU64;
use std::sync::Arc;

use crate::error::GraphicsResult;
use crate::types::{
    ClearValue, ConstantBufferViewDesc, DepthStencilViewDesc, DescriptorHeapDesc, HeapKind,
    RenderTargetViewDesc, ResourceDesc, ShaderResourceViewDesc, TextureRegion,
};

pub use dummy::{DescriptorContents, DummyBackend};

/// Alignment of placed resources inside a heap (64 KiB).
pub const DEFAULT_PLACEMENT_ALIGNMENT: u64 = 64 * 1024;

/// Opaque handle of a resource created by the graphics API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle(NonZeroU64);

impl ResourceHandle {
    /// Wrap a raw API handle value.
    pub fn from_raw(raw: NonZeroU64) -> Self {
        Self(raw)
    }

    /// Raw API handle value.
    pub fn raw(self) -> u64 {
        self.0.get()
    }
}

/// Opaque handle of a descriptor heap created by the graphics API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorHeapHandle(NonZeroU64);

impl DescriptorHeapHandle {
    /// Wrap a raw API handle value.
    pub fn from_raw(raw: NonZeroU64) -> Self {
        Self(raw)
    }

    /// Raw API handle value.
    pub fn raw(self) -> u64 {
        self.0.get()
    }
}

/// Size and alignment a resource needs inside a heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationInfo {
    pub size: u64,
    pub alignment: u64,
}

/// Upstream graphics API used by the heaps, descriptor heaps and views.
pub trait GraphicsApi: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Heap footprint of a resource.
    fn resource_allocation_info(&self, desc: &ResourceDesc) -> AllocationInfo {
        AllocationInfo {
            size: desc.byte_size().max(1),
            alignment: DEFAULT_PLACEMENT_ALIGNMENT,
        }
    }

    /// Create a resource at `heap_offset` inside an already reserved heap.
    fn create_placed_resource(
        &self,
        desc: &ResourceDesc,
        heap_kind: HeapKind,
        heap_offset: u64,
        clear_value: Option<&ClearValue>,
    ) -> GraphicsResult<ResourceHandle>;

    /// Create a resource with its own implicit heap.
    fn create_committed_resource(
        &self,
        desc: &ResourceDesc,
        heap_kind: HeapKind,
    ) -> GraphicsResult<ResourceHandle>;

    /// Destroy a resource. The GPU must no longer use it.
    fn release_resource(&self, handle: ResourceHandle);

    /// GPU virtual address of a buffer.
    fn gpu_virtual_address(&self, handle: ResourceHandle) -> u64;

    /// Make evicted resources usable again.
    fn make_resident(&self, handles: &[ResourceHandle]) -> GraphicsResult<()>;

    /// Allow the API to page resources out of video memory.
    fn evict(&self, handles: &[ResourceHandle]);

    /// Write CPU data into a CPU-visible buffer.
    fn write_buffer(&self, handle: ResourceHandle, offset: u64, data: &[u8])
        -> GraphicsResult<()>;

    /// Read buffer contents back to the CPU.
    ///
    /// This is a blocking operation that waits for the GPU to finish.
    fn read_buffer(&self, handle: ResourceHandle, offset: u64, size: u64)
        -> GraphicsResult<Vec<u8>>;

    /// Copy a byte range between buffers.
    fn copy_buffer_region(
        &self,
        dst: ResourceHandle,
        dst_offset: u64,
        src: ResourceHandle,
        src_offset: u64,
        size: u64,
    ) -> GraphicsResult<()>;

    /// Copy rows laid out with `row_pitch` bytes from a buffer into a
    /// texture subresource region.
    fn copy_buffer_to_texture(
        &self,
        dst: ResourceHandle,
        subresource: u32,
        region: TextureRegion,
        src: ResourceHandle,
        src_offset: u64,
        row_pitch: u32,
    ) -> GraphicsResult<()>;

    /// Read a texture subresource region back as tightly packed rows.
    fn read_texture_region(
        &self,
        handle: ResourceHandle,
        subresource: u32,
        region: TextureRegion,
    ) -> GraphicsResult<Vec<u8>>;

    /// Create a descriptor heap.
    fn create_descriptor_heap(&self, desc: &DescriptorHeapDesc)
        -> GraphicsResult<DescriptorHeapHandle>;

    /// Destroy a descriptor heap.
    fn release_descriptor_heap(&self, heap: DescriptorHeapHandle);

    /// Write a constant buffer view into a descriptor slot.
    fn create_constant_buffer_view(
        &self,
        heap: DescriptorHeapHandle,
        slot: u32,
        desc: &ConstantBufferViewDesc,
    );

    /// Write a shader resource view into a descriptor slot.
    fn create_shader_resource_view(
        &self,
        heap: DescriptorHeapHandle,
        slot: u32,
        resource: ResourceHandle,
        desc: &ShaderResourceViewDesc,
    );

    /// Write a render target view into a descriptor slot.
    fn create_render_target_view(
        &self,
        heap: DescriptorHeapHandle,
        slot: u32,
        resource: ResourceHandle,
        desc: &RenderTargetViewDesc,
    );

    /// Write a depth-stencil view into a descriptor slot.
    fn create_depth_stencil_view(
        &self,
        heap: DescriptorHeapHandle,
        slot: u32,
        resource: ResourceHandle,
        desc: &DepthStencilViewDesc,
    );

    /// Last fence value the GPU has completed.
    fn completed_fence_value(&self) -> u64;

    /// Block until the GPU completes `value`.
    fn wait_for_fence(&self, value: u64) -> GraphicsResult<()>;
}

/// Selects and creates the appropriate backend based on available features.
pub fn create_backend() -> GraphicsResult<Arc<dyn GraphicsApi>> {
    log::info!("Using Dummy backend");
    Ok(Arc::new(DummyBackend::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_backend() {
        let api = create_backend().unwrap();
        assert_eq!(api.name(), "Dummy");
    }

    #[test]
    fn test_default_allocation_info() {
        let api = create_backend().unwrap();
        let info = api.resource_allocation_info(&ResourceDesc::buffer(100));
        assert_eq!(info.size, 100);
        assert_eq!(info.alignment, DEFAULT_PLACEMENT_ALIGNMENT);
    }
}
