//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't talk to a GPU. Resources are byte vectors in system
//! memory, descriptor slots remember the last description written into them
//! and the fence is a counter that only moves when [`DummyBackend::signal_fence`]
//! or [`GraphicsApi::wait_for_fence`] is called. That makes the whole memory
//! and view layer testable without GPU hardware.

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::{GraphicsError, GraphicsResult};
use crate::types::{
    ClearValue, ConstantBufferViewDesc, DepthStencilViewDesc, DescriptorHeapDesc, HeapKind,
    RenderTargetViewDesc, ResourceDesc, ShaderResourceViewDesc, TextureDesc, TextureRegion,
};

use super::{DescriptorHeapHandle, GraphicsApi, ResourceHandle, DEFAULT_PLACEMENT_ALIGNMENT};

/// First GPU virtual address handed out.
const GPU_ADDRESS_BASE: u64 = 0x1_0000_0000;

/// Contents of one descriptor slot, as last written.
#[derive(Debug, Clone, PartialEq)]
pub enum DescriptorContents {
    /// Nothing was written yet.
    Empty,
    ConstantBuffer(ConstantBufferViewDesc),
    ShaderResource {
        resource: ResourceHandle,
        desc: ShaderResourceViewDesc,
    },
    RenderTarget {
        resource: ResourceHandle,
        desc: RenderTargetViewDesc,
    },
    DepthStencil {
        resource: ResourceHandle,
        desc: DepthStencilViewDesc,
    },
}

#[derive(Debug)]
struct DummyResource {
    desc: ResourceDesc,
    heap_kind: HeapKind,
    heap_offset: Option<u64>,
    clear_value: Option<ClearValue>,
    gpu_address: u64,
    resident: bool,
    data: Vec<u8>,
}

impl DummyResource {
    fn check_resident(&self, handle: ResourceHandle) -> GraphicsResult<()> {
        if self.resident {
            Ok(())
        } else {
            Err(GraphicsError::Backend(format!(
                "resource {} is evicted",
                handle.raw()
            )))
        }
    }

    fn check_range(&self, offset: u64, size: u64) -> GraphicsResult<std::ops::Range<usize>> {
        let end = offset.checked_add(size).filter(|&end| end <= self.data.len() as u64);
        match end {
            Some(end) => Ok(offset as usize..end as usize),
            None => Err(GraphicsError::Backend(format!(
                "range {offset}+{size} exceeds resource size {}",
                self.data.len()
            ))),
        }
    }

    fn texture(&self) -> GraphicsResult<&TextureDesc> {
        self.desc
            .as_texture()
            .ok_or_else(|| GraphicsError::Backend("resource is not a texture".to_string()))
    }
}

/// Byte offsets of every row of `region` inside a tightly packed subresource.
fn texture_rows(
    texture: &TextureDesc,
    subresource: u32,
    region: TextureRegion,
) -> GraphicsResult<Vec<usize>> {
    if subresource >= texture.subresource_count() {
        return Err(GraphicsError::Backend(format!(
            "subresource {subresource} out of range ({} subresources)",
            texture.subresource_count()
        )));
    }
    let extent = texture.mip_extent(texture.subresource_mip(subresource));
    if !region.fits_within(extent) {
        return Err(GraphicsError::Backend(format!(
            "region {region:?} exceeds subresource extent {extent:?}"
        )));
    }

    let bpp = u64::from(texture.format.bytes_per_pixel());
    let base = texture.subresource_offset(subresource);
    let row_size = u64::from(extent.width) * bpp;
    let slice_size = row_size * u64::from(extent.height);

    let mut rows = Vec::with_capacity((region.extent.height * region.extent.depth) as usize);
    for z in 0..region.extent.depth {
        for y in 0..region.extent.height {
            let offset = base
                + u64::from(region.origin.z + z) * slice_size
                + u64::from(region.origin.y + y) * row_size
                + u64::from(region.origin.x) * bpp;
            rows.push(offset as usize);
        }
    }
    Ok(rows)
}

#[derive(Debug)]
struct DummyDescriptorHeap {
    desc: DescriptorHeapDesc,
    slots: Vec<DescriptorContents>,
}

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    resources: Mutex<HashMap<ResourceHandle, DummyResource>>,
    descriptor_heaps: Mutex<HashMap<DescriptorHeapHandle, DummyDescriptorHeap>>,
    next_handle: AtomicU64,
    next_gpu_address: AtomicU64,
    completed_fence: AtomicU64,
    created_resources: AtomicU64,
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self {
            resources: Mutex::new(HashMap::new()),
            descriptor_heaps: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            next_gpu_address: AtomicU64::new(GPU_ADDRESS_BASE),
            completed_fence: AtomicU64::new(0),
            created_resources: AtomicU64::new(0),
        }
    }

    /// Mark every fence value up to `value` as completed (simulates the GPU).
    pub fn signal_fence(&self, value: u64) {
        log::trace!("DummyBackend: signal fence {}", value);
        self.completed_fence.fetch_max(value, Ordering::AcqRel);
    }

    /// Number of resources currently alive.
    pub fn live_resource_count(&self) -> usize {
        self.resources.lock().len()
    }

    /// Number of resources created since startup.
    pub fn created_resource_count(&self) -> u64 {
        self.created_resources.load(Ordering::Acquire)
    }

    /// Returns true if the resource exists and is resident.
    pub fn is_resident(&self, handle: ResourceHandle) -> bool {
        self.resources
            .lock()
            .get(&handle)
            .is_some_and(|resource| resource.resident)
    }

    /// Returns true if the resource has not been released.
    pub fn is_alive(&self, handle: ResourceHandle) -> bool {
        self.resources.lock().contains_key(&handle)
    }

    /// Description a resource was created with.
    pub fn resource_desc(&self, handle: ResourceHandle) -> Option<ResourceDesc> {
        self.resources.lock().get(&handle).map(|resource| resource.desc)
    }

    /// Heap kind and placement offset of a resource (`None` for committed ones).
    pub fn placement(&self, handle: ResourceHandle) -> Option<(HeapKind, Option<u64>)> {
        self.resources
            .lock()
            .get(&handle)
            .map(|resource| (resource.heap_kind, resource.heap_offset))
    }

    /// Clear value hint a resource was created with.
    pub fn clear_value(&self, handle: ResourceHandle) -> Option<ClearValue> {
        self.resources
            .lock()
            .get(&handle)
            .and_then(|resource| resource.clear_value)
    }

    /// Last description written into a descriptor slot.
    pub fn descriptor_contents(&self, heap: DescriptorHeapHandle, slot: u32) -> DescriptorContents {
        let heaps = self.descriptor_heaps.lock();
        let heap = heaps
            .get(&heap)
            .unwrap_or_else(|| panic!("unknown descriptor heap {}", heap.raw()));
        heap.slots[slot as usize].clone()
    }

    fn allocate_handle(&self) -> ResourceHandle {
        let raw = self.next_handle.fetch_add(1, Ordering::Relaxed);
        ResourceHandle::from_raw(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    fn insert_resource(
        &self,
        desc: &ResourceDesc,
        heap_kind: HeapKind,
        heap_offset: Option<u64>,
        clear_value: Option<&ClearValue>,
    ) -> GraphicsResult<ResourceHandle> {
        if let Some(texture) = desc.as_texture() {
            if heap_kind != HeapKind::Default {
                return Err(GraphicsError::Backend(format!(
                    "textures can not live in {heap_kind:?} heaps"
                )));
            }
            if texture.width == 0 || texture.height == 0 || texture.depth_or_array_size == 0 {
                return Err(GraphicsError::Backend(format!(
                    "invalid texture description {texture:?}"
                )));
            }
        }

        let size = desc.byte_size();
        let reserved = size.max(1).next_multiple_of(DEFAULT_PLACEMENT_ALIGNMENT);
        let gpu_address = self.next_gpu_address.fetch_add(reserved, Ordering::Relaxed);
        let handle = self.allocate_handle();

        self.resources.lock().insert(
            handle,
            DummyResource {
                desc: *desc,
                heap_kind,
                heap_offset,
                clear_value: clear_value.copied(),
                gpu_address,
                resident: true,
                data: vec![0; size as usize],
            },
        );
        self.created_resources.fetch_add(1, Ordering::Relaxed);
        Ok(handle)
    }

    fn with_slot(
        &self,
        heap: DescriptorHeapHandle,
        slot: u32,
        contents: DescriptorContents,
    ) {
        let mut heaps = self.descriptor_heaps.lock();
        let heap = heaps
            .get_mut(&heap)
            .unwrap_or_else(|| panic!("unknown descriptor heap {}", heap.raw()));
        assert!(
            slot < heap.desc.capacity,
            "descriptor slot {slot} out of range for heap {:?}",
            heap.desc.label
        );
        log::trace!("DummyBackend: write slot {} = {:?}", slot, contents);
        heap.slots[slot as usize] = contents;
    }
}

impl GraphicsApi for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn create_placed_resource(
        &self,
        desc: &ResourceDesc,
        heap_kind: HeapKind,
        heap_offset: u64,
        clear_value: Option<&ClearValue>,
    ) -> GraphicsResult<ResourceHandle> {
        log::trace!(
            "DummyBackend: creating placed resource {:?} at {:?}+{}",
            desc,
            heap_kind,
            heap_offset
        );
        self.insert_resource(desc, heap_kind, Some(heap_offset), clear_value)
    }

    fn create_committed_resource(
        &self,
        desc: &ResourceDesc,
        heap_kind: HeapKind,
    ) -> GraphicsResult<ResourceHandle> {
        log::trace!(
            "DummyBackend: creating committed resource {:?} in {:?}",
            desc,
            heap_kind
        );
        self.insert_resource(desc, heap_kind, None, None)
    }

    fn release_resource(&self, handle: ResourceHandle) {
        log::trace!("DummyBackend: releasing resource {}", handle.raw());
        if self.resources.lock().remove(&handle).is_none() {
            panic!("resource {} released twice", handle.raw());
        }
    }

    fn gpu_virtual_address(&self, handle: ResourceHandle) -> u64 {
        self.resources
            .lock()
            .get(&handle)
            .map(|resource| resource.gpu_address)
            .unwrap_or_else(|| panic!("unknown resource {}", handle.raw()))
    }

    fn make_resident(&self, handles: &[ResourceHandle]) -> GraphicsResult<()> {
        let mut resources = self.resources.lock();
        for handle in handles {
            let resource = resources
                .get_mut(handle)
                .ok_or_else(|| GraphicsError::Backend(format!("unknown resource {}", handle.raw())))?;
            resource.resident = true;
        }
        Ok(())
    }

    fn evict(&self, handles: &[ResourceHandle]) {
        let mut resources = self.resources.lock();
        for handle in handles {
            if let Some(resource) = resources.get_mut(handle) {
                resource.resident = false;
            }
        }
    }

    fn write_buffer(&self, handle: ResourceHandle, offset: u64, data: &[u8]) -> GraphicsResult<()> {
        let mut resources = self.resources.lock();
        let resource = resources
            .get_mut(&handle)
            .unwrap_or_else(|| panic!("unknown resource {}", handle.raw()));
        resource.check_resident(handle)?;
        if resource.heap_kind != HeapKind::Upload {
            return Err(GraphicsError::Backend(format!(
                "resource {} is not CPU writable",
                handle.raw()
            )));
        }
        let range = resource.check_range(offset, data.len() as u64)?;
        resource.data[range].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, handle: ResourceHandle, offset: u64, size: u64) -> GraphicsResult<Vec<u8>> {
        let resources = self.resources.lock();
        let resource = resources
            .get(&handle)
            .unwrap_or_else(|| panic!("unknown resource {}", handle.raw()));
        resource.check_resident(handle)?;
        let range = resource.check_range(offset, size)?;
        Ok(resource.data[range].to_vec())
    }

    fn copy_buffer_region(
        &self,
        dst: ResourceHandle,
        dst_offset: u64,
        src: ResourceHandle,
        src_offset: u64,
        size: u64,
    ) -> GraphicsResult<()> {
        let mut resources = self.resources.lock();
        let bytes = {
            let source = resources
                .get(&src)
                .unwrap_or_else(|| panic!("unknown resource {}", src.raw()));
            source.check_resident(src)?;
            let range = source.check_range(src_offset, size)?;
            source.data[range].to_vec()
        };
        let target = resources
            .get_mut(&dst)
            .unwrap_or_else(|| panic!("unknown resource {}", dst.raw()));
        target.check_resident(dst)?;
        let range = target.check_range(dst_offset, size)?;
        target.data[range].copy_from_slice(&bytes);
        Ok(())
    }

    fn copy_buffer_to_texture(
        &self,
        dst: ResourceHandle,
        subresource: u32,
        region: TextureRegion,
        src: ResourceHandle,
        src_offset: u64,
        row_pitch: u32,
    ) -> GraphicsResult<()> {
        let mut resources = self.resources.lock();

        let (rows, row_size) = {
            let target = resources
                .get(&dst)
                .unwrap_or_else(|| panic!("unknown resource {}", dst.raw()));
            target.check_resident(dst)?;
            let texture = target.texture()?;
            let row_size = region.extent.width as usize * texture.format.bytes_per_pixel() as usize;
            (texture_rows(texture, subresource, region)?, row_size)
        };
        if row_size > row_pitch as usize {
            return Err(GraphicsError::Backend(format!(
                "row pitch {row_pitch} smaller than row size {row_size}"
            )));
        }

        let mut staged = Vec::with_capacity(rows.len() * row_size);
        {
            let source = resources
                .get(&src)
                .unwrap_or_else(|| panic!("unknown resource {}", src.raw()));
            source.check_resident(src)?;
            for row in 0..rows.len() as u64 {
                let range = source.check_range(src_offset + row * u64::from(row_pitch), row_size as u64)?;
                staged.extend_from_slice(&source.data[range]);
            }
        }

        let target = resources
            .get_mut(&dst)
            .unwrap_or_else(|| panic!("unknown resource {}", dst.raw()));
        for (offset, chunk) in rows.into_iter().zip(staged.chunks_exact(row_size.max(1))) {
            target.data[offset..offset + row_size].copy_from_slice(chunk);
        }
        Ok(())
    }

    fn read_texture_region(
        &self,
        handle: ResourceHandle,
        subresource: u32,
        region: TextureRegion,
    ) -> GraphicsResult<Vec<u8>> {
        let resources = self.resources.lock();
        let resource = resources
            .get(&handle)
            .unwrap_or_else(|| panic!("unknown resource {}", handle.raw()));
        resource.check_resident(handle)?;
        let texture = resource.texture()?;
        let row_size = region.extent.width as usize * texture.format.bytes_per_pixel() as usize;
        let rows = texture_rows(texture, subresource, region)?;

        let mut out = Vec::with_capacity(rows.len() * row_size);
        for offset in rows {
            out.extend_from_slice(&resource.data[offset..offset + row_size]);
        }
        Ok(out)
    }

    fn create_descriptor_heap(
        &self,
        desc: &DescriptorHeapDesc,
    ) -> GraphicsResult<DescriptorHeapHandle> {
        log::trace!(
            "DummyBackend: creating descriptor heap {:?} ({:?}, {} slots)",
            desc.label,
            desc.kind,
            desc.capacity
        );
        let raw = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let handle = DescriptorHeapHandle::from_raw(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN));
        self.descriptor_heaps.lock().insert(
            handle,
            DummyDescriptorHeap {
                desc: desc.clone(),
                slots: vec![DescriptorContents::Empty; desc.capacity as usize],
            },
        );
        Ok(handle)
    }

    fn release_descriptor_heap(&self, heap: DescriptorHeapHandle) {
        if self.descriptor_heaps.lock().remove(&heap).is_none() {
            panic!("descriptor heap {} released twice", heap.raw());
        }
    }

    fn create_constant_buffer_view(
        &self,
        heap: DescriptorHeapHandle,
        slot: u32,
        desc: &ConstantBufferViewDesc,
    ) {
        self.with_slot(heap, slot, DescriptorContents::ConstantBuffer(*desc));
    }

    fn create_shader_resource_view(
        &self,
        heap: DescriptorHeapHandle,
        slot: u32,
        resource: ResourceHandle,
        desc: &ShaderResourceViewDesc,
    ) {
        self.with_slot(heap, slot, DescriptorContents::ShaderResource { resource, desc: *desc });
    }

    fn create_render_target_view(
        &self,
        heap: DescriptorHeapHandle,
        slot: u32,
        resource: ResourceHandle,
        desc: &RenderTargetViewDesc,
    ) {
        self.with_slot(heap, slot, DescriptorContents::RenderTarget { resource, desc: *desc });
    }

    fn create_depth_stencil_view(
        &self,
        heap: DescriptorHeapHandle,
        slot: u32,
        resource: ResourceHandle,
        desc: &DepthStencilViewDesc,
    ) {
        self.with_slot(heap, slot, DescriptorContents::DepthStencil { resource, desc: *desc });
    }

    fn completed_fence_value(&self) -> u64 {
        self.completed_fence.load(Ordering::Acquire)
    }

    fn wait_for_fence(&self, value: u64) -> GraphicsResult<()> {
        // Nothing runs asynchronously, so the wait completes the fence.
        self.signal_fence(value);
        Ok(())
    }
}

static_assertions::assert_impl_all!(DummyBackend: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Format, ResourceFlags};

    fn upload_buffer(backend: &DummyBackend, size: u64) -> ResourceHandle {
        backend
            .create_committed_resource(&ResourceDesc::buffer(size), HeapKind::Upload)
            .unwrap()
    }

    #[test]
    fn test_dummy_backend_name() {
        assert_eq!(DummyBackend::new().name(), "Dummy");
    }

    #[test]
    fn test_buffer_write_read() {
        let backend = DummyBackend::new();
        let buffer = upload_buffer(&backend, 16);
        backend.write_buffer(buffer, 4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(backend.read_buffer(buffer, 2, 6).unwrap(), vec![0, 0, 1, 2, 3, 4]);
        assert!(backend.write_buffer(buffer, 14, &[0; 4]).is_err());
    }

    #[test]
    fn test_default_heap_is_not_cpu_writable() {
        let backend = DummyBackend::new();
        let buffer = backend
            .create_placed_resource(&ResourceDesc::buffer(16), HeapKind::Default, 0, None)
            .unwrap();
        assert!(backend.write_buffer(buffer, 0, &[1]).is_err());
        assert_eq!(backend.placement(buffer), Some((HeapKind::Default, Some(0))));
    }

    #[test]
    fn test_buffer_to_texture_copy() {
        let backend = DummyBackend::new();
        let desc = ResourceDesc::texture_2d_array(4, 4, Format::R8Unorm, 1, ResourceFlags::empty());
        let texture = backend
            .create_placed_resource(&desc, HeapKind::Default, 0, None)
            .unwrap();
        let staging = upload_buffer(&backend, 512);
        backend.write_buffer(staging, 0, &[1, 2]).unwrap();
        backend.write_buffer(staging, 256, &[3, 4]).unwrap();

        let region = TextureRegion::new_2d(1, 1, 2, 2);
        backend
            .copy_buffer_to_texture(texture, 0, region, staging, 0, 256)
            .unwrap();
        assert_eq!(backend.read_texture_region(texture, 0, region).unwrap(), vec![1, 2, 3, 4]);

        let full = backend
            .read_texture_region(texture, 0, TextureRegion::new_2d(0, 0, 4, 4))
            .unwrap();
        assert_eq!(&full[4..8], &[0, 1, 2, 0]);
        assert_eq!(&full[8..12], &[0, 3, 4, 0]);
    }

    #[test]
    fn test_evicted_resource_is_unusable() {
        let backend = DummyBackend::new();
        let buffer = upload_buffer(&backend, 16);
        backend.evict(&[buffer]);
        assert!(!backend.is_resident(buffer));
        assert!(backend.read_buffer(buffer, 0, 4).is_err());
        backend.make_resident(&[buffer]).unwrap();
        assert!(backend.read_buffer(buffer, 0, 4).is_ok());
    }

    #[test]
    fn test_fence_only_moves_forward() {
        let backend = DummyBackend::new();
        assert_eq!(backend.completed_fence_value(), 0);
        backend.signal_fence(5);
        backend.signal_fence(3);
        assert_eq!(backend.completed_fence_value(), 5);
        backend.wait_for_fence(7).unwrap();
        assert_eq!(backend.completed_fence_value(), 7);
    }

    #[test]
    #[should_panic(expected = "released twice")]
    fn test_double_release_panics() {
        let backend = DummyBackend::new();
        let buffer = upload_buffer(&backend, 16);
        backend.release_resource(buffer);
        backend.release_resource(buffer);
    }
}
