//! Descriptor heap slot management.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{DescriptorHeapHandle, GraphicsApi, ResourceHandle};
use crate::error::{GraphicsError, GraphicsResult};
use crate::types::{
    ConstantBufferViewDesc, DepthStencilViewDesc, DescriptorHeapDesc, DescriptorHeapKind,
    RenderTargetViewDesc, ShaderResourceViewDesc,
};

/// Free slots, most recently freed last.
struct Slots {
    free: Vec<u32>,
    in_use: Vec<bool>,
    next_unused: u32,
}

struct HeapInner {
    api: Arc<dyn GraphicsApi>,
    handle: DescriptorHeapHandle,
    desc: DescriptorHeapDesc,
    slots: Mutex<Slots>,
}

impl HeapInner {
    fn free(&self, slot: u32) {
        let mut slots = self.slots.lock();
        assert!(
            std::mem::replace(&mut slots.in_use[slot as usize], false),
            "descriptor slot {slot} freed twice"
        );
        slots.free.push(slot);
        log::trace!("Descriptor heap {:?}: freed slot {}", self.desc.label, slot);
    }
}

impl Drop for HeapInner {
    fn drop(&mut self) {
        self.api.release_descriptor_heap(self.handle);
    }
}

/// A heap of descriptor slots.
///
/// Slots are handed out lowest first; a freed slot is the next one reused.
pub struct DescriptorHeap {
    inner: Arc<HeapInner>,
}

impl DescriptorHeap {
    /// Create a descriptor heap.
    pub fn new(api: Arc<dyn GraphicsApi>, desc: DescriptorHeapDesc) -> GraphicsResult<Self> {
        if desc.capacity == 0 {
            return Err(GraphicsError::InvalidArgument(
                "descriptor heap capacity must be at least one".to_string(),
            ));
        }
        let handle = api.create_descriptor_heap(&desc)?;
        log::info!(
            "Created {:?} descriptor heap {:?} with {} slots",
            desc.kind,
            desc.label,
            desc.capacity
        );
        let slots = Slots {
            free: Vec::new(),
            in_use: vec![false; desc.capacity as usize],
            next_unused: 0,
        };
        Ok(Self {
            inner: Arc::new(HeapInner {
                api,
                handle,
                desc,
                slots: Mutex::new(slots),
            }),
        })
    }

    /// Take ownership of a free slot.
    pub fn allocate(&self) -> GraphicsResult<DescriptorReference> {
        let mut slots = self.inner.slots.lock();
        let slot = match slots.free.pop() {
            Some(slot) => slot,
            None if slots.next_unused < self.inner.desc.capacity => {
                slots.next_unused += 1;
                slots.next_unused - 1
            }
            None => {
                return Err(GraphicsError::AllocationFailure(format!(
                    "descriptor heap {:?} is full ({} slots)",
                    self.inner.desc.label, self.inner.desc.capacity
                )));
            }
        };
        slots.in_use[slot as usize] = true;
        Ok(DescriptorReference {
            heap: self.inner.clone(),
            slot,
        })
    }

    pub fn kind(&self) -> DescriptorHeapKind {
        self.inner.desc.kind
    }

    pub fn capacity(&self) -> u32 {
        self.inner.desc.capacity
    }

    /// API handle of the heap.
    pub fn handle(&self) -> DescriptorHeapHandle {
        self.inner.handle
    }

    /// Number of slots currently owned by references.
    pub fn allocated_count(&self) -> u32 {
        let slots = self.inner.slots.lock();
        slots.next_unused - slots.free.len() as u32
    }

    fn api(&self) -> &Arc<dyn GraphicsApi> {
        &self.inner.api
    }
}

impl fmt::Debug for DescriptorHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorHeap")
            .field("label", &self.inner.desc.label)
            .field("kind", &self.inner.desc.kind)
            .field("capacity", &self.inner.desc.capacity)
            .field("allocated", &self.allocated_count())
            .finish()
    }
}

/// Exclusive owner of one descriptor slot.
///
/// Not cloneable; dropping it returns the slot to its heap. The reference
/// keeps the heap alive.
pub struct DescriptorReference {
    heap: Arc<HeapInner>,
    slot: u32,
}

impl DescriptorReference {
    /// Index of the slot inside its heap.
    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// API handle of the heap the slot belongs to.
    pub fn heap_handle(&self) -> DescriptorHeapHandle {
        self.heap.handle
    }

    /// Kind of descriptors the slot can hold.
    pub fn kind(&self) -> DescriptorHeapKind {
        self.heap.desc.kind
    }
}

impl fmt::Debug for DescriptorReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorReference")
            .field("heap", &self.heap.desc.label)
            .field("slot", &self.slot)
            .finish()
    }
}

impl Drop for DescriptorReference {
    fn drop(&mut self) {
        self.heap.free(self.slot);
    }
}

/// Shader-visible heap of constant buffer and shader resource views.
#[derive(Debug)]
pub struct PersistentResViewHeap {
    heap: DescriptorHeap,
}

impl PersistentResViewHeap {
    pub fn new(api: Arc<dyn GraphicsApi>, capacity: u32) -> GraphicsResult<Self> {
        let desc = DescriptorHeapDesc::new(DescriptorHeapKind::CbvSrvUav, capacity)
            .with_label("persistent_res_views");
        Ok(Self {
            heap: DescriptorHeap::new(api, desc)?,
        })
    }

    /// Take a slot and write a constant buffer view into it.
    pub fn create_cbv(&self, desc: &ConstantBufferViewDesc) -> GraphicsResult<DescriptorReference> {
        let slot = self.heap.allocate()?;
        log::trace!("Writing CBV into slot {}", slot.slot());
        self.heap
            .api()
            .create_constant_buffer_view(slot.heap_handle(), slot.slot(), desc);
        Ok(slot)
    }

    /// Take a slot and write a shader resource view of `resource` into it.
    pub fn create_srv(
        &self,
        resource: ResourceHandle,
        desc: &ShaderResourceViewDesc,
    ) -> GraphicsResult<DescriptorReference> {
        let slot = self.heap.allocate()?;
        log::trace!("Writing SRV of resource {} into slot {}", resource.raw(), slot.slot());
        self.heap
            .api()
            .create_shader_resource_view(slot.heap_handle(), slot.slot(), resource, desc);
        Ok(slot)
    }

    pub fn heap(&self) -> &DescriptorHeap {
        &self.heap
    }
}

/// Heap of render target views.
#[derive(Debug)]
pub struct RtvHeap {
    heap: DescriptorHeap,
}

impl RtvHeap {
    pub fn new(api: Arc<dyn GraphicsApi>, capacity: u32) -> GraphicsResult<Self> {
        let desc = DescriptorHeapDesc::new(DescriptorHeapKind::Rtv, capacity).with_label("rtv");
        Ok(Self {
            heap: DescriptorHeap::new(api, desc)?,
        })
    }

    /// Take a slot and write a render target view of `resource` into it.
    pub fn create(
        &self,
        resource: ResourceHandle,
        desc: &RenderTargetViewDesc,
    ) -> GraphicsResult<DescriptorReference> {
        let slot = self.heap.allocate()?;
        self.heap
            .api()
            .create_render_target_view(slot.heap_handle(), slot.slot(), resource, desc);
        Ok(slot)
    }

    pub fn heap(&self) -> &DescriptorHeap {
        &self.heap
    }
}

/// Heap of depth-stencil views.
#[derive(Debug)]
pub struct DsvHeap {
    heap: DescriptorHeap,
}

impl DsvHeap {
    pub fn new(api: Arc<dyn GraphicsApi>, capacity: u32) -> GraphicsResult<Self> {
        let desc = DescriptorHeapDesc::new(DescriptorHeapKind::Dsv, capacity).with_label("dsv");
        Ok(Self {
            heap: DescriptorHeap::new(api, desc)?,
        })
    }

    /// Take a slot and write a depth-stencil view of `resource` into it.
    pub fn create(
        &self,
        resource: ResourceHandle,
        desc: &DepthStencilViewDesc,
    ) -> GraphicsResult<DescriptorReference> {
        let slot = self.heap.allocate()?;
        self.heap
            .api()
            .create_depth_stencil_view(slot.heap_handle(), slot.slot(), resource, desc);
        Ok(slot)
    }

    pub fn heap(&self) -> &DescriptorHeap {
        &self.heap
    }
}

static_assertions::assert_impl_all!(DescriptorReference: Send, Sync);
static_assertions::assert_not_impl_any!(DescriptorReference: Clone);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DescriptorContents, DummyBackend};

    fn heap(capacity: u32) -> (Arc<DummyBackend>, DescriptorHeap) {
        let backend = Arc::new(DummyBackend::new());
        let desc = DescriptorHeapDesc::new(DescriptorHeapKind::CbvSrvUav, capacity);
        let heap = DescriptorHeap::new(backend.clone(), desc).unwrap();
        (backend, heap)
    }

    #[test]
    fn test_slots_allocated_in_order() {
        let (_backend, heap) = heap(4);
        let a = heap.allocate().unwrap();
        let b = heap.allocate().unwrap();
        assert_eq!((a.slot(), b.slot()), (0, 1));
        assert_eq!(heap.allocated_count(), 2);
    }

    #[test]
    fn test_freed_slot_reused_first() {
        let (_backend, heap) = heap(4);
        let _a = heap.allocate().unwrap();
        let b = heap.allocate().unwrap();
        let _c = heap.allocate().unwrap();
        drop(b);
        assert_eq!(heap.allocated_count(), 2);
        assert_eq!(heap.allocate().unwrap().slot(), 1);
    }

    #[test]
    fn test_full_heap() {
        let (_backend, heap) = heap(1);
        let slot = heap.allocate().unwrap();
        assert!(matches!(
            heap.allocate(),
            Err(GraphicsError::AllocationFailure(_))
        ));
        drop(slot);
        assert!(heap.allocate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let backend = Arc::new(DummyBackend::new());
        let desc = DescriptorHeapDesc::new(DescriptorHeapKind::Rtv, 0);
        assert!(matches!(
            DescriptorHeap::new(backend, desc),
            Err(GraphicsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_create_cbv_writes_slot() {
        let backend = Arc::new(DummyBackend::new());
        let heap = PersistentResViewHeap::new(backend.clone(), 8).unwrap();
        let desc = ConstantBufferViewDesc {
            gpu_virtual_address: 0x1000,
            size_in_bytes: 256,
        };
        let slot = heap.create_cbv(&desc).unwrap();
        assert_eq!(
            backend.descriptor_contents(slot.heap_handle(), slot.slot()),
            DescriptorContents::ConstantBuffer(desc)
        );
        assert_eq!(slot.kind(), DescriptorHeapKind::CbvSrvUav);
    }

    #[test]
    fn test_reference_outlives_heap_wrapper() {
        let (backend, heap) = heap(2);
        let slot = heap.allocate().unwrap();
        drop(heap);
        // Still valid: the reference keeps the API heap alive
        assert_eq!(
            backend.descriptor_contents(slot.heap_handle(), slot.slot()),
            DescriptorContents::Empty
        );
    }
}
