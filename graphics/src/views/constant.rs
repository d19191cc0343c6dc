//! Constant buffer views.

use crate::descriptors::{DescriptorReference, PersistentResViewHeap};
use crate::error::{GraphicsError, GraphicsResult};
use crate::memory::{MemoryObjectDescriptor, CONSTANT_BUFFER_ALIGNMENT, MAX_CONSTANT_BUFFER_SIZE};
use crate::resources::ConstBuffer;
use crate::types::ConstantBufferViewDesc;

/// A view of a whole volatile or persistent constant buffer.
#[derive(Debug)]
pub struct ConstBufferView {
    resource: MemoryObjectDescriptor,
    desc: ConstantBufferViewDesc,
    descriptor: DescriptorReference,
}

impl ConstBufferView {
    /// Write a constant buffer view of `resource` into a new slot of `heap`.
    pub fn new<B: ConstBuffer>(resource: &B, heap: &PersistentResViewHeap) -> GraphicsResult<Self> {
        let size = resource.size();
        if size == 0 || size > MAX_CONSTANT_BUFFER_SIZE || size % CONSTANT_BUFFER_ALIGNMENT != 0 {
            return Err(GraphicsError::IncompatibleView(format!(
                "constant buffer of {size} bytes is not a multiple of {CONSTANT_BUFFER_ALIGNMENT} up to {MAX_CONSTANT_BUFFER_SIZE}"
            )));
        }
        let desc = ConstantBufferViewDesc {
            gpu_virtual_address: resource.gpu_virtual_address(),
            size_in_bytes: size as u32,
        };
        let descriptor = heap.create_cbv(&desc)?;
        Ok(Self {
            resource: resource.memory().clone(),
            desc,
            descriptor,
        })
    }

    /// Memory of the viewed buffer.
    pub fn resource(&self) -> &MemoryObjectDescriptor {
        &self.resource
    }

    pub fn description(&self) -> ConstantBufferViewDesc {
        self.desc
    }

    pub fn descriptor(&self) -> &DescriptorReference {
        &self.descriptor
    }
}
