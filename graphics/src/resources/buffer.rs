//! Buffer resources.

use crate::error::{GraphicsError, GraphicsResult};
use crate::memory::{MemoryObject, MemoryObjectDescriptor};
use crate::types::Format;

/// A resource addressed as a linear range of bytes.
pub trait LinearBuffer: MemoryObject {
    /// Size in bytes.
    fn size(&self) -> u64 {
        self.memory().size()
    }

    /// GPU virtual address of the first byte.
    fn gpu_virtual_address(&self) -> u64 {
        self.memory().gpu_virtual_address()
    }
}

/// A buffer holding shader constants, viewable through a constant buffer view.
pub trait ConstBuffer: LinearBuffer {}

/// A GPU vertex buffer.
///
/// Cloning shares the underlying allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexBuffer {
    memory: MemoryObjectDescriptor,
}

impl VertexBuffer {
    pub(crate) fn new(memory: MemoryObjectDescriptor) -> Self {
        Self { memory }
    }
}

/// A GPU index buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBuffer {
    memory: MemoryObjectDescriptor,
    index_count: u64,
}

impl IndexBuffer {
    pub(crate) fn new(memory: MemoryObjectDescriptor, index_count: u64) -> Self {
        Self {
            memory,
            index_count,
        }
    }

    /// Number of indices the buffer holds.
    pub fn index_count(&self) -> u64 {
        self.index_count
    }

    /// Index format implied by size and count: 16 or 32 bit unsigned.
    pub fn index_format(&self) -> Format {
        if self.memory.size() / self.index_count.max(1) >= 4 {
            Format::R32Uint
        } else {
            Format::R16Uint
        }
    }
}

/// Constants valid for the frame they were created in.
///
/// The backing memory is shared with other volatile constant buffers and is
/// recycled once the frame completes on the GPU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolatileConstBuffer {
    memory: MemoryObjectDescriptor,
}

impl VolatileConstBuffer {
    pub(crate) fn new(memory: MemoryObjectDescriptor) -> Self {
        Self { memory }
    }
}

/// Constants with a stable GPU address for the buffer's whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistentConstBuffer {
    memory: MemoryObjectDescriptor,
}

impl PersistentConstBuffer {
    pub(crate) fn new(memory: MemoryObjectDescriptor) -> Self {
        Self { memory }
    }

    /// Overwrite part of the constants.
    ///
    /// The GPU may still read the previous contents for frames in flight;
    /// callers synchronise through the frame fence.
    pub fn update(&self, offset: u64, data: &[u8]) -> GraphicsResult<()> {
        let end = offset.checked_add(data.len() as u64);
        if end.map_or(true, |end| end > self.memory.size()) {
            return Err(GraphicsError::OutOfBounds(format!(
                "update of {} bytes at {offset} exceeds constant buffer size {}",
                data.len(),
                self.memory.size()
            )));
        }
        let allocation = self.memory.allocation();
        allocation
            .api()
            .write_buffer(allocation.handle(), self.memory.offset() + offset, data)
    }
}

macro_rules! impl_linear_buffer {
    ($($ty:ty),*) => {
        $(
            impl MemoryObject for $ty {
                fn memory(&self) -> &MemoryObjectDescriptor {
                    &self.memory
                }
            }

            impl LinearBuffer for $ty {}
        )*
    };
}

impl_linear_buffer!(VertexBuffer, IndexBuffer, VolatileConstBuffer, PersistentConstBuffer);

impl ConstBuffer for VolatileConstBuffer {}
impl ConstBuffer for PersistentConstBuffer {}

static_assertions::assert_impl_all!(VertexBuffer: Send, Sync);
static_assertions::assert_impl_all!(PersistentConstBuffer: Send, Sync);
