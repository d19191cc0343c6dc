//! Input assembler views.
//!
//! These views describe how vertex and index buffers are bound for drawing.
//! They own no descriptor slot.

use crate::error::{GraphicsError, GraphicsResult};
use crate::resources::{IndexBuffer, LinearBuffer, VertexBuffer};
use crate::types::Format;

/// Binding of a vertex buffer with a fixed stride.
#[derive(Debug, Clone)]
pub struct VertexBufferView {
    resource: VertexBuffer,
    stride: u32,
    size: u32,
}

impl VertexBufferView {
    /// View the first `size` bytes of `resource` as vertices of `stride` bytes.
    pub fn new(resource: &VertexBuffer, stride: u32, size: u32) -> GraphicsResult<Self> {
        if stride == 0 {
            return Err(GraphicsError::InvalidArgument(
                "vertex stride must be at least one byte".to_string(),
            ));
        }
        if u64::from(size) > resource.size() {
            return Err(GraphicsError::OutOfBounds(format!(
                "vertex view of {size} bytes exceeds the {} byte buffer",
                resource.size()
            )));
        }
        Ok(Self {
            resource: resource.clone(),
            stride,
            size,
        })
    }

    pub fn resource(&self) -> &VertexBuffer {
        &self.resource
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of whole vertices covered by the view.
    pub fn vertex_count(&self) -> u32 {
        self.size / self.stride
    }
}

/// Binding of an index buffer with 16 or 32-bit indices.
#[derive(Debug, Clone)]
pub struct IndexBufferView {
    resource: IndexBuffer,
    format: Format,
    size: u32,
}

impl IndexBufferView {
    pub fn new(resource: &IndexBuffer, format: Format, size: u32) -> GraphicsResult<Self> {
        if !matches!(format, Format::R16Uint | Format::R32Uint) {
            return Err(GraphicsError::InvalidArgument(format!(
                "index format must be R16Uint or R32Uint, got {format:?}"
            )));
        }
        if u64::from(size) > resource.size() {
            return Err(GraphicsError::OutOfBounds(format!(
                "index view of {size} bytes exceeds the {} byte buffer",
                resource.size()
            )));
        }
        Ok(Self {
            resource: resource.clone(),
            format,
            size,
        })
    }

    /// View the whole buffer with the index format implied by its count.
    pub fn whole(resource: &IndexBuffer) -> GraphicsResult<Self> {
        let size = u32::try_from(resource.size()).map_err(|_| {
            GraphicsError::InvalidArgument(format!(
                "index buffer of {} bytes is too large for one view",
                resource.size()
            ))
        })?;
        Self::new(resource, resource.index_format(), size)
    }

    pub fn resource(&self) -> &IndexBuffer {
        &self.resource
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn size(&self) -> u32 {
        self.size
    }
}
