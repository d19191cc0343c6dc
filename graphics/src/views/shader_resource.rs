//! Shader resource views over buffers and textures.

use super::validation;
use crate::descriptors::{DescriptorReference, PersistentResViewHeap};
use crate::error::{GraphicsError, GraphicsResult};
use crate::memory::{MemoryObject, MemoryObjectDescriptor};
use crate::resources::{LinearBuffer, Texture1D, Texture2D, Texture3D, TextureCube};
use crate::types::{
    Format, ResourceFlags, ShaderResourceViewDesc, SrvBuffer, SrvDimension, SrvTexture1DArray,
    SrvTexture2DArray, SrvTexture3D, SrvTextureCube,
};

macro_rules! srv_accessors {
    ($name:ident, $resource:ty, $desc:ty) => {
        impl $name {
            /// The viewed resource.
            pub fn resource(&self) -> &$resource {
                &self.resource
            }

            /// Format the shader reads the resource as.
            pub fn format(&self) -> Format {
                self.format
            }

            /// The description relative to the viewed resource.
            pub fn description(&self) -> &$desc {
                &self.desc
            }

            pub fn descriptor(&self) -> &DescriptorReference {
                &self.descriptor
            }
        }
    };
}

/// Shader resource view over a range of buffer elements.
#[derive(Debug)]
pub struct BufferSrv {
    resource: MemoryObjectDescriptor,
    format: Format,
    desc: SrvBuffer,
    descriptor: DescriptorReference,
}

impl BufferSrv {
    /// Create a typed, structured or raw view of `resource`.
    ///
    /// Structured views use [`Format::Unknown`], raw views
    /// [`Format::R32Typeless`].
    pub fn new<B: LinearBuffer>(
        resource: &B,
        heap: &PersistentResViewHeap,
        format: Format,
        desc: SrvBuffer,
    ) -> GraphicsResult<Self> {
        let memory = resource.memory();
        if memory.desc().flags().contains(ResourceFlags::DENY_SHADER_RESOURCE) {
            return Err(GraphicsError::IncompatibleView(
                "buffer was created with DENY_SHADER_RESOURCE".to_string(),
            ));
        }
        let element_size = buffer_element_size(format, &desc)?;
        let end = desc
            .first_element
            .checked_add(u64::from(desc.num_elements))
            .and_then(|count| count.checked_mul(element_size));
        if desc.num_elements == 0 || end.map_or(true, |end| end > memory.size()) {
            return Err(GraphicsError::IncompatibleView(format!(
                "elements {}+{} of {element_size} bytes exceed the {} byte buffer",
                desc.first_element,
                desc.num_elements,
                memory.size()
            )));
        }

        // Sub-allocated buffers share their resource, so elements are counted
        // from the start of the resource rather than the buffer.
        if memory.offset() % element_size != 0 {
            return Err(GraphicsError::IncompatibleView(format!(
                "buffer offset {} is not a multiple of the {element_size} byte element",
                memory.offset()
            )));
        }
        let placed = SrvBuffer {
            first_element: desc.first_element + memory.offset() / element_size,
            ..desc
        };

        let full = ShaderResourceViewDesc {
            format,
            dimension: SrvDimension::Buffer(placed),
        };
        let descriptor = heap.create_srv(memory.handle(), &full)?;
        Ok(Self {
            resource: memory.clone(),
            format,
            desc,
            descriptor,
        })
    }
}

srv_accessors!(BufferSrv, MemoryObjectDescriptor, SrvBuffer);

fn buffer_element_size(format: Format, desc: &SrvBuffer) -> GraphicsResult<u64> {
    if desc.raw {
        if format != Format::R32Typeless || desc.structure_byte_stride != 0 {
            return Err(GraphicsError::IncompatibleView(
                "raw buffer views use R32Typeless without a stride".to_string(),
            ));
        }
        return Ok(4);
    }
    if desc.structure_byte_stride > 0 {
        if format != Format::Unknown {
            return Err(GraphicsError::IncompatibleView(format!(
                "structured buffer views take no format, got {format:?}"
            )));
        }
        return Ok(u64::from(desc.structure_byte_stride));
    }
    if format == Format::Unknown || format.is_typeless() || format.is_depth() {
        return Err(GraphicsError::IncompatibleView(format!(
            "typed buffer view needs a typed color format, got {format:?}"
        )));
    }
    Ok(u64::from(format.bytes_per_pixel()))
}

/// Shader resource view over a 1D texture array.
#[derive(Debug)]
pub struct Texture1DSrv {
    resource: Texture1D,
    format: Format,
    desc: SrvTexture1DArray,
    descriptor: DescriptorReference,
}

impl Texture1DSrv {
    pub fn new(
        resource: &Texture1D,
        heap: &PersistentResViewHeap,
        format: Format,
        desc: SrvTexture1DArray,
    ) -> GraphicsResult<Self> {
        let tex = resource.desc();
        validation::check_shader_readable(format, tex)?;
        validation::check_mip_range(desc.most_detailed_mip, desc.mip_levels, tex)?;
        validation::check_array_range(desc.first_array_slice, desc.array_size, tex)?;

        let full = ShaderResourceViewDesc {
            format,
            dimension: SrvDimension::Texture1DArray(desc),
        };
        let descriptor = heap.create_srv(resource.memory().handle(), &full)?;
        Ok(Self {
            resource: resource.clone(),
            format,
            desc,
            descriptor,
        })
    }
}

srv_accessors!(Texture1DSrv, Texture1D, SrvTexture1DArray);

/// Shader resource view over a 2D texture array.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use strata_graphics::backend::DummyBackend;
/// use strata_graphics::descriptors::PersistentResViewHeap;
/// use strata_graphics::memory::{MemoryManager, ResourceHeapType};
/// use strata_graphics::types::{Format, ResourceFlags, SrvTexture2DArray};
/// use strata_graphics::views::Texture2DSrv;
///
/// let api = Arc::new(DummyBackend::new());
/// let manager = MemoryManager::new(api.clone())?;
/// let heap = PersistentResViewHeap::new(api, 16)?;
/// let texture = manager.create_texture_2d(
///     ResourceHeapType::Critical,
///     256,
///     256,
///     Format::R8G8B8A8Unorm,
///     ResourceFlags::empty(),
///     1,
/// )?;
/// let srv = Texture2DSrv::new(&texture, &heap, texture.format(), SrvTexture2DArray::default())?;
/// assert_eq!(srv.format(), Format::R8G8B8A8Unorm);
/// # Ok::<(), strata_graphics::GraphicsError>(())
/// ```
#[derive(Debug)]
pub struct Texture2DSrv {
    resource: Texture2D,
    format: Format,
    desc: SrvTexture2DArray,
    descriptor: DescriptorReference,
}

impl Texture2DSrv {
    pub fn new(
        resource: &Texture2D,
        heap: &PersistentResViewHeap,
        format: Format,
        desc: SrvTexture2DArray,
    ) -> GraphicsResult<Self> {
        let tex = resource.desc();
        validation::check_shader_readable(format, tex)?;
        validation::check_mip_range(desc.most_detailed_mip, desc.mip_levels, tex)?;
        validation::check_array_range(desc.first_array_slice, desc.array_size, tex)?;
        validation::check_plane_slice(desc.plane_slice)?;

        let full = ShaderResourceViewDesc {
            format,
            dimension: SrvDimension::Texture2DArray(desc),
        };
        let descriptor = heap.create_srv(resource.memory().handle(), &full)?;
        log::trace!(
            "Texture2D SRV {format:?} mips {}+{} layers {}+{} in slot {}",
            desc.most_detailed_mip,
            desc.mip_levels,
            desc.first_array_slice,
            desc.array_size,
            descriptor.slot()
        );
        Ok(Self {
            resource: resource.clone(),
            format,
            desc,
            descriptor,
        })
    }
}

srv_accessors!(Texture2DSrv, Texture2D, SrvTexture2DArray);

/// Shader resource view over the mips of a 3D texture.
#[derive(Debug)]
pub struct Texture3DSrv {
    resource: Texture3D,
    format: Format,
    desc: SrvTexture3D,
    descriptor: DescriptorReference,
}

impl Texture3DSrv {
    pub fn new(
        resource: &Texture3D,
        heap: &PersistentResViewHeap,
        format: Format,
        desc: SrvTexture3D,
    ) -> GraphicsResult<Self> {
        let tex = resource.desc();
        validation::check_shader_readable(format, tex)?;
        validation::check_mip_range(desc.most_detailed_mip, desc.mip_levels, tex)?;

        let full = ShaderResourceViewDesc {
            format,
            dimension: SrvDimension::Texture3D(desc),
        };
        let descriptor = heap.create_srv(resource.memory().handle(), &full)?;
        Ok(Self {
            resource: resource.clone(),
            format,
            desc,
            descriptor,
        })
    }
}

srv_accessors!(Texture3DSrv, Texture3D, SrvTexture3D);

/// Shader resource view sampling all six faces of a cube map.
#[derive(Debug)]
pub struct TextureCubeSrv {
    resource: TextureCube,
    format: Format,
    desc: SrvTextureCube,
    descriptor: DescriptorReference,
}

impl TextureCubeSrv {
    pub fn new(
        resource: &TextureCube,
        heap: &PersistentResViewHeap,
        format: Format,
        desc: SrvTextureCube,
    ) -> GraphicsResult<Self> {
        let tex = resource.desc();
        validation::check_shader_readable(format, tex)?;
        validation::check_mip_range(desc.most_detailed_mip, desc.mip_levels, tex)?;

        let full = ShaderResourceViewDesc {
            format,
            dimension: SrvDimension::TextureCube(desc),
        };
        let descriptor = heap.create_srv(resource.memory().handle(), &full)?;
        Ok(Self {
            resource: resource.clone(),
            format,
            desc,
            descriptor,
        })
    }
}

srv_accessors!(TextureCubeSrv, TextureCube, SrvTextureCube);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_element_sizes() {
        assert_eq!(
            buffer_element_size(Format::R32G32B32A32Float, &SrvBuffer::typed(0, 4)),
            Ok(16)
        );
        assert_eq!(
            buffer_element_size(Format::Unknown, &SrvBuffer::structured(0, 4, 48)),
            Ok(48)
        );
        assert_eq!(
            buffer_element_size(Format::R32Typeless, &SrvBuffer::raw(0, 4)),
            Ok(4)
        );
    }

    #[test]
    fn test_buffer_format_mismatch() {
        assert!(buffer_element_size(Format::Unknown, &SrvBuffer::typed(0, 4)).is_err());
        assert!(buffer_element_size(Format::R32Float, &SrvBuffer::raw(0, 4)).is_err());
        assert!(buffer_element_size(Format::R32Float, &SrvBuffer::structured(0, 4, 16)).is_err());
        assert!(buffer_element_size(Format::R32Typeless, &SrvBuffer::typed(0, 4)).is_err());
    }
}
