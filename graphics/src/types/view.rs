//! Descriptions recorded by resource views and written into descriptor slots.

use bitflags::bitflags;

use super::Format;

/// Mip count meaning "every mip from the most detailed one down".
pub const ALL_MIPS: u32 = u32::MAX;

/// Shader resource view over a range of buffer elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SrvBuffer {
    /// Index of the first visible element.
    pub first_element: u64,
    /// Number of visible elements.
    pub num_elements: u32,
    /// Element stride for structured buffers, zero for typed buffers.
    pub structure_byte_stride: u32,
    /// View the buffer as raw 32-bit words.
    pub raw: bool,
}

impl SrvBuffer {
    /// Typed view of `num_elements` elements starting at `first_element`.
    pub fn typed(first_element: u64, num_elements: u32) -> Self {
        Self {
            first_element,
            num_elements,
            ..Default::default()
        }
    }

    /// Structured view with elements of `stride` bytes.
    pub fn structured(first_element: u64, num_elements: u32, stride: u32) -> Self {
        Self {
            first_element,
            num_elements,
            structure_byte_stride: stride,
            raw: false,
        }
    }

    /// Raw view over 32-bit words.
    pub fn raw(first_element: u64, num_elements: u32) -> Self {
        Self {
            first_element,
            num_elements,
            structure_byte_stride: 0,
            raw: true,
        }
    }
}

/// Shader resource view over mips and layers of a 1D texture array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SrvTexture1DArray {
    pub most_detailed_mip: u32,
    /// Number of mips, or [`ALL_MIPS`].
    pub mip_levels: u32,
    pub first_array_slice: u32,
    pub array_size: u32,
    pub resource_min_lod_clamp: f32,
}

impl Default for SrvTexture1DArray {
    fn default() -> Self {
        Self {
            most_detailed_mip: 0,
            mip_levels: ALL_MIPS,
            first_array_slice: 0,
            array_size: 1,
            resource_min_lod_clamp: 0.0,
        }
    }
}

impl SrvTexture1DArray {
    /// Set the visible mip range.
    pub fn with_mips(mut self, most_detailed_mip: u32, mip_levels: u32) -> Self {
        self.most_detailed_mip = most_detailed_mip;
        self.mip_levels = mip_levels;
        self
    }

    /// Set the visible array range.
    pub fn with_array_range(mut self, first_array_slice: u32, array_size: u32) -> Self {
        self.first_array_slice = first_array_slice;
        self.array_size = array_size;
        self
    }
}

/// Shader resource view over mips and layers of a 2D texture array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SrvTexture2DArray {
    pub most_detailed_mip: u32,
    /// Number of mips, or [`ALL_MIPS`].
    pub mip_levels: u32,
    pub first_array_slice: u32,
    pub array_size: u32,
    pub plane_slice: u32,
    pub resource_min_lod_clamp: f32,
}

impl Default for SrvTexture2DArray {
    fn default() -> Self {
        Self {
            most_detailed_mip: 0,
            mip_levels: ALL_MIPS,
            first_array_slice: 0,
            array_size: 1,
            plane_slice: 0,
            resource_min_lod_clamp: 0.0,
        }
    }
}

impl SrvTexture2DArray {
    /// Set the visible mip range.
    pub fn with_mips(mut self, most_detailed_mip: u32, mip_levels: u32) -> Self {
        self.most_detailed_mip = most_detailed_mip;
        self.mip_levels = mip_levels;
        self
    }

    /// Set the visible array range.
    pub fn with_array_range(mut self, first_array_slice: u32, array_size: u32) -> Self {
        self.first_array_slice = first_array_slice;
        self.array_size = array_size;
        self
    }
}

/// Shader resource view over the mips of a 3D texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SrvTexture3D {
    pub most_detailed_mip: u32,
    /// Number of mips, or [`ALL_MIPS`].
    pub mip_levels: u32,
    pub resource_min_lod_clamp: f32,
}

impl Default for SrvTexture3D {
    fn default() -> Self {
        Self {
            most_detailed_mip: 0,
            mip_levels: ALL_MIPS,
            resource_min_lod_clamp: 0.0,
        }
    }
}

/// Shader resource view over the mips of a cube map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SrvTextureCube {
    pub most_detailed_mip: u32,
    /// Number of mips, or [`ALL_MIPS`].
    pub mip_levels: u32,
    pub resource_min_lod_clamp: f32,
}

impl Default for SrvTextureCube {
    fn default() -> Self {
        Self {
            most_detailed_mip: 0,
            mip_levels: ALL_MIPS,
            resource_min_lod_clamp: 0.0,
        }
    }
}

/// Dimension-specific part of a shader resource view description.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SrvDimension {
    Buffer(SrvBuffer),
    Texture1DArray(SrvTexture1DArray),
    Texture2DArray(SrvTexture2DArray),
    Texture3D(SrvTexture3D),
    TextureCube(SrvTextureCube),
}

/// Full shader resource view description.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShaderResourceViewDesc {
    /// Format the shader reads the resource as.
    pub format: Format,
    pub dimension: SrvDimension,
}

/// Render target view over one mip of a range of 2D texture layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RtvTexture2DArray {
    pub mip_slice: u32,
    pub first_array_slice: u32,
    pub array_size: u32,
    pub plane_slice: u32,
}

impl Default for RtvTexture2DArray {
    fn default() -> Self {
        Self {
            mip_slice: 0,
            first_array_slice: 0,
            array_size: 1,
            plane_slice: 0,
        }
    }
}

/// Full render target view description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetViewDesc {
    pub format: Format,
    pub texture: RtvTexture2DArray,
}

bitflags! {
    /// Read-only flags for depth-stencil views.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DsvFlags: u32 {
        /// Depth is bound read-only.
        const READ_ONLY_DEPTH = 1 << 0;
        /// Stencil is bound read-only.
        const READ_ONLY_STENCIL = 1 << 1;
    }
}

/// Depth-stencil view over one mip of a range of 2D texture layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DsvTexture2DArray {
    pub mip_slice: u32,
    pub first_array_slice: u32,
    pub array_size: u32,
}

impl Default for DsvTexture2DArray {
    fn default() -> Self {
        Self {
            mip_slice: 0,
            first_array_slice: 0,
            array_size: 1,
        }
    }
}

/// Full depth-stencil view description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilViewDesc {
    pub format: Format,
    pub flags: DsvFlags,
    pub texture: DsvTexture2DArray,
}

/// Constant buffer view description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstantBufferViewDesc {
    /// GPU address of the first constant.
    pub gpu_virtual_address: u64,
    /// Size of the view, a multiple of the constant buffer alignment.
    pub size_in_bytes: u32,
}

/// Resolve an [`ALL_MIPS`] count against the mips available from
/// `most_detailed_mip` on.
pub fn resolve_mip_count(most_detailed_mip: u32, mip_levels: u32, available: u32) -> u32 {
    if mip_levels == ALL_MIPS {
        available.saturating_sub(most_detailed_mip)
    } else {
        mip_levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srv_defaults_cover_all_mips() {
        let desc = SrvTexture2DArray::default();
        assert_eq!(desc.mip_levels, ALL_MIPS);
        assert_eq!(desc.array_size, 1);
        assert_eq!(resolve_mip_count(0, desc.mip_levels, 9), 9);
        assert_eq!(resolve_mip_count(3, desc.mip_levels, 9), 6);
        assert_eq!(resolve_mip_count(3, 2, 9), 2);
    }

    #[test]
    fn test_srv_builders() {
        let desc = SrvTexture1DArray::default()
            .with_mips(1, 2)
            .with_array_range(3, 4);
        assert_eq!(desc.most_detailed_mip, 1);
        assert_eq!(desc.mip_levels, 2);
        assert_eq!(desc.first_array_slice, 3);
        assert_eq!(desc.array_size, 4);

        let raw = SrvBuffer::raw(0, 16);
        assert!(raw.raw);
        assert_eq!(SrvBuffer::structured(2, 8, 32).structure_byte_stride, 32);
    }
}
