//! Low-level resource descriptions handed to the graphics API.

use bitflags::bitflags;

use super::{Extent3d, Format};

bitflags! {
    /// Usage flags for resources.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceFlags: u32 {
        /// Resource can be bound as a render target.
        const ALLOW_RENDER_TARGET = 1 << 0;
        /// Resource can be bound as a depth-stencil target.
        const ALLOW_DEPTH_STENCIL = 1 << 1;
        /// Resource can be bound for unordered access.
        const ALLOW_UNORDERED_ACCESS = 1 << 2;
        /// Resource can not be read through shader resource views.
        const DENY_SHADER_RESOURCE = 1 << 3;
    }
}

impl Default for ResourceFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Memory pool a resource lives in, as seen by the graphics API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeapKind {
    /// GPU-local memory, not CPU accessible.
    Default,
    /// CPU-writable, GPU-readable memory for staging and constants.
    Upload,
}

/// Dimensionality of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    /// 1D texture (array).
    D1,
    /// 2D texture (array), also used for cube maps.
    D2,
    /// 3D volume texture.
    D3,
}

/// Description of a texture resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    /// Texture dimensionality.
    pub dimension: TextureDimension,
    /// Width in texels.
    pub width: u32,
    /// Height in texels (1 for 1D textures).
    pub height: u32,
    /// Depth for 3D textures, array size otherwise.
    pub depth_or_array_size: u16,
    /// Number of mip levels.
    pub mip_levels: u16,
    /// Pixel format.
    pub format: Format,
    /// Usage flags.
    pub flags: ResourceFlags,
}

impl TextureDesc {
    /// Number of array layers (1 for 3D textures).
    pub fn array_size(&self) -> u32 {
        match self.dimension {
            TextureDimension::D3 => 1,
            _ => u32::from(self.depth_or_array_size),
        }
    }

    /// Depth in texels (1 for 1D and 2D textures).
    pub fn depth(&self) -> u32 {
        match self.dimension {
            TextureDimension::D3 => u32::from(self.depth_or_array_size),
            _ => 1,
        }
    }

    /// Size of the top mip level.
    pub fn extent(&self) -> Extent3d {
        Extent3d::new(self.width, self.height, self.depth())
    }

    /// Size of mip level `mip`.
    pub fn mip_extent(&self, mip: u32) -> Extent3d {
        let shrink = |size: u32| (size >> mip.min(31)).max(1);
        Extent3d::new(shrink(self.width), shrink(self.height), shrink(self.depth()))
    }

    /// Total number of subresources (mips times array layers).
    pub fn subresource_count(&self) -> u32 {
        u32::from(self.mip_levels) * self.array_size()
    }

    /// Index of the subresource at `mip` in array layer `array_index`.
    pub fn subresource_index(&self, mip: u32, array_index: u32) -> u32 {
        mip + array_index * u32::from(self.mip_levels)
    }

    /// Mip level of subresource `index`.
    pub fn subresource_mip(&self, index: u32) -> u32 {
        index % u32::from(self.mip_levels.max(1))
    }

    /// Tightly packed byte size of subresource `index`.
    pub fn subresource_size(&self, index: u32) -> u64 {
        let extent = self.mip_extent(self.subresource_mip(index));
        extent.texel_count() * u64::from(self.format.bytes_per_pixel())
    }

    /// Byte offset of subresource `index` when all subresources are packed
    /// one after another in index order.
    pub fn subresource_offset(&self, index: u32) -> u64 {
        (0..index).map(|i| self.subresource_size(i)).sum()
    }

    /// Tightly packed size of the whole texture in bytes.
    pub fn byte_size(&self) -> u64 {
        self.subresource_offset(self.subresource_count())
    }
}

/// Generic description of a GPU resource.
///
/// Built by the memory manager from the typed factory arguments and passed
/// to the heap allocators and the graphics API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceDesc {
    /// Linear buffer of `size` bytes.
    Buffer {
        /// Size in bytes.
        size: u64,
        /// Usage flags.
        flags: ResourceFlags,
    },
    /// Texture of any dimensionality.
    Texture(TextureDesc),
}

impl ResourceDesc {
    /// Describe a buffer.
    pub fn buffer(size: u64) -> Self {
        Self::Buffer {
            size,
            flags: ResourceFlags::empty(),
        }
    }

    /// Describe a 1D texture array.
    pub fn texture_1d_array(width: u32, format: Format, array_size: u16, flags: ResourceFlags) -> Self {
        Self::Texture(TextureDesc {
            dimension: TextureDimension::D1,
            width,
            height: 1,
            depth_or_array_size: array_size,
            mip_levels: 1,
            format,
            flags,
        })
    }

    /// Describe a 2D texture array.
    pub fn texture_2d_array(
        width: u32,
        height: u32,
        format: Format,
        array_size: u16,
        flags: ResourceFlags,
    ) -> Self {
        Self::Texture(TextureDesc {
            dimension: TextureDimension::D2,
            width,
            height,
            depth_or_array_size: array_size,
            mip_levels: 1,
            format,
            flags,
        })
    }

    /// Describe a 3D texture.
    pub fn texture_3d(width: u32, height: u32, depth: u16, format: Format, flags: ResourceFlags) -> Self {
        Self::Texture(TextureDesc {
            dimension: TextureDimension::D3,
            width,
            height,
            depth_or_array_size: depth,
            mip_levels: 1,
            format,
            flags,
        })
    }

    /// Describe a cube map: a 2D texture array with six faces.
    pub fn cube_map(width: u32, height: u32, format: Format, flags: ResourceFlags) -> Self {
        Self::texture_2d_array(width, height, format, 6, flags)
    }

    /// Set the mip level count (textures only).
    pub fn with_mip_levels(mut self, count: u16) -> Self {
        if let Self::Texture(texture) = &mut self {
            texture.mip_levels = count;
        }
        self
    }

    /// Set the usage flags.
    pub fn with_flags(mut self, new_flags: ResourceFlags) -> Self {
        match &mut self {
            Self::Buffer { flags, .. } => *flags = new_flags,
            Self::Texture(texture) => texture.flags = new_flags,
        }
        self
    }

    /// The texture description, if this describes a texture.
    pub fn as_texture(&self) -> Option<&TextureDesc> {
        match self {
            Self::Texture(texture) => Some(texture),
            Self::Buffer { .. } => None,
        }
    }

    /// Usage flags.
    pub fn flags(&self) -> ResourceFlags {
        match self {
            Self::Buffer { flags, .. } => *flags,
            Self::Texture(texture) => texture.flags,
        }
    }

    /// Returns true for textures that may be bound as depth-stencil targets.
    pub fn is_depth_stencil_texture(&self) -> bool {
        matches!(self, Self::Texture(texture) if texture.flags.contains(ResourceFlags::ALLOW_DEPTH_STENCIL))
    }

    /// Tightly packed size of the resource contents in bytes.
    pub fn byte_size(&self) -> u64 {
        match self {
            Self::Buffer { size, .. } => *size,
            Self::Texture(texture) => texture.byte_size(),
        }
    }
}

/// Optimized clear value hint for depth-stencil textures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearValue {
    /// Format the clear value applies to.
    pub format: Format,
    /// Depth clear value.
    pub depth: f32,
    /// Stencil clear value.
    pub stencil: u8,
}

impl ClearValue {
    /// Create a depth-stencil clear value.
    pub fn depth_stencil(format: Format, depth: f32, stencil: u8) -> Self {
        Self {
            format,
            depth,
            stencil,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_2d_array_desc() {
        let desc = ResourceDesc::texture_2d_array(
            256,
            128,
            Format::R8G8B8A8Unorm,
            4,
            ResourceFlags::ALLOW_RENDER_TARGET,
        );
        let texture = desc.as_texture().unwrap();
        assert_eq!(texture.array_size(), 4);
        assert_eq!(texture.depth(), 1);
        assert_eq!(texture.subresource_count(), 4);
        assert_eq!(desc.byte_size(), 256 * 128 * 4 * 4);
    }

    #[test]
    fn test_texture_3d_desc() {
        let desc = ResourceDesc::texture_3d(16, 16, 8, Format::R32Float, ResourceFlags::empty());
        let texture = desc.as_texture().unwrap();
        assert_eq!(texture.array_size(), 1);
        assert_eq!(texture.depth(), 8);
        assert_eq!(desc.byte_size(), 16 * 16 * 8 * 4);
    }

    #[test]
    fn test_cube_map_has_six_faces() {
        let desc = ResourceDesc::cube_map(64, 64, Format::R8G8B8A8Unorm, ResourceFlags::empty());
        assert_eq!(desc.as_texture().unwrap().array_size(), 6);
    }

    #[test]
    fn test_mip_chain_layout() {
        let desc = ResourceDesc::texture_2d_array(8, 4, Format::R8Unorm, 2, ResourceFlags::empty())
            .with_mip_levels(3);
        let texture = desc.as_texture().unwrap();
        assert_eq!(texture.mip_extent(1), Extent3d::new_2d(4, 2));
        assert_eq!(texture.mip_extent(2), Extent3d::new_2d(2, 1));
        assert_eq!(texture.mip_extent(5), Extent3d::new_2d(1, 1));
        // Layer 1, mip 0 follows the full mip chain of layer 0
        let index = texture.subresource_index(0, 1);
        assert_eq!(index, 3);
        assert_eq!(texture.subresource_offset(index), 32 + 8 + 2);
        assert_eq!(texture.byte_size(), 2 * (32 + 8 + 2));
    }

    #[test]
    fn test_depth_stencil_detection() {
        let depth = ResourceDesc::texture_2d_array(
            64,
            64,
            Format::D32Float,
            1,
            ResourceFlags::ALLOW_DEPTH_STENCIL,
        );
        assert!(depth.is_depth_stencil_texture());
        assert!(!ResourceDesc::buffer(64).is_depth_stencil_texture());
    }
}
