//! GPU pixel formats.

/// Bit layout shared by a typeless format and all formats it can be viewed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatFamily {
    /// One 8-bit channel.
    R8,
    /// Two 8-bit channels.
    R8G8,
    /// Four 8-bit channels.
    R8G8B8A8,
    /// One 16-bit channel.
    R16,
    /// Two 16-bit channels.
    R16G16,
    /// Four 16-bit channels.
    R16G16B16A16,
    /// One 32-bit channel.
    R32,
    /// Two 32-bit channels.
    R32G32,
    /// Three 32-bit channels.
    R32G32B32,
    /// Four 32-bit channels.
    R32G32B32A32,
    /// 24-bit depth with 8-bit stencil.
    R24G8,
}

impl FormatFamily {
    /// Size of one element in bytes.
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::R8 => 1,
            Self::R8G8 | Self::R16 => 2,
            Self::R8G8B8A8 | Self::R16G16 | Self::R32 | Self::R24G8 => 4,
            Self::R16G16B16A16 | Self::R32G32 => 8,
            Self::R32G32B32 => 12,
            Self::R32G32B32A32 => 16,
        }
    }

    /// Number of channels.
    pub fn channel_count(self) -> u32 {
        match self {
            Self::R8 | Self::R16 | Self::R32 => 1,
            Self::R8G8 | Self::R16G16 | Self::R32G32 | Self::R24G8 => 2,
            Self::R32G32B32 => 3,
            Self::R8G8B8A8 | Self::R16G16B16A16 | Self::R32G32B32A32 => 4,
        }
    }
}

/// GPU resource and view format.
///
/// Typeless formats fix only the bit layout; a resource created with one can
/// be viewed through any typed format of the same [`FormatFamily`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum Format {
    /// No format; used for raw and structured buffers.
    #[default]
    Unknown,

    R8Typeless,
    R8Unorm,
    R8Snorm,
    R8Uint,
    R8Sint,

    R8G8Typeless,
    R8G8Unorm,
    R8G8Snorm,
    R8G8Uint,
    R8G8Sint,

    R8G8B8A8Typeless,
    R8G8B8A8Unorm,
    R8G8B8A8UnormSrgb,
    R8G8B8A8Snorm,
    R8G8B8A8Uint,
    R8G8B8A8Sint,

    R16Typeless,
    R16Unorm,
    R16Snorm,
    R16Uint,
    R16Sint,
    R16Float,
    D16Unorm,

    R16G16Typeless,
    R16G16Unorm,
    R16G16Snorm,
    R16G16Uint,
    R16G16Sint,
    R16G16Float,

    R16G16B16A16Typeless,
    R16G16B16A16Unorm,
    R16G16B16A16Snorm,
    R16G16B16A16Uint,
    R16G16B16A16Sint,
    R16G16B16A16Float,

    R32Typeless,
    R32Uint,
    R32Sint,
    R32Float,
    D32Float,

    R32G32Typeless,
    R32G32Uint,
    R32G32Sint,
    R32G32Float,

    R32G32B32Typeless,
    R32G32B32Uint,
    R32G32B32Sint,
    R32G32B32Float,

    R32G32B32A32Typeless,
    R32G32B32A32Uint,
    R32G32B32A32Sint,
    R32G32B32A32Float,

    R24G8Typeless,
    D24UnormS8Uint,
    R24UnormX8Typeless,
    X24TypelessG8Uint,
}

impl Format {
    /// Bit layout family, `None` for [`Format::Unknown`].
    pub fn family(self) -> Option<FormatFamily> {
        use Format::*;
        let family = match self {
            Unknown => return None,
            R8Typeless | R8Unorm | R8Snorm | R8Uint | R8Sint => FormatFamily::R8,
            R8G8Typeless | R8G8Unorm | R8G8Snorm | R8G8Uint | R8G8Sint => FormatFamily::R8G8,
            R8G8B8A8Typeless | R8G8B8A8Unorm | R8G8B8A8UnormSrgb | R8G8B8A8Snorm
            | R8G8B8A8Uint | R8G8B8A8Sint => FormatFamily::R8G8B8A8,
            R16Typeless | R16Unorm | R16Snorm | R16Uint | R16Sint | R16Float | D16Unorm => {
                FormatFamily::R16
            }
            R16G16Typeless | R16G16Unorm | R16G16Snorm | R16G16Uint | R16G16Sint
            | R16G16Float => FormatFamily::R16G16,
            R16G16B16A16Typeless | R16G16B16A16Unorm | R16G16B16A16Snorm | R16G16B16A16Uint
            | R16G16B16A16Sint | R16G16B16A16Float => FormatFamily::R16G16B16A16,
            R32Typeless | R32Uint | R32Sint | R32Float | D32Float => FormatFamily::R32,
            R32G32Typeless | R32G32Uint | R32G32Sint | R32G32Float => FormatFamily::R32G32,
            R32G32B32Typeless | R32G32B32Uint | R32G32B32Sint | R32G32B32Float => {
                FormatFamily::R32G32B32
            }
            R32G32B32A32Typeless | R32G32B32A32Uint | R32G32B32A32Sint | R32G32B32A32Float => {
                FormatFamily::R32G32B32A32
            }
            R24G8Typeless | D24UnormS8Uint | R24UnormX8Typeless | X24TypelessG8Uint => {
                FormatFamily::R24G8
            }
        };
        Some(family)
    }

    /// Size of one pixel (or buffer element) in bytes; zero for [`Format::Unknown`].
    pub fn bytes_per_pixel(self) -> u32 {
        self.family().map_or(0, FormatFamily::bytes_per_pixel)
    }

    /// Number of channels; zero for [`Format::Unknown`].
    pub fn channel_count(self) -> u32 {
        self.family().map_or(0, FormatFamily::channel_count)
    }

    /// Returns true for formats that only fix the bit layout.
    ///
    /// The partially typed depth views (`R24UnormX8Typeless`,
    /// `X24TypelessG8Uint`) are fully usable as views and are not typeless.
    pub fn is_typeless(self) -> bool {
        use Format::*;
        matches!(
            self,
            R8Typeless
                | R8G8Typeless
                | R8G8B8A8Typeless
                | R16Typeless
                | R16G16Typeless
                | R16G16B16A16Typeless
                | R32Typeless
                | R32G32Typeless
                | R32G32B32Typeless
                | R32G32B32A32Typeless
                | R24G8Typeless
        )
    }

    /// Returns true for depth(-stencil) formats usable by depth-stencil views.
    pub fn is_depth(self) -> bool {
        matches!(self, Self::D16Unorm | Self::D32Float | Self::D24UnormS8Uint)
    }

    /// Returns true if the format has a stencil component.
    pub fn has_stencil(self) -> bool {
        matches!(self, Self::D24UnormS8Uint)
    }

    /// Format a depth-stencil view of a resource in this format uses.
    ///
    /// Depth formats map to themselves and typeless families holding depth
    /// data map to their depth format.
    pub fn depth_stencil_view_format(self) -> Option<Format> {
        match self {
            Self::D16Unorm | Self::D32Float | Self::D24UnormS8Uint => Some(self),
            Self::R16Typeless => Some(Self::D16Unorm),
            Self::R32Typeless => Some(Self::D32Float),
            Self::R24G8Typeless => Some(Self::D24UnormS8Uint),
            _ => None,
        }
    }

    /// Returns true if a view of format `self` may be created over a resource
    /// created with `resource_format`.
    ///
    /// The formats must match exactly, unless the resource is typeless, in
    /// which case any format of the same family is accepted.
    pub fn is_view_compatible_with(self, resource_format: Format) -> bool {
        if self == resource_format {
            return true;
        }
        resource_format.is_typeless() && self.family().is_some() && self.family() == resource_format.family()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_per_pixel() {
        assert_eq!(Format::R8Unorm.bytes_per_pixel(), 1);
        assert_eq!(Format::R8G8B8A8Unorm.bytes_per_pixel(), 4);
        assert_eq!(Format::R32G32B32Float.bytes_per_pixel(), 12);
        assert_eq!(Format::D24UnormS8Uint.bytes_per_pixel(), 4);
        assert_eq!(Format::Unknown.bytes_per_pixel(), 0);
    }

    #[test]
    fn test_depth_queries() {
        assert!(Format::D32Float.is_depth());
        assert!(!Format::R32Float.is_depth());
        assert!(Format::D24UnormS8Uint.has_stencil());
        assert!(!Format::D32Float.has_stencil());
    }

    #[test]
    fn test_view_compatibility() {
        assert!(Format::R8G8B8A8Unorm.is_view_compatible_with(Format::R8G8B8A8Unorm));
        assert!(Format::R8G8B8A8UnormSrgb.is_view_compatible_with(Format::R8G8B8A8Typeless));
        assert!(!Format::R8G8B8A8UnormSrgb.is_view_compatible_with(Format::R8G8B8A8Unorm));
        assert!(Format::D32Float.is_view_compatible_with(Format::R32Typeless));
        assert!(Format::R32Float.is_view_compatible_with(Format::R32Typeless));
        assert!(Format::R24UnormX8Typeless.is_view_compatible_with(Format::R24G8Typeless));
        assert!(!Format::R16Float.is_view_compatible_with(Format::R32Typeless));
        assert!(!Format::Unknown.is_view_compatible_with(Format::R32Typeless));
    }
}
