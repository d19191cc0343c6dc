//! Common types shared across the graphics system.

/// 3D extent of a texture or texture region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent3d {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth in texels (1 for 1D and 2D textures).
    pub depth: u32,
}

impl Extent3d {
    /// Create a new 3D extent.
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Create a new 2D extent (depth = 1).
    pub const fn new_2d(width: u32, height: u32) -> Self {
        Self::new(width, height, 1)
    }

    /// Number of texels covered by the extent.
    pub fn texel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * u64::from(self.depth)
    }
}

impl Default for Extent3d {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

/// Texel coordinate of the corner of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Origin3d {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Origin3d {
    /// Create a new origin.
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

/// A box inside one texture subresource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureRegion {
    /// Corner of the region.
    pub origin: Origin3d,
    /// Size of the region.
    pub extent: Extent3d,
}

impl TextureRegion {
    /// Create a region from origin and extent.
    pub const fn new(origin: Origin3d, extent: Extent3d) -> Self {
        Self { origin, extent }
    }

    /// Create a 2D region at `(x, y)` of `width` x `height` texels.
    pub const fn new_2d(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self::new(Origin3d::new(x, y, 0), Extent3d::new_2d(width, height))
    }

    /// Returns true if the region lies completely within `bounds`.
    pub fn fits_within(&self, bounds: Extent3d) -> bool {
        let fits = |origin: u32, size: u32, limit: u32| {
            origin.checked_add(size).is_some_and(|end| end <= limit)
        };
        fits(self.origin.x, self.extent.width, bounds.width)
            && fits(self.origin.y, self.extent.height, bounds.height)
            && fits(self.origin.z, self.extent.depth, bounds.depth)
    }
}
