//! Texture resources.
//!
//! Every texture wrapper holds the shared memory descriptor plus a copy of
//! the texture description it was created with. Cloning a wrapper shares the
//! allocation.

use crate::memory::{MemoryObject, MemoryObjectDescriptor};
use crate::types::{Format, ResourceFlags, TextureDesc};

macro_rules! texture_wrapper {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            memory: MemoryObjectDescriptor,
            desc: TextureDesc,
        }

        impl $name {
            pub(crate) fn new(memory: MemoryObjectDescriptor, desc: TextureDesc) -> Self {
                Self { memory, desc }
            }

            /// Description the texture was created with.
            pub fn desc(&self) -> &TextureDesc {
                &self.desc
            }

            /// Width of the top mip in texels.
            pub fn width(&self) -> u32 {
                self.desc.width
            }

            pub fn format(&self) -> Format {
                self.desc.format
            }

            pub fn flags(&self) -> ResourceFlags {
                self.desc.flags
            }

            pub fn mip_levels(&self) -> u32 {
                u32::from(self.desc.mip_levels)
            }

            /// Index of the subresource at `mip` in array layer `array_index`.
            pub fn subresource_index(&self, mip: u32, array_index: u32) -> u32 {
                self.desc.subresource_index(mip, array_index)
            }
        }

        impl MemoryObject for $name {
            fn memory(&self) -> &MemoryObjectDescriptor {
                &self.memory
            }
        }
    };
}

texture_wrapper!(
    /// A 1D texture array.
    Texture1D
);

texture_wrapper!(
    /// A 2D texture array.
    Texture2D
);

texture_wrapper!(
    /// A 3D volume texture.
    Texture3D
);

texture_wrapper!(
    /// A cube map: six 2D faces.
    TextureCube
);

impl Texture1D {
    pub fn array_size(&self) -> u32 {
        self.desc.array_size()
    }
}

impl Texture2D {
    /// Height of the top mip in texels.
    pub fn height(&self) -> u32 {
        self.desc.height
    }

    pub fn array_size(&self) -> u32 {
        self.desc.array_size()
    }
}

impl Texture3D {
    /// Height of the top mip in texels.
    pub fn height(&self) -> u32 {
        self.desc.height
    }

    /// Depth of the top mip in texels.
    pub fn depth(&self) -> u32 {
        self.desc.depth()
    }
}

impl TextureCube {
    /// Height of each face in texels.
    pub fn height(&self) -> u32 {
        self.desc.height
    }
}

static_assertions::assert_impl_all!(Texture2D: Send, Sync);
