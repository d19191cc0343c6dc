//! # Strata Graphics
//!
//! GPU memory, descriptor heap and resource view layer of the Strata engine.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GraphicsApi`] - the seam to the graphics API, with a [`DummyBackend`] for tests
//! - [`MemoryManager`] - critical, upload and constant buffer heaps behind typed factories
//! - [`resources`] - typed buffers, textures and [`Image`]
//! - [`descriptors`] - descriptor heaps handing out move-only slots
//! - [`views`] - validated CBV, RTV, DSV and SRV views
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use strata_graphics::{DummyBackend, MemoryManager, PersistentResViewHeap, ResourceHeapType};
//! use strata_graphics::types::{Format, ResourceFlags, SrvTexture2DArray};
//! use strata_graphics::views::Texture2DSrv;
//!
//! let api = Arc::new(DummyBackend::new());
//! let manager = MemoryManager::new(api.clone())?;
//! let heap = PersistentResViewHeap::new(api, 64)?;
//!
//! let texture = manager.create_texture_2d(
//!     ResourceHeapType::Critical,
//!     512,
//!     512,
//!     Format::R8G8B8A8Typeless,
//!     ResourceFlags::empty(),
//!     1,
//! )?;
//! let srgb = Texture2DSrv::new(
//!     &texture,
//!     &heap,
//!     Format::R8G8B8A8UnormSrgb,
//!     SrvTexture2DArray::default(),
//! )?;
//! assert_eq!(srgb.format(), Format::R8G8B8A8UnormSrgb);
//! # Ok::<(), strata_graphics::GraphicsError>(())
//! ```

pub mod backend;
pub mod descriptors;
pub mod error;
pub mod memory;
pub mod profiling;
pub mod resources;
pub mod types;
pub mod views;

// Re-export main types for convenience
pub use backend::{create_backend, DummyBackend, GraphicsApi, ResourceHandle};
pub use descriptors::{DescriptorHeap, DescriptorReference, DsvHeap, PersistentResViewHeap, RtvHeap};
pub use error::{GraphicsError, GraphicsResult};
pub use memory::{
    MemoryManager, MemoryManagerConfig, MemoryObject, MemoryObjectDescriptor, ResourceHeapType,
};
pub use resources::{
    Image, IndexBuffer, PersistentConstBuffer, Texture1D, Texture2D, Texture3D, TextureCube,
    VertexBuffer, VolatileConstBuffer,
};
pub use types::{Format, ResourceDesc, ResourceFlags};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
pub fn init() {
    strata_core::init();
    log::info!("Strata Graphics v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_backend() {
        let backend = create_backend().unwrap();
        assert_eq!(backend.name(), "Dummy");
    }
}
