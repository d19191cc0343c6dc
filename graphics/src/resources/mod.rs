//! Typed GPU resources.
//!
//! Every wrapper holds a [`MemoryObjectDescriptor`] created by the
//! [`MemoryManager`] and exposes shape and format queries. Cloning a wrapper
//! shares the underlying allocation:
//! - [`VertexBuffer`], [`IndexBuffer`] - geometry buffers
//! - [`VolatileConstBuffer`], [`PersistentConstBuffer`] - shader constants
//! - [`Texture1D`], [`Texture2D`], [`Texture3D`], [`TextureCube`] - textures
//! - [`Image`] - a 2D texture with its view, filled from CPU pixels
//!
//! [`MemoryObjectDescriptor`]: crate::memory::MemoryObjectDescriptor
//! [`MemoryManager`]: crate::memory::MemoryManager

mod buffer;
mod image;
mod texture;

pub use buffer::{
    ConstBuffer, IndexBuffer, LinearBuffer, PersistentConstBuffer, VertexBuffer,
    VolatileConstBuffer,
};
pub use image::Image;
pub use texture::{Texture1D, Texture2D, Texture3D, TextureCube};
