//! Common types and descriptors for graphics resources.
//!
//! This module contains formats, usage flags, resource descriptions and the
//! view descriptions recorded in descriptor slots.

mod common;
mod descriptor;
mod format;
mod resource;
mod view;

pub use common::{Extent3d, Origin3d, TextureRegion};
pub use descriptor::{DescriptorHeapDesc, DescriptorHeapKind};
pub use format::{Format, FormatFamily};
pub use resource::{
    ClearValue, HeapKind, ResourceDesc, ResourceFlags, TextureDesc,
    TextureDimension,
};
pub use view::{
    resolve_mip_count, ConstantBufferViewDesc, DepthStencilViewDesc, DsvFlags, DsvTexture2DArray,
    RenderTargetViewDesc, RtvTexture2DArray, ShaderResourceViewDesc, SrvBuffer, SrvDimension,
    SrvTexture1DArray, SrvTexture2DArray, SrvTexture3D, SrvTextureCube, ALL_MIPS,
};
