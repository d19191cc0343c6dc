//! Render target and depth-stencil views.

use super::validation;
use crate::descriptors::{DescriptorReference, DsvHeap, RtvHeap};
use crate::error::{GraphicsError, GraphicsResult};
use crate::memory::MemoryObject;
use crate::resources::Texture2D;
use crate::types::{
    DepthStencilViewDesc, DescriptorHeapKind, DsvFlags, DsvTexture2DArray, Format, RenderTargetViewDesc,
    ResourceFlags, RtvTexture2DArray,
};

/// A view binding one mip of a 2D texture range as a color target.
#[derive(Debug)]
pub struct RenderTargetView {
    resource: Texture2D,
    desc: RenderTargetViewDesc,
    descriptor: DescriptorReference,
}

impl RenderTargetView {
    /// Create a render target view with the format of the resource.
    pub fn new(resource: &Texture2D, heap: &RtvHeap, texture: RtvTexture2DArray) -> GraphicsResult<Self> {
        Self::with_format(resource, heap, resource.format(), texture)
    }

    /// Create a render target view reading the resource as `format`.
    pub fn with_format(
        resource: &Texture2D,
        heap: &RtvHeap,
        format: Format,
        texture: RtvTexture2DArray,
    ) -> GraphicsResult<Self> {
        let desc = RenderTargetViewDesc { format, texture };
        check_render_target(resource, &desc)?;
        let descriptor = heap.create(resource.memory().handle(), &desc)?;
        log::trace!(
            "RTV of {format:?} at mip {} written to slot {}",
            texture.mip_slice,
            descriptor.slot()
        );
        Ok(Self {
            resource: resource.clone(),
            desc,
            descriptor,
        })
    }

    /// Adopt a render target slot that already holds `desc` for `resource`.
    pub fn from_descriptor(
        resource: &Texture2D,
        descriptor: DescriptorReference,
        desc: RenderTargetViewDesc,
    ) -> GraphicsResult<Self> {
        if descriptor.kind() != DescriptorHeapKind::Rtv {
            return Err(GraphicsError::IncompatibleView(format!(
                "render target views need an RTV slot, got {:?}",
                descriptor.kind()
            )));
        }
        check_render_target(resource, &desc)?;
        Ok(Self {
            resource: resource.clone(),
            desc,
            descriptor,
        })
    }

    pub fn resource(&self) -> &Texture2D {
        &self.resource
    }

    pub fn format(&self) -> Format {
        self.desc.format
    }

    /// The recorded description.
    pub fn description(&self) -> RenderTargetViewDesc {
        self.desc
    }

    pub fn descriptor(&self) -> &DescriptorReference {
        &self.descriptor
    }
}

fn check_render_target(resource: &Texture2D, desc: &RenderTargetViewDesc) -> GraphicsResult<()> {
    let tex = resource.desc();
    let format = desc.format;
    validation::check_flag(tex, ResourceFlags::ALLOW_RENDER_TARGET, "render target")?;
    if format.is_depth() {
        return Err(GraphicsError::IncompatibleView(format!(
            "depth format {format:?} cannot be a render target"
        )));
    }
    validation::check_format(format, tex.format)?;
    validation::check_mip_slice(desc.texture.mip_slice, tex)?;
    validation::check_array_range(desc.texture.first_array_slice, desc.texture.array_size, tex)?;
    validation::check_plane_slice(desc.texture.plane_slice)
}

/// A view binding one mip of a 2D texture range as the depth-stencil target.
#[derive(Debug)]
pub struct DepthStencilView {
    resource: Texture2D,
    desc: DepthStencilViewDesc,
    descriptor: DescriptorReference,
}

impl DepthStencilView {
    pub fn new(
        resource: &Texture2D,
        heap: &DsvHeap,
        format: Format,
        texture: DsvTexture2DArray,
    ) -> GraphicsResult<Self> {
        Self::with_flags(resource, heap, format, DsvFlags::empty(), texture)
    }

    /// Create a depth-stencil view with read-only `flags`.
    pub fn with_flags(
        resource: &Texture2D,
        heap: &DsvHeap,
        format: Format,
        flags: DsvFlags,
        texture: DsvTexture2DArray,
    ) -> GraphicsResult<Self> {
        let tex = resource.desc();
        validation::check_flag(tex, ResourceFlags::ALLOW_DEPTH_STENCIL, "depth-stencil")?;
        if !format.is_depth() {
            return Err(GraphicsError::IncompatibleView(format!(
                "{format:?} is not a depth format"
            )));
        }
        if flags.contains(DsvFlags::READ_ONLY_STENCIL) && !format.has_stencil() {
            return Err(GraphicsError::IncompatibleView(format!(
                "{format:?} has no stencil to bind read-only"
            )));
        }
        validation::check_format(format, tex.format)?;
        validation::check_mip_slice(texture.mip_slice, tex)?;
        validation::check_array_range(texture.first_array_slice, texture.array_size, tex)?;

        let desc = DepthStencilViewDesc {
            format,
            flags,
            texture,
        };
        let descriptor = heap.create(resource.memory().handle(), &desc)?;
        Ok(Self {
            resource: resource.clone(),
            desc,
            descriptor,
        })
    }

    pub fn resource(&self) -> &Texture2D {
        &self.resource
    }

    pub fn format(&self) -> Format {
        self.desc.format
    }

    /// The recorded description.
    pub fn description(&self) -> DepthStencilViewDesc {
        self.desc
    }

    pub fn descriptor(&self) -> &DescriptorReference {
        &self.descriptor
    }
}
