//! Checks shared by view constructors.
//!
//! Every check reports [`GraphicsError::IncompatibleView`] and runs before a
//! descriptor slot is taken.

use crate::error::{GraphicsError, GraphicsResult};
use crate::types::{resolve_mip_count, Format, ResourceFlags, TextureDesc};

fn incompatible(message: String) -> GraphicsError {
    GraphicsError::IncompatibleView(message)
}

/// The view format must be usable and agree with the resource format.
pub(super) fn check_format(view: Format, resource: Format) -> GraphicsResult<()> {
    if view == Format::Unknown || view.is_typeless() {
        return Err(incompatible(format!(
            "view format {view:?} is not a typed format"
        )));
    }
    if !view.is_view_compatible_with(resource) {
        return Err(incompatible(format!(
            "view format {view:?} cannot view a resource of format {resource:?}"
        )));
    }
    Ok(())
}

/// Shader resource views need a non-depth format and a readable resource.
pub(super) fn check_shader_readable(view: Format, texture: &TextureDesc) -> GraphicsResult<()> {
    if texture.flags.contains(ResourceFlags::DENY_SHADER_RESOURCE) {
        return Err(incompatible(
            "resource was created with DENY_SHADER_RESOURCE".to_string(),
        ));
    }
    if view.is_depth() {
        return Err(incompatible(format!(
            "depth format {view:?} cannot be read by shaders"
        )));
    }
    check_format(view, texture.format)
}

pub(super) fn check_flag(texture: &TextureDesc, flag: ResourceFlags, what: &str) -> GraphicsResult<()> {
    if texture.flags.contains(flag) {
        Ok(())
    } else {
        Err(incompatible(format!(
            "{what} view requires a resource created with {flag:?}"
        )))
    }
}

/// Validate a mip range, resolving `ALL_MIPS`.
pub(super) fn check_mip_range(
    most_detailed_mip: u32,
    mip_levels: u32,
    texture: &TextureDesc,
) -> GraphicsResult<()> {
    let available = u32::from(texture.mip_levels);
    if most_detailed_mip >= available {
        return Err(incompatible(format!(
            "most detailed mip {most_detailed_mip} exceeds the {available} mips of the resource"
        )));
    }
    let count = resolve_mip_count(most_detailed_mip, mip_levels, available);
    if count == 0 || u64::from(most_detailed_mip) + u64::from(count) > u64::from(available) {
        return Err(incompatible(format!(
            "mip range {most_detailed_mip}+{count} is outside the {available} mips of the resource"
        )));
    }
    Ok(())
}

/// Validate a single mip slice.
pub(super) fn check_mip_slice(mip_slice: u32, texture: &TextureDesc) -> GraphicsResult<()> {
    check_mip_range(mip_slice, 1, texture)
}

/// Validate an array range of at least one layer.
pub(super) fn check_array_range(
    first_array_slice: u32,
    array_size: u32,
    texture: &TextureDesc,
) -> GraphicsResult<()> {
    let layers = texture.array_size();
    if array_size == 0 || u64::from(first_array_slice) + u64::from(array_size) > u64::from(layers) {
        return Err(incompatible(format!(
            "array range {first_array_slice}+{array_size} is outside the {layers} layers of the resource"
        )));
    }
    Ok(())
}

pub(super) fn check_plane_slice(plane_slice: u32) -> GraphicsResult<()> {
    if plane_slice != 0 {
        return Err(incompatible(format!(
            "plane slice {plane_slice} is not supported"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ResourceDesc, ALL_MIPS};

    fn texture(mips: u16, layers: u16, format: Format, flags: ResourceFlags) -> TextureDesc {
        let desc = ResourceDesc::texture_2d_array(64, 64, format, layers, flags).with_mip_levels(mips);
        desc.as_texture().cloned().unwrap()
    }

    #[test]
    fn test_mip_ranges() {
        let tex = texture(4, 1, Format::R8G8B8A8Unorm, ResourceFlags::empty());
        assert!(check_mip_range(0, ALL_MIPS, &tex).is_ok());
        assert!(check_mip_range(3, ALL_MIPS, &tex).is_ok());
        assert!(check_mip_range(1, 3, &tex).is_ok());
        assert!(check_mip_range(4, ALL_MIPS, &tex).is_err());
        assert!(check_mip_range(2, 3, &tex).is_err());
        assert!(check_mip_range(0, 0, &tex).is_err());
    }

    #[test]
    fn test_array_ranges() {
        let tex = texture(1, 6, Format::R8G8B8A8Unorm, ResourceFlags::empty());
        assert!(check_array_range(0, 6, &tex).is_ok());
        assert!(check_array_range(5, 1, &tex).is_ok());
        assert!(check_array_range(5, 2, &tex).is_err());
        assert!(check_array_range(0, 0, &tex).is_err());
        assert!(check_array_range(u32::MAX, 2, &tex).is_err());
    }

    #[test]
    fn test_shader_readable() {
        let typeless = texture(1, 1, Format::R32Typeless, ResourceFlags::ALLOW_DEPTH_STENCIL);
        assert!(check_shader_readable(Format::R32Float, &typeless).is_ok());
        assert!(check_shader_readable(Format::D32Float, &typeless).is_err());
        assert!(check_shader_readable(Format::R32Typeless, &typeless).is_err());

        let denied = texture(1, 1, Format::R8Unorm, ResourceFlags::DENY_SHADER_RESOURCE);
        assert!(matches!(
            check_shader_readable(Format::R8Unorm, &denied),
            Err(GraphicsError::IncompatibleView(_))
        ));
    }
}
