//! High level 2D image backed by a texture and its shader resource view.

use std::sync::Arc;

use strata_core::pixel::{ChannelValue, PixelChannelType, PixelClass, PixelReader};

use super::Texture2D;
use crate::descriptors::PersistentResViewHeap;
use crate::error::{GraphicsError, GraphicsResult};
use crate::memory::{MemoryManager, MemoryObject, ResourceHeapType};
use crate::types::{Extent3d, Format, ResourceFlags, SrvTexture2DArray, TextureRegion};
use crate::views::Texture2DSrv;

struct Layout {
    width: u32,
    height: u32,
    channel_type: PixelChannelType,
    channel_count: u32,
    pixel_class: PixelClass,
    gpu_channels: u32,
    srv: Texture2DSrv,
}

/// A single-mip 2D texture that accepts pixels in any [`PixelReader`] layout.
///
/// [`Image::set_layout`] allocates the texture and its shader resource view;
/// [`Image::update`] converts source pixels into the texture format and
/// stages them on the manager's upload heap.
pub struct Image {
    manager: Arc<MemoryManager>,
    heap: Arc<PersistentResViewHeap>,
    layout: Option<Layout>,
}

impl Image {
    /// Create an image without storage.
    pub fn new(manager: Arc<MemoryManager>, heap: Arc<PersistentResViewHeap>) -> Self {
        Self {
            manager,
            heap,
            layout: None,
        }
    }

    /// Allocate a new texture and view for the given pixel layout.
    ///
    /// The previous texture and view are released; views obtained earlier
    /// through [`Image::srv`] keep the old texture alive until dropped.
    pub fn set_layout(
        &mut self,
        width: u32,
        height: u32,
        channel_type: PixelChannelType,
        channel_count: u32,
        pixel_class: PixelClass,
    ) -> GraphicsResult<()> {
        strata_core::profile_function!();

        let (format, gpu_channels) = Self::convert_format(channel_type, channel_count, pixel_class)?;
        let texture = self.manager.create_texture_2d(
            ResourceHeapType::Critical,
            width,
            height,
            format,
            ResourceFlags::empty(),
            1,
        )?;
        let srv = Texture2DSrv::new(&texture, &self.heap, format, SrvTexture2DArray::default())?;
        log::debug!(
            "Image layout {width}x{height} {channel_count}x{channel_type:?} {pixel_class:?} as {format:?}"
        );
        self.layout = Some(Layout {
            width,
            height,
            channel_type,
            channel_count,
            pixel_class,
            gpu_channels,
            srv,
        });
        Ok(())
    }

    /// Convert a rectangle of source pixels and stage it for upload.
    ///
    /// `pixels` holds `height` rows starting `bytes_per_row` bytes apart, each
    /// with `width` pixels readable by `reader`. A `bytes_per_row` of zero
    /// means the rows are tightly packed. Missing channels are filled with
    /// zero, except alpha which reads as one.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        pixels: &[u8],
        reader: &dyn PixelReader,
        bytes_per_row: usize,
    ) -> GraphicsResult<()> {
        strata_core::profile_function!();

        let layout = self.layout.as_ref().ok_or_else(|| {
            GraphicsError::OutOfBounds("image has no layout to update".to_string())
        })?;
        let region = TextureRegion::new_2d(x, y, width, height);
        let bounds = Extent3d::new_2d(layout.width, layout.height);
        if !region.fits_within(bounds) {
            return Err(GraphicsError::OutOfBounds(format!(
                "update {width}x{height} at ({x}, {y}) exceeds the {}x{} image",
                layout.width, layout.height
            )));
        }
        if width == 0 || height == 0 {
            return Ok(());
        }

        let source_row = width as usize * reader.pixel_size();
        let rows = height as usize;
        let bytes_per_row = if bytes_per_row == 0 { source_row } else { bytes_per_row };
        if bytes_per_row < source_row || pixels.len() < (rows - 1) * bytes_per_row + source_row {
            return Err(GraphicsError::InvalidArgument(format!(
                "{} bytes with {bytes_per_row} per row can not hold {width}x{height} source pixels",
                pixels.len()
            )));
        }

        let converted = layout.convert_rows(pixels, reader, width as usize, rows, bytes_per_row);
        let texture = layout.srv.resource();
        self.manager.upload_heap().upload_to_texture(
            texture.memory(),
            texture.subresource_index(0, 0),
            region,
            &converted,
            0,
        )
    }

    /// Pick the texture format for a pixel layout.
    ///
    /// Returns the format and the number of channels it stores, which may
    /// exceed `channel_count` when no exact match exists (three 8-bit
    /// channels are stored as four).
    pub fn convert_format(
        channel_type: PixelChannelType,
        channel_count: u32,
        pixel_class: PixelClass,
    ) -> GraphicsResult<(Format, u32)> {
        use Format::*;
        use PixelChannelType::*;
        use PixelClass::*;

        // Formats for one, two, three and four channels
        let formats: [Option<Format>; 4] = match (channel_type, pixel_class) {
            (Int8, Linear) => [Some(R8Unorm), Some(R8G8Unorm), None, Some(R8G8B8A8Unorm)],
            (Int8, Srgb) => [None, None, None, Some(R8G8B8A8UnormSrgb)],
            (Int8, Signed) => [Some(R8Snorm), Some(R8G8Snorm), None, Some(R8G8B8A8Snorm)],
            (Int8, Integer) => [Some(R8Uint), Some(R8G8Uint), None, Some(R8G8B8A8Uint)],
            (Int16, Linear) => [
                Some(R16Unorm),
                Some(R16G16Unorm),
                None,
                Some(R16G16B16A16Unorm),
            ],
            (Int16, Signed) => [
                Some(R16Snorm),
                Some(R16G16Snorm),
                None,
                Some(R16G16B16A16Snorm),
            ],
            (Int16, Integer) => [
                Some(R16Uint),
                Some(R16G16Uint),
                None,
                Some(R16G16B16A16Uint),
            ],
            (Int32, Integer) => [
                Some(R32Uint),
                Some(R32G32Uint),
                Some(R32G32B32Uint),
                Some(R32G32B32A32Uint),
            ],
            (Float16, Linear) => [
                Some(R16Float),
                Some(R16G16Float),
                None,
                Some(R16G16B16A16Float),
            ],
            (Float32, Linear) => [
                Some(R32Float),
                Some(R32G32Float),
                Some(R32G32B32Float),
                Some(R32G32B32A32Float),
            ],
            _ => [None; 4],
        };

        let unsupported = || {
            GraphicsError::UnsupportedFormat(format!(
                "no texture format holds {channel_count} {channel_type:?} channels of class {pixel_class:?}"
            ))
        };
        if !(1..=4).contains(&channel_count) {
            return Err(unsupported());
        }
        formats
            .iter()
            .enumerate()
            .skip(channel_count as usize - 1)
            .find_map(|(index, format)| format.map(|format| (format, index as u32 + 1)))
            .ok_or_else(unsupported)
    }

    pub fn width(&self) -> u32 {
        self.layout.as_ref().map_or(0, |layout| layout.width)
    }

    pub fn height(&self) -> u32 {
        self.layout.as_ref().map_or(0, |layout| layout.height)
    }

    pub fn channel_type(&self) -> Option<PixelChannelType> {
        self.layout.as_ref().map(|layout| layout.channel_type)
    }

    /// Channels per pixel as requested by the layout, before widening.
    pub fn channel_count(&self) -> u32 {
        self.layout.as_ref().map_or(0, |layout| layout.channel_count)
    }

    pub fn pixel_class(&self) -> Option<PixelClass> {
        self.layout.as_ref().map(|layout| layout.pixel_class)
    }

    /// The texture, once a layout is set.
    pub fn texture(&self) -> Option<&Texture2D> {
        self.layout.as_ref().map(|layout| layout.srv.resource())
    }

    /// The shader resource view of the whole texture, once a layout is set.
    pub fn srv(&self) -> Option<&Texture2DSrv> {
        self.layout.as_ref().map(|layout| &layout.srv)
    }
}

impl Layout {
    fn convert_rows(
        &self,
        pixels: &[u8],
        reader: &dyn PixelReader,
        width: usize,
        rows: usize,
        bytes_per_row: usize,
    ) -> Vec<u8> {
        let channel_size = self.channel_type.size();
        let source_pixel = reader.pixel_size();
        let source_channels = reader.channel_count();
        let pixel_size = self.gpu_channels as usize * channel_size;
        let mut out = vec![0u8; width * rows * pixel_size];

        for (row, out_row) in out.chunks_exact_mut(width * pixel_size).enumerate() {
            let source_row = &pixels[row * bytes_per_row..];
            for (column, out_pixel) in out_row.chunks_exact_mut(pixel_size).enumerate() {
                let source = &source_row[column * source_pixel..];
                for (channel, out_channel) in out_pixel.chunks_exact_mut(channel_size).enumerate() {
                    let value = if channel < source_channels {
                        reader
                            .read_channel(source, channel)
                            .convert(self.channel_type, self.pixel_class)
                    } else if channel == 3 {
                        ChannelValue::one(self.channel_type, self.pixel_class)
                    } else {
                        ChannelValue::zero(self.channel_type)
                    };
                    value.write_le(out_channel);
                }
            }
        }
        out
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("channel_type", &self.channel_type())
            .field("channel_count", &self.channel_count())
            .field("pixel_class", &self.pixel_class())
            .finish()
    }
}
