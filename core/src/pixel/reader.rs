//! Pixel reader strategies.

use std::marker::PhantomData;

use half::f16;

use super::types::{ChannelValue, PixelChannelType};

/// Interprets raw pixel bytes supplied by asset code.
///
/// A reader knows the layout of one source pixel (channel type and count) and
/// extracts individual channels as [`ChannelValue`]s. The GPU memory layer
/// uses it to convert source data into the destination texture format.
pub trait PixelReader {
    /// Storage type of each source channel.
    fn channel_type(&self) -> PixelChannelType;

    /// Number of channels in one source pixel.
    fn channel_count(&self) -> usize;

    /// Size of one source pixel in bytes.
    fn pixel_size(&self) -> usize {
        self.channel_type().size() * self.channel_count()
    }

    /// Read channel `channel` of the pixel starting at `pixel[0]`.
    ///
    /// `pixel` holds at least [`pixel_size`](Self::pixel_size) bytes.
    fn read_channel(&self, pixel: &[u8], channel: usize) -> ChannelValue;
}

/// A plain-old-data channel type usable with [`Pixel`].
pub trait Channel: bytemuck::Pod {
    /// Matching abstract channel type.
    const TYPE: PixelChannelType;

    /// Raw bits of the value, zero-extended to 32 bits.
    fn to_bits(self) -> u32;
}

impl Channel for u8 {
    const TYPE: PixelChannelType = PixelChannelType::Int8;
    fn to_bits(self) -> u32 {
        u32::from(self)
    }
}

impl Channel for i8 {
    const TYPE: PixelChannelType = PixelChannelType::Int8;
    fn to_bits(self) -> u32 {
        u32::from(self as u8)
    }
}

impl Channel for u16 {
    const TYPE: PixelChannelType = PixelChannelType::Int16;
    fn to_bits(self) -> u32 {
        u32::from(self)
    }
}

impl Channel for i16 {
    const TYPE: PixelChannelType = PixelChannelType::Int16;
    fn to_bits(self) -> u32 {
        u32::from(self as u16)
    }
}

impl Channel for u32 {
    const TYPE: PixelChannelType = PixelChannelType::Int32;
    fn to_bits(self) -> u32 {
        self
    }
}

impl Channel for i32 {
    const TYPE: PixelChannelType = PixelChannelType::Int32;
    fn to_bits(self) -> u32 {
        self as u32
    }
}

impl Channel for f16 {
    const TYPE: PixelChannelType = PixelChannelType::Float16;
    fn to_bits(self) -> u32 {
        u32::from(f16::to_bits(self))
    }
}

impl Channel for f32 {
    const TYPE: PixelChannelType = PixelChannelType::Float32;
    fn to_bits(self) -> u32 {
        f32::to_bits(self)
    }
}

/// Reader for tightly packed pixels of `N` channels of type `C`.
///
/// # Example
///
/// ```
/// use strata_core::pixel::{Pixel, PixelReader};
///
/// let reader = Pixel::<u8, 3>::new();
/// let rgb = [10u8, 20, 30];
/// assert_eq!(reader.pixel_size(), 3);
/// assert_eq!(reader.read_channel(&rgb, 2).bits(), 30);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Pixel<C, const N: usize> {
    _channel: PhantomData<C>,
}

impl<C: Channel, const N: usize> Pixel<C, N> {
    /// Create a reader.
    pub const fn new() -> Self {
        Self {
            _channel: PhantomData,
        }
    }
}

impl<C: Channel, const N: usize> PixelReader for Pixel<C, N> {
    fn channel_type(&self) -> PixelChannelType {
        C::TYPE
    }

    fn channel_count(&self) -> usize {
        N
    }

    fn read_channel(&self, pixel: &[u8], channel: usize) -> ChannelValue {
        debug_assert!(channel < N, "channel {channel} out of range for {N}-channel pixel");
        let size = std::mem::size_of::<C>();
        let start = channel * size;
        let value: C = bytemuck::pod_read_unaligned(&pixel[start..start + size]);
        ChannelValue::from_bits(C::TYPE, value.to_bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba8_reader() {
        let reader = Pixel::<u8, 4>::new();
        let data = [1u8, 2, 3, 4];
        assert_eq!(reader.channel_type(), PixelChannelType::Int8);
        assert_eq!(reader.pixel_size(), 4);
        for channel in 0..4 {
            assert_eq!(reader.read_channel(&data, channel).bits(), channel as u32 + 1);
        }
    }

    #[test]
    fn test_unaligned_read() {
        let reader = Pixel::<u16, 2>::new();
        // Offset by one byte so the u16 reads are unaligned
        let data = [0u8, 0x34, 0x12, 0x78, 0x56];
        assert_eq!(reader.read_channel(&data[1..], 0).bits(), 0x1234);
        assert_eq!(reader.read_channel(&data[1..], 1).bits(), 0x5678);
    }

    #[test]
    fn test_float_reader() {
        let reader = Pixel::<f32, 1>::new();
        let data = 0.5f32.to_le_bytes();
        assert_eq!(reader.channel_type(), PixelChannelType::Float32);
        assert_eq!(reader.read_channel(&data, 0).bits(), 0.5f32.to_bits());
    }

    #[test]
    fn test_signed_reader_keeps_bits() {
        let reader = Pixel::<i8, 1>::new();
        let data = [(-1i8) as u8];
        assert_eq!(reader.read_channel(&data, 0).bits(), 0xFF);
    }
}
