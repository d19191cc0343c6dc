//! Pixel channel storage types and value conversion.

use half::f16;

/// Storage type of a single pixel channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelChannelType {
    /// 8-bit integer channel.
    #[default]
    Int8,
    /// 16-bit integer channel.
    Int16,
    /// 32-bit integer channel.
    Int32,
    /// 16-bit IEEE half-precision float channel.
    Float16,
    /// 32-bit IEEE single-precision float channel.
    Float32,
}

impl PixelChannelType {
    /// Size of one channel in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::Int8 => 1,
            Self::Int16 | Self::Float16 => 2,
            Self::Int32 | Self::Float32 => 4,
        }
    }

    /// Returns true for floating point channel types.
    pub fn is_float(self) -> bool {
        matches!(self, Self::Float16 | Self::Float32)
    }

    fn mask(self) -> u32 {
        match self {
            Self::Int8 => 0xFF,
            Self::Int16 | Self::Float16 => 0xFFFF,
            Self::Int32 | Self::Float32 => u32::MAX,
        }
    }

    fn max_unsigned(self) -> f64 {
        f64::from(self.mask())
    }

    fn max_signed(self) -> f64 {
        match self {
            Self::Int8 => f64::from(i8::MAX),
            Self::Int16 | Self::Float16 => f64::from(i16::MAX),
            Self::Int32 | Self::Float32 => f64::from(i32::MAX),
        }
    }

    fn sign_extend(self, bits: u32) -> i64 {
        match self {
            Self::Int8 => i64::from(bits as u8 as i8),
            Self::Int16 | Self::Float16 => i64::from(bits as u16 as i16),
            Self::Int32 | Self::Float32 => i64::from(bits as i32),
        }
    }
}

/// How the integer bits of a channel are interpreted.
///
/// Float channels are always read as plain floating point values and only
/// combine with [`PixelClass::Linear`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelClass {
    /// Unsigned normalized, linear color space.
    #[default]
    Linear,
    /// Unsigned normalized, sRGB encoded.
    Srgb,
    /// Signed normalized.
    Signed,
    /// Unnormalized unsigned integer.
    Integer,
}

/// A single channel value tagged with its storage type.
///
/// The raw bits are kept as stored so that copying a channel into a
/// destination of the same type is exact; [`ChannelValue::convert`] goes
/// through `f64` only when the storage types differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelValue {
    channel_type: PixelChannelType,
    bits: u32,
}

impl ChannelValue {
    /// Create a channel value from raw bits. Bits above the channel size are dropped.
    pub fn from_bits(channel_type: PixelChannelType, bits: u32) -> Self {
        Self {
            channel_type,
            bits: bits & channel_type.mask(),
        }
    }

    /// Zero in any channel type and class.
    pub fn zero(channel_type: PixelChannelType) -> Self {
        Self::from_f64(0.0, channel_type, PixelClass::Linear)
    }

    /// The value a missing alpha channel reads as.
    pub fn one(channel_type: PixelChannelType, class: PixelClass) -> Self {
        Self::from_f64(1.0, channel_type, class)
    }

    /// Storage type of this value.
    pub fn channel_type(&self) -> PixelChannelType {
        self.channel_type
    }

    /// Raw stored bits.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Decode the value into the numeric domain of `class`.
    ///
    /// Normalized classes decode to `[0, 1]` (or `[-1, 1]` for signed),
    /// [`PixelClass::Integer`] decodes to the integer value itself.
    pub fn to_f64(&self, class: PixelClass) -> f64 {
        let ty = self.channel_type;
        match ty {
            PixelChannelType::Float16 => f16::from_bits(self.bits as u16).to_f64(),
            PixelChannelType::Float32 => f64::from(f32::from_bits(self.bits)),
            _ => match class {
                PixelClass::Integer => f64::from(self.bits),
                PixelClass::Signed => {
                    (ty.sign_extend(self.bits) as f64 / ty.max_signed()).max(-1.0)
                }
                PixelClass::Linear | PixelClass::Srgb => f64::from(self.bits) / ty.max_unsigned(),
            },
        }
    }

    /// Encode a number in the domain of `class` into `channel_type` storage.
    pub fn from_f64(value: f64, channel_type: PixelChannelType, class: PixelClass) -> Self {
        let bits = match channel_type {
            PixelChannelType::Float16 => u32::from(f16::from_f64(value).to_bits()),
            PixelChannelType::Float32 => (value as f32).to_bits(),
            _ => match class {
                PixelClass::Integer => value.round().clamp(0.0, channel_type.max_unsigned()) as u32,
                PixelClass::Signed => {
                    (value.clamp(-1.0, 1.0) * channel_type.max_signed()).round() as i64 as u32
                }
                PixelClass::Linear | PixelClass::Srgb => {
                    (value.clamp(0.0, 1.0) * channel_type.max_unsigned()).round() as u32
                }
            },
        };
        Self::from_bits(channel_type, bits)
    }

    /// Convert to another storage type, interpreting both sides with `class`.
    pub fn convert(self, channel_type: PixelChannelType, class: PixelClass) -> Self {
        if self.channel_type == channel_type {
            return self;
        }
        Self::from_f64(self.to_f64(class), channel_type, class)
    }

    /// Write the value as little-endian bytes; `out` must hold at least one channel.
    pub fn write_le(&self, out: &mut [u8]) {
        let size = self.channel_type.size();
        out[..size].copy_from_slice(&self.bits.to_le_bytes()[..size]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sizes() {
        assert_eq!(PixelChannelType::Int8.size(), 1);
        assert_eq!(PixelChannelType::Float16.size(), 2);
        assert_eq!(PixelChannelType::Float32.size(), 4);
        assert!(PixelChannelType::Float16.is_float());
        assert!(!PixelChannelType::Int32.is_float());
    }

    #[test]
    fn test_same_type_conversion_is_exact() {
        let value = ChannelValue::from_bits(PixelChannelType::Int16, 0x1234);
        let converted = value.convert(PixelChannelType::Int16, PixelClass::Linear);
        assert_eq!(converted.bits(), 0x1234);
    }

    #[test]
    fn test_unorm_widening() {
        let value = ChannelValue::from_bits(PixelChannelType::Int8, 0xFF);
        let converted = value.convert(PixelChannelType::Int16, PixelClass::Linear);
        assert_eq!(converted.bits(), 0xFFFF);

        let half_grey = ChannelValue::from_bits(PixelChannelType::Int8, 0x80);
        let as_float = half_grey.convert(PixelChannelType::Float32, PixelClass::Linear);
        assert!((f32::from_bits(as_float.bits()) - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_signed_normalized() {
        let minus_one = ChannelValue::from_f64(-1.0, PixelChannelType::Int8, PixelClass::Signed);
        assert_eq!(minus_one.bits(), 0x81);
        assert_eq!(minus_one.to_f64(PixelClass::Signed), -1.0);

        // -128 clamps to -1.0 like the GPU does
        let min = ChannelValue::from_bits(PixelChannelType::Int8, 0x80);
        assert_eq!(min.to_f64(PixelClass::Signed), -1.0);
    }

    #[test]
    fn test_integer_clamps() {
        let big = ChannelValue::from_bits(PixelChannelType::Int16, 1000);
        let narrowed = big.convert(PixelChannelType::Int8, PixelClass::Integer);
        assert_eq!(narrowed.bits(), 255);
    }

    #[test]
    fn test_one() {
        assert_eq!(
            ChannelValue::one(PixelChannelType::Int8, PixelClass::Linear).bits(),
            0xFF
        );
        assert_eq!(
            ChannelValue::one(PixelChannelType::Int8, PixelClass::Integer).bits(),
            1
        );
        assert_eq!(
            ChannelValue::one(PixelChannelType::Float32, PixelClass::Linear).bits(),
            1.0f32.to_bits()
        );
    }

    #[test]
    fn test_write_le() {
        let value = ChannelValue::from_bits(PixelChannelType::Int16, 0xABCD);
        let mut out = [0u8; 4];
        value.write_le(&mut out);
        assert_eq!(out, [0xCD, 0xAB, 0, 0]);
    }
}
