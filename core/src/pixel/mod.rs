//! CPU-side pixel types.
//!
//! Provides the abstract pixel description used when loading images into GPU
//! textures: [`PixelChannelType`] and [`PixelClass`] describe how channels are
//! stored and interpreted, [`PixelReader`] describes how to pull channel values
//! out of a raw byte buffer, and [`ChannelValue`] converts a channel between
//! storage types.

mod reader;
mod types;

pub use reader::{Channel, Pixel, PixelReader};
pub use types::{ChannelValue, PixelChannelType, PixelClass};
