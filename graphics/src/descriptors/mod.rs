//! Descriptor heaps.
//!
//! A descriptor heap is a fixed array of slots the GPU reads view
//! descriptions from. Each slot is owned by exactly one
//! [`DescriptorReference`], which gives it back when dropped.

mod heap;

pub use heap::{DescriptorHeap, DescriptorReference, DsvHeap, PersistentResViewHeap, RtvHeap};
