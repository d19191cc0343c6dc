//! Descriptor heap descriptors.

/// Kind of descriptors a heap stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorHeapKind {
    /// Constant buffer, shader resource and unordered access views.
    CbvSrvUav,
    /// Render target views.
    Rtv,
    /// Depth-stencil views.
    Dsv,
}

/// Descriptor for creating a descriptor heap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorHeapDesc {
    /// Debug label for the heap.
    pub label: Option<String>,
    /// Kind of descriptors stored.
    pub kind: DescriptorHeapKind,
    /// Number of descriptor slots.
    pub capacity: u32,
}

impl DescriptorHeapDesc {
    /// Create a new descriptor heap descriptor.
    pub fn new(kind: DescriptorHeapKind, capacity: u32) -> Self {
        Self {
            label: None,
            kind,
            capacity,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
