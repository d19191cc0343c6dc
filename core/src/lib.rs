//! # Strata Engine Core
//!
//! Core crate for the Strata engine: the CPU-side pixel model shared between
//! asset code and the GPU memory layer, and Tracy profiling macros.

pub mod pixel;
pub mod profiling;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the core library version.
pub fn init() {
    log::info!("Strata Core v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
