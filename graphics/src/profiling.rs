//! Profiling support via Tracy.
//!
//! Re-exports the CPU profiling macros of [`strata_core::profiling`]. Enable
//! them with this crate's `profiling` feature:
//!
//! ```toml
//! [dependencies]
//! strata-graphics = { version = "0.1", features = ["profiling"] }
//! ```
//!
//! Heaps plot their occupancy on every allocation and reclaim, so the Tracy
//! plot view shows GPU memory pressure next to the CPU timeline.

pub use strata_core::profiling::{
    frame_mark, profile_function, profile_heap_usage, profile_message, profile_plot,
    profile_scope,
};

/// Plot the occupancy of every heap owned by `manager`.
pub fn plot_memory_stats(manager: &crate::memory::MemoryManager) {
    let stats = manager.heap_stats();
    profile_heap_usage!("critical", stats.critical.used, stats.critical.capacity);
    profile_heap_usage!("upload", stats.upload.used, stats.upload.capacity);
    profile_heap_usage!("constant", stats.constant.used, stats.constant.capacity);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::DummyBackend;
    use crate::memory::MemoryManager;

    #[test]
    fn test_plot_memory_stats() {
        let manager = MemoryManager::new(Arc::new(DummyBackend::new())).unwrap();
        plot_memory_stats(&manager);
        profile_scope!("test_scope");
    }
}
