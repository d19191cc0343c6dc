//! Common utilities for memory and view integration tests.
//!
//! [`TestContext`] wires a [`DummyBackend`] to a memory manager and one
//! descriptor heap of every kind, so tests can inspect what reached the API.

#![allow(dead_code)]

use std::sync::Arc;

use strata_graphics::backend::DummyBackend;
use strata_graphics::descriptors::{DsvHeap, PersistentResViewHeap, RtvHeap};
use strata_graphics::memory::{MemoryManager, MemoryManagerConfig};

/// Descriptor slots per test heap.
pub const HEAP_CAPACITY: u32 = 64;

/// Shared fixture of the integration tests.
pub struct TestContext {
    pub backend: Arc<DummyBackend>,
    pub manager: Arc<MemoryManager>,
    pub srv_heap: Arc<PersistentResViewHeap>,
    pub rtv_heap: RtvHeap,
    pub dsv_heap: DsvHeap,
}

impl TestContext {
    /// Create a context with the default heap sizes.
    pub fn new() -> Self {
        Self::with_config(MemoryManagerConfig::default())
    }

    /// Create a context with custom heap sizes.
    pub fn with_config(config: MemoryManagerConfig) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let backend = Arc::new(DummyBackend::new());
        let manager = MemoryManager::with_config(backend.clone(), config)
            .expect("memory manager creation");
        let srv_heap = PersistentResViewHeap::new(backend.clone(), HEAP_CAPACITY)
            .expect("srv heap creation");
        let rtv_heap = RtvHeap::new(backend.clone(), HEAP_CAPACITY).expect("rtv heap creation");
        let dsv_heap = DsvHeap::new(backend.clone(), HEAP_CAPACITY).expect("dsv heap creation");

        Self {
            backend,
            manager: Arc::new(manager),
            srv_heap: Arc::new(srv_heap),
            rtv_heap,
            dsv_heap,
        }
    }

    /// Pretend the GPU finished every frame up to `value` and recycle memory.
    pub fn complete_frame(&self, value: u64) -> usize {
        self.backend.signal_fence(value);
        self.manager.reclaim()
    }
}

/// Generate a test pattern of `size` bytes.
pub fn generate_test_pattern(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i * 7 % 251) as u8).collect()
}
