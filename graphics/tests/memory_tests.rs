//! Integration tests for the memory manager and its heaps.
//!
//! Every test runs against the dummy backend, which records what reached
//! the graphics API so allocator behavior can be checked from the outside.

mod common;

use rstest::rstest;

use common::{generate_test_pattern, TestContext};
use strata_graphics::memory::{HeapCategory, MemoryManagerConfig, MemoryObject, ResourceHeapType};
use strata_graphics::types::{Format, HeapKind, ResourceFlags, TextureRegion};
use strata_graphics::{GraphicsApi, GraphicsError};

const KIB: u64 = 1024;

// ============================================================================
// Shape queries
// ============================================================================

#[rstest]
#[case::single(64, 32, 1)]
#[case::array(128, 128, 6)]
#[case::wide(1024, 1, 2)]
fn test_texture_2d_shape_matches_request(
    #[case] width: u32,
    #[case] height: u32,
    #[case] array_size: u16,
) {
    let ctx = TestContext::new();
    let texture = ctx
        .manager
        .create_texture_2d(
            ResourceHeapType::Critical,
            width,
            height,
            Format::R16G16B16A16Float,
            ResourceFlags::empty(),
            array_size,
        )
        .unwrap();

    assert_eq!(texture.width(), width);
    assert_eq!(texture.height(), height);
    assert_eq!(texture.array_size(), u32::from(array_size));
    assert_eq!(texture.mip_levels(), 1);
    assert_eq!(texture.format(), Format::R16G16B16A16Float);
    assert_eq!(texture.memory().category(), HeapCategory::Critical);
}

#[test]
fn test_other_texture_shapes() {
    let ctx = TestContext::new();
    let line = ctx
        .manager
        .create_texture_1d(ResourceHeapType::Critical, 256, Format::R8Unorm, ResourceFlags::empty(), 4)
        .unwrap();
    assert_eq!((line.width(), line.array_size()), (256, 4));

    let volume = ctx
        .manager
        .create_texture_3d(
            ResourceHeapType::Critical,
            32,
            16,
            8,
            Format::R32Float,
            ResourceFlags::empty(),
        )
        .unwrap();
    assert_eq!((volume.width(), volume.height(), volume.depth()), (32, 16, 8));

    let cube = ctx
        .manager
        .create_texture_cube(
            ResourceHeapType::Critical,
            64,
            64,
            Format::R8G8B8A8Unorm,
            ResourceFlags::empty(),
        )
        .unwrap();
    assert_eq!((cube.width(), cube.height()), (64, 64));
    assert_eq!(cube.desc().array_size(), 6);
}

#[test]
fn test_texture_subresource_indexing() {
    let ctx = TestContext::new();
    let texture = ctx
        .manager
        .create_texture_2d_with_mips(
            ResourceHeapType::Critical,
            64,
            64,
            Format::R8G8B8A8Unorm,
            ResourceFlags::empty(),
            3,
            7,
        )
        .unwrap();
    assert_eq!(texture.mip_levels(), 7);
    assert_eq!(texture.subresource_index(0, 0), 0);
    assert_eq!(texture.subresource_index(2, 1), 9);
    assert_eq!(texture.subresource_index(6, 2), 20);
}

#[test]
fn test_clone_shares_allocation() {
    let ctx = TestContext::new();
    let buffer = ctx
        .manager
        .create_vertex_buffer(ResourceHeapType::Critical, 4 * KIB)
        .unwrap();
    let copy = buffer.clone();
    assert_eq!(buffer, copy);
    assert_eq!(buffer.memory().share_count(), 2);
    assert_eq!(buffer.memory().handle(), copy.memory().handle());
}

// ============================================================================
// Invalid arguments
// ============================================================================

#[rstest]
#[case::texture_1d_array_zero(0)]
#[case::texture_2d_array_zero(1)]
#[case::texture_3d_depth_zero(2)]
#[case::cube_not_square(3)]
fn test_invalid_shape_leaves_heaps_untouched(#[case] which: u32) {
    let ctx = TestContext::new();
    let before = ctx.manager.heap_stats();
    let created = ctx.backend.created_resource_count();

    let manager = &ctx.manager;
    let heap = ResourceHeapType::Critical;
    let flags = ResourceFlags::empty();
    let result = match which {
        0 => manager.create_texture_1d(heap, 64, Format::R8Unorm, flags, 0).map(drop),
        1 => manager.create_texture_2d(heap, 64, 64, Format::R8Unorm, flags, 0).map(drop),
        2 => manager.create_texture_3d(heap, 64, 64, 0, Format::R8Unorm, flags).map(drop),
        _ => manager.create_texture_cube(heap, 64, 32, Format::R8Unorm, flags).map(drop),
    };

    assert!(matches!(result, Err(GraphicsError::InvalidArgument(_))));
    assert_eq!(ctx.manager.heap_stats(), before);
    assert_eq!(ctx.backend.created_resource_count(), created);
}

#[rstest]
#[case::short_of_sixteen_bit(10, 6)]
#[case::between_strides(36, 12)]
#[case::overflowing_count(8, u64::MAX / 2 + 5)]
#[case::overflowing_wide_count(16, u64::MAX / 4 + 5)]
fn test_index_buffer_size_mismatch(#[case] size: u64, #[case] index_count: u64) {
    let ctx = TestContext::new();
    let created = ctx.backend.created_resource_count();
    let result = ctx
        .manager
        .create_index_buffer(ResourceHeapType::Critical, size, index_count);
    assert!(matches!(result, Err(GraphicsError::InvalidArgument(_))));
    assert_eq!(ctx.backend.created_resource_count(), created);
}

#[test]
fn test_textures_rejected_in_upload_heap() {
    let ctx = TestContext::new();
    let result = ctx.manager.create_texture_2d(
        ResourceHeapType::Upload,
        16,
        16,
        Format::R8G8B8A8Unorm,
        ResourceFlags::empty(),
        1,
    );
    assert!(matches!(result, Err(GraphicsError::InvalidArgument(_))));
}

// ============================================================================
// Heap exhaustion and fences
// ============================================================================

#[test]
fn test_critical_heap_exhaustion() {
    let ctx = TestContext::with_config(
        MemoryManagerConfig::default().with_critical_heap_size(1024 * KIB),
    );
    let result = ctx.manager.create_texture_2d(
        ResourceHeapType::Critical,
        1024,
        1024,
        Format::R8G8B8A8Unorm,
        ResourceFlags::empty(),
        1,
    );
    assert!(matches!(result, Err(GraphicsError::AllocationFailure(_))));
    assert_eq!(ctx.manager.heap_stats().critical.used, 0);
}

#[test]
fn test_released_memory_waits_for_frame_fence() {
    let ctx = TestContext::with_config(
        MemoryManagerConfig::default().with_critical_heap_size(256 * KIB),
    );
    ctx.manager.set_frame_fence(1);

    let mut buffers: Vec<_> = (0..4)
        .map(|_| {
            ctx.manager
                .create_vertex_buffer(ResourceHeapType::Critical, 64 * KIB)
                .unwrap()
        })
        .collect();
    assert_eq!(ctx.manager.heap_stats().critical.used, 256 * KIB);

    // Released during frame 1, which the GPU may still be executing
    buffers.pop();
    assert_eq!(ctx.manager.heap_stats().critical.pending_releases, 1);
    assert!(matches!(
        ctx.manager.create_vertex_buffer(ResourceHeapType::Critical, 64 * KIB),
        Err(GraphicsError::AllocationFailure(_))
    ));

    // Once frame 2 is recorded the heap may wait for frame 1 to finish
    ctx.manager.set_frame_fence(2);
    let reused = ctx
        .manager
        .create_vertex_buffer(ResourceHeapType::Critical, 64 * KIB)
        .unwrap();
    assert_eq!(ctx.manager.heap_stats().critical.pending_releases, 0);
    assert_eq!(reused.memory().allocation().heap_range(), Some(192 * KIB..256 * KIB));
}

#[test]
fn test_reclaim_after_fence_completes() {
    let ctx = TestContext::new();
    ctx.manager.set_frame_fence(5);
    let live = ctx.backend.live_resource_count();

    let buffer = ctx
        .manager
        .create_persistent_const_buffer(&[0u8; 64])
        .unwrap();
    drop(buffer);
    assert_eq!(ctx.backend.live_resource_count(), live + 1);
    assert_eq!(ctx.complete_frame(4), 0);
    assert_eq!(ctx.complete_frame(5), 1);
    assert_eq!(ctx.backend.live_resource_count(), live);
}

// ============================================================================
// Residency
// ============================================================================

#[test]
fn test_locked_resources_are_not_evicted() {
    let ctx = TestContext::new();
    let locked = ctx
        .manager
        .create_vertex_buffer(ResourceHeapType::Critical, 4 * KIB)
        .unwrap();
    let unlocked = ctx
        .manager
        .create_index_buffer(ResourceHeapType::Critical, 600, 300)
        .unwrap();

    ctx.manager.lock_resident(&[&locked]).unwrap();
    assert_eq!(ctx.manager.evict_unlocked(&[&locked, &unlocked]), 1);
    assert!(locked.memory().is_resident());
    assert!(!unlocked.memory().is_resident());
    assert!(!ctx.backend.is_resident(unlocked.memory().handle()));

    // Locking an evicted resource brings it back
    ctx.manager.lock_resident(&[&unlocked]).unwrap();
    assert!(ctx.backend.is_resident(unlocked.memory().handle()));
    assert_eq!(unlocked.memory().lock_count(), 1);

    ctx.manager.unlock_resident(&[&locked, &unlocked]);
    assert_eq!(ctx.manager.evict_unlocked(&[&locked, &unlocked]), 2);
}

#[test]
fn test_volatile_constants_never_evicted() {
    let ctx = TestContext::new();
    let constants = ctx.manager.create_volatile_const_buffer(&[1u8; 32]).unwrap();
    assert_eq!(ctx.manager.evict_unlocked(&[&constants]), 0);
    assert!(constants.memory().is_resident());
}

// ============================================================================
// Uploads
// ============================================================================

#[test]
fn test_buffer_upload_through_staging() {
    let ctx = TestContext::new();
    let data = generate_test_pattern(1000);
    let buffer = ctx
        .manager
        .create_vertex_buffer(ResourceHeapType::Critical, data.len() as u64)
        .unwrap();

    ctx.manager
        .upload_heap()
        .upload_to_buffer(buffer.memory(), 0, &data)
        .unwrap();
    assert_eq!(ctx.manager.upload_heap().pending_count(), 1);
    assert_eq!(ctx.manager.execute_pending_uploads().unwrap(), 1);

    let contents = ctx
        .backend
        .read_buffer(buffer.memory().handle(), 0, data.len() as u64);
    assert_eq!(contents.unwrap(), data);
}

#[test]
fn test_upload_heap_buffers_written_directly() {
    let ctx = TestContext::new();
    let buffer = ctx
        .manager
        .create_vertex_buffer(ResourceHeapType::Upload, 256)
        .unwrap();
    assert_eq!(
        ctx.backend.placement(buffer.memory().handle()),
        Some((HeapKind::Upload, None))
    );

    ctx.manager
        .upload_heap()
        .upload_to_buffer(buffer.memory(), 16, &[7u8; 16])
        .unwrap();
    assert_eq!(ctx.manager.upload_heap().pending_count(), 0);
}

#[test]
fn test_texture_upload_out_of_bounds() {
    let ctx = TestContext::new();
    let texture = ctx
        .manager
        .create_texture_2d(
            ResourceHeapType::Critical,
            16,
            16,
            Format::R8Unorm,
            ResourceFlags::empty(),
            1,
        )
        .unwrap();
    let result = ctx.manager.upload_heap().upload_to_texture(
        texture.memory(),
        0,
        TextureRegion::new_2d(8, 8, 16, 16),
        &[0u8; 256],
        16,
    );
    assert!(matches!(result, Err(GraphicsError::OutOfBounds(_))));
}
