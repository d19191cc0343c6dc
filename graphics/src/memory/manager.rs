//! Memory manager: the entry point for creating GPU resources.

use std::sync::Arc;

use crate::backend::{GraphicsApi, DEFAULT_PLACEMENT_ALIGNMENT};
use crate::error::{GraphicsError, GraphicsResult};
use crate::resources::{
    IndexBuffer, PersistentConstBuffer, Texture1D, Texture2D, Texture3D, TextureCube,
    VertexBuffer, VolatileConstBuffer,
};
use crate::types::{ClearValue, Format, ResourceDesc, ResourceFlags, TextureDesc};

use super::const_buffer::ConstBufferHeap;
use super::critical::CriticalHeap;
use super::object::{FrameFence, HeapCategory, MemoryObject, MemoryObjectDescriptor, ResourceHeapType};
use super::upload::UploadHeap;
use super::HeapStats;

const MIB: u64 = 1024 * 1024;

/// Sizes of the heaps a [`MemoryManager`] creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryManagerConfig {
    /// Size of the GPU-resident arena.
    pub critical_heap_size: u64,
    /// Size of the staging ring.
    pub upload_heap_size: u64,
    /// Size of one volatile constant buffer page.
    pub volatile_page_size: u64,
    /// Placement alignment inside the critical heap.
    pub placement_alignment: u64,
}

impl Default for MemoryManagerConfig {
    fn default() -> Self {
        Self {
            critical_heap_size: 256 * MIB,
            upload_heap_size: 32 * MIB,
            volatile_page_size: 64 * 1024,
            placement_alignment: DEFAULT_PLACEMENT_ALIGNMENT,
        }
    }
}

impl MemoryManagerConfig {
    /// Set the critical heap size.
    pub fn with_critical_heap_size(mut self, size: u64) -> Self {
        self.critical_heap_size = size;
        self
    }

    /// Set the staging ring size.
    pub fn with_upload_heap_size(mut self, size: u64) -> Self {
        self.upload_heap_size = size;
        self
    }

    /// Set the volatile constant buffer page size.
    pub fn with_volatile_page_size(mut self, size: u64) -> Self {
        self.volatile_page_size = size;
        self
    }

    /// Set the critical heap placement alignment (a power of two).
    pub fn with_placement_alignment(mut self, alignment: u64) -> Self {
        self.placement_alignment = alignment;
        self
    }
}

/// Usage of every heap of a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryStats {
    pub critical: HeapStats,
    pub upload: HeapStats,
    pub constant: HeapStats,
}

/// Owns the heaps of one engine instance and creates typed resources in them.
///
/// # Example
///
/// ```
/// use strata_graphics::backend::create_backend;
/// use strata_graphics::memory::{MemoryManager, ResourceHeapType};
/// use strata_graphics::types::{Format, ResourceFlags};
///
/// let manager = MemoryManager::new(create_backend()?)?;
/// let texture = manager.create_texture_2d(
///     ResourceHeapType::Critical,
///     256,
///     256,
///     Format::R8G8B8A8Unorm,
///     ResourceFlags::empty(),
///     1,
/// )?;
/// assert_eq!((texture.width(), texture.height()), (256, 256));
/// # Ok::<(), strata_graphics::GraphicsError>(())
/// ```
pub struct MemoryManager {
    api: Arc<dyn GraphicsApi>,
    frame: Arc<FrameFence>,
    critical: CriticalHeap,
    upload: UploadHeap,
    const_buffers: ConstBufferHeap,
}

impl MemoryManager {
    /// Create a manager with the default heap sizes.
    pub fn new(api: Arc<dyn GraphicsApi>) -> GraphicsResult<Self> {
        Self::with_config(api, MemoryManagerConfig::default())
    }

    /// Create a manager with custom heap sizes.
    pub fn with_config(api: Arc<dyn GraphicsApi>, config: MemoryManagerConfig) -> GraphicsResult<Self> {
        if !config.placement_alignment.is_power_of_two() {
            return Err(GraphicsError::InvalidArgument(format!(
                "placement alignment must be a power of 2, got {}",
                config.placement_alignment
            )));
        }
        if config.critical_heap_size == 0 || config.upload_heap_size == 0 {
            return Err(GraphicsError::InvalidArgument(
                "heap sizes must not be zero".to_string(),
            ));
        }

        let frame = Arc::new(FrameFence::default());
        frame.set(api.completed_fence_value());
        let critical = CriticalHeap::new(
            api.clone(),
            config.critical_heap_size,
            config.placement_alignment,
            frame.clone(),
        );
        let upload = UploadHeap::new(api.clone(), config.upload_heap_size, frame.clone())?;
        let const_buffers = ConstBufferHeap::new(api.clone(), config.volatile_page_size, frame.clone());

        log::info!("Created memory manager on {} backend", api.name());
        Ok(Self {
            api,
            frame,
            critical,
            upload,
            const_buffers,
        })
    }

    /// The graphics API the heaps allocate from.
    pub fn api(&self) -> &Arc<dyn GraphicsApi> {
        &self.api
    }

    // ------------------------------------------------------------------
    // Buffers
    // ------------------------------------------------------------------

    /// Create a vertex buffer of `size` bytes.
    pub fn create_vertex_buffer(&self, heap: ResourceHeapType, size: u64) -> GraphicsResult<VertexBuffer> {
        if size == 0 {
            return Err(GraphicsError::InvalidArgument(
                "vertex buffer size must be at least one byte".to_string(),
            ));
        }
        let memory = self.allocate_resource(heap, ResourceDesc::buffer(size))?;
        Ok(VertexBuffer::new(memory))
    }

    /// Create an index buffer of `size` bytes holding `index_count` 16 or 32
    /// bit indices.
    pub fn create_index_buffer(
        &self,
        heap: ResourceHeapType,
        size: u64,
        index_count: u64,
    ) -> GraphicsResult<IndexBuffer> {
        if index_count == 0 {
            return Err(GraphicsError::InvalidArgument(
                "index count must be at least one".to_string(),
            ));
        }
        let exact = |stride: u64| index_count.checked_mul(stride) == Some(size);
        if !exact(2) && !exact(4) {
            return Err(GraphicsError::InvalidArgument(format!(
                "{size} bytes can not hold exactly {index_count} 16 or 32 bit indices"
            )));
        }
        let memory = self.allocate_resource(heap, ResourceDesc::buffer(size))?;
        Ok(IndexBuffer::new(memory, index_count))
    }

    // ------------------------------------------------------------------
    // Textures
    // ------------------------------------------------------------------

    /// Create a 1D texture array.
    pub fn create_texture_1d(
        &self,
        heap: ResourceHeapType,
        width: u32,
        format: Format,
        flags: ResourceFlags,
        array_size: u16,
    ) -> GraphicsResult<Texture1D> {
        check_count("array size", array_size)?;
        let desc = ResourceDesc::texture_1d_array(width, format, array_size, flags);
        let (memory, texture) = self.allocate_texture(heap, desc)?;
        Ok(Texture1D::new(memory, texture))
    }

    /// Create a 2D texture array.
    pub fn create_texture_2d(
        &self,
        heap: ResourceHeapType,
        width: u32,
        height: u32,
        format: Format,
        flags: ResourceFlags,
        array_size: u16,
    ) -> GraphicsResult<Texture2D> {
        self.create_texture_2d_with_mips(heap, width, height, format, flags, array_size, 1)
    }

    /// Create a 2D texture array with a mip chain.
    #[allow(clippy::too_many_arguments)]
    pub fn create_texture_2d_with_mips(
        &self,
        heap: ResourceHeapType,
        width: u32,
        height: u32,
        format: Format,
        flags: ResourceFlags,
        array_size: u16,
        mip_levels: u16,
    ) -> GraphicsResult<Texture2D> {
        check_count("array size", array_size)?;
        let desc = ResourceDesc::texture_2d_array(width, height, format, array_size, flags)
            .with_mip_levels(mip_levels);
        let (memory, texture) = self.allocate_texture(heap, desc)?;
        Ok(Texture2D::new(memory, texture))
    }

    /// Create a 3D texture.
    pub fn create_texture_3d(
        &self,
        heap: ResourceHeapType,
        width: u32,
        height: u32,
        depth: u16,
        format: Format,
        flags: ResourceFlags,
    ) -> GraphicsResult<Texture3D> {
        check_count("depth", depth)?;
        let desc = ResourceDesc::texture_3d(width, height, depth, format, flags);
        let (memory, texture) = self.allocate_texture(heap, desc)?;
        Ok(Texture3D::new(memory, texture))
    }

    /// Create a cube map.
    pub fn create_texture_cube(
        &self,
        heap: ResourceHeapType,
        width: u32,
        height: u32,
        format: Format,
        flags: ResourceFlags,
    ) -> GraphicsResult<TextureCube> {
        if width != height {
            return Err(GraphicsError::InvalidArgument(format!(
                "cube faces must be square, got {width}x{height}"
            )));
        }
        let desc = ResourceDesc::cube_map(width, height, format, flags);
        let (memory, texture) = self.allocate_texture(heap, desc)?;
        Ok(TextureCube::new(memory, texture))
    }

    fn allocate_texture(
        &self,
        heap: ResourceHeapType,
        desc: ResourceDesc,
    ) -> GraphicsResult<(MemoryObjectDescriptor, TextureDesc)> {
        let Some(texture) = desc.as_texture().copied() else {
            unreachable!("texture factories build texture descriptions");
        };
        validate_texture(&texture)?;
        let memory = self.allocate_resource(heap, desc)?;
        Ok((memory, texture))
    }

    // ------------------------------------------------------------------
    // Constant buffers
    // ------------------------------------------------------------------

    /// Create per-frame constants holding `data`.
    pub fn create_volatile_const_buffer(&self, data: &[u8]) -> GraphicsResult<VolatileConstBuffer> {
        let memory = self.const_buffers.allocate_volatile(data)?;
        Ok(VolatileConstBuffer::new(memory))
    }

    /// Create per-frame constants holding `value`.
    pub fn create_volatile_const_buffer_from<T: bytemuck::Pod>(
        &self,
        value: &T,
    ) -> GraphicsResult<VolatileConstBuffer> {
        self.create_volatile_const_buffer(bytemuck::bytes_of(value))
    }

    /// Create constants with a stable address holding `data`.
    pub fn create_persistent_const_buffer(&self, data: &[u8]) -> GraphicsResult<PersistentConstBuffer> {
        let memory = self.const_buffers.allocate_persistent(data)?;
        Ok(PersistentConstBuffer::new(memory))
    }

    /// Create constants with a stable address holding `value`.
    pub fn create_persistent_const_buffer_from<T: bytemuck::Pod>(
        &self,
        value: &T,
    ) -> GraphicsResult<PersistentConstBuffer> {
        self.create_persistent_const_buffer(bytemuck::bytes_of(value))
    }

    // ------------------------------------------------------------------
    // Residency
    // ------------------------------------------------------------------

    /// Pin resources in video memory, making evicted ones resident again.
    ///
    /// Locks nest: every lock needs a matching unlock.
    pub fn lock_resident(&self, resources: &[&dyn MemoryObject]) -> GraphicsResult<()> {
        let evicted: Vec<_> = resources
            .iter()
            .map(|resource| resource.memory())
            .filter(|memory| memory.allocation().lock_resident())
            .map(MemoryObjectDescriptor::handle)
            .collect();
        if !evicted.is_empty() {
            log::debug!("Making {} evicted resources resident", evicted.len());
            self.api.make_resident(&evicted)?;
        }
        Ok(())
    }

    /// Release one lock on each resource.
    pub fn unlock_resident(&self, resources: &[&dyn MemoryObject]) {
        for resource in resources {
            let memory = resource.memory();
            if !memory.allocation().unlock_resident() {
                log::warn!(
                    "Unlocking resource {} that is not locked resident",
                    memory.handle().raw()
                );
            }
        }
    }

    /// Evict every resource that is resident and not locked.
    ///
    /// Volatile constants live in shared pages and are never evicted.
    /// Returns the number of resources evicted.
    pub fn evict_unlocked(&self, resources: &[&dyn MemoryObject]) -> usize {
        let evicted: Vec<_> = resources
            .iter()
            .map(|resource| resource.memory())
            .filter(|memory| memory.category() != HeapCategory::VolatileConst)
            .filter(|memory| memory.allocation().try_evict())
            .map(MemoryObjectDescriptor::handle)
            .collect();
        if !evicted.is_empty() {
            log::debug!("Evicting {} resources", evicted.len());
            self.api.evict(&evicted);
        }
        evicted.len()
    }

    // ------------------------------------------------------------------
    // Frames and uploads
    // ------------------------------------------------------------------

    /// The staging heap used to fill GPU-resident resources.
    pub fn upload_heap(&self) -> &UploadHeap {
        &self.upload
    }

    /// Execute every queued upload right away.
    ///
    /// Returns the number of uploads executed.
    pub fn execute_pending_uploads(&self) -> GraphicsResult<usize> {
        let tasks = self.upload.take_pending();
        for task in &tasks {
            task.execute(self.api.as_ref())?;
        }
        Ok(tasks.len())
    }

    /// Start recording a frame that the GPU signals with `value` when done.
    ///
    /// Memory released from now on is recycled only after `value` completes.
    pub fn set_frame_fence(&self, value: u64) {
        log::trace!("Frame fence set to {}", value);
        self.frame.set(value);
    }

    /// Fence value of the frame being recorded.
    pub fn frame_fence(&self) -> u64 {
        self.frame.get()
    }

    /// Recycle memory of every heap whose fence has completed.
    ///
    /// Returns the number of resources destroyed.
    pub fn reclaim(&self) -> usize {
        strata_core::profile_scope!("memory_reclaim");
        self.critical.reclaim() + self.upload.reclaim() + self.const_buffers.reclaim()
    }

    /// Usage of every heap.
    pub fn heap_stats(&self) -> MemoryStats {
        MemoryStats {
            critical: self.critical.stats(),
            upload: self.upload.stats(),
            constant: self.const_buffers.stats(),
        }
    }

    fn allocate_resource(
        &self,
        heap: ResourceHeapType,
        desc: ResourceDesc,
    ) -> GraphicsResult<MemoryObjectDescriptor> {
        let clear_value = clear_value_hint(&desc);
        match heap {
            ResourceHeapType::Critical => self.critical.allocate(&desc, clear_value.as_ref()),
            ResourceHeapType::Upload => self.upload.allocate(&desc),
        }
    }
}

impl std::fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("backend", &self.api.name())
            .field("frame_fence", &self.frame.get())
            .field("stats", &self.heap_stats())
            .finish()
    }
}

/// Depth 1, stencil 0 for textures that may be bound as depth-stencil targets.
fn clear_value_hint(desc: &ResourceDesc) -> Option<ClearValue> {
    if !desc.is_depth_stencil_texture() {
        return None;
    }
    let format = desc.as_texture()?.format;
    let format = format.depth_stencil_view_format().unwrap_or(format);
    Some(ClearValue::depth_stencil(format, 1.0, 0))
}

fn check_count(what: &str, count: u16) -> GraphicsResult<()> {
    if count < 1 {
        return Err(GraphicsError::InvalidArgument(format!(
            "{what} must be at least one"
        )));
    }
    Ok(())
}

fn validate_texture(texture: &TextureDesc) -> GraphicsResult<()> {
    if texture.width == 0 || texture.height == 0 {
        return Err(GraphicsError::InvalidArgument(format!(
            "texture extent must not be zero, got {}x{}",
            texture.width, texture.height
        )));
    }
    if texture.format == Format::Unknown {
        return Err(GraphicsError::InvalidArgument(
            "texture format must be known".to_string(),
        ));
    }
    let largest = texture.width.max(texture.height).max(texture.depth());
    let max_mips = 32 - largest.leading_zeros();
    if texture.mip_levels == 0 || u32::from(texture.mip_levels) > max_mips {
        return Err(GraphicsError::InvalidArgument(format!(
            "{} mip levels requested, a {largest} texel texture has at most {max_mips}",
            texture.mip_levels
        )));
    }
    let render_flags = ResourceFlags::ALLOW_RENDER_TARGET | ResourceFlags::ALLOW_DEPTH_STENCIL;
    if texture.flags.contains(render_flags) {
        return Err(GraphicsError::InvalidArgument(
            "a texture can not be both render target and depth-stencil".to_string(),
        ));
    }
    Ok(())
}

static_assertions::assert_impl_all!(MemoryManager: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    fn manager() -> (Arc<DummyBackend>, MemoryManager) {
        let backend = Arc::new(DummyBackend::new());
        let config = MemoryManagerConfig::default()
            .with_critical_heap_size(4 * MIB)
            .with_upload_heap_size(MIB);
        let manager = MemoryManager::with_config(backend.clone(), config).unwrap();
        (backend, manager)
    }

    #[test]
    fn test_config_defaults() {
        let config = MemoryManagerConfig::default();
        assert_eq!(config.critical_heap_size, 256 * MIB);
        assert_eq!(config.upload_heap_size, 32 * MIB);
        assert_eq!(config.volatile_page_size, 64 * 1024);
        assert_eq!(config.placement_alignment, 64 * 1024);
    }

    #[test]
    fn test_invalid_config() {
        let backend = Arc::new(DummyBackend::new());
        let config = MemoryManagerConfig::default().with_placement_alignment(3000);
        assert!(matches!(
            MemoryManager::with_config(backend, config),
            Err(GraphicsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_depth_textures_get_clear_value() {
        let (backend, manager) = manager();
        let depth = manager
            .create_texture_2d(
                ResourceHeapType::Critical,
                64,
                64,
                Format::R32Typeless,
                ResourceFlags::ALLOW_DEPTH_STENCIL,
                1,
            )
            .unwrap();
        let clear = backend.clear_value(depth.memory().handle()).unwrap();
        assert_eq!(clear, ClearValue::depth_stencil(Format::D32Float, 1.0, 0));

        let color = manager
            .create_texture_2d(
                ResourceHeapType::Critical,
                64,
                64,
                Format::R8G8B8A8Unorm,
                ResourceFlags::ALLOW_RENDER_TARGET,
                1,
            )
            .unwrap();
        assert_eq!(backend.clear_value(color.memory().handle()), None);
    }

    #[test]
    fn test_index_buffer_validation() {
        let (_backend, manager) = manager();
        let buffer = manager
            .create_index_buffer(ResourceHeapType::Critical, 12, 6)
            .unwrap();
        assert_eq!(buffer.index_format(), Format::R16Uint);
        let buffer = manager
            .create_index_buffer(ResourceHeapType::Upload, 24, 6)
            .unwrap();
        assert_eq!(buffer.index_format(), Format::R32Uint);

        assert!(manager
            .create_index_buffer(ResourceHeapType::Critical, 10, 6)
            .is_err());
        assert!(manager
            .create_index_buffer(ResourceHeapType::Critical, 0, 0)
            .is_err());
    }

    #[test]
    fn test_mip_count_validation() {
        let (_backend, manager) = manager();
        let texture = manager
            .create_texture_2d_with_mips(
                ResourceHeapType::Critical,
                256,
                64,
                Format::R8Unorm,
                ResourceFlags::empty(),
                1,
                9,
            )
            .unwrap();
        assert_eq!(texture.mip_levels(), 9);

        let err = manager
            .create_texture_2d_with_mips(
                ResourceHeapType::Critical,
                256,
                64,
                Format::R8Unorm,
                ResourceFlags::empty(),
                1,
                10,
            )
            .unwrap_err();
        assert!(matches!(err, GraphicsError::InvalidArgument(_)));
    }

    #[test]
    fn test_upload_heap_textures_rejected() {
        let (backend, manager) = manager();
        let created = backend.created_resource_count();
        let err = manager
            .create_texture_1d(
                ResourceHeapType::Upload,
                64,
                Format::R8Unorm,
                ResourceFlags::empty(),
                1,
            )
            .unwrap_err();
        assert!(matches!(err, GraphicsError::InvalidArgument(_)));
        assert_eq!(backend.created_resource_count(), created);
    }

    #[test]
    fn test_manager_starts_at_completed_fence() {
        let backend = Arc::new(DummyBackend::new());
        backend.signal_fence(41);
        let manager = MemoryManager::new(backend).unwrap();
        assert_eq!(manager.frame_fence(), 41);
    }
}
