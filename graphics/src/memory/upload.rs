//! CPU to GPU transfers.
//!
//! The upload heap owns a staging buffer in CPU-writable memory, carved up by
//! a fenced [`RingAllocator`]. Uploads copy the caller's data into the ring
//! right away and queue an [`UploadTask`] that the copy queue executes later;
//! the staging space is reclaimed once the frame fence the upload was
//! recorded under completes.
//!
//! The same heap also creates committed buffers in upload memory for
//! [`ResourceHeapType::Upload`](super::ResourceHeapType::Upload) requests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{GraphicsApi, ResourceHandle};
use crate::error::{GraphicsError, GraphicsResult};
use crate::types::{HeapKind, ResourceDesc, TextureRegion};

use super::object::{Allocation, FrameFence, HeapCategory, MemoryObjectDescriptor, PendingReleases};
use super::ring::{align_up, RingAllocation, RingAllocator};
use super::HeapStats;

/// Row pitch alignment of texture data in buffers.
pub const TEXTURE_ROW_PITCH_ALIGNMENT: u32 = 256;

/// Alignment of texture data inside the staging buffer.
pub const TEXTURE_PLACEMENT_ALIGNMENT: u64 = 512;

/// Where an upload lands in its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadTarget {
    /// Byte offset inside a buffer.
    Buffer { offset: u64 },
    /// Region of a texture subresource; staged rows are `row_pitch` apart.
    Texture {
        subresource: u32,
        region: TextureRegion,
        row_pitch: u32,
    },
}

/// A staged copy waiting for the copy queue.
///
/// The task keeps its destination alive until it has been executed.
#[derive(Debug)]
pub struct UploadTask {
    destination: MemoryObjectDescriptor,
    source: ResourceHandle,
    source_offset: u64,
    size: u64,
    target: UploadTarget,
}

impl UploadTask {
    pub fn destination(&self) -> &MemoryObjectDescriptor {
        &self.destination
    }

    pub fn target(&self) -> UploadTarget {
        self.target
    }

    /// Number of staged bytes copied by the task.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Record the copy.
    pub fn execute(&self, api: &dyn GraphicsApi) -> GraphicsResult<()> {
        log::trace!(
            "Executing upload of {} bytes into resource {}",
            self.size,
            self.destination.handle().raw()
        );
        match self.target {
            UploadTarget::Buffer { offset } => api.copy_buffer_region(
                self.destination.handle(),
                self.destination.offset() + offset,
                self.source,
                self.source_offset,
                self.size,
            ),
            UploadTarget::Texture {
                subresource,
                region,
                row_pitch,
            } => api.copy_buffer_to_texture(
                self.destination.handle(),
                subresource,
                region,
                self.source,
                self.source_offset,
                row_pitch,
            ),
        }
    }
}

/// Staging ring plus committed upload-memory buffers.
pub struct UploadHeap {
    api: Arc<dyn GraphicsApi>,
    frame: Arc<FrameFence>,
    staging_buffer: ResourceHandle,
    ring: Mutex<RingAllocator>,
    pending: Mutex<Vec<UploadTask>>,
    releases: Arc<PendingReleases>,
    live_buffers: AtomicUsize,
}

impl UploadHeap {
    pub(crate) fn new(
        api: Arc<dyn GraphicsApi>,
        capacity: u64,
        frame: Arc<FrameFence>,
    ) -> GraphicsResult<Self> {
        let ring = RingAllocator::new(capacity, TEXTURE_PLACEMENT_ALIGNMENT);
        let staging_buffer = api.create_committed_resource(
            &ResourceDesc::buffer(ring.capacity()),
            HeapKind::Upload,
        )?;
        log::info!(
            "Created upload heap: {} MiB staging ring",
            ring.capacity() / (1024 * 1024)
        );
        Ok(Self {
            api,
            releases: Arc::new(PendingReleases::new(frame.clone())),
            frame,
            staging_buffer,
            ring: Mutex::new(ring),
            pending: Mutex::new(Vec::new()),
            live_buffers: AtomicUsize::new(0),
        })
    }

    /// Create a committed buffer in upload memory.
    ///
    /// Textures can not live in upload memory.
    pub fn allocate(&self, desc: &ResourceDesc) -> GraphicsResult<MemoryObjectDescriptor> {
        if desc.as_texture().is_some() {
            return Err(GraphicsError::InvalidArgument(
                "the upload heap only holds buffers".to_string(),
            ));
        }
        let handle = self.api.create_committed_resource(desc, HeapKind::Upload)?;
        self.live_buffers.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "Upload heap: created buffer {} ({} bytes)",
            handle.raw(),
            desc.byte_size()
        );
        let allocation = Allocation::owned(
            self.api.clone(),
            handle,
            HeapCategory::Upload,
            *desc,
            None,
            &self.releases,
        );
        Ok(MemoryObjectDescriptor::whole(Arc::new(allocation)))
    }

    /// Write `data` at `offset` into a buffer.
    ///
    /// CPU-writable destinations are written directly; anything else is
    /// staged and copied when the pending tasks execute.
    pub fn upload_to_buffer(
        &self,
        destination: &MemoryObjectDescriptor,
        offset: u64,
        data: &[u8],
    ) -> GraphicsResult<()> {
        if destination.desc().as_texture().is_some() {
            return Err(GraphicsError::InvalidArgument(
                "destination is not a buffer".to_string(),
            ));
        }
        let size = data.len() as u64;
        if offset.checked_add(size).map_or(true, |end| end > destination.size()) {
            return Err(GraphicsError::OutOfBounds(format!(
                "write of {size} bytes at {offset} exceeds buffer size {}",
                destination.size()
            )));
        }
        if size == 0 {
            return Ok(());
        }

        match destination.category() {
            HeapCategory::Upload | HeapCategory::VolatileConst | HeapCategory::PersistentConst => {
                self.api
                    .write_buffer(destination.handle(), destination.offset() + offset, data)
            }
            HeapCategory::Critical => {
                let staged = self.stage(size)?;
                self.api
                    .write_buffer(self.staging_buffer, staged.offset, data)?;
                self.push(UploadTask {
                    destination: destination.clone(),
                    source: self.staging_buffer,
                    source_offset: staged.offset,
                    size,
                    target: UploadTarget::Buffer { offset },
                });
                Ok(())
            }
        }
    }

    /// Stage rows of pixel data for a texture subresource region.
    ///
    /// `data` holds `region.height * region.depth` rows that start
    /// `bytes_per_row` bytes apart; zero means tightly packed.
    pub fn upload_to_texture(
        &self,
        destination: &MemoryObjectDescriptor,
        subresource: u32,
        region: TextureRegion,
        data: &[u8],
        bytes_per_row: u32,
    ) -> GraphicsResult<()> {
        let texture = destination.desc().as_texture().ok_or_else(|| {
            GraphicsError::InvalidArgument("destination is not a texture".to_string())
        })?;
        if subresource >= texture.subresource_count() {
            return Err(GraphicsError::OutOfBounds(format!(
                "subresource {subresource} of {}",
                texture.subresource_count()
            )));
        }
        let extent = texture.mip_extent(texture.subresource_mip(subresource));
        if !region.fits_within(extent) {
            return Err(GraphicsError::OutOfBounds(format!(
                "region {region:?} exceeds subresource extent {extent:?}"
            )));
        }

        let row_size = region.extent.width * texture.format.bytes_per_pixel();
        let source_pitch = if bytes_per_row == 0 { row_size } else { bytes_per_row };
        if source_pitch < row_size {
            return Err(GraphicsError::InvalidArgument(format!(
                "{bytes_per_row} bytes per row can not hold {row_size} byte rows"
            )));
        }
        let rows = u64::from(region.extent.height) * u64::from(region.extent.depth);
        if rows == 0 || row_size == 0 {
            return Ok(());
        }
        let needed = (rows - 1) * u64::from(source_pitch) + u64::from(row_size);
        if (data.len() as u64) < needed {
            return Err(GraphicsError::InvalidArgument(format!(
                "{} bytes of pixel data, region needs {needed}",
                data.len()
            )));
        }

        let row_pitch = align_up(u64::from(row_size), u64::from(TEXTURE_ROW_PITCH_ALIGNMENT));
        let size = row_pitch * rows;
        let mut staged_rows = vec![0u8; size as usize];
        for (row, chunk) in staged_rows.chunks_exact_mut(row_pitch as usize).enumerate() {
            let start = row * source_pitch as usize;
            chunk[..row_size as usize].copy_from_slice(&data[start..start + row_size as usize]);
        }

        let staged = self.stage(size)?;
        self.api
            .write_buffer(self.staging_buffer, staged.offset, &staged_rows)?;
        log::trace!(
            "Upload heap: staged {} rows for resource {} at {:#x}",
            rows,
            destination.handle().raw(),
            staged.offset
        );
        self.push(UploadTask {
            destination: destination.clone(),
            source: self.staging_buffer,
            source_offset: staged.offset,
            size,
            target: UploadTarget::Texture {
                subresource,
                region,
                row_pitch: row_pitch as u32,
            },
        });
        Ok(())
    }

    /// Hand every queued task to the caller, oldest first.
    pub fn take_pending(&self) -> Vec<UploadTask> {
        std::mem::take(&mut *self.pending.lock())
    }

    /// Number of tasks waiting to be taken.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Reclaim staging space and destroy released buffers whose fence has
    /// completed. Returns the number of buffers destroyed.
    pub fn reclaim(&self) -> usize {
        let completed = self.api.completed_fence_value();
        self.ring.lock().retire(completed);
        let released = self.releases.drain_completed(completed);
        let count = released.len();
        for release in released {
            self.api.release_resource(release.handle);
        }
        self.live_buffers.fetch_sub(count, Ordering::Relaxed);
        count
    }

    /// Current usage of the staging ring.
    pub fn stats(&self) -> HeapStats {
        let ring = self.ring.lock();
        HeapStats {
            capacity: ring.capacity(),
            used: ring.used(),
            allocations: self.live_buffers.load(Ordering::Relaxed),
            pending_releases: self.releases.len(),
        }
    }

    fn push(&self, task: UploadTask) {
        self.pending.lock().push(task);
    }

    /// Reserve staging space, aligned to [`TEXTURE_PLACEMENT_ALIGNMENT`].
    fn stage(&self, size: u64) -> GraphicsResult<RingAllocation> {
        let fence = self.frame.get();
        let mut ring = self.ring.lock();
        ring.retire(self.api.completed_fence_value());

        if let Some(staged) = ring.allocate(size, fence) {
            strata_core::profile_heap_usage!("upload", ring.used(), ring.capacity());
            return Ok(staged);
        }

        let waitable = ring
            .newest_fence_before(fence)
            .filter(|&value| value > self.api.completed_fence_value());
        if let Some(value) = waitable {
            log::warn!(
                "Upload ring exhausted, waiting for fence {} to reuse staging memory",
                value
            );
            self.api.wait_for_fence(value)?;
            ring.retire(self.api.completed_fence_value());
            if let Some(staged) = ring.allocate(size, fence) {
                return Ok(staged);
            }
        }

        Err(GraphicsError::AllocationFailure(format!(
            "upload ring can not fit {} bytes ({} of {} bytes in use)",
            size,
            ring.used(),
            ring.capacity()
        )))
    }
}

impl Drop for UploadHeap {
    fn drop(&mut self) {
        let pending = self.pending.get_mut().len();
        if pending > 0 {
            log::warn!("Dropping upload heap with {} unexecuted uploads", pending);
        }
        let newest = self
            .releases
            .newest_fence()
            .max(self.ring.get_mut().newest_fence());
        if let Some(fence) = newest {
            if let Err(err) = self.api.wait_for_fence(fence) {
                log::error!("Failed to wait for fence {} on heap teardown: {}", fence, err);
            }
        }
        for release in self.releases.drain_all() {
            self.api.release_resource(release.handle);
        }
        self.api.release_resource(self.staging_buffer);
        log::info!("Destroyed upload heap");
    }
}
