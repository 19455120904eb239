//! Host-visible buffers for per-frame data.
//!
//! A frame uploads its vertex and storage data once per submission, so the
//! buffers here are always placed in persistently mapped `CpuToGpu` memory
//! and filled with plain memory copies.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vellum_rhi::buffer::{Buffer, BufferUsage};
//! use vellum_rhi::device::Device;
//!
//! # fn example(device: Arc<Device>) -> Result<(), vellum_rhi::RhiError> {
//! let instances: [f32; 8] = [0.0, 0.0, 64.0, 64.0, 1.0, 0.0, 0.0, 1.0];
//! let buffer = Buffer::with_data(device, BufferUsage::Vertex, bytemuck::cast_slice(&instances))?;
//! assert_eq!(buffer.size(), 32);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::device::Device;
use crate::error::{RhiError, RhiResult, VkResultExt};

/// What a frame buffer is bound as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Per-instance attributes.
    Vertex,
    /// Entry of the storage buffer descriptor array.
    Storage,
}

impl BufferUsage {
    pub fn flags(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            BufferUsage::Storage => vk::BufferUsageFlags::STORAGE_BUFFER,
        }
    }

    /// Allocation name, also used in logs.
    pub fn label(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "frame vertices",
            BufferUsage::Storage => "frame storage",
        }
    }
}

/// Where frame buffers live: written by the CPU, read once by the GPU.
pub const FRAME_MEMORY: MemoryLocation = MemoryLocation::CpuToGpu;

/// Mapped buffer with its own gpu-allocator allocation.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    /// `None` only while being dropped.
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
    usage: BufferUsage,
}

impl Buffer {
    /// Creates an uninitialized mapped buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// Fails for a zero `size`, or when creation, allocation or binding
    /// fails. Anything created before the failure is released.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidHandle(format!(
                "{} buffer of zero size",
                usage.label()
            )));
        }

        let create_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.flags())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device
                .handle()
                .create_buffer(&create_info, None)
                .call("vkCreateBuffer")?
        };
        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let mut this = Self {
            device,
            buffer,
            allocation: None,
            size,
            usage,
        };

        // From here on a failure drops `this`, which frees what exists.
        let allocation = this.device.allocator()?.allocate(&AllocationCreateDesc {
            name: usage.label(),
            requirements,
            location: FRAME_MEMORY,
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })?;
        let (memory, offset) = unsafe { (allocation.memory(), allocation.offset()) };
        this.allocation = Some(allocation);

        unsafe {
            this.device
                .handle()
                .bind_buffer_memory(this.buffer, memory, offset)
                .call("vkBindBufferMemory")?;
        }

        debug!("{} buffer created, {} bytes", usage.label(), size);

        Ok(this)
    }

    /// Creates a buffer exactly as large as `data` and fills it.
    pub fn with_data(device: Arc<Device>, usage: BufferUsage, data: &[u8]) -> RhiResult<Self> {
        let buffer = Self::new(device, usage, data.len() as vk::DeviceSize)?;
        buffer.write_data(0, data)?;
        Ok(buffer)
    }

    /// Copies `data` into the mapping at byte `offset`.
    ///
    /// # Errors
    ///
    /// Fails when the range does not fit the buffer or the memory is not
    /// host mapped.
    pub fn write_data(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let len = data.len() as vk::DeviceSize;
        if offset.checked_add(len).is_none_or(|end| end > self.size) {
            return Err(RhiError::InvalidHandle(format!(
                "write of {} bytes at {} overflows {} buffer of {} bytes",
                len,
                offset,
                self.usage.label(),
                self.size
            )));
        }

        let mapped = self
            .allocation
            .as_ref()
            .and_then(Allocation::mapped_ptr)
            .ok_or_else(|| {
                RhiError::InvalidHandle(format!("{} buffer is not mapped", self.usage.label()))
            })?;

        // The range was checked against the buffer size above, and the
        // mapping covers the whole allocation.
        unsafe {
            let dst = mapped.as_ptr().cast::<u8>().add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }

        Ok(())
    }

    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free {} memory: {}", self.usage.label(), e);
                    }
                }
                Err(e) => error!("Leaking {} memory: {}", self.usage.label(), e),
            }
        }

        debug!("{} buffer destroyed", self.usage.label());
    }
}
