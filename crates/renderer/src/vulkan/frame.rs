//! Vulkan implementation of [`FrameBackend`].

use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use tracing::{debug, trace};
use vellum_rhi::RhiResult;
use vellum_rhi::buffer::{Buffer, BufferUsage};
use vellum_rhi::command::CommandBuffer;
use vellum_rhi::descriptor::{DescriptorPool, update_descriptor_sets};
use vellum_rhi::image::Image;
use vellum_rhi::sampler::SamplerKind;
use vellum_rhi::sync::Fence;

use super::command::{CommandState, vk_command};
use super::device::GpuDevice;
use super::records::{FrameState, N_DESCRIPTOR_SETS, PREALLOCATED_IMAGES};
use crate::descriptors::Descriptors;
use crate::frame::{FrameBackend, GpuBuffer};
use crate::op::Op;

impl GpuBuffer for Buffer {
    fn write(&self, offset: usize, data: &[u8]) -> RhiResult<()> {
        self.write_data(offset as vk::DeviceSize, data)
    }
}

/// Per-frame Vulkan resources.
///
/// The command buffer, fence and descriptor pool are created once in
/// [`setup`](FrameBackend::setup) and reused every cycle.
///
/// # Synchronization
///
/// ```text
/// setup:   fence signaled, nothing submitted          -> idle
/// submit:  reset fence, queue submit with the fence   -> busy
/// GPU:     work done, fence signaled                  -> still "submitted"
/// cleanup: wait fence, reset everything               -> idle
/// ```
pub struct VulkanFrame {
    device: Arc<GpuDevice>,
    state: FrameState,
    command_buffer: CommandBuffer,
    fence: Fence,
    descriptor_pool: DescriptorPool,
}

impl VulkanFrame {
    /// Registered (image, buffer) descriptor counts.
    pub fn descriptor_counts(&self) -> (usize, usize) {
        let records = self.state.records();
        (records.images().len(), records.buffers().len())
    }

    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.command_buffer
    }

    /// Allocates both descriptor sets, fills them and binds them at set 0.
    fn prepare_descriptors(&self) -> RhiResult<()> {
        let layouts = self.device.descriptor_set_layouts();
        let records = self.state.records();
        let counts = records.variable_counts();
        let allocated = self.descriptor_pool.allocate_variable(&layouts, &counts)?;

        let mut sets = [vk::DescriptorSet::null(); N_DESCRIPTOR_SETS];
        sets.copy_from_slice(&allocated);

        update_descriptor_sets(self.device.device(), &records.writes(&sets));

        self.command_buffer
            .bind_graphics_descriptor_sets(self.device.pipeline_layout(), 0, &sets);

        Ok(())
    }
}

impl FrameBackend for VulkanFrame {
    type Device = GpuDevice;
    type Image = Image;
    type Buffer = Buffer;

    fn setup(device: Arc<GpuDevice>) -> RhiResult<Self> {
        let max_descriptors = device.max_descriptors();
        let raw = device.device().clone();

        let command_buffer =
            CommandBuffer::from_handle(raw.clone(), device.allocate_command_buffer()?);
        let fence = Fence::new(raw.clone(), true)?;

        let pool_sizes = [
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(max_descriptors),
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::STORAGE_BUFFER)
                .descriptor_count(max_descriptors),
        ];
        let descriptor_pool = DescriptorPool::new(
            raw,
            vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND,
            N_DESCRIPTOR_SETS as u32,
            &pool_sizes,
        )?;

        debug!("Vulkan frame set up, {} descriptors", max_descriptors);

        Ok(Self {
            device,
            state: FrameState::new(max_descriptors),
            command_buffer,
            fence,
            descriptor_pool,
        })
    }

    fn is_busy(&self) -> RhiResult<bool> {
        self.state.is_busy(|| self.fence.status())
    }

    fn cleanup(&mut self) -> RhiResult<()> {
        if self.state.must_wait() {
            self.fence.wait(u64::MAX)?;
        }

        self.fence.reset()?;
        self.command_buffer.reset()?;
        // Every set from this cycle goes; they are rebuilt on submit.
        self.descriptor_pool.reset()?;
        self.state.reset();

        Ok(())
    }

    fn create_descriptors(&self) -> Descriptors {
        Descriptors::with_capacity(PREALLOCATED_IMAGES)
    }

    fn add_image(&mut self, image: &Image, sampler: SamplerKind) -> u32 {
        self.state
            .add_image(image.view(), self.device.sampler(sampler))
    }

    fn image_key(image: &Image) -> u64 {
        image.handle().as_raw()
    }

    fn create_vertex_buffer(&self, size: usize) -> RhiResult<Buffer> {
        Buffer::new(
            self.device.device().clone(),
            BufferUsage::Vertex,
            size as vk::DeviceSize,
        )
    }

    fn create_storage_buffer(&self, size: usize) -> RhiResult<Buffer> {
        Buffer::new(
            self.device.device().clone(),
            BufferUsage::Storage,
            size as vk::DeviceSize,
        )
    }

    fn submit(
        &mut self,
        vertex_buffer: Option<&Buffer>,
        storage_buffer: Option<&Buffer>,
        ops: &[Op],
    ) -> RhiResult<()> {
        self.state.begin_submit(storage_buffer.map(Buffer::handle));

        self.command_buffer.begin()?;

        self.prepare_descriptors()?;

        if let Some(vertex_buffer) = vertex_buffer {
            self.command_buffer
                .bind_vertex_buffer(0, vertex_buffer.handle());
        }

        let mut state = CommandState::default();
        let mut remaining = ops;
        while !remaining.is_empty() {
            remaining = vk_command(remaining, &mut state, &self.command_buffer, &self.device);
        }

        self.command_buffer.end()?;

        let command_buffers = [self.command_buffer.handle()];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);

        // A frame that was never cleaned up still holds its initial signal.
        self.fence.reset()?;
        unsafe {
            self.device
                .device()
                .submit_graphics(&[submit_info], self.fence.handle())?;
        }
        self.state.mark_submitted();

        trace!(
            "Submitted {} ops as {} draw calls",
            ops.len(),
            state.draw_calls
        );

        Ok(())
    }
}

impl Drop for VulkanFrame {
    fn drop(&mut self) {
        let busy = matches!(self.is_busy(), Ok(true));
        self.state.check_drop(busy);
        if busy {
            // Unwinding: let the GPU finish before the pool and fence go.
            let _ = self.fence.wait(u64::MAX);
        }

        self.device
            .free_command_buffer(self.command_buffer.handle());
        debug!("Vulkan frame destroyed");
    }
}
