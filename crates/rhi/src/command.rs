//! Command recording.
//!
//! One [`CommandPool`] per device hands out primary command buffers; each
//! frame keeps its [`CommandBuffer`] for its whole life and re-records it
//! every cycle after a reset.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vellum_rhi::device::Device;
//! use vellum_rhi::command::{CommandBuffer, CommandPool};
//!
//! # fn example(device: Arc<Device>, family: u32) -> Result<(), vellum_rhi::RhiError> {
//! let pool = CommandPool::new(device.clone(), family)?;
//! let cmd = CommandBuffer::from_handle(device, pool.allocate_command_buffer()?);
//!
//! cmd.begin()?;
//! cmd.end()?;
//! cmd.reset()?;
//!
//! pool.free_command_buffer(cmd.handle());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiResult, VkResultExt};

/// Pool whose buffers can be reset one by one.
///
/// Allocation and free mutate the pool, so sharing it between threads
/// needs external locking.
pub struct CommandPool {
    device: Arc<Device>,
    pool: vk::CommandPool,
    family: u32,
}

impl CommandPool {
    pub fn new(device: Arc<Device>, family: u32) -> RhiResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(family);

        let pool = unsafe {
            device
                .handle()
                .create_command_pool(&create_info, None)
                .call("vkCreateCommandPool")?
        };

        debug!("Command pool created on queue family {}", family);

        Ok(Self {
            device,
            pool,
            family,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    #[inline]
    pub fn family(&self) -> u32 {
        self.family
    }

    /// Allocates one primary command buffer.
    pub fn allocate_command_buffer(&self) -> RhiResult<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let mut buffers = unsafe {
            self.device
                .handle()
                .allocate_command_buffers(&alloc_info)
                .call("vkAllocateCommandBuffers")?
        };
        Ok(buffers.swap_remove(0))
    }

    /// The buffer must not be pending execution.
    pub fn free_command_buffer(&self, buffer: vk::CommandBuffer) {
        unsafe {
            self.device
                .handle()
                .free_command_buffers(self.pool, std::slice::from_ref(&buffer));
        }
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_command_pool(self.pool, None);
        }
        debug!("Command pool on queue family {} destroyed", self.family);
    }
}

/// Recording handle for a primary command buffer.
///
/// Does not own the buffer: whoever allocated it frees it through its pool.
pub struct CommandBuffer {
    device: Arc<Device>,
    buffer: vk::CommandBuffer,
}

impl CommandBuffer {
    #[inline]
    pub fn from_handle(device: Arc<Device>, buffer: vk::CommandBuffer) -> Self {
        Self { device, buffer }
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.buffer
    }

    #[inline]
    fn raw(&self) -> &ash::Device {
        self.device.handle()
    }

    /// Starts a one-time-submit recording.
    pub fn begin(&self) -> RhiResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.raw()
                .begin_command_buffer(self.buffer, &begin_info)
                .call("vkBeginCommandBuffer")
        }
    }

    pub fn end(&self) -> RhiResult<()> {
        unsafe {
            self.raw()
                .end_command_buffer(self.buffer)
                .call("vkEndCommandBuffer")
        }
    }

    /// Returns the buffer to the initial state. It must not be pending.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe {
            self.raw()
                .reset_command_buffer(self.buffer, vk::CommandBufferResetFlags::empty())
                .call("vkResetCommandBuffer")
        }
    }

    pub fn begin_rendering(&self, info: &vk::RenderingInfo) {
        unsafe { self.raw().cmd_begin_rendering(self.buffer, info) }
    }

    pub fn end_rendering(&self) {
        unsafe { self.raw().cmd_end_rendering(self.buffer) }
    }

    pub fn bind_graphics_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe {
            self.raw()
                .cmd_bind_pipeline(self.buffer, vk::PipelineBindPoint::GRAPHICS, pipeline)
        }
    }

    /// Binds `buffer` from offset 0 at `binding`.
    pub fn bind_vertex_buffer(&self, binding: u32, buffer: vk::Buffer) {
        unsafe {
            self.raw()
                .cmd_bind_vertex_buffers(self.buffer, binding, &[buffer], &[0])
        }
    }

    /// Binds `sets` for graphics starting at set index `first_set`.
    pub fn bind_graphics_descriptor_sets(
        &self,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    ) {
        unsafe {
            self.raw().cmd_bind_descriptor_sets(
                self.buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                first_set,
                sets,
                &[],
            )
        }
    }

    pub fn set_viewport(&self, viewport: &vk::Viewport) {
        unsafe {
            self.raw()
                .cmd_set_viewport(self.buffer, 0, std::slice::from_ref(viewport))
        }
    }

    pub fn set_scissor(&self, scissor: &vk::Rect2D) {
        unsafe {
            self.raw()
                .cmd_set_scissor(self.buffer, 0, std::slice::from_ref(scissor))
        }
    }

    /// Non-indexed instanced draw.
    pub fn draw(&self, vertices: u32, instances: u32, first_vertex: u32, first_instance: u32) {
        unsafe {
            self.raw()
                .cmd_draw(self.buffer, vertices, instances, first_vertex, first_instance)
        }
    }

    pub fn push_constants(
        &self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        unsafe {
            self.raw()
                .cmd_push_constants(self.buffer, layout, stages, offset, data)
        }
    }

    /// Records a single image layout transition.
    pub fn image_barrier(
        &self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: &vk::ImageMemoryBarrier,
    ) {
        unsafe {
            self.raw().cmd_pipeline_barrier(
                self.buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                std::slice::from_ref(barrier),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}

    #[test]
    fn test_recording_types_are_send() {
        assert_send::<CommandPool>();
        assert_send::<CommandBuffer>();
    }
}
