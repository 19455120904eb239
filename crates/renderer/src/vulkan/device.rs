//! Device-wide objects shared by all frames.

use std::sync::{Arc, Mutex};

use ash::vk;
use tracing::info;
use vellum_core::GpuConfig;
use vellum_rhi::command::CommandPool;
use vellum_rhi::descriptor::DescriptorSetLayout;
use vellum_rhi::device::Device;
use vellum_rhi::pipeline::{PipelineLayout, push_constant_range};
use vellum_rhi::sampler::{SamplerCache, SamplerKind};
use vellum_rhi::{RhiError, RhiResult};

use super::records::{BUFFER_SET, IMAGE_SET, N_DESCRIPTOR_SETS};
use crate::op::Globals;

/// Descriptor capacity per frame: the configured cap, limited by what the
/// device can bind after update. At least 1.
pub fn effective_max_descriptors(configured: u32, device_limit: u32) -> u32 {
    configured.min(device_limit).max(1)
}

/// What frames borrow from the device.
///
/// # Thread Safety
///
/// Everything but the command pool is immutable after creation; the pool is
/// behind a mutex because allocating and freeing command buffers mutate it.
pub struct GpuDevice {
    device: Arc<Device>,
    command_pool: Mutex<CommandPool>,
    image_set_layout: DescriptorSetLayout,
    buffer_set_layout: DescriptorSetLayout,
    pipeline_layout: PipelineLayout,
    samplers: SamplerCache,
    max_descriptors: u32,
}

impl GpuDevice {
    /// Creates the shared objects on `device`.
    pub fn new(device: Arc<Device>, config: &GpuConfig) -> RhiResult<Arc<Self>> {
        let max_descriptors = effective_max_descriptors(
            config.max_descriptors,
            device.max_update_after_bind_descriptors(),
        );

        let command_pool = CommandPool::new(device.clone(), device.graphics_family())?;

        let image_set_layout = DescriptorSetLayout::new_variable_array(
            device.clone(),
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            max_descriptors,
            vk::ShaderStageFlags::FRAGMENT,
        )?;
        let buffer_set_layout = DescriptorSetLayout::new_variable_array(
            device.clone(),
            vk::DescriptorType::STORAGE_BUFFER,
            max_descriptors,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        )?;

        let mut set_layouts = [vk::DescriptorSetLayout::null(); N_DESCRIPTOR_SETS];
        set_layouts[IMAGE_SET] = image_set_layout.handle();
        set_layouts[BUFFER_SET] = buffer_set_layout.handle();

        let pipeline_layout = PipelineLayout::new(
            device.clone(),
            &set_layouts,
            &[push_constant_range(
                Self::PUSH_CONSTANT_STAGES,
                std::mem::size_of::<Globals>() as u32,
            )],
        )?;

        let samplers = SamplerCache::new(device.clone())?;

        info!(
            "GPU device ready: {} descriptors per frame",
            max_descriptors
        );

        Ok(Arc::new(Self {
            device,
            command_pool: Mutex::new(command_pool),
            image_set_layout,
            buffer_set_layout,
            pipeline_layout,
            samplers,
            max_descriptors,
        }))
    }

    /// Stages that see the [`Globals`] push constants.
    pub const PUSH_CONSTANT_STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(
        vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw(),
    );

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn allocate_command_buffer(&self) -> RhiResult<vk::CommandBuffer> {
        self.command_pool
            .lock()
            .map_err(|_| RhiError::InvalidHandle("command pool mutex poisoned".to_string()))?
            .allocate_command_buffer()
    }

    /// Returns a command buffer to the shared pool.
    pub fn free_command_buffer(&self, buffer: vk::CommandBuffer) {
        match self.command_pool.lock() {
            Ok(pool) => pool.free_command_buffer(buffer),
            Err(_) => tracing::error!("Command pool mutex poisoned, leaking command buffer"),
        }
    }

    /// Set layouts in set-index order.
    pub fn descriptor_set_layouts(&self) -> [vk::DescriptorSetLayout; N_DESCRIPTOR_SETS] {
        let mut layouts = [vk::DescriptorSetLayout::null(); N_DESCRIPTOR_SETS];
        layouts[IMAGE_SET] = self.image_set_layout.handle();
        layouts[BUFFER_SET] = self.buffer_set_layout.handle();
        layouts
    }

    #[inline]
    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout.handle()
    }

    #[inline]
    pub fn sampler(&self, kind: SamplerKind) -> vk::Sampler {
        self.samplers.get(kind)
    }

    #[inline]
    pub fn max_descriptors(&self) -> u32 {
        self.max_descriptors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_max_descriptors() {
        assert_eq!(effective_max_descriptors(1024, 500_000), 1024);
        assert_eq!(effective_max_descriptors(1024, 256), 256);
        assert_eq!(effective_max_descriptors(0, 256), 1);
    }

    #[test]
    fn test_push_constant_stages() {
        assert!(GpuDevice::PUSH_CONSTANT_STAGES.contains(vk::ShaderStageFlags::VERTEX));
        assert!(GpuDevice::PUSH_CONSTANT_STAGES.contains(vk::ShaderStageFlags::FRAGMENT));
    }

    #[test]
    fn test_gpu_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GpuDevice>();
    }
}
