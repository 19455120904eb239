//! Variable-length descriptor arrays.
//!
//! Every set a frame binds holds one partially bound array at binding 0.
//! The layout fixes an upper bound; each allocation from a
//! [`DescriptorPool`] picks the actual length, so a frame that used five
//! images only pays for five descriptors.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use vellum_rhi::device::Device;
//! use vellum_rhi::descriptor::{DescriptorSetLayout, DescriptorPool};
//!
//! # fn example(device: Arc<Device>) -> Result<(), vellum_rhi::RhiError> {
//! let layout = DescriptorSetLayout::new_variable_array(
//!     device.clone(),
//!     vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
//!     1024,
//!     vk::ShaderStageFlags::FRAGMENT,
//! )?;
//!
//! let pool_size = vk::DescriptorPoolSize::default()
//!     .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
//!     .descriptor_count(1024);
//!
//! let pool = DescriptorPool::new(
//!     device.clone(),
//!     vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND,
//!     1,
//!     &[pool_size],
//! )?;
//!
//! let sets = pool.allocate_variable(&[layout.handle()], &[16])?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, trace};

use crate::device::Device;
use crate::error::{RhiResult, VkResultExt};

/// Binding flags applied to variable-sized descriptor arrays.
pub const VARIABLE_ARRAY_BINDING_FLAGS: vk::DescriptorBindingFlags =
    vk::DescriptorBindingFlags::from_raw(
        vk::DescriptorBindingFlags::PARTIALLY_BOUND.as_raw()
            | vk::DescriptorBindingFlags::VARIABLE_DESCRIPTOR_COUNT.as_raw()
            | vk::DescriptorBindingFlags::UPDATE_AFTER_BIND.as_raw(),
    );

/// Builds binding 0 of a variable-sized descriptor array.
///
/// `max_count` is the upper bound; each allocation chooses its own length.
#[inline]
pub fn variable_array_binding(
    descriptor_type: vk::DescriptorType,
    max_count: u32,
    stage_flags: vk::ShaderStageFlags,
) -> vk::DescriptorSetLayoutBinding<'static> {
    vk::DescriptorSetLayoutBinding::default()
        .binding(0)
        .descriptor_type(descriptor_type)
        .descriptor_count(max_count)
        .stage_flags(stage_flags)
}

/// Set layout with a single variable array. Shared by every frame.
pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Sets of this layout can only be allocated from an
    /// `UPDATE_AFTER_BIND` pool.
    pub fn new_variable_array(
        device: Arc<Device>,
        descriptor_type: vk::DescriptorType,
        max_count: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> RhiResult<Self> {
        let bindings = [variable_array_binding(
            descriptor_type,
            max_count,
            stage_flags,
        )];
        let binding_flags = [VARIABLE_ARRAY_BINDING_FLAGS];
        let mut flags_info =
            vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&binding_flags);

        let create_info = vk::DescriptorSetLayoutCreateInfo::default()
            .flags(vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL)
            .bindings(&bindings)
            .push_next(&mut flags_info);

        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)
                .call("vkCreateDescriptorSetLayout")?
        };

        debug!(?descriptor_type, max_count, "variable array set layout created");

        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Per-frame pool. Allocation and reset need `&self` only, but Vulkan
/// requires external synchronization, so a pool stays with its frame.
pub struct DescriptorPool {
    device: Arc<Device>,
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    pub fn new(
        device: Arc<Device>,
        flags: vk::DescriptorPoolCreateFlags,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .flags(flags)
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);

        let pool = unsafe {
            device
                .handle()
                .create_descriptor_pool(&create_info, None)
                .call("vkCreateDescriptorPool")?
        };

        debug!(max_sets, ?flags, "descriptor pool created");

        Ok(Self { device, pool })
    }

    /// Allocates `layouts[i]` with an array of `counts[i]` descriptors.
    pub fn allocate_variable(
        &self,
        layouts: &[vk::DescriptorSetLayout],
        counts: &[u32],
    ) -> RhiResult<Vec<vk::DescriptorSet>> {
        assert_eq!(
            layouts.len(),
            counts.len(),
            "one variable count per layout"
        );

        let mut variable_info =
            vk::DescriptorSetVariableDescriptorCountAllocateInfo::default()
                .descriptor_counts(counts);

        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(layouts)
            .push_next(&mut variable_info);

        let sets = unsafe {
            self.device
                .handle()
                .allocate_descriptor_sets(&alloc_info)
                .call("vkAllocateDescriptorSets")?
        };

        trace!(?counts, "descriptor sets allocated");

        Ok(sets)
    }

    /// Frees every set at once. None of them may still be in use by the GPU.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .reset_descriptor_pool(self.pool, vk::DescriptorPoolResetFlags::empty())
                .call("vkResetDescriptorPool")
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Applies `writes`; an empty slice does nothing.
pub fn update_descriptor_sets(device: &Device, writes: &[vk::WriteDescriptorSet]) {
    if !writes.is_empty() {
        unsafe { device.handle().update_descriptor_sets(writes, &[]) };
    }
}

/// Whole-or-partial buffer range for a storage buffer write.
#[inline]
pub fn buffer_info(
    buffer: vk::Buffer,
    offset: vk::DeviceSize,
    range: vk::DeviceSize,
) -> vk::DescriptorBufferInfo {
    vk::DescriptorBufferInfo::default()
        .buffer(buffer)
        .offset(offset)
        .range(range)
}

/// Combined image sampler entry.
#[inline]
pub fn image_info(
    sampler: vk::Sampler,
    image_view: vk::ImageView,
    image_layout: vk::ImageLayout,
) -> vk::DescriptorImageInfo {
    vk::DescriptorImageInfo::default()
        .sampler(sampler)
        .image_view(image_view)
        .image_layout(image_layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_array_binding() {
        let binding = variable_array_binding(
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            1024,
            vk::ShaderStageFlags::FRAGMENT,
        );
        assert_eq!(binding.binding, 0);
        assert_eq!(
            binding.descriptor_type,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        );
        assert_eq!(binding.descriptor_count, 1024);
        assert_eq!(binding.stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_variable_array_binding_flags() {
        assert!(VARIABLE_ARRAY_BINDING_FLAGS.contains(vk::DescriptorBindingFlags::PARTIALLY_BOUND));
        assert!(
            VARIABLE_ARRAY_BINDING_FLAGS
                .contains(vk::DescriptorBindingFlags::VARIABLE_DESCRIPTOR_COUNT)
        );
        assert!(
            VARIABLE_ARRAY_BINDING_FLAGS.contains(vk::DescriptorBindingFlags::UPDATE_AFTER_BIND)
        );
        assert!(
            !VARIABLE_ARRAY_BINDING_FLAGS
                .contains(vk::DescriptorBindingFlags::UPDATE_UNUSED_WHILE_PENDING)
        );
    }

    #[test]
    fn test_buffer_info_helper() {
        let info = buffer_info(vk::Buffer::null(), 0, vk::WHOLE_SIZE);
        assert_eq!(info.buffer, vk::Buffer::null());
        assert_eq!(info.offset, 0);
        assert_eq!(info.range, vk::WHOLE_SIZE);
    }

    #[test]
    fn test_image_info_helper() {
        let info = image_info(
            vk::Sampler::null(),
            vk::ImageView::null(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
        assert_eq!(info.sampler, vk::Sampler::null());
        assert_eq!(info.image_view, vk::ImageView::null());
        assert_eq!(info.image_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    }

    #[test]
    fn test_descriptor_pool_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<DescriptorPool>();
        assert_send::<DescriptorSetLayout>();
    }
}
