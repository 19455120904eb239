//! Pipeline layouts.
//!
//! Pipelines are built by whoever owns the shaders. Frames only see their
//! raw handles plus the one layout every frame pipeline shares.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vellum_rhi::device::Device;
//! use vellum_rhi::pipeline::{PipelineLayout, push_constant_range};
//! use ash::vk;
//!
//! # fn example(device: Arc<Device>) -> Result<(), vellum_rhi::RhiError> {
//! let range = push_constant_range(
//!     vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
//!     120,
//! );
//! let layout = PipelineLayout::new(device, &[], &[range])?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiResult, VkResultExt};

pub struct PipelineLayout {
    device: Arc<Device>,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// `set_layouts` are given in set-index order.
    pub fn new(
        device: Arc<Device>,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_constant_ranges);

        let layout = unsafe {
            device
                .handle()
                .create_pipeline_layout(&create_info, None)
                .call("vkCreatePipelineLayout")?
        };

        debug!(
            sets = set_layouts.len(),
            push_ranges = push_constant_ranges.len(),
            "pipeline layout created"
        );

        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
        debug!("Pipeline layout destroyed");
    }
}

/// Push constant range starting at offset 0.
#[inline]
pub fn push_constant_range(stages: vk::ShaderStageFlags, size: u32) -> vk::PushConstantRange {
    vk::PushConstantRange {
        stage_flags: stages,
        offset: 0,
        size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_constant_range() {
        let range = push_constant_range(vk::ShaderStageFlags::VERTEX, 120);
        assert_eq!(range.offset, 0);
        assert_eq!(range.size, 120);
        assert_eq!(range.stage_flags, vk::ShaderStageFlags::VERTEX);
    }

    #[test]
    fn test_pipeline_layout_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PipelineLayout>();
    }
}
