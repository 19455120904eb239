//! 2D color images.
//!
//! An [`Image`] owns a VkImage, its gpu-allocator memory and a single image
//! view. Images are created in `UNDEFINED` layout and are usable both as a
//! color attachment and as a sampled texture.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vellum_rhi::device::Device;
//! use vellum_rhi::image::Image;
//!
//! # fn example(device: Arc<Device>) -> Result<(), vellum_rhi::RhiError> {
//! let target = Image::new(device, 800, 600, Image::DEFAULT_FORMAT)?;
//! let view = target.view();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult, VkResultExt};

/// Color image with a 2D view.
///
/// # Resource Cleanup
///
/// Resources are destroyed in reverse order of creation:
/// 1. Image view
/// 2. Image
/// 3. Memory allocation
pub struct Image {
    device: Arc<Device>,
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl Image {
    pub const DEFAULT_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

    /// Usage flags for every image created here.
    pub const USAGE: vk::ImageUsageFlags = vk::ImageUsageFlags::from_raw(
        vk::ImageUsageFlags::COLOR_ATTACHMENT.as_raw()
            | vk::ImageUsageFlags::SAMPLED.as_raw()
            | vk::ImageUsageFlags::TRANSFER_SRC.as_raw(),
    );

    /// Creates a GPU-only color image and its view.
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension is zero, or if image creation,
    /// memory allocation or view creation fails.
    pub fn new(device: Arc<Device>, width: u32, height: u32, format: vk::Format) -> RhiResult<Self> {
        if width == 0 || height == 0 {
            return Err(RhiError::InvalidHandle(
                "Image dimensions must be greater than 0".to_string(),
            ));
        }

        let extent = vk::Extent2D { width, height };

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(Self::USAGE)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe {
            device
                .handle()
                .create_image(&image_info, None)
                .call("vkCreateImage")?
        };

        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation = device.allocator().and_then(|mut allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name: "color_image",
                    requirements,
                    location: MemoryLocation::GpuOnly,
                    linear: false,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(RhiError::from)
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_image(image, None) };
                return Err(e);
            }
        };

        let (memory, offset) = unsafe { (allocation.memory(), allocation.offset()) };

        // From here on a failure drops `this`, which releases what exists.
        let mut this = Self {
            device,
            image,
            view: vk::ImageView::null(),
            allocation: Some(allocation),
            format,
            extent,
        };

        unsafe {
            this.device
                .handle()
                .bind_image_memory(image, memory, offset)
                .call("vkBindImageMemory")?;
        }

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(color_subresource_range());

        this.view = unsafe {
            this.device
                .handle()
                .create_image_view(&view_info, None)
                .call("vkCreateImageView")?
        };

        debug!("Created image: {}x{} ({:?})", width, height, format);

        Ok(this)
    }

    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

/// Whole-image color subresource range (one mip level, one layer).
#[inline]
pub fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange::default()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(1)
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.device.handle().destroy_image_view(self.view, None);
            }
            self.device.handle().destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        tracing::error!("Failed to free image allocation: {:?}", e);
                    }
                }
                Err(e) => tracing::error!("Leaking image allocation: {}", e),
            }
        }

        debug!(
            "Destroyed image: {}x{}",
            self.extent.width, self.extent.height
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_subresource_range() {
        let range = color_subresource_range();
        assert_eq!(range.aspect_mask, vk::ImageAspectFlags::COLOR);
        assert_eq!(range.level_count, 1);
        assert_eq!(range.layer_count, 1);
    }

    #[test]
    fn test_image_usage_allows_render_and_sample() {
        assert!(Image::USAGE.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT));
        assert!(Image::USAGE.contains(vk::ImageUsageFlags::SAMPLED));
    }

    #[test]
    fn test_image_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Image>();
    }
}
