//! Headless logical device.
//!
//! The device exposes one graphics queue and turns on exactly the features
//! the frame code relies on: descriptor indexing for the variable-size
//! image and buffer arrays, and dynamic rendering.
//!
//! # Example
//!
//! ```no_run
//! use vellum_rhi::device::Device;
//! use vellum_rhi::instance::Instance;
//! use vellum_rhi::physical_device::select_physical_device;
//!
//! let instance = Instance::new(false).expect("Vulkan loader");
//! let info = select_physical_device(instance.handle()).expect("suitable GPU");
//! let device = Device::new(&instance, &info).expect("logical device");
//! device.wait_idle().expect("idle");
//! ```

use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{error, info};

use crate::error::{RhiError, RhiResult, VkResultExt};
use crate::instance::Instance;
use crate::physical_device::PhysicalDeviceInfo;

/// Logical device, graphics queue and memory allocator.
///
/// Shared as `Arc<Device>` by every object created from it; the allocator
/// is locked per allocation.
pub struct Device {
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    /// Released by hand in `drop`, before the device it allocates from.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    graphics_queue: vk::Queue,
    graphics_family: u32,
    max_update_after_bind_descriptors: u32,
}

impl Device {
    /// Creates the logical device on the selected GPU.
    ///
    /// # Errors
    ///
    /// The failing device or allocator call.
    pub fn new(instance: &Instance, info: &PhysicalDeviceInfo) -> RhiResult<Arc<Self>> {
        let graphics_family = info.graphics_family;
        let device = create_logical_device(instance, info.device, graphics_family)?;
        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: info.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        });
        let allocator = match allocator {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e.into());
            }
        };

        info!(
            "Logical device ready on '{}', graphics family {}",
            info.device_name(),
            graphics_family
        );

        Ok(Arc::new(Self {
            device,
            physical_device: info.device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            graphics_family,
            max_update_after_bind_descriptors: info.max_update_after_bind_descriptors,
        }))
    }

    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    #[inline]
    pub fn graphics_family(&self) -> u32 {
        self.graphics_family
    }

    /// Per-stage update-after-bind descriptor limit of the GPU.
    #[inline]
    pub fn max_update_after_bind_descriptors(&self) -> u32 {
        self.max_update_after_bind_descriptors
    }

    /// Locks the memory allocator.
    ///
    /// # Errors
    ///
    /// Fails if a thread panicked while holding the lock.
    pub fn allocator(&self) -> RhiResult<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| RhiError::InvalidHandle("GPU allocator mutex poisoned".to_string()))
    }

    /// Blocks until every queue is idle.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle().call("vkDeviceWaitIdle") }
    }

    /// Submits to the graphics queue, signaling `fence` on completion.
    ///
    /// # Safety
    ///
    /// The command buffers must be fully recorded and not pending, and
    /// `fence` must be unsignaled and unused by other submissions.
    pub unsafe fn submit_graphics(
        &self,
        submits: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> RhiResult<()> {
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, submits, fence)
                .call("vkQueueSubmit")
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Err(e) = self.wait_idle() {
            error!("Device not idle at destruction: {}", e);
        }

        // Every allocation must be gone by now. The allocator returns its
        // memory blocks through the device, so it is dropped first.
        unsafe {
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: ash::Device is Send + Sync, the raw handles are plain integers
// and the allocator is only reached through its mutex.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

fn create_logical_device(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    graphics_family: u32,
) -> RhiResult<ash::Device> {
    let queue_info = vk::DeviceQueueCreateInfo::default()
        .queue_family_index(graphics_family)
        .queue_priorities(&[1.0]);

    let mut indexing = vk::PhysicalDeviceVulkan12Features::default()
        .descriptor_indexing(true)
        .runtime_descriptor_array(true)
        .descriptor_binding_partially_bound(true)
        .descriptor_binding_variable_descriptor_count(true)
        .descriptor_binding_sampled_image_update_after_bind(true)
        .descriptor_binding_storage_buffer_update_after_bind(true)
        .shader_sampled_image_array_non_uniform_indexing(true)
        .shader_storage_buffer_array_non_uniform_indexing(true);
    let mut rendering = vk::PhysicalDeviceVulkan13Features::default().dynamic_rendering(true);

    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(std::slice::from_ref(&queue_info))
        .push_next(&mut indexing)
        .push_next(&mut rendering);

    unsafe {
        instance
            .handle()
            .create_device(physical_device, &create_info, None)
            .call("vkCreateDevice")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
