//! Vulkan frame backend.
//!
//! - [`GpuDevice`] holds the device-wide objects every frame shares
//! - [`DescriptorRecords`] collects a frame's image and buffer bindings
//! - [`FrameState`] tracks whether a frame is submitted, independent of the GPU
//! - [`VulkanFrame`] implements [`FrameBackend`](crate::frame::FrameBackend)
//! - [`command`] turns the operation list into commands

pub mod command;
mod device;
mod frame;
mod records;

pub use device::{GpuDevice, effective_max_descriptors};
pub use frame::VulkanFrame;
pub use records::{BUFFER_SET, DescriptorRecords, FrameState, IMAGE_SET, N_DESCRIPTOR_SETS};
