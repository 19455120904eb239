//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate provides a safe abstraction over Vulkan using the `ash` crate.
//! It handles:
//! - Headless instance and device creation
//! - Command buffer recording
//! - Buffer and image management
//! - Descriptor pools and layouts
//! - Samplers and pipeline layouts
//! - Synchronization primitives

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod sampler;
pub mod sync;

pub use error::{RhiError, RhiResult, VkResultExt};

// Re-export ash types that users might need
pub use ash::vk;
