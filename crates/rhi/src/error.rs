//! RHI-specific error types.

use ash::vk;
use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] vk::Result),

    /// Vulkan API error with the name of the failing call.
    #[error("{call} failed: {result}")]
    Call {
        /// Name of the Vulkan entry point, e.g. `vkQueueSubmit`.
        call: &'static str,
        /// Result code returned by the driver.
        result: vk::Result,
    },

    /// Failed to load Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// No suitable GPU found
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// Invalid handle or argument
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),
}

impl RhiError {
    /// Returns the driver result code, if this error carries one.
    pub fn vk_result(&self) -> Option<vk::Result> {
        match self {
            RhiError::VulkanError(result) | RhiError::Call { result, .. } => Some(*result),
            _ => None,
        }
    }
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;

/// Attaches the failing entry point name to a raw Vulkan result.
///
/// ```
/// use ash::vk;
/// use vellum_rhi::{RhiError, VkResultExt};
///
/// let result: Result<(), vk::Result> = Err(vk::Result::ERROR_DEVICE_LOST);
/// let err = result.call("vkQueueSubmit").unwrap_err();
/// assert_eq!(err.to_string(), "vkQueueSubmit failed: ERROR_DEVICE_LOST");
/// ```
pub trait VkResultExt<T> {
    /// Maps the error to [`RhiError::Call`].
    fn call(self, call: &'static str) -> RhiResult<T>;
}

impl<T> VkResultExt<T> for Result<T, vk::Result> {
    #[inline]
    fn call(self, call: &'static str) -> RhiResult<T> {
        self.map_err(|result| RhiError::Call { call, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_context_in_message() {
        let err = Err::<(), _>(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)
            .call("vkAllocateCommandBuffers")
            .unwrap_err();
        assert_eq!(err.vk_result(), Some(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        assert!(err.to_string().starts_with("vkAllocateCommandBuffers failed"));
    }

    #[test]
    fn test_ok_passes_through() {
        let value: Result<u32, vk::Result> = Ok(7);
        assert_eq!(value.call("vkGetFenceStatus").unwrap(), 7);
    }

    #[test]
    fn test_non_vulkan_error_has_no_result() {
        assert_eq!(RhiError::NoSuitableGpu.vk_result(), None);
    }
}
