//! Fences.
//!
//! A frame owns one [`Fence`]; it is the only place the CPU looks at the GPU
//! timeline. [`Fence::status`] polls, [`Fence::wait`] blocks.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vellum_rhi::device::Device;
//! use vellum_rhi::sync::{Fence, FenceStatus};
//!
//! # fn example(device: Arc<Device>) -> Result<(), vellum_rhi::RhiError> {
//! let fence = Fence::new(device, true)?;
//! assert_eq!(fence.status()?, FenceStatus::Signaled);
//!
//! fence.reset()?;
//! assert_eq!(fence.status()?, FenceStatus::Unsignaled);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::trace;

use crate::device::Device;
use crate::error::{RhiResult, VkResultExt};

/// Result of polling a fence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FenceStatus {
    Signaled,
    /// Pending work, or reset and not submitted since.
    Unsignaled,
}

pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Creates a fence, already signaled when `signaled` is set.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let mut create_info = vk::FenceCreateInfo::default();
        if signaled {
            create_info = create_info.flags(vk::FenceCreateFlags::SIGNALED);
        }

        let fence = unsafe {
            device
                .handle()
                .create_fence(&create_info, None)
                .call("vkCreateFence")?
        };
        trace!(signaled, "fence created");

        Ok(Self { device, fence })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Blocks until signaled or until `timeout_ns` elapses.
    ///
    /// # Errors
    ///
    /// `vkWaitForFences` failing, which includes `TIMEOUT` and device loss.
    pub fn wait(&self, timeout_ns: u64) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .wait_for_fences(std::slice::from_ref(&self.fence), true, timeout_ns)
                .call("vkWaitForFences")
        }
    }

    /// Back to unsignaled. No queue operation may still reference the fence.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .reset_fences(std::slice::from_ref(&self.fence))
                .call("vkResetFences")
        }
    }

    /// Non-blocking poll.
    pub fn status(&self) -> RhiResult<FenceStatus> {
        let signaled = unsafe {
            self.device
                .handle()
                .get_fence_status(self.fence)
                .call("vkGetFenceStatus")?
        };

        Ok(match signaled {
            true => FenceStatus::Signaled,
            false => FenceStatus::Unsignaled,
        })
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_fence(self.fence, None) };
        trace!("fence destroyed");
    }
}
