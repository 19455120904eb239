//! Frames in flight.
//!
//! The [`FrameRing`] keeps a fixed number of [`GpuFrame`]s and hands them out
//! round-robin, so the CPU can fill frame N+1 while the GPU still executes
//! frame N.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vellum_renderer::frame_ring::FrameRing;
//! use vellum_renderer::vulkan::{GpuDevice, VulkanFrame};
//!
//! # fn example(device: Arc<GpuDevice>) -> Result<(), vellum_rhi::RhiError> {
//! let mut ring: FrameRing<VulkanFrame> = FrameRing::new(&device, 3)?;
//!
//! for _ in 0..100 {
//!     // Blocks only if this slot's previous submission is still running
//!     let frame = ring.acquire()?;
//!     // ... write data, add images, push ops ...
//!     frame.submit()?;
//! }
//!
//! ring.wait_idle()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tracing::{debug, info};
use vellum_rhi::RhiResult;

use crate::frame::{FrameBackend, GpuFrame};

/// Round-robin set of frames.
///
/// # Thread Safety
///
/// Not thread-safe. One thread drives all frames of a ring.
pub struct FrameRing<B: FrameBackend> {
    frames: Vec<GpuFrame<B>>,
    /// Slot handed out by the next `acquire`.
    next: usize,
}

impl<B: FrameBackend> FrameRing<B> {
    /// Creates `count` idle frames on `device`.
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero.
    pub fn new(device: &Arc<B::Device>, count: usize) -> RhiResult<Self> {
        assert!(count > 0, "frame ring needs at least one frame");

        let mut frames = Vec::with_capacity(count);
        for i in 0..count {
            frames.push(GpuFrame::new(device.clone())?);
            debug!("Created frame {}", i);
        }

        info!("Frame ring created with {} frames in flight", count);

        Ok(Self { frames, next: 0 })
    }

    /// Returns the next frame, cleaned up and ready to accumulate.
    ///
    /// Waits for the GPU only when that frame's last submission is still
    /// executing.
    pub fn acquire(&mut self) -> RhiResult<&mut GpuFrame<B>> {
        let index = self.next;
        self.next = (index + 1) % self.frames.len();

        let frame = &mut self.frames[index];
        if frame.is_busy()? {
            debug!("Frame {} still in flight, waiting", index);
        }
        frame.cleanup()?;

        Ok(frame)
    }

    /// Waits for every frame and cleans them all up.
    pub fn wait_idle(&mut self) -> RhiResult<()> {
        for frame in &mut self.frames {
            frame.cleanup()?;
        }
        Ok(())
    }

    /// Number of frames whose submission is still executing.
    pub fn busy_count(&self) -> RhiResult<usize> {
        let mut busy = 0;
        for frame in &self.frames {
            if frame.is_busy()? {
                busy += 1;
            }
        }
        Ok(busy)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[GpuFrame<B>] {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut [GpuFrame<B>] {
        &mut self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDevice, FakeFrame};

    fn ring(count: usize) -> FrameRing<FakeFrame> {
        FrameRing::new(&Arc::new(FakeDevice::default()), count).unwrap()
    }

    #[test]
    fn test_acquire_round_robin() {
        let mut ring = ring(2);

        for _ in 0..4 {
            ring.acquire().unwrap().submit().unwrap();
        }

        assert_eq!(ring.frames()[0].submissions(), 2);
        assert_eq!(ring.frames()[1].submissions(), 2);
    }

    #[test]
    fn test_acquire_waits_only_on_busy_frames() {
        let mut ring = ring(3);

        ring.acquire().unwrap().submit().unwrap();
        ring.acquire().unwrap().submit().unwrap();
        assert_eq!(ring.busy_count().unwrap(), 2);

        // Frame 0 finished, frame 1 is still running.
        ring.frames_mut()[0].backend_mut().complete();

        ring.acquire().unwrap().submit().unwrap();
        ring.acquire().unwrap(); // slot 0
        ring.acquire().unwrap(); // slot 1

        assert_eq!(ring.frames()[0].backend().waits(), 0);
        assert_eq!(ring.frames()[1].backend().waits(), 1);
        assert_eq!(ring.busy_count().unwrap(), 1);
    }

    #[test]
    fn test_wait_idle() {
        let mut ring = ring(3);
        for _ in 0..3 {
            ring.acquire().unwrap().submit().unwrap();
        }
        assert_eq!(ring.busy_count().unwrap(), 3);

        ring.wait_idle().unwrap();
        assert_eq!(ring.busy_count().unwrap(), 0);
    }

    #[test]
    #[should_panic(expected = "at least one frame")]
    fn test_empty_ring_panics() {
        ring(0);
    }
}
