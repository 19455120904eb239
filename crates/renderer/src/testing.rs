//! In-memory frame backend for lifecycle tests.
//!
//! Submissions never complete on their own; call [`FakeFrame::complete`] to
//! play the GPU, or let `cleanup` "wait" for it.

use std::cell::RefCell;
use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use vellum_rhi::RhiResult;
use vellum_rhi::sampler::SamplerKind;
use vellum_rhi::sync::FenceStatus;

use crate::descriptors::Descriptors;
use crate::frame::{FrameBackend, GpuBuffer};
use crate::op::Op;
use crate::vulkan::FrameState;

pub struct FakeDevice {
    pub max_descriptors: u32,
}

impl Default for FakeDevice {
    fn default() -> Self {
        Self {
            max_descriptors: 64,
        }
    }
}

pub struct FakeImage {
    id: u64,
}

impl FakeImage {
    pub fn new(id: u64) -> Self {
        Self { id }
    }
}

#[derive(Default)]
pub struct FakeBuffer {
    data: RefCell<Vec<u8>>,
}

impl FakeBuffer {
    fn contents(&self) -> Vec<u8> {
        self.data.borrow().clone()
    }
}

impl GpuBuffer for FakeBuffer {
    fn write(&self, offset: usize, data: &[u8]) -> RhiResult<()> {
        let mut contents = self.data.borrow_mut();
        let end = offset + data.len();
        if contents.len() < end {
            contents.resize(end, 0);
        }
        contents[offset..end].copy_from_slice(data);
        Ok(())
    }
}

/// What the last `submit` received.
#[derive(Debug)]
pub struct Submission {
    pub vertex: Option<Vec<u8>>,
    pub storage: Option<Vec<u8>>,
    pub ops: usize,
}

/// Shares [`FrameState`] with the Vulkan frame; only the fence is faked.
pub struct FakeFrame {
    state: FrameState,
    images: Vec<(u64, SamplerKind)>,
    /// Fence of the outstanding submission is unsignaled.
    pending: bool,
    waits: usize,
    last_submission: Option<Submission>,
}

impl FakeFrame {
    /// Finishes the outstanding submission.
    pub fn complete(&mut self) {
        self.pending = false;
    }

    pub fn images(&self) -> &[(u64, SamplerKind)] {
        &self.images
    }

    /// How many cleanups had to wait for a busy submission.
    pub fn waits(&self) -> usize {
        self.waits
    }

    pub fn last_submission(&self) -> Option<&Submission> {
        self.last_submission.as_ref()
    }
}

impl FrameBackend for FakeFrame {
    type Device = FakeDevice;
    type Image = FakeImage;
    type Buffer = FakeBuffer;

    fn setup(device: Arc<FakeDevice>) -> RhiResult<Self> {
        Ok(Self {
            state: FrameState::new(device.max_descriptors),
            images: Vec::new(),
            pending: false,
            waits: 0,
            last_submission: None,
        })
    }

    fn is_busy(&self) -> RhiResult<bool> {
        self.state.is_busy(|| {
            Ok(if self.pending {
                FenceStatus::Unsignaled
            } else {
                FenceStatus::Signaled
            })
        })
    }

    fn cleanup(&mut self) -> RhiResult<()> {
        if self.state.must_wait() && self.pending {
            self.waits += 1;
            self.pending = false;
        }
        self.state.reset();
        self.images.clear();
        Ok(())
    }

    fn create_descriptors(&self) -> Descriptors {
        Descriptors::new()
    }

    fn add_image(&mut self, image: &FakeImage, sampler: SamplerKind) -> u32 {
        let slot = self
            .state
            .add_image(vk::ImageView::from_raw(image.id), vk::Sampler::null());
        self.images.push((image.id, sampler));
        slot
    }

    fn image_key(image: &FakeImage) -> u64 {
        image.id
    }

    fn create_vertex_buffer(&self, _size: usize) -> RhiResult<FakeBuffer> {
        Ok(FakeBuffer::default())
    }

    fn create_storage_buffer(&self, _size: usize) -> RhiResult<FakeBuffer> {
        Ok(FakeBuffer::default())
    }

    fn submit(
        &mut self,
        vertex_buffer: Option<&FakeBuffer>,
        storage_buffer: Option<&FakeBuffer>,
        ops: &[Op],
    ) -> RhiResult<()> {
        self.state
            .begin_submit(storage_buffer.map(|_| vk::Buffer::from_raw(1)));

        self.last_submission = Some(Submission {
            vertex: vertex_buffer.map(FakeBuffer::contents),
            storage: storage_buffer.map(FakeBuffer::contents),
            ops: ops.len(),
        });
        self.state.mark_submitted();
        self.pending = true;
        Ok(())
    }
}
