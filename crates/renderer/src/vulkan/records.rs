//! Descriptor and submission bookkeeping for one cycle.

use ash::vk;
use vellum_rhi::RhiResult;
use vellum_rhi::descriptor::{buffer_info, image_info};
use vellum_rhi::sync::FenceStatus;

/// Descriptor set holding the combined image samplers.
pub const IMAGE_SET: usize = 0;
/// Descriptor set holding the storage buffers.
pub const BUFFER_SET: usize = 1;
pub const N_DESCRIPTOR_SETS: usize = 2;

pub(crate) const PREALLOCATED_IMAGES: usize = 128;
const PREALLOCATED_BUFFERS: usize = 32;

/// Image and buffer descriptors registered since the last cleanup.
///
/// The index of a record is its binding slot in the shader arrays.
#[derive(Debug)]
pub struct DescriptorRecords {
    images: Vec<vk::DescriptorImageInfo>,
    buffers: Vec<vk::DescriptorBufferInfo>,
    max_descriptors: u32,
}

impl DescriptorRecords {
    pub fn new(max_descriptors: u32) -> Self {
        Self {
            images: Vec::with_capacity(PREALLOCATED_IMAGES),
            buffers: Vec::with_capacity(PREALLOCATED_BUFFERS),
            max_descriptors,
        }
    }

    /// Appends an image record and returns its slot.
    ///
    /// # Panics
    ///
    /// Panics when the slot would reach the descriptor capacity.
    pub fn add_image(&mut self, view: vk::ImageView, sampler: vk::Sampler) -> u32 {
        let slot = self.images.len() as u32;
        assert!(
            slot < self.max_descriptors,
            "image descriptor capacity of {} exceeded",
            self.max_descriptors
        );

        self.images.push(image_info(
            sampler,
            view,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ));
        slot
    }

    /// Appends a whole-buffer record and returns its slot.
    ///
    /// # Panics
    ///
    /// Panics when the slot would reach the descriptor capacity.
    pub fn add_buffer(&mut self, buffer: vk::Buffer) -> u32 {
        let slot = self.buffers.len() as u32;
        assert!(
            slot < self.max_descriptors,
            "buffer descriptor capacity of {} exceeded",
            self.max_descriptors
        );

        self.buffers.push(buffer_info(buffer, 0, vk::WHOLE_SIZE));
        slot
    }

    #[inline]
    pub fn images(&self) -> &[vk::DescriptorImageInfo] {
        &self.images
    }

    #[inline]
    pub fn buffers(&self) -> &[vk::DescriptorBufferInfo] {
        &self.buffers
    }

    #[inline]
    pub fn max_descriptors(&self) -> u32 {
        self.max_descriptors
    }

    /// Array lengths to allocate the sets with. Never zero.
    pub fn variable_counts(&self) -> [u32; N_DESCRIPTOR_SETS] {
        let mut counts = [0; N_DESCRIPTOR_SETS];
        counts[IMAGE_SET] = (self.images.len() as u32).max(1);
        counts[BUFFER_SET] = (self.buffers.len() as u32).max(1);
        counts
    }

    /// Writes filling `sets` with the records. Empty lists produce no write.
    pub fn writes(
        &self,
        sets: &[vk::DescriptorSet; N_DESCRIPTOR_SETS],
    ) -> Vec<vk::WriteDescriptorSet<'_>> {
        let mut writes = Vec::with_capacity(N_DESCRIPTOR_SETS);

        if !self.images.is_empty() {
            writes.push(
                vk::WriteDescriptorSet::default()
                    .dst_set(sets[IMAGE_SET])
                    .dst_binding(0)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&self.images),
            );
        }

        if !self.buffers.is_empty() {
            writes.push(
                vk::WriteDescriptorSet::default()
                    .dst_set(sets[BUFFER_SET])
                    .dst_binding(0)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                    .buffer_info(&self.buffers),
            );
        }

        writes
    }

    pub fn clear(&mut self) {
        self.images.clear();
        self.buffers.clear();
    }
}

/// Submission state of a frame, kept apart from the fence it polls.
///
/// `submitted` is set by a successful submit and cleared only by
/// [`reset`](Self::reset), so a frame is busy while it is submitted and
/// its fence has not signaled yet.
#[derive(Debug)]
pub struct FrameState {
    records: DescriptorRecords,
    submitted: bool,
}

impl FrameState {
    pub fn new(max_descriptors: u32) -> Self {
        Self {
            records: DescriptorRecords::new(max_descriptors),
            submitted: false,
        }
    }

    #[inline]
    pub fn records(&self) -> &DescriptorRecords {
        &self.records
    }

    #[inline]
    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn add_image(&mut self, view: vk::ImageView, sampler: vk::Sampler) -> u32 {
        self.records.add_image(view, sampler)
    }

    /// Checks a submission may start and registers its storage buffer.
    ///
    /// # Panics
    ///
    /// Panics when the previous submission was not cleaned up, or when the
    /// storage buffer does not land in slot 0.
    pub fn begin_submit(&mut self, storage_buffer: Option<vk::Buffer>) {
        assert!(!self.submitted, "frame submitted twice without cleanup");

        if let Some(buffer) = storage_buffer {
            let slot = self.records.add_buffer(buffer);
            assert_eq!(slot, 0, "storage buffer must occupy descriptor slot 0");
        }
    }

    /// Records that the queue accepted the submission.
    pub fn mark_submitted(&mut self) {
        self.submitted = true;
    }

    /// Busy means submitted with the fence still unsignaled. The fence is
    /// only polled for a submitted frame.
    pub fn is_busy(
        &self,
        fence_status: impl FnOnce() -> RhiResult<FenceStatus>,
    ) -> RhiResult<bool> {
        if !self.submitted {
            return Ok(false);
        }
        Ok(fence_status()? == FenceStatus::Unsignaled)
    }

    /// Whether cleanup has to wait on the fence first.
    #[inline]
    pub fn must_wait(&self) -> bool {
        self.submitted
    }

    /// Back to idle with no records.
    pub fn reset(&mut self) {
        self.records.clear();
        self.submitted = false;
    }

    /// Drop check: a busy frame may only go away while unwinding.
    pub fn check_drop(&self, busy: bool) {
        if busy {
            assert!(std::thread::panicking(), "dropping a busy frame");
        }
    }
}
