//! Frame lifecycle.
//!
//! A frame is the bundle of resources behind one GPU submission. It cycles
//! through
//!
//! ```text
//! accumulate (writers, add_image, push_op) -> submit -> [GPU busy] -> cleanup
//! ```
//!
//! and is reused after every cleanup. The backend-specific half implements
//! [`FrameBackend`]; [`GpuFrame`] adds everything that does not depend on
//! the graphics API: host-side vertex and storage data, the operation list,
//! image deduplication and the lifetime of uploaded buffers.

use std::sync::Arc;

use tracing::{debug, trace};
use vellum_rhi::RhiResult;
use vellum_rhi::sampler::SamplerKind;

use crate::buffer_writer::{BufferWriter, HostBuffer};
use crate::descriptors::Descriptors;
use crate::op::Op;

/// GPU buffer a frame uploads host data into.
pub trait GpuBuffer {
    fn write(&self, offset: usize, data: &[u8]) -> RhiResult<()>;
}

/// Graphics-API half of a frame.
///
/// # Contract
///
/// - `submit` is only called on an idle frame; calling it again before
///   `cleanup` is a bug and panics.
/// - `cleanup` blocks until the last submission finished, then resets all
///   per-cycle state.
/// - `add_image` slots count from 0 in call order within a cycle.
pub trait FrameBackend: Sized {
    /// Shared device objects the frame is built from.
    type Device;
    type Image;
    type Buffer: GpuBuffer;

    /// Creates the per-frame resources. The frame starts idle.
    fn setup(device: Arc<Self::Device>) -> RhiResult<Self>;

    /// Non-blocking: is a submission still executing?
    fn is_busy(&self) -> RhiResult<bool>;

    /// Waits for the last submission and resets the frame for reuse.
    fn cleanup(&mut self) -> RhiResult<()>;

    /// Fresh image table for a new cycle.
    fn create_descriptors(&self) -> Descriptors;

    /// Registers an image for sampling and returns its binding slot.
    fn add_image(&mut self, image: &Self::Image, sampler: SamplerKind) -> u32;

    /// Identity of an image, used to deduplicate registrations.
    fn image_key(image: &Self::Image) -> u64;

    fn create_vertex_buffer(&self, size: usize) -> RhiResult<Self::Buffer>;

    fn create_storage_buffer(&self, size: usize) -> RhiResult<Self::Buffer>;

    /// Records `ops` and submits them.
    fn submit(
        &mut self,
        vertex_buffer: Option<&Self::Buffer>,
        storage_buffer: Option<&Self::Buffer>,
        ops: &[Op],
    ) -> RhiResult<()>;
}

/// Buffers referenced by the outstanding submission.
struct InFlight<Buf> {
    _vertex: Option<Buf>,
    _storage: Option<Buf>,
}

/// A frame: backend resources plus the data accumulated for one submission.
pub struct GpuFrame<B: FrameBackend> {
    backend: B,
    descriptors: Descriptors,
    vertex_data: HostBuffer,
    storage_data: HostBuffer,
    ops: Vec<Op>,
    in_flight: Option<InFlight<B::Buffer>>,
    submissions: u64,
}

impl<B: FrameBackend> GpuFrame<B> {
    /// Sets up a new idle frame on `device`.
    pub fn new(device: Arc<B::Device>) -> RhiResult<Self> {
        let backend = B::setup(device)?;
        let descriptors = backend.create_descriptors();

        Ok(Self {
            backend,
            descriptors,
            vertex_data: HostBuffer::new(),
            storage_data: HostBuffer::new(),
            ops: Vec::new(),
            in_flight: None,
            submissions: 0,
        })
    }

    /// Opens a writer appending per-instance vertex data.
    pub fn vertex_writer(&mut self) -> BufferWriter<'_, HostBuffer> {
        self.vertex_data.writer()
    }

    /// Opens a writer appending to the storage buffer bound at slot 0.
    pub fn storage_writer(&mut self) -> BufferWriter<'_, HostBuffer> {
        self.storage_data.writer()
    }

    /// Registers an image for this cycle and returns its slot.
    pub fn add_image(&mut self, image: &B::Image, sampler: SamplerKind) -> u32 {
        self.descriptors
            .add_image(&mut self.backend, image, sampler)
    }

    pub fn push_op(&mut self, op: Op) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn is_busy(&self) -> RhiResult<bool> {
        self.backend.is_busy()
    }

    /// Uploads the committed vertex and storage data and submits the ops.
    ///
    /// Empty data produces no buffer. The uploaded buffers stay alive until
    /// the next [`cleanup`](Self::cleanup).
    ///
    /// # Panics
    ///
    /// Panics if the frame was already submitted this cycle.
    pub fn submit(&mut self) -> RhiResult<()> {
        assert!(
            self.in_flight.is_none(),
            "frame submitted twice without cleanup"
        );

        let vertex = upload(&self.vertex_data, |size| {
            self.backend.create_vertex_buffer(size)
        })?;
        let storage = upload(&self.storage_data, |size| {
            self.backend.create_storage_buffer(size)
        })?;

        self.backend
            .submit(vertex.as_ref(), storage.as_ref(), &self.ops)?;

        self.submissions += 1;
        debug!(
            "Frame submitted: {} ops, {} images, {} vertex bytes, {} storage bytes",
            self.ops.len(),
            self.descriptors.len(),
            self.vertex_data.len(),
            self.storage_data.len()
        );

        self.in_flight = Some(InFlight {
            _vertex: vertex,
            _storage: storage,
        });

        Ok(())
    }

    /// Waits for the GPU and resets the frame for the next cycle.
    pub fn cleanup(&mut self) -> RhiResult<()> {
        self.backend.cleanup()?;

        self.in_flight = None;
        self.ops.clear();
        self.vertex_data.clear();
        self.storage_data.clear();
        self.descriptors = self.backend.create_descriptors();

        trace!("Frame cleaned up after {} submissions", self.submissions);

        Ok(())
    }

    /// Number of submissions made over the frame's life.
    #[inline]
    pub fn submissions(&self) -> u64 {
        self.submissions
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

fn upload<Buf: GpuBuffer>(
    data: &HostBuffer,
    create: impl FnOnce(usize) -> RhiResult<Buf>,
) -> RhiResult<Option<Buf>> {
    if data.is_empty() {
        return Ok(None);
    }

    let buffer = create(data.len())?;
    buffer.write(0, data.committed())?;
    Ok(Some(buffer))
}
