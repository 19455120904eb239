//! Alignment-aware serialization into growable frame memory.
//!
//! A [`BufferWriter`] appends typed values to a [`WriterTarget`], padding
//! each value to its natural alignment. The writer is transactional: it ends
//! with [`BufferWriter::commit`] or [`BufferWriter::abort`], and since it
//! borrows its target mutably no second writer can start before that.
//!
//! # Example
//!
//! ```
//! use glam::Vec2;
//! use vellum_renderer::buffer_writer::HostBuffer;
//! use vellum_renderer::types::{Rect, Rgba};
//!
//! let mut storage = HostBuffer::new();
//!
//! let mut writer = storage.writer();
//! writer.append_rect(&Rect::new(0.0, 0.0, 64.0, 64.0), Vec2::ZERO);
//! writer.append_rgba(&Rgba::WHITE);
//! assert_eq!(writer.commit(), 32);
//!
//! assert_eq!(storage.committed().len(), 32);
//! ```

use std::mem::align_of;

use glam::{Mat4, Vec2, Vec4};
use tracing::trace;

use crate::types::{ColorStop, Rect, Rgba};

/// Backing memory of a [`BufferWriter`].
pub trait WriterTarget {
    /// Bytes available without growing.
    fn allocated(&self) -> usize;

    /// Grows the allocation to hold at least `size` bytes from the start.
    /// Bytes already written are preserved.
    fn grow(&mut self, size: usize);

    /// The whole allocation, `allocated()` bytes long.
    fn bytes(&self) -> &[u8];

    fn bytes_mut(&mut self) -> &mut [u8];

    /// Ends a write that started at `initial_size` and reached `size`.
    ///
    /// Called exactly once per writer, with `commit = false` when the writer
    /// was aborted or dropped.
    fn finish(&mut self, initial_size: usize, size: usize, commit: bool) -> usize;
}

/// Rounds `number` up to the next multiple of `divisor`.
#[inline]
pub const fn round_up(number: usize, divisor: usize) -> usize {
    number.div_ceil(divisor) * divisor
}

/// Append-only writer over a [`WriterTarget`].
pub struct BufferWriter<'a, T: WriterTarget> {
    target: &'a mut T,
    initial_size: usize,
    size: usize,
    allocated: usize,
    finished: bool,
}

impl<'a, T: WriterTarget> BufferWriter<'a, T> {
    /// Starts writing into `target` at byte `initial_size`, growing the
    /// target first if it is smaller than that.
    pub fn new(target: &'a mut T, initial_size: usize) -> Self {
        let allocated = target.allocated();
        let mut writer = Self {
            target,
            initial_size,
            size: initial_size,
            allocated,
            finished: false,
        };
        writer.ensure_size(initial_size);
        writer
    }

    /// Makes sure the first `size` bytes are backed by memory.
    ///
    /// Growing may move the backing storage.
    pub fn ensure_size(&mut self, size: usize) {
        if size <= self.allocated {
            return;
        }

        self.target.grow(size);
        self.allocated = self.target.allocated();
        assert!(
            self.allocated >= size,
            "writer target grew to {} bytes, {} requested",
            self.allocated,
            size
        );
    }

    /// Appends `data` at the next multiple of `align`.
    ///
    /// The padding bytes in front of it are left as they are.
    ///
    /// # Panics
    ///
    /// Panics if `align` is zero.
    pub fn append(&mut self, align: usize, data: &[u8]) {
        assert!(align > 0, "append alignment must be non-zero");
        let offset = round_up(self.size, align);
        let end = offset + data.len();
        self.ensure_size(end);

        self.target.bytes_mut()[offset..end].copy_from_slice(data);
        self.size = end;
    }

    pub fn append_float(&mut self, f: f32) {
        self.append(align_of::<f32>(), bytemuck::bytes_of(&f));
    }

    pub fn append_int(&mut self, i: i32) {
        self.append(align_of::<i32>(), bytemuck::bytes_of(&i));
    }

    pub fn append_uint(&mut self, u: u32) {
        self.append(align_of::<u32>(), bytemuck::bytes_of(&u));
    }

    /// Appends the 16 matrix elements, one basis vector after another.
    pub fn append_matrix(&mut self, matrix: &Mat4) {
        let f = matrix.to_cols_array();
        self.append(align_of::<f32>(), bytemuck::cast_slice(&f));
    }

    pub fn append_vec4(&mut self, vec4: Vec4) {
        let f = vec4.to_array();
        self.append(align_of::<f32>(), bytemuck::cast_slice(&f));
    }

    /// Appends `point + offset` as two floats.
    pub fn append_point(&mut self, point: Vec2, offset: Vec2) {
        let f = (point + offset).to_array();
        self.append(align_of::<f32>(), bytemuck::cast_slice(&f));
    }

    /// Appends the rect moved by `offset` as four floats.
    pub fn append_rect(&mut self, rect: &Rect, offset: Vec2) {
        let f = rect.to_float(offset);
        self.append(align_of::<f32>(), bytemuck::cast_slice(&f));
    }

    pub fn append_rgba(&mut self, rgba: &Rgba) {
        let f = rgba.to_array();
        self.append(align_of::<f32>(), bytemuck::cast_slice(&f));
    }

    /// Appends the stop count as a `u32`, then the stops themselves.
    pub fn append_color_stops(&mut self, stops: &[ColorStop]) {
        let count = u32::try_from(stops.len()).expect("color stop count exceeds u32");
        self.append_uint(count);
        self.append(align_of::<f32>(), bytemuck::cast_slice(stops));
    }

    /// Bytes written since the start of the buffer.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Where this writer started.
    #[inline]
    pub fn initial_size(&self) -> usize {
        self.initial_size
    }

    /// Everything from the start of the buffer up to the cursor.
    #[inline]
    pub fn written(&self) -> &[u8] {
        &self.target.bytes()[..self.size]
    }

    /// Moves the cursor back to `size`, dropping what was written after it.
    ///
    /// # Panics
    ///
    /// Panics if `size` is past the cursor.
    pub fn rewind(&mut self, size: usize) {
        assert!(
            size <= self.size,
            "cannot rewind to {} past the cursor at {}",
            size,
            self.size
        );

        self.size = size;
    }

    /// Copies the bytes written by this writer so far. Empty after a
    /// rewind to or below [`initial_size`](Self::initial_size).
    pub fn backup(&self) -> Vec<u8> {
        if self.size <= self.initial_size {
            return Vec::new();
        }
        self.target.bytes()[self.initial_size..self.size].to_vec()
    }

    /// Keeps what was written. Returns the target's answer, for
    /// [`HostBuffer`] the new committed length.
    pub fn commit(mut self) -> usize {
        self.finished = true;
        self.target.finish(self.initial_size, self.size, true)
    }

    /// Discards what was written.
    pub fn abort(mut self) {
        self.finished = true;
        self.target.finish(self.initial_size, self.size, false);
    }
}

impl<T: WriterTarget> Drop for BufferWriter<'_, T> {
    fn drop(&mut self) {
        if !self.finished {
            trace!(
                "Buffer writer dropped without commit, discarding {} bytes",
                self.size.saturating_sub(self.initial_size)
            );
            self.target.finish(self.initial_size, self.size, false);
        }
    }
}

/// CPU-side staging memory filled by writers and uploaded at submit time.
///
/// Only committed bytes count; an aborted writer leaves the committed length
/// where it was.
#[derive(Debug, Default)]
pub struct HostBuffer {
    data: Vec<u8>,
    committed: usize,
}

impl HostBuffer {
    /// Smallest allocation made on first growth.
    pub const MIN_ALLOCATION: usize = 4096;

    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a writer that appends after the committed bytes.
    pub fn writer(&mut self) -> BufferWriter<'_, Self> {
        let start = self.committed;
        BufferWriter::new(self, start)
    }

    /// The committed bytes.
    #[inline]
    pub fn committed(&self) -> &[u8] {
        &self.data[..self.committed]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.committed
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.committed == 0
    }

    /// Forgets all committed bytes. The allocation is kept for reuse.
    pub fn clear(&mut self) {
        self.committed = 0;
    }
}

impl WriterTarget for HostBuffer {
    fn allocated(&self) -> usize {
        self.data.len()
    }

    fn grow(&mut self, size: usize) {
        let new_size = size.next_power_of_two().max(Self::MIN_ALLOCATION);
        trace!("Growing host buffer {} -> {} bytes", self.data.len(), new_size);
        self.data.resize(new_size, 0);
    }

    fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn finish(&mut self, _initial_size: usize, size: usize, commit: bool) -> usize {
        if commit {
            self.committed = size;
        }
        self.committed
    }
}
