//! GPU frame submission.
//!
//! This crate turns recorded drawing work into GPU submissions:
//! - [`buffer_writer`] packs typed values into vertex and storage data
//! - [`op`] is the operation list a frame records
//! - [`frame`] is the accumulate, submit, cleanup lifecycle of one frame
//! - [`frame_ring`] cycles several frames in flight
//! - [`vulkan`] is the Vulkan backend

pub mod buffer_writer;
pub mod descriptors;
pub mod frame;
pub mod frame_ring;
pub mod op;
pub mod types;
pub mod vulkan;

#[cfg(test)]
mod testing;

pub use buffer_writer::{BufferWriter, HostBuffer, WriterTarget};
pub use frame::{FrameBackend, GpuBuffer, GpuFrame};
pub use frame_ring::FrameRing;
pub use op::{DrawOp, Globals, Op};
pub use vulkan::{GpuDevice, VulkanFrame};
