//! Operations recorded into a frame.
//!
//! A frame's work is a flat list of [`Op`]s, consumed front to back at
//! submit time. Emission lives with the backend (see
//! [`crate::vulkan::command`]); this module holds the backend-independent
//! parts: the op types, draw merging and layout access rules.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2};

use crate::types::{Rect, Rgba};

/// Most instances a single merged draw call may cover.
pub const MAX_MERGE_INSTANCES: u32 = 10_000;

/// Vertices emitted per instance (two triangles).
pub const VERTICES_PER_INSTANCE: u32 = 6;

/// Per-pass shader globals, uploaded as push constants.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Globals {
    pub mvp: [f32; 16],
    /// Rounded clip: bounds, then four corner sizes.
    pub clip: [f32; 12],
    pub scale: [f32; 2],
}

impl Globals {
    /// Globals with a rectangular (unrounded) clip.
    pub fn new(mvp: &Mat4, clip: &Rect, scale: Vec2) -> Self {
        let mut rounded = [0.0; 12];
        rounded[..4].copy_from_slice(&clip.to_float(Vec2::ZERO));

        Self {
            mvp: mvp.to_cols_array(),
            clip: rounded,
            scale: scale.to_array(),
        }
    }

    /// Orthographic projection mapping `viewport` to clip space.
    pub fn for_viewport(viewport: &Rect, scale: Vec2) -> Self {
        let mvp = Mat4::orthographic_rh(
            viewport.x,
            viewport.x + viewport.width,
            viewport.y,
            viewport.y + viewport.height,
            -1.0,
            1.0,
        );
        Self::new(&mvp, viewport, scale)
    }
}

/// Instanced draw of one pipeline over a range of the vertex buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawOp {
    pub pipeline: vk::Pipeline,
    /// Byte offset of the first instance in the vertex buffer.
    pub vertex_offset: u32,
    /// Bytes per instance.
    pub vertex_size: u32,
    pub instances: u32,
}

impl DrawOp {
    /// Byte offset one past the last instance, `None` when it does not
    /// fit in a `u32`.
    #[inline]
    pub fn vertex_end(&self) -> Option<u32> {
        self.vertex_size
            .checked_mul(self.instances)
            .and_then(|len| self.vertex_offset.checked_add(len))
    }

    /// Index of the first instance, counted in `vertex_size` units.
    #[inline]
    pub fn first_instance(&self) -> u32 {
        assert!(self.vertex_size > 0, "draw without vertex data");
        self.vertex_offset / self.vertex_size
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    /// Image layout transition.
    Barrier {
        image: vk::Image,
        from: vk::ImageLayout,
        to: vk::ImageLayout,
    },
    /// Starts rendering into `target`, clearing it first when `clear` is set.
    BeginRendering {
        target: vk::ImageView,
        area: vk::Rect2D,
        clear: Option<Rgba>,
    },
    EndRendering,
    Globals(Globals),
    Scissor(vk::Rect2D),
    Draw(DrawOp),
}

/// Folds the draws following `first` into it while they continue it.
///
/// A draw continues the merged one when it uses the same pipeline and
/// instance size and its data starts where the merged range ends. Returns
/// the merged draw and how many ops of `following` it absorbed.
pub fn merge_draws(first: DrawOp, following: &[Op]) -> (DrawOp, usize) {
    let mut merged = first;
    let mut consumed = 0;

    for op in following {
        let Op::Draw(next) = op else { break };

        let instances = merged
            .instances
            .checked_add(next.instances)
            .filter(|&n| n <= MAX_MERGE_INSTANCES);

        let Some(instances) = instances else { break };
        if next.pipeline != merged.pipeline
            || next.vertex_size != merged.vertex_size
            || merged.vertex_end() != Some(next.vertex_offset)
        {
            break;
        }

        merged.instances = instances;
        consumed += 1;
    }

    (merged, consumed)
}

/// Access mask and pipeline stage for an image in `layout`.
pub fn layout_access(layout: vk::ImageLayout) -> (vk::AccessFlags, vk::PipelineStageFlags) {
    match layout {
        vk::ImageLayout::UNDEFINED => (
            vk::AccessFlags::empty(),
            vk::PipelineStageFlags::TOP_OF_PIPE,
        ),
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => (
            vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        ),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => (
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        ),
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => (
            vk::AccessFlags::TRANSFER_READ,
            vk::PipelineStageFlags::TRANSFER,
        ),
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => (
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TRANSFER,
        ),
        vk::ImageLayout::PRESENT_SRC_KHR => (
            vk::AccessFlags::empty(),
            vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        ),
        _ => (
            vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
            vk::PipelineStageFlags::ALL_COMMANDS,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn draw(pipeline: u64, vertex_offset: u32, instances: u32) -> DrawOp {
        DrawOp {
            pipeline: vk::Pipeline::from_raw(pipeline),
            vertex_offset,
            vertex_size: 16,
            instances,
        }
    }

    #[test]
    fn test_globals_is_push_constant_sized() {
        assert_eq!(std::mem::size_of::<Globals>(), 120);
    }

    #[test]
    fn test_globals_clip_bounds() {
        let globals = Globals::new(
            &Mat4::IDENTITY,
            &Rect::new(1.0, 2.0, 3.0, 4.0),
            Vec2::ONE,
        );
        assert_eq!(globals.clip[..4], [1.0, 2.0, 3.0, 4.0]);
        assert!(globals.clip[4..].iter().all(|&c| c == 0.0));
        assert_eq!(globals.mvp, Mat4::IDENTITY.to_cols_array());
    }

    #[test]
    fn test_contiguous_draws_merge() {
        let ops = [
            Op::Draw(draw(1, 32, 3)),
            Op::Draw(draw(1, 80, 1)),
            Op::EndRendering,
        ];

        let (merged, consumed) = merge_draws(draw(1, 0, 2), &ops);
        assert_eq!(consumed, 2);
        assert_eq!(merged.instances, 6);
        assert_eq!(merged.vertex_offset, 0);
        assert_eq!(merged.first_instance(), 0);
    }

    #[test]
    fn test_merge_stops_at_pipeline_change() {
        let ops = [Op::Draw(draw(2, 32, 1)), Op::Draw(draw(1, 48, 1))];
        let (merged, consumed) = merge_draws(draw(1, 0, 2), &ops);
        assert_eq!(consumed, 0);
        assert_eq!(merged, draw(1, 0, 2));
    }

    #[test]
    fn test_merge_stops_at_gap() {
        let ops = [Op::Draw(draw(1, 48, 1))];
        let (_, consumed) = merge_draws(draw(1, 0, 2), &ops);
        assert_eq!(consumed, 0);
    }

    #[test]
    fn test_merge_stops_at_non_draw() {
        let ops = [
            Op::Scissor(vk::Rect2D::default()),
            Op::Draw(draw(1, 32, 1)),
        ];
        let (_, consumed) = merge_draws(draw(1, 0, 2), &ops);
        assert_eq!(consumed, 0);
    }

    #[test]
    fn test_merge_respects_instance_cap() {
        let ops = [Op::Draw(draw(1, 16 * 9_999, 2))];
        let (merged, consumed) = merge_draws(draw(1, 0, 9_999), &ops);
        assert_eq!(consumed, 0);
        assert_eq!(merged.instances, 9_999);

        let ops = [Op::Draw(draw(1, 16 * 9_999, 1))];
        let (merged, consumed) = merge_draws(draw(1, 0, 9_999), &ops);
        assert_eq!(consumed, 1);
        assert_eq!(merged.instances, MAX_MERGE_INSTANCES);
    }

    #[test]
    fn test_vertex_end_overflow() {
        assert_eq!(draw(1, 32, 2).vertex_end(), Some(64));
        assert_eq!(draw(1, 0, u32::MAX).vertex_end(), None);
        assert_eq!(draw(1, u32::MAX - 8, 1).vertex_end(), None);
    }

    #[test]
    fn test_huge_draws_do_not_merge() {
        let ops = [Op::Draw(draw(1, 0, 1))];
        let (merged, consumed) = merge_draws(draw(1, 0, u32::MAX), &ops);
        assert_eq!(consumed, 0);
        assert_eq!(merged.instances, u32::MAX);

        let ops = [Op::Draw(draw(1, 80, u32::MAX))];
        let (merged, consumed) = merge_draws(draw(1, 0, 5), &ops);
        assert_eq!(consumed, 0);
        assert_eq!(merged.instances, 5);
    }

    #[test]
    fn test_first_instance() {
        assert_eq!(draw(1, 64, 1).first_instance(), 4);
    }

    #[test]
    fn test_layout_access() {
        let (access, stage) = layout_access(vk::ImageLayout::UNDEFINED);
        assert!(access.is_empty());
        assert_eq!(stage, vk::PipelineStageFlags::TOP_OF_PIPE);

        let (access, stage) = layout_access(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert!(access.contains(vk::AccessFlags::COLOR_ATTACHMENT_WRITE));
        assert_eq!(stage, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);

        let (access, stage) = layout_access(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(access, vk::AccessFlags::SHADER_READ);
        assert_eq!(stage, vk::PipelineStageFlags::FRAGMENT_SHADER);

        let (_, stage) = layout_access(vk::ImageLayout::GENERAL);
        assert_eq!(stage, vk::PipelineStageFlags::ALL_COMMANDS);
    }
}
