//! Command emission for the operation list.
//!
//! [`vk_command`] records the op at the head of a list and returns what is
//! left to record. Consecutive draws are merged into one call.

use ash::vk;
use vellum_rhi::command::CommandBuffer;
use vellum_rhi::image::color_subresource_range;

use super::GpuDevice;
use crate::op::{Op, VERTICES_PER_INSTANCE, layout_access, merge_draws};
use crate::types::Rgba;

/// State carried across ops while recording one command buffer.
#[derive(Debug, Default)]
pub struct CommandState {
    /// Pipeline currently bound, null before the first draw.
    pub current_pipeline: vk::Pipeline,
    /// Draw calls recorded so far.
    pub draw_calls: u32,
}

/// Records the first op of `ops` into `cmd` and returns the remaining ops.
///
/// An empty list is returned unchanged.
pub fn vk_command<'o>(
    ops: &'o [Op],
    state: &mut CommandState,
    cmd: &CommandBuffer,
    device: &GpuDevice,
) -> &'o [Op] {
    let Some((op, rest)) = ops.split_first() else {
        return ops;
    };

    match op {
        Op::Barrier { image, from, to } => {
            let (src_access, src_stage) = layout_access(*from);
            let (dst_access, dst_stage) = layout_access(*to);

            let barrier = vk::ImageMemoryBarrier::default()
                .src_access_mask(src_access)
                .dst_access_mask(dst_access)
                .old_layout(*from)
                .new_layout(*to)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(*image)
                .subresource_range(color_subresource_range());

            cmd.image_barrier(src_stage, dst_stage, &barrier);
            rest
        }
        Op::BeginRendering {
            target,
            area,
            clear,
        } => {
            let load_op = if clear.is_some() {
                vk::AttachmentLoadOp::CLEAR
            } else {
                vk::AttachmentLoadOp::LOAD
            };

            let attachment = vk::RenderingAttachmentInfo::default()
                .image_view(*target)
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(load_op)
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(clear_value(clear.unwrap_or(Rgba::TRANSPARENT)));

            let rendering_info = vk::RenderingInfo::default()
                .render_area(*area)
                .layer_count(1)
                .color_attachments(std::slice::from_ref(&attachment));

            cmd.begin_rendering(&rendering_info);
            cmd.set_viewport(&viewport(area));
            cmd.set_scissor(area);
            rest
        }
        Op::EndRendering => {
            cmd.end_rendering();
            rest
        }
        Op::Globals(globals) => {
            cmd.push_constants(
                device.pipeline_layout(),
                GpuDevice::PUSH_CONSTANT_STAGES,
                0,
                bytemuck::bytes_of(globals),
            );
            rest
        }
        Op::Scissor(rect) => {
            cmd.set_scissor(rect);
            rest
        }
        Op::Draw(draw) => {
            let (merged, consumed) = merge_draws(*draw, rest);

            if merged.pipeline != state.current_pipeline {
                cmd.bind_graphics_pipeline(merged.pipeline);
                state.current_pipeline = merged.pipeline;
            }

            cmd.draw(
                VERTICES_PER_INSTANCE,
                merged.instances,
                0,
                merged.first_instance(),
            );
            state.draw_calls += 1;

            &rest[consumed..]
        }
    }
}

/// Viewport covering `area` with the full depth range.
pub fn viewport(area: &vk::Rect2D) -> vk::Viewport {
    vk::Viewport {
        x: area.offset.x as f32,
        y: area.offset.y as f32,
        width: area.extent.width as f32,
        height: area.extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

pub fn clear_value(color: Rgba) -> vk::ClearValue {
    vk::ClearValue {
        color: vk::ClearColorValue {
            float32: color.to_array(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_matches_area() {
        let area = vk::Rect2D {
            offset: vk::Offset2D { x: 10, y: 20 },
            extent: vk::Extent2D {
                width: 300,
                height: 200,
            },
        };
        let viewport = viewport(&area);
        assert_eq!(viewport.x, 10.0);
        assert_eq!(viewport.y, 20.0);
        assert_eq!(viewport.width, 300.0);
        assert_eq!(viewport.height, 200.0);
        assert_eq!(viewport.max_depth, 1.0);
    }

    #[test]
    fn test_clear_value_channels() {
        let value = clear_value(Rgba::new(0.25, 0.5, 0.75, 1.0));
        let channels = unsafe { value.color.float32 };
        assert_eq!(channels, [0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_initial_state_has_no_pipeline() {
        let state = CommandState::default();
        assert_eq!(state.current_pipeline, vk::Pipeline::null());
        assert_eq!(state.draw_calls, 0);
    }
}
