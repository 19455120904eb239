//! vellum - headless frames-in-flight driver.
//!
//! Renders a fixed number of frames through a [`FrameRing`] without a
//! window: every frame registers a texture, fills its storage buffer, clears
//! an offscreen target and submits. Frame timings are logged at exit.
//!
//! Usage: `vellum [config.toml]`

use std::sync::Arc;

use anyhow::{Context, Result};
use ash::vk;
use tracing::{debug, info, warn};

use vellum_core::{Config, FrameTimer, init_logging};
use vellum_renderer::op::Op;
use vellum_renderer::types::{ColorStop, Rect, Rgba};
use vellum_renderer::{FrameRing, Globals, GpuDevice, VulkanFrame};
use vellum_rhi::device::Device;
use vellum_rhi::image::Image;
use vellum_rhi::instance::Instance;
use vellum_rhi::physical_device::select_physical_device;
use vellum_rhi::sampler::SamplerKind;

const TARGET_SIZE: u32 = 512;
const TEXTURE_SIZE: u32 = 64;

fn load_config() -> Result<Config> {
    match std::env::args().nth(1) {
        Some(path) => {
            Config::from_file(&path).with_context(|| format!("loading config from {path}"))
        }
        None => Ok(Config::default()),
    }
}

/// Clear color cycling through hues so consecutive frames differ.
fn clear_color(frame: u32) -> Rgba {
    let t = (frame % 60) as f32 / 60.0;
    Rgba::new(t, 1.0 - t, 0.5, 1.0)
}

/// Records and submits one frame into `target`.
fn render_frame(
    ring: &mut FrameRing<VulkanFrame>,
    target: &Image,
    texture: &Image,
    frame_number: u32,
) -> Result<()> {
    let frame = ring.acquire().context("acquiring frame")?;

    let slot = frame.add_image(texture, SamplerKind::Default);

    let extent = target.extent();
    let viewport = Rect::new(0.0, 0.0, extent.width as f32, extent.height as f32);
    {
        let mut writer = frame.storage_writer();
        writer.append_rect(&viewport, glam::Vec2::ZERO);
        writer.append_rgba(&clear_color(frame_number));
        writer.append_color_stops(&[
            ColorStop::new(0.0, Rgba::BLACK),
            ColorStop::new(1.0, Rgba::WHITE),
        ]);
        writer.append_uint(slot);
        let size = writer.commit();
        debug!("Frame {} storage data: {} bytes", frame_number, size);
    }

    if frame_number == 0 {
        frame.push_op(Op::Barrier {
            image: texture.handle(),
            from: vk::ImageLayout::UNDEFINED,
            to: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        });
    }

    let area = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    };
    frame.push_op(Op::Barrier {
        image: target.handle(),
        from: vk::ImageLayout::UNDEFINED,
        to: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    });
    frame.push_op(Op::BeginRendering {
        target: target.view(),
        area,
        clear: Some(clear_color(frame_number)),
    });
    frame.push_op(Op::Globals(Globals::for_viewport(
        &viewport,
        glam::Vec2::ONE,
    )));
    frame.push_op(Op::Scissor(area));
    frame.push_op(Op::EndRendering);
    frame.push_op(Op::Barrier {
        image: target.handle(),
        from: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        to: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    });

    frame.submit().context("submitting frame")?;
    Ok(())
}

fn render(
    ring: &mut FrameRing<VulkanFrame>,
    targets: &[Image],
    texture: &Image,
    frames: u32,
    timer: &mut FrameTimer,
) -> Result<()> {
    for frame_number in 0..frames {
        timer.begin_frame();
        let target = &targets[frame_number as usize % targets.len()];
        render_frame(ring, target, texture, frame_number)?;
        timer.end_frame();
    }
    Ok(())
}

fn main() -> Result<()> {
    let config = load_config()?;
    init_logging(&config.logging);

    info!("Starting vellum");

    let instance = Instance::new(config.gpu.validation).context("creating Vulkan instance")?;
    let physical_device =
        select_physical_device(instance.handle()).context("selecting physical device")?;
    info!(
        "Using {} ({})",
        physical_device.device_name(),
        physical_device.device_type_name()
    );

    let device: Arc<Device> =
        Device::new(&instance, &physical_device).context("creating logical device")?;
    let gpu = GpuDevice::new(device.clone(), &config.gpu).context("creating GPU device")?;

    let texture = Image::new(device.clone(), TEXTURE_SIZE, TEXTURE_SIZE, Image::DEFAULT_FORMAT)
        .context("creating texture")?;
    let targets = (0..config.gpu.frames_in_flight)
        .map(|_| Image::new(device.clone(), TARGET_SIZE, TARGET_SIZE, Image::DEFAULT_FORMAT))
        .collect::<Result<Vec<_>, _>>()
        .context("creating render targets")?;

    let mut ring =
        FrameRing::<VulkanFrame>::new(&gpu, config.gpu.frames_in_flight).context("creating frames")?;

    let mut timer = FrameTimer::new();
    let result = render(&mut ring, &targets, &texture, config.gpu.frames, &mut timer);

    // Frames still in flight must finish before targets and frames drop.
    if let Err(e) = ring.wait_idle() {
        warn!("Failed to wait for frames in flight: {}", e);
        device.wait_idle().context("waiting for device idle")?;
    }
    result?;

    info!(
        "Rendered {} frames in {:.2?} (avg {:.2?}, min {:.2?}, max {:.2?})",
        timer.frames(),
        timer.elapsed(),
        timer.average(),
        timer.min(),
        timer.max()
    );

    Ok(())
}
