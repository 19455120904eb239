//! Frame lifecycle against a real Vulkan device.
//!
//! Every test skips when no suitable device is available.

use std::sync::Arc;

use ash::vk;
use vellum_core::GpuConfig;
use vellum_renderer::frame::{FrameBackend, GpuFrame};
use vellum_renderer::frame_ring::FrameRing;
use vellum_renderer::op::Op;
use vellum_renderer::types::Rgba;
use vellum_renderer::vulkan::{GpuDevice, VulkanFrame};
use vellum_rhi::device::Device;
use vellum_rhi::image::Image;
use vellum_rhi::instance::Instance;
use vellum_rhi::physical_device::select_physical_device;
use vellum_rhi::sampler::SamplerKind;

/// Device objects, dropped before the instance.
struct Gpu {
    device: Arc<GpuDevice>,
    _instance: Instance,
}

fn gpu() -> Option<Gpu> {
    let instance = match Instance::new(false) {
        Ok(instance) => instance,
        Err(e) => {
            eprintln!("Skipping test: Vulkan not available ({e})");
            return None;
        }
    };
    let info = match select_physical_device(instance.handle()) {
        Ok(info) => info,
        Err(e) => {
            eprintln!("Skipping test: no suitable GPU ({e})");
            return None;
        }
    };
    let device = Device::new(&instance, &info).expect("logical device");
    let config = GpuConfig {
        max_descriptors: 64,
        ..GpuConfig::default()
    };
    let device = GpuDevice::new(device, &config).expect("gpu device");

    Some(Gpu {
        device,
        _instance: instance,
    })
}

fn full_area(image: &Image) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: image.extent(),
    }
}

#[test]
fn test_new_frame_is_not_busy() {
    let Some(gpu) = gpu() else { return };
    let frame = VulkanFrame::setup(gpu.device.clone()).unwrap();

    assert!(!frame.is_busy().unwrap());
    assert_eq!(frame.descriptor_counts(), (0, 0));
}

#[test]
fn test_empty_submission_round_trip() {
    let Some(gpu) = gpu() else { return };
    let mut frame = VulkanFrame::setup(gpu.device.clone()).unwrap();

    frame.submit(None, None, &[]).unwrap();
    frame.cleanup().unwrap();

    assert!(!frame.is_busy().unwrap());
    assert_eq!(frame.descriptor_counts(), (0, 0));

    // The frame is reusable after cleanup.
    frame.submit(None, None, &[]).unwrap();
    frame.cleanup().unwrap();
}

#[test]
fn test_storage_buffer_takes_slot_zero() {
    let Some(gpu) = gpu() else { return };
    let device = gpu.device.device().clone();
    let mut frame: GpuFrame<VulkanFrame> = GpuFrame::new(gpu.device.clone()).unwrap();

    let first = Image::new(device.clone(), 16, 16, Image::DEFAULT_FORMAT).unwrap();
    let second = Image::new(device, 16, 16, Image::DEFAULT_FORMAT).unwrap();

    assert_eq!(frame.add_image(&first, SamplerKind::Default), 0);
    assert_eq!(frame.add_image(&second, SamplerKind::Nearest), 1);
    assert_eq!(frame.add_image(&first, SamplerKind::Default), 0);

    let mut writer = frame.storage_writer();
    writer.append_rgba(&Rgba::WHITE);
    writer.append_uint(7);
    writer.commit();

    frame.submit().unwrap();
    assert_eq!(frame.backend().descriptor_counts(), (2, 1));

    frame.cleanup().unwrap();
    assert!(!frame.is_busy().unwrap());
    assert_eq!(frame.backend().descriptor_counts(), (0, 0));
}

#[test]
fn test_clear_render_target() {
    let Some(gpu) = gpu() else { return };
    let target = Image::new(gpu.device.device().clone(), 64, 64, Image::DEFAULT_FORMAT).unwrap();
    let mut frame = VulkanFrame::setup(gpu.device.clone()).unwrap();

    let ops = [
        Op::Barrier {
            image: target.handle(),
            from: vk::ImageLayout::UNDEFINED,
            to: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        },
        Op::BeginRendering {
            target: target.view(),
            area: full_area(&target),
            clear: Some(Rgba::new(0.2, 0.3, 0.4, 1.0)),
        },
        Op::EndRendering,
        Op::Barrier {
            image: target.handle(),
            from: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            to: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        },
    ];

    frame.submit(None, None, &ops).unwrap();
    frame.cleanup().unwrap();
    assert!(!frame.is_busy().unwrap());
}

#[test]
fn test_frame_ring_cycles() {
    let Some(gpu) = gpu() else { return };
    let mut ring: FrameRing<VulkanFrame> = FrameRing::new(&gpu.device, 2).unwrap();

    for i in 0..6u32 {
        let frame = ring.acquire().unwrap();
        let mut writer = frame.storage_writer();
        writer.append_uint(i);
        writer.commit();
        frame.submit().unwrap();
    }

    ring.wait_idle().unwrap();
    assert_eq!(ring.busy_count().unwrap(), 0);
    assert!(ring.frames().iter().all(|frame| frame.submissions() == 3));
}
