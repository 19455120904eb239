//! GPU selection.
//!
//! A GPU qualifies when it exposes a graphics queue, speaks Vulkan 1.3 and
//! supports the descriptor-indexing features frame descriptor sets are
//! built on (variable-count, partially bound, update-after-bind arrays).
//! Among qualifying GPUs, discrete beats integrated, and a larger
//! update-after-bind limit breaks ties.
//!
//! # Example
//!
//! ```no_run
//! use vellum_rhi::instance::Instance;
//! use vellum_rhi::physical_device::select_physical_device;
//!
//! let instance = Instance::new(false).expect("Vulkan loader");
//! let gpu = select_physical_device(instance.handle()).expect("suitable GPU");
//! println!("{} on family {}", gpu.device_name(), gpu.graphics_family);
//! ```

use std::fmt;

use ash::vk;
use tracing::{debug, info};

use crate::error::{RhiError, RhiResult, VkResultExt};

/// Why a GPU was passed over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    ApiVersion { major: u32, minor: u32 },
    NoGraphicsQueue,
    MissingFeature(&'static str),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::ApiVersion { major, minor } => {
                write!(f, "Vulkan {}.{} is older than 1.3", major, minor)
            }
            Rejection::NoGraphicsQueue => f.write_str("no graphics queue"),
            Rejection::MissingFeature(name) => write!(f, "{} unsupported", name),
        }
    }
}

/// Feature bits queried from the 1.2 and 1.3 feature structs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DescriptorIndexingSupport {
    pub runtime_descriptor_array: bool,
    pub partially_bound: bool,
    pub variable_descriptor_count: bool,
    pub sampled_image_update_after_bind: bool,
    pub storage_buffer_update_after_bind: bool,
    pub dynamic_rendering: bool,
}

impl DescriptorIndexingSupport {
    /// Vulkan name of the first unsupported feature.
    pub fn missing(&self) -> Option<&'static str> {
        [
            (self.runtime_descriptor_array, "runtimeDescriptorArray"),
            (self.partially_bound, "descriptorBindingPartiallyBound"),
            (
                self.variable_descriptor_count,
                "descriptorBindingVariableDescriptorCount",
            ),
            (
                self.sampled_image_update_after_bind,
                "descriptorBindingSampledImageUpdateAfterBind",
            ),
            (
                self.storage_buffer_update_after_bind,
                "descriptorBindingStorageBufferUpdateAfterBind",
            ),
            (self.dynamic_rendering, "dynamicRendering"),
        ]
        .into_iter()
        .find_map(|(supported, name)| (!supported).then_some(name))
    }
}

/// A GPU that passed selection.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    pub device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub graphics_family: u32,
    /// Smallest of the per-stage update-after-bind limits for samplers,
    /// sampled images and storage buffers.
    pub max_update_after_bind_descriptors: u32,
}

impl PhysicalDeviceInfo {
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .filter(|name| !name.is_empty())
            .unwrap_or("<unnamed>")
    }

    pub fn device_type_name(&self) -> &'static str {
        device_type_name(self.properties.device_type)
    }

    /// Selection rank; higher wins.
    pub fn rank(&self) -> (u8, u32) {
        let kind = match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 4,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 3,
            vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
            vk::PhysicalDeviceType::CPU => 1,
            _ => 0,
        };
        (kind, self.max_update_after_bind_descriptors)
    }
}

impl fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("kind", &self.device_type_name())
            .field("graphics_family", &self.graphics_family)
            .field(
                "max_update_after_bind_descriptors",
                &self.max_update_after_bind_descriptors,
            )
            .finish()
    }
}

fn device_type_name(device_type: vk::PhysicalDeviceType) -> &'static str {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => "discrete",
        vk::PhysicalDeviceType::INTEGRATED_GPU => "integrated",
        vk::PhysicalDeviceType::VIRTUAL_GPU => "virtual",
        vk::PhysicalDeviceType::CPU => "software",
        _ => "other",
    }
}

/// Picks the best qualifying GPU.
///
/// # Errors
///
/// [`RhiError::NoSuitableGpu`] when nothing qualifies. Each rejected GPU
/// is logged at debug level with its reason.
pub fn select_physical_device(instance: &ash::Instance) -> RhiResult<PhysicalDeviceInfo> {
    let devices = unsafe {
        instance
            .enumerate_physical_devices()
            .call("vkEnumeratePhysicalDevices")?
    };
    debug!("{} physical device(s) enumerated", devices.len());

    let selected = devices
        .into_iter()
        .filter_map(|device| match evaluate(instance, device) {
            Ok(info) => Some(info),
            Err((name, rejection)) => {
                debug!("Skipping GPU '{}': {}", name, rejection);
                None
            }
        })
        .max_by_key(PhysicalDeviceInfo::rank)
        .ok_or(RhiError::NoSuitableGpu)?;

    info!(
        "Selected {} GPU '{}' (update-after-bind limit {})",
        selected.device_type_name(),
        selected.device_name(),
        selected.max_update_after_bind_descriptors
    );

    Ok(selected)
}

fn evaluate(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
) -> Result<PhysicalDeviceInfo, (String, Rejection)> {
    let mut indexing = vk::PhysicalDeviceDescriptorIndexingProperties::default();
    let properties = {
        let mut properties2 = vk::PhysicalDeviceProperties2::default().push_next(&mut indexing);
        unsafe { instance.get_physical_device_properties2(device, &mut properties2) };
        properties2.properties
    };

    let reject = |rejection| {
        let name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        (name, rejection)
    };

    let (major, minor) = (
        vk::api_version_major(properties.api_version),
        vk::api_version_minor(properties.api_version),
    );
    if (major, minor) < (1, 3) {
        return Err(reject(Rejection::ApiVersion { major, minor }));
    }

    let graphics_family = find_graphics_family(instance, device)
        .ok_or_else(|| reject(Rejection::NoGraphicsQueue))?;

    if let Some(feature) = query_indexing_support(instance, device).missing() {
        return Err(reject(Rejection::MissingFeature(feature)));
    }

    let max_update_after_bind_descriptors = indexing
        .max_per_stage_descriptor_update_after_bind_samplers
        .min(indexing.max_per_stage_descriptor_update_after_bind_sampled_images)
        .min(indexing.max_per_stage_descriptor_update_after_bind_storage_buffers);

    Ok(PhysicalDeviceInfo {
        device,
        properties,
        graphics_family,
        max_update_after_bind_descriptors,
    })
}

fn find_graphics_family(instance: &ash::Instance, device: vk::PhysicalDevice) -> Option<u32> {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    families
        .iter()
        .position(|family| {
            family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        })
        .map(|index| index as u32)
}

fn query_indexing_support(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
) -> DescriptorIndexingSupport {
    let mut vk12 = vk::PhysicalDeviceVulkan12Features::default();
    let mut vk13 = vk::PhysicalDeviceVulkan13Features::default();
    {
        let mut features = vk::PhysicalDeviceFeatures2::default()
            .push_next(&mut vk12)
            .push_next(&mut vk13);
        unsafe { instance.get_physical_device_features2(device, &mut features) };
    }

    let on = |flag: vk::Bool32| flag == vk::TRUE;
    DescriptorIndexingSupport {
        runtime_descriptor_array: on(vk12.runtime_descriptor_array),
        partially_bound: on(vk12.descriptor_binding_partially_bound),
        variable_descriptor_count: on(vk12.descriptor_binding_variable_descriptor_count),
        sampled_image_update_after_bind: on(vk12.descriptor_binding_sampled_image_update_after_bind),
        storage_buffer_update_after_bind: on(
            vk12.descriptor_binding_storage_buffer_update_after_bind,
        ),
        dynamic_rendering: on(vk13.dynamic_rendering),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_support() -> DescriptorIndexingSupport {
        DescriptorIndexingSupport {
            runtime_descriptor_array: true,
            partially_bound: true,
            variable_descriptor_count: true,
            sampled_image_update_after_bind: true,
            storage_buffer_update_after_bind: true,
            dynamic_rendering: true,
        }
    }

    fn info(device_type: vk::PhysicalDeviceType, limit: u32) -> PhysicalDeviceInfo {
        PhysicalDeviceInfo {
            device: vk::PhysicalDevice::null(),
            properties: vk::PhysicalDeviceProperties {
                device_type,
                ..Default::default()
            },
            graphics_family: 0,
            max_update_after_bind_descriptors: limit,
        }
    }

    #[test]
    fn test_full_indexing_support_has_nothing_missing() {
        assert_eq!(full_support().missing(), None);
        assert_eq!(
            DescriptorIndexingSupport::default().missing(),
            Some("runtimeDescriptorArray")
        );
    }

    #[test]
    fn test_missing_indexing_feature_is_named() {
        let support = DescriptorIndexingSupport {
            variable_descriptor_count: false,
            ..full_support()
        };
        assert_eq!(
            support.missing(),
            Some("descriptorBindingVariableDescriptorCount")
        );

        let support = DescriptorIndexingSupport {
            dynamic_rendering: false,
            ..full_support()
        };
        assert_eq!(support.missing(), Some("dynamicRendering"));
    }

    #[test]
    fn test_discrete_outranks_larger_integrated_limit() {
        let discrete = info(vk::PhysicalDeviceType::DISCRETE_GPU, 64);
        let integrated = info(vk::PhysicalDeviceType::INTEGRATED_GPU, 1 << 20);
        assert!(discrete.rank() > integrated.rank());
    }

    #[test]
    fn test_limit_breaks_ties() {
        let small = info(vk::PhysicalDeviceType::INTEGRATED_GPU, 500);
        let large = info(vk::PhysicalDeviceType::INTEGRATED_GPU, 5000);
        assert!(large.rank() > small.rank());
    }

    #[test]
    fn test_unnamed_device() {
        assert_eq!(info(vk::PhysicalDeviceType::CPU, 1).device_name(), "<unnamed>");
        assert_eq!(
            info(vk::PhysicalDeviceType::CPU, 1).device_type_name(),
            "software"
        );
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(
            Rejection::ApiVersion { major: 1, minor: 2 }.to_string(),
            "Vulkan 1.2 is older than 1.3"
        );
        assert_eq!(
            Rejection::MissingFeature("dynamicRendering").to_string(),
            "dynamicRendering unsupported"
        );
    }
}
