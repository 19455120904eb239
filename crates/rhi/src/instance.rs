//! Headless Vulkan instance.
//!
//! Frames render offscreen, so the instance enables no surface extensions.
//! The only optional piece is validation: with the Khronos layer installed,
//! its reports are forwarded to `tracing` under the `vulkan` target.
//!
//! # Example
//!
//! ```no_run
//! use vellum_rhi::instance::Instance;
//!
//! let instance = Instance::new(cfg!(debug_assertions)).expect("Vulkan loader");
//! println!("validation: {}", instance.has_validation());
//! ```

use std::borrow::Cow;
use std::ffi::{CStr, c_void};

use ash::ext::debug_utils;
use ash::{Entry, vk};
use tracing::{debug, error, info, trace, warn};

use crate::error::{RhiResult, VkResultExt};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Requested instance API version.
pub const API_VERSION: u32 = vk::API_VERSION_1_3;

/// Validation callback registration. Destroyed before the instance.
struct DebugMessenger {
    loader: debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    fn new(entry: &Entry, instance: &ash::Instance) -> RhiResult<Self> {
        let loader = debug_utils::Instance::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(forward_to_tracing));

        let messenger = unsafe {
            loader
                .create_debug_utils_messenger(&create_info, None)
                .call("vkCreateDebugUtilsMessengerEXT")?
        };

        Ok(Self { loader, messenger })
    }

    /// # Safety
    ///
    /// Must run before the owning instance is destroyed.
    unsafe fn destroy(&self) {
        unsafe {
            self.loader
                .destroy_debug_utils_messenger(self.messenger, None);
        }
    }
}

/// Loaded Vulkan library plus instance.
pub struct Instance {
    entry: Entry,
    instance: ash::Instance,
    messenger: Option<DebugMessenger>,
}

impl Instance {
    /// Loads the Vulkan library and creates a headless instance.
    ///
    /// `enable_validation` is a request: without the layer installed the
    /// instance is created anyway and a warning is logged.
    ///
    /// # Errors
    ///
    /// [`crate::RhiError::LoadingError`] when no Vulkan loader is found, or a
    /// call error from instance creation.
    pub fn new(enable_validation: bool) -> RhiResult<Self> {
        let entry = unsafe { Entry::load()? };

        let validation = enable_validation && has_layer(&entry, VALIDATION_LAYER)?;
        if enable_validation && !validation {
            warn!("{:?} not installed, running without validation", VALIDATION_LAYER);
        }

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"vellum")
            .engine_name(c"vellum")
            .api_version(API_VERSION);

        let mut layers = Vec::new();
        let mut extensions = Vec::new();
        if validation {
            layers.push(VALIDATION_LAYER.as_ptr());
            extensions.push(debug_utils::NAME.as_ptr());
        }

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions);

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .call("vkCreateInstance")?
        };

        let messenger = if validation {
            match DebugMessenger::new(&entry, &instance) {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        info!(
            "Headless Vulkan instance created (validation {})",
            if validation { "on" } else { "off" }
        );

        Ok(Self {
            entry,
            instance,
            messenger,
        })
    }

    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Whether validation reports are being forwarded.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.messenger.is_some()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some(messenger) = self.messenger.take() {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
        debug!("Vulkan instance destroyed");
    }
}

fn has_layer(entry: &Entry, name: &CStr) -> RhiResult<bool> {
    let layers = unsafe {
        entry
            .enumerate_instance_layer_properties()
            .call("vkEnumerateInstanceLayerProperties")?
    };

    Ok(layers
        .iter()
        .any(|layer| layer.layer_name_as_c_str().is_ok_and(|layer_name| layer_name == name)))
}

/// Short label for a debug message type.
fn message_kind(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "performance"
    } else {
        "general"
    }
}

/// Lossy copy of a possibly null C string.
///
/// # Safety
///
/// A non-null `ptr` must point to a nul-terminated string.
unsafe fn lossy<'a>(ptr: *const std::ffi::c_char) -> Cow<'a, str> {
    if ptr.is_null() {
        Cow::Borrowed("")
    } else {
        unsafe { CStr::from_ptr(ptr).to_string_lossy() }
    }
}

unsafe extern "system" fn forward_to_tracing(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    let Some(data) = (unsafe { data.as_ref() }) else {
        return vk::FALSE;
    };

    let kind = message_kind(message_type);
    let id = unsafe { lossy(data.p_message_id_name) };
    let message = unsafe { lossy(data.p_message) };

    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(target: "vulkan", kind, %id, "{}", message);
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!(target: "vulkan", kind, %id, "{}", message);
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        debug!(target: "vulkan", kind, %id, "{}", message);
    } else {
        trace!(target: "vulkan", kind, %id, "{}", message);
    }

    vk::FALSE
}
