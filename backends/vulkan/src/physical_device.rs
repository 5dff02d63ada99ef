// Physical device snapshot
//
// Extensions, properties, features and queue families are read once at
// enumeration and never change afterwards. Suitability is recomputed from
// this snapshot on every call.

use std::ffi::{c_char, CStr};

use ash::vk;
use renderplug::{DesiredDeviceCaps, DriverError};

use crate::extensions::{extension_names, fixed_c_str, gate_extensions, is_supported};
use crate::queues::{plan_queues, QueuePlan};

/// Required Vulkan device features
const REQUIRED_DEVICE_FEATURES: vk::PhysicalDeviceFeatures = vk::PhysicalDeviceFeatures {
    geometry_shader: vk::TRUE,
    ..unsafe { std::mem::zeroed() }
};

pub struct PhysicalDevice {
    handle: vk::PhysicalDevice,
    name: String,
    extensions: Vec<String>,
    properties: vk::PhysicalDeviceProperties,
    features: vk::PhysicalDeviceFeatures,
    queue_families: Vec<vk::QueueFamilyProperties>,
}

impl PhysicalDevice {
    /// Reads everything the driver needs about `handle`. Not logged here;
    /// the caller decides whether the device is skipped.
    pub fn query(instance: &ash::Instance, handle: vk::PhysicalDevice) -> Result<Self, DriverError> {
        let extensions = unsafe { instance.enumerate_device_extension_properties(handle) }
            .map_err(|e| DriverError::api("couldn't enumerate device extensions", e))?;
        if extensions.is_empty() {
            return Err(DriverError::api("couldn't enumerate device extensions", "none reported"));
        }

        let properties = unsafe { instance.get_physical_device_properties(handle) };
        let features = unsafe { instance.get_physical_device_features(handle) };

        let queue_families = unsafe { instance.get_physical_device_queue_family_properties(handle) };
        if queue_families.is_empty() {
            return Err(DriverError::api("couldn't acquire properties of queue families", "none reported"));
        }

        Ok(Self::from_parts(
            handle,
            properties,
            features,
            extension_names(&extensions),
            queue_families,
        ))
    }

    pub fn from_parts(
        handle: vk::PhysicalDevice,
        properties: vk::PhysicalDeviceProperties,
        features: vk::PhysicalDeviceFeatures,
        extensions: Vec<String>,
        queue_families: Vec<vk::QueueFamilyProperties>,
    ) -> Self {
        Self {
            handle,
            name: fixed_c_str(&properties.device_name),
            extensions,
            properties,
            features,
            queue_families,
        }
    }

    pub fn handle(&self) -> vk::PhysicalDevice {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    pub fn features(&self) -> &vk::PhysicalDeviceFeatures {
        &self.features
    }

    pub fn queue_families(&self) -> &[vk::QueueFamilyProperties] {
        &self.queue_families
    }

    pub fn is_extension_supported(&self, name: &CStr) -> bool {
        is_supported(&self.extensions, name)
    }

    pub fn check_device_features(features: &vk::PhysicalDeviceFeatures) -> bool {
        features.geometry_shader == vk::TRUE
    }

    /// Required features present and a queue family for every requested
    /// purpose. `present_families` adds the present requirement.
    pub fn is_suitable(&self, caps: &DesiredDeviceCaps, present_families: Option<&[u32]>) -> bool {
        if !Self::check_device_features(&self.features) {
            log::debug!("device '{}' lacks required features", self.name);
            return false;
        }

        match plan_queues(&self.queue_families, present_families, caps.needs_compute) {
            Ok(_) => true,
            Err(reason) => {
                log::debug!("device '{}': {}", self.name, reason);
                false
            }
        }
    }

    /// Creates the logical device for `plan`, enabling `extensions` only if
    /// this device advertises every one of them.
    pub fn create_logical_device(
        &self,
        instance: &ash::Instance,
        plan: &QueuePlan,
        extensions: &[&'static CStr],
    ) -> Result<ash::Device, DriverError> {
        let enabled = gate_extensions(&self.extensions, extensions, &[], DriverError::DeviceExtensionUnsupported)?;
        let extension_ptrs: Vec<*const c_char> = enabled.iter().map(|name| name.as_ptr()).collect();

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = plan
            .entries
            .iter()
            .map(|entry| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(entry.family_index)
                    .queue_priorities(&entry.priorities)
                    .build()
            })
            .collect();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_ptrs)
            .enabled_features(&REQUIRED_DEVICE_FEATURES);

        unsafe { instance.create_device(self.handle, &create_info, None) }
            .map_err(|e| DriverError::api("couldn't create logical device", e).logged())
    }
}
