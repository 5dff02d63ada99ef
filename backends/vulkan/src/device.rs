// Vulkan Device - Logical device bound to one surface
//
// Created from a QueuePlan resolved against the surface it will present to.
// Queues are fetched once (index 0 of each chosen family) and kept for the
// lifetime of the device.

use std::fmt;

use ash::extensions::khr;
use ash::vk;
use renderplug::{Device, DriverError, SurfaceHandle};

use crate::physical_device::PhysicalDevice;
use crate::queues::QueuePlan;

pub struct VulkanDevice {
    device: ash::Device,
    physical_device: u32,
    surface: SurfaceHandle,
    plan: QueuePlan,

    // Queue handles
    graphics_queue: vk::Queue,
    present_queue: Option<vk::Queue>,
    compute_queue: Option<vk::Queue>,
}

impl VulkanDevice {
    pub fn create(
        instance: &ash::Instance,
        physical: &PhysicalDevice,
        physical_device: u32,
        surface: SurfaceHandle,
        plan: QueuePlan,
    ) -> Result<Self, DriverError> {
        let device = physical.create_logical_device(instance, &plan, &[khr::Swapchain::name()])?;

        let graphics_queue = unsafe { device.get_device_queue(plan.graphics, 0) };
        let present_queue = plan.present.map(|family| unsafe { device.get_device_queue(family, 0) });
        let compute_queue = plan.compute.map(|family| unsafe { device.get_device_queue(family, 0) });

        log::info!(
            "Logical device created on '{}': graphics family {}, present family {:?}, compute family {:?}",
            physical.name(),
            plan.graphics,
            plan.present,
            plan.compute
        );

        Ok(Self {
            device,
            physical_device,
            surface,
            plan,
            graphics_queue,
            present_queue,
            compute_queue,
        })
    }

    pub fn raw(&self) -> &ash::Device {
        &self.device
    }

    pub fn physical_device(&self) -> u32 {
        self.physical_device
    }

    /// Surface this device was created to present to.
    pub fn surface(&self) -> SurfaceHandle {
        self.surface
    }

    pub fn queue_plan(&self) -> &QueuePlan {
        &self.plan
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn present_queue(&self) -> Option<vk::Queue> {
        self.present_queue
    }

    pub fn compute_queue(&self) -> Option<vk::Queue> {
        self.compute_queue
    }

    pub fn wait_idle(&self) -> Result<(), DriverError> {
        unsafe { self.device.device_wait_idle() }.map_err(|e| DriverError::api("couldn't wait for device idle", e))
    }
}

impl Device for VulkanDevice {}

impl fmt::Debug for VulkanDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VulkanDevice")
            .field("device", &self.device.handle())
            .field("physical_device", &self.physical_device)
            .field("surface", &self.surface)
            .field("plan", &self.plan)
            .finish()
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        log::debug!("Destroying logical device on physical device {}", self.physical_device);

        if let Err(e) = self.wait_idle() {
            log::warn!("{}", e);
        }
        unsafe { self.device.destroy_device(None) };
    }
}
