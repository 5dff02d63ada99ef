// renderplug-vulkan - Vulkan backend module
//
// Built as a dynamic module the host loads by name. The only symbol the host
// looks up is the registration entry point emitted at the bottom of this file.

pub mod device;
pub mod driver;
pub mod extensions;
pub mod physical_device;
pub mod queues;
pub mod surface;

pub use driver::VulkanDriver;

renderplug::register_rendering_driver!("vulkan", VulkanDriver);
