// Surface - Window presentation support
//
// A surface is created once per window. What each physical device can do
// with it (extent limits, image counts, which queue families present, which
// present modes exist) is queried separately for every device: a family that
// does graphics does not necessarily present.

use std::fmt;

use ash::extensions::khr;
use ash::vk;
use renderplug::{DriverError, Surface, WindowPlatform};

use crate::physical_device::PhysicalDevice;

/// Requested size when the surface leaves the extent to the swapchain.
pub const DEFAULT_EXTENT: vk::Extent2D = vk::Extent2D { width: 640, height: 480 };

/// Clamps each axis independently into `[min, max]`.
pub fn clamp_extent(extent: vk::Extent2D, min: vk::Extent2D, max: vk::Extent2D) -> vk::Extent2D {
    vk::Extent2D {
        width: extent.width.min(max.width).max(min.width),
        height: extent.height.min(max.height).max(min.height),
    }
}

/// The surface's current extent, or `requested` clamped to the surface
/// limits when the current extent is the "unspecified" sentinel.
pub fn resolve_extent(capabilities: &vk::SurfaceCapabilitiesKHR, requested: vk::Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        clamp_extent(requested, capabilities.min_image_extent, capabilities.max_image_extent)
    }
}

/// Swapchain parameters derived from surface support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentationParams {
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub present_mode: vk::PresentModeKHR,
    pub format: Option<vk::SurfaceFormatKHR>,
}

/// What one physical device can do with one surface.
#[derive(Debug, Clone)]
pub struct SurfaceSupport {
    /// Index of the physical device this was queried against.
    pub physical_device: u32,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub present_families: Vec<u32>,
    pub present_modes: Vec<vk::PresentModeKHR>,
    pub formats: Vec<vk::SurfaceFormatKHR>,
}

impl SurfaceSupport {
    pub fn query(
        loader: &khr::Surface,
        physical_device: &PhysicalDevice,
        index: u32,
        surface: vk::SurfaceKHR,
    ) -> Result<Self, DriverError> {
        let handle = physical_device.handle();

        let capabilities = unsafe { loader.get_physical_device_surface_capabilities(handle, surface) }
            .map_err(|e| DriverError::api("couldn't get the capabilities of a surface", e))?;

        let present_families: Vec<u32> = (0..physical_device.queue_families().len() as u32)
            .filter(|&family| {
                matches!(
                    unsafe { loader.get_physical_device_surface_support(handle, family, surface) },
                    Ok(true)
                )
            })
            .collect();
        if present_families.is_empty() {
            return Err(DriverError::api("couldn't obtain present queue families", "none supports the surface"));
        }

        let present_modes = unsafe { loader.get_physical_device_surface_present_modes(handle, surface) }
            .map_err(|e| DriverError::api("couldn't enumerate present modes", e))?;
        if present_modes.is_empty() {
            return Err(DriverError::api("couldn't enumerate present modes", "none reported"));
        }

        let formats = unsafe { loader.get_physical_device_surface_formats(handle, surface) }
            .map_err(|e| DriverError::api("couldn't enumerate surface formats", e))?;

        Ok(Self {
            physical_device: index,
            capabilities,
            present_families,
            present_modes,
            formats,
        })
    }

    pub fn resolve_extent(&self, requested: vk::Extent2D) -> vk::Extent2D {
        resolve_extent(&self.capabilities, requested)
    }

    /// One more than the minimum, capped by the maximum (0 means no maximum).
    pub fn image_count(&self) -> u32 {
        let mut image_count = self.capabilities.min_image_count + 1;
        if self.capabilities.max_image_count > 0 && image_count > self.capabilities.max_image_count {
            image_count = self.capabilities.max_image_count;
        }
        image_count
    }

    /// MAILBOX if offered, otherwise FIFO (always supported).
    pub fn choose_present_mode(&self) -> vk::PresentModeKHR {
        self.present_modes
            .iter()
            .copied()
            .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
            .unwrap_or(vk::PresentModeKHR::FIFO)
    }

    /// B8G8R8A8_SRGB / SRGB_NONLINEAR if offered, otherwise the first format.
    pub fn choose_format(&self) -> Option<vk::SurfaceFormatKHR> {
        self.formats
            .iter()
            .find(|f| f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
            .or_else(|| self.formats.first())
            .copied()
    }

    pub fn presentation(&self, requested: vk::Extent2D) -> PresentationParams {
        PresentationParams {
            extent: self.resolve_extent(requested),
            image_count: self.image_count(),
            present_mode: self.choose_present_mode(),
            format: self.choose_format(),
        }
    }
}

pub struct VulkanSurface {
    loader: khr::Surface,
    surface: vk::SurfaceKHR,
    platform: WindowPlatform,
    /// Indexed by physical device; `None` where the device can't present.
    support: Vec<Option<SurfaceSupport>>,
}

impl VulkanSurface {
    /// Takes ownership of `surface`; it is destroyed with this value.
    pub fn new(
        loader: khr::Surface,
        surface: vk::SurfaceKHR,
        platform: WindowPlatform,
        support: Vec<Option<SurfaceSupport>>,
    ) -> Self {
        Self {
            loader,
            surface,
            platform,
            support,
        }
    }

    pub fn raw(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn platform(&self) -> WindowPlatform {
        self.platform
    }

    pub fn support_for(&self, physical_device: u32) -> Option<&SurfaceSupport> {
        self.support.get(physical_device as usize).and_then(Option::as_ref)
    }

    pub fn is_presentable(&self) -> bool {
        self.support.iter().any(Option::is_some)
    }
}

impl Surface for VulkanSurface {}

impl fmt::Debug for VulkanSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VulkanSurface")
            .field("surface", &self.surface)
            .field("platform", &self.platform)
            .field("support", &self.support)
            .finish()
    }
}

impl Drop for VulkanSurface {
    fn drop(&mut self) {
        log::debug!("Destroying {} surface {:?}", self.platform, self.surface);
        unsafe { self.loader.destroy_surface(self.surface, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    fn capabilities(current: vk::Extent2D) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: current,
            min_image_extent: extent(200, 200),
            max_image_extent: extent(1920, 1080),
            min_image_count: 2,
            max_image_count: 3,
            ..Default::default()
        }
    }

    fn support(present_modes: Vec<vk::PresentModeKHR>, formats: Vec<vk::SurfaceFormatKHR>) -> SurfaceSupport {
        SurfaceSupport {
            physical_device: 0,
            capabilities: capabilities(extent(u32::MAX, u32::MAX)),
            present_families: vec![0],
            present_modes,
            formats,
        }
    }

    #[test]
    fn test_unspecified_extent_uses_default_request() {
        let caps = capabilities(extent(u32::MAX, u32::MAX));
        assert_eq!(resolve_extent(&caps, DEFAULT_EXTENT), extent(640, 480));
    }

    #[test]
    fn test_current_extent_wins() {
        let caps = capabilities(extent(800, 600));
        assert_eq!(resolve_extent(&caps, DEFAULT_EXTENT), extent(800, 600));
    }

    #[test]
    fn test_clamp_each_axis() {
        let caps = capabilities(extent(u32::MAX, u32::MAX));
        assert_eq!(resolve_extent(&caps, extent(100, 4000)), extent(200, 1080));
        assert_eq!(resolve_extent(&caps, extent(4000, 100)), extent(1920, 200));
    }

    #[test]
    fn test_clamp_in_range_is_identity() {
        let (min, max) = (extent(200, 200), extent(1920, 1080));
        for e in [extent(200, 200), extent(640, 480), extent(1920, 1080), extent(1000, 201)] {
            assert_eq!(clamp_extent(e, min, max), e);
            assert_eq!(clamp_extent(clamp_extent(e, min, max), min, max), e);
        }
    }

    #[test]
    fn test_image_count_respects_maximum() {
        let mut s = support(vec![vk::PresentModeKHR::FIFO], vec![]);
        assert_eq!(s.image_count(), 3);
        s.capabilities.min_image_count = 3;
        assert_eq!(s.image_count(), 3);
        s.capabilities.max_image_count = 0;
        assert_eq!(s.image_count(), 4);
    }

    #[test]
    fn test_present_mode_preference() {
        let s = support(vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX], vec![]);
        assert_eq!(s.choose_present_mode(), vk::PresentModeKHR::MAILBOX);
        let s = support(vec![vk::PresentModeKHR::IMMEDIATE], vec![]);
        assert_eq!(s.choose_present_mode(), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_format_preference() {
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let srgb = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };

        let s = support(vec![vk::PresentModeKHR::FIFO], vec![unorm, srgb]);
        assert_eq!(s.choose_format(), Some(srgb));
        let s = support(vec![vk::PresentModeKHR::FIFO], vec![unorm]);
        assert_eq!(s.choose_format(), Some(unorm));
        let s = support(vec![vk::PresentModeKHR::FIFO], vec![]);
        assert_eq!(s.choose_format(), None);
    }

    #[test]
    fn test_presentation_params() {
        let s = support(vec![vk::PresentModeKHR::FIFO], vec![]);
        let params = s.presentation(DEFAULT_EXTENT);
        assert_eq!(params.extent, extent(640, 480));
        assert_eq!(params.image_count, 3);
        assert_eq!(params.present_mode, vk::PresentModeKHR::FIFO);
    }
}
