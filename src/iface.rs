// Rendering interface - What every backend implements
//
// The host only ever talks to a backend through these traits and the small
// value types passed by value next to them. Backend-specific operations live
// on the concrete types behind `Surface` and `Device` and never widen the
// traits here.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DriverError;
use crate::handles::{DeviceHandle, SurfaceHandle};
use crate::window::WindowDescriptor;

/// Application version. Compared for equality only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(C)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Application identity, passed once to `RenderingDriver::init`.
#[derive(Debug, Clone, Copy)]
pub struct ApplicationInfo<'a> {
    pub name: &'a str,
    pub version: Version,
}

/// Minimum requirements the host places on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(C)]
pub struct DesiredDeviceCaps {
    /// A compute-capable queue family must exist.
    pub needs_compute: bool,
}

impl DesiredDeviceCaps {
    /// The same requirements minus the optional ones.
    pub fn relaxed(&self) -> Self {
        Self { needs_compute: false }
    }
}

/// Binding between a platform window and a backend's presentation support.
pub trait Surface: fmt::Debug {}

/// Logical device with its resolved queues.
pub trait Device: fmt::Debug {}

/// A rendering backend.
///
/// Lifecycle: `init` exactly once, then any number of `create_surface` and
/// `create_device` calls. Every index and handle is validated before use;
/// out-of-range values fail with a logged reason instead of touching memory.
/// Calls must be serialized by the caller.
pub trait RenderingDriver {
    fn init(&mut self, app_info: &ApplicationInfo<'_>) -> Result<(), DriverError>;

    fn physical_device_count(&self) -> u32;

    /// `None` when `index` is out of range.
    fn physical_device_name(&self, index: u32) -> Option<&str>;

    /// `false` when `index` is out of range.
    fn is_suitable_physical_device(&self, index: u32, caps: &DesiredDeviceCaps) -> bool;

    fn create_surface(&mut self, window: &WindowDescriptor) -> Result<SurfaceHandle, DriverError>;

    fn create_device(
        &mut self,
        index: u32,
        surface: SurfaceHandle,
        caps: &DesiredDeviceCaps,
    ) -> Result<DeviceHandle, DriverError>;

    fn surface(&self, handle: SurfaceHandle) -> Option<&dyn Surface>;

    fn device(&self, handle: DeviceHandle) -> Option<&dyn Device>;

    /// Returns `false` if the handle is not live.
    fn destroy_device(&mut self, handle: DeviceHandle) -> bool;

    /// Returns `false` if the handle is not live or a live device still uses it.
    fn destroy_surface(&mut self, handle: SurfaceHandle) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relaxed_drops_compute() {
        let caps = DesiredDeviceCaps { needs_compute: true };
        assert_eq!(caps.relaxed(), DesiredDeviceCaps::default());
    }

    #[test]
    fn test_version_display() {
        assert_eq!(Version::new(1, 2, 3).to_string(), "1.2.3");
        assert_eq!(Version::new(1, 2, 3), Version { major: 1, minor: 2, patch: 3 });
    }
}
