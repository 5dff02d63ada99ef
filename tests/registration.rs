//! The registration macro as a backend module would use it.

use renderplug::plugin::{DriverEntryFn, ABI_VERSION};
use renderplug::{
    ApplicationInfo, DesiredDeviceCaps, Device, DeviceHandle, DriverError, RenderingDriver, Surface, SurfaceHandle,
    Version, WindowDescriptor,
};

#[derive(Default)]
struct NullDriver {
    initialized: bool,
}

impl RenderingDriver for NullDriver {
    fn init(&mut self, _app_info: &ApplicationInfo<'_>) -> Result<(), DriverError> {
        if self.initialized {
            return Err(DriverError::AlreadyInitialized);
        }
        self.initialized = true;
        Ok(())
    }

    fn physical_device_count(&self) -> u32 {
        0
    }

    fn physical_device_name(&self, _index: u32) -> Option<&str> {
        None
    }

    fn is_suitable_physical_device(&self, _index: u32, _caps: &DesiredDeviceCaps) -> bool {
        false
    }

    fn create_surface(&mut self, _window: &WindowDescriptor) -> Result<SurfaceHandle, DriverError> {
        Err(DriverError::NoPresentableDevice)
    }

    fn create_device(
        &mut self,
        index: u32,
        _surface: SurfaceHandle,
        _caps: &DesiredDeviceCaps,
    ) -> Result<DeviceHandle, DriverError> {
        Err(DriverError::InvalidDeviceIndex(index))
    }

    fn surface(&self, _handle: SurfaceHandle) -> Option<&dyn Surface> {
        None
    }

    fn device(&self, _handle: DeviceHandle) -> Option<&dyn Device> {
        None
    }

    fn destroy_device(&mut self, _handle: DeviceHandle) -> bool {
        false
    }

    fn destroy_surface(&mut self, _handle: SurfaceHandle) -> bool {
        false
    }
}

renderplug::register_rendering_driver!("null", NullDriver);

fn app_info() -> ApplicationInfo<'static> {
    ApplicationInfo {
        name: "App3D",
        version: Version::new(0, 1, 0),
    }
}

#[test]
fn test_descriptor_contents() {
    let descriptor = unsafe { &*renderplug_driver_descriptor() };

    assert_eq!(descriptor.abi_version, ABI_VERSION);
    assert_eq!(descriptor.name(), "null");
    assert_eq!(descriptor.rustc_version(), renderplug::plugin::host_rustc_version());
    assert!(descriptor.validate().is_ok());
}

#[test]
fn test_entry_point_matches_loader_signature() {
    let entry: DriverEntryFn = renderplug_driver_descriptor;
    let descriptor = unsafe { entry() };
    assert!(std::ptr::eq(descriptor, renderplug_driver_descriptor()));
}

#[test]
fn test_factory_instances_are_isolated() {
    let descriptor = unsafe { &*renderplug_driver_descriptor() };
    let mut first = descriptor.create_driver();
    let mut second = descriptor.create_driver();

    assert!(first.init(&app_info()).is_ok());
    assert!(matches!(first.init(&app_info()), Err(DriverError::AlreadyInitialized)));
    // The second instance saw none of that
    assert!(second.init(&app_info()).is_ok());
}
