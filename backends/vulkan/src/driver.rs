// Vulkan Driver - RenderingDriver over the system Vulkan loader
//
// Initialization is a fixed chain, each step only after the previous one
// succeeded:
//
//   Uninit → LoaderLoaded → ExtensionsEnumerated → InstanceCreated
//          → PhysicalDevicesEnumerated
//
// Any failure parks the driver in Failed for good. Surfaces and devices are
// created afterwards and live in handle tables owned by the driver.

use std::ffi::{c_char, CStr, CString};

use ash::extensions::khr;
use ash::{vk, Entry};
use renderplug::window::{WaylandWindow, Win32Window, XcbWindow, XlibWindow};
use renderplug::{
    ApplicationInfo, DesiredDeviceCaps, Device, DeviceHandle, DriverError, HandleTable, RenderingDriver, Surface,
    SurfaceHandle, WindowDescriptor, WindowPlatform,
};

use crate::device::VulkanDevice;
use crate::extensions::{extension_names, gate_extensions};
use crate::physical_device::PhysicalDevice;
use crate::queues::plan_queues;
use crate::surface::{SurfaceSupport, VulkanSurface, DEFAULT_EXTENT};

const ENGINE_NAME: &CStr = c"renderplug";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Uninit,
    LoaderLoaded,
    ExtensionsEnumerated,
    InstanceCreated,
    PhysicalDevicesEnumerated,
    Failed,
}

/// Platform surface extensions, enabled when the loader offers them.
fn platform_surface_extensions() -> [&'static CStr; 4] {
    [
        khr::XlibSurface::name(),
        khr::XcbSurface::name(),
        khr::WaylandSurface::name(),
        khr::Win32Surface::name(),
    ]
}

fn surface_extension(platform: WindowPlatform) -> &'static CStr {
    match platform {
        WindowPlatform::Xlib => khr::XlibSurface::name(),
        WindowPlatform::Xcb => khr::XcbSurface::name(),
        WindowPlatform::Wayland => khr::WaylandSurface::name(),
        WindowPlatform::Win32 => khr::Win32Surface::name(),
    }
}

/// Keeps the devices whose query succeeds. A device that can't be queried is
/// skipped with a warning; it doesn't fail enumeration.
fn collect_physical_devices<F>(handles: Vec<vk::PhysicalDevice>, mut query: F) -> Vec<PhysicalDevice>
where
    F: FnMut(vk::PhysicalDevice) -> Result<PhysicalDevice, DriverError>,
{
    handles
        .into_iter()
        .enumerate()
        .filter_map(|(index, handle)| match query(handle) {
            Ok(device) => Some(device),
            Err(e) => {
                log::warn!("Skipping physical device {}: {}", index, e);
                None
            }
        })
        .collect()
}

pub struct VulkanDriver {
    state: DriverState,

    // Order matters for drop! Devices, then surfaces, then the instance,
    // then the loader itself.
    devices: HandleTable<VulkanDevice>,
    surfaces: HandleTable<VulkanSurface>,
    physical_devices: Vec<PhysicalDevice>,
    surface_loader: Option<khr::Surface>,
    instance: Option<ash::Instance>,
    enabled_extensions: Vec<&'static CStr>,
    extensions: Vec<String>,
    entry: Option<Entry>,
}

impl Default for VulkanDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl VulkanDriver {
    pub fn new() -> Self {
        Self {
            state: DriverState::Uninit,
            devices: HandleTable::new(),
            surfaces: HandleTable::new(),
            physical_devices: Vec::new(),
            surface_loader: None,
            instance: None,
            enabled_extensions: Vec::new(),
            extensions: Vec::new(),
            entry: None,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Instance extensions that were enabled at instance creation.
    pub fn enabled_extensions(&self) -> &[&'static CStr] {
        &self.enabled_extensions
    }

    pub fn physical_devices(&self) -> &[PhysicalDevice] {
        &self.physical_devices
    }

    pub fn vulkan_surface(&self, handle: SurfaceHandle) -> Option<&VulkanSurface> {
        self.surfaces.get(handle.index())
    }

    pub fn vulkan_device(&self, handle: DeviceHandle) -> Option<&VulkanDevice> {
        self.devices.get(handle.index())
    }

    fn advance(&mut self, next: DriverState) {
        log::debug!("Vulkan driver: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn require_ready(&self) -> Result<(), DriverError> {
        match self.state {
            DriverState::PhysicalDevicesEnumerated => Ok(()),
            DriverState::Failed => Err(DriverError::Failed.logged()),
            _ => Err(DriverError::NotInitialized.logged()),
        }
    }

    fn physical_device(&self, index: u32) -> Result<&PhysicalDevice, DriverError> {
        self.physical_devices
            .get(index as usize)
            .ok_or_else(|| DriverError::InvalidDeviceIndex(index).logged())
    }

    fn run_init(&mut self, app_info: &ApplicationInfo<'_>) -> Result<(), DriverError> {
        self.load_vulkan_loader()?;
        self.obtain_extension_properties()?;
        self.create_instance(app_info)?;
        self.obtain_physical_device_list()?;
        Ok(())
    }

    fn load_vulkan_loader(&mut self) -> Result<(), DriverError> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| DriverError::api("couldn't load the Vulkan loader. Is Vulkan installed?", e).logged())?;
        self.entry = Some(entry);
        self.advance(DriverState::LoaderLoaded);
        Ok(())
    }

    fn obtain_extension_properties(&mut self) -> Result<(), DriverError> {
        let entry = self.entry.as_ref().ok_or(DriverError::NotInitialized)?;
        let properties = entry
            .enumerate_instance_extension_properties(None)
            .map_err(|e| DriverError::api("couldn't enumerate instance extensions", e).logged())?;
        if properties.is_empty() {
            return Err(DriverError::api("couldn't enumerate instance extensions", "none reported").logged());
        }

        self.extensions = extension_names(&properties);
        for name in &self.extensions {
            log::debug!("Instance extension: {}", name);
        }
        self.advance(DriverState::ExtensionsEnumerated);
        Ok(())
    }

    fn create_instance(&mut self, app_info: &ApplicationInfo<'_>) -> Result<(), DriverError> {
        let entry = self.entry.as_ref().ok_or(DriverError::NotInitialized)?;

        let enabled = gate_extensions(
            &self.extensions,
            &[khr::Surface::name()],
            &platform_surface_extensions(),
            DriverError::InstanceExtensionUnsupported,
        )?;
        let extension_ptrs: Vec<*const c_char> = enabled.iter().map(|name| name.as_ptr()).collect();

        let app_name = CString::new(app_info.name)
            .map_err(|e| DriverError::api("invalid application name", e).logged())?;
        let version = app_info.version;

        let application_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, version.major, version.minor, version.patch))
            .engine_name(ENGINE_NAME)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&application_info)
            .enabled_extension_names(&extension_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(|e| DriverError::api("couldn't create Vulkan instance", e).logged())?;

        log::info!(
            "Vulkan instance created for {} {} with {:?}",
            app_info.name,
            version,
            enabled
        );

        self.surface_loader = Some(khr::Surface::new(entry, &instance));
        self.instance = Some(instance);
        self.enabled_extensions = enabled;
        self.advance(DriverState::InstanceCreated);
        Ok(())
    }

    fn obtain_physical_device_list(&mut self) -> Result<(), DriverError> {
        let instance = self.instance.as_ref().ok_or(DriverError::NotInitialized)?;

        let handles = unsafe { instance.enumerate_physical_devices() }
            .map_err(|e| DriverError::api("couldn't enumerate physical devices", e).logged())?;
        if handles.is_empty() {
            return Err(DriverError::api("couldn't enumerate physical devices", "none reported").logged());
        }

        let physical_devices = collect_physical_devices(handles, |handle| PhysicalDevice::query(instance, handle));

        for (index, device) in physical_devices.iter().enumerate() {
            log::info!(
                "Physical device {}: {} ({:?})",
                index,
                device.name(),
                device.properties().device_type
            );
        }

        self.physical_devices = physical_devices;
        self.advance(DriverState::PhysicalDevicesEnumerated);
        Ok(())
    }

    fn create_platform_surface(&self, window: &WindowDescriptor) -> Result<vk::SurfaceKHR, DriverError> {
        let entry = self.entry.as_ref().ok_or(DriverError::NotInitialized)?;
        let instance = self.instance.as_ref().ok_or(DriverError::NotInitialized)?;

        let platform = window.platform();
        let unsupported = || DriverError::UnsupportedPlatform(platform).logged();

        let result = match platform {
            WindowPlatform::Xlib => {
                let w = window.get::<XlibWindow>().ok_or_else(unsupported)?;
                let info = vk::XlibSurfaceCreateInfoKHR::builder()
                    .dpy(w.display as *mut _)
                    .window(w.window);
                unsafe { khr::XlibSurface::new(entry, instance).create_xlib_surface(&info, None) }
            }
            WindowPlatform::Xcb => {
                let w = window.get::<XcbWindow>().ok_or_else(unsupported)?;
                let info = vk::XcbSurfaceCreateInfoKHR::builder()
                    .connection(w.connection as *mut _)
                    .window(w.window);
                unsafe { khr::XcbSurface::new(entry, instance).create_xcb_surface(&info, None) }
            }
            WindowPlatform::Wayland => {
                let w = window.get::<WaylandWindow>().ok_or_else(unsupported)?;
                let info = vk::WaylandSurfaceCreateInfoKHR::builder()
                    .display(w.display as *mut _)
                    .surface(w.surface as *mut _);
                unsafe { khr::WaylandSurface::new(entry, instance).create_wayland_surface(&info, None) }
            }
            WindowPlatform::Win32 => {
                let w = window.get::<Win32Window>().ok_or_else(unsupported)?;
                let info = vk::Win32SurfaceCreateInfoKHR::builder()
                    .hinstance(w.hinstance as *const _)
                    .hwnd(w.hwnd as *const _);
                unsafe { khr::Win32Surface::new(entry, instance).create_win32_surface(&info, None) }
            }
        };

        result.map_err(|e| DriverError::api("couldn't create surface", e).logged())
    }

    /// Present families of the newest live surface on `index`, if any
    /// surface exists. `Some(&[])` when that device can't present to it.
    fn newest_surface_present_families(&self, index: u32) -> Option<&[u32]> {
        let (_, surface) = self.surfaces.iter().next_back()?;
        Some(
            surface
                .support_for(index)
                .map(|support| support.present_families.as_slice())
                .unwrap_or(&[]),
        )
    }
}

impl RenderingDriver for VulkanDriver {
    fn init(&mut self, app_info: &ApplicationInfo<'_>) -> Result<(), DriverError> {
        match self.state {
            DriverState::Uninit => {}
            DriverState::Failed => return Err(DriverError::Failed.logged()),
            _ => return Err(DriverError::AlreadyInitialized.logged()),
        }

        let result = self.run_init(app_info);
        if result.is_err() {
            self.advance(DriverState::Failed);
        }
        result
    }

    fn physical_device_count(&self) -> u32 {
        self.physical_devices.len() as u32
    }

    fn physical_device_name(&self, index: u32) -> Option<&str> {
        self.physical_device(index).ok().map(PhysicalDevice::name)
    }

    fn is_suitable_physical_device(&self, index: u32, caps: &DesiredDeviceCaps) -> bool {
        let Ok(device) = self.physical_device(index) else {
            return false;
        };
        device.is_suitable(caps, self.newest_surface_present_families(index))
    }

    fn create_surface(&mut self, window: &WindowDescriptor) -> Result<SurfaceHandle, DriverError> {
        self.require_ready()?;

        let platform = window.platform();
        let extension = surface_extension(platform);
        if !self.enabled_extensions.contains(&extension) {
            return Err(DriverError::InstanceExtensionNotEnabled(extension.to_string_lossy().into_owned()).logged());
        }

        let loader = self.surface_loader.clone().ok_or(DriverError::NotInitialized)?;
        let raw = self.create_platform_surface(window)?;

        let support: Vec<Option<SurfaceSupport>> = self
            .physical_devices
            .iter()
            .enumerate()
            .map(|(index, device)| match SurfaceSupport::query(&loader, device, index as u32, raw) {
                Ok(support) => Some(support),
                Err(e) => {
                    log::warn!("Physical device {} ({}) can't present: {}", index, device.name(), e);
                    None
                }
            })
            .collect();

        // Owned from here on; dropping it destroys the raw surface
        let surface = VulkanSurface::new(loader, raw, platform, support);
        if !surface.is_presentable() {
            return Err(DriverError::NoPresentableDevice.logged());
        }

        let handle = SurfaceHandle::from_index(self.surfaces.insert(surface));
        log::info!("Created {} {}", platform, handle);
        Ok(handle)
    }

    fn create_device(
        &mut self,
        index: u32,
        surface: SurfaceHandle,
        caps: &DesiredDeviceCaps,
    ) -> Result<DeviceHandle, DriverError> {
        self.require_ready()?;

        let physical = self.physical_device(index)?;
        let vulkan_surface = self
            .surfaces
            .get(surface.index())
            .ok_or_else(|| DriverError::InvalidSurface(surface).logged())?;
        let support = vulkan_surface
            .support_for(index)
            .ok_or_else(|| DriverError::PresentUnsupported(index, surface).logged())?;

        if !PhysicalDevice::check_device_features(physical.features()) {
            return Err(DriverError::MissingFeatures(index).logged());
        }

        let plan = plan_queues(physical.queue_families(), Some(&support.present_families), caps.needs_compute)
            .map_err(DriverError::logged)?;

        let params = support.presentation(DEFAULT_EXTENT);
        log::info!(
            "Presentation on device {}: extent {}x{}, {} images, {:?}, format {:?}",
            index,
            params.extent.width,
            params.extent.height,
            params.image_count,
            params.present_mode,
            params.format
        );

        let instance = self.instance.as_ref().ok_or(DriverError::NotInitialized)?;
        let device = VulkanDevice::create(instance, physical, index, surface, plan)?;

        let handle = DeviceHandle::from_index(self.devices.insert(device));
        log::info!("Created {} on physical device {}", handle, index);
        Ok(handle)
    }

    fn surface(&self, handle: SurfaceHandle) -> Option<&dyn Surface> {
        self.surfaces.get(handle.index()).map(|s| s as &dyn Surface)
    }

    fn device(&self, handle: DeviceHandle) -> Option<&dyn Device> {
        self.devices.get(handle.index()).map(|d| d as &dyn Device)
    }

    fn destroy_device(&mut self, handle: DeviceHandle) -> bool {
        match self.devices.remove(handle.index()) {
            Some(device) => {
                drop(device);
                log::info!("Destroyed {}", handle);
                true
            }
            None => {
                DriverError::InvalidDevice(handle).logged();
                false
            }
        }
    }

    fn destroy_surface(&mut self, handle: SurfaceHandle) -> bool {
        if !self.surfaces.contains(handle.index()) {
            DriverError::InvalidSurface(handle).logged();
            return false;
        }

        if let Some((device, _)) = self.devices.iter().find(|(_, d)| d.surface() == handle) {
            DriverError::SurfaceInUse {
                surface: handle,
                device: DeviceHandle::from_index(device),
            }
            .logged();
            return false;
        }

        self.surfaces.remove(handle.index());
        log::info!("Destroyed {}", handle);
        true
    }
}

impl Drop for VulkanDriver {
    fn drop(&mut self) {
        log::debug!("Shutting down Vulkan driver in state {:?}", self.state);

        self.devices.clear();
        self.surfaces.clear();
        self.surface_loader = None;
        if let Some(instance) = self.instance.take() {
            unsafe { instance.destroy_instance(None) };
        }
        // `entry` unloads the Vulkan loader when the fields drop
    }
}
