// Host orchestrator - Start-up sequence against a loaded backend
//
// load module → descriptor → factory → init → create surface
//   → pick physical device → create device → (rendering, external)
//
// Shutdown is the exact reverse: device, surface, driver, module. The session
// enforces it on drop, including after a partially failed start.

use std::path::Path;

use crate::error::{HostError, LoadError};
use crate::handles::{DeviceHandle, SurfaceHandle};
use crate::iface::{ApplicationInfo, DesiredDeviceCaps, RenderingDriver};
use crate::plugin::{DriverEntryFn, DynamicLibrary, ENTRY_SYMBOL};
use crate::window::WindowDescriptor;

/// A driver together with the module that produced it.
pub struct LoadedBackend {
    // Order matters for drop! The driver's code lives in `module`.
    driver: Box<dyn RenderingDriver>,
    name: String,
    module: Option<DynamicLibrary>,
}

impl LoadedBackend {
    /// Wraps a driver that is linked into the host rather than loaded.
    pub fn from_driver(name: impl Into<String>, driver: Box<dyn RenderingDriver>) -> Self {
        Self {
            driver,
            name: name.into(),
            module: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn driver(&self) -> &dyn RenderingDriver {
        self.driver.as_ref()
    }

    pub fn driver_mut(&mut self) -> &mut dyn RenderingDriver {
        self.driver.as_mut()
    }

    pub fn module(&self) -> Option<&DynamicLibrary> {
        self.module.as_ref()
    }
}

/// Loads backend `name` from `directory` and instantiates its driver.
pub fn open_backend(directory: &Path, name: &str) -> Result<LoadedBackend, HostError> {
    let fail = |source: LoadError| HostError::Load {
        name: name.to_string(),
        source,
    };

    let module = DynamicLibrary::load(directory, name).map_err(fail)?;

    // SAFETY: ENTRY_SYMBOL is declared by register_rendering_driver! with this type
    let entry: DriverEntryFn = unsafe { module.get_entry(ENTRY_SYMBOL) }.map_err(fail)?;

    // SAFETY: the descriptor is a static of `module`, which outlives this borrow
    let descriptor = match unsafe { entry().as_ref() } {
        Some(descriptor) => descriptor,
        None => {
            let err = LoadError::NullDescriptor(ENTRY_SYMBOL.to_string());
            log::error!("{}", err);
            return Err(fail(err));
        }
    };

    if let Err(err) = descriptor.validate() {
        log::error!("rejecting backend '{}': {}", module.file_name(), err);
        return Err(fail(err));
    }

    (descriptor.install_logger)(log::logger(), log::max_level());
    let driver = descriptor.create_driver();

    log::info!("Loaded rendering backend '{}' from {:?}", descriptor.name(), module.path());

    Ok(LoadedBackend {
        driver,
        name: descriptor.name().to_string(),
        module: Some(module),
    })
}

/// Tries each backend name in order and returns the first that loads.
pub fn open_first_backend<S: AsRef<str>>(directory: &Path, names: &[S]) -> Result<LoadedBackend, HostError> {
    for name in names {
        match open_backend(directory, name.as_ref()) {
            Ok(backend) => return Ok(backend),
            // Already logged where it failed
            Err(e) => log::debug!("{}", e),
        }
    }

    let tried = names.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ");
    let err = HostError::NoBackend(tried);
    log::error!("{}", err);
    Err(err)
}

/// What the host asks of a device.
#[derive(Debug, Clone, Default)]
pub struct DeviceRequest {
    pub caps: DesiredDeviceCaps,
    /// Retry with `caps.relaxed()` when nothing meets `caps`.
    pub allow_relaxed_caps: bool,
    /// Case-insensitive substring of the preferred device's name.
    pub preferred_device: Option<String>,
}

/// Index of the device to use: the preferred one if it is suitable, else the
/// first suitable one in enumeration order.
pub fn pick_physical_device(
    driver: &dyn RenderingDriver,
    caps: &DesiredDeviceCaps,
    preferred: Option<&str>,
) -> Option<u32> {
    let preferred = preferred.map(str::to_lowercase);
    let mut first_suitable = None;
    let mut preferred_match = None;

    for index in 0..driver.physical_device_count() {
        let name = driver.physical_device_name(index).unwrap_or("<unnamed>");
        let suitable = driver.is_suitable_physical_device(index, caps);
        log::info!("Physical device {}: {}{}", index, name, if suitable { "" } else { " (unsuitable)" });

        if !suitable {
            continue;
        }
        first_suitable.get_or_insert(index);
        if let Some(wanted) = &preferred {
            if preferred_match.is_none() && name.to_lowercase().contains(wanted.as_str()) {
                preferred_match = Some(index);
            }
        }
    }

    preferred_match.or(first_suitable)
}

fn choose_device(driver: &dyn RenderingDriver, request: &DeviceRequest) -> Result<(u32, DesiredDeviceCaps), HostError> {
    let preferred = request.preferred_device.as_deref();

    if let Some(index) = pick_physical_device(driver, &request.caps, preferred) {
        return Ok((index, request.caps));
    }

    let relaxed = request.caps.relaxed();
    if request.allow_relaxed_caps && relaxed != request.caps {
        log::warn!("no physical device meets {:?}, retrying with {:?}", request.caps, relaxed);
        if let Some(index) = pick_physical_device(driver, &relaxed, preferred) {
            return Ok((index, relaxed));
        }
    }

    let err = HostError::NoSuitableDevice(driver.physical_device_count());
    log::error!("{}", err);
    Err(err)
}

/// A running backend: driver, surface and device, torn down in reverse.
pub struct RenderingSession {
    device: Option<DeviceHandle>,
    surface: Option<SurfaceHandle>,
    physical_device: Option<u32>,
    caps: DesiredDeviceCaps,
    backend: LoadedBackend,
}

/// Runs the start-up sequence on a freshly loaded backend.
pub fn start_session(
    backend: LoadedBackend,
    app_info: &ApplicationInfo<'_>,
    window: &WindowDescriptor,
    request: &DeviceRequest,
) -> Result<RenderingSession, HostError> {
    let mut session = RenderingSession {
        device: None,
        surface: None,
        physical_device: None,
        caps: request.caps,
        backend,
    };

    log::info!("Initializing backend '{}' for {} {}", session.backend.name, app_info.name, app_info.version);
    session
        .backend
        .driver
        .init(app_info)
        .map_err(HostError::driver("driver initialization"))?;

    let surface = session
        .backend
        .driver
        .create_surface(window)
        .map_err(HostError::driver("surface creation"))?;
    session.surface = Some(surface);

    let (index, caps) = choose_device(session.backend.driver(), request)?;

    let device = session
        .backend
        .driver
        .create_device(index, surface, &caps)
        .map_err(HostError::driver("device creation"))?;
    session.device = Some(device);
    session.physical_device = Some(index);
    session.caps = caps;

    log::info!(
        "Using physical device {} ({})",
        index,
        session.backend.driver.physical_device_name(index).unwrap_or("<unnamed>")
    );

    Ok(session)
}

impl RenderingSession {
    pub fn backend_name(&self) -> &str {
        &self.backend.name
    }

    pub fn driver(&self) -> &dyn RenderingDriver {
        self.backend.driver()
    }

    pub fn surface(&self) -> Option<SurfaceHandle> {
        self.surface
    }

    pub fn device(&self) -> Option<DeviceHandle> {
        self.device
    }

    pub fn physical_device(&self) -> Option<u32> {
        self.physical_device
    }

    /// Requirements the device was actually created with.
    pub fn caps(&self) -> DesiredDeviceCaps {
        self.caps
    }

    /// Tears everything down now. Same as dropping the session.
    pub fn shutdown(self) {}
}

impl Drop for RenderingSession {
    fn drop(&mut self) {
        log::info!("Shutting down backend '{}'", self.backend.name);

        let driver = self.backend.driver.as_mut();
        if let Some(device) = self.device.take() {
            if !driver.destroy_device(device) {
                log::warn!("couldn't destroy {}", device);
            }
        }
        if let Some(surface) = self.surface.take() {
            if !driver.destroy_surface(surface) {
                log::warn!("couldn't destroy {}", surface);
            }
        }
        // driver, then module, go with `backend`
    }
}
