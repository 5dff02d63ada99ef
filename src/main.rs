// =============================================================================
// RENDERPLUG HOST - Picks a rendering backend at run time
// =============================================================================
//
// The host links no backend. It loads one by name from the plugin directory,
// brings it up against a window, and owns the result until the window closes.
//
// START-UP FLOW:
// 1. Load config.toml, initialize logging (before any other core call)
// 2. Create the window (winit)
// 3. Load the first backend module that opens, instantiate its driver
// 4. init → create surface → pick physical device → create device
// 5. Hand off to rendering (external)
//
// SHUTDOWN: device, surface, driver, module, then the window.
//
// =============================================================================

use anyhow::{Context, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use renderplug::config::Config;
use renderplug::host::{self, DeviceRequest, RenderingSession};
use renderplug::{ApplicationInfo, HostError, WindowDescriptor};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes, WindowId},
};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    // Load configuration from config.toml
    let config = Config::load();

    // Initialize logging
    init_logging(&config);
    log::info!("Starting renderplug host");
    log::info!(
        "Backends: {:?} from {:?}",
        config.backend.names,
        config.backend.directory
    );

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.failure.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Initialize logging. `RUST_LOG` overrides the configured level.
fn init_logging(config: &Config) {
    use env_logger::Builder;

    let mut builder = Builder::new();
    builder.filter_level(config.logging.level_filter());
    builder.parse_default_env();
    builder.init();
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// IMPORTANT: Field order matters for Drop! The session's surface refers to
/// the window, so the session goes first.
struct App {
    config: Config,
    session: Option<RenderingSession>,
    window: Option<Window>,
    /// Start-up failure, reported as the process exit status
    failure: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            session: None,
            window: None,
            failure: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attributes = WindowAttributes::default()
            .with_title(self.config.window.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.window.width, self.config.window.height));

        let window = event_loop
            .create_window(attributes)
            .context("Failed to create window")?;

        let descriptor = window_descriptor(&window)?;

        let backend = host::open_first_backend(&self.config.backend.directory, &self.config.backend.names)?;

        let app_info = ApplicationInfo {
            name: &self.config.app.name,
            version: self.config.app.version,
        };
        let request = DeviceRequest {
            caps: self.config.device.caps(),
            allow_relaxed_caps: self.config.device.allow_relaxed_caps,
            preferred_device: self.config.backend.preferred_device.clone(),
        };

        // Store the window before the session so a failure below drops nothing out of order
        self.window = Some(window);
        let session = host::start_session(backend, &app_info, &descriptor, &request)?;

        log::info!(
            "Backend '{}' ready on physical device {:?}",
            session.backend_name(),
            session.physical_device()
        );
        self.session = Some(session);

        Ok(())
    }
}

fn window_descriptor(window: &Window) -> Result<WindowDescriptor> {
    let window_handle = window
        .window_handle()
        .context("Failed to get window handle")?
        .as_raw();
    let display_handle = window
        .display_handle()
        .context("Failed to get display handle")?
        .as_raw();

    WindowDescriptor::from_raw(display_handle, window_handle).context("Unsupported window handle type")
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        if let Err(e) = self.start(event_loop) {
            // Host errors were logged where they happened
            if e.downcast_ref::<HostError>().is_none() {
                log::error!("Start-up failed: {:#}", e);
            }
            self.failure = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested");
                // Tear down the backend while the window still exists
                self.session = None;
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                // Frame submission belongs to the renderer, not the host
            }
            _ => {}
        }
    }
}
