// Errors - Shared by the host, the loader and every backend
//
// All of them are plain values. Nothing here unwinds across the plugin
// boundary, a failed call hands back one of these and the reason has already
// been logged at the failure site.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::handles::{DeviceHandle, SurfaceHandle};
use crate::window::WindowPlatform;

/// Purpose a queue family is selected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueuePurpose {
    Graphics,
    Present,
    Compute,
}

impl fmt::Display for QueuePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueuePurpose::Graphics => "graphics",
            QueuePurpose::Present => "present",
            QueuePurpose::Compute => "compute",
        })
    }
}

/// Failures while locating or opening a backend module.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("couldn't find dynamic library '{}': {source}", path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't load dynamic library '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("couldn't find entry point '{symbol}': {source}")]
    MissingSymbol {
        symbol: String,
        #[source]
        source: libloading::Error,
    },

    #[error("dynamic library '{}' is already unloaded", .0.display())]
    Unloaded(PathBuf),

    #[error("entry point '{0}' returned no descriptor")]
    NullDescriptor(String),

    #[error("incompatible descriptor ABI version: expected {expected}, found {found}")]
    AbiMismatch { expected: u32, found: u32 },

    #[error("backend built by '{backend}', host built by '{host}'")]
    CompilerMismatch { host: String, backend: String },
}

/// Failures reported by a rendering driver.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("driver is not initialized")]
    NotInitialized,

    #[error("driver is already initialized")]
    AlreadyInitialized,

    #[error("driver is in a failed state")]
    Failed,

    #[error("invalid physical device index {0}")]
    InvalidDeviceIndex(u32),

    #[error("invalid surface handle {0}")]
    InvalidSurface(SurfaceHandle),

    #[error("invalid device handle {0}")]
    InvalidDevice(DeviceHandle),

    #[error("instance extension '{0}' is not supported")]
    InstanceExtensionUnsupported(String),

    #[error("instance extension '{0}' is not enabled")]
    InstanceExtensionNotEnabled(String),

    #[error("device extension '{0}' is not supported")]
    DeviceExtensionUnsupported(String),

    #[error("no suitable {0} queue family")]
    NoSuitableQueueFamily(QueuePurpose),

    #[error("physical device {0} lacks required features")]
    MissingFeatures(u32),

    #[error("physical device {0} cannot present to surface {1}")]
    PresentUnsupported(u32, SurfaceHandle),

    #[error("no physical device can present to the window")]
    NoPresentableDevice,

    #[error("window platform '{0}' is not supported by this driver")]
    UnsupportedPlatform(WindowPlatform),

    #[error("surface {surface} is still used by device {device}")]
    SurfaceInUse {
        surface: SurfaceHandle,
        device: DeviceHandle,
    },

    #[error("{what}: {reason}")]
    Api { what: &'static str, reason: String },
}

impl DriverError {
    /// Wraps an underlying API failure with the operation that produced it.
    pub fn api(what: &'static str, reason: impl fmt::Display) -> Self {
        DriverError::Api {
            what,
            reason: reason.to_string(),
        }
    }

    /// Logs the error at the error level and hands it back, for use in
    /// `map_err`/`return Err(..)` chains at the failure site.
    pub fn logged(self) -> Self {
        log::error!("{}", self);
        self
    }
}

/// Failures of the host start-up sequence.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("backend '{name}' failed to load: {source}")]
    Load {
        name: String,
        #[source]
        source: LoadError,
    },

    #[error("no backend could be loaded (tried: {0})")]
    NoBackend(String),

    #[error("{stage} failed: {source}")]
    Driver {
        stage: &'static str,
        #[source]
        source: DriverError,
    },

    #[error("no suitable physical device among {0}")]
    NoSuitableDevice(u32),
}

impl HostError {
    pub(crate) fn driver(stage: &'static str) -> impl FnOnce(DriverError) -> HostError {
        move |source| HostError::Driver { stage, source }
    }
}
