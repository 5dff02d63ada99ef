// renderplug - Run-time selectable rendering backends
//
// The host never links a backend. It loads one as a dynamic module, asks the
// module's exported entry point for a registration descriptor, and drives the
// driver it produces through the capability interfaces in `iface`.
//
// LAYERS:
// ┌─────────────────────────────────────────────────────────────────┐
// │  host         load → init → surface → pick device → device      │
// │    └── plugin       loader + ABI-stable registration descriptor │
// │          └── iface        RenderingDriver / Surface / Device    │
// │                └── window + handles   cross-boundary values     │
// └─────────────────────────────────────────────────────────────────┘

pub mod config;
pub mod error;
pub mod handles;
pub mod host;
pub mod iface;
pub mod plugin;
pub mod window;

pub use error::{DriverError, HostError, LoadError, QueuePurpose};
pub use handles::{DeviceHandle, HandleTable, SurfaceHandle};
pub use iface::{ApplicationInfo, DesiredDeviceCaps, Device, RenderingDriver, Surface, Version};
pub use plugin::{DriverDescriptor, DynamicLibrary};
pub use window::{OpaqueHandle, WindowDescriptor, WindowPlatform};
