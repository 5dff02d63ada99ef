// Backend registration descriptor - The ABI contract of a backend module
//
// Every backend module exports one `extern "C"` function, ENTRY_SYMBOL, that
// returns a pointer to a process-wide constant DriverDescriptor. The layout
// below IS the compatibility contract:
//
//   offset 0   abi_version     u32, checked first
//   next       rustc_version   nul-terminated compiler string
//   next       name            nul-terminated backend name
//   next       install_logger  hands the host's logger to the module
//   next       factory         fresh, independent driver instance
//
// Trait objects cross the boundary with the Rust ABI, so the compiler string
// has to match exactly; ABI_VERSION bumps whenever the layout or the
// RenderingDriver trait changes.

use std::ffi::{c_char, CStr};

use log::LevelFilter;

use crate::error::LoadError;
use crate::iface::RenderingDriver;

/// Current descriptor layout version.
pub const ABI_VERSION: u32 = 1;

/// Name of the exported entry function.
pub const ENTRY_SYMBOL: &str = "renderplug_driver_descriptor";

/// Compiler that built this copy of the crate.
pub const RUSTC_VERSION: *const c_char = concat!(env!("RENDERPLUG_RUSTC_VERSION"), "\0").as_ptr().cast();

pub type DriverFactory = fn() -> Box<dyn RenderingDriver>;
pub type LoggerInstaller = fn(&'static dyn log::Log, LevelFilter);
pub type DriverEntryFn = unsafe extern "C" fn() -> *const DriverDescriptor;

#[repr(C)]
pub struct DriverDescriptor {
    pub abi_version: u32,
    pub rustc_version: *const c_char,
    pub name: *const c_char,
    pub install_logger: LoggerInstaller,
    pub factory: DriverFactory,
}

// Immutable after static initialization; the pointers target 'static strings.
unsafe impl Sync for DriverDescriptor {}

impl DriverDescriptor {
    pub fn name(&self) -> &str {
        c_str_or(self.name, "<invalid name>")
    }

    pub fn rustc_version(&self) -> &str {
        c_str_or(self.rustc_version, "<invalid version>")
    }

    /// Rejects descriptors built against another layout or compiler.
    ///
    /// Only `abi_version` is read before the version check passes.
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.abi_version != ABI_VERSION {
            return Err(LoadError::AbiMismatch {
                expected: ABI_VERSION,
                found: self.abi_version,
            });
        }

        let host = host_rustc_version();
        let backend = self.rustc_version();
        if host != backend {
            return Err(LoadError::CompilerMismatch {
                host: host.to_string(),
                backend: backend.to_string(),
            });
        }

        Ok(())
    }

    pub fn create_driver(&self) -> Box<dyn RenderingDriver> {
        (self.factory)()
    }
}

pub fn host_rustc_version() -> &'static str {
    c_str_or(RUSTC_VERSION, "<invalid version>")
}

fn c_str_or<'a>(ptr: *const c_char, fallback: &'a str) -> &'a str {
    if ptr.is_null() {
        return fallback;
    }
    // SAFETY: descriptor strings are nul-terminated statics of the module
    unsafe { CStr::from_ptr(ptr) }.to_str().unwrap_or(fallback)
}

/// Installs the host's logger into this copy of the `log` facade.
///
/// A dynamically loaded module has its own logger slot; until this runs its
/// log calls go nowhere.
pub fn install_logger(logger: &'static dyn log::Log, level: LevelFilter) {
    // Already set when host and driver share one copy of the facade.
    let _ = log::set_logger(logger);
    log::set_max_level(level);
}

/// Registers `$driver` as this module's rendering backend.
///
/// Emits the static descriptor and the exported entry function. `$driver`
/// must implement `Default` and `RenderingDriver`. Use once per module.
#[macro_export]
macro_rules! register_rendering_driver {
    ($name:literal, $driver:ty) => {
        fn __renderplug_create_driver() -> ::std::boxed::Box<dyn $crate::RenderingDriver> {
            ::std::boxed::Box::new(<$driver as ::std::default::Default>::default())
        }

        static __RENDERPLUG_DRIVER_DESCRIPTOR: $crate::DriverDescriptor = $crate::DriverDescriptor {
            abi_version: $crate::plugin::ABI_VERSION,
            rustc_version: $crate::plugin::RUSTC_VERSION,
            name: concat!($name, "\0").as_ptr().cast(),
            install_logger: $crate::plugin::install_logger,
            factory: __renderplug_create_driver,
        };

        #[no_mangle]
        #[allow(improper_ctypes_definitions)]
        pub extern "C" fn renderplug_driver_descriptor() -> *const $crate::DriverDescriptor {
            &__RENDERPLUG_DRIVER_DESCRIPTOR
        }
    };
}
