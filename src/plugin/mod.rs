// Plugin boundary
//
// `loader` opens backend modules, `descriptor` defines what a module exports.

pub mod descriptor;
pub mod loader;

pub use descriptor::{
    host_rustc_version, install_logger, DriverDescriptor, DriverEntryFn, DriverFactory, LoggerInstaller, ABI_VERSION,
    ENTRY_SYMBOL, RUSTC_VERSION,
};
pub use loader::{adjacent_lib_dir, library_file_name, resolve_library_path, DynamicLibrary};
