// Dynamic library loader
//
// Turns a logical module name ("renderplug_vulkan", "vulkan") into a platform
// file name, resolves it against a directory and opens it. Failures are
// logged here and returned; the caller decides whether a missing module is
// fatal.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use libloading::Library;

use crate::error::LoadError;

#[cfg(target_os = "windows")]
const LIBRARY_PREFIX: &str = "";
#[cfg(not(target_os = "windows"))]
const LIBRARY_PREFIX: &str = "lib";

#[cfg(target_os = "windows")]
const LIBRARY_SUFFIX: &str = ".dll";
#[cfg(target_os = "macos")]
const LIBRARY_SUFFIX: &str = ".dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const LIBRARY_SUFFIX: &str = ".so";

/// Platform file name for a logical library name.
pub fn library_file_name(name: &str) -> String {
    let prefix = if name.starts_with(LIBRARY_PREFIX) { "" } else { LIBRARY_PREFIX };
    format!("{}{}{}", prefix, name, LIBRARY_SUFFIX)
}

/// The `lib` directory next to the executable's directory (`<exe>/../lib`).
pub fn adjacent_lib_dir() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    Some(exe.parent()?.join("..").join("lib"))
}

/// Resolves the path to hand to the platform loader.
///
/// An empty `directory` leaves the bare file name to the system search path.
/// A relative `directory` is taken relative to `lib_root`. The joined path
/// must exist; it is canonicalized.
pub fn resolve_library_path(directory: &Path, name: &str, lib_root: Option<&Path>) -> Result<PathBuf, LoadError> {
    let file_name = library_file_name(name);

    if directory.as_os_str().is_empty() {
        return Ok(PathBuf::from(file_name));
    }

    let mut path = directory.join(&file_name);
    if directory.is_relative() {
        match lib_root {
            Some(root) => path = root.join(path),
            None => log::warn!("no adjacent lib directory, resolving {:?} against the working directory", directory),
        }
    }

    path.canonicalize()
        .map_err(|source| LoadError::NotFound { path, source })
}

/// An open dynamic library. Unloaded exactly once, by `unload` or on drop.
#[derive(Debug)]
pub struct DynamicLibrary {
    library: Option<Library>,
    path: PathBuf,
}

impl DynamicLibrary {
    /// Opens `name` from `directory`. See `resolve_library_path`.
    pub fn load(directory: &Path, name: &str) -> Result<Self, LoadError> {
        let lib_root = adjacent_lib_dir();
        let path = resolve_library_path(directory, name, lib_root.as_deref()).map_err(log_error)?;

        log::debug!("loading dynamic library {:?}", path);

        // SAFETY: module initializers run here; backends are trusted code
        let library = unsafe { Library::new(&path) }
            .map_err(|source| log_error(LoadError::Open { path: path.clone(), source }))?;

        Ok(Self {
            library: Some(library),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        self.path.file_name().and_then(OsStr::to_str).unwrap_or("?")
    }

    /// Resolves an exported symbol.
    ///
    /// # Safety
    /// `T` must match the symbol's actual type, and the value must not be
    /// used after this library is unloaded.
    pub unsafe fn get_entry<T: Copy>(&self, symbol: &str) -> Result<T, LoadError> {
        let library = self
            .library
            .as_ref()
            .ok_or_else(|| log_error(LoadError::Unloaded(self.path.clone())))?;

        library
            .get::<T>(symbol.as_bytes())
            .map(|entry| *entry)
            .map_err(|source| {
                log_error(LoadError::MissingSymbol {
                    symbol: symbol.to_string(),
                    source,
                })
            })
    }

    /// Unloads the library now.
    pub fn unload(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if let Some(library) = self.library.take() {
            log::debug!("unloading dynamic library {:?}", self.path);
            if let Err(e) = library.close() {
                log::error!("couldn't unload dynamic library '{}': {}", self.file_name(), e);
            }
        }
    }
}

impl Drop for DynamicLibrary {
    fn drop(&mut self) {
        self.close();
    }
}

fn log_error(err: LoadError) -> LoadError {
    log::error!("{}", err);
    err
}
