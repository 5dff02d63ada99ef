// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Which backends to try, where to find them, what the device must offer and
// how loudly to log. Missing file or keys fall back to defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::Deserialize;

use crate::iface::{DesiredDeviceCaps, Version};

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub app: AppConfig,
    pub window: WindowConfig,
    pub backend: BackendConfig,
    pub device: DeviceConfig,
    pub logging: LoggingConfig,
}

/// Application identity reported to the driver
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub version: Version,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "App3D".to_string(),
            version: Version::new(0, 1, 0),
        }
    }
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "App3D".to_string(),
            width: 1024,
            height: 768,
        }
    }
}

/// Backend module selection
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Relative paths resolve against `<exe dir>/../lib`.
    pub directory: PathBuf,
    /// Tried in order until one loads.
    pub names: Vec<String>,
    /// Case-insensitive substring of a device name to prefer.
    pub preferred_device: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("renderplug"),
            names: vec!["renderplug_vulkan".to_string()],
            preferred_device: None,
        }
    }
}

/// Device requirements
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct DeviceConfig {
    pub needs_compute: bool,
    /// Retry without optional requirements when no device meets them.
    pub allow_relaxed_caps: bool,
}

impl DeviceConfig {
    pub fn caps(&self) -> DesiredDeviceCaps {
        DesiredDeviceCaps {
            needs_compute: self.needs_compute,
        }
    }
}

/// Logging settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.to_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            _ => {
                log::warn!("Unknown log level '{}', defaulting to info", self.level);
                LevelFilter::Info
            }
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [backend]
            names = ["first", "second"]

            [device]
            needs_compute = true
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.names, vec!["first", "second"]);
        assert_eq!(config.backend.directory, PathBuf::from("renderplug"));
        assert!(config.device.caps().needs_compute);
        assert!(!config.device.allow_relaxed_caps);
        assert_eq!(config.window.width, 1024);
    }

    #[test]
    fn test_app_version_table() {
        let config: Config = toml::from_str(
            r#"
            [app]
            name = "demo"
            version = { major = 2, minor = 1, patch = 7 }
            "#,
        )
        .unwrap();

        assert_eq!(config.app.name, "demo");
        assert_eq!(config.app.version, Version::new(2, 1, 7));
    }

    #[test]
    fn test_log_levels() {
        let mut logging = LoggingConfig::default();
        assert_eq!(logging.level_filter(), LevelFilter::Info);
        logging.level = "Warning".to_string();
        assert_eq!(logging.level_filter(), LevelFilter::Warn);
        logging.level = "loud".to_string();
        assert_eq!(logging.level_filter(), LevelFilter::Info);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_path(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.backend.names, vec!["renderplug_vulkan"]);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[window\nwidth = ").unwrap();
        assert!(Config::load_from_path(&path).is_err());
    }
}
