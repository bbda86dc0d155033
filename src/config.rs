//! Configuration management for netcore

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{NetcoreError, NetcoreResult};
use crate::filter::DeviceFilter;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/netcore/main.conf";

/// Main netcore configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetcoreConfig {
    /// Storage locations
    #[serde(default)]
    pub paths: ConfigPaths,
    /// Background scanning policy
    #[serde(default)]
    pub scanning: ScanSettings,
    /// Interface name filters
    #[serde(default)]
    pub devices: DeviceFilterSettings,
    /// Tethering settings
    #[serde(default)]
    pub tethering: TetheringSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigPaths {
    /// Directory holding persisted profiles
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    /// Active profile name
    #[serde(default = "default_profile")]
    pub profile: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Periodic scanning for wifi devices
    #[serde(default = "default_background_scanning")]
    pub background_scanning: bool,
    /// Full background scan interval (seconds)
    #[serde(default = "default_scan_interval")]
    pub background_scan_interval: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceFilterSettings {
    /// Only interfaces matching one of these patterns are managed
    #[serde(default)]
    pub allow: Vec<String>,
    /// Interfaces matching any of these patterns are ignored
    #[serde(default)]
    pub deny: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TetheringSettings {
    /// Bridge used for tethering; tethering is unsupported without one
    #[serde(default)]
    pub bridge: Option<String>,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("/var/lib/netcore")
}

fn default_profile() -> String {
    "default".to_string()
}

fn default_background_scanning() -> bool {
    true
}

fn default_scan_interval() -> u16 {
    300
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            profile: default_profile(),
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            background_scanning: default_background_scanning(),
            background_scan_interval: default_scan_interval(),
        }
    }
}

impl NetcoreConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> NetcoreResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| NetcoreError::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| NetcoreError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> NetcoreResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| NetcoreError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| NetcoreError::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Ensure the storage directory exists
    pub fn ensure_directories(&self) -> NetcoreResult<()> {
        let dir = &self.paths.storage_dir;
        std::fs::create_dir_all(dir)
            .map_err(|e| NetcoreError::Config(format!("Failed to create directory {:?}: {}", dir, e)))?;
        Ok(())
    }

    /// Background scan interval applied to newly created wifi devices
    pub fn wifi_scan_interval(&self) -> u16 {
        if self.scanning.background_scanning {
            self.scanning.background_scan_interval
        } else {
            0
        }
    }

    /// Interface filter built from the configured patterns
    pub fn device_filter(&self) -> DeviceFilter {
        DeviceFilter::new(self.devices.allow.clone(), self.devices.deny.clone())
    }
}
