//! Persistent device state
//!
//! The only per-device field that survives restarts is the user's last
//! explicit power choice, keyed by device name within the active profile.
//! The profile also carries the global offline mode flag.

use crate::error::{NetcoreError, NetcoreResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Storage backend for persisted device and profile state
#[cfg_attr(test, mockall::automock)]
pub trait DeviceStore: Send {
    /// Persisted power choice for the named device, if any
    fn load_device_powered(&self, name: &str) -> NetcoreResult<Option<bool>>;

    /// Persist the power choice for the named device
    fn save_device_powered(&mut self, name: &str, powered: bool) -> NetcoreResult<()>;

    /// Persisted offline mode flag of the active profile
    fn load_offline_mode(&self) -> NetcoreResult<bool>;

    /// Persist the offline mode flag of the active profile
    fn save_offline_mode(&mut self, offline: bool) -> NetcoreResult<()>;
}

fn device_key(name: &str) -> String {
    format!("device_{}", name)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    offline_mode: bool,
    #[serde(default)]
    devices: BTreeMap<String, DeviceEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DeviceEntry {
    powered: bool,
}

/// TOML profile file store
///
/// Every save rewrites `<dir>/<profile>.profile`.
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new<P: AsRef<Path>>(dir: P, profile: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.profile", profile)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> NetcoreResult<ProfileFile> {
        if !self.path.exists() {
            return Ok(ProfileFile::default());
        }

        let content = std::fs::read_to_string(&self.path)?;
        toml::from_str(&content)
            .map_err(|e| NetcoreError::Parse(format!("Invalid profile {}: {}", self.path.display(), e)))
    }

    fn write(&self, profile: &ProfileFile) -> NetcoreResult<()> {
        let content = toml::to_string_pretty(profile)
            .map_err(|e| NetcoreError::Parse(format!("Failed to serialize profile: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl DeviceStore for ProfileStore {
    fn load_device_powered(&self, name: &str) -> NetcoreResult<Option<bool>> {
        let profile = self.read()?;
        Ok(profile.devices.get(&device_key(name)).map(|e| e.powered))
    }

    fn save_device_powered(&mut self, name: &str, powered: bool) -> NetcoreResult<()> {
        let mut profile = self.read()?;
        profile.devices.insert(device_key(name), DeviceEntry { powered });
        debug!("saving {} powered {} to {}", name, powered, self.path.display());
        self.write(&profile)
    }

    fn load_offline_mode(&self) -> NetcoreResult<bool> {
        Ok(self.read()?.offline_mode)
    }

    fn save_offline_mode(&mut self, offline: bool) -> NetcoreResult<()> {
        let mut profile = self.read()?;
        profile.offline_mode = offline;
        self.write(&profile)
    }
}

/// Volatile store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    devices: HashMap<String, bool>,
    offline_mode: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeviceStore for MemoryStore {
    fn load_device_powered(&self, name: &str) -> NetcoreResult<Option<bool>> {
        Ok(self.devices.get(&device_key(name)).copied())
    }

    fn save_device_powered(&mut self, name: &str, powered: bool) -> NetcoreResult<()> {
        self.devices.insert(device_key(name), powered);
        Ok(())
    }

    fn load_offline_mode(&self) -> NetcoreResult<bool> {
        Ok(self.offline_mode)
    }

    fn save_offline_mode(&mut self, offline: bool) -> NetcoreResult<()> {
        self.offline_mode = offline;
        Ok(())
    }
}
