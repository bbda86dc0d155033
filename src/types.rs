//! Shared type definitions for devices and technologies

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned by the device manager when a device is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device{}", self.0)
    }
}

/// Kind of network interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Unknown,
    Ethernet,
    Wifi,
    Wimax,
    Bluetooth,
    Gps,
    Cellular,
    Gadget,
    Vendor,
}

impl DeviceType {
    /// Short lowercase name, `None` for unknown and vendor devices
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            DeviceType::Unknown | DeviceType::Vendor => None,
            DeviceType::Ethernet => Some("ethernet"),
            DeviceType::Wifi => Some("wifi"),
            DeviceType::Wimax => Some("wimax"),
            DeviceType::Bluetooth => Some("bluetooth"),
            DeviceType::Gps => Some("gps"),
            DeviceType::Cellular => Some("cellular"),
            DeviceType::Gadget => Some("gadget"),
        }
    }

    /// Human readable description used as the default device name
    pub fn description(&self) -> Option<&'static str> {
        match self {
            DeviceType::Unknown | DeviceType::Vendor => None,
            DeviceType::Ethernet => Some("Ethernet"),
            DeviceType::Wifi => Some("Wireless"),
            DeviceType::Wimax => Some("WiMAX"),
            DeviceType::Bluetooth => Some("Bluetooth"),
            DeviceType::Gps => Some("GPS"),
            DeviceType::Cellular => Some("Cellular"),
            DeviceType::Gadget => Some("Gadget"),
        }
    }

    /// Service type a device of this kind is grouped under
    pub fn service_type(&self) -> ServiceType {
        match self {
            DeviceType::Unknown | DeviceType::Vendor | DeviceType::Gps => ServiceType::Unknown,
            DeviceType::Ethernet => ServiceType::Ethernet,
            DeviceType::Wifi => ServiceType::Wifi,
            DeviceType::Wimax => ServiceType::Wimax,
            DeviceType::Bluetooth => ServiceType::Bluetooth,
            DeviceType::Cellular => ServiceType::Cellular,
            DeviceType::Gadget => ServiceType::Gadget,
        }
    }
}

/// Service classification shared with the service and VPN layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Unknown,
    System,
    Ethernet,
    Wifi,
    Wimax,
    Bluetooth,
    Cellular,
    Gps,
    Vpn,
    Gadget,
}

impl ServiceType {
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            ServiceType::Unknown => None,
            ServiceType::System => Some("system"),
            ServiceType::Ethernet => Some("ethernet"),
            ServiceType::Wifi => Some("wifi"),
            ServiceType::Wimax => Some("wimax"),
            ServiceType::Bluetooth => Some("bluetooth"),
            ServiceType::Cellular => Some("cellular"),
            ServiceType::Gps => Some("gps"),
            ServiceType::Vpn => Some("vpn"),
            ServiceType::Gadget => Some("gadget"),
        }
    }

    /// Display name of the technology for this service type
    pub fn technology_name(&self) -> Option<&'static str> {
        match self {
            ServiceType::Ethernet => Some("Wired"),
            ServiceType::Wifi => Some("WiFi"),
            ServiceType::Wimax => Some("WiMAX"),
            ServiceType::Bluetooth => Some("Bluetooth"),
            ServiceType::Cellular => Some("3G"),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or("unknown"))
    }
}

/// Technology lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TechnologyState {
    /// Not yet initialized
    Unknown = 0,
    /// No member devices
    Offline = 1,
    /// Member devices present, none powered
    Available = 2,
    /// At least one kill-switch is blocking
    Blocked = 3,
    /// At least one member device is powered
    Enabled = 4,
    /// A service of this technology is connected
    Connected = 5,
}

impl TechnologyState {
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            TechnologyState::Unknown => None,
            TechnologyState::Offline => Some("offline"),
            TechnologyState::Available => Some("available"),
            TechnologyState::Blocked => Some("blocked"),
            TechnologyState::Enabled => Some("enabled"),
            TechnologyState::Connected => Some("connected"),
        }
    }
}

/// Result of an operation that may complete asynchronously
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The operation took effect immediately
    Done,
    /// The operation is in flight; a completion callback will follow
    Pending,
}
