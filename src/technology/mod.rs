//! Technologies
//!
//! One [`Technology`] exists per service type that has devices, kill-switches
//! or interfaces. It aggregates member power and rfkill state into a single
//! lifecycle state.

pub mod manager;
pub mod rfkill;

pub use manager::{RfkillTransition, TechnologyManager};
pub use rfkill::{BlockTransition, RfkillSwitch, RfkillType};

use crate::driver::{DriverCapabilities, TechnologyDriver};
use crate::types::{DeviceId, ServiceType, TechnologyState};
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub struct Technology {
    pub(crate) service_type: ServiceType,
    pub(crate) state: TechnologyState,
    pub(crate) refcount: usize,
    pub(crate) devices: Vec<DeviceId>,
    pub(crate) rfkill: HashMap<u32, RfkillSwitch>,
    /// Member devices currently powered
    pub(crate) enabled: usize,
    /// Kill-switches currently blocking
    pub(crate) blocked: usize,
    pub(crate) regdom: Option<String>,

    pub(crate) tethering: bool,
    pub(crate) tethering_ident: Option<String>,
    pub(crate) tethering_passphrase: Option<String>,

    pub(crate) driver: Option<Arc<dyn TechnologyDriver>>,
    driver_data: Option<Box<dyn Any + Send>>,
}

/// Externally visible technology properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TechnologyProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Type", skip_serializing_if = "Option::is_none")]
    pub technology_type: Option<String>,
    pub tethering: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tethering_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tethering_passphrase: Option<String>,
}

impl Technology {
    pub(crate) fn new(service_type: ServiceType) -> Self {
        Self {
            service_type,
            state: TechnologyState::Offline,
            refcount: 1,
            devices: Vec::new(),
            rfkill: HashMap::new(),
            enabled: 0,
            blocked: 0,
            regdom: None,
            tethering: false,
            tethering_ident: None,
            tethering_passphrase: None,
            driver: None,
            driver_data: None,
        }
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    pub fn state(&self) -> TechnologyState {
        self.state
    }

    pub fn refcount(&self) -> usize {
        self.refcount
    }

    pub fn devices(&self) -> &[DeviceId] {
        &self.devices
    }

    pub fn enabled_count(&self) -> usize {
        self.enabled
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked > 0
    }

    pub fn rfkill_switches(&self) -> impl Iterator<Item = &RfkillSwitch> {
        self.rfkill.values()
    }

    pub fn regdom(&self) -> Option<&str> {
        self.regdom.as_deref()
    }

    pub fn tethering(&self) -> bool {
        self.tethering
    }

    pub fn tethering_identifier(&self) -> Option<&str> {
        self.tethering_ident.as_deref()
    }

    pub fn tethering_passphrase(&self) -> Option<&str> {
        self.tethering_passphrase.as_deref()
    }

    pub fn has_driver(&self) -> bool {
        self.driver.is_some()
    }

    pub fn driver_name(&self) -> Option<&str> {
        self.driver.as_ref().map(|d| d.name())
    }

    pub(crate) fn driver_with(&self, capability: DriverCapabilities) -> Option<Arc<dyn TechnologyDriver>> {
        self.driver
            .as_ref()
            .filter(|d| d.capabilities().contains(capability))
            .cloned()
    }

    pub fn set_data<T: Any + Send>(&mut self, data: T) {
        self.driver_data = Some(Box::new(data));
    }

    pub fn data<T: Any + Send>(&self) -> Option<&T> {
        self.driver_data.as_ref()?.downcast_ref()
    }

    pub fn data_mut<T: Any + Send>(&mut self) -> Option<&mut T> {
        self.driver_data.as_mut()?.downcast_mut()
    }

    pub fn take_data(&mut self) -> Option<Box<dyn Any + Send>> {
        self.driver_data.take()
    }

    pub fn properties(&self) -> TechnologyProperties {
        TechnologyProperties {
            state: self.state.as_str().map(String::from),
            name: self.service_type.technology_name().map(String::from),
            technology_type: self.service_type.as_str().map(String::from),
            tethering: self.tethering,
            tethering_identifier: self.tethering_ident.clone(),
            tethering_passphrase: self.tethering_passphrase.clone(),
        }
    }
}

impl fmt::Debug for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Technology")
            .field("type", &self.service_type)
            .field("state", &self.state)
            .field("refcount", &self.refcount)
            .field("devices", &self.devices)
            .field("enabled", &self.enabled)
            .field("blocked", &self.blocked)
            .field("tethering", &self.tethering)
            .field("driver", &self.driver_name())
            .finish()
    }
}
