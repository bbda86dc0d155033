//! Network devices
//!
//! A [`Device`] is one kernel network interface. Power, scan and network
//! state live here; transitions that involve drivers or technologies are
//! driven by [`crate::core::NetCore`].

pub mod manager;
pub mod network;
pub mod scan;

pub use manager::DeviceManager;
pub use network::Network;
pub use scan::{ScanScheduler, ScanTimer, SCAN_FORCE_DELAY, SCAN_INITIAL_DELAY};

use crate::driver::{DeviceDriver, DriverCapabilities};
use crate::error::{NetcoreError, NetcoreResult};
use crate::types::{DeviceId, DeviceType, ServiceType};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub struct Device {
    pub(crate) id: DeviceId,
    pub(crate) device_type: DeviceType,
    pub(crate) ident: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) node: Option<String>,
    pub(crate) address: Option<String>,
    pub(crate) interface: Option<String>,
    pub(crate) devname: Option<String>,
    pub(crate) path: Option<String>,
    pub(crate) index: Option<u32>,
    pub(crate) phyindex: Option<u32>,

    pub(crate) offline_mode: bool,
    pub(crate) blocked: bool,
    pub(crate) powered: bool,
    pub(crate) powered_pending: bool,
    pub(crate) powered_persistent: bool,
    pub(crate) scanning: bool,
    pub(crate) disconnected: bool,
    pub(crate) reconnect: bool,
    pub(crate) registered: bool,
    pub(crate) scan: ScanScheduler,

    pub(crate) driver: Option<Arc<dyn DeviceDriver>>,
    driver_data: Option<Box<dyn Any + Send>>,

    pub(crate) networks: HashMap<String, Network>,
    pub(crate) network: Option<String>,
    pub(crate) last_network: Option<String>,
}

impl Device {
    pub(crate) fn new(id: DeviceId, ident: &str, device_type: DeviceType, scan_interval: u16) -> Self {
        Self {
            id,
            device_type,
            ident: Some(ident.to_string()),
            name: device_type.description().map(String::from),
            node: None,
            address: None,
            interface: None,
            devname: None,
            path: None,
            index: None,
            phyindex: None,
            offline_mode: false,
            blocked: false,
            powered: false,
            powered_pending: false,
            powered_persistent: true,
            scanning: false,
            disconnected: false,
            reconnect: false,
            registered: false,
            scan: ScanScheduler::new(scan_interval),
            driver: None,
            driver_data: None,
            networks: HashMap::new(),
            network: None,
            last_network: None,
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    /// Service classification consumed by the service and VPN layers
    pub fn service_type(&self) -> ServiceType {
        self.device_type.service_type()
    }

    pub fn ident(&self) -> Option<&str> {
        self.ident.as_deref()
    }

    pub fn set_ident(&mut self, ident: &str) {
        self.ident = Some(ident.to_string());
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
    }

    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    pub fn set_node(&mut self, node: &str) {
        self.node = Some(node.to_string());
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn set_address(&mut self, address: &str) {
        self.address = Some(address.to_string());
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn set_path(&mut self, path: &str) {
        self.path = Some(path.to_string());
    }

    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    pub fn devname(&self) -> Option<&str> {
        self.devname.as_deref()
    }

    /// Set the interface name; an unnamed device becomes "<Description> (<iface>)"
    pub fn set_interface(&mut self, interface: &str) {
        self.devname = Some(interface.to_string());
        self.interface = Some(interface.to_string());

        if self.name.is_none() {
            if let Some(description) = self.device_type.description() {
                self.name = Some(format!("{} ({})", description, interface));
            }
        }
    }

    pub fn index(&self) -> Option<u32> {
        self.index
    }

    pub fn set_index(&mut self, index: u32) {
        self.index = Some(index);
    }

    pub fn phyindex(&self) -> Option<u32> {
        self.phyindex
    }

    pub fn set_phyindex(&mut self, phyindex: Option<u32>) {
        self.phyindex = phyindex;
    }

    pub fn powered(&self) -> bool {
        self.powered
    }

    pub fn powered_pending(&self) -> bool {
        self.powered_pending
    }

    pub fn powered_persistent(&self) -> bool {
        self.powered_persistent
    }

    pub fn blocked(&self) -> bool {
        self.blocked
    }

    pub fn offline_mode(&self) -> bool {
        self.offline_mode
    }

    pub fn scanning(&self) -> bool {
        self.scanning
    }

    pub fn disconnected(&self) -> bool {
        self.disconnected
    }

    pub fn reconnect(&self) -> bool {
        self.reconnect
    }

    pub fn set_reconnect(&mut self, reconnect: bool) {
        self.reconnect = reconnect;
    }

    pub fn registered(&self) -> bool {
        self.registered
    }

    /// Key of the persisted power choice: the stable ident, else the name
    pub fn storage_key(&self) -> Option<&str> {
        self.ident().or(self.name())
    }

    pub fn scan_scheduler(&self) -> &ScanScheduler {
        &self.scan
    }

    pub fn scan_interval(&self) -> u16 {
        self.scan.scan_interval()
    }

    pub fn set_scan_interval(&mut self, scan_interval: u16) {
        self.scan.set_scan_interval(scan_interval);
    }

    pub fn backoff_interval(&self) -> u16 {
        self.scan.backoff_interval()
    }

    pub fn has_driver(&self) -> bool {
        self.driver.is_some()
    }

    pub fn driver_name(&self) -> Option<&str> {
        self.driver.as_ref().map(|d| d.name())
    }

    pub(crate) fn driver_with(&self, capability: DriverCapabilities) -> Option<Arc<dyn DeviceDriver>> {
        self.driver
            .as_ref()
            .filter(|d| d.capabilities().contains(capability))
            .cloned()
    }

    pub fn can_scan(&self) -> bool {
        self.driver_with(DriverCapabilities::SCAN).is_some()
    }

    /// Attach driver private data
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

    /// Add a network discovered by the driver
    pub fn add_network(&mut self, network: Network) -> NetcoreResult<()> {
        if network.identifier().is_empty() {
            return Err(NetcoreError::InvalidArgument(
                "Network identifier cannot be empty".to_string(),
            ));
        }

        self.networks.insert(network.identifier().to_string(), network);
        Ok(())
    }

    pub fn network(&self, identifier: &str) -> Option<&Network> {
        self.networks.get(identifier)
    }

    pub fn network_mut(&mut self, identifier: &str) -> Option<&mut Network> {
        self.networks.get_mut(identifier)
    }

    pub fn remove_network(&mut self, identifier: &str) -> Option<Network> {
        if self.network.as_deref() == Some(identifier) {
            self.network = None;
        }
        self.networks.remove(identifier)
    }

    pub fn remove_all_networks(&mut self) {
        self.networks.clear();
        self.network = None;
    }

    pub fn networks(&self) -> impl Iterator<Item = &Network> {
        self.networks.values()
    }

    pub fn network_count(&self) -> usize {
        self.networks.len()
    }

    /// Identifier of the network the device is connected through
    pub fn current_network(&self) -> Option<&str> {
        self.network.as_deref()
    }

    /// Name of the last network set as current, kept for UI continuity
    pub fn last_network(&self) -> Option<&str> {
        self.last_network.as_deref()
    }

    /// Select (or clear) the current network
    pub fn set_network(&mut self, identifier: Option<&str>) -> NetcoreResult<()> {
        if self.network.as_deref() == identifier {
            return Ok(());
        }

        match identifier {
            Some(id) => {
                let network = self
                    .networks
                    .get(id)
                    .ok_or_else(|| NetcoreError::NoSuchEntity(format!("Network {} not found", id)))?;
                self.last_network = network.name().map(String::from);
                self.network = Some(id.to_string());
            }
            None => {
                self.last_network = None;
                self.network = None;
            }
        }

        Ok(())
    }

    /// Mark every network not currently connected as unavailable
    pub(crate) fn mark_networks_unavailable(&mut self) {
        for network in self.networks.values_mut() {
            if !network.connected() {
                network.set_available(false);
            }
        }
    }

    pub(crate) fn mark_networks_available(&mut self) {
        for network in self.networks.values_mut() {
            network.set_available(true);
        }
    }

    /// Drop networks that are neither connected nor available
    pub fn cleanup_networks(&mut self) -> usize {
        let before = self.networks.len();
        self.networks.retain(|_, n| n.is_retained());
        if let Some(current) = self.network.clone() {
            if !self.networks.contains_key(&current) {
                self.network = None;
            }
        }
        before - self.networks.len()
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("type", &self.device_type)
            .field("name", &self.name)
            .field("interface", &self.interface)
            .field("index", &self.index)
            .field("powered", &self.powered)
            .field("powered_pending", &self.powered_pending)
            .field("powered_persistent", &self.powered_persistent)
            .field("blocked", &self.blocked)
            .field("scanning", &self.scanning)
            .field("driver", &self.driver_name())
            .field("networks", &self.networks.len())
            .finish()
    }
}
