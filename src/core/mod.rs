//! Device and technology core
//!
//! [`NetCore`] owns the device manager, the technology manager, the device
//! driver registry and the persistent store. Every operation that crosses
//! from a device into its technology (or back, for kill-switch cascades)
//! goes through it. All methods run on the single control task; drivers that
//! finish asynchronously report back through the daemon command channel.

mod power;
mod scan;
mod technology;

use crate::config::NetcoreConfig;
use crate::device::{Device, DeviceManager};
use crate::driver::traits::matches_device;
use crate::driver::{DeviceDriver, DriverRegistry};
use crate::error::{NetcoreError, NetcoreResult};
use crate::notifier::{CoreEvent, Notifier};
use crate::storage::DeviceStore;
use crate::technology::TechnologyManager;
use crate::types::{DeviceId, DeviceType, ServiceType};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct NetCore {
    config: NetcoreConfig,
    devices: DeviceManager,
    device_drivers: DriverRegistry<dyn DeviceDriver>,
    technologies: TechnologyManager,
    store: Box<dyn DeviceStore>,
    notifier: Notifier,
    offline_mode: bool,
}

impl NetCore {
    pub fn new(config: NetcoreConfig, store: Box<dyn DeviceStore>) -> Self {
        let notifier = Notifier::new();

        let offline_mode = store.load_offline_mode().unwrap_or_else(|e| {
            warn!("Failed to load offline mode: {}", e);
            false
        });

        let devices = DeviceManager::new(config.device_filter(), config.wifi_scan_interval());
        let technologies = TechnologyManager::new(notifier.clone());

        Self {
            config,
            devices,
            device_drivers: DriverRegistry::new(),
            technologies,
            store,
            notifier,
            offline_mode,
        }
    }

    pub fn config(&self) -> &NetcoreConfig {
        &self.config
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn devices(&self) -> &DeviceManager {
        &self.devices
    }

    pub fn technologies(&self) -> &TechnologyManager {
        &self.technologies
    }

    pub fn technologies_mut(&mut self) -> &mut TechnologyManager {
        &mut self.technologies
    }

    pub fn offline_mode(&self) -> bool {
        self.offline_mode
    }

    pub fn device(&self, id: DeviceId) -> NetcoreResult<&Device> {
        self.devices.device(id)
    }

    /// Mutable access for drivers updating attributes and networks
    pub fn device_mut(&mut self, id: DeviceId) -> NetcoreResult<&mut Device> {
        self.devices.device_mut(id)
    }

    /// Service classification of a device
    pub fn get_service_type(&self, id: DeviceId) -> ServiceType {
        self.devices
            .get(id)
            .map_or(ServiceType::Unknown, Device::service_type)
    }

    pub fn has_driver(&self, id: DeviceId) -> bool {
        self.devices.get(id).map_or(false, Device::has_driver)
    }

    /// First device of a service type
    pub fn find_device(&self, service_type: ServiceType) -> Option<DeviceId> {
        self.devices.find_by_service_type(service_type)
    }

    pub fn is_filtered(&self, devname: &str) -> bool {
        self.devices.is_filtered(devname)
    }

    /// Allocate a device; it does nothing until registered
    pub fn create_device(&mut self, ident: &str, device_type: DeviceType) -> NetcoreResult<DeviceId> {
        self.devices.create(ident, device_type)
    }

    /// Load persisted state, apply offline mode and probe drivers
    pub fn register_device(&mut self, id: DeviceId) -> NetcoreResult<()> {
        let offline_mode = self.offline_mode;
        let device = self.devices.device_mut(id)?;

        if let Some(key) = device.storage_key().map(String::from) {
            match self.store.load_device_powered(&key) {
                Ok(Some(powered)) => device.powered_persistent = powered,
                Ok(None) => {}
                Err(e) => warn!("Failed to load {}: {}", key, e),
            }
        }

        device.offline_mode = offline_mode;
        device.registered = true;

        info!(
            "Registering {} {}",
            id,
            device.interface().unwrap_or("<unnamed>")
        );
        self.notifier.emit(CoreEvent::DeviceAdded {
            device: id,
            interface: device.interface.clone(),
        });

        self.probe_device(id)
    }

    /// Persist power choice and release the driver
    pub fn unregister_device(&mut self, id: DeviceId) -> NetcoreResult<()> {
        self.save_device(id);

        let device = self.devices.device_mut(id)?;
        device.registered = false;
        info!("Unregistering {}", id);

        if device.has_driver() {
            self.remove_binding(id);
        }

        Ok(())
    }

    /// Unregister and release a device
    pub fn destroy_device(&mut self, id: DeviceId) -> NetcoreResult<()> {
        self.unregister_device(id)?;
        self.devices.remove(id);
        self.notifier.emit(CoreEvent::DeviceRemoved { device: id });
        Ok(())
    }

    pub(crate) fn save_device(&mut self, id: DeviceId) {
        let Some(device) = self.devices.get(id) else {
            return;
        };
        let Some(key) = device.storage_key() else {
            return;
        };

        if let Err(e) = self.store.save_device_powered(key, device.powered_persistent) {
            warn!("Failed to save {}: {}", key, e);
        }
    }

    pub(crate) fn save_offline_mode(&mut self) {
        if let Err(e) = self.store.save_offline_mode(self.offline_mode) {
            warn!("Failed to save offline mode: {}", e);
        }
    }

    /// Bind the first driver, by priority, that accepts the device
    fn probe_device(&mut self, id: DeviceId) -> NetcoreResult<()> {
        let device = self.devices.device_mut(id)?;
        if device.has_driver() {
            return Err(NetcoreError::AlreadyDone(format!("{} already has a driver", id)));
        }

        for driver in self.device_drivers.snapshot() {
            if !matches_device(&*driver, device.device_type) {
                continue;
            }

            debug!("probing driver {} for {}", driver.name(), id);
            match driver.probe(device) {
                Ok(()) => {
                    device.driver = Some(driver);
                    break;
                }
                Err(e) => debug!("driver {} declined {}: {}", driver.name(), id, e),
            }
        }

        if !device.has_driver() {
            return Ok(());
        }

        self.setup_device(id);
        Ok(())
    }

    /// Post-probe: join the technology and restore power
    fn setup_device(&mut self, id: DeviceId) {
        let Some(device) = self.devices.get_mut(id) else {
            return;
        };
        let service_type = device.service_type();

        if let Err(e) = self.technologies.add_device(id, service_type) {
            debug!("{} has no technology: {}", id, e);
        }
        device.blocked = self.technologies.get_blocked(service_type);

        if device.offline_mode || !device.powered_persistent {
            return;
        }

        if let Err(e) = self.enable(id) {
            if !e.is_benign() {
                debug!("{} not enabled: {}", id, e);
            }
        }
    }

    /// Power down, leave the technology and release the driver
    fn remove_binding(&mut self, id: DeviceId) {
        debug!("remove binding {}", id);

        if let Err(e) = self.disable(id) {
            debug!("{} not disabled: {}", id, e);
        }

        let Some(device) = self.devices.get_mut(id) else {
            return;
        };

        if device.powered {
            let service_type = device.service_type();
            device.powered = false;
            device.powered_pending = false;
            device.remove_all_networks();
            self.refresh_connected(service_type);
            let devices = &self.devices;
            if let Err(e) = self
                .technologies
                .disable_device(id, |d| devices.get(d).map_or(false, Device::blocked))
            {
                debug!("{}: {}", id, e);
            }
        }

        if let Err(e) = self.technologies.remove_device(id) {
            debug!("{}: {}", id, e);
        }

        if let Some(device) = self.devices.get_mut(id) {
            if let Some(driver) = device.driver.clone() {
                driver.remove(device);
            }
            device.driver = None;
            device.scan.clear();
        }
    }

    /// Register a device driver and offer it every unbound device
    pub fn register_device_driver(&mut self, driver: Arc<dyn DeviceDriver>) -> NetcoreResult<()> {
        self.device_drivers.insert(Arc::clone(&driver))?;

        for id in self.devices.ids() {
            let Some(device) = self.devices.get_mut(id) else {
                continue;
            };

            if !device.registered
                || device.has_driver()
                || !matches_device(&*driver, device.device_type)
            {
                continue;
            }

            if let Err(e) = driver.probe(device) {
                debug!("driver {} declined {}: {}", driver.name(), id, e);
                continue;
            }

            device.driver = Some(Arc::clone(&driver));
            self.setup_device(id);
        }

        Ok(())
    }

    /// Remove a device driver, releasing every device bound to it
    pub fn unregister_device_driver(&mut self, name: &str) -> Option<Arc<dyn DeviceDriver>> {
        let driver = self.device_drivers.remove(name)?;

        let bound: Vec<DeviceId> = self
            .devices
            .iter()
            .filter(|d| d.driver_name() == Some(name))
            .map(Device::id)
            .collect();

        for id in bound {
            self.remove_binding(id);
        }

        Some(driver)
    }

    pub fn device_driver_names(&self) -> Vec<String> {
        self.device_drivers.names()
    }

    /// Unregister every device, for shutdown
    pub fn shutdown(&mut self) {
        for id in self.devices.ids() {
            if let Err(e) = self.destroy_device(id) {
                warn!("Failed to release {}: {}", id, e);
            }
        }
    }
}
