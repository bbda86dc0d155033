//! Device set ownership

use super::Device;
use crate::error::{NetcoreError, NetcoreResult};
use crate::filter::DeviceFilter;
use crate::types::{DeviceId, DeviceType, ServiceType};
use std::collections::BTreeMap;
use tokio::time::Instant;
use tracing::debug;

/// Owns every discovered device
pub struct DeviceManager {
    devices: BTreeMap<DeviceId, Device>,
    next_id: u32,
    filter: DeviceFilter,
    wifi_scan_interval: u16,
}

impl DeviceManager {
    /// `wifi_scan_interval` is the background scan interval given to new
    /// wifi devices, 0 disables background scanning
    pub fn new(filter: DeviceFilter, wifi_scan_interval: u16) -> Self {
        Self {
            devices: BTreeMap::new(),
            next_id: 1,
            filter,
            wifi_scan_interval,
        }
    }

    /// Allocate a device; it is not registered until probed
    pub fn create(&mut self, ident: &str, device_type: DeviceType) -> NetcoreResult<DeviceId> {
        if self.next_id == u32::MAX {
            return Err(NetcoreError::ResourceExhausted(
                "Device identifiers exhausted".to_string(),
            ));
        }

        let id = DeviceId(self.next_id);
        self.next_id += 1;

        let scan_interval = match device_type {
            DeviceType::Wifi => self.wifi_scan_interval,
            _ => 0,
        };

        debug!("create {} ident {} type {:?}", id, ident, device_type);
        self.devices
            .insert(id, Device::new(id, ident, device_type, scan_interval));
        Ok(id)
    }

    /// Release a device
    pub fn remove(&mut self, id: DeviceId) -> Option<Device> {
        self.devices.remove(&id)
    }

    pub fn get(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(&id)
    }

    pub fn get_mut(&mut self, id: DeviceId) -> Option<&mut Device> {
        self.devices.get_mut(&id)
    }

    pub fn device(&self, id: DeviceId) -> NetcoreResult<&Device> {
        self.get(id)
            .ok_or_else(|| NetcoreError::NoSuchEntity(format!("Device {} not found", id)))
    }

    pub fn device_mut(&mut self, id: DeviceId) -> NetcoreResult<&mut Device> {
        self.devices
            .get_mut(&id)
            .ok_or_else(|| NetcoreError::NoSuchEntity(format!("Device {} not found", id)))
    }

    /// Identifiers in creation order
    pub fn ids(&self) -> Vec<DeviceId> {
        self.devices.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn find_by_index(&self, index: u32) -> Option<DeviceId> {
        self.iter().find(|d| d.index() == Some(index)).map(Device::id)
    }

    pub fn find_by_interface(&self, interface: &str) -> Option<DeviceId> {
        self.iter()
            .find(|d| d.interface() == Some(interface))
            .map(Device::id)
    }

    /// First device grouped under `service_type`
    pub fn find_by_service_type(&self, service_type: ServiceType) -> Option<DeviceId> {
        self.iter()
            .find(|d| d.service_type() == service_type)
            .map(Device::id)
    }

    /// Devices a per-technology request applies to
    ///
    /// Devices without a service type of their own are always included.
    pub fn ids_for_technology(&self, service_type: ServiceType) -> Vec<DeviceId> {
        self.iter()
            .filter(|d| {
                let own = d.service_type();
                own == ServiceType::Unknown || own == service_type
            })
            .map(Device::id)
            .collect()
    }

    pub fn is_filtered(&self, devname: &str) -> bool {
        self.filter.is_filtered(devname)
    }

    /// Earliest armed scan timer across all devices
    pub fn next_scan_deadline(&self) -> Option<Instant> {
        self.iter()
            .filter_map(|d| d.scan.timer())
            .map(|t| t.deadline)
            .min()
    }

    /// Devices whose scan timer has expired
    pub fn due_scans(&self, now: Instant) -> Vec<DeviceId> {
        self.iter()
            .filter(|d| d.scan.is_due(now))
            .map(Device::id)
            .collect()
    }
}
