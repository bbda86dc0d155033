//! Scanning, disconnect handling and network bookkeeping

use super::NetCore;
use crate::device::Network;
use crate::driver::DriverCapabilities;
use crate::error::{NetcoreError, NetcoreResult};
use crate::notifier::CoreEvent;
use crate::types::{Completion, DeviceId, ServiceType};
use tokio::time::Instant;
use tracing::{debug, warn};

impl NetCore {
    /// Scan now and restart the periodic timer
    pub fn scan(&mut self, id: DeviceId) -> NetcoreResult<Completion> {
        let now = Instant::now();
        let device = self.devices.device_mut(id)?;

        let driver = device
            .driver_with(DriverCapabilities::SCAN)
            .ok_or_else(|| NetcoreError::NotSupported(format!("{} cannot scan", id)))?;

        if !device.powered {
            return Err(NetcoreError::LinkBlocked(format!("{} is not powered", id)));
        }

        let count = device.network_count();
        device.scan.reset(count, now);

        driver.scan(device)
    }

    /// Restart the periodic scan timer
    pub fn schedule_scan(&mut self, id: DeviceId) -> NetcoreResult<()> {
        let now = Instant::now();
        let device = self.devices.device_mut(id)?;
        let count = device.network_count();
        device.scan.reset(count, now);
        Ok(())
    }

    /// Driver report that a scan started or finished
    ///
    /// Starting marks every network not in use as unavailable; the driver
    /// re-marks what it still sees. Finishing drops whatever stayed
    /// unavailable and asks services to re-evaluate auto-connect.
    pub fn set_scanning(&mut self, id: DeviceId, scanning: bool) -> NetcoreResult<()> {
        let now = Instant::now();
        let device = self.devices.device_mut(id)?;
        debug!("{} scanning {}", id, scanning);

        if !device.can_scan() {
            return Err(NetcoreError::InvalidArgument(format!("{} cannot scan", id)));
        }

        if device.scanning == scanning {
            return Err(NetcoreError::AlreadyDone(format!(
                "{} scanning already {}",
                id, scanning
            )));
        }

        device.scanning = scanning;

        if scanning {
            let count = device.network_count();
            device.scan.reset(count, now);
            device.mark_networks_unavailable();
            return Ok(());
        }

        let removed = device.cleanup_networks();
        debug!("{} removed {} stale networks", id, removed);

        self.notifier.emit(CoreEvent::AutoConnectRequested);
        Ok(())
    }

    /// Abort a scan, keeping every known network
    pub fn reset_scanning(&mut self, id: DeviceId) -> NetcoreResult<()> {
        let device = self.devices.device_mut(id)?;
        device.scanning = false;
        device.mark_networks_available();
        Ok(())
    }

    /// Track loss of connectivity; a disconnected device rescans quickly
    pub fn set_disconnected(&mut self, id: DeviceId, disconnected: bool) -> NetcoreResult<()> {
        let now = Instant::now();
        let device = self.devices.device_mut(id)?;
        debug!("{} disconnected {}", id, disconnected);

        if device.disconnected == disconnected {
            return Err(NetcoreError::AlreadyDone(format!(
                "{} disconnected already {}",
                id, disconnected
            )));
        }

        device.disconnected = disconnected;

        if disconnected {
            device.scan.force(now);
            device.scan.reset_backoff();
        }

        Ok(())
    }

    /// Disconnect every network of the device
    ///
    /// Networks still connecting are left alone so the attempt in flight
    /// keeps its network.
    pub fn disconnect(&mut self, id: DeviceId) -> NetcoreResult<()> {
        debug!("disconnect {}", id);

        match self.set_disconnected(id, true) {
            Ok(()) | Err(NetcoreError::AlreadyDone(_)) => {}
            Err(e) => return Err(e),
        }

        let device = self.devices.device_mut(id)?;
        let mut disconnected = Vec::new();

        for network in device.networks.values_mut() {
            if network.connecting() {
                warn!(
                    "Skipping disconnect of {}, network is connecting.",
                    network.identifier()
                );
                continue;
            }

            if network.connected() {
                disconnected.push(network.identifier().to_string());
            }
            network.disconnect();
        }

        if let Some(current) = device.network.as_deref() {
            if disconnected.iter().any(|n| n == current) {
                device.network = None;
            }
        }

        for network in disconnected {
            self.notifier.emit(CoreEvent::NetworkDisconnected { device: id, network });
        }

        let service_type = device.service_type();
        self.refresh_connected(service_type);
        Ok(())
    }

    /// Scan every wifi or wimax device
    pub fn request_scan(&mut self, service_type: ServiceType) -> NetcoreResult<()> {
        match service_type {
            ServiceType::Wifi | ServiceType::Wimax => {}
            _ => return Ok(()),
        }

        for id in self.devices.ids_for_technology(service_type) {
            match self.scan(id) {
                Ok(_) => {}
                Err(NetcoreError::NotSupported(_)) | Err(NetcoreError::LinkBlocked(_)) => {
                    debug!("{} skipped", id)
                }
                Err(e) if e.is_benign() => {}
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// Fire expired scan timers
    ///
    /// Returns the number of scans triggered. A device that lost its driver
    /// cancels its timer instead.
    pub fn run_due_scans(&mut self, now: Instant) -> usize {
        let mut fired = 0;

        for id in self.devices.due_scans(now) {
            let Some(device) = self.devices.get_mut(id) else {
                continue;
            };

            if !device.has_driver() {
                debug!("{} lost its driver, cancelling scan timer", id);
                device.scan.clear();
                continue;
            }

            device.scan.rearm(now);

            if let Some(driver) = device.driver_with(DriverCapabilities::SCAN) {
                fired += 1;
                if let Err(e) = driver.scan(device) {
                    if !e.is_benign() {
                        debug!("{} periodic scan: {}", id, e);
                    }
                }
            }
        }

        fired
    }

    /// Earliest pending scan timer
    pub fn next_scan_deadline(&self) -> Option<Instant> {
        self.devices.next_scan_deadline()
    }

    pub fn add_network(&mut self, id: DeviceId, network: Network) -> NetcoreResult<()> {
        debug!("{} add network {}", id, network.identifier());
        self.devices.device_mut(id)?.add_network(network)
    }

    pub fn get_network(&self, id: DeviceId, identifier: &str) -> Option<&Network> {
        self.devices.get(id)?.network(identifier)
    }

    pub fn remove_network(&mut self, id: DeviceId, identifier: &str) -> NetcoreResult<Option<Network>> {
        let device = self.devices.device_mut(id)?;
        let removed = device.remove_network(identifier);
        let service_type = device.service_type();
        self.refresh_connected(service_type);
        Ok(removed)
    }

    pub fn remove_all_networks(&mut self, id: DeviceId) -> NetcoreResult<()> {
        let device = self.devices.device_mut(id)?;
        device.remove_all_networks();
        let service_type = device.service_type();
        self.refresh_connected(service_type);
        Ok(())
    }

    /// Select the network the device is connected through
    pub fn set_network(&mut self, id: DeviceId, identifier: Option<&str>) -> NetcoreResult<()> {
        self.devices.device_mut(id)?.set_network(identifier)
    }

    /// Driver report of a network availability change
    pub fn set_network_available(&mut self, id: DeviceId, identifier: &str, available: bool) -> NetcoreResult<()> {
        self.network_mut(id, identifier)?.set_available(available);
        Ok(())
    }

    pub fn set_network_connecting(&mut self, id: DeviceId, identifier: &str, connecting: bool) -> NetcoreResult<()> {
        self.network_mut(id, identifier)?.set_connecting(connecting);
        Ok(())
    }

    /// Driver report of a network connection change; also moves the
    /// technology between enabled and connected
    pub fn set_network_connected(&mut self, id: DeviceId, identifier: &str, connected: bool) -> NetcoreResult<()> {
        self.network_mut(id, identifier)?.set_connected(connected);

        let device = self.devices.device_mut(id)?;
        if connected {
            device.set_network(Some(identifier))?;
        } else if device.current_network() == Some(identifier) {
            device.network = None;
            self.notifier.emit(CoreEvent::NetworkDisconnected {
                device: id,
                network: identifier.to_string(),
            });
        }

        let service_type = device.service_type();
        self.refresh_connected(service_type);
        Ok(())
    }

    fn network_mut(&mut self, id: DeviceId, identifier: &str) -> NetcoreResult<&mut Network> {
        self.devices
            .device_mut(id)?
            .network_mut(identifier)
            .ok_or_else(|| NetcoreError::NoSuchEntity(format!("Network {} not found", identifier)))
    }

    /// Recompute whether any device of the technology is connected
    pub(super) fn refresh_connected(&mut self, service_type: ServiceType) {
        if self.technologies.find(service_type).is_none() {
            return;
        }

        let connected = self
            .devices
            .iter()
            .filter(|d| d.service_type() == service_type)
            .any(|d| d.networks().any(|n| n.connected()));

        if let Err(e) = self.technologies.set_connected(service_type, connected) {
            debug!("{}: {}", service_type, e);
        }
    }
}
