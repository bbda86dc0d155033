//! Device power state machine
//!
//! `powered_pending` records the power state last requested from the driver
//! and `powered` the state the driver confirmed. They differ only while a
//! driver operation returned [`Completion::Pending`]; the driver then calls
//! [`NetCore::set_powered`] with the outcome.

use super::NetCore;
use crate::device::Device;
use crate::driver::DriverCapabilities;
use crate::error::{NetcoreError, NetcoreResult};
use crate::notifier::CoreEvent;
use crate::types::{Completion, DeviceId, ServiceType};
use tokio::time::Instant;
use tracing::{debug, info, warn};

impl NetCore {
    /// Power a device on
    pub fn enable(&mut self, id: DeviceId) -> NetcoreResult<Completion> {
        let device = self.devices.device_mut(id)?;
        debug!("enable {} blocked {}", id, device.blocked);

        let driver = device.driver_with(DriverCapabilities::ENABLE).ok_or_else(|| {
            NetcoreError::NotSupported(format!("{} cannot be enabled", id))
        })?;

        if device.powered_pending {
            return Err(if device.powered {
                NetcoreError::AlreadyDone(format!("{} already enabled", id))
            } else {
                NetcoreError::AlreadyInProgress(format!("{} is being enabled", id))
            });
        }

        if device.blocked {
            return Err(NetcoreError::LinkBlocked(format!("{} is blocked", id)));
        }

        if device.disconnected {
            device.disconnected = false;
        }
        device.scanning = false;

        match driver.enable(device) {
            Ok(Completion::Pending) => {
                device.powered_pending = true;
                device.offline_mode = false;
                self.leave_offline_mode();
                Ok(Completion::Pending)
            }
            Ok(Completion::Done) | Err(NetcoreError::AlreadyDone(_)) => {
                device.powered_pending = true;
                device.powered = true;
                device.offline_mode = false;
                self.leave_offline_mode();

                if let Err(e) = self.technologies.enable_device(id) {
                    debug!("{}: {}", id, e);
                }
                Ok(Completion::Done)
            }
            Err(e) => Err(e),
        }
    }

    /// Power a device off
    pub fn disable(&mut self, id: DeviceId) -> NetcoreResult<Completion> {
        let device = self.devices.device_mut(id)?;
        debug!("disable {}", id);

        let driver = device.driver_with(DriverCapabilities::DISABLE).ok_or_else(|| {
            NetcoreError::NotSupported(format!("{} cannot be disabled", id))
        })?;

        if !device.powered {
            return Err(NetcoreError::LinkBlocked(format!("{} is not powered", id)));
        }

        if !device.powered_pending {
            return Err(NetcoreError::AlreadyInProgress(format!("{} is being disabled", id)));
        }

        device.reconnect = false;
        device.scan.clear();

        if let Some(identifier) = device.network.clone() {
            if let Some(network) = device.networks.get_mut(&identifier) {
                network.disconnect();
                self.notifier.emit(CoreEvent::NetworkDisconnected {
                    device: id,
                    network: identifier,
                });
            }
        }

        let service_type = device.service_type();
        let result = match driver.disable(device) {
            Ok(Completion::Pending) => {
                device.powered_pending = false;
                Ok(Completion::Pending)
            }
            Ok(Completion::Done) | Err(NetcoreError::AlreadyDone(_)) => {
                device.remove_all_networks();
                device.powered_pending = false;
                device.powered = false;
                self.technology_disable_device(id);
                Ok(Completion::Done)
            }
            Err(e) => Err(e),
        };

        self.refresh_connected(service_type);
        result
    }

    fn technology_disable_device(&mut self, id: DeviceId) {
        let devices = &self.devices;
        if let Err(e) = self
            .technologies
            .disable_device(id, |d| devices.get(d).map_or(false, Device::blocked))
        {
            debug!("{}: {}", id, e);
        }
    }

    /// Enable or disable without touching the confirmed state
    fn request_power(&mut self, id: DeviceId, powered: bool) -> NetcoreResult<Completion> {
        debug!("{} powered {}", id, powered);
        if powered {
            self.enable(id)
        } else {
            self.disable(id)
        }
    }

    /// Set the confirmed power state
    ///
    /// Used for user requests and as the completion of a pending driver
    /// operation. Offline mode wins over a power up: the device is switched
    /// back off in a second step.
    pub fn set_powered(&mut self, id: DeviceId, powered: bool) -> NetcoreResult<()> {
        self.apply_powered(id, powered)?;

        let device = self.devices.device(id)?;
        if powered && device.offline_mode {
            debug!("{} offline mode wins", id);
            return self.apply_powered(id, false);
        }

        if !powered {
            return Ok(());
        }

        let now = Instant::now();
        let device = self.devices.device_mut(id)?;
        let count = device.network_count();
        device.scan.reset(count, now);

        if let Some(driver) = device.driver_with(DriverCapabilities::SCAN) {
            if let Err(e) = driver.scan(device) {
                debug!("{} initial scan: {}", id, e);
            }
        }

        Ok(())
    }

    fn apply_powered(&mut self, id: DeviceId, powered: bool) -> NetcoreResult<()> {
        let device = self.devices.device_mut(id)?;
        debug!("{} set powered {}", id, powered);

        if device.powered == powered {
            device.powered_pending = powered;
            return Err(NetcoreError::AlreadyDone(format!(
                "{} already {}",
                id,
                if powered { "powered" } else { "off" }
            )));
        }

        let notified = match self.request_power(id, powered) {
            Ok(Completion::Done) => true,
            Ok(Completion::Pending) => false,
            Err(e) if e.is_benign() => false,
            Err(e) => return Err(e),
        };

        let device = self.devices.device_mut(id)?;
        device.powered = powered;
        device.powered_pending = powered;
        if !powered {
            let service_type = device.service_type();
            device.remove_all_networks();
            self.refresh_connected(service_type);
        }

        if notified {
            return Ok(());
        }

        if powered {
            if let Err(e) = self.technologies.enable_device(id) {
                debug!("{}: {}", id, e);
            }
        } else {
            self.technology_disable_device(id);
        }

        Ok(())
    }

    /// Follow a kill-switch: force off when blocked, restore the persistent
    /// choice when released
    pub fn set_blocked(&mut self, id: DeviceId, blocked: bool) -> NetcoreResult<()> {
        let device = self.devices.device_mut(id)?;
        debug!("{} blocked {}", id, blocked);

        device.blocked = blocked;
        if device.offline_mode {
            return Ok(());
        }

        info!(
            "{} {{rfkill}} blocked {}",
            device.interface().unwrap_or("<unnamed>"),
            blocked
        );

        let powered = !blocked && device.powered_persistent;
        self.request_power(id, powered).map(|_| ())
    }

    pub fn blocked(&self, id: DeviceId) -> bool {
        self.devices.get(id).map_or(false, Device::blocked)
    }

    /// Enable and remember the choice; leaves offline mode
    pub fn enable_persistent(&mut self, id: DeviceId) -> NetcoreResult<Completion> {
        debug!("enable persistent {}", id);
        let was_offline = self.offline_mode;

        self.devices.device_mut(id)?.powered_persistent = true;
        self.save_device(id);

        let result = self.enable(id);
        if result.is_ok() {
            self.devices.device_mut(id)?.offline_mode = false;
            self.leave_offline_mode();
            if was_offline {
                self.save_offline_mode();
            }
        }

        result
    }

    /// Disable and remember the choice
    pub fn disable_persistent(&mut self, id: DeviceId) -> NetcoreResult<Completion> {
        debug!("disable persistent {}", id);

        self.devices.device_mut(id)?.powered_persistent = false;
        self.save_device(id);

        self.disable(id)
    }

    /// Clear the global flag without touching devices
    fn leave_offline_mode(&mut self) {
        if !self.offline_mode {
            return;
        }

        self.offline_mode = false;
        self.notifier.emit(CoreEvent::OfflineModeChanged(false));
    }

    /// Apply global offline mode to every device
    pub fn set_offline_mode(&mut self, offline: bool) -> NetcoreResult<()> {
        info!("offline mode {}", offline);

        let changed = self.offline_mode != offline;
        self.offline_mode = offline;

        for id in self.devices.ids() {
            let Some(device) = self.devices.get_mut(id) else {
                continue;
            };

            device.offline_mode = offline;
            if device.blocked {
                continue;
            }

            let mut powered = !offline;
            if device.powered == powered {
                continue;
            }
            if !device.powered_persistent {
                powered = false;
            }
            if device.powered == powered {
                continue;
            }

            if let Err(e) = self.request_power(id, powered) {
                if !e.is_benign() {
                    warn!("{} offline mode {}: {}", id, offline, e);
                }
            }
        }

        self.save_offline_mode();
        if changed {
            self.notifier.emit(CoreEvent::OfflineModeChanged(offline));
        }

        Ok(())
    }

    /// Persistently enable every device of a technology
    pub fn enable_technology(&mut self, service_type: ServiceType) -> NetcoreResult<()> {
        self.set_technology(service_type, true)
    }

    /// Persistently disable every device of a technology
    pub fn disable_technology(&mut self, service_type: ServiceType) -> NetcoreResult<()> {
        self.set_technology(service_type, false)
    }

    fn set_technology(&mut self, service_type: ServiceType, enable: bool) -> NetcoreResult<()> {
        debug!("technology {} enable {}", service_type, enable);

        match service_type {
            ServiceType::Ethernet
            | ServiceType::Wifi
            | ServiceType::Wimax
            | ServiceType::Bluetooth
            | ServiceType::Cellular => {}
            _ => return Ok(()),
        }

        for id in self.devices.ids_for_technology(service_type) {
            let result = if enable {
                self.enable_persistent(id)
            } else {
                self.disable_persistent(id)
            };

            match result {
                Ok(_) => {}
                Err(e) if e.is_benign() => debug!("{}: {}", id, e),
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }
}
