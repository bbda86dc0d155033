//! Technology ownership, membership and kill-switch aggregation
//!
//! Every technology is reference counted. Each member device, each
//! kill-switch and each interface holds one reference, plus any taken
//! explicitly through [`TechnologyManager::get`]. The technology is destroyed
//! when the last reference is put.
//!
//! The aggregate blocked state is edge triggered on the number of blocking
//! switches: the first blocking switch blocks the technology, the last
//! unblocking one releases it. Transitions are returned to the caller as
//! [`RfkillTransition`] so member devices can follow.

use super::{BlockTransition, RfkillSwitch, Technology};
use crate::driver::traits::matches_technology;
use crate::driver::{DriverCapabilities, DriverRegistry, TechnologyDriver};
use crate::error::{NetcoreError, NetcoreResult};
use crate::notifier::{CoreEvent, Notifier};
use crate::types::{DeviceId, ServiceType, TechnologyState};
use crate::validation::{validate_regdom, validate_tethering_identifier, validate_tethering_passphrase};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Aggregate block state change of a technology
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfkillTransition {
    pub technology: ServiceType,
    pub blocked: bool,
    /// Members at the time of the transition
    pub devices: Vec<DeviceId>,
}

pub struct TechnologyManager {
    technologies: BTreeMap<ServiceType, Technology>,
    rfkill_table: HashMap<u32, ServiceType>,
    device_table: HashMap<DeviceId, ServiceType>,
    drivers: DriverRegistry<dyn TechnologyDriver>,
    notifier: Notifier,
}

fn update_state(notifier: &Notifier, technology: &mut Technology, state: TechnologyState) {
    if technology.state == state {
        return;
    }

    debug!(
        "technology {} state {:?} -> {:?}",
        technology.service_type, technology.state, state
    );
    technology.state = state;
    notifier.emit(CoreEvent::TechnologyStateChanged {
        technology: technology.service_type,
        state,
    });
}

/// State once no kill-switch blocks the technology
fn unblocked_state(technology: &Technology) -> TechnologyState {
    if technology.enabled > 0 {
        TechnologyState::Enabled
    } else if technology.devices.is_empty() {
        TechnologyState::Offline
    } else {
        TechnologyState::Available
    }
}

fn not_found(service_type: ServiceType) -> NetcoreError {
    NetcoreError::NoSuchEntity(format!("Technology {} not found", service_type))
}

impl TechnologyManager {
    pub fn new(notifier: Notifier) -> Self {
        Self {
            technologies: BTreeMap::new(),
            rfkill_table: HashMap::new(),
            device_table: HashMap::new(),
            drivers: DriverRegistry::new(),
            notifier,
        }
    }

    pub fn find(&self, service_type: ServiceType) -> Option<&Technology> {
        self.technologies.get(&service_type)
    }

    pub fn find_mut(&mut self, service_type: ServiceType) -> Option<&mut Technology> {
        self.technologies.get_mut(&service_type)
    }

    /// Types of all live technologies
    pub fn list(&self) -> Vec<ServiceType> {
        self.technologies.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Technology> {
        self.technologies.values()
    }

    /// Member devices of a technology
    pub fn members(&self, service_type: ServiceType) -> Vec<DeviceId> {
        self.find(service_type)
            .map(|t| t.devices.clone())
            .unwrap_or_default()
    }

    /// Technology a device was added to
    pub fn technology_of(&self, device: DeviceId) -> Option<ServiceType> {
        self.device_table.get(&device).copied()
    }

    pub fn driver_names(&self) -> Vec<String> {
        self.drivers.names()
    }

    fn technologies_changed(&self) {
        self.notifier.emit(CoreEvent::TechnologiesChanged {
            technologies: self.list(),
        });
    }

    /// Take a reference, creating and probing the technology on first use
    pub fn get(&mut self, service_type: ServiceType) -> NetcoreResult<()> {
        if let Some(technology) = self.technologies.get_mut(&service_type) {
            technology.refcount += 1;
            debug!("technology {} refcount {}", service_type, technology.refcount);
            return Ok(());
        }

        if service_type.as_str().is_none() {
            return Err(NetcoreError::NoSuchEntity(format!(
                "No technology for service type {:?}",
                service_type
            )));
        }

        let mut technology = Technology::new(service_type);
        for driver in self.drivers.snapshot() {
            if !matches_technology(&*driver, service_type) {
                continue;
            }

            debug!("probing driver {} for {}", driver.name(), service_type);
            match driver.probe(&mut technology) {
                Ok(()) => {
                    technology.driver = Some(driver);
                    break;
                }
                Err(e) => debug!("driver {} declined {}: {}", driver.name(), service_type, e),
            }
        }

        info!("Adding technology {}", service_type);
        self.technologies.insert(service_type, technology);
        self.technologies_changed();
        Ok(())
    }

    /// Release a reference, destroying the technology on the last one
    pub fn put(&mut self, service_type: ServiceType) {
        let Some(technology) = self.technologies.get_mut(&service_type) else {
            warn!("put on missing technology {}", service_type);
            return;
        };

        technology.refcount = technology.refcount.saturating_sub(1);
        debug!("technology {} refcount {}", service_type, technology.refcount);
        if technology.refcount > 0 {
            return;
        }

        if let Some(mut technology) = self.technologies.remove(&service_type) {
            if let Some(driver) = technology.driver.take() {
                driver.remove(&mut technology);
            }
        }

        info!("Removing technology {}", service_type);
        self.technologies_changed();
    }

    /// Reference held by a collaborator outside the device and rfkill tables
    pub fn technology_ref(&mut self, service_type: ServiceType) -> NetcoreResult<()> {
        self.get(service_type)
    }

    pub fn technology_unref(&mut self, service_type: ServiceType) {
        self.put(service_type)
    }

    /// Bind a driver and offer it every unbound technology
    pub fn register_driver(&mut self, driver: Arc<dyn TechnologyDriver>) -> NetcoreResult<()> {
        self.drivers.insert(Arc::clone(&driver))?;

        for technology in self.technologies.values_mut() {
            if technology.driver.is_some() || !matches_technology(&*driver, technology.service_type) {
                continue;
            }

            if driver.probe(technology).is_ok() {
                debug!("driver {} bound to {}", driver.name(), technology.service_type);
                technology.driver = Some(Arc::clone(&driver));
            }
        }

        Ok(())
    }

    /// Remove a driver, releasing every technology bound to it
    pub fn unregister_driver(&mut self, name: &str) -> Option<Arc<dyn TechnologyDriver>> {
        let driver = self.drivers.remove(name)?;

        for technology in self.technologies.values_mut() {
            if technology.driver_name() != Some(name) {
                continue;
            }

            driver.remove(technology);
            technology.driver = None;
        }

        Some(driver)
    }

    /// Group a device under its technology
    pub fn add_device(&mut self, device: DeviceId, service_type: ServiceType) -> NetcoreResult<()> {
        debug!("device {} type {}", device, service_type);

        if self.device_table.contains_key(&device) {
            return Err(NetcoreError::InvalidArgument(format!(
                "Device {} already belongs to a technology",
                device
            )));
        }

        self.get(service_type)?;
        self.notifier.emit(CoreEvent::ServiceRegistered(service_type));
        self.device_table.insert(device, service_type);

        let technology = self
            .technologies
            .get_mut(&service_type)
            .ok_or_else(|| not_found(service_type))?;

        if technology.blocked == 0 && technology.enabled == 0 {
            update_state(&self.notifier, technology, TechnologyState::Available);
        }

        technology.devices.push(device);
        Ok(())
    }

    pub fn remove_device(&mut self, device: DeviceId) -> NetcoreResult<()> {
        debug!("device {}", device);

        let service_type = self
            .device_table
            .remove(&device)
            .ok_or_else(|| NetcoreError::NoSuchEntity(format!("Device {} has no technology", device)))?;

        self.notifier.emit(CoreEvent::ServiceUnregistered(service_type));

        if let Some(technology) = self.technologies.get_mut(&service_type) {
            technology.devices.retain(|d| *d != device);
            if technology.devices.is_empty() {
                technology.enabled = 0;
                if technology.blocked == 0 {
                    update_state(&self.notifier, technology, TechnologyState::Offline);
                }
            }
        }

        self.put(service_type);
        Ok(())
    }

    /// Count a member device as powered
    pub fn enable_device(&mut self, device: DeviceId) -> NetcoreResult<()> {
        debug!("device {}", device);

        let service_type = self
            .technology_of(device)
            .ok_or_else(|| NetcoreError::NoSuchEntity(format!("Device {} has no technology", device)))?;
        let technology = self
            .technologies
            .get_mut(&service_type)
            .ok_or_else(|| not_found(service_type))?;

        if technology.blocked > 0 {
            return Err(NetcoreError::LinkBlocked(format!(
                "Technology {} is blocked",
                service_type
            )));
        }

        self.notifier.emit(CoreEvent::ServiceEnabled(service_type));

        technology.enabled += 1;
        if technology.enabled == 1 {
            update_state(&self.notifier, technology, TechnologyState::Enabled);
        }

        Ok(())
    }

    /// Count a member device as no longer powered
    ///
    /// `is_blocked` reports whether a member device is hardware blocked; once
    /// no member is powered and all of them are blocked the technology is
    /// considered blocked.
    pub fn disable_device<F>(&mut self, device: DeviceId, is_blocked: F) -> NetcoreResult<()>
    where
        F: Fn(DeviceId) -> bool,
    {
        debug!("device {}", device);

        let service_type = self
            .technology_of(device)
            .ok_or_else(|| NetcoreError::NoSuchEntity(format!("Device {} has no technology", device)))?;

        self.notifier.emit(CoreEvent::ServiceDisabled(service_type));

        let technology = self
            .technologies
            .get_mut(&service_type)
            .ok_or_else(|| not_found(service_type))?;

        if technology.enabled == 0 {
            debug!("technology {} has no enabled devices", service_type);
            return Ok(());
        }

        technology.enabled -= 1;
        if technology.enabled > 0 {
            return Ok(());
        }

        let all_blocked = !technology.devices.is_empty()
            && technology.devices.iter().all(|d| is_blocked(*d));

        let state = if technology.blocked > 0 || all_blocked {
            TechnologyState::Blocked
        } else {
            TechnologyState::Available
        };
        update_state(&self.notifier, technology, state);

        Ok(())
    }

    /// Mark an enabled technology as connected, or back
    pub fn set_connected(&mut self, service_type: ServiceType, connected: bool) -> NetcoreResult<()> {
        let technology = self
            .technologies
            .get_mut(&service_type)
            .ok_or_else(|| not_found(service_type))?;

        match (technology.state, connected) {
            (TechnologyState::Enabled, true) => {
                update_state(&self.notifier, technology, TechnologyState::Connected)
            }
            (TechnologyState::Connected, false) => {
                update_state(&self.notifier, technology, TechnologyState::Enabled)
            }
            _ => {}
        }

        Ok(())
    }

    /// Track a new kill-switch
    ///
    /// Re-adding a known index on the same technology behaves like an update;
    /// on another technology the old switch is removed first.
    pub fn add_rfkill(
        &mut self,
        index: u32,
        service_type: ServiceType,
        soft: bool,
        hard: bool,
    ) -> NetcoreResult<Vec<RfkillTransition>> {
        info!("rfkill {} type {} soft {} hard {}", index, service_type, soft, hard);

        if service_type.as_str().is_none() {
            return Err(NetcoreError::NoSuchEntity(format!(
                "No technology for rfkill {} type {:?}",
                index, service_type
            )));
        }

        let mut transitions = Vec::new();

        if let Some(existing) = self.rfkill_table.get(&index).copied() {
            if existing == service_type {
                transitions.extend(self.update_rfkill(index, soft, hard)?);
                return Ok(transitions);
            }
            transitions.extend(self.remove_rfkill(index)?);
        }

        self.get(service_type)?;
        self.rfkill_table.insert(index, service_type);

        let technology = self
            .technologies
            .get_mut(&service_type)
            .ok_or_else(|| not_found(service_type))?;

        let switch = RfkillSwitch::new(index, service_type, soft, hard);
        let blocked = switch.blocked();
        technology.rfkill.insert(index, switch);

        if blocked {
            technology.blocked += 1;
            if technology.blocked == 1 {
                update_state(&self.notifier, technology, TechnologyState::Blocked);
                transitions.push(RfkillTransition {
                    technology: service_type,
                    blocked: true,
                    devices: technology.devices.clone(),
                });
            }
        }

        Ok(transitions)
    }

    pub fn update_rfkill(&mut self, index: u32, soft: bool, hard: bool) -> NetcoreResult<Option<RfkillTransition>> {
        debug!("rfkill {} soft {} hard {}", index, soft, hard);

        let service_type = self
            .rfkill_table
            .get(&index)
            .copied()
            .ok_or_else(|| NetcoreError::NoSuchEntity(format!("rfkill {} not found", index)))?;
        let technology = self
            .technologies
            .get_mut(&service_type)
            .ok_or_else(|| not_found(service_type))?;
        let switch = technology
            .rfkill
            .get_mut(&index)
            .ok_or_else(|| NetcoreError::NoSuchEntity(format!("rfkill {} not found", index)))?;

        let transition = switch.update(soft, hard);
        let blocked = match transition {
            BlockTransition::Unchanged => return Ok(None),
            BlockTransition::Blocked => {
                technology.blocked += 1;
                if technology.blocked > 1 {
                    return Ok(None);
                }
                update_state(&self.notifier, technology, TechnologyState::Blocked);
                true
            }
            BlockTransition::Unblocked => {
                technology.blocked = technology.blocked.saturating_sub(1);
                if technology.blocked > 0 {
                    return Ok(None);
                }
                let state = unblocked_state(technology);
                update_state(&self.notifier, technology, state);
                false
            }
        };

        info!("technology {} {}", service_type, if blocked { "blocked" } else { "unblocked" });
        Ok(Some(RfkillTransition {
            technology: service_type,
            blocked,
            devices: technology.devices.clone(),
        }))
    }

    pub fn remove_rfkill(&mut self, index: u32) -> NetcoreResult<Option<RfkillTransition>> {
        info!("rfkill {} removed", index);

        let service_type = self
            .rfkill_table
            .remove(&index)
            .ok_or_else(|| NetcoreError::NoSuchEntity(format!("rfkill {} not found", index)))?;

        let mut transition = None;
        if let Some(technology) = self.technologies.get_mut(&service_type) {
            let was_blocking = technology
                .rfkill
                .remove(&index)
                .map_or(false, |s| s.blocked());

            if was_blocking && technology.blocked > 0 {
                technology.blocked -= 1;
                if technology.blocked == 0 {
                    let state = unblocked_state(technology);
                    update_state(&self.notifier, technology, state);
                    transition = Some(RfkillTransition {
                        technology: service_type,
                        blocked: false,
                        devices: technology.devices.clone(),
                    });
                }
            }
        }

        self.put(service_type);
        Ok(transition)
    }

    /// Whether any kill-switch blocks the technology
    pub fn get_blocked(&self, service_type: ServiceType) -> bool {
        self.find(service_type).map_or(false, Technology::is_blocked)
    }

    /// An interface of `service_type` appeared; holds a technology reference
    pub fn add_interface(
        &mut self,
        service_type: ServiceType,
        index: u32,
        name: &str,
        ident: Option<&str>,
    ) -> NetcoreResult<()> {
        if matches!(service_type, ServiceType::Unknown | ServiceType::System) {
            return Ok(());
        }

        info!("Create interface {} [ {} ]", name, service_type);
        self.get(service_type)?;

        if let Some(technology) = self.technologies.get_mut(&service_type) {
            if let Some(driver) = technology.driver.clone() {
                driver.add_interface(technology, index, name, ident);
            }
        }

        Ok(())
    }

    pub fn remove_interface(&mut self, service_type: ServiceType, index: u32, name: &str) {
        if matches!(service_type, ServiceType::Unknown | ServiceType::System) {
            return;
        }

        info!("Remove interface {} [ {} ]", name, service_type);

        let Some(technology) = self.technologies.get_mut(&service_type) else {
            return;
        };
        if let Some(driver) = technology.driver.clone() {
            driver.remove_interface(technology, index);
        }

        self.put(service_type);
    }

    /// Driver report that tethering started or stopped
    pub fn tethering_notify(&mut self, service_type: ServiceType, enabled: bool) {
        debug!("technology {} tethering {}", service_type, enabled);

        let Some(technology) = self.technologies.get_mut(&service_type) else {
            return;
        };
        if technology.tethering == enabled {
            return;
        }

        technology.tethering = enabled;
        self.notifier.emit(CoreEvent::TetheringChanged {
            technology: service_type,
            enabled,
        });
        self.notifier.emit(if enabled {
            CoreEvent::TetheringEnabled
        } else {
            CoreEvent::TetheringDisabled
        });
    }

    /// Ask the driver to start or stop tethering over `bridge`
    pub fn set_tethering(&mut self, service_type: ServiceType, bridge: &str, enabled: bool) -> NetcoreResult<()> {
        let technology = self
            .technologies
            .get_mut(&service_type)
            .ok_or_else(|| not_found(service_type))?;

        let driver = technology
            .driver_with(DriverCapabilities::TETHERING)
            .ok_or_else(|| NetcoreError::NotSupported(format!("{} cannot tether", service_type)))?;

        let ident = technology.tethering_ident.clone();
        let passphrase = technology.tethering_passphrase.clone();

        if service_type == ServiceType::Wifi && (ident.is_none() || passphrase.is_none()) {
            return Err(NetcoreError::InvalidArgument(
                "WiFi tethering requires an identifier and a passphrase".to_string(),
            ));
        }

        driver.set_tethering(technology, ident.as_deref(), passphrase.as_deref(), bridge, enabled)
    }

    /// Apply an externally set property
    pub fn set_property(
        &mut self,
        service_type: ServiceType,
        name: &str,
        value: &Value,
        bridge: Option<&str>,
    ) -> NetcoreResult<()> {
        debug!("technology {} property {}", service_type, name);

        let technology = self
            .technologies
            .get_mut(&service_type)
            .ok_or_else(|| not_found(service_type))?;

        match name {
            "Tethering" => {
                let tethering = value.as_bool().ok_or_else(|| {
                    NetcoreError::InvalidArgument("Tethering must be a boolean".to_string())
                })?;

                if technology.tethering == tethering {
                    return Err(NetcoreError::AlreadyInProgress(format!(
                        "Tethering already {}",
                        if tethering { "enabled" } else { "disabled" }
                    )));
                }

                let bridge = bridge.ok_or_else(|| {
                    NetcoreError::NotSupported("No tethering bridge configured".to_string())
                })?;

                self.set_tethering(service_type, bridge, tethering)
            }
            "TetheringIdentifier" => {
                let ident = value.as_str().ok_or_else(|| {
                    NetcoreError::InvalidArgument("TetheringIdentifier must be a string".to_string())
                })?;

                if service_type != ServiceType::Wifi {
                    return Err(NetcoreError::NotSupported(format!(
                        "{} has no tethering identifier",
                        service_type
                    )));
                }

                validate_tethering_identifier(ident)?;
                technology.tethering_ident = Some(ident.to_string());
                Ok(())
            }
            "TetheringPassphrase" => {
                let passphrase = value.as_str().ok_or_else(|| {
                    NetcoreError::InvalidArgument("TetheringPassphrase must be a string".to_string())
                })?;

                if service_type != ServiceType::Wifi {
                    return Err(NetcoreError::NotSupported(format!(
                        "{} has no tethering passphrase",
                        service_type
                    )));
                }

                validate_tethering_passphrase(passphrase)?;
                technology.tethering_passphrase = Some(passphrase.to_string());
                Ok(())
            }
            _ => Err(NetcoreError::InvalidArgument(format!("Invalid property {}", name))),
        }
    }

    /// Request a regulatory domain change from every capable driver
    pub fn set_regdom(&mut self, alpha2: &str) -> NetcoreResult<()> {
        validate_regdom(alpha2)?;

        for technology in self.technologies.values_mut() {
            let Some(driver) = technology.driver_with(DriverCapabilities::REGDOM) else {
                continue;
            };

            if let Err(e) = driver.set_regdom(technology, alpha2) {
                warn!("{} regulatory domain {}: {}", technology.service_type, alpha2, e);
            }
        }

        Ok(())
    }

    /// Driver report of the regulatory domain outcome; `None` means failure
    pub fn regdom_notify(&mut self, service_type: ServiceType, alpha2: Option<&str>) {
        match alpha2 {
            Some(alpha2) => debug!("Regulatory domain set to {}", alpha2),
            None => error!("Failed to set regulatory domain"),
        }

        if let Some(technology) = self.technologies.get_mut(&service_type) {
            technology.regdom = alpha2.map(String::from);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::sync::broadcast::Receiver;

    struct RecordingDriver {
        name: &'static str,
        service_type: Option<ServiceType>,
        capabilities: DriverCapabilities,
        accept: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingDriver {
        fn new(name: &'static str, service_type: Option<ServiceType>, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                service_type,
                capabilities: DriverCapabilities::TETHERING | DriverCapabilities::REGDOM,
                accept: true,
                log: Arc::clone(log),
            }
        }

        fn record(&self, entry: String) {
            self.log.lock().unwrap().push(format!("{}: {}", self.name, entry));
        }
    }

    impl TechnologyDriver for RecordingDriver {
        fn name(&self) -> &str {
            self.name
        }

        fn service_type(&self) -> Option<ServiceType> {
            self.service_type
        }

        fn capabilities(&self) -> DriverCapabilities {
            self.capabilities
        }

        fn probe(&self, technology: &mut Technology) -> NetcoreResult<()> {
            self.record(format!("probe {}", technology.service_type()));
            if self.accept {
                Ok(())
            } else {
                Err(NetcoreError::NotSupported("declined".to_string()))
            }
        }

        fn remove(&self, technology: &mut Technology) {
            self.record(format!("remove {}", technology.service_type()));
        }

        fn add_interface(&self, _technology: &mut Technology, index: u32, name: &str, _ident: Option<&str>) {
            self.record(format!("add_interface {} {}", index, name));
        }

        fn remove_interface(&self, _technology: &mut Technology, index: u32) {
            self.record(format!("remove_interface {}", index));
        }

        fn set_tethering(
            &self,
            _technology: &mut Technology,
            ident: Option<&str>,
            _passphrase: Option<&str>,
            bridge: &str,
            enabled: bool,
        ) -> NetcoreResult<()> {
            self.record(format!("tethering {:?} {} {}", ident, bridge, enabled));
            Ok(())
        }

        fn set_regdom(&self, _technology: &mut Technology, alpha2: &str) -> NetcoreResult<()> {
            self.record(format!("regdom {}", alpha2));
            Ok(())
        }
    }

    fn drain_states(rx: &mut Receiver<CoreEvent>) -> Vec<TechnologyState> {
        let mut states = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(CoreEvent::TechnologyStateChanged { state, .. }) => states.push(state),
                Ok(_) => {}
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(_)) => {}
            }
        }
        states
    }

    fn state(manager: &TechnologyManager, service_type: ServiceType) -> TechnologyState {
        manager.find(service_type).unwrap().state()
    }

    #[test]
    fn test_device_membership_drives_offline_and_available() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let mut manager = TechnologyManager::new(notifier);

        manager.add_device(DeviceId(1), ServiceType::Wifi).unwrap();
        manager.add_device(DeviceId(2), ServiceType::Wifi).unwrap();
        assert_eq!(state(&manager, ServiceType::Wifi), TechnologyState::Available);
        assert_eq!(manager.find(ServiceType::Wifi).unwrap().refcount(), 2);
        assert_eq!(manager.members(ServiceType::Wifi), vec![DeviceId(1), DeviceId(2)]);

        manager.remove_device(DeviceId(1)).unwrap();
        assert_eq!(state(&manager, ServiceType::Wifi), TechnologyState::Available);

        manager.technology_ref(ServiceType::Wifi).unwrap();
        manager.remove_device(DeviceId(2)).unwrap();
        assert_eq!(state(&manager, ServiceType::Wifi), TechnologyState::Offline);

        manager.technology_unref(ServiceType::Wifi);
        assert!(manager.find(ServiceType::Wifi).is_none());

        assert_eq!(
            drain_states(&mut rx),
            vec![TechnologyState::Available, TechnologyState::Offline]
        );
    }

    #[test]
    fn test_unknown_service_type_has_no_technology() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let mut manager = TechnologyManager::new(notifier);
        assert!(matches!(
            manager.add_device(DeviceId(1), ServiceType::Unknown),
            Err(NetcoreError::NoSuchEntity(_))
        ));
        assert!(manager.technology_of(DeviceId(1)).is_none());
        assert!(manager.remove_device(DeviceId(1)).is_err());
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_enable_and_disable_counting() {
        let mut manager = TechnologyManager::new(Notifier::new());
        manager.add_device(DeviceId(1), ServiceType::Ethernet).unwrap();
        manager.add_device(DeviceId(2), ServiceType::Ethernet).unwrap();

        manager.enable_device(DeviceId(1)).unwrap();
        manager.enable_device(DeviceId(2)).unwrap();
        assert_eq!(state(&manager, ServiceType::Ethernet), TechnologyState::Enabled);
        assert_eq!(manager.find(ServiceType::Ethernet).unwrap().enabled_count(), 2);

        manager.disable_device(DeviceId(1), |_| false).unwrap();
        assert_eq!(state(&manager, ServiceType::Ethernet), TechnologyState::Enabled);

        manager.disable_device(DeviceId(2), |_| false).unwrap();
        assert_eq!(state(&manager, ServiceType::Ethernet), TechnologyState::Available);

        manager.disable_device(DeviceId(2), |_| false).unwrap();
        assert_eq!(manager.find(ServiceType::Ethernet).unwrap().enabled_count(), 0);
    }

    #[test]
    fn test_disable_with_all_members_blocked() {
        let mut manager = TechnologyManager::new(Notifier::new());
        manager.add_device(DeviceId(1), ServiceType::Wifi).unwrap();
        manager.enable_device(DeviceId(1)).unwrap();

        manager.disable_device(DeviceId(1), |_| true).unwrap();
        assert_eq!(state(&manager, ServiceType::Wifi), TechnologyState::Blocked);
    }

    #[test]
    fn test_connected_overlay() {
        let mut manager = TechnologyManager::new(Notifier::new());
        manager.add_device(DeviceId(1), ServiceType::Wifi).unwrap();

        manager.set_connected(ServiceType::Wifi, true).unwrap();
        assert_eq!(state(&manager, ServiceType::Wifi), TechnologyState::Available);

        manager.enable_device(DeviceId(1)).unwrap();
        manager.set_connected(ServiceType::Wifi, true).unwrap();
        assert_eq!(state(&manager, ServiceType::Wifi), TechnologyState::Connected);
        manager.set_connected(ServiceType::Wifi, false).unwrap();
        assert_eq!(state(&manager, ServiceType::Wifi), TechnologyState::Enabled);
    }

    #[test]
    fn test_two_switches_aggregate() {
        let mut manager = TechnologyManager::new(Notifier::new());
        manager.add_device(DeviceId(1), ServiceType::Wifi).unwrap();
        assert!(manager.add_rfkill(3, ServiceType::Wifi, false, false).unwrap().is_empty());
        assert!(manager.add_rfkill(4, ServiceType::Wifi, false, false).unwrap().is_empty());

        let blocked = manager.update_rfkill(3, true, false).unwrap().unwrap();
        assert!(blocked.blocked);
        assert_eq!(blocked.devices, vec![DeviceId(1)]);
        assert_eq!(state(&manager, ServiceType::Wifi), TechnologyState::Blocked);

        assert_eq!(manager.update_rfkill(4, false, true).unwrap(), None);
        assert_eq!(manager.find(ServiceType::Wifi).unwrap().blocked_count(), 2);

        assert_eq!(manager.update_rfkill(3, false, false).unwrap(), None);
        assert_eq!(manager.find(ServiceType::Wifi).unwrap().blocked_count(), 1);
        assert_eq!(state(&manager, ServiceType::Wifi), TechnologyState::Blocked);
        assert!(manager.get_blocked(ServiceType::Wifi));

        let unblocked = manager.update_rfkill(4, false, false).unwrap().unwrap();
        assert!(!unblocked.blocked);
        assert_eq!(unblocked.devices, vec![DeviceId(1)]);
        assert_eq!(manager.find(ServiceType::Wifi).unwrap().blocked_count(), 0);
        assert_eq!(state(&manager, ServiceType::Wifi), TechnologyState::Available);
        assert!(!manager.get_blocked(ServiceType::Wifi));
    }

    #[test]
    fn test_unchanged_switch_update_is_noop() {
        let mut manager = TechnologyManager::new(Notifier::new());
        manager.add_rfkill(1, ServiceType::Bluetooth, true, false).unwrap();
        assert_eq!(manager.update_rfkill(1, false, true).unwrap(), None);
        assert_eq!(manager.find(ServiceType::Bluetooth).unwrap().blocked_count(), 1);
        assert!(matches!(
            manager.update_rfkill(9, true, true),
            Err(NetcoreError::NoSuchEntity(_))
        ));
    }

    #[test]
    fn test_kill_index_round_trip() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let mut manager = TechnologyManager::new(notifier);
        manager.add_device(DeviceId(1), ServiceType::Wifi).unwrap();

        let transitions = manager.add_rfkill(7, ServiceType::Wifi, true, false).unwrap();
        assert_eq!(transitions.len(), 1);
        assert!(transitions[0].blocked);
        assert!(matches!(
            manager.enable_device(DeviceId(1)),
            Err(NetcoreError::LinkBlocked(_))
        ));

        let transition = manager.remove_rfkill(7).unwrap().unwrap();
        assert!(!transition.blocked);
        let technology = manager.find(ServiceType::Wifi).unwrap();
        assert_eq!(technology.blocked_count(), 0);
        assert_eq!(technology.state(), TechnologyState::Available);
        assert_eq!(technology.refcount(), 1);

        assert_eq!(
            drain_states(&mut rx),
            vec![
                TechnologyState::Available,
                TechnologyState::Blocked,
                TechnologyState::Available
            ]
        );
    }

    #[test]
    fn test_switch_holds_technology_reference() {
        let mut manager = TechnologyManager::new(Notifier::new());
        manager.add_rfkill(2, ServiceType::Bluetooth, false, false).unwrap();
        assert_eq!(state(&manager, ServiceType::Bluetooth), TechnologyState::Offline);

        manager.remove_rfkill(2).unwrap();
        assert!(manager.find(ServiceType::Bluetooth).is_none());
        assert!(manager.remove_rfkill(2).is_err());
    }

    #[test]
    fn test_readding_index_moves_switch() {
        let mut manager = TechnologyManager::new(Notifier::new());
        manager.add_rfkill(5, ServiceType::Wifi, true, false).unwrap();

        let transitions = manager.add_rfkill(5, ServiceType::Wifi, false, false).unwrap();
        assert_eq!(transitions.len(), 1);
        assert!(!transitions[0].blocked);
        assert_eq!(manager.find(ServiceType::Wifi).unwrap().refcount(), 1);

        manager.add_rfkill(5, ServiceType::Wifi, true, false).unwrap();
        let transitions = manager.add_rfkill(5, ServiceType::Bluetooth, true, false).unwrap();
        assert_eq!(transitions.len(), 2);
        assert!(!transitions[0].blocked);
        assert_eq!(transitions[1].technology, ServiceType::Bluetooth);
        assert!(manager.find(ServiceType::Wifi).is_none());
        assert!(manager.get_blocked(ServiceType::Bluetooth));
    }

    #[test]
    fn test_driver_probe_order_and_unregister() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = TechnologyManager::new(Notifier::new());

        let mut declining = RecordingDriver::new("declining", Some(ServiceType::Wifi), &log);
        declining.accept = false;
        manager.register_driver(Arc::new(declining)).unwrap();
        manager.register_driver(Arc::new(RecordingDriver::new("any", None, &log))).unwrap();

        manager.add_device(DeviceId(1), ServiceType::Wifi).unwrap();
        assert_eq!(manager.find(ServiceType::Wifi).unwrap().driver_name(), Some("any"));

        let mut wired = RecordingDriver::new("wired", Some(ServiceType::Ethernet), &log);
        wired.capabilities = DriverCapabilities::empty();
        assert!(manager.register_driver(Arc::new(wired)).is_ok());

        assert!(manager.unregister_driver("any").is_some());
        assert!(!manager.find(ServiceType::Wifi).unwrap().has_driver());
        assert!(manager.unregister_driver("any").is_none());

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "declining: probe wifi".to_string(),
                "any: probe wifi".to_string(),
                "any: remove wifi".to_string(),
            ]
        );
    }

    #[test]
    fn test_register_driver_binds_existing_technology() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = TechnologyManager::new(Notifier::new());
        manager.add_device(DeviceId(1), ServiceType::Ethernet).unwrap();

        manager
            .register_driver(Arc::new(RecordingDriver::new("wired", Some(ServiceType::Ethernet), &log)))
            .unwrap();
        assert_eq!(manager.find(ServiceType::Ethernet).unwrap().driver_name(), Some("wired"));

        assert!(manager
            .register_driver(Arc::new(RecordingDriver::new("wired", None, &log)))
            .is_err());

        manager.remove_device(DeviceId(1)).unwrap();
        assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("wired: remove ethernet"));
    }

    #[test]
    fn test_interfaces_hold_references() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = TechnologyManager::new(Notifier::new());
        manager
            .register_driver(Arc::new(RecordingDriver::new("wifi", Some(ServiceType::Wifi), &log)))
            .unwrap();

        manager.add_interface(ServiceType::System, 1, "lo", None).unwrap();
        assert!(manager.find(ServiceType::System).is_none());

        manager.add_interface(ServiceType::Wifi, 3, "wlan0", None).unwrap();
        assert_eq!(manager.find(ServiceType::Wifi).unwrap().refcount(), 1);

        manager.remove_interface(ServiceType::Wifi, 3, "wlan0");
        assert!(manager.find(ServiceType::Wifi).is_none());

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "wifi: probe wifi".to_string(),
                "wifi: add_interface 3 wlan0".to_string(),
                "wifi: remove_interface 3".to_string(),
                "wifi: remove wifi".to_string(),
            ]
        );
    }

    #[test]
    fn test_tethering_properties() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = TechnologyManager::new(Notifier::new());
        manager
            .register_driver(Arc::new(RecordingDriver::new("wifi", Some(ServiceType::Wifi), &log)))
            .unwrap();
        manager.add_device(DeviceId(1), ServiceType::Wifi).unwrap();
        let wifi = ServiceType::Wifi;

        assert!(matches!(
            manager.set_property(wifi, "Tethering", &json!("yes"), Some("tether")),
            Err(NetcoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            manager.set_property(wifi, "Tethering", &json!(false), Some("tether")),
            Err(NetcoreError::AlreadyInProgress(_))
        ));
        assert!(matches!(
            manager.set_property(wifi, "Tethering", &json!(true), None),
            Err(NetcoreError::NotSupported(_))
        ));
        assert!(matches!(
            manager.set_property(wifi, "Tethering", &json!(true), Some("tether")),
            Err(NetcoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            manager.set_property(wifi, "TetheringPassphrase", &json!("short"), None),
            Err(NetcoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            manager.set_property(wifi, "Powered", &json!(true), None),
            Err(NetcoreError::InvalidArgument(_))
        ));

        manager
            .set_property(wifi, "TetheringIdentifier", &json!("hotspot"), None)
            .unwrap();
        manager
            .set_property(wifi, "TetheringPassphrase", &json!("secret123"), None)
            .unwrap();
        manager
            .set_property(wifi, "Tethering", &json!(true), Some("tether"))
            .unwrap();

        assert_eq!(
            log.lock().unwrap().last().map(String::as_str),
            Some("wifi: tethering Some(\"hotspot\") tether true")
        );
        assert!(!manager.find(wifi).unwrap().tethering());
    }

    #[test]
    fn test_tethering_credentials_are_wifi_only() {
        let mut manager = TechnologyManager::new(Notifier::new());
        manager.add_device(DeviceId(1), ServiceType::Bluetooth).unwrap();

        assert!(matches!(
            manager.set_property(ServiceType::Bluetooth, "TetheringIdentifier", &json!("pan"), None),
            Err(NetcoreError::NotSupported(_))
        ));
        assert!(matches!(
            manager.set_property(ServiceType::Bluetooth, "Tethering", &json!(true), Some("tether")),
            Err(NetcoreError::NotSupported(_))
        ));
        assert!(matches!(
            manager.set_property(ServiceType::Cellular, "Tethering", &json!(true), Some("tether")),
            Err(NetcoreError::NoSuchEntity(_))
        ));
    }

    #[test]
    fn test_tethering_notify() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let mut manager = TechnologyManager::new(notifier);
        manager.technology_ref(ServiceType::Wifi).unwrap();
        while rx.try_recv().is_ok() {}

        manager.tethering_notify(ServiceType::Wifi, true);
        manager.tethering_notify(ServiceType::Wifi, true);
        assert!(manager.find(ServiceType::Wifi).unwrap().tethering());

        assert_eq!(
            rx.try_recv().unwrap(),
            CoreEvent::TetheringChanged {
                technology: ServiceType::Wifi,
                enabled: true
            }
        );
        assert_eq!(rx.try_recv().unwrap(), CoreEvent::TetheringEnabled);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_regdom() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = TechnologyManager::new(Notifier::new());
        manager
            .register_driver(Arc::new(RecordingDriver::new("wifi", Some(ServiceType::Wifi), &log)))
            .unwrap();
        manager.technology_ref(ServiceType::Wifi).unwrap();
        manager.technology_ref(ServiceType::Ethernet).unwrap();

        assert!(manager.set_regdom("usa").is_err());
        manager.set_regdom("DE").unwrap();
        assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("wifi: regdom DE"));

        manager.regdom_notify(ServiceType::Wifi, Some("DE"));
        assert_eq!(manager.find(ServiceType::Wifi).unwrap().regdom(), Some("DE"));
        manager.regdom_notify(ServiceType::Wifi, None);
        assert_eq!(manager.find(ServiceType::Wifi).unwrap().regdom(), None);
    }
}
