//! Shared fixtures for the integration tests

#![allow(dead_code)]

use libnetcore::config::NetcoreConfig;
use libnetcore::device::Device;
use libnetcore::driver::{DeviceDriver, DriverCapabilities, TechnologyDriver};
use libnetcore::storage::MemoryStore;
use libnetcore::technology::Technology;
use libnetcore::types::{Completion, DeviceType, ServiceType};
use libnetcore::{NetCore, NetcoreError, NetcoreResult};
use std::sync::{Arc, Mutex};

pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Number of logged calls of one kind
pub fn count(log: &CallLog, call: &str) -> usize {
    log.lock()
        .unwrap()
        .iter()
        .filter(|entry| entry.split(' ').nth(1) == Some(call))
        .count()
}

pub fn new_core() -> NetCore {
    NetCore::new(NetcoreConfig::default(), Box::new(MemoryStore::new()))
}

/// Device driver that records calls; power completion is configurable
pub struct RecordingDriver {
    name: &'static str,
    device_type: Option<DeviceType>,
    capabilities: DriverCapabilities,
    completion: Mutex<Completion>,
    log: CallLog,
}

impl RecordingDriver {
    pub fn new(name: &'static str, device_type: Option<DeviceType>, log: &CallLog) -> Self {
        Self {
            name,
            device_type,
            capabilities: DriverCapabilities::ENABLE
                | DriverCapabilities::DISABLE
                | DriverCapabilities::SCAN,
            completion: Mutex::new(Completion::Done),
            log: Arc::clone(log),
        }
    }

    pub fn pending(self) -> Self {
        *self.completion.lock().unwrap() = Completion::Pending;
        self
    }

    fn record(&self, call: &str, device: &Device) -> Completion {
        self.log
            .lock()
            .unwrap()
            .push(format!("{} {} {}", self.name, call, device.id()));
        *self.completion.lock().unwrap()
    }
}

impl DeviceDriver for RecordingDriver {
    fn name(&self) -> &str {
        self.name
    }

    fn device_type(&self) -> Option<DeviceType> {
        self.device_type
    }

    fn capabilities(&self) -> DriverCapabilities {
        self.capabilities
    }

    fn probe(&self, device: &mut Device) -> NetcoreResult<()> {
        self.record("probe", device);
        Ok(())
    }

    fn remove(&self, device: &mut Device) {
        self.record("remove", device);
    }

    fn enable(&self, device: &mut Device) -> NetcoreResult<Completion> {
        Ok(self.record("enable", device))
    }

    fn disable(&self, device: &mut Device) -> NetcoreResult<Completion> {
        Ok(self.record("disable", device))
    }

    fn scan(&self, device: &mut Device) -> NetcoreResult<Completion> {
        self.record("scan", device);
        Ok(Completion::Pending)
    }
}

/// Technology driver supporting tethering and regulatory domains
pub struct SharingDriver {
    service_type: ServiceType,
    log: CallLog,
}

impl SharingDriver {
    pub fn new(service_type: ServiceType, log: &CallLog) -> Self {
        Self {
            service_type,
            log: Arc::clone(log),
        }
    }
}

impl TechnologyDriver for SharingDriver {
    fn name(&self) -> &str {
        "sharing"
    }

    fn service_type(&self) -> Option<ServiceType> {
        Some(self.service_type)
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities::TETHERING | DriverCapabilities::REGDOM
    }

    fn probe(&self, technology: &mut Technology) -> NetcoreResult<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("sharing probe {}", technology.service_type()));
        Ok(())
    }

    fn remove(&self, technology: &mut Technology) {
        self.log
            .lock()
            .unwrap()
            .push(format!("sharing remove {}", technology.service_type()));
    }

    fn set_tethering(
        &self,
        _technology: &mut Technology,
        ident: Option<&str>,
        _passphrase: Option<&str>,
        bridge: &str,
        enabled: bool,
    ) -> NetcoreResult<()> {
        self.log.lock().unwrap().push(format!(
            "sharing tethering {} {} {}",
            ident.unwrap_or("-"),
            bridge,
            enabled
        ));
        Ok(())
    }

    fn set_regdom(&self, _technology: &mut Technology, alpha2: &str) -> NetcoreResult<()> {
        if alpha2 == "XX" {
            return Err(NetcoreError::InvalidArgument("unknown country".to_string()));
        }
        self.log
            .lock()
            .unwrap()
            .push(format!("sharing regdom {}", alpha2));
        Ok(())
    }
}
