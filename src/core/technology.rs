//! Kill-switch cascades and technology level requests

use super::NetCore;
use crate::error::NetcoreResult;
use crate::technology::{RfkillTransition, TechnologyProperties};
use crate::types::ServiceType;
use serde_json::Value;
use tracing::debug;

impl NetCore {
    /// A kill-switch appeared
    pub fn add_rfkill(&mut self, index: u32, service_type: ServiceType, soft: bool, hard: bool) -> NetcoreResult<()> {
        let transitions = self.technologies.add_rfkill(index, service_type, soft, hard)?;
        for transition in transitions {
            self.apply_rfkill(transition);
        }
        Ok(())
    }

    /// A kill-switch changed state
    pub fn update_rfkill(&mut self, index: u32, soft: bool, hard: bool) -> NetcoreResult<()> {
        if let Some(transition) = self.technologies.update_rfkill(index, soft, hard)? {
            self.apply_rfkill(transition);
        }
        Ok(())
    }

    /// A kill-switch disappeared
    pub fn remove_rfkill(&mut self, index: u32) -> NetcoreResult<()> {
        if let Some(transition) = self.technologies.remove_rfkill(index)? {
            self.apply_rfkill(transition);
        }
        Ok(())
    }

    /// Push a technology block edge down to its member devices
    fn apply_rfkill(&mut self, transition: RfkillTransition) {
        debug!(
            "technology {} blocked {} cascading to {} devices",
            transition.technology,
            transition.blocked,
            transition.devices.len()
        );

        for id in transition.devices {
            if let Err(e) = self.set_blocked(id, transition.blocked) {
                debug!("{} blocked {}: {}", id, transition.blocked, e);
            }
        }
    }

    /// SetProperty on a technology, using the configured tethering bridge
    pub fn set_technology_property(&mut self, service_type: ServiceType, name: &str, value: &Value) -> NetcoreResult<()> {
        let bridge = self.config.tethering.bridge.clone();
        self.technologies
            .set_property(service_type, name, value, bridge.as_deref())
    }

    pub fn technology_properties(&self, service_type: ServiceType) -> Option<TechnologyProperties> {
        self.technologies.find(service_type).map(|t| t.properties())
    }

    pub fn tethering_notify(&mut self, service_type: ServiceType, enabled: bool) {
        self.technologies.tethering_notify(service_type, enabled);
    }

    pub fn set_regdom(&mut self, alpha2: &str) -> NetcoreResult<()> {
        self.technologies.set_regdom(alpha2)
    }

    pub fn regdom_notify(&mut self, service_type: ServiceType, alpha2: Option<&str>) {
        self.technologies.regdom_notify(service_type, alpha2);
    }
}
