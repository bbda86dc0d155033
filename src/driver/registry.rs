//! Priority ordered driver registry

use super::traits::Prioritized;
use crate::error::{NetcoreError, NetcoreResult};
use std::sync::Arc;
use tracing::info;

/// Registered drivers ordered by descending priority; equal priorities keep
/// registration order
pub struct DriverRegistry<D: ?Sized> {
    drivers: Vec<Arc<D>>,
}

impl<D: ?Sized + Prioritized> DriverRegistry<D> {
    pub fn new() -> Self {
        Self { drivers: Vec::new() }
    }

    /// Insert a driver at its priority position
    pub fn insert(&mut self, driver: Arc<D>) -> NetcoreResult<()> {
        let name = driver.driver_name().to_string();
        if self.find(&name).is_some() {
            return Err(NetcoreError::InvalidArgument(format!(
                "Driver '{}' already registered",
                name
            )));
        }

        let priority = driver.driver_priority();
        let position = self
            .drivers
            .iter()
            .position(|d| d.driver_priority() < priority)
            .unwrap_or(self.drivers.len());

        info!("Registering driver {} (priority {})", name, priority);
        self.drivers.insert(position, driver);
        Ok(())
    }

    /// Remove a driver by name
    pub fn remove(&mut self, name: &str) -> Option<Arc<D>> {
        let position = self.drivers.iter().position(|d| d.driver_name() == name)?;
        info!("Unregistering driver {}", name);
        Some(self.drivers.remove(position))
    }

    pub fn find(&self, name: &str) -> Option<&Arc<D>> {
        self.drivers.iter().find(|d| d.driver_name() == name)
    }

    /// Drivers in probe order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<D>> {
        self.drivers.iter()
    }

    /// Owned copy of the probe order, safe to hold while mutating entities
    pub fn snapshot(&self) -> Vec<Arc<D>> {
        self.drivers.clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.drivers.iter().map(|d| d.driver_name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

impl<D: ?Sized + Prioritized> Default for DriverRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}
