//! Change notifications
//!
//! Technology and device state changes are broadcast to subscribers
//! (the property export layer, the tethering coordinator, the service
//! layer's auto-connect logic).

use crate::types::{DeviceId, ServiceType, TechnologyState};
use tokio::sync::broadcast;
use tracing::trace;

/// Notification emitted by the core
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    /// Technology lifecycle state changed
    TechnologyStateChanged {
        technology: ServiceType,
        state: TechnologyState,
    },
    /// A technology was created or destroyed
    TechnologiesChanged {
        technologies: Vec<ServiceType>,
    },
    /// Tethering flag of a technology changed
    TetheringChanged {
        technology: ServiceType,
        enabled: bool,
    },
    /// Tethering coordination: first technology started sharing
    TetheringEnabled,
    /// Tethering coordination: a technology stopped sharing
    TetheringDisabled,
    /// Global offline mode changed
    OfflineModeChanged(bool),
    /// Networks changed; services should re-evaluate auto-connect
    AutoConnectRequested,
    /// A device of this service type joined its technology
    ServiceRegistered(ServiceType),
    /// A device of this service type left its technology
    ServiceUnregistered(ServiceType),
    /// A device of this service type was powered on
    ServiceEnabled(ServiceType),
    /// A device of this service type was powered off
    ServiceDisabled(ServiceType),
    /// Device registered
    DeviceAdded {
        device: DeviceId,
        interface: Option<String>,
    },
    /// Device unregistered and released
    DeviceRemoved {
        device: DeviceId,
    },
    /// A network of a device was disconnected
    NetworkDisconnected {
        device: DeviceId,
        network: String,
    },
}

/// Broadcaster for core events
#[derive(Clone)]
pub struct Notifier {
    event_tx: broadcast::Sender<CoreEvent>,
}

impl Notifier {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self { event_tx }
    }

    /// Subscribe to core events
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.event_tx.subscribe()
    }

    /// Publish an event; having no subscribers is not an error
    pub fn emit(&self, event: CoreEvent) {
        trace!("event {:?}", event);
        let _ = self.event_tx.send(event);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
