//! Networks discovered by device drivers

use serde::{Deserialize, Serialize};

/// A connectable endpoint (access point, cellular context, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    identifier: String,
    name: Option<String>,
    available: bool,
    connected: bool,
    connecting: bool,
}

impl Network {
    /// New networks are considered available
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: None,
            available: true,
            connected: false,
            connecting: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    pub fn available(&self) -> bool {
        self.available
    }

    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
        if connected {
            self.connecting = false;
        }
    }

    /// Whether a connection attempt is in flight
    pub fn connecting(&self) -> bool {
        self.connecting
    }

    pub fn set_connecting(&mut self, connecting: bool) {
        self.connecting = connecting;
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
        self.connecting = false;
    }

    /// Kept by a cleanup pass after a scan
    pub fn is_retained(&self) -> bool {
        self.connected || self.available
    }
}
