//! Control loop
//!
//! The core is not thread safe. A single task owns the [`NetCore`] and
//! serializes every event: link and kill-switch announcements, driver
//! completions, user requests and scan timer expiries. Everything else talks
//! to it through a cloneable [`CoreHandle`].

use crate::core::NetCore;
use crate::detect::LinkEvent;
use crate::error::{NetcoreError, NetcoreResult};
use crate::technology::RfkillType;
use crate::types::{DeviceId, ServiceType};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Result channel of a user request
pub type Reply = oneshot::Sender<NetcoreResult<()>>;

/// Event delivered to the control loop
#[derive(Debug)]
pub enum CoreCommand {
    NewLink(LinkEvent),
    DelLink(u32),
    AddRfkill {
        index: u32,
        rfkill_type: RfkillType,
        soft: bool,
        hard: bool,
    },
    UpdateRfkill {
        index: u32,
        soft: bool,
        hard: bool,
    },
    RemoveRfkill(u32),
    /// Completion of a pending driver enable or disable
    DevicePowered {
        device: DeviceId,
        powered: bool,
    },
    /// Driver scan started or finished
    Scanning {
        device: DeviceId,
        scanning: bool,
    },
    SetOfflineMode {
        offline: bool,
        reply: Reply,
    },
    EnableTechnology {
        technology: ServiceType,
        reply: Reply,
    },
    DisableTechnology {
        technology: ServiceType,
        reply: Reply,
    },
    RequestScan {
        technology: ServiceType,
        reply: Reply,
    },
    SetProperty {
        technology: ServiceType,
        name: String,
        value: Value,
        reply: Reply,
    },
    Shutdown,
}

/// Sender side of the control loop
#[derive(Debug, Clone)]
pub struct CoreHandle {
    tx: mpsc::UnboundedSender<CoreCommand>,
}

/// Create a connected handle and receiver
pub fn command_channel() -> (CoreHandle, mpsc::UnboundedReceiver<CoreCommand>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CoreHandle { tx }, rx)
}

impl CoreHandle {
    pub fn send(&self, command: CoreCommand) -> NetcoreResult<()> {
        self.tx
            .send(command)
            .map_err(|_| NetcoreError::ServiceError("Control loop stopped".to_string()))
    }

    /// Report the outcome of a pending driver power operation
    pub fn device_powered(&self, device: DeviceId, powered: bool) -> NetcoreResult<()> {
        self.send(CoreCommand::DevicePowered { device, powered })
    }

    pub fn scanning(&self, device: DeviceId, scanning: bool) -> NetcoreResult<()> {
        self.send(CoreCommand::Scanning { device, scanning })
    }

    pub fn shutdown(&self) -> NetcoreResult<()> {
        self.send(CoreCommand::Shutdown)
    }

    async fn request<F>(&self, build: F) -> NetcoreResult<()>
    where
        F: FnOnce(Reply) -> CoreCommand,
    {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply))?;
        rx.await
            .map_err(|_| NetcoreError::ServiceError("Request dropped".to_string()))?
    }

    pub async fn set_offline_mode(&self, offline: bool) -> NetcoreResult<()> {
        self.request(|reply| CoreCommand::SetOfflineMode { offline, reply })
            .await
    }

    pub async fn enable_technology(&self, technology: ServiceType) -> NetcoreResult<()> {
        self.request(|reply| CoreCommand::EnableTechnology { technology, reply })
            .await
    }

    pub async fn disable_technology(&self, technology: ServiceType) -> NetcoreResult<()> {
        self.request(|reply| CoreCommand::DisableTechnology { technology, reply })
            .await
    }

    pub async fn request_scan(&self, technology: ServiceType) -> NetcoreResult<()> {
        self.request(|reply| CoreCommand::RequestScan { technology, reply })
            .await
    }

    pub async fn set_property(&self, technology: ServiceType, name: &str, value: Value) -> NetcoreResult<()> {
        let name = name.to_string();
        self.request(|reply| CoreCommand::SetProperty {
            technology,
            name,
            value,
            reply,
        })
        .await
    }
}

/// The control task
pub struct Daemon {
    core: NetCore,
    handle: CoreHandle,
    rx: mpsc::UnboundedReceiver<CoreCommand>,
}

impl Daemon {
    pub fn new(core: NetCore) -> Self {
        let (handle, rx) = command_channel();
        Self { core, handle, rx }
    }

    /// Handle for drivers and front ends
    pub fn handle(&self) -> CoreHandle {
        self.handle.clone()
    }

    pub fn core(&self) -> &NetCore {
        &self.core
    }

    /// Setup access before the loop starts (driver registration, initial
    /// link enumeration)
    pub fn core_mut(&mut self) -> &mut NetCore {
        &mut self.core
    }

    /// Run until a shutdown command; returns the core after releasing every
    /// device
    pub async fn run(mut self) -> NetCore {
        info!("Control loop started");

        loop {
            let deadline = self.core.next_scan_deadline();

            tokio::select! {
                command = self.rx.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    if !self.dispatch(command) {
                        break;
                    }
                }
                _ = wait_for(deadline) => {
                    let fired = self.core.run_due_scans(Instant::now());
                    debug!("{} periodic scans", fired);
                }
            }
        }

        info!("Control loop stopping");
        self.core.shutdown();
        self.core
    }

    /// Apply one command; false stops the loop
    fn dispatch(&mut self, command: CoreCommand) -> bool {
        debug!("command {:?}", command);

        match command {
            CoreCommand::NewLink(link) => {
                if let Err(e) = self.core.new_link(&link) {
                    warn!("Failed to add link {}: {}", link.name, e);
                }
            }
            CoreCommand::DelLink(index) => {
                if let Err(e) = self.core.del_link(index) {
                    warn!("Failed to remove link {}: {}", index, e);
                }
            }
            CoreCommand::AddRfkill {
                index,
                rfkill_type,
                soft,
                hard,
            } => {
                let service_type = rfkill_type.service_type();
                if let Err(e) = self.core.add_rfkill(index, service_type, soft, hard) {
                    debug!("rfkill {} ({:?}): {}", index, rfkill_type, e);
                }
            }
            CoreCommand::UpdateRfkill { index, soft, hard } => {
                if let Err(e) = self.core.update_rfkill(index, soft, hard) {
                    debug!("rfkill {}: {}", index, e);
                }
            }
            CoreCommand::RemoveRfkill(index) => {
                if let Err(e) = self.core.remove_rfkill(index) {
                    debug!("rfkill {}: {}", index, e);
                }
            }
            CoreCommand::DevicePowered { device, powered } => {
                match self.core.set_powered(device, powered) {
                    Ok(()) => {}
                    Err(e) if e.is_benign() => debug!("{}: {}", device, e),
                    Err(e) => warn!("{} powered {}: {}", device, powered, e),
                }
            }
            CoreCommand::Scanning { device, scanning } => {
                if let Err(e) = self.core.set_scanning(device, scanning) {
                    debug!("{} scanning {}: {}", device, scanning, e);
                }
            }
            CoreCommand::SetOfflineMode { offline, reply } => {
                let _ = reply.send(self.core.set_offline_mode(offline));
            }
            CoreCommand::EnableTechnology { technology, reply } => {
                let _ = reply.send(self.core.enable_technology(technology));
            }
            CoreCommand::DisableTechnology { technology, reply } => {
                let _ = reply.send(self.core.disable_technology(technology));
            }
            CoreCommand::RequestScan { technology, reply } => {
                let _ = reply.send(self.core.request_scan(technology));
            }
            CoreCommand::SetProperty {
                technology,
                name,
                value,
                reply,
            } => {
                let _ = reply.send(self.core.set_technology_property(technology, &name, &value));
            }
            CoreCommand::Shutdown => return false,
        }

        true
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
