//! Wired ethernet driver
//!
//! Power is the administrative link state. `ip link set` runs on a spawned
//! task; its outcome comes back through the control loop as a
//! [`CoreCommand::DevicePowered`](crate::daemon::CoreCommand::DevicePowered).

use crate::daemon::CoreHandle;
use crate::device::Device;
use crate::driver::{DeviceDriver, DriverCapabilities};
use crate::error::{NetcoreError, NetcoreResult};
use crate::types::{Completion, DeviceType};
use crate::validation;
use tokio::process::Command;
use tracing::{debug, warn};

pub struct EthernetDriver {
    handle: CoreHandle,
    program: String,
}

impl EthernetDriver {
    pub fn new(handle: CoreHandle) -> Self {
        Self::with_program(handle, "ip")
    }

    /// Use another binary in place of `ip`
    pub fn with_program(handle: CoreHandle, program: &str) -> Self {
        Self {
            handle,
            program: program.to_string(),
        }
    }

    fn set_link(&self, device: &Device, up: bool) -> NetcoreResult<Completion> {
        let interface = device
            .interface()
            .ok_or_else(|| NetcoreError::InvalidArgument(format!("{} has no interface", device.id())))?
            .to_string();
        validation::validate_interface_name(&interface)?;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| NetcoreError::ServiceError(format!("No runtime for link control: {}", e)))?;

        let id = device.id();
        let handle = self.handle.clone();
        let program = self.program.clone();

        runtime.spawn(async move {
            let state = if up { "up" } else { "down" };
            let powered = match run_ip(&program, &["link", "set", "dev", &interface, state]).await {
                Ok(()) => up,
                Err(e) => {
                    warn!("Failed to set {} {}: {}", interface, state, e);
                    !up
                }
            };

            if let Err(e) = handle.device_powered(id, powered) {
                debug!("{} powered {} not delivered: {}", id, powered, e);
            }
        });

        Ok(Completion::Pending)
    }
}

impl DeviceDriver for EthernetDriver {
    fn name(&self) -> &str {
        "ethernet"
    }

    fn device_type(&self) -> Option<DeviceType> {
        Some(DeviceType::Ethernet)
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities::ENABLE | DriverCapabilities::DISABLE
    }

    fn probe(&self, device: &mut Device) -> NetcoreResult<()> {
        let interface = device
            .interface()
            .ok_or_else(|| NetcoreError::NotSupported(format!("{} has no interface", device.id())))?;
        validation::validate_interface_name(interface)?;
        debug!("ethernet probe {}", interface);
        Ok(())
    }

    fn remove(&self, device: &mut Device) {
        debug!("ethernet remove {}", device.id());
    }

    fn enable(&self, device: &mut Device) -> NetcoreResult<Completion> {
        self.set_link(device, true)
    }

    fn disable(&self, device: &mut Device) -> NetcoreResult<Completion> {
        self.set_link(device, false)
    }
}

async fn run_ip(program: &str, args: &[&str]) -> NetcoreResult<()> {
    let cmd_str = format!("{} {}", program, args.join(" "));
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| NetcoreError::CommandFailed {
            cmd: cmd_str.clone(),
            code: None,
            stderr: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(NetcoreError::CommandFailed {
            cmd: cmd_str,
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(())
}
