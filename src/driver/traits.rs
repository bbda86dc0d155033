//! Driver trait definitions

use crate::device::Device;
use crate::error::{NetcoreError, NetcoreResult};
use crate::technology::Technology;
use crate::types::{Completion, DeviceType, ServiceType};
use bitflags::bitflags;

/// Low priority, tried after default drivers
pub const DRIVER_PRIORITY_LOW: i32 = -100;
/// Default priority
pub const DRIVER_PRIORITY_DEFAULT: i32 = 0;
/// High priority, tried first
pub const DRIVER_PRIORITY_HIGH: i32 = 100;

bitflags! {
    /// Optional operations a driver implements
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DriverCapabilities: u8 {
        /// Device power on
        const ENABLE = 1 << 0;
        /// Device power off
        const DISABLE = 1 << 1;
        /// Device network scan
        const SCAN = 1 << 2;
        /// Technology tethering
        const TETHERING = 1 << 3;
        /// Technology regulatory domain
        const REGDOM = 1 << 4;
    }
}

/// Driver for a kind of device
///
/// Optional operations are only invoked when the matching capability flag is
/// advertised. Enable, disable and scan may finish asynchronously by returning
/// [`Completion::Pending`]; the driver then reports the outcome through the
/// daemon's command channel.
pub trait DeviceDriver: Send + Sync {
    /// Driver name, unique within the registry
    fn name(&self) -> &str;

    /// Device type served by this driver, `None` matches any type
    fn device_type(&self) -> Option<DeviceType>;

    /// Drivers with higher priority are probed first
    fn priority(&self) -> i32 {
        DRIVER_PRIORITY_DEFAULT
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities::empty()
    }

    /// Claim the device; an error lets the next driver try
    fn probe(&self, device: &mut Device) -> NetcoreResult<()>;

    /// Release the device
    fn remove(&self, device: &mut Device);

    fn enable(&self, _device: &mut Device) -> NetcoreResult<Completion> {
        Err(NetcoreError::NotSupported(format!("driver {} cannot enable", self.name())))
    }

    fn disable(&self, _device: &mut Device) -> NetcoreResult<Completion> {
        Err(NetcoreError::NotSupported(format!("driver {} cannot disable", self.name())))
    }

    fn scan(&self, _device: &mut Device) -> NetcoreResult<Completion> {
        Err(NetcoreError::NotSupported(format!("driver {} cannot scan", self.name())))
    }
}

/// Driver for a technology
pub trait TechnologyDriver: Send + Sync {
    /// Driver name, unique within the registry
    fn name(&self) -> &str;

    /// Service type served by this driver, `None` matches any type
    fn service_type(&self) -> Option<ServiceType>;

    fn priority(&self) -> i32 {
        DRIVER_PRIORITY_DEFAULT
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities::empty()
    }

    fn probe(&self, technology: &mut Technology) -> NetcoreResult<()>;

    fn remove(&self, technology: &mut Technology);

    /// An interface of this technology appeared
    fn add_interface(&self, _technology: &mut Technology, _index: u32, _name: &str, _ident: Option<&str>) {}

    /// An interface of this technology disappeared
    fn remove_interface(&self, _technology: &mut Technology, _index: u32) {}

    /// Start or stop sharing the technology over `bridge`
    fn set_tethering(
        &self,
        _technology: &mut Technology,
        _ident: Option<&str>,
        _passphrase: Option<&str>,
        _bridge: &str,
        _enabled: bool,
    ) -> NetcoreResult<()> {
        Err(NetcoreError::NotSupported(format!("driver {} cannot tether", self.name())))
    }

    /// Apply a regulatory domain; the outcome is reported via regdom notify
    fn set_regdom(&self, _technology: &mut Technology, _alpha2: &str) -> NetcoreResult<()> {
        Err(NetcoreError::NotSupported(format!("driver {} has no regulatory domain", self.name())))
    }
}

/// Naming and ordering shared by both driver kinds
pub trait Prioritized {
    fn driver_name(&self) -> &str;
    fn driver_priority(&self) -> i32;
}

impl Prioritized for dyn DeviceDriver {
    fn driver_name(&self) -> &str {
        self.name()
    }

    fn driver_priority(&self) -> i32 {
        self.priority()
    }
}

impl Prioritized for dyn TechnologyDriver {
    fn driver_name(&self) -> &str {
        self.name()
    }

    fn driver_priority(&self) -> i32 {
        self.priority()
    }
}

/// Whether a device driver may be bound to a device of `device_type`
pub fn matches_device(driver: &dyn DeviceDriver, device_type: DeviceType) -> bool {
    driver.device_type().map_or(true, |t| t == device_type)
}

/// Whether a technology driver may be bound to a technology of `service_type`
pub fn matches_technology(driver: &dyn TechnologyDriver, service_type: ServiceType) -> bool {
    driver.service_type().map_or(true, |t| t == service_type)
}
