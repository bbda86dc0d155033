//! netcore - Device and Technology Core
//!
//! Device and technology management for a network connection manager daemon:
//! - Driver registry (device and technology drivers, priority probing)
//! - Device power state machine with asynchronous driver completions
//! - Background scan scheduling with exponential backoff
//! - RFKill kill-switch aggregation per technology
//! - Technology lifecycle, tethering and regulatory domain requests
//! - Offline mode and persisted power choices
//!
//! Everything runs on one control task, see [`daemon`].

pub mod error;
pub mod types;
pub mod config;
pub mod validation;
pub mod filter;
pub mod storage;
pub mod notifier;
pub mod driver;
pub mod device;
pub mod technology;
pub mod core;
pub mod detect;
pub mod daemon;
pub mod monitor;
pub mod drivers;

// Re-export commonly used types
pub use error::{NetcoreError, NetcoreResult};
pub use types::{Completion, DeviceId, DeviceType, ServiceType, TechnologyState};
pub use config::{NetcoreConfig, DEFAULT_CONFIG_PATH};
pub use filter::DeviceFilter;
pub use storage::{DeviceStore, MemoryStore, ProfileStore};
pub use notifier::{CoreEvent, Notifier};
pub use driver::{
    DeviceDriver, DriverCapabilities, DriverRegistry, TechnologyDriver,
    DRIVER_PRIORITY_DEFAULT, DRIVER_PRIORITY_HIGH, DRIVER_PRIORITY_LOW,
};
pub use device::{Device, DeviceManager, Network, ScanScheduler};
pub use technology::{
    RfkillSwitch, RfkillTransition, RfkillType, Technology, TechnologyManager,
    TechnologyProperties,
};
pub use crate::core::NetCore;
pub use detect::LinkEvent;
pub use daemon::{CoreCommand, CoreHandle, Daemon};
pub use drivers::EthernetDriver;
pub use monitor::LinkMonitor;
