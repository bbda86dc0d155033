//! Driver plugin interface
//!
//! Device and technology drivers are registered by plugin code and matched
//! against entities by type, highest priority first.

pub mod traits;
pub mod registry;

pub use traits::{
    DeviceDriver, DriverCapabilities, Prioritized, TechnologyDriver,
    DRIVER_PRIORITY_DEFAULT, DRIVER_PRIORITY_HIGH, DRIVER_PRIORITY_LOW,
};
pub use registry::DriverRegistry;
