//! Built-in device drivers

pub mod ethernet;

pub use ethernet::EthernetDriver;
