//! Link detection
//!
//! Turns kernel link announcements into devices. Only the hardware type,
//! the interface name and a few sysfs markers are needed to classify a link.

use crate::core::NetCore;
use crate::error::{NetcoreError, NetcoreResult};
use crate::types::{DeviceId, DeviceType};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

/// Kernel sysfs network class directory
pub const SYSFS_NET: &str = "/sys/class/net";

/// A link announced by the kernel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEvent {
    pub index: u32,
    /// ARPHRD_* hardware type
    pub arphrd: u16,
    pub name: String,
    pub address: Option<[u8; 6]>,
    pub is_bridge: bool,
    pub is_wimax: bool,
    pub is_wireless: bool,
}

impl LinkEvent {
    pub fn new(index: u32, arphrd: u16, name: &str) -> Self {
        Self {
            index,
            arphrd,
            name: name.to_string(),
            address: None,
            is_bridge: false,
            is_wimax: false,
            is_wireless: false,
        }
    }

    pub fn with_address(mut self, address: [u8; 6]) -> Self {
        self.address = Some(address);
        self
    }

    /// Read a link from `<root>/<name>`
    ///
    /// `root` is normally [`SYSFS_NET`].
    pub async fn from_sysfs(root: &Path, name: &str) -> NetcoreResult<Self> {
        let dir = root.join(name);
        if !is_dir(&dir).await {
            return Err(NetcoreError::NoSuchEntity(format!(
                "Interface {} not found",
                name
            )));
        }

        let index = read_number(&dir.join("ifindex")).await?;
        let arphrd = read_number(&dir.join("type")).await?;
        let address = fs::read_to_string(dir.join("address"))
            .await
            .ok()
            .and_then(|s| parse_address(s.trim()));

        Ok(Self {
            index: u32::try_from(index).map_err(|_| {
                NetcoreError::Parse(format!("Invalid ifindex for {}", name))
            })?,
            arphrd: u16::try_from(arphrd).map_err(|_| {
                NetcoreError::Parse(format!("Invalid link type for {}", name))
            })?,
            name: name.to_string(),
            address,
            is_bridge: is_dir(&dir.join("bridge")).await,
            is_wimax: is_dir(&dir.join("wimax")).await,
            is_wireless: is_dir(&dir.join("wireless")).await
                || fs::try_exists(dir.join("phy80211")).await.unwrap_or(false),
        })
    }
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.map_or(false, |m| m.is_dir())
}

async fn read_number(path: &Path) -> NetcoreResult<u64> {
    let content = fs::read_to_string(path).await?;
    content
        .trim()
        .parse()
        .map_err(|_| NetcoreError::Parse(format!("Invalid number in {}", path.display())))
}

/// Parse a colon separated MAC address
pub fn parse_address(text: &str) -> Option<[u8; 6]> {
    let mut address = [0u8; 6];
    let mut parts = text.split(':');

    for byte in address.iter_mut() {
        *byte = u8::from_str_radix(parts.next()?, 16).ok()?;
    }

    if parts.next().is_some() {
        return None;
    }

    Some(address)
}

/// Stable device identifier derived from the hardware address
pub fn ident_from_address(address: &[u8; 6]) -> String {
    format!(
        "dev_{:02X}_{:02X}_{:02X}_{:02X}_{:02X}_{:02X}",
        address[0], address[1], address[2], address[3], address[4], address[5]
    )
}

/// Device type and ident for a link, `None` when the link is not managed
pub fn classify(link: &LinkEvent) -> Option<(DeviceType, String)> {
    let device_type = match link.arphrd {
        libc::ARPHRD_ETHER => {
            if link.name.starts_with("bnep") || link.is_bridge {
                return None;
            }

            if link.is_wimax {
                DeviceType::Wimax
            } else if link.is_wireless {
                DeviceType::Wifi
            } else {
                DeviceType::Ethernet
            }
        }
        libc::ARPHRD_NONE if link.name.starts_with("hso") => {
            return Some((DeviceType::Cellular, link.name.clone()));
        }
        _ => return None,
    };

    let ident = ident_from_address(link.address.as_ref()?);
    Some((device_type, ident))
}

impl NetCore {
    /// Create and register a device for a new link
    ///
    /// Returns the new device, or `None` when the link is already known,
    /// filtered or not a managed kind.
    pub fn new_link(&mut self, link: &LinkEvent) -> NetcoreResult<Option<DeviceId>> {
        debug!("type {} index {}", link.arphrd, link.index);

        if self.devices().find_by_index(link.index).is_some() {
            return Ok(None);
        }

        if self.is_filtered(&link.name) {
            return Ok(None);
        }

        let Some((device_type, ident)) = classify(link) else {
            debug!("ignoring {} type {}", link.name, link.arphrd);
            return Ok(None);
        };

        let id = self.create_device(&ident, device_type)?;
        {
            let device = self.device_mut(id)?;
            device.set_index(link.index);
            device.set_interface(&link.name);
            if let Some(address) = link.address {
                device.set_address(&format_address(&address));
            }
        }

        if let Err(e) = self.register_device(id) {
            debug!("{} registration failed: {}", link.name, e);
            self.destroy_device(id)?;
            return Err(e);
        }

        info!("Detected {} {}", device_type.as_str().unwrap_or("device"), link.name);
        Ok(Some(id))
    }

    /// Unregister and release the device of a removed link
    pub fn del_link(&mut self, index: u32) -> NetcoreResult<Option<DeviceId>> {
        debug!("index {}", index);

        let Some(id) = self.devices().find_by_index(index) else {
            return Ok(None);
        };

        self.destroy_device(id)?;
        Ok(Some(id))
    }
}

fn format_address(address: &[u8; 6]) -> String {
    address
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}
