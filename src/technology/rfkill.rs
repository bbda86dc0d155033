//! Kill-switch state

use crate::types::ServiceType;
use serde::{Deserialize, Serialize};

/// Kernel rfkill switch type (`RFKILL_TYPE_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RfkillType {
    All,
    Wlan,
    Bluetooth,
    Uwb,
    Wimax,
    Wwan,
    Gps,
    Fm,
}

impl RfkillType {
    /// Map the kernel's numeric type
    pub fn from_kernel(value: u8) -> Option<Self> {
        match value {
            0 => Some(RfkillType::All),
            1 => Some(RfkillType::Wlan),
            2 => Some(RfkillType::Bluetooth),
            3 => Some(RfkillType::Uwb),
            4 => Some(RfkillType::Wimax),
            5 => Some(RfkillType::Wwan),
            6 => Some(RfkillType::Gps),
            7 => Some(RfkillType::Fm),
            _ => None,
        }
    }

    /// Technology a switch of this type controls
    pub fn service_type(&self) -> ServiceType {
        match self {
            RfkillType::Wlan => ServiceType::Wifi,
            RfkillType::Bluetooth => ServiceType::Bluetooth,
            RfkillType::Wimax => ServiceType::Wimax,
            RfkillType::Wwan => ServiceType::Cellular,
            // same grouping as gps devices, which have no technology
            RfkillType::All | RfkillType::Uwb | RfkillType::Gps | RfkillType::Fm => {
                ServiceType::Unknown
            }
        }
    }
}

/// Edge produced by a switch state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTransition {
    Unchanged,
    Blocked,
    Unblocked,
}

/// One physical kill-switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfkillSwitch {
    pub index: u32,
    pub service_type: ServiceType,
    pub soft: bool,
    pub hard: bool,
}

impl RfkillSwitch {
    pub fn new(index: u32, service_type: ServiceType, soft: bool, hard: bool) -> Self {
        Self {
            index,
            service_type,
            soft,
            hard,
        }
    }

    pub fn blocked(&self) -> bool {
        self.soft || self.hard
    }

    /// Store new block flags and report the edge, if any
    pub fn update(&mut self, soft: bool, hard: bool) -> BlockTransition {
        let old = self.blocked();
        self.soft = soft;
        self.hard = hard;

        match (old, self.blocked()) {
            (false, true) => BlockTransition::Blocked,
            (true, false) => BlockTransition::Unblocked,
            _ => BlockTransition::Unchanged,
        }
    }
}
