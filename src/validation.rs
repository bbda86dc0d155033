//! Input validation
//!
//! Checks applied at the presentation boundary before values reach the
//! technology drivers.

use crate::error::{NetcoreError, NetcoreResult};

/// Maximum length for interface names (Linux kernel limit is 15)
const MAX_INTERFACE_NAME_LEN: usize = 15;

/// Minimum tethering passphrase length (WPA2)
pub const MIN_PASSPHRASE_LEN: usize = 8;

/// Maximum tethering passphrase length (WPA2)
const MAX_PASSPHRASE_LEN: usize = 63;

/// Maximum SSID length
const MAX_SSID_LEN: usize = 32;

/// Validate interface name
///
/// Interface names must be alphanumeric with optional dashes, dots and
/// underscores, and no longer than 15 characters (Linux kernel limit)
pub fn validate_interface_name(name: &str) -> NetcoreResult<()> {
    if name.is_empty() {
        return Err(NetcoreError::InvalidArgument(
            "Interface name cannot be empty".to_string()
        ));
    }

    if name.len() > MAX_INTERFACE_NAME_LEN {
        return Err(NetcoreError::InvalidArgument(
            format!("Interface name too long (max {} characters)", MAX_INTERFACE_NAME_LEN)
        ));
    }

    for c in name.chars() {
        if !c.is_ascii_alphanumeric() && c != '-' && c != '_' && c != '.' {
            return Err(NetcoreError::InvalidArgument(
                format!("Invalid interface name '{}': contains invalid character '{}'", name, c)
            ));
        }
    }

    // Would be taken for an option by the ip tool
    if name.starts_with('-') {
        return Err(NetcoreError::InvalidArgument(
            "Interface name cannot start with dash".to_string()
        ));
    }

    Ok(())
}

/// Validate the tethering identifier (the SSID of the shared network)
pub fn validate_tethering_identifier(ident: &str) -> NetcoreResult<()> {
    if ident.is_empty() {
        return Err(NetcoreError::InvalidArgument(
            "Tethering identifier cannot be empty".to_string()
        ));
    }

    if ident.len() > MAX_SSID_LEN {
        return Err(NetcoreError::InvalidArgument(
            format!("Tethering identifier cannot exceed {} characters", MAX_SSID_LEN)
        ));
    }

    if ident.chars().any(|c| c.is_control()) {
        return Err(NetcoreError::InvalidArgument(
            "Tethering identifier contains invalid control characters".to_string()
        ));
    }

    Ok(())
}

/// Validate the tethering passphrase
///
/// WPA2 requirements: 8-63 ASCII characters
pub fn validate_tethering_passphrase(passphrase: &str) -> NetcoreResult<()> {
    if passphrase.len() < MIN_PASSPHRASE_LEN {
        return Err(NetcoreError::InvalidArgument(
            format!("Tethering passphrase must be at least {} characters", MIN_PASSPHRASE_LEN)
        ));
    }

    if passphrase.len() > MAX_PASSPHRASE_LEN {
        return Err(NetcoreError::InvalidArgument(
            format!("Tethering passphrase cannot exceed {} characters", MAX_PASSPHRASE_LEN)
        ));
    }

    if !passphrase.is_ascii() {
        return Err(NetcoreError::InvalidArgument(
            "Tethering passphrase must contain only ASCII characters".to_string()
        ));
    }

    if passphrase.chars().any(|c| c.is_control()) {
        return Err(NetcoreError::InvalidArgument(
            "Tethering passphrase contains invalid control characters".to_string()
        ));
    }

    Ok(())
}

/// Validate a regulatory domain (ISO 3166-1 alpha-2, or "00" for world)
pub fn validate_regdom(alpha2: &str) -> NetcoreResult<()> {
    if alpha2.len() != 2 {
        return Err(NetcoreError::InvalidArgument(
            "Regulatory domain must be 2 characters".to_string()
        ));
    }

    if alpha2 == "00" {
        return Ok(());
    }

    if !alpha2.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(NetcoreError::InvalidArgument(
            format!("Invalid regulatory domain: {}", alpha2)
        ));
    }

    Ok(())
}
