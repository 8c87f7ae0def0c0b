//! Common vocabulary types shared across the reader crates.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tag memory banks addressable by read/write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryBank {
    /// Reserved memory (kill and access passwords).
    Reserved,
    /// EPC memory.
    Epc,
    /// TID memory (tag identifier).
    Tid,
    /// User memory.
    User,
}

impl MemoryBank {
    /// Wire value of the bank selector.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Reserved => 0x00,
            Self::Epc => 0x01,
            Self::Tid => 0x02,
            Self::User => 0x03,
        }
    }
}

/// Lockable memory areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockArea {
    KillPassword,
    AccessPassword,
    Epc,
    Tid,
    User,
}

impl LockArea {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::KillPassword => 0x00,
            Self::AccessPassword => 0x01,
            Self::Epc => 0x02,
            Self::Tid => 0x03,
            Self::User => 0x04,
        }
    }
}

/// Lock state changes that can be applied to a [`LockArea`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockAction {
    Unlock,
    Lock,
    PermanentUnlock,
    PermanentLock,
}

impl LockAction {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Unlock => 0x00,
            Self::Lock => 0x01,
            Self::PermanentUnlock => 0x02,
            Self::PermanentLock => 0x03,
        }
    }
}

/// Regulatory frequency regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    /// US, 902-928 MHz.
    Fcc,
    /// EU, 865-868 MHz.
    Etsi,
    /// China, 920-925 MHz.
    China,
    Korea,
    Japan,
    /// Custom frequency plan.
    Open,
}

impl Region {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Fcc => 0x01,
            Self::Etsi => 0x02,
            Self::China => 0x03,
            Self::Korea => 0x04,
            Self::Japan => 0x05,
            Self::Open => 0x06,
        }
    }

    /// Decode a region from its wire value.
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0x01 => Some(Self::Fcc),
            0x02 => Some(Self::Etsi),
            0x03 => Some(Self::China),
            0x04 => Some(Self::Korea),
            0x05 => Some(Self::Japan),
            0x06 => Some(Self::Open),
            _ => None,
        }
    }
}

/// Reader work modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkMode {
    /// Host-driven operation; inventory runs only on command.
    Command,
    /// Continuous self-driven reading.
    Auto,
    /// Reading driven by the external trigger input.
    Trigger,
    /// Wiegand output mode.
    Wiegand,
}

impl WorkMode {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Command => 0x00,
            Self::Auto => 0x01,
            Self::Trigger => 0x02,
            Self::Wiegand => 0x03,
        }
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0x00 => Some(Self::Command),
            0x01 => Some(Self::Auto),
            0x02 => Some(Self::Trigger),
            0x03 => Some(Self::Wiegand),
            _ => None,
        }
    }
}

/// Identity block reported by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Firmware version string.
    pub firmware_version: String,

    /// Hardware version string.
    pub hardware_version: String,

    /// Serial number as uppercase hex.
    pub serial_number: String,
}

impl DeviceIdentity {
    /// Byte length of the identity payload: two 32-byte version fields and a
    /// 12-byte serial number.
    pub const WIRE_LEN: usize = 32 + 32 + 12;

    /// Decode the identity payload returned by the device-info command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Payload`] if the payload is shorter than
    /// [`Self::WIRE_LEN`].
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::WIRE_LEN {
            return Err(Error::payload(
                "device info",
                format!("{} bytes, need {}", payload.len(), Self::WIRE_LEN),
            ));
        }

        Ok(Self {
            firmware_version: trimmed_string(&payload[0..32]),
            hardware_version: trimmed_string(&payload[32..64]),
            serial_number: payload[64..76].iter().map(|b| format!("{b:02X}")).collect(),
        })
    }
}

/// Decode a NUL-padded fixed-width ASCII field.
fn trimmed_string(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
