//! The closed command set of the vendor driver.
//!
//! Every operation the controller can ask of the device is one of these
//! commands, executed through [`Driver::invoke`](crate::Driver::invoke).
//! Argument and payload layouts are noted per variant; encoding lives with
//! the callers, decoding with `cf591-core`.

use std::fmt;

/// Command identifiers understood by the device driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Begin continuous inventory. Args: tag count limit (u8, 0 means
    /// unbounded), inventory parameter word (u32 LE).
    StartInventory,

    /// Wait up to a bounded time for one buffered tag report. Args: timeout
    /// in ms (u16 LE). Payload: one tag report.
    PollTag,

    /// End continuous inventory. Args: timeout in ms (u16 LE).
    StopInventory,

    /// Read the RF output power. Payload: power in dBm, reserved byte.
    GetPower,

    /// Set the RF output power. Args: power in dBm, reserved byte.
    SetPower,

    /// Read the whole device parameter block.
    GetConfig,

    /// Write the whole device parameter block. Args: the encoded block.
    SetConfig,

    /// Read tag memory. Args: option byte, access password (4 bytes), bank,
    /// word address (u16 LE), word count, timeout in ms (u16 LE). Payload:
    /// the words read.
    ReadMemory,

    /// Write tag memory. Args: option byte, access password (4 bytes), bank,
    /// word address (u16 LE), word count, data words, timeout in ms (u16 LE).
    WriteMemory,

    /// Change the lock state of a memory area. Args: access password
    /// (4 bytes), area, action.
    LockTag,

    /// Permanently disable a tag. Args: kill password (4 bytes).
    KillTag,

    /// Read the antenna enable mask. Payload: mask byte.
    GetAntenna,

    /// Write the antenna enable mask. Args: mask byte.
    SetAntenna,

    /// Read the anti-collision Q value. Payload: Q, reserved byte.
    GetQValue,

    /// Write the anti-collision Q value. Args: Q, reserved byte.
    SetQValue,

    /// Read firmware/hardware versions and the serial number.
    GetDeviceInfo,

    /// Enable the buzzer. Args: pulse duration in 10 ms units.
    EnableBuzzer,

    /// Disable the buzzer.
    DisableBuzzer,

    /// Energize the relay. Args: hold time in 100 ms units.
    ActivateRelay,

    /// Release the relay. Args: hold time in 100 ms units.
    DeactivateRelay,
}

impl Command {
    /// Stable command name for diagnostics and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::StartInventory => "StartInventory",
            Self::PollTag => "PollTag",
            Self::StopInventory => "StopInventory",
            Self::GetPower => "GetPower",
            Self::SetPower => "SetPower",
            Self::GetConfig => "GetConfig",
            Self::SetConfig => "SetConfig",
            Self::ReadMemory => "ReadMemory",
            Self::WriteMemory => "WriteMemory",
            Self::LockTag => "LockTag",
            Self::KillTag => "KillTag",
            Self::GetAntenna => "GetAntenna",
            Self::SetAntenna => "SetAntenna",
            Self::GetQValue => "GetQValue",
            Self::SetQValue => "SetQValue",
            Self::GetDeviceInfo => "GetDeviceInfo",
            Self::EnableBuzzer => "EnableBuzzer",
            Self::DisableBuzzer => "DisableBuzzer",
            Self::ActivateRelay => "ActivateRelay",
            Self::DeactivateRelay => "DeactivateRelay",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
