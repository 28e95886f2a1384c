//! Control opcodes understood by the engine.

use std::fmt;

use super::constants::{CMD_READ_FIRMWARE_VERSION, CMD_READ_STATION_MAC, CMD_WRITE_UPDATE};

/// Control operation identifier.
///
/// Replies may carry other opcode values; those stay as raw `u8` and are
/// decoded generically by the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Read the station MAC address.
    QueryIdentity,
    /// Ask the device to pull a new firmware image.
    RequestUpdate,
    /// Read the running firmware version string.
    QueryFirmwareVersion,
}

impl Opcode {
    pub const ALL: [Opcode; 3] = [
        Opcode::QueryIdentity,
        Opcode::RequestUpdate,
        Opcode::QueryFirmwareVersion,
    ];

    /// Wire value.
    pub const fn code(self) -> u8 {
        match self {
            Opcode::QueryIdentity => CMD_READ_STATION_MAC,
            Opcode::RequestUpdate => CMD_WRITE_UPDATE,
            Opcode::QueryFirmwareVersion => CMD_READ_FIRMWARE_VERSION,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            CMD_READ_STATION_MAC => Some(Opcode::QueryIdentity),
            CMD_WRITE_UPDATE => Some(Opcode::RequestUpdate),
            CMD_READ_FIRMWARE_VERSION => Some(Opcode::QueryFirmwareVersion),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Opcode::QueryIdentity => "READ_STATION_MAC",
            Opcode::RequestUpdate => "WRITE_UPDATE",
            Opcode::QueryFirmwareVersion => "READ_FIRMWARE_VERSION",
        }
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> u8 {
        op.code()
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.code())
    }
}
