//! Wire constants for the gateway control and transfer channels.

use std::time::Duration;

/// Marker byte; every control packet starts with two of these.
pub const MARKER: u8 = 0xFF;
/// Length of the marker prefix. Not counted in size or checksum.
pub const MARKER_LEN: usize = 2;
/// Marker + opcode + size byte.
pub const HEADER_LEN: usize = 4;
/// Opcode + size + checksum, the smallest legal value of the size byte.
pub const MIN_DECLARED_SIZE: usize = 3;
/// Largest payload that keeps `payload + 4` inside one size byte.
pub const MAX_PAYLOAD_LEN: usize = 251;

// Opcodes
pub const CMD_READ_STATION_MAC: u8 = 0x26;
pub const CMD_WRITE_UPDATE: u8 = 0x43;
pub const CMD_READ_FIRMWARE_VERSION: u8 = 0x50;

/// Length of the hardware identity (MAC address) reply field.
pub const STATION_MAC_LEN: usize = 6;
/// Status byte value meaning "accepted".
pub const STATUS_OK: u8 = 0x00;

/// Default TCP port of the gateway's binary API.
pub const DEFAULT_DEVICE_PORT: u16 = 45000;

/// Default reply buffer capacity.
pub const REPLY_BUFFER_SIZE: usize = 1024;
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Firmware chunk size. Matches what the vendor's mobile app sends.
pub const CHUNK_SIZE: usize = 1024;
/// Upper bound on a transfer token, terminator included.
pub const MAX_TOKEN_LEN: usize = 64;

// Transfer tokens (terminator included)
pub const TOKEN_USER1: &[u8] = b"user1.bin\0";
pub const TOKEN_USER2: &[u8] = b"user2.bin\0";
pub const TOKEN_START: &[u8] = b"start\0";
pub const TOKEN_CONTINUE: &[u8] = b"continue\0";
pub const TOKEN_END: &[u8] = b"end\0";
