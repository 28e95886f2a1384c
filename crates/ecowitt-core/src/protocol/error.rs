//! Control-channel error types.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors raised while building an outbound packet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("Payload too large: {len} bytes, maximum {max}")]
    PayloadTooLarge { len: usize, max: usize },
}

/// Errors raised while reading or interpreting a reply.
#[derive(Error, Debug)]
pub enum ReplyError {
    #[error("Header mismatch: expected FF FF, got {first:02X} {second:02X}")]
    HeaderMismatch { first: u8, second: u8 },

    #[error("Declared size {size} does not fit a {capacity}-byte reply buffer")]
    SizeOverflow { size: usize, capacity: usize },

    #[error("Frame too short: {len} bytes")]
    FrameTooShort { len: usize },

    #[error("Declared size {declared} disagrees with frame length {actual}")]
    SizeMismatch { declared: usize, actual: usize },

    #[error("Payload truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Framing error for opcode 0x{opcode:02X}: {unconsumed} payload bytes left over")]
    Framing { opcode: u8, unconsumed: usize },

    #[error("Checksum mismatch: transmitted 0x{transmitted:02X}, computed 0x{computed:02X}")]
    ChecksumMismatch { transmitted: u8, computed: u8 },

    #[error("Update rejected by device (status 0x{status:02X})")]
    UpdateRejected { status: u8 },

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Unexpected reply: expected opcode 0x{expected:02X}, got 0x{received:02X}")]
    UnexpectedReply { expected: u8, received: u8 },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ReplyError {
    /// Whether the frame itself was malformed (as opposed to a transport or
    /// device-level failure).
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            ReplyError::HeaderMismatch { .. }
                | ReplyError::SizeOverflow { .. }
                | ReplyError::FrameTooShort { .. }
                | ReplyError::SizeMismatch { .. }
                | ReplyError::Truncated { .. }
                | ReplyError::Framing { .. }
        )
    }
}
