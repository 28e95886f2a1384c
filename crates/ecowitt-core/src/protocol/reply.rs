//! Reply interpretation: integrity checks and opcode dispatch.

use std::fmt;

use tracing::{debug, trace, warn};

use super::constants::{STATION_MAC_LEN, STATUS_OK};
use super::cursor::PayloadCursor;
use super::error::ReplyError;
use super::opcode::Opcode;
use super::packet::Frame;

/// Station hardware identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; STATION_MAC_LEN]);

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Decoded reply payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Identity(MacAddress),
    FirmwareVersion(String),
    UpdateAccepted,
    /// Reply to an opcode this engine does not decode; first payload byte.
    Status { opcode: u8, status: u8 },
}

impl Reply {
    pub fn describe(&self) -> String {
        match self {
            Reply::Identity(mac) => format!("MAC address {mac}"),
            Reply::FirmwareVersion(v) => format!("firmware version {v}"),
            Reply::UpdateAccepted => "update accepted".to_string(),
            Reply::Status { opcode, status } => {
                format!("opcode 0x{opcode:02X} status 0x{status:02X}")
            }
        }
    }
}

/// Integrity problems that do not stop decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityWarning {
    ChecksumMismatch { transmitted: u8, computed: u8 },
    OpcodeMismatch { expected: u8, received: u8 },
}

impl fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityWarning::ChecksumMismatch {
                transmitted,
                computed,
            } => write!(
                f,
                "checksum mismatch: transmitted 0x{transmitted:02X}, computed 0x{computed:02X}"
            ),
            IntegrityWarning::OpcodeMismatch { expected, received } => write!(
                f,
                "received opcode 0x{received:02X} in response to 0x{expected:02X}"
            ),
        }
    }
}

/// Interpretation policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterpretOptions {
    /// Treat a checksum mismatch as fatal instead of advisory.
    pub strict_checksum: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedReply {
    pub frame: Frame,
    pub reply: Reply,
    pub warnings: Vec<IntegrityWarning>,
}

impl DecodedReply {
    pub fn opcode(&self) -> u8 {
        self.frame.opcode
    }
}

/// Validate and decode a complete reply frame.
///
/// Decoding follows the opcode actually received, even when it differs from
/// `expected`. Handled opcodes must consume the whole payload.
pub fn interpret(
    expected: Opcode,
    buf: &[u8],
    options: InterpretOptions,
) -> Result<DecodedReply, ReplyError> {
    let frame = Frame::parse(buf)?;
    let mut warnings = Vec::new();

    let computed = frame.computed_checksum();
    if computed != frame.transmitted_checksum {
        if options.strict_checksum {
            return Err(ReplyError::ChecksumMismatch {
                transmitted: frame.transmitted_checksum,
                computed,
            });
        }
        let warning = IntegrityWarning::ChecksumMismatch {
            transmitted: frame.transmitted_checksum,
            computed,
        };
        warn!(opcode = %format!("0x{:02X}", frame.opcode), "{}", warning);
        warnings.push(warning);
    } else {
        trace!(checksum = %format!("0x{:02X}", computed), "Checksum OK");
    }

    if frame.opcode != expected.code() {
        let warning = IntegrityWarning::OpcodeMismatch {
            expected: expected.code(),
            received: frame.opcode,
        };
        warn!(payload_len = frame.payload.len(), "{}", warning);
        warnings.push(warning);
    }

    let mut cursor = PayloadCursor::new(&frame.payload);
    let reply = match Opcode::from_code(frame.opcode) {
        Some(Opcode::QueryIdentity) => {
            let mac = cursor.take_array::<STATION_MAC_LEN>()?;
            ensure_consumed(frame.opcode, &cursor)?;
            Reply::Identity(MacAddress(mac))
        }
        Some(Opcode::QueryFirmwareVersion) => {
            let len = cursor.take_byte()? as usize;
            let text = cursor.take_bytes(len)?;
            ensure_consumed(frame.opcode, &cursor)?;
            Reply::FirmwareVersion(String::from_utf8_lossy(text).into_owned())
        }
        Some(Opcode::RequestUpdate) => {
            let status = cursor.take_byte()?;
            ensure_consumed(frame.opcode, &cursor)?;
            debug!(status = %format!("0x{:02X}", status), "WRITE_UPDATE status");
            if status != STATUS_OK {
                return Err(ReplyError::UpdateRejected { status });
            }
            Reply::UpdateAccepted
        }
        None => {
            let status = cursor.take_byte().map_err(|_| {
                ReplyError::ProtocolViolation(format!(
                    "reply with unhandled opcode 0x{:02X} has no status byte",
                    frame.opcode
                ))
            })?;
            warn!(
                opcode = %format!("0x{:02X}", frame.opcode),
                status = %format!("0x{:02X}", status),
                size = frame.declared_size,
                trailing = cursor.remaining(),
                "Unhandled reply opcode"
            );
            Reply::Status {
                opcode: frame.opcode,
                status,
            }
        }
    };

    Ok(DecodedReply {
        frame,
        reply,
        warnings,
    })
}

fn ensure_consumed(opcode: u8, cursor: &PayloadCursor<'_>) -> Result<(), ReplyError> {
    match cursor.remaining() {
        0 => Ok(()),
        unconsumed => Err(ReplyError::Framing { opcode, unconsumed }),
    }
}
