//! Control packet framing.
//!
//! ```text
//! FF FF | opcode | size | payload .. | checksum
//! ```
//!
//! `size` counts opcode, size, payload and checksum. The checksum is the
//! 8-bit sum of opcode, size and every payload byte. The two marker bytes
//! take part in neither.

use super::constants::{HEADER_LEN, MARKER, MARKER_LEN, MAX_PAYLOAD_LEN, MIN_DECLARED_SIZE};
use super::error::{PacketError, ReplyError};
use super::opcode::Opcode;

/// 8-bit additive checksum over opcode, size and payload.
pub fn checksum(opcode: u8, size: u8, payload: &[u8]) -> u8 {
    payload
        .iter()
        .fold(opcode.wrapping_add(size), |acc, &b| acc.wrapping_add(b))
}

/// A framed control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPacket {
    opcode: u8,
    payload: Vec<u8>,
}

impl ControlPacket {
    /// Build an outbound packet. Only the single-byte size variant is
    /// supported, so the payload is capped at 251 bytes.
    pub fn new(opcode: impl Into<u8>, payload: impl Into<Vec<u8>>) -> Result<Self, PacketError> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(PacketError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }
        Ok(Self {
            opcode: opcode.into(),
            payload,
        })
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    pub fn known_opcode(&self) -> Option<Opcode> {
        Opcode::from_code(self.opcode)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn declared_size(&self) -> u8 {
        (MIN_DECLARED_SIZE + self.payload.len()) as u8
    }

    pub fn checksum(&self) -> u8 {
        checksum(self.opcode, self.declared_size(), &self.payload)
    }

    /// Total length on the wire, markers included.
    pub fn encoded_len(&self) -> usize {
        MARKER_LEN + self.declared_size() as usize
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(&[MARKER, MARKER, self.opcode, self.declared_size()]);
        buf.extend_from_slice(&self.payload);
        buf.push(self.checksum());
        buf
    }
}

/// Encode a command for `opcode` with the given payload.
pub fn encode(opcode: Opcode, payload: &[u8]) -> Result<Vec<u8>, PacketError> {
    Ok(ControlPacket::new(opcode, payload)?.to_bytes())
}

/// A frame split into its fields, before any opcode-specific decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: u8,
    pub declared_size: u8,
    pub payload: Vec<u8>,
    pub transmitted_checksum: u8,
}

impl Frame {
    /// Split a complete frame (markers through checksum).
    ///
    /// Checks the markers and that the size byte agrees with the buffer
    /// length. The checksum is not judged here; see [`Frame::computed_checksum`].
    pub fn parse(buf: &[u8]) -> Result<Self, ReplyError> {
        if buf.len() < HEADER_LEN + 1 {
            return Err(ReplyError::FrameTooShort { len: buf.len() });
        }
        if buf[0] != MARKER || buf[1] != MARKER {
            return Err(ReplyError::HeaderMismatch {
                first: buf[0],
                second: buf[1],
            });
        }

        let declared = buf[3] as usize;
        let actual = buf.len() - MARKER_LEN;
        if declared != actual {
            return Err(ReplyError::SizeMismatch { declared, actual });
        }

        Ok(Self {
            opcode: buf[2],
            declared_size: buf[3],
            payload: buf[HEADER_LEN..buf.len() - 1].to_vec(),
            transmitted_checksum: buf[buf.len() - 1],
        })
    }

    pub fn computed_checksum(&self) -> u8 {
        checksum(self.opcode, self.declared_size, &self.payload)
    }

    pub fn checksum_ok(&self) -> bool {
        self.computed_checksum() == self.transmitted_checksum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_firmware_version_query() {
        let bytes = encode(Opcode::QueryFirmwareVersion, &[]).unwrap();
        assert_eq!(bytes, vec![0xFF, 0xFF, 0x50, 0x03, 0x53]);
    }

    #[test]
    fn test_encode_identity_query() {
        let bytes = encode(Opcode::QueryIdentity, &[]).unwrap();
        assert_eq!(bytes, vec![0xFF, 0xFF, 0x26, 0x03, 0x29]);
    }

    #[test]
    fn test_size_law() {
        for len in [0usize, 1, 6, 100, MAX_PAYLOAD_LEN] {
            let packet = ControlPacket::new(0x43u8, vec![0xAA; len]).unwrap();
            assert_eq!(packet.declared_size() as usize, len + 3);
            assert_eq!(packet.to_bytes().len(), len + 5);
        }
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let err = ControlPacket::new(0x43u8, vec![0; MAX_PAYLOAD_LEN + 1]).unwrap_err();
        assert_eq!(
            err,
            PacketError::PayloadTooLarge {
                len: 252,
                max: MAX_PAYLOAD_LEN
            }
        );
    }

    #[test]
    fn test_checksum_wraps() {
        // 0x43 + 0x09 + 0xC0 + 0xA8 + 0x00 + 0x63 + 0x1F + 0x90 = 0x2C6
        let payload = [0xC0, 0xA8, 0x00, 0x63, 0x1F, 0x90];
        assert_eq!(checksum(0x43, 0x09, &payload), 0xC6);
    }

    #[test]
    fn test_single_byte_delta_shifts_checksum() {
        let base = vec![0x10, 0x20, 0x30, 0x40];
        let reference = checksum(0x26, 7, &base);
        for idx in 0..base.len() {
            for delta in [1u8, 0x7F, 0xFF] {
                let mut changed = base.clone();
                changed[idx] = changed[idx].wrapping_add(delta);
                assert_eq!(checksum(0x26, 7, &changed), reference.wrapping_add(delta));
            }
        }
    }

    #[test]
    fn test_frame_roundtrip_recovers_fields() {
        for len in 0..=MAX_PAYLOAD_LEN {
            let payload: Vec<u8> = (0..len).map(|i| (i * 7 + 3) as u8).collect();
            let packet = ControlPacket::new(0x50u8, payload.clone()).unwrap();
            let frame = Frame::parse(&packet.to_bytes()).unwrap();
            assert_eq!(frame.opcode, 0x50);
            assert_eq!(frame.payload, payload);
            assert_eq!(frame.transmitted_checksum, packet.checksum());
            assert!(frame.checksum_ok());
        }
    }

    #[test]
    fn test_frame_rejects_bad_marker() {
        let err = Frame::parse(&[0xFF, 0xFE, 0x50, 0x03, 0x53]).unwrap_err();
        assert!(matches!(
            err,
            ReplyError::HeaderMismatch {
                first: 0xFF,
                second: 0xFE
            }
        ));
    }

    #[test]
    fn test_frame_rejects_size_disagreement() {
        let err = Frame::parse(&[0xFF, 0xFF, 0x50, 0x05, 0x53]).unwrap_err();
        assert!(matches!(
            err,
            ReplyError::SizeMismatch {
                declared: 5,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_frame_too_short() {
        let err = Frame::parse(&[0xFF, 0xFF, 0x50]).unwrap_err();
        assert!(matches!(err, ReplyError::FrameTooShort { len: 3 }));
    }
}
