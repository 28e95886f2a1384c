//! Reply reader: pull one framed message off the control channel.

use std::time::Duration;

use tracing::{debug, trace};

use super::constants::{HEADER_LEN, MARKER, MARKER_LEN, MIN_DECLARED_SIZE};
use super::error::ReplyError;
use crate::transport::{ByteStream, TransportError, read_unbounded, timed_read};

/// Read one reply frame, markers through checksum.
///
/// Waits without bound for the first marker byte, discarding anything
/// before it; the device may take a while to answer. Every read after that
/// is bounded by `timeout`. Only the bytes the size field owes are
/// consumed, so a following frame stays in the stream.
pub fn read_packet<S: ByteStream + ?Sized>(
    stream: &mut S,
    max_len: usize,
    timeout: Duration,
) -> Result<Vec<u8>, ReplyError> {
    let mut byte = [0u8; 1];
    let mut skipped = 0usize;
    loop {
        if read_unbounded(stream, &mut byte)? == 0 {
            return Err(TransportError::ConnectionClosed.into());
        }
        if byte[0] == MARKER {
            break;
        }
        skipped += 1;
    }
    if skipped > 0 {
        debug!(skipped, "Discarded bytes before reply marker");
    }

    let mut packet = Vec::with_capacity(max_len.min(MARKER_LEN + u8::MAX as usize));
    packet.push(MARKER);
    fill(stream, &mut packet, HEADER_LEN, timeout)?;

    let size = packet[3] as usize;
    if size + MARKER_LEN > max_len {
        return Err(ReplyError::SizeOverflow {
            size,
            capacity: max_len,
        });
    }
    if size < MIN_DECLARED_SIZE {
        return Err(ReplyError::FrameTooShort {
            len: size + MARKER_LEN,
        });
    }

    fill(stream, &mut packet, MARKER_LEN + size, timeout)?;
    trace!(len = packet.len(), opcode = %format!("0x{:02X}", packet[2]), "Reply frame read");
    Ok(packet)
}

fn fill<S: ByteStream + ?Sized>(
    stream: &mut S,
    packet: &mut Vec<u8>,
    target: usize,
    timeout: Duration,
) -> Result<(), ReplyError> {
    let mut chunk = [0u8; 256];
    while packet.len() < target {
        let want = (target - packet.len()).min(chunk.len());
        let n = timed_read(stream, &mut chunk[..want], timeout)?;
        if n == 0 {
            return Err(TransportError::ConnectionClosed.into());
        }
        packet.extend_from_slice(&chunk[..n]);
    }
    Ok(())
}
