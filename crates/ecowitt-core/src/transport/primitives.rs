//! Blocking byte-stream primitives shared by both channels.

use std::io::{self, Read, Write};
use std::time::Duration;

use tracing::trace;

use super::traits::{ByteStream, TransportError};

/// Write the whole buffer, retrying short and interrupted writes.
pub fn send_all<S: Write + ?Sized>(stream: &mut S, data: &[u8]) -> Result<(), TransportError> {
    stream
        .write_all(data)
        .and_then(|()| stream.flush())
        .map_err(|e| TransportError::from_io(e, None))?;
    trace!(len = data.len(), "Sent");
    Ok(())
}

/// Read with no time bound. Returns 0 when the peer has closed.
pub fn read_unbounded<S: ByteStream + ?Sized>(
    stream: &mut S,
    buf: &mut [u8],
) -> Result<usize, TransportError> {
    stream.set_read_timeout(None)?;
    read_retrying(stream, buf, None)
}

/// Read whatever arrives within `timeout`. Returns 0 when the peer has
/// closed, `Timeout` when nothing arrived in time.
pub fn timed_read<S: ByteStream + ?Sized>(
    stream: &mut S,
    buf: &mut [u8],
    timeout: Duration,
) -> Result<usize, TransportError> {
    // A zero read timeout is rejected by the OS.
    let timeout = timeout.max(Duration::from_millis(1));
    stream.set_read_timeout(Some(timeout))?;
    read_retrying(stream, buf, Some(timeout))
}

fn read_retrying<S: Read + ?Sized>(
    stream: &mut S,
    buf: &mut [u8],
    timeout: Option<Duration>,
) -> Result<usize, TransportError> {
    loop {
        match stream.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(TransportError::from_io(e, timeout)),
        }
    }
}

/// Read one byte at a time until a NUL is seen.
///
/// Returns the bytes read including the NUL, `None` if the peer closed
/// before a terminator arrived, or `limit` bytes without a terminator if
/// the token is longer than that.
pub fn read_until_null<S: Read + ?Sized>(
    stream: &mut S,
    limit: usize,
) -> Result<Option<Vec<u8>>, TransportError> {
    let mut token = Vec::new();
    let mut byte = [0u8; 1];
    while token.len() < limit {
        if read_retrying(stream, &mut byte, None)? == 0 {
            if !token.is_empty() {
                trace!(partial = token.len(), "Peer closed mid-token");
            }
            return Ok(None);
        }
        token.push(byte[0]);
        if byte[0] == 0 {
            break;
        }
    }
    Ok(Some(token))
}
