//! Scripted byte-stream transport for testing.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::traits::ByteStream;

#[derive(Debug)]
enum ScriptedRead {
    Data(Vec<u8>),
    /// Nothing arrives; the read times out.
    Stall,
}

/// Mock stream for unit testing the codec, reader and state machine.
///
/// Reads are served from a queue of scripted chunks; an exhausted queue
/// reads as end-of-stream. Writes are captured.
pub struct MockStream {
    /// Queued inbound data.
    reads: VecDeque<ScriptedRead>,
    /// Captured writes, one entry per `write` call.
    write_log: Arc<Mutex<Vec<Vec<u8>>>>,
    /// Whether the peer still accepts writes.
    writable: bool,
    read_timeout: Option<Duration>,
    local: SocketAddr,
    peer: SocketAddr,
}

impl MockStream {
    pub fn new() -> Self {
        Self {
            reads: VecDeque::new(),
            write_log: Arc::new(Mutex::new(Vec::new())),
            writable: true,
            read_timeout: None,
            local: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 50000)),
            peer: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 20), 45000)),
        }
    }

    /// Queue bytes to be returned by subsequent reads.
    pub fn queue_read(&mut self, bytes: &[u8]) {
        self.reads.push_back(ScriptedRead::Data(bytes.to_vec()));
    }

    /// Queue a read that times out.
    pub fn queue_stall(&mut self) {
        self.reads.push_back(ScriptedRead::Stall);
    }

    /// Make subsequent writes fail as if the peer had gone away.
    pub fn close_writes(&mut self) {
        self.writable = false;
    }

    pub fn set_local_addr(&mut self, addr: SocketAddr) {
        self.local = addr;
    }

    /// All captured writes, concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.write_log.lock().unwrap().concat()
    }

    /// Captured writes, one entry per `write` call.
    pub fn get_writes(&self) -> Vec<Vec<u8>> {
        self.write_log.lock().unwrap().clone()
    }

    pub fn clear_writes(&self) {
        self.write_log.lock().unwrap().clear();
    }

    /// Read timeout most recently set by the code under test.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Whether every scripted read has been consumed.
    pub fn is_drained(&self) -> bool {
        self.reads.is_empty()
    }
}

impl Default for MockStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.reads.pop_front() {
                None => return Ok(0),
                Some(ScriptedRead::Stall) => {
                    return Err(io::Error::new(io::ErrorKind::WouldBlock, "scripted stall"));
                }
                Some(ScriptedRead::Data(data)) if data.is_empty() => continue,
                Some(ScriptedRead::Data(mut data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    if n < data.len() {
                        let rest = data.split_off(n);
                        self.reads.push_front(ScriptedRead::Data(rest));
                    }
                    return Ok(n);
                }
            }
        }
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.writable {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer closed"));
        }
        self.write_log.lock().unwrap().push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ByteStream for MockStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.read_timeout = timeout;
        Ok(())
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local)
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.peer)
    }
}
