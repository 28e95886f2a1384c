//! Byte-stream transport abstraction.
//!
//! Defines the `ByteStream` trait used by the control session and the
//! transfer service, allowing different implementations (TCP, mock).

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Could not resolve {host}:{port}: {message}")]
    ResolveFailed {
        host: String,
        port: u16,
        message: String,
    },

    #[error("Cannot connect to {target}: {message}")]
    ConnectFailed { target: String, message: String },

    #[error("Cannot listen on {addr}: {message}")]
    ListenFailed { addr: SocketAddr, message: String },

    #[error("Cannot accept incoming connection: {0}")]
    AcceptFailed(String),

    #[error("Connection closed by remote")]
    ConnectionClosed,

    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Map an I/O error from a read or write, folding peer-gone and
    /// timed-out conditions into their dedicated variants.
    pub fn from_io(err: io::Error, timeout: Option<Duration>) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => TransportError::Timeout {
                timeout_ms: timeout.map(|t| t.as_millis() as u64).unwrap_or(0),
            },
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::WriteZero => TransportError::ConnectionClosed,
            _ => TransportError::Io(err),
        }
    }
}

/// A connected, bidirectional byte stream.
///
/// This trait enables:
/// - Production implementation over `std::net::TcpStream`
/// - Scripted mock implementation for unit testing
pub trait ByteStream: Read + Write {
    /// Bound (or unbound, with `None`) subsequent reads.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    /// Local end of the connection.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Remote end of the connection.
    fn peer_addr(&self) -> io::Result<SocketAddr>;
}

impl ByteStream for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::local_addr(self)
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::peer_addr(self)
    }
}
