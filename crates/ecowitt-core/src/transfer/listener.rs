//! One-shot listener the device calls back on.

use std::io;
use std::net::{SocketAddr, SocketAddrV4, TcpListener, TcpStream};

use tracing::{debug, info, instrument};

use super::error::TransferError;
use crate::transport::{ByteStream, TransportError};

/// Listening socket bound beside the control connection.
///
/// Bound to the control channel's local address so the device can route
/// back to it on multi-homed hosts. Accepts exactly one connection; the
/// socket is closed when [`TransferListener::accept_once`] returns.
#[derive(Debug)]
pub struct TransferListener {
    listener: TcpListener,
    addr: SocketAddrV4,
}

impl TransferListener {
    /// Bind on the control stream's local address with an ephemeral port.
    pub fn prepare<S: ByteStream + ?Sized>(control: &S) -> Result<Self, TransferError> {
        let local = control.local_addr().map_err(TransportError::from)?;
        info!(%local, "Command socket address");
        Self::bind_beside(local)
    }

    #[instrument(level = "debug")]
    pub fn bind_beside(local: SocketAddr) -> Result<Self, TransferError> {
        let SocketAddr::V4(local) = local else {
            return Err(TransferError::CallbackNotIpv4(local));
        };

        let bind_addr = SocketAddrV4::new(*local.ip(), 0);
        let listener =
            TcpListener::bind(bind_addr).map_err(|e| TransportError::ListenFailed {
                addr: SocketAddr::V4(bind_addr),
                message: e.to_string(),
            })?;

        let addr = match listener.local_addr().map_err(TransportError::from)? {
            SocketAddr::V4(addr) => addr,
            other => return Err(TransferError::CallbackNotIpv4(other)),
        };
        info!(%addr, "Firmware server socket bound");
        Ok(Self { listener, addr })
    }

    /// Address and port to hand the device in WRITE_UPDATE.
    pub fn local_addr(&self) -> SocketAddrV4 {
        self.addr
    }

    /// Block until one inbound connection arrives, then close the listener.
    pub fn accept_once(self) -> Result<(TcpStream, SocketAddr), TransferError> {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    info!(%peer, "Received inbound connection");
                    return Ok((stream, peer));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    debug!("accept interrupted, retrying");
                    continue;
                }
                Err(e) => return Err(TransportError::AcceptFailed(e.to_string()).into()),
            }
        }
    }
}
