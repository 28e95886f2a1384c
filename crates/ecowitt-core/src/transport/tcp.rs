//! TCP transport: connecting the control channel.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use super::traits::TransportError;

/// Resolve `host:port` to IPv4 addresses and connect to the first one that
/// answers. Gateways only speak IPv4.
#[instrument(level = "info", skip(timeout), fields(timeout_ms = timeout.as_millis() as u64))]
pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, TransportError> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| TransportError::ResolveFailed {
            host: host.to_string(),
            port,
            message: e.to_string(),
        })?
        .filter(SocketAddr::is_ipv4)
        .collect();

    if addrs.is_empty() {
        return Err(TransportError::ResolveFailed {
            host: host.to_string(),
            port,
            message: "no IPv4 address".into(),
        });
    }

    let mut last_error = None;
    for addr in addrs {
        debug!(%addr, "Attempting to connect");
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(error = %e, "Could not disable Nagle");
                }
                info!(%addr, "Connected to device");
                return Ok(stream);
            }
            Err(e) => {
                warn!(%addr, error = %e, "Connect failed");
                last_error = Some(e);
            }
        }
    }

    Err(TransportError::ConnectFailed {
        target: format!("{host}:{port}"),
        message: last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no address tried".into()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_connect_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let stream = connect("127.0.0.1", port, Duration::from_secs(2)).unwrap();
        assert_eq!(stream.peer_addr().unwrap().port(), port);
    }

    #[test]
    fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = connect("127.0.0.1", port, Duration::from_millis(500)).unwrap_err();
        assert!(matches!(err, TransportError::ConnectFailed { .. }));
    }

    #[test]
    fn test_ipv6_only_host_rejected() {
        let err = connect("::1", 45000, Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, TransportError::ResolveFailed { .. }));
    }
}
