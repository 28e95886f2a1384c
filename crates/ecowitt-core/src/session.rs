//! Control session - high-level orchestrator for queries and updates.

use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::events::{PacketDirection, TracingObserver, UpdateEvent, UpdateObserver, UpdatePhase};
use crate::protocol::constants::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_REPLY_TIMEOUT, MARKER_LEN, REPLY_BUFFER_SIZE,
};
use crate::protocol::{
    DecodedReply, InterpretOptions, MacAddress, Opcode, Reply, ReplyError, encode, interpret,
    read_packet,
};
use crate::transfer::{FirmwareImages, TransferListener, TransferReport, serve_transfer};
use crate::transport::{ByteStream, send_all};

/// Configuration for a control session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Bound on each read after a reply's first marker byte.
    pub reply_timeout_ms: u64,
    /// Bound on establishing the control connection.
    pub connect_timeout_ms: u64,
    /// Largest reply frame accepted, markers through checksum.
    pub max_reply_len: usize,
    /// Fail on a reply checksum mismatch instead of warning.
    pub strict_checksum: bool,
    /// Emit raw packet events for every request and reply.
    pub emit_packets: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reply_timeout_ms: DEFAULT_REPLY_TIMEOUT.as_millis() as u64,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            max_reply_len: REPLY_BUFFER_SIZE,
            strict_checksum: false,
            emit_packets: true,
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn interpret_options(&self) -> InterpretOptions {
        InterpretOptions {
            strict_checksum: self.strict_checksum,
        }
    }
}

/// What the station reports about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub mac: MacAddress,
    pub firmware_version: String,
}

/// Control session over one connected stream.
///
/// Exchanges are strictly sequential: each request waits for its reply
/// before the next is sent, and a firmware update arms its transfer
/// listener only after the device has accepted the request.
pub struct ControlSession<S: ByteStream, O: UpdateObserver = TracingObserver> {
    stream: S,
    config: SessionConfig,
    observer: Arc<O>,
    phase: UpdatePhase,
}

impl<S: ByteStream> ControlSession<S, TracingObserver> {
    /// Create a new session with default tracing observer.
    pub fn new(stream: S, config: SessionConfig) -> Self {
        Self::with_observer(stream, config, Arc::new(TracingObserver))
    }
}

impl<S: ByteStream, O: UpdateObserver> ControlSession<S, O> {
    /// Create a new session with a custom observer.
    pub fn with_observer(stream: S, config: SessionConfig, observer: Arc<O>) -> Self {
        Self {
            stream,
            config,
            observer,
            phase: UpdatePhase::Idle,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn phase(&self) -> UpdatePhase {
        self.phase
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Read the station's MAC address (READ_STATION_MAC).
    #[instrument(skip(self))]
    pub fn query_identity(&mut self) -> Result<MacAddress> {
        let decoded = self.exchange(Opcode::QueryIdentity, &[])?;
        match decoded.reply {
            Reply::Identity(mac) => {
                info!(%mac, "Station MAC");
                Ok(mac)
            }
            _ => Err(unexpected(Opcode::QueryIdentity, &decoded)),
        }
    }

    /// Read the station's firmware version string (READ_FIRMWARE_VERSION).
    #[instrument(skip(self))]
    pub fn query_firmware_version(&mut self) -> Result<String> {
        let decoded = self.exchange(Opcode::QueryFirmwareVersion, &[])?;
        match decoded.reply {
            Reply::FirmwareVersion(version) => {
                info!(version = %version, "Firmware version");
                Ok(version)
            }
            _ => Err(unexpected(Opcode::QueryFirmwareVersion, &decoded)),
        }
    }

    /// Ask the station to fetch new firmware from `addr:port` (WRITE_UPDATE).
    ///
    /// Fails with [`ReplyError::UpdateRejected`] if the station answers with
    /// a nonzero status.
    #[instrument(skip(self))]
    pub fn request_update(&mut self, addr: Ipv4Addr, port: u16) -> Result<()> {
        let mut payload = Vec::with_capacity(6);
        payload.extend_from_slice(&addr.octets());
        payload.extend_from_slice(&port.to_be_bytes());

        let decoded = self.exchange(Opcode::RequestUpdate, &payload)?;
        match decoded.reply {
            Reply::UpdateAccepted => {
                info!("Update request accepted");
                Ok(())
            }
            _ => Err(unexpected(Opcode::RequestUpdate, &decoded)),
        }
    }

    /// Query MAC and firmware version in turn.
    pub fn read_identity(&mut self) -> Result<DeviceIdentity> {
        self.set_phase(UpdatePhase::Querying);
        let result = self.query_identity().and_then(|mac| {
            let firmware_version = self.query_firmware_version()?;
            Ok(DeviceIdentity {
                mac,
                firmware_version,
            })
        });
        self.finish_phase(&result, UpdatePhase::Idle);
        result
    }

    /// Run a complete firmware update.
    ///
    /// Binds a listener beside the control connection, tells the station
    /// where to call back, accepts exactly one connection and serves the
    /// requested image over it. The listener is closed once the device has
    /// connected.
    #[instrument(skip_all)]
    pub fn perform_update(&mut self, images: &mut FirmwareImages) -> Result<TransferReport> {
        let result = self.run_update(images);
        self.finish_phase(&result, UpdatePhase::Complete);
        result
    }

    fn run_update(&mut self, images: &mut FirmwareImages) -> Result<TransferReport> {
        self.set_phase(UpdatePhase::PreparingTransfer);
        let listener = TransferListener::prepare(&self.stream)?;
        let addr = listener.local_addr();
        self.observer.on_event(&UpdateEvent::Listening { addr });

        self.set_phase(UpdatePhase::RequestingUpdate);
        self.request_update(*addr.ip(), addr.port())?;

        self.set_phase(UpdatePhase::WaitingForDevice);
        info!(%addr, "Waiting for device to connect");
        let (mut conn, peer) = listener.accept_once()?;
        self.observer
            .on_event(&UpdateEvent::TransferConnected { peer });

        self.set_phase(UpdatePhase::Transferring);
        let report = serve_transfer(&mut conn, images, self.observer.as_ref())?;
        if !report.completed {
            warn!(state = %report.final_state, "Transfer ended without END from device");
        }
        Ok(report)
    }

    /// Send one request and decode its reply.
    fn exchange(&mut self, opcode: Opcode, payload: &[u8]) -> Result<DecodedReply> {
        let request = encode(opcode, payload)?;
        self.emit_packet(PacketDirection::Tx, opcode.code(), &request);
        send_all(&mut self.stream, &request)?;

        let raw = read_packet(
            &mut self.stream,
            self.config.max_reply_len,
            self.config.reply_timeout(),
        )?;
        let received = raw.get(MARKER_LEN).copied().unwrap_or_default();
        self.emit_packet(PacketDirection::Rx, received, &raw);

        let decoded = interpret(opcode, &raw, self.config.interpret_options())?;
        for warning in &decoded.warnings {
            self.observer.on_event(&UpdateEvent::Integrity(*warning));
        }
        self.observer.on_event(&UpdateEvent::ReplyDecoded {
            opcode: decoded.opcode(),
            summary: decoded.reply.describe(),
        });
        Ok(decoded)
    }

    fn emit_packet(&self, direction: PacketDirection, opcode: u8, bytes: &[u8]) {
        if !self.config.emit_packets {
            return;
        }
        self.observer.on_event(&UpdateEvent::Packet {
            direction,
            opcode,
            length: bytes.len(),
            data: Some(bytes.to_vec()),
        });
    }

    fn set_phase(&mut self, to: UpdatePhase) {
        if self.phase != to {
            let from = self.phase;
            self.phase = to;
            self.observer
                .on_event(&UpdateEvent::PhaseChanged { from, to });
        }
    }

    fn finish_phase<T>(&mut self, result: &Result<T>, success: UpdatePhase) {
        match result {
            Ok(_) => self.set_phase(success),
            Err(_) => self.set_phase(UpdatePhase::Error),
        }
    }
}

fn unexpected(expected: Opcode, decoded: &DecodedReply) -> crate::error::Error {
    ReplyError::UnexpectedReply {
        expected: expected.code(),
        received: decoded.opcode(),
    }
    .into()
}
