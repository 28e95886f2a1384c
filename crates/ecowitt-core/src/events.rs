//! Event system for UI decoupling.
//!
//! Allows a CLI (or anything else) to follow the control exchange and the
//! firmware transfer without the core printing anything itself.

use std::fmt;
use std::net::{SocketAddr, SocketAddrV4};

use crate::protocol::IntegrityWarning;
use crate::transfer::{ImageSlot, TransferState};

/// Log level for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Phases of an update run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    /// Connected, nothing in flight.
    Idle,
    /// Identity / version queries.
    Querying,
    /// Binding the transfer listener.
    PreparingTransfer,
    /// WRITE_UPDATE sent, waiting for the device's verdict.
    RequestingUpdate,
    /// Waiting for the device to call back.
    WaitingForDevice,
    /// Image being streamed.
    Transferring,
    Complete,
    Error,
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdatePhase::Idle => write!(f, "Idle"),
            UpdatePhase::Querying => write!(f, "Querying"),
            UpdatePhase::PreparingTransfer => write!(f, "Preparing Transfer"),
            UpdatePhase::RequestingUpdate => write!(f, "Requesting Update"),
            UpdatePhase::WaitingForDevice => write!(f, "Waiting for Device"),
            UpdatePhase::Transferring => write!(f, "Transferring"),
            UpdatePhase::Complete => write!(f, "Complete"),
            UpdatePhase::Error => write!(f, "Error"),
        }
    }
}

/// Packet direction on the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketDirection {
    Tx, // Host -> Device
    Rx, // Device -> Host
}

impl fmt::Display for PacketDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketDirection::Tx => write!(f, "TX"),
            PacketDirection::Rx => write!(f, "RX"),
        }
    }
}

/// Events emitted by the control session and the transfer service.
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    PhaseChanged {
        from: UpdatePhase,
        to: UpdatePhase,
    },
    /// Control packet sent/received.
    Packet {
        direction: PacketDirection,
        opcode: u8,
        length: usize,
        data: Option<Vec<u8>>,
    },
    /// A reply decoded successfully.
    ReplyDecoded { opcode: u8, summary: String },
    /// Non-fatal integrity problem in a reply.
    Integrity(IntegrityWarning),
    /// Transfer listener is ready.
    Listening { addr: SocketAddrV4 },
    /// Device opened the transfer connection.
    TransferConnected { peer: SocketAddr },
    TokenReceived { token: String },
    StateChanged {
        from: TransferState,
        to: TransferState,
    },
    SizeAnnounced { image: ImageSlot, size: u64 },
    /// A chunk was sent.
    Progress {
        packets_sent: u32,
        bytes_sent: u64,
        total: u64,
    },
    Log { level: LogLevel, message: String },
    /// Transfer finished with `end`.
    Complete { packets_sent: u32, bytes_sent: u64 },
}

/// Observer trait for receiving update events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait UpdateObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &UpdateEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl UpdateObserver for NullObserver {
    fn on_event(&self, _event: &UpdateEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl UpdateObserver for TracingObserver {
    fn on_event(&self, event: &UpdateEvent) {
        match event {
            UpdateEvent::PhaseChanged { from, to } => {
                tracing::info!(from = %from, to = %to, "Phase changed");
            }
            UpdateEvent::Packet {
                direction,
                opcode,
                length,
                data,
            } => {
                tracing::trace!(
                    dir = %direction,
                    opcode = %format!("0x{:02X}", opcode),
                    len = length,
                    data = ?data.as_deref().map(HexBytes),
                    "Control packet"
                );
            }
            UpdateEvent::ReplyDecoded { opcode, summary } => {
                tracing::debug!(opcode = %format!("0x{:02X}", opcode), "Reply: {}", summary);
            }
            UpdateEvent::Integrity(warning) => {
                tracing::warn!("Reply integrity: {}", warning);
            }
            UpdateEvent::Listening { addr } => {
                tracing::info!(%addr, "Firmware server listening");
            }
            UpdateEvent::TransferConnected { peer } => {
                tracing::info!(%peer, "Device connected for transfer");
            }
            UpdateEvent::TokenReceived { token } => {
                tracing::debug!(token = %token, ">>>");
            }
            UpdateEvent::StateChanged { from, to } => {
                tracing::debug!(from = %from, to = %to, "Transfer state");
            }
            UpdateEvent::SizeAnnounced { image, size } => {
                tracing::info!(image = %image, size, "Announced image size");
            }
            UpdateEvent::Progress {
                packets_sent,
                bytes_sent,
                total,
            } => {
                let pct = if *total > 0 {
                    (*bytes_sent * 100) / *total
                } else {
                    0
                };
                tracing::debug!(
                    packet = packets_sent,
                    sent = bytes_sent,
                    progress = %format!("{}%", pct),
                    "Chunk sent"
                );
            }
            UpdateEvent::Log { level, message } => match level {
                LogLevel::Trace => tracing::trace!("{}", message),
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
            UpdateEvent::Complete {
                packets_sent,
                bytes_sent,
            } => {
                tracing::info!(packets_sent, bytes_sent, "Transfer complete");
            }
        }
    }
}

/// Space-separated hex rendering for packet logs.
struct HexBytes<'a>(&'a [u8]);

impl fmt::Debug for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::{UpdateEvent, UpdateObserver};

    /// Observer that keeps every event for inspection.
    #[derive(Default)]
    pub struct RecordingObserver {
        events: Mutex<Vec<UpdateEvent>>,
    }

    impl RecordingObserver {
        pub fn events(&self) -> Vec<UpdateEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl UpdateObserver for RecordingObserver {
        fn on_event(&self, event: &UpdateEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }
}
