//! Ecowitt-Core: firmware update engine for Ecowitt weather station gateways.
//!
//! This crate talks to a station over its TCP control channel (framed,
//! checksummed command packets) and serves firmware images to it over the
//! callback connection the station opens once an update is requested.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Packet codec, reply reader and interpreter, transfer tokens
//! - **Transport**: Byte-stream abstraction (TCP, mock) and I/O primitives
//! - **Transfer**: Callback listener, token state machine, image streaming
//! - **Events**: Observer pattern for UI decoupling
//! - **Session**: High-level orchestrator
//!
//! # Example
//!
//! ```no_run
//! use ecowitt_core::session::{ControlSession, SessionConfig};
//! use ecowitt_core::transfer::{FirmwareImage, FirmwareImages};
//! use ecowitt_core::transport;
//!
//! let config = SessionConfig::default();
//! let stream = transport::connect("192.168.1.20", 45000, config.connect_timeout())?;
//! let mut session = ControlSession::new(stream, config);
//!
//! let identity = session.read_identity()?;
//! println!("{} running {}", identity.mac, identity.firmware_version);
//!
//! let mut images = FirmwareImages::single(FirmwareImage::open("user1.bin")?);
//! let report = session.perform_update(&mut images)?;
//! println!("sent {} bytes", report.bytes_sent);
//! # Ok::<(), ecowitt_core::Error>(())
//! ```

pub mod error;
pub mod events;
pub mod protocol;
pub mod session;
pub mod transfer;
pub mod transport;

// Re-exports for convenience
pub use error::{Error, Result};
pub use events::{LogLevel, NullObserver, TracingObserver, UpdateEvent, UpdateObserver, UpdatePhase};
pub use protocol::{MacAddress, Opcode, ReplyError};
pub use session::{ControlSession, DeviceIdentity, SessionConfig};
pub use transfer::{FirmwareImage, FirmwareImages, ImageSlot, TransferError, TransferReport};
pub use transport::{ByteStream, MockStream, TransportError};
