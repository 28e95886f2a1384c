//! Transfer-channel error types.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use super::image::ImageSlot;
use super::machine::TransferState;
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Protocol violation: unexpected \"{token}\" in state {state}")]
    ProtocolViolation { state: TransferState, token: String },

    #[error("Device requested {slot}, but no such firmware image was supplied")]
    ImageUnavailable { slot: ImageSlot },

    #[error("Token exceeds {limit} bytes without a terminator")]
    TokenTooLong { limit: usize },

    #[error("Image of {size} bytes does not fit the 4-byte size announcement")]
    ImageTooLarge { size: u64 },

    #[error("Callback address {0} is not IPv4")]
    CallbackNotIpv4(SocketAddr),

    #[error("Cannot open firmware image {path:?}: {source}")]
    ImageOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Firmware image read failed: {0}")]
    ImageRead(#[source] io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
