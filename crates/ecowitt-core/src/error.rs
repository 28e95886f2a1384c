//! Crate-level error type.

use thiserror::Error;

use crate::protocol::{PacketError, ReplyError};
use crate::transfer::TransferError;
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Packet(#[from] PacketError),

    #[error(transparent)]
    Reply(#[from] ReplyError),

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl Error {
    /// The device answered and declined the update.
    pub fn is_update_rejected(&self) -> bool {
        matches!(self, Error::Reply(ReplyError::UpdateRejected { .. }))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
