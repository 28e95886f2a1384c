//! Firmware transfer module: the device-initiated second connection.

pub mod error;
pub mod image;
pub mod listener;
pub mod machine;
pub mod service;

pub use error::TransferError;
pub use image::{FirmwareImage, FirmwareImages, ImageSlot, ImageSource};
pub use listener::TransferListener;
pub use machine::{TransferAction, TransferSession, TransferState, chunk_count};
pub use service::{TransferReport, serve_transfer};
