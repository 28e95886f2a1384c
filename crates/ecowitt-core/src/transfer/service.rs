//! Serve one firmware transfer connection.
//!
//! ```text
//! device -> "user1.bin\0" | "user2.bin\0"
//! engine <- image size, 4 bytes big-endian
//! device -> "start\0"
//! engine <- first chunk (<= 1024 bytes)
//! device -> "continue\0"          (repeated)
//! engine <- next chunk
//! device -> "end\0", then closes
//! ```

use std::io::{Read, Write};

use byteorder::{BigEndian, ByteOrder};
use tracing::{info, instrument, warn};

use super::error::TransferError;
use super::image::{FirmwareImages, ImageSlot};
use super::machine::{TransferAction, TransferSession, TransferState};
use crate::events::{LogLevel, UpdateEvent, UpdateObserver};
use crate::protocol::constants::{CHUNK_SIZE, MAX_TOKEN_LEN};
use crate::protocol::TransferToken;
use crate::protocol::token::printable;
use crate::transport::{read_until_null, send_all};

/// Outcome of a transfer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// Image the device asked for, if it got that far.
    pub image: Option<ImageSlot>,
    /// Size announced for that image.
    pub image_size: Option<u64>,
    pub packets_sent: u32,
    pub bytes_sent: u64,
    /// Whether the device said `end` before disconnecting.
    pub completed: bool,
    pub final_state: TransferState,
}

/// Run the token protocol on an accepted transfer connection until the
/// device sends `end` or disconnects.
///
/// A disconnect before `end` is reported through
/// [`TransferReport::completed`], not as an error.
#[instrument(skip_all)]
pub fn serve_transfer<S, O>(
    stream: &mut S,
    images: &mut FirmwareImages,
    observer: &O,
) -> Result<TransferReport, TransferError>
where
    S: Read + Write + ?Sized,
    O: UpdateObserver + ?Sized,
{
    let mut session = TransferSession::new(images.has_second());
    let mut image_size = None;
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let Some(raw) = read_until_null(stream, MAX_TOKEN_LEN)? else {
            warn!(state = %session.state(), "Client closed the connection before END");
            observer.on_event(&UpdateEvent::Log {
                level: LogLevel::Warn,
                message: "Client closed the connection before END".into(),
            });
            break;
        };
        if !raw.ends_with(&[0]) {
            return Err(TransferError::TokenTooLong {
                limit: MAX_TOKEN_LEN,
            });
        }

        let text = printable(&raw);
        observer.on_event(&UpdateEvent::TokenReceived {
            token: text.clone(),
        });
        let token = TransferToken::parse(&raw).ok_or(TransferError::ProtocolViolation {
            state: session.state(),
            token: text,
        })?;

        let from = session.state();
        let action = session.on_token(token)?;
        if session.state() != from {
            observer.on_event(&UpdateEvent::StateChanged {
                from,
                to: session.state(),
            });
        }

        match action {
            TransferAction::AnnounceSize(slot) => {
                let image = images
                    .get_mut(slot)
                    .ok_or(TransferError::ImageUnavailable { slot })?;
                image.rewind().map_err(TransferError::ImageRead)?;
                let size = image.size();
                let announced =
                    u32::try_from(size).map_err(|_| TransferError::ImageTooLarge { size })?;

                let mut msg = [0u8; 4];
                BigEndian::write_u32(&mut msg, announced);
                send_all(stream, &msg)?;

                info!(image = %slot, size, "File size announced");
                observer.on_event(&UpdateEvent::SizeAnnounced { image: slot, size });
                image_size = Some(size);
            }
            TransferAction::SendChunk(slot) => {
                let image = images
                    .get_mut(slot)
                    .ok_or(TransferError::ImageUnavailable { slot })?;
                let n = image.read_chunk(&mut buf).map_err(TransferError::ImageRead)?;
                if n == 0 {
                    // The device knows the size and should have sent "end".
                    warn!(
                        packets_sent = session.packets_sent(),
                        bytes_sent = session.bytes_sent(),
                        "At EOF on firmware image, device asked for more"
                    );
                    observer.on_event(&UpdateEvent::Log {
                        level: LogLevel::Warn,
                        message: format!(
                            "At EOF on firmware image after {} packets, {} bytes",
                            session.packets_sent(),
                            session.bytes_sent()
                        ),
                    });
                    continue;
                }

                send_all(stream, &buf[..n])?;
                session.record_chunk(n);
                observer.on_event(&UpdateEvent::Progress {
                    packets_sent: session.packets_sent(),
                    bytes_sent: session.bytes_sent(),
                    total: image.size(),
                });
            }
            TransferAction::Finish => {
                observer.on_event(&UpdateEvent::Complete {
                    packets_sent: session.packets_sent(),
                    bytes_sent: session.bytes_sent(),
                });
                break;
            }
        }
    }

    info!(
        packets_sent = session.packets_sent(),
        bytes_sent = session.bytes_sent(),
        "Transfer finished"
    );

    Ok(TransferReport {
        image: session.selected(),
        image_size,
        packets_sent: session.packets_sent(),
        bytes_sent: session.bytes_sent(),
        completed: session.is_finished(),
        final_state: session.state(),
    })
}
