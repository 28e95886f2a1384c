//! Protocol module - gateway control packet and transfer token definitions.

pub mod constants;
pub mod cursor;
pub mod error;
pub mod opcode;
pub mod packet;
pub mod reader;
pub mod reply;
pub mod token;

pub use constants::*;
pub use cursor::PayloadCursor;
pub use error::{PacketError, ReplyError};
pub use opcode::Opcode;
pub use packet::{ControlPacket, Frame, checksum, encode};
pub use reader::read_packet;
pub use reply::{DecodedReply, IntegrityWarning, InterpretOptions, MacAddress, Reply, interpret};
pub use token::TransferToken;
