//! Transport layer module.

pub mod mock;
pub mod primitives;
pub mod tcp;
pub mod traits;

pub use mock::MockStream;
pub use primitives::{read_unbounded, read_until_null, send_all, timed_read};
pub use tcp::connect;
pub use traits::{ByteStream, TransportError};
