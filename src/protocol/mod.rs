//! # Packet header
//!
//! ```text
//! 7   6   5   4   3   2       0 (BIT)
//! +---+---+---+---+---+-------+
//! |SOF|ACK|FRG|FIN|RTX|  ulp  |  control
//! +---+---+---+---+---+-------+
//! |   reserved    |    len    |  length
//! +---------------+-----------+
//! |         checksum          |
//! +---------------------------+
//! ```
//!
//! # Frame
//!
//! ```text
//! 0         1        2          3             3 + len (BYTE)
//! +---------+--------+----------+-------------+
//! | control | length | checksum |   payload   |
//! +---------+--------+----------+-------------+
//! ```
//!
//! # Invariants
//!
//! - `len` is at most `15`
//! - `checksum` is the CRC-8 of `control`, `length` and `payload`, in that order
//! - reserved bits are written as `0` and ignored when read

use thiserror::Error;

pub mod checksum;
pub mod flags;
pub mod frag;
pub mod packet;
pub mod packet_hdr;
pub mod reply;
pub mod ulp;

pub use checksum::checksum;
pub use flags::Flags;
pub use frag::{fragment, FragSequence, Reassembler, ReassemblyError};
pub use packet::{frame_len, Packet, PacketBuilder};
pub use packet_hdr::{PacketHeader, HDR_LEN};
pub use reply::{build_ack, build_nack, Reply};
pub use ulp::Ulp;

pub const MAX_PAYLOAD_LEN: usize = 15;
pub const MAX_FRAME_LEN: usize = HDR_LEN + MAX_PAYLOAD_LEN;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("invalid argument: {field}")]
    InvalidArgument { field: &'static str },
    #[error("data length invalid: declared {declared}, available {available}")]
    DataLengthInvalid { declared: usize, available: usize },
    #[error("checksum mismatch: received {received:#04x}, computed {computed:#04x}")]
    ChecksumMismatch { received: u8, computed: u8 },
    #[error("out of memory")]
    OutOfMemory,
}

pub type Result<T> = std::result::Result<T, Error>;
