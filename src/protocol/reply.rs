use super::{Flags, Packet, PacketBuilder, Result, Ulp};

/// Filler payloads; receivers never inspect them
pub const ACK_FILLER: u8 = 0x06;
pub const NACK_FILLER: u8 = 0x15;

pub fn build_ack(ulp: Ulp) -> Result<Packet> {
    PacketBuilder {
        flags: Flags::ACK,
        ulp,
        payload: &[ACK_FILLER],
    }
    .build()
}

/// Identical in shape to a one-byte data packet with no flags set; only the
/// "reply expected" context makes it a NACK.
pub fn build_nack(ulp: Ulp) -> Result<Packet> {
    PacketBuilder {
        flags: Flags::empty(),
        ulp,
        payload: &[NACK_FILLER],
    }
    .build()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Ack,
    Nack,
}

impl Reply {
    /// Reads a validated packet received while a reply was expected
    #[must_use]
    pub fn of(packet: &Packet) -> Self {
        if packet.flags().contains(Flags::ACK) {
            Reply::Ack
        } else {
            Reply::Nack
        }
    }
}
