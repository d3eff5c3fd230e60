use thiserror::Error;
use tracing::warn;

use super::{Flags, Packet, PacketBuilder, Result, Ulp, MAX_PAYLOAD_LEN};

/// Packets of one logical payload, in sending order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragSequence {
    packets: Vec<Packet>,
}

/// Splits `payload` into `ceil(len / 15)` packets (one for an empty payload).
///
/// Only `ACK` and `RETRANSMIT` are taken from `flags`; the framing flags are
/// derived from each fragment's position.
pub fn fragment(flags: Flags, ulp: Ulp, payload: &[u8]) -> Result<FragSequence> {
    let n = usize::max(1, payload.len().div_ceil(MAX_PAYLOAD_LEN));
    let caller_flags = flags & Flags::CALLER_OWNED;

    let mut packets = Vec::with_capacity(n);
    for i in 0..n {
        let start = i * MAX_PAYLOAD_LEN;
        let end = usize::min(start + MAX_PAYLOAD_LEN, payload.len());

        let mut flags = caller_flags;
        flags.set(Flags::START_OF_FRAME, i == 0);
        flags.set(Flags::FRAGMENT, n > 1);
        flags.set(Flags::FINAL, i == n - 1);

        let packet = PacketBuilder {
            flags,
            ulp,
            payload: &payload[start..end],
        }
        .build()?;
        packets.push(packet);
    }

    let this = FragSequence { packets };
    this.check_rep();
    Ok(this)
}

impl FragSequence {
    fn check_rep(&self) {
        assert!(!self.packets.is_empty());
        let many = self.packets.len() > 1;
        let last = self.packets.len() - 1;
        for (i, packet) in self.packets.iter().enumerate() {
            let flags = packet.flags();
            assert_eq!(flags.contains(Flags::START_OF_FRAME), i == 0);
            assert_eq!(flags.contains(Flags::FINAL), i == last);
            assert_eq!(flags.contains(Flags::FRAGMENT), many);
        }
    }

    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Never true; kept for symmetry with `len`
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    #[must_use]
    #[inline]
    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    #[must_use]
    pub fn into_packets(self) -> Vec<Packet> {
        self.packets
    }

    /// Every fragment's frame, back to back
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let total = self.packets.iter().map(Packet::frame_len).sum();
        let mut wtr = Vec::with_capacity(total);
        for packet in &self.packets {
            packet.append_to(&mut wtr);
        }
        wtr
    }

    #[must_use]
    pub fn payload(&self) -> Vec<u8> {
        self.packets
            .iter()
            .flat_map(|packet| packet.payload().iter().copied())
            .collect()
    }
}

/// Rebuilds payloads from packets arriving in order.
///
/// Only one message may be in progress at a time; the wire carries nothing
/// to tell two interleaved sequences apart.
#[derive(Debug, Default)]
pub struct Reassembler {
    partial: Option<Partial>,
}

#[derive(Debug)]
struct Partial {
    ulp: Ulp,
    payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReassemblyError {
    #[error("continuation without a start of frame")]
    NoStart,
    #[error("protocol changed from {expected} to {found} mid-message")]
    UlpMismatch { expected: Ulp, found: Ulp },
}

impl Reassembler {
    #[must_use]
    pub fn new() -> Self {
        Reassembler { partial: None }
    }

    /// Returns the whole payload once the `FINAL` packet arrives.
    ///
    /// A start of frame always opens a new message; an unfinished one is
    /// dropped.
    pub fn push(
        &mut self,
        packet: &Packet,
    ) -> std::result::Result<Option<Vec<u8>>, ReassemblyError> {
        let flags = packet.flags();

        if flags.contains(Flags::START_OF_FRAME) {
            if let Some(old) = self.partial.take() {
                warn!(dropped = old.payload.len(), "unfinished message dropped");
            }
            self.partial = Some(Partial {
                ulp: packet.ulp(),
                payload: Vec::new(),
            });
        }

        let Some(partial) = self.partial.as_mut() else {
            return Err(ReassemblyError::NoStart);
        };
        if partial.ulp != packet.ulp() {
            let expected = partial.ulp;
            self.partial = None;
            return Err(ReassemblyError::UlpMismatch {
                expected,
                found: packet.ulp(),
            });
        }
        partial.payload.extend_from_slice(packet.payload());

        if flags.contains(Flags::FINAL) {
            let done = self.partial.take().map(|partial| partial.payload);
            return Ok(done);
        }
        Ok(None)
    }

    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.partial.is_some()
    }
}
