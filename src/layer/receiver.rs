use std::io;

use thiserror::Error;
use tracing::{debug, warn};

use crate::protocol::{self, build_ack, build_nack, Packet, Ulp, HDR_LEN, MAX_FRAME_LEN};

use super::{
    assembler::{Assembled, FrameAssembler, State},
    Transport,
};

pub struct ReceiverBuilder {
    pub capacity: usize,
    pub reply_ulp: Ulp,
}

impl ReceiverBuilder {
    pub fn build(self) -> Result<Receiver, BuildError> {
        if !(HDR_LEN..=MAX_FRAME_LEN).contains(&self.capacity) {
            return Err(BuildError::Capacity(self.capacity));
        }
        if !self.reply_ulp.is_known() {
            return Err(BuildError::ReplyUlp(self.reply_ulp));
        }
        let this = Receiver {
            assembler: FrameAssembler::new(self.capacity),
            reply_ulp: self.reply_ulp,
            stat: ReceiverStat::default(),
        };
        this.check_rep();
        Ok(this)
    }

    pub fn default() -> Self {
        ReceiverBuilder {
            capacity: MAX_FRAME_LEN,
            reply_ulp: Ulp::Uart,
        }
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("capacity {0} outside 3..=18")]
    Capacity(usize),
    #[error("reply protocol {0} is not a defined protocol")]
    ReplyUlp(Ulp),
}

#[derive(Debug)]
pub enum FrameEvent {
    NeedMoreBytes,
    Accepted { packet: Packet, reply: Packet },
    Rejected {
        reason: Rejection,
        reply: Option<Packet>,
    },
}

impl FrameEvent {
    #[must_use]
    pub fn reply(&self) -> Option<&Packet> {
        match self {
            FrameEvent::NeedMoreBytes => None,
            FrameEvent::Accepted { reply, .. } => Some(reply),
            FrameEvent::Rejected { reply, .. } => reply.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error(transparent)]
    Invalid(#[from] protocol::Error),
    #[error("frame buffer overflow")]
    Overflow,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStat {
    pub accepted: u64,
    pub checksum_mismatches: u64,
    pub length_errors: u64,
    pub overflows: u64,
    pub reply_failures: u64,
}

/// Receiving end of a link: validates frames and answers each one.
///
/// One instance per byte stream. Every frame, good or bad, leaves the
/// machine back in `AwaitingHeader`.
#[derive(Debug)]
pub struct Receiver {
    assembler: FrameAssembler,
    reply_ulp: Ulp,
    stat: ReceiverStat,
}

impl Receiver {
    #[inline]
    fn check_rep(&self) {
        assert!(self.reply_ulp.is_known());
    }

    #[must_use]
    pub fn stat(&self) -> ReceiverStat {
        self.stat
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.assembler.state()
    }

    fn reply_ulp_for(&self, ulp: Ulp) -> Ulp {
        if ulp.is_known() {
            ulp
        } else {
            self.reply_ulp
        }
    }

    #[must_use]
    pub fn input_byte(&mut self, byte: u8) -> FrameEvent {
        let event = match self.assembler.push(byte) {
            Assembled::Incomplete => FrameEvent::NeedMoreBytes,
            Assembled::Overflow => {
                self.stat.overflows += 1;
                warn!(
                    capacity = self.assembler.capacity(),
                    "frame overflowed buffer; discarded"
                );
                FrameEvent::Rejected {
                    reason: Rejection::Overflow,
                    reply: None,
                }
            }
            Assembled::Frame { ulp, result } => self.handle_frame(ulp, result),
        };
        self.check_rep();
        event
    }

    /// `ulp` comes from the raw control byte. On a checksum mismatch it is
    /// untrusted and only picks the tag the NACK is sent under.
    fn handle_frame(&mut self, ulp: Ulp, result: protocol::Result<Packet>) -> FrameEvent {
        let reply_ulp = self.reply_ulp_for(ulp);
        match result {
            Ok(packet) => match build_ack(reply_ulp) {
                Ok(reply) => {
                    self.stat.accepted += 1;
                    debug!(
                        flags = ?packet.flags(),
                        ulp = %packet.ulp(),
                        len = packet.payload().len(),
                        "frame accepted"
                    );
                    FrameEvent::Accepted { packet, reply }
                }
                Err(e) => {
                    self.stat.reply_failures += 1;
                    warn!(error = %e, "ack not built; frame abandoned");
                    FrameEvent::Rejected {
                        reason: e.into(),
                        reply: None,
                    }
                }
            },
            Err(e @ protocol::Error::ChecksumMismatch { .. }) => {
                self.stat.checksum_mismatches += 1;
                warn!(error = %e, "frame rejected; sending nack");
                let reply = match build_nack(reply_ulp) {
                    Ok(reply) => Some(reply),
                    Err(nack_err) => {
                        self.stat.reply_failures += 1;
                        warn!(error = %nack_err, "nack not built");
                        None
                    }
                };
                FrameEvent::Rejected {
                    reason: e.into(),
                    reply,
                }
            }
            Err(e) => {
                self.stat.length_errors += 1;
                warn!(error = %e, "frame rejected");
                FrameEvent::Rejected {
                    reason: e.into(),
                    reply: None,
                }
            }
        }
    }

    /// Drains `transport`, writing and flushing each reply before the next
    /// byte is read. Every event except `NeedMoreBytes` lands in `events`
    /// before its reply is written, so a failed write loses no frame.
    pub fn poll(
        &mut self,
        transport: &mut impl Transport,
        events: &mut Vec<FrameEvent>,
    ) -> io::Result<()> {
        while transport.bytes_available() > 0 {
            let Some(byte) = transport.read_byte() else {
                break;
            };
            let event = self.input_byte(byte);
            if matches!(event, FrameEvent::NeedMoreBytes) {
                continue;
            }
            let reply = event.reply().map(Packet::to_bytes);
            events.push(event);
            if let Some(reply) = reply {
                if let Err(e) = write_reply(transport, &reply) {
                    self.stat.reply_failures += 1;
                    warn!(error = %e, "reply not sent");
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

fn write_reply(transport: &mut impl Transport, reply: &[u8]) -> io::Result<()> {
    transport.write_bytes(reply)?;
    transport.flush()
}
