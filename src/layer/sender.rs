use std::{collections::VecDeque, io};

use tracing::{debug, warn};

use crate::protocol::{self, FragSequence, Packet, Reply, MAX_FRAME_LEN};

use super::{
    assembler::{Assembled, FrameAssembler},
    receiver::Rejection,
    Transport,
};

pub struct SenderBuilder {
    pub max_retransmits: usize,
}

impl SenderBuilder {
    pub fn build(self) -> Sender {
        let this = Sender {
            queue: VecDeque::new(),
            in_flight: None,
            replies: FrameAssembler::new(MAX_FRAME_LEN),
            max_retransmits: self.max_retransmits,
            stat: SenderStat::default(),
        };
        this.check_rep();
        this
    }

    pub fn default() -> Self {
        SenderBuilder { max_retransmits: 3 }
    }
}

#[derive(Debug)]
struct InFlight {
    packet: Packet,
    retransmits: usize,
}

#[derive(Debug)]
pub enum SenderEvent {
    NeedMoreBytes,
    Delivered { packet: Packet },
    /// `frame` must be written before anything else
    Resend { frame: Vec<u8>, retransmits: usize },
    /// The `dropped` remaining fragments of `packet`'s message were discarded
    GaveUp { packet: Packet, dropped: usize },
    /// A valid frame arrived while no reply was expected
    Unsolicited { packet: Packet },
    /// A reply frame that could not be read; nothing is resent for it
    Ignored { reason: Rejection },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStat {
    pub delivered: u64,
    pub retransmits: u64,
    pub give_ups: u64,
    pub unsolicited: u64,
}

/// Stop-and-wait sending end of a link.
///
/// Holds at most one packet in flight. An ACK releases the next packet; a
/// NACK or a corrupted reply resends the same packet with `RETRANSMIT` set.
/// There is no timer: if a reply never comes, the caller decides when to
/// `abort`.
#[derive(Debug)]
pub struct Sender {
    queue: VecDeque<Packet>,
    in_flight: Option<InFlight>,
    replies: FrameAssembler,
    max_retransmits: usize,
    stat: SenderStat,
}

impl Sender {
    #[inline]
    fn check_rep(&self) {
        if let Some(in_flight) = &self.in_flight {
            assert!(in_flight.retransmits <= self.max_retransmits);
        }
    }

    pub fn enqueue(&mut self, seq: FragSequence) {
        self.queue.extend(seq.into_packets());
        self.check_rep();
    }

    /// Takes the next queued packet into flight, unless one is already waiting
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        if self.in_flight.is_some() {
            return None;
        }
        let packet = self.queue.pop_front()?;
        let frame = packet.to_bytes();
        self.in_flight = Some(InFlight {
            packet,
            retransmits: 0,
        });
        self.check_rep();
        Some(frame)
    }

    pub fn input_byte(&mut self, byte: u8) -> SenderEvent {
        let event = match self.replies.push(byte) {
            Assembled::Incomplete => SenderEvent::NeedMoreBytes,
            Assembled::Overflow => SenderEvent::Ignored {
                reason: Rejection::Overflow,
            },
            Assembled::Frame { result, .. } => self.handle_reply(result),
        };
        self.check_rep();
        event
    }

    fn handle_reply(&mut self, result: protocol::Result<Packet>) -> SenderEvent {
        let Some(in_flight) = self.in_flight.take() else {
            return match result {
                Ok(packet) => {
                    self.stat.unsolicited += 1;
                    SenderEvent::Unsolicited { packet }
                }
                Err(e) => SenderEvent::Ignored { reason: e.into() },
            };
        };

        match result {
            Ok(reply) if Reply::of(&reply) == Reply::Ack => {
                self.stat.delivered += 1;
                debug!(len = in_flight.packet.payload().len(), "packet delivered");
                SenderEvent::Delivered {
                    packet: in_flight.packet,
                }
            }
            Ok(_) | Err(protocol::Error::ChecksumMismatch { .. }) => self.retransmit(in_flight),
            Err(e) => {
                self.in_flight = Some(in_flight);
                SenderEvent::Ignored { reason: e.into() }
            }
        }
    }

    fn retransmit(&mut self, in_flight: InFlight) -> SenderEvent {
        if in_flight.retransmits >= self.max_retransmits {
            return self.give_up(in_flight.packet);
        }
        let flags = in_flight.packet.flags() | protocol::Flags::RETRANSMIT;
        let packet = match in_flight.packet.with_flags(flags) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(error = %e, "retransmission not built");
                return self.give_up(in_flight.packet);
            }
        };
        let retransmits = in_flight.retransmits + 1;
        self.stat.retransmits += 1;
        warn!(retransmits, "no ack; retransmitting");

        let frame = packet.to_bytes();
        self.in_flight = Some(InFlight {
            packet,
            retransmits,
        });
        SenderEvent::Resend { frame, retransmits }
    }

    /// Drops the rest of `packet`'s message; later messages stay queued
    fn give_up(&mut self, packet: Packet) -> SenderEvent {
        let mut dropped = 0;
        if !packet.flags().contains(protocol::Flags::FINAL) {
            while let Some(next) = self.queue.pop_front() {
                dropped += 1;
                if next.flags().contains(protocol::Flags::FINAL) {
                    break;
                }
            }
        }
        self.stat.give_ups += 1;
        warn!(dropped, "retransmissions exhausted; message dropped");
        SenderEvent::GaveUp { packet, dropped }
    }

    /// Forgets the packet in flight and everything queued behind it
    pub fn abort(&mut self) -> usize {
        let dropped = self.queue.len() + usize::from(self.in_flight.is_some());
        self.queue.clear();
        self.in_flight = None;
        self.replies.reset();
        dropped
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.queue.is_empty()
    }

    #[must_use]
    pub fn awaiting_reply(&self) -> bool {
        self.in_flight.is_some()
    }

    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn stat(&self) -> SenderStat {
        self.stat
    }

    /// Writes the next frame if the link is free, then drains replies.
    ///
    /// Each delivery releases the next frame within the same call. Every
    /// event except `NeedMoreBytes` lands in `events` before any frame it
    /// triggers is written, so a failed write loses no event.
    pub fn poll(
        &mut self,
        transport: &mut impl Transport,
        events: &mut Vec<SenderEvent>,
    ) -> io::Result<()> {
        self.send_next(transport)?;
        while transport.bytes_available() > 0 {
            let Some(byte) = transport.read_byte() else {
                break;
            };
            let event = self.input_byte(byte);
            let resend = match &event {
                SenderEvent::NeedMoreBytes => continue,
                SenderEvent::Resend { frame, .. } => Some(frame.clone()),
                SenderEvent::Delivered { .. }
                | SenderEvent::GaveUp { .. }
                | SenderEvent::Unsolicited { .. }
                | SenderEvent::Ignored { .. } => None,
            };
            events.push(event);
            match resend {
                Some(frame) => write_frame(transport, &frame)?,
                None => self.send_next(transport)?,
            }
        }
        Ok(())
    }

    /// A frame that could not be written goes back to the head of the queue
    fn send_next(&mut self, transport: &mut impl Transport) -> io::Result<()> {
        let Some(frame) = self.next_frame() else {
            return Ok(());
        };
        if let Err(e) = write_frame(transport, &frame) {
            if let Some(in_flight) = self.in_flight.take() {
                self.queue.push_front(in_flight.packet);
            }
            warn!(error = %e, "frame not sent; requeued");
            return Err(e);
        }
        Ok(())
    }
}

fn write_frame(transport: &mut impl Transport, frame: &[u8]) -> io::Result<()> {
    transport.write_bytes(frame)?;
    transport.flush()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use crate::protocol::{build_ack, build_nack, fragment, Flags, Ulp};

    use super::*;

    fn feed(sender: &mut Sender, packet: &Packet) -> SenderEvent {
        let bytes = packet.to_bytes();
        let mut last = SenderEvent::NeedMoreBytes;
        for byte in bytes {
            last = sender.input_byte(byte);
        }
        last
    }

    fn sender_with(len: usize) -> Sender {
        let mut sender = SenderBuilder::default().build();
        let payload: Vec<u8> = (0..len).map(|i| i as u8).collect();
        sender.enqueue(fragment(Flags::empty(), Ulp::Uart, &payload).unwrap());
        sender
    }

    #[test]
    fn stop_and_wait() {
        let mut sender = sender_with(20);
        let first = sender.next_frame().unwrap();
        assert_eq!(first.len(), 18);
        assert!(sender.next_frame().is_none());

        let ack = build_ack(Ulp::Uart).unwrap();
        assert!(matches!(
            feed(&mut sender, &ack),
            SenderEvent::Delivered { .. }
        ));
        let second = sender.next_frame().unwrap();
        assert_eq!(second.len(), 3 + 5);
        feed(&mut sender, &ack);
        assert!(sender.is_idle());
        assert_eq!(sender.stat().delivered, 2);
    }

    #[test]
    fn nack_resends_with_retransmit_flag() {
        let mut sender = sender_with(4);
        let original = Packet::from_bytes(&sender.next_frame().unwrap()).unwrap();

        let nack = build_nack(Ulp::Uart).unwrap();
        match feed(&mut sender, &nack) {
            SenderEvent::Resend { frame, retransmits } => {
                assert_eq!(retransmits, 1);
                let resent = Packet::from_bytes(&frame).unwrap();
                assert!(resent.flags().contains(Flags::RETRANSMIT));
                assert_eq!(resent.payload(), original.payload());
            }
            _ => panic!(),
        }
        assert!(sender.awaiting_reply());
    }

    #[test]
    fn corrupted_reply_resends() {
        let mut sender = sender_with(4);
        sender.next_frame().unwrap();
        let mut event = SenderEvent::NeedMoreBytes;
        for byte in [0x41, 0x01, 0x00, 0x06] {
            event = sender.input_byte(byte);
        }
        assert!(matches!(event, SenderEvent::Resend { .. }));
    }

    #[test]
    fn gives_up() {
        let mut sender = SenderBuilder { max_retransmits: 1 }.build();
        sender.enqueue(fragment(Flags::empty(), Ulp::Spi, &[0; 40]).unwrap());
        sender.next_frame().unwrap();

        let nack = build_nack(Ulp::Spi).unwrap();
        assert!(matches!(
            feed(&mut sender, &nack),
            SenderEvent::Resend { .. }
        ));
        match feed(&mut sender, &nack) {
            SenderEvent::GaveUp { dropped, .. } => assert_eq!(dropped, 2),
            _ => panic!(),
        }
        assert!(sender.is_idle());
        assert_eq!(sender.stat().give_ups, 1);
    }

    #[test]
    fn unsolicited_reply() {
        let mut sender = SenderBuilder::default().build();
        let ack = build_ack(Ulp::Uart).unwrap();
        assert!(matches!(
            feed(&mut sender, &ack),
            SenderEvent::Unsolicited { .. }
        ));
    }

    #[test]
    fn abort() {
        let mut sender = sender_with(40);
        sender.next_frame().unwrap();
        assert_eq!(sender.abort(), 3);
        assert!(sender.is_idle());
    }

    #[test]
    fn give_up_keeps_later_messages() {
        let mut sender = SenderBuilder { max_retransmits: 0 }.build();
        sender.enqueue(fragment(Flags::empty(), Ulp::Uart, &[1; 20]).unwrap());
        sender.enqueue(fragment(Flags::empty(), Ulp::Uart, b"second").unwrap());
        sender.next_frame().unwrap();

        let nack = build_nack(Ulp::Uart).unwrap();
        match feed(&mut sender, &nack) {
            SenderEvent::GaveUp { dropped, .. } => assert_eq!(dropped, 1),
            _ => panic!(),
        }
        assert_eq!(sender.queued(), 1);
        let next = Packet::from_bytes(&sender.next_frame().unwrap()).unwrap();
        assert_eq!(next.payload(), b"second");
    }

    #[test]
    fn give_up_on_last_fragment_drops_nothing_else() {
        let mut sender = SenderBuilder { max_retransmits: 0 }.build();
        sender.enqueue(fragment(Flags::empty(), Ulp::Spi, b"first").unwrap());
        sender.enqueue(fragment(Flags::empty(), Ulp::Spi, b"second").unwrap());
        sender.next_frame().unwrap();

        let nack = build_nack(Ulp::Spi).unwrap();
        match feed(&mut sender, &nack) {
            SenderEvent::GaveUp { dropped, .. } => assert_eq!(dropped, 0),
            _ => panic!(),
        }
        assert_eq!(sender.queued(), 1);
    }

    struct WriteFails {
        rx: VecDeque<u8>,
    }

    impl Transport for WriteFails {
        fn bytes_available(&self) -> usize {
            self.rx.len()
        }

        fn read_byte(&mut self) -> Option<u8> {
            self.rx.pop_front()
        }

        fn write_bytes(&mut self, _bytes: &[u8]) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "link down"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_write_requeues_frame() {
        let mut sender = sender_with(4);
        let mut transport = WriteFails { rx: VecDeque::new() };
        let mut events = Vec::new();
        assert!(sender.poll(&mut transport, &mut events).is_err());
        assert!(!sender.awaiting_reply());
        assert_eq!(sender.queued(), 1);
    }

    #[test]
    fn failed_resend_keeps_event() {
        let mut sender = sender_with(4);
        sender.next_frame().unwrap();
        let nack = build_nack(Ulp::Uart).unwrap();
        let mut transport = WriteFails {
            rx: nack.to_bytes().into(),
        };
        let mut events = Vec::new();
        assert!(sender.poll(&mut transport, &mut events).is_err());
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], SenderEvent::Resend { retransmits: 1, .. }));
        assert!(sender.awaiting_reply());
    }
}
