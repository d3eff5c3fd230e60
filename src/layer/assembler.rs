use crate::{
    protocol::{self, frame_len, Packet, Ulp, HDR_LEN},
    utils::FrameBuf,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    AwaitingHeader,
    AwaitingBody { declared_len: usize },
}

#[derive(Debug)]
pub enum Assembled {
    Incomplete,
    /// `ulp` is read off the raw control byte, valid or not
    Frame {
        ulp: Ulp,
        result: protocol::Result<Packet>,
    },
    Overflow,
}

/// Turns a byte stream into frames using only the length field.
///
/// There is no start marker to hunt for, so losing a byte desynchronizes the
/// stream until a buffer's worth of garbage has been discarded.
#[derive(Debug)]
pub struct FrameAssembler {
    buf: FrameBuf,
    declared_len: Option<usize>,
}

impl FrameAssembler {
    #[inline]
    fn check_rep(&self) {
        match self.declared_len {
            Some(len) => {
                assert!(self.buf.data_len() >= HDR_LEN);
                assert!(self.buf.data_len() < len);
            }
            None => assert!(self.buf.data_len() < HDR_LEN),
        }
    }

    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let this = FrameAssembler {
            buf: FrameBuf::new(capacity),
            declared_len: None,
        };
        this.check_rep();
        this
    }

    pub fn push(&mut self, byte: u8) -> Assembled {
        if self.buf.push(byte).is_err() {
            self.reset();
            return Assembled::Overflow;
        }

        if self.buf.data_len() == HDR_LEN {
            self.declared_len = frame_len(self.buf.data());
        }

        if let Some(len) = self.declared_len {
            if self.buf.data_len() == len {
                let ulp = Ulp::from_control(self.buf.data()[0]);
                let result = Packet::from_bytes(self.buf.data());
                self.reset();
                return Assembled::Frame { ulp, result };
            }
        }

        if self.buf.is_full() {
            self.reset();
            return Assembled::Overflow;
        }

        self.check_rep();
        Assembled::Incomplete
    }

    pub fn reset(&mut self) {
        self.buf.reset();
        self.declared_len = None;
        self.check_rep();
    }

    #[must_use]
    pub fn state(&self) -> State {
        match self.declared_len {
            Some(declared_len) => State::AwaitingBody { declared_len },
            None => State::AwaitingHeader,
        }
    }

    #[must_use]
    #[inline]
    pub fn buffered(&self) -> usize {
        self.buf.data_len()
    }

    #[must_use]
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }
}

#[cfg(test)]
mod tests {
    use crate::protocol::{Error, MAX_FRAME_LEN};

    use super::*;

    #[test]
    fn states() {
        let mut assembler = FrameAssembler::new(MAX_FRAME_LEN);
        assert_eq!(assembler.state(), State::AwaitingHeader);
        assert!(matches!(assembler.push(0x81), Assembled::Incomplete));
        assert!(matches!(assembler.push(0x01), Assembled::Incomplete));
        assert_eq!(assembler.state(), State::AwaitingHeader);
        assert!(matches!(assembler.push(0xB5), Assembled::Incomplete));
        assert_eq!(
            assembler.state(),
            State::AwaitingBody { declared_len: 4 }
        );
        match assembler.push(0x41) {
            Assembled::Frame { ulp, result } => {
                assert_eq!(ulp, Ulp::Uart);
                assert_eq!(result.unwrap().payload(), &[0x41]);
            }
            _ => panic!(),
        }
        assert_eq!(assembler.state(), State::AwaitingHeader);
        assert_eq!(assembler.buffered(), 0);
    }

    #[test]
    fn header_only_frame() {
        let mut assembler = FrameAssembler::new(MAX_FRAME_LEN);
        assembler.push(0x13);
        assembler.push(0x00);
        match assembler.push(0x68) {
            Assembled::Frame { result, .. } => assert!(result.unwrap().payload().is_empty()),
            _ => panic!(),
        }
    }

    #[test]
    fn full_size_frame_fits() {
        let mut assembler = FrameAssembler::new(MAX_FRAME_LEN);
        let packet = protocol::PacketBuilder {
            flags: protocol::Flags::empty(),
            ulp: Ulp::Spi,
            payload: &[7; 15],
        }
        .build()
        .unwrap();
        let bytes = packet.to_bytes();
        for &byte in &bytes[..bytes.len() - 1] {
            assert!(matches!(assembler.push(byte), Assembled::Incomplete));
        }
        match assembler.push(bytes[bytes.len() - 1]) {
            Assembled::Frame { result, .. } => assert_eq!(result.unwrap(), packet),
            _ => panic!(),
        }
    }

    #[test]
    fn overflow_with_small_capacity() {
        let mut assembler = FrameAssembler::new(8);
        // declares 15 payload bytes, which cannot fit
        let mut results = Vec::new();
        for byte in [0x81, 0x0F, 0x00, 1, 2, 3, 4, 5] {
            results.push(assembler.push(byte));
        }
        assert!(results[..7]
            .iter()
            .all(|r| matches!(r, Assembled::Incomplete)));
        assert!(matches!(results[7], Assembled::Overflow));
        assert_eq!(assembler.state(), State::AwaitingHeader);
        assert_eq!(assembler.buffered(), 0);
    }

    #[test]
    fn checksum_mismatch_keeps_ulp() {
        let mut assembler = FrameAssembler::new(MAX_FRAME_LEN);
        assembler.push(0x82);
        assembler.push(0x00);
        match assembler.push(0x00) {
            Assembled::Frame { ulp, result } => {
                assert_eq!(ulp, Ulp::Spi);
                assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
            }
            _ => panic!(),
        }
    }
}
