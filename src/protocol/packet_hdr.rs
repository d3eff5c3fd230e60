use std::io::Cursor;

use byteorder::ReadBytesExt;

use super::{Error, Flags, Result, Ulp, MAX_PAYLOAD_LEN};

pub const HDR_LEN: usize = 3;
pub const LEN_MASK: u8 = 0b0000_1111;

pub fn encode_control(flags: Flags, ulp: Ulp) -> Result<u8> {
    if !ulp.is_known() {
        return Err(Error::InvalidArgument { field: "ulp" });
    }
    Ok(flags.bits() | u8::from(ulp))
}

#[must_use]
pub fn decode_control(control: u8) -> (Flags, Ulp) {
    (Flags::from_control(control), Ulp::from_control(control))
}

pub fn encode_length(len: usize) -> Result<u8> {
    if len > MAX_PAYLOAD_LEN {
        return Err(Error::InvalidArgument { field: "len" });
    }
    Ok(len as u8)
}

/// Reserved bits 7..4 are dropped, not rejected
#[must_use]
#[inline]
pub fn decode_length(length: u8) -> usize {
    (length & LEN_MASK) as usize
}

/// Only `Packet` builds headers, so `checksum` always matches its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    flags: Flags,
    ulp: Ulp,
    len: usize,
    checksum: u8,
}

impl PacketHeader {
    #[inline]
    fn check_rep(&self) {
        assert!(self.len <= MAX_PAYLOAD_LEN);
    }

    pub(crate) fn new(flags: Flags, ulp: Ulp, len: usize, checksum: u8) -> Self {
        let this = PacketHeader {
            flags,
            ulp,
            len,
            checksum,
        };
        this.check_rep();
        this
    }

    /// Reads the three header bytes without validating anything but their presence
    pub(crate) fn from_bytes(rdr: &mut Cursor<&[u8]>) -> Result<Self> {
        let control = rdr
            .read_u8()
            .map_err(|_e| Error::InvalidArgument { field: "control" })?;
        let length = rdr
            .read_u8()
            .map_err(|_e| Error::InvalidArgument { field: "length" })?;
        let checksum = rdr
            .read_u8()
            .map_err(|_e| Error::InvalidArgument { field: "checksum" })?;
        let (flags, ulp) = decode_control(control);
        let len = decode_length(length);
        Ok(PacketHeader::new(flags, ulp, len, checksum))
    }

    /// The two bytes the checksum is computed over
    #[must_use]
    pub fn prefix(&self) -> [u8; 2] {
        // `Unknown` tags only reach here from parsed frames; keep their raw bits
        [self.flags.bits() | u8::from(self.ulp), self.len as u8]
    }

    pub(crate) fn append_to(&self, wtr: &mut Vec<u8>) {
        let [control, length] = self.prefix();
        wtr.extend_from_slice(&[control, length, self.checksum]);
    }

    #[must_use]
    #[inline]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    #[must_use]
    #[inline]
    pub fn ulp(&self) -> Ulp {
        self.ulp
    }

    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    #[inline]
    pub fn checksum(&self) -> u8 {
        self.checksum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_layout() {
        assert_eq!(
            encode_control(Flags::START_OF_FRAME, Ulp::Uart).unwrap(),
            0x81
        );
        assert_eq!(encode_control(Flags::all(), Ulp::I2c).unwrap(), 0xFB);
        assert_eq!(
            encode_control(Flags::ACK | Flags::RETRANSMIT, Ulp::Spi).unwrap(),
            0x4A
        );
    }

    #[test]
    fn control_rejects_unknown_ulp() {
        assert_eq!(
            encode_control(Flags::empty(), Ulp::Unknown(0)),
            Err(Error::InvalidArgument { field: "ulp" })
        );
    }

    #[test]
    fn control_decode_is_total() {
        for control in 0..=u8::MAX {
            let (flags, ulp) = decode_control(control);
            assert_eq!(flags.bits() | u8::from(ulp), control);
        }
    }

    #[test]
    fn length_bounds() {
        assert_eq!(encode_length(0).unwrap(), 0);
        assert_eq!(encode_length(15).unwrap(), 15);
        assert_eq!(
            encode_length(16),
            Err(Error::InvalidArgument { field: "len" })
        );
    }

    #[test]
    fn length_ignores_reserved_bits() {
        assert_eq!(decode_length(0xF3), 3);
        assert_eq!(decode_length(0x0F), 15);
    }

    #[test]
    fn header_from_short_bytes() {
        let bytes: &[u8] = &[0x81, 0x01];
        let mut rdr = Cursor::new(bytes);
        assert_eq!(
            PacketHeader::from_bytes(&mut rdr),
            Err(Error::InvalidArgument { field: "checksum" })
        );
    }
}
