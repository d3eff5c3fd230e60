use std::{fmt, io::Cursor};

use super::{
    checksum,
    packet_hdr::{decode_length, encode_control, encode_length, PacketHeader},
    Error, Flags, Result, Ulp, HDR_LEN, MAX_PAYLOAD_LEN,
};

/// Immutable once built; rebuild to change anything
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    hdr: PacketHeader,
    payload: Vec<u8>,
}

pub struct PacketBuilder<'a> {
    pub flags: Flags,
    pub ulp: Ulp,
    pub payload: &'a [u8],
}

impl PacketBuilder<'_> {
    pub fn build(self) -> Result<Packet> {
        if self.payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::InvalidArgument { field: "payload" });
        }
        let control = encode_control(self.flags, self.ulp)?;
        let length = encode_length(self.payload.len())?;
        let checksum = payload_checksum([control, length], self.payload);

        let mut payload = Vec::new();
        payload
            .try_reserve_exact(self.payload.len())
            .map_err(|_e| Error::OutOfMemory)?;
        payload.extend_from_slice(self.payload);

        let this = Packet {
            hdr: PacketHeader::new(self.flags, self.ulp, self.payload.len(), checksum),
            payload,
        };
        this.check_rep();
        Ok(this)
    }
}

fn payload_checksum(prefix: [u8; 2], payload: &[u8]) -> u8 {
    let mut covered = [0; 2 + MAX_PAYLOAD_LEN];
    covered[..2].copy_from_slice(&prefix);
    covered[2..2 + payload.len()].copy_from_slice(payload);
    checksum(&covered[..2 + payload.len()])
}

/// Total frame length announced by the first two bytes of a frame
#[must_use]
pub fn frame_len(prefix: &[u8]) -> Option<usize> {
    let length = *prefix.get(1)?;
    Some(HDR_LEN + decode_length(length))
}

impl Packet {
    #[inline]
    fn check_rep(&self) {
        assert_eq!(self.payload.len(), self.hdr.len());
        assert_eq!(
            payload_checksum(self.hdr.prefix(), &self.payload),
            self.hdr.checksum()
        );
    }

    /// Parses and validates one frame from the front of `buf`.
    ///
    /// Bytes past the declared frame length are ignored. The returned payload
    /// is an owned copy, so `buf` may be reused right away.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < HDR_LEN {
            return Err(Error::InvalidArgument { field: "buf" });
        }
        let mut rdr = Cursor::new(buf);
        let hdr = PacketHeader::from_bytes(&mut rdr)?;

        let declared = hdr.len();
        let available = buf.len() - HDR_LEN;
        if declared > MAX_PAYLOAD_LEN || available < declared {
            return Err(Error::DataLengthInvalid {
                declared,
                available,
            });
        }

        let body = &buf[HDR_LEN..HDR_LEN + declared];
        let computed = payload_checksum(hdr.prefix(), body);
        if computed != hdr.checksum() {
            return Err(Error::ChecksumMismatch {
                received: hdr.checksum(),
                computed,
            });
        }

        let mut payload = Vec::new();
        payload
            .try_reserve_exact(declared)
            .map_err(|_e| Error::OutOfMemory)?;
        payload.extend_from_slice(body);

        let this = Packet { hdr, payload };
        this.check_rep();
        Ok(this)
    }

    pub fn append_to(&self, wtr: &mut Vec<u8>) {
        self.hdr.append_to(wtr);
        wtr.extend_from_slice(&self.payload);
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut wtr = Vec::with_capacity(self.frame_len());
        self.append_to(&mut wtr);
        wtr
    }

    /// Same payload and protocol under a different flag set
    pub fn with_flags(&self, flags: Flags) -> Result<Packet> {
        PacketBuilder {
            flags,
            ulp: self.hdr.ulp(),
            payload: &self.payload,
        }
        .build()
    }

    #[must_use]
    #[inline]
    pub fn hdr(&self) -> &PacketHeader {
        &self.hdr
    }

    #[must_use]
    #[inline]
    pub fn flags(&self) -> Flags {
        self.hdr.flags()
    }

    #[must_use]
    #[inline]
    pub fn ulp(&self) -> Ulp {
        self.hdr.ulp()
    }

    #[must_use]
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    #[inline]
    pub fn frame_len(&self) -> usize {
        HDR_LEN + self.payload.len()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FERM Packet:")?;
        writeln!(f, "  Flags: {}", self.flags().labels().join(" "))?;
        writeln!(f, "  Upper Layer Protocol: {}", self.ulp())?;
        writeln!(f, "  Data Length: {}", self.hdr.len())?;
        writeln!(f, "  Checksum: {:#04x}", self.hdr.checksum())?;
        if self.payload.is_empty() {
            write!(f, "  No data available.")
        } else {
            write!(f, "  Data:")?;
            for byte in &self.payload {
                write!(f, " 0x{byte:02X}")?;
            }
            Ok(())
        }
    }
}
