pub const CRC8_POLY: u8 = 0x07;
pub const CRC8_INIT: u8 = 0x00;

/// CRC-8 (poly `0x07`, init `0x00`, MSB-first, no final XOR)
#[must_use]
pub fn checksum(bytes: &[u8]) -> u8 {
    let mut crc = CRC8_INIT;
    for &byte in bytes {
        crc = update(crc, byte);
    }
    crc
}

#[inline]
fn update(mut crc: u8, byte: u8) -> u8 {
    crc ^= byte;
    for _ in 0..8 {
        if crc & 0x80 != 0 {
            crc = (crc << 1) ^ CRC8_POLY;
        } else {
            crc <<= 1;
        }
    }
    crc
}
