use std::fmt;

use num_enum::{FromPrimitive, IntoPrimitive};

pub const ULP_MASK: u8 = 0b0000_0111;

/// Upper layer protocol tag (bits 2..0 of the control byte)
///
/// Decoding is total: reserved tags (`0`, `4..=7`) come back as `Unknown` so
/// that diagnostics can still render them. Encoding rejects `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum Ulp {
    Uart = 1,
    Spi = 2,
    I2c = 3,
    #[num_enum(catch_all)]
    Unknown(u8),
}

impl Ulp {
    #[must_use]
    #[inline]
    pub fn from_control(control: u8) -> Self {
        Ulp::from(control & ULP_MASK)
    }

    #[must_use]
    #[inline]
    pub fn is_known(&self) -> bool {
        !matches!(self, Ulp::Unknown(_))
    }
}

impl fmt::Display for Ulp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ulp::Uart => write!(f, "UART"),
            Ulp::Spi => write!(f, "SPI"),
            Ulp::I2c => write!(f, "I2C"),
            Ulp::Unknown(tag) => write!(f, "Unknown ({tag})"),
        }
    }
}
