//! FERM: a framed link layer for short UART/SPI/I2C payloads over an
//! unreliable byte stream.
//!
//! [`protocol`] holds the wire codec (CRC-8, header, packets, fragments,
//! ACK/NACK). [`layer`] drives it over a byte [`layer::Transport`], one byte
//! at a time.

pub mod layer;
pub mod protocol;
pub mod utils;
