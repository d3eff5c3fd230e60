use thiserror::Error;

use crate::protocol::MAX_FRAME_LEN;

/// Fixed-capacity receive buffer; never allocates
#[derive(Debug)]
pub struct FrameBuf {
    buf: [u8; MAX_FRAME_LEN],
    cap: usize,
    end: usize,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("not enough space")]
    NotEnoughSpace,
}

impl FrameBuf {
    #[inline]
    fn check_rep(&self) {
        assert!(self.cap <= MAX_FRAME_LEN);
        assert!(self.end <= self.cap);
    }

    /// `cap` is clamped to `MAX_FRAME_LEN`
    #[must_use]
    pub fn new(cap: usize) -> Self {
        let this = FrameBuf {
            buf: [0; MAX_FRAME_LEN],
            cap: usize::min(cap, MAX_FRAME_LEN),
            end: 0,
        };
        this.check_rep();
        this
    }

    #[inline]
    pub fn push(&mut self, byte: u8) -> Result<(), Error> {
        if self.is_full() {
            return Err(Error::NotEnoughSpace);
        }
        self.buf[self.end] = byte;
        self.end += 1;
        self.check_rep();
        Ok(())
    }

    #[inline]
    pub fn reset(&mut self) {
        self.buf = [0; MAX_FRAME_LEN];
        self.end = 0;
        self.check_rep();
    }

    #[must_use]
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.buf[..self.end]
    }

    #[must_use]
    #[inline]
    pub fn data_len(&self) -> usize {
        self.end
    }

    #[must_use]
    #[inline]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end == 0
    }

    #[must_use]
    #[inline]
    pub fn is_full(&self) -> bool {
        self.end == self.cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_and_reset() {
        let mut buf = FrameBuf::new(3);
        buf.push(1).unwrap();
        buf.push(2).unwrap();
        buf.push(3).unwrap();
        assert!(buf.is_full());
        assert!(buf.push(4).is_err());
        assert_eq!(buf.data(), &[1, 2, 3]);

        buf.reset();
        assert!(buf.is_empty());
        buf.push(9).unwrap();
        assert_eq!(buf.data(), &[9]);
    }

    #[test]
    fn capacity_clamped() {
        let buf = FrameBuf::new(1024);
        assert_eq!(buf.capacity(), MAX_FRAME_LEN);
    }
}
