use std::{cell::RefCell, collections::VecDeque, io, rc::Rc};

/// Byte pipe underneath a link; provides no framing of its own
pub trait Transport {
    fn bytes_available(&self) -> usize;

    /// `None` when nothing is available
    fn read_byte(&mut self) -> Option<u8>;

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

type Pipe = Rc<RefCell<VecDeque<u8>>>;

/// One end of an in-memory duplex pipe.
///
/// Writes stay local until `flush`, then become readable on the peer.
#[derive(Debug)]
pub struct MemTransport {
    rx: Pipe,
    tx: Pipe,
    unflushed: Vec<u8>,
}

impl MemTransport {
    #[must_use]
    pub fn pair() -> (MemTransport, MemTransport) {
        let a_to_b: Pipe = Rc::default();
        let b_to_a: Pipe = Rc::default();
        let a = MemTransport {
            rx: Rc::clone(&b_to_a),
            tx: Rc::clone(&a_to_b),
            unflushed: Vec::new(),
        };
        let b = MemTransport {
            rx: a_to_b,
            tx: b_to_a,
            unflushed: Vec::new(),
        };
        (a, b)
    }

    /// Drops every byte waiting to be read on this end
    pub fn drain(&mut self) -> Vec<u8> {
        self.rx.borrow_mut().drain(..).collect()
    }
}

impl Transport for MemTransport {
    fn bytes_available(&self) -> usize {
        self.rx.borrow().len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.rx.borrow_mut().pop_front()
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.unflushed.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.tx.borrow_mut().extend(self.unflushed.drain(..));
        Ok(())
    }
}
