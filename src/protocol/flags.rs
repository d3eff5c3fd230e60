use bitflags::bitflags;

bitflags! {
    /// The five packet flags, already positioned in bits 7..3 of the control byte
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u8 {
        const START_OF_FRAME = 0b1000_0000;
        const ACK = 0b0100_0000;
        const FRAGMENT = 0b0010_0000;
        const FINAL = 0b0001_0000;
        const RETRANSMIT = 0b0000_1000;
    }
}

pub const FLAGS_MASK: u8 = 0b1111_1000;

impl Flags {
    /// Flags carried verbatim from the caller onto every fragment
    pub const CALLER_OWNED: Flags = Flags::ACK.union(Flags::RETRANSMIT);

    #[must_use]
    #[inline]
    pub fn from_control(control: u8) -> Self {
        Flags::from_bits_truncate(control & FLAGS_MASK)
    }

    #[must_use]
    pub fn labels(&self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        if self.contains(Flags::START_OF_FRAME) {
            labels.push("SOF");
        }
        if self.contains(Flags::ACK) {
            labels.push("ACK");
        }
        if self.contains(Flags::FRAGMENT) {
            labels.push("Fragment");
        }
        if self.contains(Flags::FINAL) {
            labels.push("Final");
        }
        if self.contains(Flags::RETRANSMIT) {
            labels.push("Retransmit");
        }
        labels
    }
}
