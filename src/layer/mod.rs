//! Stream-facing half of the protocol: byte-at-a-time framing, replies and
//! stop-and-wait sending over a [`Transport`].

pub mod assembler;
mod receiver;
mod sender;
mod transport;

use crate::protocol::Ulp;
pub use assembler::{FrameAssembler, State};
pub use receiver::*;
pub use sender::*;
pub use transport::*;

pub struct Builder {
    pub receiver_capacity: usize,
    pub reply_ulp: Ulp,
    pub max_retransmits: usize,
}

impl Builder {
    pub fn build(self) -> Result<(Sender, Receiver), BuildError> {
        let sender = SenderBuilder {
            max_retransmits: self.max_retransmits,
        }
        .build();
        let receiver = ReceiverBuilder {
            capacity: self.receiver_capacity,
            reply_ulp: self.reply_ulp,
        }
        .build()?;
        Ok((sender, receiver))
    }

    pub fn default() -> Self {
        let receiver = ReceiverBuilder::default();
        Builder {
            receiver_capacity: receiver.capacity,
            reply_ulp: receiver.reply_ulp,
            max_retransmits: SenderBuilder::default().max_retransmits,
        }
    }
}
