use std::io;

use clap::{Parser, ValueEnum};
use ferm::{
    layer::{Builder, FrameEvent, MemTransport, SenderEvent, Transport},
    protocol::{fragment, Flags, Reassembler, Ulp},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const MAX_ROUNDS: usize = 1024;

#[derive(Parser, Debug)]
#[command(about = "Send a message over an in-memory FERM link")]
struct Args {
    /// Message to send
    #[arg(default_value = "Hello over FERM, in more than one fragment!")]
    message: String,

    #[arg(long, value_enum, default_value_t = Protocol::Uart)]
    ulp: Protocol,

    /// Flip the low bit of this byte offset of the outgoing stream, once
    #[arg(long)]
    corrupt: Option<usize>,

    #[arg(long, default_value_t = 3)]
    max_retransmits: usize,

    /// Receiver frame buffer capacity
    #[arg(long, default_value_t = 18)]
    capacity: usize,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Protocol {
    Uart,
    Spi,
    I2c,
}

impl From<Protocol> for Ulp {
    fn from(value: Protocol) -> Self {
        match value {
            Protocol::Uart => Ulp::Uart,
            Protocol::Spi => Ulp::Spi,
            Protocol::I2c => Ulp::I2c,
        }
    }
}

/// Damages one outgoing byte to exercise the NACK path
struct Corrupting {
    inner: MemTransport,
    target: Option<usize>,
    written: usize,
}

impl Transport for Corrupting {
    fn bytes_available(&self) -> usize {
        self.inner.bytes_available()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.inner.read_byte()
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut bytes = bytes.to_vec();
        if let Some(target) = self.target {
            if (self.written..self.written + bytes.len()).contains(&target) {
                bytes[target - self.written] ^= 0x01;
                self.target = None;
                warn!(offset = target, "corrupted outgoing byte");
            }
        }
        self.written += bytes.len();
        self.inner.write_bytes(&bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    // link
    let (mut sender, mut receiver) = Builder {
        receiver_capacity: args.capacity,
        reply_ulp: args.ulp.into(),
        max_retransmits: args.max_retransmits,
    }
    .build()?;
    let (sender_end, mut receiver_end) = MemTransport::pair();
    let mut sender_end = Corrupting {
        inner: sender_end,
        target: args.corrupt,
        written: 0,
    };

    // message
    let seq = fragment(Flags::empty(), args.ulp.into(), args.message.as_bytes())?;
    info!(
        bytes = args.message.len(),
        fragments = seq.len(),
        "sending message"
    );
    sender.enqueue(seq);

    // pump both ends until the sender settles
    let mut reassembler = Reassembler::new();
    let mut sent = Vec::new();
    let mut received = Vec::new();
    for _ in 0..MAX_ROUNDS {
        sender.poll(&mut sender_end, &mut sent)?;
        for event in sent.drain(..) {
            if let SenderEvent::GaveUp { dropped, .. } = event {
                warn!(dropped, "sender gave up");
            }
        }
        receiver.poll(&mut receiver_end, &mut received)?;
        for event in received.drain(..) {
            match event {
                FrameEvent::Accepted { packet, .. } => {
                    info!("received\n{packet}");
                    match reassembler.push(&packet) {
                        Ok(Some(payload)) => {
                            info!(text = %String::from_utf8_lossy(&payload), "reassembled");
                        }
                        Ok(None) => (),
                        Err(e) => warn!(error = %e, "reassembly failed"),
                    }
                }
                FrameEvent::Rejected { reason, .. } => warn!(%reason, "frame rejected"),
                FrameEvent::NeedMoreBytes => (),
            }
        }
        if sender.is_idle() {
            break;
        }
    }

    if sender.awaiting_reply() {
        warn!(queued = sender.queued(), "stopped while awaiting a reply");
    }
    info!(sender = ?sender.stat(), receiver = ?receiver.stat(), "done");
    Ok(())
}
