//! Blocking receive loop: decode each delivered packet, ask the handler
//! for a disposition, reply with the verdict.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::Result;
use crate::netlink::{Message, MessageIter, MessageKind};
use crate::packet::PacketDescriptor;
use crate::socket::Channel;
use crate::verdict::{Verdict, VerdictReply};

/// Largest possible packet payload plus netlink framing overhead.
const RECV_BUF_LEN: usize = 0xffff + 4096;

const REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// What the handler wants done with one packet.
#[derive(Debug, Clone, Copy)]
pub struct Disposition {
    pub verdict: Verdict,
    /// Conntrack mark attached to the reply.
    pub mark: Option<u32>,
}

impl Disposition {
    pub fn new(verdict: Verdict) -> Self {
        Self {
            verdict,
            mark: None,
        }
    }

    pub fn accept() -> Self {
        Self::new(Verdict::Accept)
    }

    pub fn with_mark(mut self, mark: u32) -> Self {
        self.mark = Some(mark);
        self
    }
}

#[derive(Debug, Default)]
struct Stats {
    packets: u64,
    bytes: u64,
}

/// Owns the channel and one receive buffer reused across iterations.
///
/// Strictly sequential: each packet is decoded, handled and answered
/// before the next blocking wait, so verdicts leave in arrival order.
pub struct Dispatcher<C: Channel> {
    channel: C,
    buf: Vec<u8>,
    stats: Stats,
    last_report: Instant,
}

impl<C: Channel> Dispatcher<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            buf: vec![0u8; RECV_BUF_LEN],
            stats: Stats::default(),
            last_report: Instant::now(),
        }
    }

    /// Receive packets and reply with the handler's verdicts until `stop`
    /// is set or an unrecoverable channel or protocol error occurs.
    ///
    /// Attribute data borrowed from the receive buffer never outlives the
    /// iteration that decoded it; the buffer is overwritten on the next
    /// receive.
    pub fn run<F>(&mut self, mut handler: F, stop: &AtomicBool) -> Result<()>
    where
        F: FnMut(&PacketDescriptor) -> Disposition,
    {
        while !stop.load(Ordering::Relaxed) {
            let n = self.channel.recv(&mut self.buf)?;
            for frame in MessageIter::new(&self.buf[..n]) {
                let message = Message::parse(frame?)?;
                match message.kind {
                    MessageKind::Packet => {
                        let descriptor = PacketDescriptor::from_attrs(&message.attrs)?;
                        self.stats.packets += 1;
                        self.stats.bytes += descriptor.payload_len as u64;

                        let disposition = handler(&descriptor);
                        let mut reply = VerdictReply::new(
                            message.queue_num,
                            descriptor.packet_id,
                            disposition.verdict,
                        );
                        if let Some(mark) = disposition.mark {
                            reply = reply.mark(mark);
                        }
                        self.channel.send(&reply.encode())?;
                    }
                    kind => debug!(?kind, "ignoring non-packet message"),
                }
            }
            self.maybe_report();
        }
        Ok(())
    }

    fn maybe_report(&mut self) {
        if self.last_report.elapsed() >= REPORT_INTERVAL {
            info!(
                packets = self.stats.packets,
                bytes = self.stats.bytes,
                "queue progress"
            );
            self.last_report = Instant::now();
        }
    }
}
