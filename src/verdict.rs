//! Verdict reply construction.

use crate::netlink::{MessageBuilder, MessageKind};
use crate::packet::{NFQA_CT, NFQA_VERDICT_HDR};

/// Conntrack mark attribute inside the NFQA_CT container.
pub const CTA_MARK: u16 = 8;

/// Disposition assigned to one intercepted packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Drop,
    Accept,
    /// Taken over by userspace; the kernel forgets the packet.
    Stolen,
    /// Requeue to another queue.
    Queue,
    /// Re-run the hook the packet came from.
    Repeat,
}

impl Verdict {
    pub fn code(self) -> u32 {
        match self {
            Self::Drop => 0,
            Self::Accept => 1,
            Self::Stolen => 2,
            Self::Queue => 3,
            Self::Repeat => 4,
        }
    }
}

/// Reply answering one delivered packet. Built, encoded, sent, discarded.
///
/// The packet id must come from a message actually received on `queue_num`;
/// the encoder does not check this.
#[derive(Debug)]
pub struct VerdictReply {
    builder: MessageBuilder,
}

impl VerdictReply {
    pub fn new(queue_num: u16, packet_id: u32, verdict: Verdict) -> Self {
        let mut builder = MessageBuilder::new(MessageKind::Verdict, queue_num);
        let mut hdr = [0u8; 8];
        hdr[..4].copy_from_slice(&verdict.code().to_be_bytes());
        hdr[4..].copy_from_slice(&packet_id.to_be_bytes());
        builder.put(NFQA_VERDICT_HDR, &hdr);
        Self { builder }
    }

    /// Attach a conntrack mark inside a nested NFQA_CT container.
    ///
    /// At most once per reply: opening the container a second time in one
    /// message is undefined. Further conntrack sub-attributes would go
    /// inside the same container before it closes.
    pub fn mark(mut self, value: u32) -> Self {
        self.builder.begin_nested(NFQA_CT);
        self.builder.put_u32(CTA_MARK, value);
        self.builder.end_nested();
        self
    }

    pub fn encode(self) -> Vec<u8> {
        self.builder.finish()
    }
}
