//! Outer message framing: `nlmsghdr` plus the netfilter `nfgenmsg`.

use super::attr::{AttrSet, AttrWriter};
use super::{NFGENMSG_LEN, NFNETLINK_V0, NFNL_SUBSYS_QUEUE, NLMSG_ERROR, NLMSG_HDRLEN, NLM_F_REQUEST, align};
use crate::error::{NfqError, Result};

const NFQNL_MSG_PACKET: u16 = NFNL_SUBSYS_QUEUE << 8;
const NFQNL_MSG_VERDICT: u16 = (NFNL_SUBSYS_QUEUE << 8) | 1;
const NFQNL_MSG_CONFIG: u16 = (NFNL_SUBSYS_QUEUE << 8) | 2;

/// Message types this client exchanges with the queue subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Inbound packet delivery.
    Packet,
    /// Outbound verdict reply.
    Verdict,
    /// Outbound queue configuration.
    Config,
    /// Netlink-level error report.
    Error,
    /// Anything else; skipped by the dispatcher.
    Other(u16),
}

impl MessageKind {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            NFQNL_MSG_PACKET => Self::Packet,
            NFQNL_MSG_VERDICT => Self::Verdict,
            NFQNL_MSG_CONFIG => Self::Config,
            NLMSG_ERROR => Self::Error,
            other => Self::Other(other),
        }
    }

    pub fn to_raw(self) -> u16 {
        match self {
            Self::Packet => NFQNL_MSG_PACKET,
            Self::Verdict => NFQNL_MSG_VERDICT,
            Self::Config => NFQNL_MSG_CONFIG,
            Self::Error => NLMSG_ERROR,
            Self::Other(raw) => raw,
        }
    }
}

/// Decoded view over one inbound message. Borrows the receive buffer; its
/// lifetime ends with the receive cycle that produced it.
#[derive(Debug)]
pub struct Message<'a> {
    pub kind: MessageKind,
    /// Queue number the kernel reported in `nfgenmsg`. Replies must carry
    /// it back unchanged; the protocol is queue-scoped.
    pub queue_num: u16,
    pub sequence: u32,
    pub attrs: AttrSet<'a>,
}

impl<'a> Message<'a> {
    /// Parse exactly one message. The declared total length must match the
    /// supplied slice; use [`MessageIter`] to cut a datagram into frames.
    ///
    /// A netlink error report is surfaced directly as [`NfqError::Kernel`].
    pub fn parse(raw: &'a [u8]) -> Result<Self> {
        if raw.len() < NLMSG_HDRLEN {
            return Err(NfqError::MalformedHeader("shorter than the netlink header"));
        }
        let declared = u32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
        if declared != raw.len() {
            return Err(NfqError::MalformedHeader(
                "declared length disagrees with the buffer",
            ));
        }
        let kind = MessageKind::from_raw(u16::from_ne_bytes([raw[4], raw[5]]));
        let sequence = u32::from_ne_bytes([raw[8], raw[9], raw[10], raw[11]]);

        if kind == MessageKind::Error {
            let body = &raw[NLMSG_HDRLEN..];
            if body.len() < 4 {
                return Err(NfqError::MalformedHeader("error report without a code"));
            }
            let code = i32::from_ne_bytes([body[0], body[1], body[2], body[3]]);
            return Err(NfqError::Kernel(-code));
        }

        let (queue_num, attrs) = match kind {
            MessageKind::Packet | MessageKind::Verdict | MessageKind::Config => {
                if raw.len() < NLMSG_HDRLEN + NFGENMSG_LEN {
                    return Err(NfqError::MalformedHeader("queue message without nfgenmsg"));
                }
                // nfgenmsg: family, version, then the queue number in
                // network byte order
                let queue_num =
                    u16::from_be_bytes([raw[NLMSG_HDRLEN + 2], raw[NLMSG_HDRLEN + 3]]);
                let attrs = AttrSet::parse(&raw[NLMSG_HDRLEN + NFGENMSG_LEN..])?;
                (queue_num, attrs)
            }
            _ => (0, AttrSet::default()),
        };

        Ok(Self {
            kind,
            queue_num,
            sequence,
            attrs,
        })
    }
}

/// Cuts one received datagram into its back-to-back message frames, each
/// sliced to its declared length.
pub struct MessageIter<'a> {
    buf: &'a [u8],
}

impl<'a> MessageIter<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }
}

impl<'a> Iterator for MessageIter<'a> {
    type Item = Result<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buf.is_empty() {
            return None;
        }
        if self.buf.len() < NLMSG_HDRLEN {
            self.buf = &[];
            return Some(Err(NfqError::MalformedHeader(
                "trailing bytes shorter than a header",
            )));
        }
        let len =
            u32::from_ne_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]) as usize;
        if len < NLMSG_HDRLEN || len > self.buf.len() {
            self.buf = &[];
            return Some(Err(NfqError::MalformedHeader(
                "declared length runs past the datagram",
            )));
        }
        let frame = &self.buf[..len];
        self.buf = &self.buf[align(len).min(self.buf.len())..];
        Some(Ok(frame))
    }
}

/// Builds one outbound message: netlink header, `nfgenmsg`, then attributes
/// appended through the [`AttrWriter`] surface.
#[derive(Debug)]
pub struct MessageBuilder {
    writer: AttrWriter,
}

impl MessageBuilder {
    pub fn new(kind: MessageKind, queue_num: u16) -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&0u32.to_ne_bytes()); // total length, patched in finish()
        buf.extend_from_slice(&kind.to_raw().to_ne_bytes());
        buf.extend_from_slice(&NLM_F_REQUEST.to_ne_bytes());
        buf.extend_from_slice(&0u32.to_ne_bytes()); // sequence
        buf.extend_from_slice(&0u32.to_ne_bytes()); // port id: kernel
        buf.push(libc::AF_UNSPEC as u8);
        buf.push(NFNETLINK_V0);
        buf.extend_from_slice(&queue_num.to_be_bytes());
        Self {
            writer: AttrWriter::with_buf(buf),
        }
    }

    pub fn put(&mut self, tag: u16, value: &[u8]) -> &mut Self {
        self.writer.put(tag, value);
        self
    }

    pub fn put_u32(&mut self, tag: u16, value: u32) -> &mut Self {
        self.writer.put_u32(tag, value);
        self
    }

    pub fn begin_nested(&mut self, tag: u16) -> &mut Self {
        self.writer.begin_nested(tag);
        self
    }

    pub fn end_nested(&mut self) -> &mut Self {
        self.writer.end_nested();
        self
    }

    /// Back-patch the total length and hand over the finished frame.
    pub fn finish(self) -> Vec<u8> {
        let mut buf = self.writer.into_buf();
        let len = buf.len() as u32;
        buf[0..4].copy_from_slice(&len.to_ne_bytes());
        buf
    }
}
