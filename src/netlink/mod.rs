//! nfnetlink_queue wire protocol: outer message framing and the TLV
//! attribute layer carried inside each message.
//!
//! Framing fields (lengths, types, flags) are native-endian per the netlink
//! convention; attribute values and the queue number in `nfgenmsg` are
//! network byte order. All endian conversion happens in this module tree so
//! the layers above stay endian-agnostic.

pub mod attr;
pub mod message;

pub use attr::{Attr, AttrSet, AttrWriter};
pub use message::{Message, MessageBuilder, MessageIter, MessageKind};

/// Alignment unit for netlink headers and attributes.
pub const NL_ALIGN: usize = 4;

/// Round `len` up to the netlink alignment boundary.
pub const fn align(len: usize) -> usize {
    (len + NL_ALIGN - 1) & !(NL_ALIGN - 1)
}

/// Fixed netlink message header size (`nlmsghdr`).
pub const NLMSG_HDRLEN: usize = 16;

/// Netfilter generic header size (`nfgenmsg`: family, version, queue number).
pub const NFGENMSG_LEN: usize = 4;

/// Netfilter queue subsystem id, the high byte of a message type.
pub const NFNL_SUBSYS_QUEUE: u16 = 3;

/// Header flag set on every outbound request.
pub const NLM_F_REQUEST: u16 = 0x01;

/// Netlink-level error report message type.
pub const NLMSG_ERROR: u16 = 0x2;

/// Flag bit marking an attribute as a container of further attributes.
pub const NLA_F_NESTED: u16 = 0x8000;

/// Mask extracting the attribute tag from its type field.
pub const NLA_TYPE_MASK: u16 = 0x3fff;

/// nfnetlink protocol version carried in `nfgenmsg`.
pub const NFNETLINK_V0: u8 = 0;
