//! Userspace client for the Linux nfnetlink_queue protocol.
//!
//! Binds to one packet queue, decodes each delivered packet's netlink TLV
//! attribute set into a [`PacketDescriptor`], and replies with a
//! [`Verdict`], optionally carrying a conntrack mark. The kernel-side
//! ruleset decides which packets enter the queue; policy beyond the
//! demonstration handler is layered on top by callers.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod netlink;
pub mod packet;
pub mod socket;
pub mod verdict;

pub use dispatcher::{Dispatcher, Disposition};
pub use error::{NfqError, Result};
pub use packet::{HwAddress, PacketDescriptor, SkbFlags};
pub use socket::{Channel, NetlinkSocket};
pub use verdict::{Verdict, VerdictReply};
