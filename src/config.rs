//! Queue binding and delivery-parameter negotiation.
//!
//! Two configuration messages bind this process to a queue number and
//! declare how much payload the kernel copies per packet. Both must be
//! sent, in order, before the receive loop starts; the channel is in an
//! undefined binding state until then.

use crate::error::Result;
use crate::netlink::{MessageBuilder, MessageKind};
use crate::socket::Channel;

// Attribute tags of a configuration message
pub const NFQA_CFG_CMD: u16 = 1;
pub const NFQA_CFG_PARAMS: u16 = 2;
pub const NFQA_CFG_MASK: u16 = 4;
pub const NFQA_CFG_FLAGS: u16 = 5;

const CFG_CMD_BIND: u8 = 1;

// Optional delivery behaviors toggled through the mask/flags pair
pub const CFG_F_FAIL_OPEN: u32 = 1 << 0;
pub const CFG_F_CONNTRACK: u32 = 1 << 1;
pub const CFG_F_GSO: u32 = 1 << 2;
pub const CFG_F_UID_GID: u32 = 1 << 3;
pub const CFG_F_SECCTX: u32 = 1 << 4;

/// How much of each packet the kernel copies to userspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    /// Metadata attributes only, no payload.
    Meta,
    /// Payload up to the configured copy range.
    Packet,
}

impl CopyMode {
    fn code(self) -> u8 {
        match self {
            Self::Meta => 1,
            Self::Packet => 2,
        }
    }
}

/// Build the message binding this socket to `queue_num`.
pub fn bind_message(queue_num: u16) -> Vec<u8> {
    let mut b = MessageBuilder::new(MessageKind::Config, queue_num);
    // nfqnl_msg_config_cmd: command, pad, protocol family (network order)
    let mut cmd = [0u8; 4];
    cmd[0] = CFG_CMD_BIND;
    cmd[2..].copy_from_slice(&(libc::AF_INET as u16).to_be_bytes());
    b.put(NFQA_CFG_CMD, &cmd);
    b.finish()
}

/// Build the message declaring copy mode, copy range and optional
/// behaviors.
///
/// `flags_mask` selects which flag bits this message touches and
/// `flags_value` gives their new state; bits outside the mask keep their
/// kernel-side value. New flags reuse this pairing.
pub fn params_message(
    queue_num: u16,
    copy_mode: CopyMode,
    copy_range: u32,
    flags_mask: u32,
    flags_value: u32,
) -> Vec<u8> {
    let mut b = MessageBuilder::new(MessageKind::Config, queue_num);
    // nfqnl_msg_config_params: copy range (network order) then mode, packed
    let mut params = [0u8; 5];
    params[..4].copy_from_slice(&copy_range.to_be_bytes());
    params[4] = copy_mode.code();
    b.put(NFQA_CFG_PARAMS, &params);
    if flags_mask != 0 {
        b.put_u32(NFQA_CFG_FLAGS, flags_value);
        b.put_u32(NFQA_CFG_MASK, flags_mask);
    }
    b.finish()
}

/// Send the bind and params messages, in that order, over `channel`.
pub fn negotiate<C: Channel>(
    channel: &mut C,
    queue_num: u16,
    copy_mode: CopyMode,
    copy_range: u32,
    flags_mask: u32,
    flags_value: u32,
) -> Result<()> {
    channel.send(&bind_message(queue_num))?;
    channel.send(&params_message(
        queue_num, copy_mode, copy_range, flags_mask, flags_value,
    ))?;
    Ok(())
}
