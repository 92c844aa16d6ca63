use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use nfqclient::config::{self, CopyMode, CFG_F_GSO};
use nfqclient::{Dispatcher, Disposition, NetlinkSocket, PacketDescriptor};

/// Receive packets from an nfnetlink queue and reply with verdicts
#[derive(Debug, Parser)]
#[command(name = "nfqclient", version)]
pub struct Cli {
    /// Queue number the nftables ruleset delivers packets to
    pub queue: u16,

    /// Conntrack mark attached to every verdict
    #[arg(long)]
    pub mark: Option<u32>,

    /// Bytes of payload copied to userspace per packet
    #[arg(long, default_value_t = 0xffff)]
    pub copy_range: u32,

    /// Print packet records as JSON lines instead of log output
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}

pub fn run(cli: Cli) -> Result<()> {
    let mut socket = NetlinkSocket::open().context("open netfilter netlink socket")?;
    // Lost-packet notifications would otherwise surface as read errors
    socket
        .set_no_enobufs()
        .context("disable ENOBUFS reporting")?;

    config::negotiate(
        &mut socket,
        cli.queue,
        CopyMode::Packet,
        cli.copy_range,
        CFG_F_GSO,
        CFG_F_GSO,
    )
    .context("bind queue")?;
    info!(queue = cli.queue, "bound, waiting for packets");

    // Never set: termination is external. Kept as the graceful-shutdown seam.
    let stop = AtomicBool::new(false);
    let mark = cli.mark;
    let json = cli.json;

    let mut dispatcher = Dispatcher::new(socket);
    dispatcher.run(
        |packet| {
            report_packet(packet, json);
            let disposition = Disposition::accept();
            match mark {
                Some(value) => disposition.with_mark(value),
                None => disposition,
            }
        },
        &stop,
    )?;
    Ok(())
}

fn report_packet(packet: &PacketDescriptor, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(packet) {
            println!("{line}");
        }
        return;
    }

    let mut line = format!(
        "packet id={} hw=0x{:04x} hook={} len={}",
        packet.packet_id, packet.link_protocol, packet.hook, packet.payload_len
    );
    if let Some(hw) = &packet.hw_address {
        line.push_str(&format!(" hwaddr={hw}"));
    }
    if packet.truncated {
        line.push_str(" truncated");
    }
    if packet.skb_flags.gso {
        line.push_str(" gso");
    }
    if packet.skb_flags.csum_not_ready {
        line.push_str(" csum-not-ready");
    }
    info!("{line}");
}
