//! Interpretation of a delivered packet's attribute set.

use std::fmt;

use serde::Serialize;

use crate::error::{NfqError, Result};
use crate::netlink::AttrSet;

// Attribute tags of a packet-delivery message
pub const NFQA_PACKET_HDR: u16 = 1;
pub const NFQA_VERDICT_HDR: u16 = 2;
pub const NFQA_MARK: u16 = 3;
pub const NFQA_HWADDR: u16 = 9;
pub const NFQA_PAYLOAD: u16 = 10;
pub const NFQA_CT: u16 = 11;
pub const NFQA_CAP_LEN: u16 = 13;
pub const NFQA_SKB_INFO: u16 = 14;

/// Packed metadata header: packet id, link protocol, hook.
const PACKET_HDR_LEN: usize = 7;

/// Fixed address storage in the hardware-address record.
const HWADDR_STORAGE: usize = 8;

// skb info bits reported by the kernel
const SKB_CSUM_NOT_READY: u32 = 1 << 0;
const SKB_GSO: u32 = 1 << 1;
const SKB_CSUM_NOT_VERIFIED: u32 = 1 << 2;

/// Kernel skb state flags attached to a delivered packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkbFlags {
    /// Aggregated by GSO; not the original wire packet.
    pub gso: bool,
    /// Checksum not yet computed; treat as correct.
    pub csum_not_ready: bool,
    /// Checksum not verified by the kernel.
    pub csum_not_verified: bool,
}

impl SkbFlags {
    pub fn from_bits(bits: u32) -> Self {
        Self {
            gso: bits & SKB_GSO != 0,
            csum_not_ready: bits & SKB_CSUM_NOT_READY != 0,
            csum_not_verified: bits & SKB_CSUM_NOT_VERIFIED != 0,
        }
    }

    pub fn is_empty(self) -> bool {
        !(self.gso || self.csum_not_ready || self.csum_not_verified)
    }
}

/// Link-layer address record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HwAddress {
    /// Address bytes actually delivered.
    pub bytes: Vec<u8>,
    /// Length the kernel declared; may exceed `bytes.len()`.
    pub declared_len: u16,
    pub truncated: bool,
}

impl fmt::Display for HwAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.bytes.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{b:02x}")?;
        }
        if self.truncated {
            write!(f, "[truncated]")?;
        }
        Ok(())
    }
}

/// One delivered packet, decoded from its attribute set. Read-only; built
/// fresh per message.
#[derive(Debug, Clone, Serialize)]
pub struct PacketDescriptor {
    pub packet_id: u32,
    /// Netfilter hook the packet was intercepted at.
    pub hook: u8,
    /// Link-layer protocol (ethertype).
    pub link_protocol: u16,
    /// Bytes of payload delivered with this message.
    pub payload_len: usize,
    /// Original packet length when the kernel copied less than the full
    /// packet.
    pub captured_len: Option<u32>,
    /// Delivered payload is shorter than the packet on the wire.
    pub truncated: bool,
    pub skb_flags: SkbFlags,
    pub hw_address: Option<HwAddress>,
}

impl PacketDescriptor {
    /// Interpret a packet-delivery attribute set.
    ///
    /// The metadata header is mandatory: without it there is no packet id,
    /// and no verdict can ever be issued for the packet.
    pub fn from_attrs(attrs: &AttrSet<'_>) -> Result<Self> {
        let hdr = attrs
            .value(NFQA_PACKET_HDR)
            .ok_or(NfqError::MissingAttribute("packet metadata header"))?;
        if hdr.len() < PACKET_HDR_LEN {
            return Err(NfqError::InvalidAttributeLength {
                tag: NFQA_PACKET_HDR,
                len: hdr.len(),
            });
        }
        let packet_id = u32::from_be_bytes([hdr[0], hdr[1], hdr[2], hdr[3]]);
        let link_protocol = u16::from_be_bytes([hdr[4], hdr[5]]);
        let hook = hdr[6];

        let payload_len = attrs.value(NFQA_PAYLOAD).map_or(0, <[u8]>::len);
        let captured_len = attrs.get_u32(NFQA_CAP_LEN)?;
        let truncated = captured_len.is_some_and(|cap| cap as usize != payload_len);
        let skb_flags = SkbFlags::from_bits(attrs.get_u32(NFQA_SKB_INFO)?.unwrap_or(0));
        let hw_address = match attrs.value(NFQA_HWADDR) {
            Some(value) => Some(decode_hw_address(value)?),
            None => None,
        };

        Ok(Self {
            packet_id,
            hook,
            link_protocol,
            payload_len,
            captured_len,
            truncated,
            skb_flags,
            hw_address,
        })
    }
}

/// Record layout: declared length (network order), 2 pad bytes, then up to
/// [`HWADDR_STORAGE`] address bytes.
///
/// The declared length originates on the kernel side and is never used as a
/// copy bound; only the bytes the attribute actually carries are read.
fn decode_hw_address(value: &[u8]) -> Result<HwAddress> {
    if value.len() < 4 {
        return Err(NfqError::InvalidAttributeLength {
            tag: NFQA_HWADDR,
            len: value.len(),
        });
    }
    let declared_len = u16::from_be_bytes([value[0], value[1]]);
    let stored = &value[4..];
    let avail = (declared_len as usize).min(stored.len()).min(HWADDR_STORAGE);
    Ok(HwAddress {
        bytes: stored[..avail].to_vec(),
        declared_len,
        truncated: declared_len as usize > avail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::AttrWriter;

    fn parse(w: AttrWriter) -> Result<PacketDescriptor> {
        let buf = w.into_buf();
        let attrs = AttrSet::parse(&buf)?;
        PacketDescriptor::from_attrs(&attrs)
    }

    fn put_packet_hdr(w: &mut AttrWriter, packet_id: u32, protocol: u16, hook: u8) {
        let mut hdr = [0u8; 7];
        hdr[..4].copy_from_slice(&packet_id.to_be_bytes());
        hdr[4..6].copy_from_slice(&protocol.to_be_bytes());
        hdr[6] = hook;
        w.put(NFQA_PACKET_HDR, &hdr);
    }

    #[test]
    fn test_mandatory_fields_roundtrip() {
        let mut w = AttrWriter::new();
        put_packet_hdr(&mut w, 0xdead_beef, 0x0800, 2);
        w.put(NFQA_PAYLOAD, &[0u8; 60]);

        let d = parse(w).unwrap();
        assert_eq!(d.packet_id, 0xdead_beef);
        assert_eq!(d.link_protocol, 0x0800);
        assert_eq!(d.hook, 2);
        assert_eq!(d.payload_len, 60);
        assert!(!d.truncated);
        assert!(d.skb_flags.is_empty());
        assert!(d.hw_address.is_none());
    }

    #[test]
    fn test_missing_metadata_header_fails() {
        let mut w = AttrWriter::new();
        w.put(NFQA_PAYLOAD, &[0u8; 20]);

        let err = parse(w).unwrap_err();
        assert!(matches!(err, NfqError::MissingAttribute(_)));
    }

    #[test]
    fn test_cap_len_mismatch_sets_truncated() {
        let mut w = AttrWriter::new();
        put_packet_hdr(&mut w, 1, 0x0800, 0);
        w.put(NFQA_PAYLOAD, &[0u8; 64]);
        w.put_u32(NFQA_CAP_LEN, 1500);

        let d = parse(w).unwrap();
        assert!(d.truncated);
        assert_eq!(d.captured_len, Some(1500));
    }

    #[test]
    fn test_cap_len_equal_is_not_truncated() {
        let mut w = AttrWriter::new();
        put_packet_hdr(&mut w, 1, 0x0800, 0);
        w.put(NFQA_PAYLOAD, &[0u8; 64]);
        w.put_u32(NFQA_CAP_LEN, 64);

        let d = parse(w).unwrap();
        assert!(!d.truncated);
    }

    #[test]
    fn test_skb_flag_bits() {
        let cases = [
            (0, SkbFlags::default()),
            (
                SKB_GSO,
                SkbFlags {
                    gso: true,
                    ..SkbFlags::default()
                },
            ),
            (
                SKB_CSUM_NOT_READY | SKB_CSUM_NOT_VERIFIED,
                SkbFlags {
                    csum_not_ready: true,
                    csum_not_verified: true,
                    ..SkbFlags::default()
                },
            ),
            (
                SKB_GSO | SKB_CSUM_NOT_READY | SKB_CSUM_NOT_VERIFIED,
                SkbFlags {
                    gso: true,
                    csum_not_ready: true,
                    csum_not_verified: true,
                },
            ),
        ];
        for (bits, expected) in cases {
            let mut w = AttrWriter::new();
            put_packet_hdr(&mut w, 1, 0x0800, 0);
            w.put_u32(NFQA_SKB_INFO, bits);
            assert_eq!(parse(w).unwrap().skb_flags, expected, "bits {bits:#x}");
        }
    }

    #[test]
    fn test_hw_address_declared_12_stored_6() {
        let mut w = AttrWriter::new();
        put_packet_hdr(&mut w, 1, 0x0800, 0);
        let mut record = Vec::new();
        record.extend_from_slice(&12u16.to_be_bytes());
        record.extend_from_slice(&[0, 0]); // pad
        record.extend_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        w.put(NFQA_HWADDR, &record);

        let hw = parse(w).unwrap().hw_address.unwrap();
        assert!(hw.truncated);
        assert_eq!(hw.declared_len, 12);
        assert_eq!(hw.bytes, [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    }

    #[test]
    fn test_hw_address_full_record() {
        let mut w = AttrWriter::new();
        put_packet_hdr(&mut w, 1, 0x0800, 0);
        let mut record = Vec::new();
        record.extend_from_slice(&6u16.to_be_bytes());
        record.extend_from_slice(&[0, 0]);
        record.extend_from_slice(&[0x02, 0x42, 0xac, 0x11, 0x00, 0x02, 0x00, 0x00]);
        w.put(NFQA_HWADDR, &record);

        let hw = parse(w).unwrap().hw_address.unwrap();
        assert!(!hw.truncated);
        assert_eq!(hw.bytes, [0x02, 0x42, 0xac, 0x11, 0x00, 0x02]);
        assert_eq!(hw.to_string(), "02:42:ac:11:00:02");
    }

    #[test]
    fn test_hw_address_declared_past_storage() {
        // declared 12 with the full 8-byte storage: only 8 bytes exposed
        let mut w = AttrWriter::new();
        put_packet_hdr(&mut w, 1, 0x0800, 0);
        let mut record = Vec::new();
        record.extend_from_slice(&12u16.to_be_bytes());
        record.extend_from_slice(&[0, 0]);
        record.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        w.put(NFQA_HWADDR, &record);

        let hw = parse(w).unwrap().hw_address.unwrap();
        assert!(hw.truncated);
        assert_eq!(hw.bytes.len(), 8);
    }
}
