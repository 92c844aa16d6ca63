//! Type-length-value attribute codec.
//!
//! Each attribute is a 4-byte header (length covering header plus value,
//! then the type field) followed by the value, padded to a 4-byte boundary.
//! The padding is not counted in the declared length. Container attributes
//! set the nested flag bit and hold further attributes in their value.

use super::{align, NLA_F_NESTED, NLA_TYPE_MASK, NL_ALIGN};
use crate::error::{NfqError, Result};

/// Attribute header size: u16 length plus u16 type.
pub const ATTR_HDRLEN: usize = 4;

/// One decoded attribute, borrowing the buffer it was parsed from.
#[derive(Debug, Clone, Copy)]
pub struct Attr<'a> {
    pub tag: u16,
    pub nested: bool,
    pub value: &'a [u8],
}

/// Attributes decoded from one byte range, in wire order.
///
/// Lookup is by tag; an absent tag is `None`, never an error. When the
/// kernel repeats a tag the newest occurrence wins.
#[derive(Debug, Default)]
pub struct AttrSet<'a> {
    attrs: Vec<Attr<'a>>,
}

impl<'a> AttrSet<'a> {
    /// Scan `buf` left to right. Fails when a declared length is below the
    /// header minimum or runs past the end of the buffer; declared lengths
    /// are remote input and never trusted as read bounds.
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        let mut attrs = Vec::new();
        let mut rest = buf;
        while !rest.is_empty() {
            if rest.len() < ATTR_HDRLEN {
                return Err(NfqError::TruncatedAttribute {
                    declared: ATTR_HDRLEN,
                    remaining: rest.len(),
                });
            }
            let len = u16::from_ne_bytes([rest[0], rest[1]]) as usize;
            let raw_type = u16::from_ne_bytes([rest[2], rest[3]]);
            if len < ATTR_HDRLEN || len > rest.len() {
                return Err(NfqError::TruncatedAttribute {
                    declared: len,
                    remaining: rest.len(),
                });
            }
            attrs.push(Attr {
                tag: raw_type & NLA_TYPE_MASK,
                nested: raw_type & NLA_F_NESTED != 0,
                value: &rest[ATTR_HDRLEN..len],
            });
            rest = &rest[align(len).min(rest.len())..];
        }
        Ok(Self { attrs })
    }

    pub fn get(&self, tag: u16) -> Option<&Attr<'a>> {
        self.attrs.iter().rev().find(|a| a.tag == tag)
    }

    /// Raw value bytes of `tag`, if present.
    pub fn value(&self, tag: u16) -> Option<&'a [u8]> {
        self.get(tag).map(|a| a.value)
    }

    /// A u32 value in network byte order. Present-but-wrong-sized is an
    /// error; absent is not.
    pub fn get_u32(&self, tag: u16) -> Result<Option<u32>> {
        match self.value(tag) {
            None => Ok(None),
            Some(v) => {
                let bytes: [u8; 4] = v
                    .try_into()
                    .map_err(|_| NfqError::InvalidAttributeLength { tag, len: v.len() })?;
                Ok(Some(u32::from_be_bytes(bytes)))
            }
        }
    }

    /// A u16 value in network byte order.
    pub fn get_u16(&self, tag: u16) -> Result<Option<u16>> {
        match self.value(tag) {
            None => Ok(None),
            Some(v) => {
                let bytes: [u8; 2] = v
                    .try_into()
                    .map_err(|_| NfqError::InvalidAttributeLength { tag, len: v.len() })?;
                Ok(Some(u16::from_be_bytes(bytes)))
            }
        }
    }

    /// Parse the contents of a container attribute as its own attribute set.
    pub fn nested(&self, tag: u16) -> Result<Option<AttrSet<'a>>> {
        match self.value(tag) {
            None => Ok(None),
            Some(v) => AttrSet::parse(v).map(Some),
        }
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

/// Append-only attribute encoder over a byte buffer.
///
/// Nested containers are bracketed by [`begin_nested`](Self::begin_nested) /
/// [`end_nested`](Self::end_nested); the container length is back-patched
/// once its contents are known.
#[derive(Debug, Default)]
pub struct AttrWriter {
    buf: Vec<u8>,
    nests: Vec<usize>,
}

impl AttrWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue writing into an existing buffer (used by the message
    /// builder, whose headers precede the attribute region).
    pub fn with_buf(buf: Vec<u8>) -> Self {
        Self {
            buf,
            nests: Vec::new(),
        }
    }

    /// Append one attribute with an opaque value.
    pub fn put(&mut self, tag: u16, value: &[u8]) {
        let len = (ATTR_HDRLEN + value.len()) as u16;
        self.buf.extend_from_slice(&len.to_ne_bytes());
        self.buf.extend_from_slice(&tag.to_ne_bytes());
        self.buf.extend_from_slice(value);
        self.pad();
    }

    /// Append a u32 attribute in network byte order.
    pub fn put_u32(&mut self, tag: u16, value: u32) {
        self.put(tag, &value.to_be_bytes());
    }

    /// Append a u16 attribute in network byte order.
    pub fn put_u16(&mut self, tag: u16, value: u16) {
        self.put(tag, &value.to_be_bytes());
    }

    /// Open a container attribute; everything written until the matching
    /// [`end_nested`](Self::end_nested) lands inside it.
    pub fn begin_nested(&mut self, tag: u16) {
        self.nests.push(self.buf.len());
        self.buf.extend_from_slice(&0u16.to_ne_bytes());
        self.buf.extend_from_slice(&(tag | NLA_F_NESTED).to_ne_bytes());
    }

    /// Close the innermost open container and back-patch its length.
    pub fn end_nested(&mut self) {
        if let Some(start) = self.nests.pop() {
            let len = (self.buf.len() - start) as u16;
            self.buf[start..start + 2].copy_from_slice(&len.to_ne_bytes());
            self.pad();
        }
    }

    fn pad(&mut self) {
        while self.buf.len() % NL_ALIGN != 0 {
            self.buf.push(0);
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_buf(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_attr_roundtrip() {
        let mut w = AttrWriter::new();
        w.put(5, b"abcdef");
        let buf = w.into_buf();

        let set = AttrSet::parse(&buf).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.value(5), Some(&b"abcdef"[..]));
        assert_eq!(set.value(6), None);
    }

    #[test]
    fn test_unaligned_value_is_padded() {
        let mut w = AttrWriter::new();
        w.put(1, b"abc");
        w.put(2, b"x");
        let buf = w.into_buf();

        // 4 + 3 padded to 8, then 4 + 1 padded to 8
        assert_eq!(buf.len(), 16);
        let set = AttrSet::parse(&buf).unwrap();
        assert_eq!(set.value(1), Some(&b"abc"[..]));
        assert_eq!(set.value(2), Some(&b"x"[..]));
    }

    #[test]
    fn test_declared_length_past_buffer_fails() {
        let mut w = AttrWriter::new();
        w.put(1, &[0u8; 16]);
        let buf = w.into_buf();

        for cut in 1..buf.len() {
            let err = AttrSet::parse(&buf[..buf.len() - cut]).unwrap_err();
            assert!(
                matches!(err, NfqError::TruncatedAttribute { .. }),
                "cut {cut} should truncate"
            );
        }
    }

    #[test]
    fn test_declared_length_below_header_fails() {
        // len = 2, below the 4-byte minimum
        let mut raw = Vec::new();
        raw.extend_from_slice(&2u16.to_ne_bytes());
        raw.extend_from_slice(&1u16.to_ne_bytes());
        let err = AttrSet::parse(&raw).unwrap_err();
        assert!(matches!(err, NfqError::TruncatedAttribute { .. }));
    }

    #[test]
    fn test_duplicate_tag_last_wins() {
        let mut w = AttrWriter::new();
        w.put(3, b"old");
        w.put(3, b"new");
        let buf = w.into_buf();

        let set = AttrSet::parse(&buf).unwrap();
        assert_eq!(set.value(3), Some(&b"new"[..]));
    }

    #[test]
    fn test_get_u32_network_order() {
        let mut w = AttrWriter::new();
        w.put_u32(7, 0x0102_0304);
        let buf = w.into_buf();

        let set = AttrSet::parse(&buf).unwrap();
        assert_eq!(buf[4..8], [0x01, 0x02, 0x03, 0x04]);
        assert_eq!(set.get_u32(7).unwrap(), Some(0x0102_0304));
        assert_eq!(set.get_u32(8).unwrap(), None);
    }

    #[test]
    fn test_get_u32_wrong_size_fails() {
        let mut w = AttrWriter::new();
        w.put(7, b"ab");
        let buf = w.into_buf();

        let set = AttrSet::parse(&buf).unwrap();
        let err = set.get_u32(7).unwrap_err();
        assert!(matches!(
            err,
            NfqError::InvalidAttributeLength { tag: 7, len: 2 }
        ));
    }

    #[test]
    fn test_nested_container_roundtrip() {
        let mut w = AttrWriter::new();
        w.begin_nested(11);
        w.put_u32(8, 42);
        w.put(2, b"inner");
        w.end_nested();
        w.put_u32(13, 9);
        let buf = w.into_buf();

        let set = AttrSet::parse(&buf).unwrap();
        let container = set.get(11).unwrap();
        assert!(container.nested);

        let inner = set.nested(11).unwrap().unwrap();
        assert_eq!(inner.get_u32(8).unwrap(), Some(42));
        assert_eq!(inner.value(2), Some(&b"inner"[..]));
        assert_eq!(set.get_u32(13).unwrap(), Some(9));
    }

    #[test]
    fn test_empty_buffer_is_empty_set() {
        let set = AttrSet::parse(&[]).unwrap();
        assert!(set.is_empty());
    }
}
