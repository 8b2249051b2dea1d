//! Minimal DER reader for the RSA key structures Tor puts on the wire
//!
//! Only what `RSAPublicKey` / `RSAPrivateKey` blobs need: SEQUENCE, INTEGER,
//! short-form lengths and the `0x81` / `0x82` long forms. Every read is
//! bounds-checked and returns `None` on short input.

/// INTEGER tag
pub(crate) const TAG_INTEGER: u8 = 0x02;

/// SEQUENCE (constructed) tag
pub(crate) const TAG_SEQUENCE: u8 = 0x30;

/// Long-form length prefix: one length byte follows
pub(crate) const LEN_ONE_BYTE: u8 = 0x81;

/// Long-form length prefix: two big-endian length bytes follow
pub(crate) const LEN_TWO_BYTES: u8 = 0x82;

/// Cursor over a DER buffer
pub(crate) struct DerReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> DerReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub(crate) fn read_u8(&mut self) -> Option<u8> {
        let byte = *self.buf.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    pub(crate) fn read_u16(&mut self) -> Option<u16> {
        let bytes = self.take(2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Consume exactly `len` bytes
    pub(crate) fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let bytes = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }

    /// Consume one byte and require it to be `tag`
    pub(crate) fn expect_tag(&mut self, tag: u8) -> Option<()> {
        (self.read_u8()? == tag).then_some(())
    }

    /// Long-form length restricted to `0x81 n` and `0x82 nn`
    pub(crate) fn read_long_length(&mut self) -> Option<usize> {
        match self.read_u8()? {
            LEN_ONE_BYTE => self.read_u8().map(usize::from),
            LEN_TWO_BYTES => self.read_u16().map(usize::from),
            _ => None,
        }
    }

    /// Short-form length, or the `0x81` / `0x82` long forms
    pub(crate) fn read_length(&mut self) -> Option<usize> {
        let first = self.read_u8()?;
        match first {
            0x00..=0x7f => Some(usize::from(first)),
            LEN_ONE_BYTE => self.read_u8().map(usize::from),
            LEN_TWO_BYTES => self.read_u16().map(usize::from),
            _ => None,
        }
    }

    /// Consume a tag/length header and return a reader over the content
    pub(crate) fn read_element(&mut self, tag: u8) -> Option<DerReader<'a>> {
        self.expect_tag(tag)?;
        let len = self.read_length()?;
        self.take(len).map(DerReader::new)
    }

    /// Skip one element regardless of its tag
    pub(crate) fn skip_element(&mut self) -> Option<()> {
        self.read_u8()?;
        let len = self.read_length()?;
        self.take(len).map(|_| ())
    }

    /// INTEGER content bytes (unsigned magnitude, possibly with a sign byte)
    pub(crate) fn read_integer(&mut self) -> Option<&'a [u8]> {
        self.expect_tag(TAG_INTEGER)?;
        let len = self.read_length()?;
        if len == 0 {
            return None;
        }
        self.take(len)
    }
}
