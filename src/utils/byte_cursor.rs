use crate::err::{SecurityDescriptorError, SecurityDescriptorResult};
use crate::utils::bytes;

/// A lightweight cursor over an immutable byte slice.
///
/// This is the slice/offset equivalent of `Cursor<&[u8]>`: every read is bounds checked
/// and reports what was being read when it runs off the end of the buffer.
///
/// All reads are little-endian and advance the cursor on success.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    #[inline]
    pub(crate) fn with_pos(buf: &'a [u8], pos: usize) -> SecurityDescriptorResult<Self> {
        // Allow pos == len (EOF), reject pos > len.
        let _ = bytes::slice_r(buf, pos, 0, "cursor.position")?;
        Ok(Self { buf, pos })
    }

    #[inline]
    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub(crate) fn set_pos(
        &mut self,
        pos: usize,
        what: &'static str,
    ) -> SecurityDescriptorResult<()> {
        let _ = bytes::slice_r(self.buf, pos, 0, what)?;
        self.pos = pos;
        Ok(())
    }

    #[inline]
    pub(crate) fn take_bytes(
        &mut self,
        len: usize,
        what: &'static str,
    ) -> SecurityDescriptorResult<&'a [u8]> {
        let out = bytes::slice_r(self.buf, self.pos, len, what)?;
        self.pos += len;
        Ok(out)
    }

    #[inline]
    pub(crate) fn array<const N: usize>(
        &mut self,
        what: &'static str,
    ) -> SecurityDescriptorResult<[u8; N]> {
        let v = bytes::read_array_r::<N>(self.buf, self.pos, what)?;
        self.pos += N;
        Ok(v)
    }

    #[inline]
    pub(crate) fn u8_named(&mut self, what: &'static str) -> SecurityDescriptorResult<u8> {
        let b = bytes::read_u8(self.buf, self.pos)
            .ok_or_else(|| bytes::truncated(what, self.pos, 1, self.buf.len()))?;
        self.pos += 1;
        Ok(b)
    }

    #[inline]
    pub(crate) fn u16_named(&mut self, what: &'static str) -> SecurityDescriptorResult<u16> {
        let v = bytes::read_u16_le_r(self.buf, self.pos, what)?;
        self.pos += 2;
        Ok(v)
    }

    #[inline]
    pub(crate) fn u32_named(&mut self, what: &'static str) -> SecurityDescriptorResult<u32> {
        let v = bytes::read_u32_le_r(self.buf, self.pos, what)?;
        self.pos += 4;
        Ok(v)
    }

    /// Read a SID: revision, sub-authority count, 6-byte authority, then
    /// `count` little-endian sub-authorities.
    pub(crate) fn sid_bytes(&mut self) -> SecurityDescriptorResult<&'a [u8]> {
        let start = self.pos;
        let remaining = self.buf.get(start..).unwrap_or_default();

        if remaining.len() < 8 {
            return Err(SecurityDescriptorError::Truncated {
                what: "sid",
                offset: start as u64,
                need: 8,
                have: remaining.len(),
            });
        }

        let sub_count = remaining[1] as usize;
        let len = 8 + sub_count * 4;
        if remaining.len() < len {
            return Err(SecurityDescriptorError::Truncated {
                what: "sid",
                offset: start as u64,
                need: len,
                have: remaining.len(),
            });
        }

        self.take_bytes(len, "sid")
    }
}
