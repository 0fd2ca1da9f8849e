//! Variable-length integer coding.
//!
//! Most persisted integers (lengths, counts, small offsets) are small, so they are stored using
//! 7 value bits per byte. The least significant group comes first, and every byte except the last
//! has its high (continuation) bit set:
//!
//! ```text
//! 300 = 0b10_0101100  ->  [1_0101100, 0_0000010]  =  [0xAC, 0x02]
//! ```
//!
//! Where a deterministic width is needed instead of a minimal one (e.g. keys that must sort
//! bytewise), the fixed-width variant stores exactly [`FIXED_SIZE`] big-endian bytes.

use alloc::vec::Vec;

use crate::error::DecodeError;

/// The continuation bit. Set on every byte of an encoded value except the last one.
pub const CONTINUATION_BIT: u8 = 0x80;

const VALUE_MASK: u8 = 0x7F;

/// The maximum number of bytes an encoded `u64` can occupy.
pub const MAX_ENCODED_SIZE: usize = 10;

/// The number of bytes used by the fixed-width encoding.
pub const FIXED_SIZE: usize = 8;

/// Appends the variable-length encoding of `x` to `out`.
pub fn encode(mut x: u64, out: &mut Vec<u8>) {
    while x > VALUE_MASK as u64 {
        out.push((x as u8 & VALUE_MASK) | CONTINUATION_BIT);
        x >>= 7;
    }
    out.push(x as u8);
}

/// Returns the variable-length encoding of `x` in a freshly allocated vector.
pub fn encode_to_vec(x: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(size(x));
    encode(x, &mut out);
    out
}

/// The number of bytes [`encode`] produces for `x`.
pub const fn size(mut x: u64) -> usize {
    let mut n = 1;
    while x > VALUE_MASK as u64 {
        x >>= 7;
        n += 1;
    }
    n
}

/// Decodes one value starting at `*offset` and advances the offset past it.
///
/// If the input ends before a byte without the continuation bit is found,
/// [`DecodeError::UnexpectedEof`] is returned, even when the groups read so far already exceed
/// 64 bits. A complete value that does not fit is [`DecodeError::Overflow`]. In case of any error
/// the offset is left untouched.
pub fn decode(bytes: &[u8], offset: &mut usize) -> Result<u64, DecodeError> {
    let mut pos = *offset;
    let mut value = 0u64;
    let mut shift = 0u32;
    let mut overflow = false;
    loop {
        let byte = *bytes.get(pos).ok_or(DecodeError::UnexpectedEof)?;
        pos += 1;

        let group = (byte & VALUE_MASK) as u64;
        // The tenth byte may only contribute the single remaining bit.
        if shift >= u64::BITS || (shift == 63 && group > 1) {
            overflow = true;
        } else {
            value |= group << shift;
        }

        if byte & CONTINUATION_BIT == 0 {
            if overflow {
                return Err(DecodeError::Overflow { bits: u64::BITS });
            }
            *offset = pos;
            return Ok(value);
        }
        shift = shift.saturating_add(7);
    }
}

/// Advances `*offset` past `count` encoded values without decoding them.
///
/// Fails with [`DecodeError::UnexpectedEof`] if fewer than `count` complete values remain. The
/// offset is left untouched in that case.
pub fn skip(bytes: &[u8], offset: &mut usize, count: usize) -> Result<(), DecodeError> {
    let mut pos = *offset;
    for _ in 0..count {
        loop {
            let byte = *bytes.get(pos).ok_or(DecodeError::UnexpectedEof)?;
            pos += 1;
            if byte & CONTINUATION_BIT == 0 {
                break;
            }
        }
    }
    *offset = pos;
    Ok(())
}

/// Encodes `x` as exactly [`FIXED_SIZE`] big-endian bytes.
pub const fn encode_fixed(x: u64) -> [u8; FIXED_SIZE] {
    x.to_be_bytes()
}

/// Decodes a fixed-width value starting at `*offset` and advances the offset past it.
pub fn decode_fixed(bytes: &[u8], offset: &mut usize) -> Result<u64, DecodeError> {
    let end = offset.checked_add(FIXED_SIZE).ok_or(DecodeError::UnexpectedEof)?;
    let raw: [u8; FIXED_SIZE] = bytes
        .get(*offset..end)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(DecodeError::UnexpectedEof)?;
    *offset = end;
    Ok(u64::from_be_bytes(raw))
}

/// An append-only buffer that values are encoded into.
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn write_u64(&mut self, x: u64) {
        encode(x, &mut self.buf);
    }

    pub fn write_u32(&mut self, x: u32) {
        encode(x as u64, &mut self.buf);
    }

    pub fn write_u16(&mut self, x: u16) {
        encode(x as u64, &mut self.buf);
    }

    /// Writes the 16-bit two's complement pattern of `x`, so negative values take at most three
    /// bytes.
    pub fn write_i16(&mut self, x: i16) {
        self.write_u16(x as u16);
    }

    pub fn write_fixed_u64(&mut self, x: u64) {
        self.buf.extend_from_slice(&encode_fixed(x));
    }

    /// Appends raw bytes without any length prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// A cursor decoding values out of a byte slice.
///
/// Every `read_*` method either consumes exactly one value or fails and leaves the position where
/// it was.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        decode(self.data, &mut self.position)
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.read_narrow(u32::BITS).map(|x| x as u32)
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        self.read_narrow(u16::BITS).map(|x| x as u16)
    }

    /// Reads a value written by [`ByteWriter::write_i16`].
    pub fn read_i16(&mut self) -> Result<i16, DecodeError> {
        self.read_u16().map(|x| x as i16)
    }

    pub fn read_fixed_u64(&mut self) -> Result<u64, DecodeError> {
        decode_fixed(self.data, &mut self.position)
    }

    /// Reads `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .position
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(DecodeError::UnexpectedEof)?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Skips `count` variable-length values.
    pub fn skip_values(&mut self, count: usize) -> Result<(), DecodeError> {
        skip(self.data, &mut self.position, count)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    fn read_narrow(&mut self, bits: u32) -> Result<u64, DecodeError> {
        let mut pos = self.position;
        let x = decode(self.data, &mut pos)?;
        if x >> bits != 0 {
            return Err(DecodeError::Overflow { bits });
        }
        self.position = pos;
        Ok(x)
    }
}
