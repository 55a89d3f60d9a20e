//! Byte-order detection and fixed-layout binary encoding.
//!
//! Every wire structure in this crate is written field by field through
//! [`Encoder`] and read back through [`Decoder`], so no struct layout or
//! padding assumption leaks onto the wire.

use bytes::{Buf, BufMut};

use crate::error::{GenericError, Result};

/// Byte order of an encoded structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian {
    /// Most significant byte first (network order).
    Big,
    /// Least significant byte first.
    Little,
}

impl Endian {
    /// Detects the host byte order by inspecting the low byte of an integer.
    pub fn host() -> Self {
        let one: u16 = 1;
        if one.to_ne_bytes()[0] == 1 {
            Endian::Little
        } else {
            Endian::Big
        }
    }

    /// Order used for ADATCP outer headers and the connect payload.
    pub const fn network() -> Self {
        Endian::Big
    }

    /// Endianness byte announced in the ADATCP connect payload.
    pub const fn wire_flag(self) -> u8 {
        match self {
            Endian::Big => 1,
            Endian::Little => 2,
        }
    }

    /// Inverse of [`Endian::wire_flag`].
    pub const fn from_wire_flag(flag: u8) -> Option<Self> {
        match flag {
            1 => Some(Endian::Big),
            2 => Some(Endian::Little),
            _ => None,
        }
    }
}

impl std::fmt::Display for Endian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endian::Big => write!(f, "big endian"),
            Endian::Little => write!(f, "little endian"),
        }
    }
}

/// Writes integers and byte runs in a fixed byte order.
pub struct Encoder<'a, B: BufMut> {
    buf: &'a mut B,
    order: Endian,
}

impl<'a, B: BufMut> Encoder<'a, B> {
    /// Wraps a buffer for encoding in the given order.
    pub fn new(buf: &'a mut B, order: Endian) -> Self {
        Self { buf, order }
    }

    /// Byte order in effect.
    pub fn order(&self) -> Endian {
        self.order
    }

    /// Writes one byte.
    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    /// Writes two bytes in the encoder's order.
    pub fn put_u16(&mut self, v: u16) {
        match self.order {
            Endian::Big => self.buf.put_u16(v),
            Endian::Little => self.buf.put_u16_le(v),
        }
    }

    /// Writes four bytes in the encoder's order.
    pub fn put_u32(&mut self, v: u32) {
        match self.order {
            Endian::Big => self.buf.put_u32(v),
            Endian::Little => self.buf.put_u32_le(v),
        }
    }

    /// Writes eight bytes in the encoder's order.
    pub fn put_u64(&mut self, v: u64) {
        match self.order {
            Endian::Big => self.buf.put_u64(v),
            Endian::Little => self.buf.put_u64_le(v),
        }
    }

    /// Writes bytes as they are.
    pub fn put_slice(&mut self, v: &[u8]) {
        self.buf.put_slice(v);
    }

    /// Writes `v` truncated or padded with `pad` to exactly `len` bytes.
    pub fn put_padded(&mut self, v: &[u8], len: usize, pad: u8) {
        let n = v.len().min(len);
        self.buf.put_slice(&v[..n]);
        self.buf.put_bytes(pad, len - n);
    }

    /// Writes `len` zero bytes.
    pub fn put_zeros(&mut self, len: usize) {
        self.buf.put_bytes(0, len);
    }
}

/// Reads integers and byte runs in a fixed byte order, failing on truncation.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    data: &'a [u8],
    order: Endian,
    pos: usize,
}

impl<'a> Decoder<'a> {
    /// Starts decoding `data` from its first byte.
    pub fn new(data: &'a [u8], order: Endian) -> Self {
        Self {
            data,
            order,
            pos: 0,
        }
    }

    /// Current read offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Byte order in effect.
    pub fn order(&self) -> Endian {
        self.order
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(GenericError::short_read(format!(
                "need {} bytes at offset {}, {} available",
                n,
                self.pos,
                self.remaining()
            ))
            .into());
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Reads one byte.
    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads two bytes in the decoder's order.
    pub fn get_u16(&mut self) -> Result<u16> {
        let mut b = self.take(2)?;
        Ok(match self.order {
            Endian::Big => b.get_u16(),
            Endian::Little => b.get_u16_le(),
        })
    }

    /// Reads four bytes in the decoder's order.
    pub fn get_u32(&mut self) -> Result<u32> {
        let mut b = self.take(4)?;
        Ok(match self.order {
            Endian::Big => b.get_u32(),
            Endian::Little => b.get_u32_le(),
        })
    }

    /// Reads eight bytes in the decoder's order.
    pub fn get_u64(&mut self) -> Result<u64> {
        let mut b = self.take(8)?;
        Ok(match self.order {
            Endian::Big => b.get_u64(),
            Endian::Little => b.get_u64_le(),
        })
    }

    /// Reads exactly `N` bytes into an array.
    pub fn get_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Borrows the next `n` bytes.
    pub fn get_slice(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Skips `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_host_matches_target() {
        #[cfg(target_endian = "little")]
        assert_eq!(Endian::host(), Endian::Little);
        #[cfg(target_endian = "big")]
        assert_eq!(Endian::host(), Endian::Big);
    }

    #[test]
    fn test_wire_flag() {
        assert_eq!(Endian::Big.wire_flag(), 1);
        assert_eq!(Endian::Little.wire_flag(), 2);
        assert_eq!(Endian::from_wire_flag(2), Some(Endian::Little));
        assert_eq!(Endian::from_wire_flag(0), None);
    }

    #[test]
    fn test_encode_both_orders() {
        let mut buf = BytesMut::new();
        let mut enc = Encoder::new(&mut buf, Endian::Big);
        enc.put_u32(0x0102_0304);
        let mut enc = Encoder::new(&mut buf, Endian::Little);
        enc.put_u16(0x0a0b);
        assert_eq!(&buf[..], &[1, 2, 3, 4, 0x0b, 0x0a]);
    }

    #[test]
    fn test_put_padded() {
        let mut buf = BytesMut::new();
        let mut enc = Encoder::new(&mut buf, Endian::Big);
        enc.put_padded(b"abc", 5, b' ');
        enc.put_padded(b"toolong", 3, b' ');
        assert_eq!(&buf[..], b"abc  too");
    }

    #[test]
    fn test_decoder_short_read() {
        let data = [1u8, 2, 3];
        let mut dec = Decoder::new(&data, Endian::Little);
        assert_eq!(dec.get_u16().unwrap(), 0x0201);
        let err = dec.get_u16().unwrap_err();
        assert_eq!(err.code(), 92);
        assert_eq!(dec.remaining(), 1);
    }

    #[test]
    fn test_decoder_array_and_skip() {
        let data = [b'F', b'2', 0, 0, 0xc0, 0];
        let mut dec = Decoder::new(&data, Endian::Little);
        assert_eq!(&dec.get_array::<2>().unwrap(), b"F2");
        dec.skip(2).unwrap();
        assert_eq!(dec.get_u16().unwrap(), 192);
        assert_eq!(dec.position(), 6);
    }
}
