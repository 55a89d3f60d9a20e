//! ABD buffer descriptors and the payload buffers they describe.

use std::fmt;

use bytes::BufMut;

use crate::codec::{Decoder, Encoder};
use crate::error::{GenericError, Result};

/// Encoded size of an ABD header.
pub const ABD_LENGTH: u16 = 48;

/// ABD eyecatcher.
pub const ABD_VERSION: [u8; 2] = *b"G2";

/// Location flag for buffers addressed indirectly.
pub const LOCATION_INDIRECT: u8 = b'I';

/// Kind of a buffer, encoded as a single ASCII character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BufferId {
    /// Format buffer: the fields to read or write.
    Format = b'F',
    /// Record buffer: field values.
    Record = b'R',
    /// Search buffer.
    Search = b'S',
    /// Value buffer for the search buffer.
    Value = b'V',
    /// ISN buffer.
    Isn = b'I',
    /// Performance buffer.
    Performance = b'P',
    /// Multifetch buffer.
    Multifetch = b'M',
    /// User information buffer.
    UserInfo = b'U',
    /// Output buffer.
    Output = b'O',
    /// Extended buffer.
    Extended = b'X',
    /// Internal use.
    Internal = b'Z',
}

impl BufferId {
    /// All ids in wire order of declaration.
    pub const ALL: [BufferId; 11] = [
        BufferId::Format,
        BufferId::Record,
        BufferId::Search,
        BufferId::Value,
        BufferId::Isn,
        BufferId::Performance,
        BufferId::Multifetch,
        BufferId::UserInfo,
        BufferId::Output,
        BufferId::Extended,
        BufferId::Internal,
    ];

    /// Id for an ASCII buffer character.
    pub fn from_u8(v: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|id| *id as u8 == v)
    }

    /// ASCII character of the id.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8() as char)
    }
}

/// The 48-byte ABD header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abd {
    /// Header length, always [`ABD_LENGTH`].
    pub length: u16,
    /// Header version, [`ABD_VERSION`].
    pub version: [u8; 2],
    /// Raw id byte; see [`BufferId`].
    pub id: u8,
    /// How the payload is addressed.
    pub location: u8,
    /// Payload capacity in bytes.
    pub size: u64,
    /// Bytes the server should read from the payload.
    pub send: u64,
    /// Bytes the server wrote (or may write) into the payload.
    pub recv: u64,
    /// Address slot, only meaningful to a co-linked native library.
    pub address: u64,
}

impl Abd {
    /// Header for an empty buffer of the given kind.
    pub fn new(id: BufferId) -> Self {
        Self {
            length: ABD_LENGTH,
            version: ABD_VERSION,
            id: id.as_u8(),
            location: LOCATION_INDIRECT,
            size: 0,
            send: 0,
            recv: 0,
            address: 0,
        }
    }

    /// Writes the 48 header bytes.
    pub fn encode<B: BufMut>(&self, enc: &mut Encoder<'_, B>) {
        enc.put_u16(self.length);
        enc.put_slice(&self.version);
        enc.put_u8(self.id);
        enc.put_u8(0);
        enc.put_u8(self.location);
        enc.put_zeros(9);
        enc.put_u64(self.size);
        enc.put_u64(self.send);
        enc.put_u64(self.recv);
        enc.put_u64(self.address);
    }

    /// Reads the 48 header bytes.
    pub fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let length = dec.get_u16()?;
        let version = dec.get_array()?;
        let id = dec.get_u8()?;
        dec.skip(1)?;
        let location = dec.get_u8()?;
        dec.skip(9)?;
        Ok(Self {
            length,
            version,
            id,
            location,
            size: dec.get_u64()?,
            send: dec.get_u64()?,
            recv: dec.get_u64()?,
            address: dec.get_u64()?,
        })
    }
}

/// An ABD together with its owned payload and a write cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    abd: Abd,
    offset: usize,
    data: Vec<u8>,
}

impl Buffer {
    /// Empty buffer of the given kind.
    pub fn new(id: BufferId) -> Self {
        Self {
            abd: Abd::new(id),
            offset: 0,
            data: Vec::new(),
        }
    }

    /// Buffer of the given kind with `size` zeroed payload bytes.
    pub fn with_size(id: BufferId, size: usize) -> Self {
        let mut buffer = Self::new(id);
        buffer.allocate(size);
        buffer
    }

    /// Buffer for a received header, with a zeroed payload of its size.
    ///
    /// Headers announcing more than `max` bytes fail with code 165.
    pub fn from_abd(abd: Abd, max: usize) -> Result<Self> {
        if abd.size > max as u64 {
            return Err(GenericError::payload_too_large(abd.size, max as u64).into());
        }
        let data = vec![0u8; abd.size as usize];
        Ok(Self {
            abd,
            offset: 0,
            data,
        })
    }

    /// Descriptor of the buffer.
    pub fn abd(&self) -> &Abd {
        &self.abd
    }

    /// Mutable descriptor, for lengths the caller sets by hand.
    pub fn abd_mut(&mut self) -> &mut Abd {
        &mut self.abd
    }

    /// Raw id byte.
    pub fn id(&self) -> u8 {
        self.abd.id
    }

    /// Typed id, if the raw byte is a known one.
    pub fn buffer_id(&self) -> Option<BufferId> {
        BufferId::from_u8(self.abd.id)
    }

    /// Payload capacity.
    pub fn size(&self) -> u64 {
        self.abd.size
    }

    /// Bytes to send.
    pub fn send_size(&self) -> u64 {
        self.abd.send
    }

    /// Sets the bytes to send, capped at the size.
    pub fn set_send_size(&mut self, send: u64) {
        self.abd.send = send.min(self.abd.size);
    }

    /// Bytes received or room announced for receiving.
    pub fn received(&self) -> u64 {
        self.abd.recv
    }

    /// Write cursor.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Whole payload.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Whole payload, writable.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes the server reported as received.
    pub fn received_bytes(&self) -> &[u8] {
        let n = (self.abd.recv as usize).min(self.data.len());
        &self.data[..n]
    }

    /// Reallocates to exactly `n` bytes, keeping the leading contents.
    pub fn grow(&mut self, n: usize) {
        let mut data = vec![0u8; n];
        let keep = self.data.len().min(n);
        data[..keep].copy_from_slice(&self.data[..keep]);
        self.data = data;
        self.abd.size = n as u64;
        if self.offset > n {
            self.offset = n;
        }
        if self.abd.send > self.abd.size {
            self.abd.send = self.abd.size;
        }
    }

    /// Adds `delta` bytes at the end, keeping the contents.
    pub fn extend(&mut self, delta: usize) {
        let n = self.data.len() + delta;
        self.grow(n);
    }

    /// Sizes the payload to `n` bytes; an equally sized payload is kept as is.
    pub fn allocate(&mut self, n: usize) {
        if self.data.len() != n {
            self.data = vec![0u8; n];
            self.offset = 0;
        }
        self.abd.size = n as u64;
    }

    /// Drops the payload and zeroes all lengths.
    pub fn clear(&mut self) {
        self.data = Vec::new();
        self.offset = 0;
        self.abd.size = 0;
        self.abd.send = 0;
        self.abd.recv = 0;
    }

    /// Moves the write cursor, clamped to the payload length.
    pub fn position(&mut self, pos: usize) -> usize {
        self.offset = pos.min(self.data.len());
        self.offset
    }

    /// Appends the UTF-8 bytes of `content` at the cursor.
    pub fn write_string(&mut self, content: &str) {
        self.write_binary(content.as_bytes());
    }

    /// Appends at the cursor, growing to exactly the new end if needed.
    pub fn write_binary(&mut self, content: &[u8]) {
        let end = self.offset + content.len();
        if end > self.data.len() {
            self.grow(end);
        }
        self.data[self.offset..end].copy_from_slice(content);
        self.offset = end;
        self.abd.send = self.offset as u64;
    }

    /// Prepares lengths right before a call.
    ///
    /// Record buffers announce their full size as room to fill and send
    /// nothing. Format buffers expect nothing back.
    pub fn reset_send_size(&mut self) {
        match self.buffer_id() {
            Some(BufferId::Format) => self.abd.recv = 0,
            Some(BufferId::Record) => {
                self.abd.recv = self.abd.size;
                self.abd.send = 0;
            }
            _ => {}
        }
    }

    /// Stores a reply payload of `recv` bytes, growing when the server
    /// returned more than fits.
    pub(crate) fn set_received(&mut self, payload: &[u8]) {
        if payload.len() > self.data.len() {
            self.grow(payload.len());
        }
        self.data[..payload.len()].copy_from_slice(payload);
        self.abd.recv = payload.len() as u64;
    }
}

impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ABD ID: {}", self.abd.id as char)?;
        writeln!(f, "  Size: {}", self.abd.size)?;
        write!(
            f,
            "  Send: {}  Received: {}",
            self.abd.send, self.abd.recv
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Endian;
    use bytes::BytesMut;

    #[test]
    fn test_growth_sequence() {
        let mut b = Buffer::with_size(BufferId::Record, 100);
        assert_eq!(b.size(), 100);
        b.grow(150);
        assert_eq!(b.size(), 150);
        b.extend(50);
        assert_eq!(b.size(), 200);
        assert_eq!(b.position(5), 5);
        assert_eq!(b.offset(), 5);
        assert_eq!(b.position(500), 200);
    }

    #[test]
    fn test_grow_keeps_contents() {
        let mut b = Buffer::new(BufferId::Format);
        b.write_string("AA,8,A.");
        b.grow(20);
        assert_eq!(&b.bytes()[..7], b"AA,8,A.");
        assert_eq!(b.bytes().len(), 20);
        b.grow(3);
        assert_eq!(b.bytes(), b"AA,");
        assert_eq!(b.send_size(), 3);
    }

    #[test]
    fn test_write_updates_send() {
        let mut b = Buffer::new(BufferId::Format);
        b.write_string("AA");
        b.write_binary(&[1, 2]);
        assert_eq!(b.bytes(), &[b'A', b'A', 1, 2]);
        assert_eq!(b.size(), 4);
        assert_eq!(b.send_size(), 4);
        assert_eq!(b.offset(), 4);
    }

    #[test]
    fn test_write_into_allocated() {
        let mut b = Buffer::with_size(BufferId::Value, 10);
        b.write_string("abc");
        assert_eq!(b.size(), 10);
        assert_eq!(b.send_size(), 3);
        assert_eq!(&b.bytes()[..3], b"abc");
    }

    #[test]
    fn test_allocate_keeps_same_size() {
        let mut b = Buffer::with_size(BufferId::Record, 4);
        b.write_binary(&[9, 9]);
        b.allocate(4);
        assert_eq!(b.bytes(), &[9, 9, 0, 0]);
        b.allocate(6);
        assert_eq!(b.bytes(), &[0; 6]);
        assert_eq!(b.offset(), 0);
    }

    #[test]
    fn test_clear() {
        let mut b = Buffer::with_size(BufferId::Record, 8);
        b.write_string("xy");
        b.abd_mut().recv = 8;
        b.clear();
        assert_eq!(b.size(), 0);
        assert_eq!(b.send_size(), 0);
        assert_eq!(b.received(), 0);
        assert_eq!(b.offset(), 0);
        assert!(b.bytes().is_empty());
    }

    #[test]
    fn test_reset_send_size() {
        let mut r = Buffer::with_size(BufferId::Record, 64);
        r.set_send_size(10);
        r.reset_send_size();
        assert_eq!(r.received(), 64);
        assert_eq!(r.send_size(), 0);

        let mut f = Buffer::new(BufferId::Format);
        f.write_string("AA.");
        f.abd_mut().recv = 3;
        f.reset_send_size();
        assert_eq!(f.received(), 0);
        assert_eq!(f.send_size(), 3);
    }

    #[test]
    fn test_header_layout() {
        let mut b = Buffer::with_size(BufferId::Search, 16);
        b.set_send_size(5);
        let mut buf = BytesMut::new();
        b.abd().encode(&mut Encoder::new(&mut buf, Endian::Little));
        assert_eq!(buf.len(), ABD_LENGTH as usize);
        assert_eq!(&buf[0..2], &[48, 0]);
        assert_eq!(&buf[2..4], b"G2");
        assert_eq!(buf[4], b'S');
        assert_eq!(buf[6], b'I');
        assert_eq!(&buf[16..24], &[16, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&buf[24..32], &[5, 0, 0, 0, 0, 0, 0, 0]);
        let back = Abd::decode(&mut Decoder::new(&buf, Endian::Little)).unwrap();
        assert_eq!(&back, b.abd());
    }

    #[test]
    fn test_display() {
        let b = Buffer::with_size(BufferId::Record, 12);
        let text = b.to_string();
        assert!(text.starts_with("ABD ID: R\n"));
        assert!(text.contains("Size: 12"));
    }

    #[test]
    fn test_from_abd_respects_limit() {
        let mut abd = Abd::new(BufferId::Record);
        abd.size = 32;
        let b = Buffer::from_abd(abd.clone(), 64).unwrap();
        assert_eq!(b.bytes().len(), 32);
        abd.size = 65;
        assert_eq!(Buffer::from_abd(abd, 64).unwrap_err().code(), 165);
    }

    #[test]
    fn test_buffer_id_lookup() {
        for id in BufferId::ALL {
            assert_eq!(BufferId::from_u8(id.as_u8()), Some(id));
        }
        assert_eq!(BufferId::from_u8(b'Q'), None);
    }
}

#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_write_string_tail(prefix in "[a-zA-Z0-9 ]{0,40}", content in "[a-zA-Z0-9.,]{0,40}") {
            let mut b = Buffer::new(BufferId::Format);
            b.write_string(&prefix);
            b.write_string(&content);
            prop_assert!(b.bytes().ends_with(content.as_bytes()));
            prop_assert_eq!(b.size() as usize, b.offset());
            prop_assert_eq!(b.send_size() as usize, b.offset());
        }

        #[test]
        fn test_writes_concatenate(parts in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..16), 0..8)) {
            let mut b = Buffer::new(BufferId::Value);
            let mut expected = Vec::new();
            for (i, part) in parts.iter().enumerate() {
                if i % 2 == 0 {
                    b.write_binary(part);
                } else {
                    b.write_string(&String::from_utf8_lossy(part));
                    expected.extend_from_slice(String::from_utf8_lossy(part).as_bytes());
                    continue;
                }
                expected.extend_from_slice(part);
            }
            prop_assert_eq!(b.bytes(), &expected[..]);
        }
    }
}
