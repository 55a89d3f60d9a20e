//! The 192-byte ACBX control block that carries one database command.

use std::fmt;

use bytes::BufMut;

use crate::codec::{Decoder, Encoder};
use crate::error::Result;
use crate::response;

/// Encoded size of an ACBX.
pub const ACBX_LENGTH: u16 = 192;

/// ACBX eyecatcher.
pub const ACBX_VERSION: [u8; 2] = *b"F2";

/// Two-character command code of an ACBX.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandCode(pub [u8; 2]);

impl CommandCode {
    /// Blank command.
    pub const EMPTY: CommandCode = CommandCode(*b"  ");
    /// Open a user session.
    pub const OP: CommandCode = CommandCode(*b"OP");
    /// Close the user session.
    pub const CL: CommandCode = CommandCode(*b"CL");
    /// Back out the transaction.
    pub const BT: CommandCode = CommandCode(*b"BT");
    /// End the transaction.
    pub const ET: CommandCode = CommandCode(*b"ET");
    /// Read the field definition table.
    pub const LF: CommandCode = CommandCode(*b"LF");
    /// Read by ISN.
    pub const L1: CommandCode = CommandCode(*b"L1");
    /// Read physical sequential.
    pub const L2: CommandCode = CommandCode(*b"L2");
    /// Read logical sequential.
    pub const L3: CommandCode = CommandCode(*b"L3");
    /// Read by ISN with hold.
    pub const L4: CommandCode = CommandCode(*b"L4");
    /// Read physical sequential with hold.
    pub const L5: CommandCode = CommandCode(*b"L5");
    /// Read logical sequential with hold.
    pub const L6: CommandCode = CommandCode(*b"L6");
    /// Read descriptor values (histogram).
    pub const L9: CommandCode = CommandCode(*b"L9");
    /// Store a record.
    pub const N1: CommandCode = CommandCode(*b"N1");
    /// Store a record with a given ISN.
    pub const N2: CommandCode = CommandCode(*b"N2");
    /// Update a record.
    pub const A1: CommandCode = CommandCode(*b"A1");
    /// Find records.
    pub const S1: CommandCode = CommandCode(*b"S1");
    /// Find records, sorted.
    pub const S2: CommandCode = CommandCode(*b"S2");
    /// Find records, third variant.
    pub const S3: CommandCode = CommandCode(*b"S3");
    /// Find records with hold.
    pub const S4: CommandCode = CommandCode(*b"S4");
    /// Delete a record.
    pub const E1: CommandCode = CommandCode(*b"E1");
    /// User command 1.
    pub const U1: CommandCode = CommandCode(*b"U1");
    /// User command 2.
    pub const U2: CommandCode = CommandCode(*b"U2");
    /// User command 3.
    pub const U3: CommandCode = CommandCode(*b"U3");
    /// Release a command id.
    pub const RC: CommandCode = CommandCode(*b"RC");
    /// Release held ISNs.
    pub const RI: CommandCode = CommandCode(*b"RI");
    /// Passed through unchanged.
    pub const V3: CommandCode = CommandCode(*b"V3");

    const KNOWN: [CommandCode; 27] = [
        Self::EMPTY,
        Self::OP,
        Self::CL,
        Self::BT,
        Self::ET,
        Self::LF,
        Self::L1,
        Self::L2,
        Self::L3,
        Self::L4,
        Self::L5,
        Self::L6,
        Self::L9,
        Self::N1,
        Self::N2,
        Self::A1,
        Self::S1,
        Self::S2,
        Self::S3,
        Self::S4,
        Self::E1,
        Self::U1,
        Self::U2,
        Self::U3,
        Self::RC,
        Self::RI,
        Self::V3,
    ];

    /// Builds a code from the first two bytes of `code`, space padded.
    pub fn parse(code: &str) -> Self {
        let mut out = *b"  ";
        for (dst, src) in out.iter_mut().zip(code.bytes()) {
            *dst = src;
        }
        CommandCode(out)
    }

    /// Raw two bytes.
    pub fn as_bytes(&self) -> [u8; 2] {
        self.0
    }

    /// Case-insensitive membership in the set of known commands.
    pub fn is_valid(&self) -> bool {
        is_valid_command(self.0)
    }

    /// Commands that modify data and therefore open a transaction.
    pub fn is_update(&self) -> bool {
        let upper = CommandCode(self.0.map(|b| b.to_ascii_uppercase()));
        matches!(upper, Self::N1 | Self::N2 | Self::A1 | Self::E1)
    }
}

/// Checks a raw command code against the known commands, ignoring case.
pub fn is_valid_command(cmd: [u8; 2]) -> bool {
    let upper = cmd.map(|b| b.to_ascii_uppercase());
    CommandCode::KNOWN.iter().any(|known| known.0 == upper)
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.0[0] as char, self.0[1] as char)
    }
}

impl fmt::Debug for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandCode({})", self)
    }
}

/// ACBX control block.
///
/// Reserved areas are not kept; they are written as zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acbx {
    /// Control block type byte.
    pub typ: u8,
    /// Version, `F2`.
    pub version: [u8; 2],
    /// Encoded length, 192.
    pub length: u16,
    /// Command code.
    pub command: CommandCode,
    /// Response code, see [`crate::response`].
    pub response: u16,
    /// Command id.
    pub cid: [u8; 4],
    /// Database id.
    pub dbid: u32,
    /// File number.
    pub file: u32,
    /// ISN.
    pub isn: u64,
    /// ISN lower limit; after OP it carries the platform.
    pub isn_lower_limit: u64,
    /// ISN quantity.
    pub isn_quantity: u64,
    /// Command options 1 to 8.
    pub options: [u8; 8],
    /// Additions 1.
    pub add1: [u8; 8],
    /// Additions 2.
    pub add2: [u8; 4],
    /// Additions 3.
    pub add3: [u8; 8],
    /// Additions 4.
    pub add4: [u8; 8],
    /// Additions 5.
    pub add5: [u8; 8],
    /// Additions 6.
    pub add6: [u8; 8],
    /// Offset of the failing element in the error buffer.
    pub error_offset: u64,
    /// Character position of the error.
    pub error_char: [u8; 2],
    /// Error subcode of the response.
    pub subcode: u16,
    /// Id of the buffer the error refers to.
    pub error_buffer_id: u8,
    /// Sequence of the buffer the error refers to.
    pub error_buffer_seq: u16,
    /// Subcode for the record buffer.
    pub subcode_r: u16,
    /// Subcode for the search buffer.
    pub subcode_s: u16,
    /// Subcode text.
    pub subcode_t: [u8; 4],
    /// Compressed record length.
    pub compressed_length: u64,
    /// Decompressed record length.
    pub decompressed_length: u64,
    /// Command time.
    pub command_time: u64,
    /// User area.
    pub user: [u8; 16],
    /// Session time.
    pub session_time: u64,
}

impl Default for Acbx {
    fn default() -> Self {
        Self {
            typ: 0,
            version: ACBX_VERSION,
            length: ACBX_LENGTH,
            command: CommandCode::EMPTY,
            response: 0,
            cid: [0; 4],
            dbid: 0,
            file: 0,
            isn: 0,
            isn_lower_limit: 0,
            isn_quantity: 0,
            options: [0; 8],
            add1: [0; 8],
            add2: [0; 4],
            add3: [0; 8],
            add4: [0; 8],
            add5: [0; 8],
            add6: [0; 8],
            error_offset: 0,
            error_char: [0; 2],
            subcode: 0,
            error_buffer_id: 0,
            error_buffer_seq: 0,
            subcode_r: 0,
            subcode_s: 0,
            subcode_t: [0; 4],
            compressed_length: 0,
            decompressed_length: 0,
            command_time: 0,
            user: [0; 16],
            session_time: 0,
        }
    }
}

impl Acbx {
    /// Creates a reset control block addressed to `dbid`.
    pub fn new(dbid: u32) -> Self {
        let mut acbx = Acbx {
            dbid,
            ..Default::default()
        };
        acbx.reset();
        acbx
    }

    /// Restores the pre-call state; user area, file and dbid are kept.
    pub fn reset(&mut self) {
        self.version = ACBX_VERSION;
        self.length = ACBX_LENGTH;
        self.command = CommandCode::EMPTY;
        self.response = response::NOT_ACTIVE;
        self.isn = 0;
        self.isn_quantity = 0;
        self.options = [b' '; 8];
        self.add1 = [b' '; 8];
        self.add2 = [b' '; 4];
        self.add3 = [0; 8];
        self.add4 = [0; 8];
        self.add5 = [0; 8];
        self.add6 = [0; 8];
    }

    /// Blanks the command options.
    pub fn reset_options(&mut self) {
        self.options = [b' '; 8];
    }

    /// Writes the 192-byte wire form.
    pub fn encode<B: BufMut>(&self, enc: &mut Encoder<'_, B>) {
        enc.put_u8(self.typ);
        enc.put_u8(0);
        enc.put_slice(&self.version);
        enc.put_u16(self.length);
        enc.put_slice(&self.command.0);
        enc.put_u16(0);
        enc.put_u16(self.response);
        enc.put_slice(&self.cid);
        enc.put_u32(self.dbid);
        enc.put_u32(self.file);
        enc.put_u64(self.isn);
        enc.put_u64(self.isn_lower_limit);
        enc.put_u64(self.isn_quantity);
        enc.put_slice(&self.options);
        enc.put_slice(&self.add1);
        enc.put_slice(&self.add2);
        enc.put_slice(&self.add3);
        enc.put_slice(&self.add4);
        enc.put_slice(&self.add5);
        enc.put_slice(&self.add6);
        enc.put_zeros(4);
        enc.put_u64(self.error_offset);
        enc.put_slice(&self.error_char);
        enc.put_u16(self.subcode);
        enc.put_u8(self.error_buffer_id);
        enc.put_u8(0);
        enc.put_u16(self.error_buffer_seq);
        enc.put_u16(self.subcode_r);
        enc.put_u16(self.subcode_s);
        enc.put_slice(&self.subcode_t);
        enc.put_u64(self.compressed_length);
        enc.put_u64(self.decompressed_length);
        enc.put_u64(self.command_time);
        enc.put_slice(&self.user);
        enc.put_u64(self.session_time);
        enc.put_zeros(16);
    }

    /// Reads the 192-byte wire form.
    pub fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let typ = dec.get_u8()?;
        dec.skip(1)?;
        let version = dec.get_array()?;
        let length = dec.get_u16()?;
        let command = CommandCode(dec.get_array()?);
        dec.skip(2)?;
        let response = dec.get_u16()?;
        let cid = dec.get_array()?;
        let dbid = dec.get_u32()?;
        let file = dec.get_u32()?;
        let isn = dec.get_u64()?;
        let isn_lower_limit = dec.get_u64()?;
        let isn_quantity = dec.get_u64()?;
        let options = dec.get_array()?;
        let add1 = dec.get_array()?;
        let add2 = dec.get_array()?;
        let add3 = dec.get_array()?;
        let add4 = dec.get_array()?;
        let add5 = dec.get_array()?;
        let add6 = dec.get_array()?;
        dec.skip(4)?;
        let error_offset = dec.get_u64()?;
        let error_char = dec.get_array()?;
        let subcode = dec.get_u16()?;
        let error_buffer_id = dec.get_u8()?;
        dec.skip(1)?;
        let error_buffer_seq = dec.get_u16()?;
        let subcode_r = dec.get_u16()?;
        let subcode_s = dec.get_u16()?;
        let subcode_t = dec.get_array()?;
        let compressed_length = dec.get_u64()?;
        let decompressed_length = dec.get_u64()?;
        let command_time = dec.get_u64()?;
        let user = dec.get_array()?;
        let session_time = dec.get_u64()?;
        dec.skip(16)?;
        Ok(Self {
            typ,
            version,
            length,
            command,
            response,
            cid,
            dbid,
            file,
            isn,
            isn_lower_limit,
            isn_quantity,
            options,
            add1,
            add2,
            add3,
            add4,
            add5,
            add6,
            error_offset,
            error_char,
            subcode,
            error_buffer_id,
            error_buffer_seq,
            subcode_r,
            subcode_s,
            subcode_t,
            compressed_length,
            decompressed_length,
            command_time,
            user,
            session_time,
        })
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(" ")
}

impl fmt::Display for Acbx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ACBX:")?;
        write!(f, "  CmdCode: {}", self.command)?;
        write!(f, "  CmdId: ")?;
        for b in self.cid {
            write!(f, "{:02X}", b)?;
        }
        writeln!(f)?;
        write!(f, "  Dbid: {}  Filenr: {}", self.dbid, self.file)?;
        writeln!(
            f,
            "  Responsecode: {} Subcode: {}",
            self.response, self.subcode
        )?;
        writeln!(
            f,
            "  Isn: {}  ISN Lower Limit: {}  ISN Quantity: {}",
            self.isn, self.isn_lower_limit, self.isn_quantity
        )?;
        writeln!(f, "  CmdOption: [{}]", hex(&self.options))?;
        writeln!(f, "  Add1: [{}]", hex(&self.add1))?;
        writeln!(f, "  Add2: [{}]", hex(&self.add2))?;
        writeln!(f, "  Add3: [{}]", hex(&self.add3))?;
        writeln!(f, "  Add4: [{}]", hex(&self.add4))?;
        writeln!(f, "  Add5: [{}]", hex(&self.add5))?;
        writeln!(f, "  Add6: [{}]", hex(&self.add6))?;
        writeln!(
            f,
            "  Error offset: {}  Error char: [{}]  Error buffer: {}",
            self.error_offset,
            hex(&self.error_char),
            self.error_buffer_id
        )?;
        writeln!(
            f,
            "  Compressed length: {}  Decompressed length: {}",
            self.compressed_length, self.decompressed_length
        )?;
        write!(f, "  User: [{}]", hex(&self.user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Endian;
    use bytes::BytesMut;

    #[test]
    fn test_command_code_parse() {
        let code = CommandCode::parse("S4");
        assert_eq!(code.as_bytes(), [b'S', b'4']);
        assert!(is_valid_command(*b"S4"));
        assert!(!is_valid_command(*b"X1"));
    }

    #[test]
    fn test_command_code_case_insensitive() {
        assert!(is_valid_command(*b"op"));
        assert!(is_valid_command(*b"lF"));
        assert!(is_valid_command(*b"  "));
        assert!(!is_valid_command(*b"ZZ"));
        assert!(CommandCode::parse("n1").is_update());
        assert!(!CommandCode::L3.is_update());
    }

    #[test]
    fn test_reset() {
        let mut acbx = Acbx::new(4);
        acbx.command = CommandCode::L3;
        acbx.response = 3;
        acbx.isn = 77;
        acbx.add3 = [1; 8];
        acbx.file = 11;
        acbx.reset();
        assert_eq!(acbx.version, *b"F2");
        assert_eq!(acbx.length, 192);
        assert_eq!(acbx.command, CommandCode::EMPTY);
        assert_eq!(acbx.response, 148);
        assert_eq!(acbx.isn, 0);
        assert_eq!(acbx.isn_quantity, 0);
        assert_eq!(acbx.options, [b' '; 8]);
        assert_eq!(acbx.add2, [b' '; 4]);
        assert_eq!(acbx.add3, [0; 8]);
        assert_eq!(acbx.file, 11);
        assert_eq!(acbx.dbid, 4);
    }

    #[test]
    fn test_encoded_length_and_layout() {
        let mut acbx = Acbx::new(0x0102);
        acbx.command = CommandCode::OP;
        acbx.subcode = 9;
        acbx.session_time = 5;
        let mut buf = BytesMut::new();
        acbx.encode(&mut Encoder::new(&mut buf, Endian::Little));
        assert_eq!(buf.len(), ACBX_LENGTH as usize);
        assert_eq!(&buf[2..4], b"F2");
        assert_eq!(&buf[4..6], &[192, 0]);
        assert_eq!(&buf[6..8], b"OP");
        assert_eq!(&buf[0x0a..0x0c], &[148, 0]);
        assert_eq!(&buf[0x10..0x14], &[2, 1, 0, 0]);
        assert_eq!(&buf[0x72..0x74], &[9, 0]);
        assert_eq!(&buf[0xa8..0xb0], &[5, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_decode_inverse_of_encode() {
        let mut acbx = Acbx::new(9);
        acbx.command = CommandCode::L1;
        acbx.cid = *b"ABxn";
        acbx.isn = 1234543;
        acbx.user = *b"user-area-16byte";
        for order in [Endian::Big, Endian::Little] {
            let mut buf = BytesMut::new();
            acbx.encode(&mut Encoder::new(&mut buf, order));
            let back = Acbx::decode(&mut Decoder::new(&buf, order)).unwrap();
            assert_eq!(back, acbx);
        }
    }

    #[test]
    fn test_display_after_reset() {
        let mut acbx = Acbx::new(1);
        acbx.cid = *b"ABxn";
        acbx.options = [b'I', b'J', 0, 0, 0, 0, 0xff, 0x01];
        acbx.isn = 1234543;
        let text = acbx.to_string();
        assert!(text.contains("Responsecode: 148 Subcode: 0"));
        assert!(text.contains("CmdId: 4142786E"));
        assert!(text.contains("Isn: 1234543"));
        assert!(text.contains("49 4a 00 00 00 00 ff 01"));
        acbx.response = 200;
        assert!(acbx.to_string().contains("Responsecode: 200"));
    }
}
