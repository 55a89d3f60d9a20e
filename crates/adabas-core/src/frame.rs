//! ADATCP framing: outer header, data sub-header and connect payload.
//!
//! Outer headers and the connect payload travel big-endian. The data
//! sub-header uses the client's byte order, which the server learned
//! from the connect payload.

use bytes::BytesMut;

use crate::codec::{Decoder, Encoder, Endian};
use crate::error::Result;
use crate::id::AdaId;

/// Outer header eyecatcher.
pub const ADATCP_EYECATCHER: [u8; 6] = *b"ADATCP";
/// Outer header protocol version.
pub const ADATCP_VERSION: [u8; 2] = *b"01";
/// Size of the outer header.
pub const OUTER_HEADER_LENGTH: usize = 40;

/// Data sub-header eyecatcher.
pub const DATA_EYECATCHER: [u8; 4] = *b"DATA";
/// Data sub-header version.
pub const DATA_VERSION: [u8; 4] = *b"0001";
/// Size of the data sub-header.
pub const DATA_HEADER_LENGTH: usize = 24;

/// Size of the connect payload.
pub const CONNECT_PAYLOAD_LENGTH: usize = 72;
/// Size of the disconnect payload.
pub const DISCONNECT_PAYLOAD_LENGTH: usize = 8;

/// Room announced for the cluster node list reply.
pub const NODE_LIST_LENGTH: u32 = 64 * 1024;

const CHARSET_ASCII8: u8 = 1;
const FLOAT_IEEE: u8 = 1;

/// Kind of an ADATCP frame, carried in the outer header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BufferType {
    /// Client opens a session.
    ConnectRequest = 1,
    /// Server accepts the session.
    ConnectReply = 2,
    /// Server refuses the session.
    ConnectError = 3,
    /// Client ends the session.
    DisconnectRequest = 4,
    /// Server confirms the end.
    DisconnectReply = 5,
    /// Server could not end the session.
    DisconnectError = 6,
    /// Client sends a call.
    DataRequest = 7,
    /// Server answers a call.
    DataReply = 8,
    /// Server could not process a call.
    DataError = 9,
}

impl BufferType {
    /// Buffer type for a wire value.
    pub fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            1 => BufferType::ConnectRequest,
            2 => BufferType::ConnectReply,
            3 => BufferType::ConnectError,
            4 => BufferType::DisconnectRequest,
            5 => BufferType::DisconnectReply,
            6 => BufferType::DisconnectError,
            7 => BufferType::DataRequest,
            8 => BufferType::DataReply,
            9 => BufferType::DataError,
            _ => return None,
        })
    }
}

/// Payload kind, carried in the data sub-header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DataType {
    /// ACBX call.
    AdabasRequest = 1,
    /// ACBX reply.
    AdabasReply = 2,
    /// Cluster member list request.
    ClusterNodesRequest = 3,
    /// Cluster member list.
    ClusterNodesReply = 4,
    /// Cluster member list unavailable.
    ClusterNodesError = 5,
}

/// Kind of database behind an ADATCP endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    /// Single nucleus, type byte `C`.
    Single,
    /// Cluster of nuclei, type byte `G`.
    Cluster,
}

impl DatabaseType {
    /// Type for the connect reply byte.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            b'C' => Some(DatabaseType::Single),
            b'G' => Some(DatabaseType::Cluster),
            _ => None,
        }
    }

    /// Byte sent in the connect reply.
    pub fn as_u8(self) -> u8 {
        match self {
            DatabaseType::Single => b'C',
            DatabaseType::Cluster => b'G',
        }
    }
}

/// The 40-byte ADATCP outer header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OuterHeader {
    /// `ADATCP`.
    pub eyecatcher: [u8; 6],
    /// `01`.
    pub version: [u8; 2],
    /// Length of the whole frame including this header.
    pub length: u32,
    /// See [`BufferType`].
    pub buffer_type: u32,
    /// Server-assigned connection id.
    pub identification: [u8; 16],
    /// Server error code, set on error replies.
    pub error_code: u32,
    /// Database type byte, zero in requests.
    pub database_type: u8,
}

impl OuterHeader {
    /// Header of the given type, length to be filled in.
    pub fn new(buffer_type: BufferType) -> Self {
        Self {
            eyecatcher: ADATCP_EYECATCHER,
            version: ADATCP_VERSION,
            length: 0,
            buffer_type: buffer_type as u32,
            identification: [0; 16],
            error_code: 0,
            database_type: 0,
        }
    }

    /// Appends the 40 header bytes, big endian.
    pub fn encode(&self, buf: &mut BytesMut) {
        let mut enc = Encoder::new(buf, Endian::network());
        enc.put_slice(&self.eyecatcher);
        enc.put_slice(&self.version);
        enc.put_u32(self.length);
        enc.put_u32(self.buffer_type);
        enc.put_slice(&self.identification);
        enc.put_u32(self.error_code);
        enc.put_u8(self.database_type);
        enc.put_zeros(3);
    }

    /// Reads the first 40 bytes of `data`.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(data, Endian::network());
        let header = Self {
            eyecatcher: dec.get_array()?,
            version: dec.get_array()?,
            length: dec.get_u32()?,
            buffer_type: dec.get_u32()?,
            identification: dec.get_array()?,
            error_code: dec.get_u32()?,
            database_type: dec.get_u8()?,
        };
        dec.skip(3)?;
        Ok(header)
    }

    /// Whether the frame starts with `ADATCP`.
    pub fn has_eyecatcher(&self) -> bool {
        self.eyecatcher == ADATCP_EYECATCHER
    }

    /// Typed buffer type, if known.
    pub fn kind(&self) -> Option<BufferType> {
        BufferType::from_u32(self.buffer_type)
    }
}

/// The 24-byte data sub-header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataHeader {
    /// `DATA`.
    pub eyecatcher: [u8; 4],
    /// `0001`.
    pub version: [u8; 4],
    /// Length of this header plus the payload.
    pub length: u32,
    /// See [`DataType`].
    pub data_type: u32,
    /// ABDs following the ACBX.
    pub number_of_buffers: u32,
    /// Server error code.
    pub error_code: u32,
}

impl DataHeader {
    /// Header of the given type, length to be filled in.
    pub fn new(data_type: DataType) -> Self {
        Self {
            eyecatcher: DATA_EYECATCHER,
            version: DATA_VERSION,
            length: 0,
            data_type: data_type as u32,
            number_of_buffers: 0,
            error_code: 0,
        }
    }

    /// Appends the 24 header bytes in `order`.
    pub fn encode(&self, buf: &mut BytesMut, order: Endian) {
        let mut enc = Encoder::new(buf, order);
        enc.put_slice(&self.eyecatcher);
        enc.put_slice(&self.version);
        enc.put_u32(self.length);
        enc.put_u32(self.data_type);
        enc.put_u32(self.number_of_buffers);
        enc.put_u32(self.error_code);
    }

    /// Reads the first 24 bytes of `data` in `order`.
    pub fn decode(data: &[u8], order: Endian) -> Result<Self> {
        let mut dec = Decoder::new(data, order);
        Ok(Self {
            eyecatcher: dec.get_array()?,
            version: dec.get_array()?,
            length: dec.get_u32()?,
            data_type: dec.get_u32()?,
            number_of_buffers: dec.get_u32()?,
            error_code: dec.get_u32()?,
        })
    }
}

/// The 72-byte connect request and reply payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectPayload {
    /// Database version, space padded.
    pub database_version: [u8; 16],
    /// Database name, space padded.
    pub database_name: [u8; 16],
    /// User name from the session identity.
    pub user: [u8; 8],
    /// Node name from the session identity.
    pub node: [u8; 8],
    /// Surrogate pid.
    pub pid: u32,
    /// Database id.
    pub dbid: u32,
    /// Identity timestamp.
    pub timestamp: u64,
    /// 1 big endian, 2 little endian.
    pub endianness: u8,
    /// 1 ASCII-8.
    pub charset: u8,
    /// 1 IEEE.
    pub float_format: u8,
}

impl ConnectPayload {
    /// Request payload announcing the client identity and byte order.
    pub fn request(id: &AdaId, dbid: u32, order: Endian) -> Self {
        Self {
            database_version: [0; 16],
            database_name: [0; 16],
            user: id.user,
            node: id.node,
            pid: id.pid,
            dbid,
            timestamp: id.timestamp,
            endianness: order.wire_flag(),
            charset: CHARSET_ASCII8,
            float_format: FLOAT_IEEE,
        }
    }

    /// Appends the 72 payload bytes, big endian.
    pub fn encode(&self, buf: &mut BytesMut) {
        let mut enc = Encoder::new(buf, Endian::network());
        enc.put_slice(&self.database_version);
        enc.put_slice(&self.database_name);
        enc.put_slice(&self.user);
        enc.put_slice(&self.node);
        enc.put_u32(self.pid);
        enc.put_u32(self.dbid);
        enc.put_u64(self.timestamp);
        enc.put_u8(self.endianness);
        enc.put_u8(self.charset);
        enc.put_u8(self.float_format);
        enc.put_zeros(5);
    }

    /// Reads the first 72 bytes of `data`.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(data, Endian::network());
        let payload = Self {
            database_version: dec.get_array()?,
            database_name: dec.get_array()?,
            user: dec.get_array()?,
            node: dec.get_array()?,
            pid: dec.get_u32()?,
            dbid: dec.get_u32()?,
            timestamp: dec.get_u64()?,
            endianness: dec.get_u8()?,
            charset: dec.get_u8()?,
            float_format: dec.get_u8()?,
        };
        dec.skip(5)?;
        Ok(payload)
    }
}

/// Text of a NUL or space padded name field.
pub(crate) fn trimmed(name: &[u8]) -> String {
    let end = name
        .iter()
        .rposition(|b| *b != 0 && *b != b' ')
        .map_or(0, |p| p + 1);
    String::from_utf8_lossy(&name[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outer_header_layout() {
        let mut header = OuterHeader::new(BufferType::DataRequest);
        header.length = 0x0102_0304;
        header.identification = [7; 16];
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), OUTER_HEADER_LENGTH);
        assert_eq!(&buf[..8], b"ADATCP01");
        assert_eq!(&buf[8..12], &[1, 2, 3, 4]);
        assert_eq!(&buf[12..16], &[0, 0, 0, 7]);

        let decoded = OuterHeader::decode(&buf).unwrap();
        assert_eq!(decoded, header);
        assert!(decoded.has_eyecatcher());
        assert_eq!(decoded.kind(), Some(BufferType::DataRequest));
    }

    #[test]
    fn test_data_header_follows_order() {
        let mut header = DataHeader::new(DataType::AdabasRequest);
        header.length = 24;
        header.number_of_buffers = 2;
        let mut little = BytesMut::new();
        header.encode(&mut little, Endian::Little);
        assert_eq!(little.len(), DATA_HEADER_LENGTH);
        assert_eq!(&little[..8], b"DATA0001");
        assert_eq!(&little[8..12], &[24, 0, 0, 0]);

        let mut big = BytesMut::new();
        header.encode(&mut big, Endian::Big);
        assert_eq!(&big[8..12], &[0, 0, 0, 24]);
        assert_eq!(DataHeader::decode(&big, Endian::Big).unwrap(), header);
    }

    #[test]
    fn test_connect_payload() {
        let id = AdaId::with_names("user", "node");
        let payload = ConnectPayload::request(&id, 12, Endian::Little);
        let mut buf = BytesMut::new();
        payload.encode(&mut buf);
        assert_eq!(buf.len(), CONNECT_PAYLOAD_LENGTH);
        assert_eq!(&buf[32..40], b"user    ");
        assert_eq!(buf[64], 2);
        assert_eq!(buf[65], 1);
        assert_eq!(buf[66], 1);
        assert_eq!(ConnectPayload::decode(&buf).unwrap(), payload);
    }

    #[test]
    fn test_short_header_is_rejected() {
        let err = OuterHeader::decode(&[0u8; 10]).unwrap_err();
        assert_eq!(err.code(), 92);
    }

    #[test]
    fn test_trimmed() {
        assert_eq!(trimmed(b"EMPLOYEE\0\0\0\0"), "EMPLOYEE");
        assert_eq!(trimmed(b"V6.7    "), "V6.7");
        assert_eq!(trimmed(&[0; 4]), "");
    }
}
